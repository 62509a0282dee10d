//! Miette diagnostic conversion for driver errors.

use cppl_driver::DriverError;
use miette::Report;

/// Convert a driver error into a report with an actionable hint where one
/// exists.
pub fn driver_error_to_report(err: DriverError) -> Report {
    match &err {
        DriverError::Graph(graph_err) => miette::miette!(
            help = "Move one side of the mutual reference after the unit's \
                    body marker so it becomes a body-only import, or remove \
                    the import.",
            "{graph_err}"
        ),
        DriverError::DuplicateUnit { .. } => miette::miette!(
            help = "Rename one of the colliding source files or drop the \
                    overlapping library root.",
            "{err}"
        ),
        DriverError::MissingLdeps { .. } => miette::miette!(
            help = "The parse phase did not produce this record; re-run \
                    without a stale build root or check the front-end.",
            "{err}"
        ),
        _ => miette::miette!("{err}"),
    }
}
