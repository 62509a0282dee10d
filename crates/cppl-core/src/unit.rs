//! Unit identifier derivation.
//!
//! A unit identifier is the root-relative source path with the extension
//! stripped and path separators replaced by `::`. It is stable across runs
//! for the same relative path and doubles as the on-wire key in parsed
//! import records and as the `-cppl-unit-id` argument to the front-end.

use std::path::Path;

/// Separator between unit identifier components.
pub const COMPONENT_SEPARATOR: &str = "::";

/// Derive a unit identifier from a root-relative source path.
///
/// `pkg/sub/UnitA.cppl` becomes `pkg::sub::UnitA`. Only the final
/// component's extension is stripped; dots elsewhere are kept verbatim.
pub fn unit_id_from_rel_path(rel: &Path) -> String {
    let mut components: Vec<&str> = rel
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();

    if let Some(last) = components.last().copied() {
        if let Some(stem) = Path::new(last).file_stem().and_then(|s| s.to_str()) {
            let idx = components.len() - 1;
            components[idx] = stem;
        }
    }

    components.join(COMPONENT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_path_joins_with_double_colon() {
        assert_eq!(
            unit_id_from_rel_path(Path::new("pkg/sub/UnitA.cppl")),
            "pkg::sub::UnitA"
        );
    }

    #[test]
    fn top_level_unit_has_no_separator() {
        assert_eq!(unit_id_from_rel_path(Path::new("main.cppl")), "main");
    }

    #[test]
    fn only_final_extension_is_stripped() {
        assert_eq!(
            unit_id_from_rel_path(Path::new("pkg.v2/Unit.A.cppl")),
            "pkg.v2::Unit.A"
        );
    }
}
