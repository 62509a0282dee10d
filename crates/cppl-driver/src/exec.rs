//! Child-process execution.
//!
//! The coordinator only ever observes an exit code and captured stderr;
//! everything else the front-end communicates arrives through artifact and
//! meta files. The trait seam lets tests substitute a fake front-end and
//! lets `--dry-run` print commands without running anything.

use std::io::Read;
use std::process::{Command, Stdio};
use tracing::info;

use crate::commands::CommandInfo;

/// What a finished child process reported.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub exit_code: i32,
    pub stderr: String,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn ok() -> Self {
        Self {
            exit_code: 0,
            stderr: String::new(),
        }
    }
}

/// Runs assembled commands.
pub trait Executor: Send + Sync {
    fn execute(&self, command: &CommandInfo) -> std::io::Result<ExecOutcome>;
}

/// Spawns real child processes.
pub struct ProcessExecutor;

impl Executor for ProcessExecutor {
    fn execute(&self, command: &CommandInfo) -> std::io::Result<ExecOutcome> {
        let mut child = Command::new(command.program())
            .args(command.exec_args())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stderr = String::new();
        if let Some(pipe) = child.stderr.as_mut() {
            pipe.read_to_string(&mut stderr)?;
        }

        let status = child.wait()?;
        Ok(ExecOutcome {
            exit_code: status.code().unwrap_or(-1),
            stderr,
        })
    }
}

/// Prints each command and reports success without running it.
pub struct DryRunExecutor;

impl Executor for DryRunExecutor {
    fn execute(&self, command: &CommandInfo) -> std::io::Result<ExecOutcome> {
        info!("{}", command.render());
        Ok(ExecOutcome::ok())
    }
}
