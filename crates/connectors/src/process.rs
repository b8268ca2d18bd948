//! Subprocess runner shared by the metadata tool and command backends.
//!
//! Spawns a program with an argument vector (no shell), captures stdout and
//! stderr, and kills the child if the timeout fires.

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::ConnectorError;

/// Captured output of a finished process
#[derive(Debug)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub success: bool,
}

/// Run `program args...` and wait for it, up to `timeout`.
pub async fn run<I, S>(
    program: &OsStr,
    args: I,
    timeout: Duration,
) -> Result<ProcessOutput, ConnectorError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = program.to_string_lossy().into_owned();
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ConnectorError::SpawnError {
            program: name.clone(),
            source,
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(ConnectorError::Timeout {
                program: name,
                secs: timeout.as_secs(),
            })
        }
    };

    debug!(
        component = "process",
        event = "process.exited",
        program = %name,
        exit_code = ?output.status.code(),
        "Subprocess exited"
    );

    Ok(ProcessOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code(),
        success: output.status.success(),
    })
}

impl ProcessOutput {
    /// Turn a non-zero exit into `ProcessFailed`.
    pub fn check(self, program: &str) -> Result<Self, ConnectorError> {
        if self.success {
            return Ok(self);
        }
        Err(ConnectorError::ProcessFailed {
            program: program.to_string(),
            code: self.exit_code,
            stderr: self.stderr.trim().to_string(),
        })
    }
}
