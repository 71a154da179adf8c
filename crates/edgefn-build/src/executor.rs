use std::process::Stdio;

use tokio_util::sync::CancellationToken;

/// Captured output of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Abstraction over external command execution for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[allow(async_fn_in_trait)]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` to completion, capturing stdout and stderr.
    ///
    /// Cancelling `cancel` kills the child and returns [`ExecError::Cancelled`].
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError>;
}

/// Real process executor backed by `tokio::process`.
pub struct RealExecutor;

impl CommandExecutor for RealExecutor {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError> {
        tracing::debug!(program, ?args, "running command");

        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::NotFound {
                program: program.to_owned(),
                source: e,
            })?;

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            output = child.wait_with_output() => output.map_err(|e| ExecError::Wait {
                program: program.to_owned(),
                source: e,
            })?,
            () = cancel.cancelled() => {
                return Err(ExecError::Cancelled {
                    program: program.to_owned(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            Ok(CommandOutput { stdout, stderr })
        } else {
            Err(ExecError::Failed {
                program: program.to_owned(),
                status: output.status.to_string(),
                stdout,
                stderr,
            })
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("{program} not found or not executable")]
    NotFound {
        program: String,
        source: std::io::Error,
    },

    #[error("failed waiting for {program}")]
    Wait {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {status}\n{stderr}")]
    Failed {
        program: String,
        status: String,
        stdout: String,
        stderr: String,
    },

    #[error("{program} was cancelled")]
    Cancelled { program: String },
}
