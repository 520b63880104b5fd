//! External command runner
//!
//! Every external binary (kubectl, oc, helm, minikube, minishift) goes through
//! [`CommandRunner`] so that phases can be exercised without a live cluster.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::DeployError;
use crate::utils::command_line;

/// Default timeout for a single external command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// A command to run: program, arguments and how long it may take
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The full command line, for diagnostics
    pub fn command_line(&self) -> String {
        command_line(&self.program, &self.args)
    }
}

/// Result of a finished (or abandoned) command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed or timed out
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Output of a command that exited with `code`
    pub fn exited(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
        }
    }

    pub fn success(&self) -> bool {
        !self.timed_out && self.code == Some(0)
    }

    /// Turn a timeout or a non-zero exit into the matching error
    pub fn ensure_success(self, spec: &CommandSpec) -> Result<Self, DeployError> {
        if self.timed_out {
            return Err(DeployError::CommandTimeout {
                command: spec.command_line(),
                timeout: spec.timeout,
                stdout: self.stdout,
                stderr: self.stderr,
            });
        }
        if self.code != Some(0) {
            return Err(DeployError::CommandFailed {
                command: spec.command_line(),
                code: self.code.unwrap_or(-1),
                stdout: self.stdout,
                stderr: self.stderr,
            });
        }
        Ok(self)
    }
}

/// Runs external binaries
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command to completion or until its timeout.
    ///
    /// A non-zero exit or a timeout is reported in the output, not as an error.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError>;

    /// Whether `program` can be found on the search path
    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    /// Run the command and fail on timeout or non-zero exit
    async fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError> {
        let output = self.run(spec).await?;
        output.ensure_success(spec)
    }
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DeployError> {
        debug!("Running: {}", spec.command_line());

        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    DeployError::MissingPrerequisite(spec.program.clone())
                }
                _ => DeployError::IoError(e),
            })?;

        // Dropping the pending future on timeout kills the child
        match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let result = CommandOutput {
                    code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
                    timed_out: false,
                };
                debug!("{} exited with {:?}", spec.program, result.code);
                Ok(result)
            }
            Ok(Err(e)) => Err(DeployError::IoError(e)),
            Err(_) => {
                warn!("{} timed out after {:?}", spec.command_line(), spec.timeout);
                Ok(CommandOutput {
                    timed_out: true,
                    ..Default::default()
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_success_passes_zero_exit() {
        let spec = CommandSpec::new("minikube", ["ip"]);
        let output = CommandOutput::exited(0, "192.168.64.34", "");
        assert_eq!(output.ensure_success(&spec).unwrap().stdout, "192.168.64.34");
    }

    #[test]
    fn test_ensure_success_maps_failures() {
        let spec =
            CommandSpec::new("kubectl", ["get", "pods"]).with_timeout(Duration::from_secs(5));

        let err = CommandOutput::exited(1, "", "boom").ensure_success(&spec).unwrap_err();
        assert!(matches!(err, DeployError::CommandFailed { code: 1, .. }));

        let timed_out = CommandOutput {
            timed_out: true,
            ..Default::default()
        };
        let err = timed_out.ensure_success(&spec).unwrap_err();
        assert!(matches!(
            err,
            DeployError::CommandTimeout { timeout, .. } if timeout == Duration::from_secs(5)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_captures_output() {
        let runner = SystemCommandRunner;
        let spec = CommandSpec::new("sh", ["-c", "echo out; echo err >&2; exit 3"]);
        let output = runner.run(&spec).await.unwrap();
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "out");
        assert_eq!(output.stderr, "err");
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_system_runner_times_out() {
        let runner = SystemCommandRunner;
        let spec = CommandSpec::new("sleep", ["5"]).with_timeout(Duration::from_millis(100));
        let output = runner.run(&spec).await.unwrap();
        assert!(output.timed_out);
        assert_eq!(output.code, None);
    }

    #[tokio::test]
    async fn test_missing_binary_is_missing_prerequisite() {
        let runner = SystemCommandRunner;
        let spec = CommandSpec::new("definitely-not-a-real-binary-cheup", Vec::<String>::new());
        let err = runner.run(&spec).await.unwrap_err();
        assert!(matches!(err, DeployError::MissingPrerequisite(_)));
        assert!(!runner.is_available("definitely-not-a-real-binary-cheup"));
    }
}
