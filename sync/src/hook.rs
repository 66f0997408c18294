//! Running the on-change command.

use std::process::Stdio;

use tokio::process::Command;
use tracing::info;

use crate::error::HookError;

/// Runs a mapping's on-change command to completion.
///
/// The caller awaits every run before reconciling again, so a mapping never
/// has more than one child process alive however fast its keys change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookInvoker {
    program: String,
    args: Vec<String>,
}

impl HookInvoker {
    /// Create an invoker. Returns `None` for an empty command.
    pub fn new(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// The command line, for logging.
    pub fn command_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the command with inherited output and wait for it to exit.
    pub async fn run(&self) -> Result<(), HookError> {
        let command = self.command_line();
        info!("Running on-change command: {command}");

        let status = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| HookError::Launch {
                command: command.clone(),
                source,
            })?;

        if !status.success() {
            return Err(HookError::Exit { command, status });
        }

        info!("On-change command finished: {status}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn command(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_command_has_no_invoker() {
        assert_eq!(HookInvoker::new(&[]), None);
    }

    #[test]
    fn test_command_line() {
        let hook = HookInvoker::new(&command(&["nginx", "-s", "reload"])).unwrap();
        assert_eq!(hook.command_line(), "nginx -s reload");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_command() {
        let hook = HookInvoker::new(&command(&["true"])).unwrap();
        assert!(hook.run().await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_command() {
        let hook = HookInvoker::new(&command(&["sh", "-c", "exit 3"])).unwrap();
        match hook.run().await {
            Err(HookError::Exit { status, .. }) => assert_eq!(status.code(), Some(3)),
            other => panic!("expected exit error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let hook = HookInvoker::new(&command(&["/nonexistent/fsconsul-hook"])).unwrap();
        assert!(matches!(hook.run().await, Err(HookError::Launch { .. })));
    }
}
