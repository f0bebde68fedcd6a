// Runners Module
// Process execution behind a trait so builds can run against fakes

pub mod shell;

#[cfg(test)]
pub(crate) mod recording;

pub use shell::ShellExecutor;

use crate::error::ExecError;

use std::collections::HashMap;

/// Callback for handling output lines in real-time (`line`, `is_stderr`)
pub type OutputCallback = Box<dyn Fn(&str, bool) + Send + Sync>;

/// Runs shell command lines on behalf of a build configuration
#[async_trait::async_trait]
pub trait ProcessExecutor: Send + Sync {
    /// Run `command_line` under a shell with exactly the given environment.
    ///
    /// Returns an error when the shell cannot be launched, when the command
    /// exits with a non-zero status, or when it times out.
    async fn execute(
        &self,
        command_line: &str,
        env: &HashMap<String, String>,
        on_output: Option<OutputCallback>,
    ) -> Result<(), ExecError>;
}
