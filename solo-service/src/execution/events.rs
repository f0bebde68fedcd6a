// Execution Events
// Progress reporting for matrix runs; the CLI renders these as terminal output

use std::time::Duration;
use tokio::sync::mpsc;

/// Sender for execution progress events
pub type ProgressSender = mpsc::UnboundedSender<ExecutionEvent>;

/// Receiver for execution progress events
pub type ProgressReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

/// Create a new progress channel
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Events emitted while running a build matrix
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// Matrix run started
    RunStarted {
        total_configurations: usize,
        concurrency: usize,
    },

    /// All configurations finished and the exit code is known
    RunCompleted { exit_code: i32, duration: Duration },

    /// A configuration started its build
    ConfigurationStarted { configuration: String },

    /// A configuration finished its build
    ConfigurationCompleted {
        configuration: String,
        succeeded: bool,
        duration: Duration,
    },

    /// A command is about to run
    CommandStarted {
        configuration: String,
        step_name: String,
        command: String,
    },

    /// A line of command output (stdout/stderr)
    CommandOutput {
        configuration: String,
        output: String,
        is_error: bool,
    },

    /// A command was not run
    CommandSkipped {
        configuration: String,
        command: String,
        reason: String,
    },

    /// A step failed; `suppressed` steps do not fail the configuration
    StepFailed {
        configuration: String,
        step_name: String,
        error: String,
        suppressed: bool,
    },

    /// Emitted once before the summary lines
    SummaryStarted { total_outcomes: usize },

    /// One summary line per configuration
    Summary {
        configuration: String,
        succeeded: bool,
        can_fail: bool,
        message: String,
    },

    /// Log message (info, warning, error)
    Log {
        level: LogLevel,
        message: String,
        configuration: Option<String>,
    },
}

/// Log level for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl ExecutionEvent {
    /// Create a run started event
    pub fn run_started(total_configurations: usize, concurrency: usize) -> Self {
        Self::RunStarted {
            total_configurations,
            concurrency,
        }
    }

    /// Create a run completed event
    pub fn run_completed(exit_code: i32, duration: Duration) -> Self {
        Self::RunCompleted {
            exit_code,
            duration,
        }
    }

    pub fn configuration_started(configuration: impl Into<String>) -> Self {
        Self::ConfigurationStarted {
            configuration: configuration.into(),
        }
    }

    pub fn configuration_completed(
        configuration: impl Into<String>,
        succeeded: bool,
        duration: Duration,
    ) -> Self {
        Self::ConfigurationCompleted {
            configuration: configuration.into(),
            succeeded,
            duration,
        }
    }

    pub fn command_started(
        configuration: impl Into<String>,
        step_name: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self::CommandStarted {
            configuration: configuration.into(),
            step_name: step_name.into(),
            command: command.into(),
        }
    }

    pub fn command_output(
        configuration: impl Into<String>,
        output: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self::CommandOutput {
            configuration: configuration.into(),
            output: output.into(),
            is_error,
        }
    }

    pub fn command_skipped(
        configuration: impl Into<String>,
        command: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CommandSkipped {
            configuration: configuration.into(),
            command: command.into(),
            reason: reason.into(),
        }
    }

    pub fn step_failed(
        configuration: impl Into<String>,
        step_name: impl Into<String>,
        error: impl Into<String>,
        suppressed: bool,
    ) -> Self {
        Self::StepFailed {
            configuration: configuration.into(),
            step_name: step_name.into(),
            error: error.into(),
            suppressed,
        }
    }

    /// Create an info log event
    pub fn info(message: impl Into<String>, configuration: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Info,
            message: message.into(),
            configuration,
        }
    }

    /// Create a warning log event
    pub fn warning(message: impl Into<String>, configuration: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Warning,
            message: message.into(),
            configuration,
        }
    }

    /// Create an error log event
    pub fn error(message: impl Into<String>, configuration: Option<String>) -> Self {
        Self::Log {
            level: LogLevel::Error,
            message: message.into(),
            configuration,
        }
    }
}

/// Helper trait for sending events, ignoring errors (fire-and-forget)
pub trait EventSender {
    fn send_event(&self, event: ExecutionEvent);
}

impl EventSender for ProgressSender {
    fn send_event(&self, event: ExecutionEvent) {
        let _ = self.send(event);
    }
}

impl EventSender for Option<ProgressSender> {
    fn send_event(&self, event: ExecutionEvent) {
        if let Some(sender) = self {
            let _ = sender.send(event);
        }
    }
}
