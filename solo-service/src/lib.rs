// Solo Service Library
// Local build matrix runner for Python projects described by a .travis.yml file

pub mod build;
pub mod error;
pub mod execution;
pub mod matrix;
pub mod runners;
pub mod settings;

// Re-export commonly used types
pub use error::{BuildError, ConfigError, ConfigResult, ExecError, ProvisionError, StepError};

pub use build::{Build, LifecyclePhase, Step, StepBuilder};

pub use matrix::{EnvSetError, EnvironmentSet, MatrixExpander, MatrixRule, Variables};

pub use settings::{Settings, SettingsLoader, SETTINGS_FILE};

// Re-export execution types
pub use execution::{
    progress_channel, BuildConfiguration, BuildRunner, Environment, ExecutionEvent, LogLevel,
    Outcome, ProgressReceiver, ProgressSender, RunContext, RunReport,
};

// Re-export runner types
pub use runners::{OutputCallback, ProcessExecutor, ShellExecutor};
