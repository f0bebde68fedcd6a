// Execution Engine Module
// Configurations, environment provisioning, the matrix runner and its progress events

pub mod configuration;
pub mod context;
pub mod events;
pub mod provision;
pub mod runner;

// Re-export key types
pub use configuration::{BuildConfiguration, DEFAULT_BASE_DIR};
pub use context::{Environment, RunContext};
pub use events::{progress_channel, ExecutionEvent, LogLevel, ProgressReceiver, ProgressSender};
pub use provision::{Filesystem, LocalFilesystem};
pub use runner::{aggregate_exit_code, BuildRunner, Outcome, RunReport};
