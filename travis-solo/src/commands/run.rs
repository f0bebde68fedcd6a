use crate::output;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use color_eyre::Result;

use solo_service::execution::DEFAULT_BASE_DIR;
use solo_service::{
    progress_channel, Build, BuildRunner, ExecutionEvent, LogLevel, MatrixExpander, RunContext,
    SettingsLoader, ShellExecutor, StepBuilder, SETTINGS_FILE,
};

/// Run the build matrix of a .travis.yml file locally
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Overwrite settings loaded from file with a JSON-encoded object,
    /// e.g. '{"python": "2.7", "env": ["A=a", "A=b"]}'
    #[arg(long, value_name = "JSON")]
    pub overwrite: Option<String>,

    /// Number of configurations to build at once (less than 1 means one per CPU)
    #[arg(
        long,
        short = 'j',
        value_name = "N",
        default_value_t = 1,
        allow_negative_numbers = true
    )]
    pub jobs: i64,

    /// Settings file to load (default: .travis.yml in the current directory)
    #[arg(long, short = 'f', value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Remove existing virtualenvs before provisioning them again
    #[arg(long)]
    pub recreate: bool,

    /// Directory holding the virtualenvs (default: .travis-solo in the current directory)
    #[arg(long, value_name = "DIR")]
    pub base_path: Option<PathBuf>,

    /// Kill any command running longer than this many seconds
    #[arg(long, value_name = "SECS")]
    pub command_timeout: Option<u64>,
}

/// Run the matrix and return the process exit code
pub async fn execute(args: RunArgs) -> Result<i32> {
    let cwd = std::env::current_dir()?;
    let settings_path = args.file.unwrap_or_else(|| cwd.join(SETTINGS_FILE));
    let base_path = args.base_path.unwrap_or_else(|| cwd.join(DEFAULT_BASE_DIR));

    output::status("Loading", &settings_path.display().to_string());
    let settings = SettingsLoader::load_file(&settings_path, args.overwrite.as_deref())?;

    let steps = StepBuilder::build(&settings);
    let configurations = MatrixExpander::new(base_path)
        .with_recreate(args.recreate)
        .expand_settings(&settings)?;
    let jobs = resolve_jobs(args.jobs);

    output::info(&format!(
        "{} configurations, {} steps",
        configurations.len(),
        steps.len()
    ));

    let executor = ShellExecutor::new()
        .with_working_dir(&cwd)
        .with_timeout(args.command_timeout.map(Duration::from_secs));

    let (tx, mut rx) = progress_channel();
    let ctx = RunContext::new(Arc::new(executor)).with_progress(tx);
    let runner = BuildRunner::new(Build::new(steps), ctx);

    // Spawn the matrix in background
    let run_handle = tokio::spawn(async move { runner.run(configurations, jobs).await });

    // Process events in the foreground
    let renderer = EventRenderer {
        prefix_lines: jobs > 1,
    };
    while let Some(event) = rx.recv().await {
        renderer.render(&event);
    }

    let report = run_handle.await?;
    Ok(report.exit_code)
}

/// Jobs requested on the command line; anything below 1 means one per CPU
fn resolve_jobs(jobs: i64) -> usize {
    if jobs < 1 {
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    } else {
        usize::try_from(jobs).unwrap_or(usize::MAX)
    }
}

struct EventRenderer {
    /// Tag every line with its configuration, since output of parallel builds interleaves
    prefix_lines: bool,
}

impl EventRenderer {
    fn prefix(&self, configuration: &str) -> String {
        if self.prefix_lines {
            format!("[{}] ", configuration)
        } else {
            String::new()
        }
    }

    fn render(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunStarted {
                total_configurations,
                concurrency,
            } => {
                output::header(&format!(
                    "Running {} build configurations ({} at a time)",
                    total_configurations, concurrency
                ));
            }

            ExecutionEvent::ConfigurationStarted { configuration } => {
                output::configuration_header(configuration);
            }

            ExecutionEvent::ConfigurationCompleted {
                configuration,
                succeeded,
                duration,
            } => {
                let line = format!(
                    "Build configuration {} {} ({:.2}s)",
                    configuration,
                    if *succeeded { "OK" } else { "FAIL" },
                    duration.as_secs_f64()
                );
                if *succeeded {
                    output::dim_success(&line);
                } else {
                    output::dim_failure(&line);
                }
            }

            ExecutionEvent::CommandStarted {
                configuration,
                command,
                ..
            } => {
                output::command(&self.prefix(configuration), command);
            }

            ExecutionEvent::CommandOutput {
                configuration,
                output,
                is_error,
            } => {
                let prefix = self.prefix(configuration);
                if *is_error {
                    output::step_error(&prefix, output);
                } else {
                    output::step_output(&prefix, output);
                }
            }

            ExecutionEvent::CommandSkipped {
                configuration,
                command,
                reason,
            } => {
                output::warning(&format!(
                    "{}{:?} ignored because it {}",
                    self.prefix(configuration),
                    command,
                    reason
                ));
            }

            ExecutionEvent::StepFailed {
                configuration,
                step_name,
                error,
                suppressed,
            } => {
                let prefix = self.prefix(configuration);
                if *suppressed {
                    output::warning(&format!(
                        "{}{} (ignored, {} is allowed to fail)",
                        prefix, error, step_name
                    ));
                } else {
                    output::failure(&format!("{}{} step failed", prefix, step_name));
                }
            }

            ExecutionEvent::SummaryStarted { .. } => {
                println!();
                output::header("Build summary:");
            }

            ExecutionEvent::Summary {
                configuration,
                succeeded,
                can_fail,
                message,
            } => {
                let suffix = if !*succeeded && *can_fail {
                    " (allowed to fail)"
                } else {
                    ""
                };
                output::summary_line(
                    &format!("{}: {}{}", configuration, message, suffix),
                    *succeeded,
                );
            }

            ExecutionEvent::RunCompleted {
                exit_code,
                duration,
            } => {
                println!();
                if *exit_code == 0 {
                    output::success(&format!(
                        "Build matrix passed in {:.2}s",
                        duration.as_secs_f64()
                    ));
                } else {
                    output::failure(&format!(
                        "Build matrix failed after {:.2}s",
                        duration.as_secs_f64()
                    ));
                }
            }

            ExecutionEvent::Log {
                level,
                message,
                configuration,
            } => {
                let prefix = configuration
                    .as_deref()
                    .map(|c| self.prefix(c))
                    .unwrap_or_default();
                let line = format!("{}{}", prefix, message);
                match level {
                    LogLevel::Error => output::error(&line),
                    LogLevel::Warning => output::warning(&line),
                    LogLevel::Info => output::info(&line),
                }
            }
        }
    }
}
