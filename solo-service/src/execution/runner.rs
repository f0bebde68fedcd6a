// Build Runner
// Runs every configuration of the matrix, sequentially or on a bounded pool

use crate::build::Build;
use crate::error::BuildError;
use crate::execution::configuration::BuildConfiguration;
use crate::execution::context::RunContext;
use crate::execution::events::ExecutionEvent;
use crate::matrix::MatrixExpander;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Message recorded for a configuration whose build passed
pub const SUCCESS_MESSAGE: &str = "Build succeeded";

/// Result of running one configuration
#[derive(Debug)]
pub struct Outcome {
    pub configuration: BuildConfiguration,
    pub error: Option<BuildError>,
}

impl Outcome {
    pub fn new(configuration: BuildConfiguration, result: Result<(), BuildError>) -> Self {
        Self {
            configuration,
            error: result.err(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Summary text: the success message or the error
    pub fn message(&self) -> String {
        match &self.error {
            None => SUCCESS_MESSAGE.to_string(),
            Some(err) => err.to_string(),
        }
    }
}

/// Everything a matrix run produced
#[derive(Debug)]
pub struct RunReport {
    /// One outcome per configuration, in configuration order
    pub outcomes: Vec<Outcome>,
    pub exit_code: i32,
    pub duration: Duration,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// 0 when every configuration that is not allowed to fail succeeded, 1 otherwise
pub fn aggregate_exit_code(outcomes: &[Outcome]) -> i32 {
    let passed = outcomes
        .iter()
        .filter(|o| !o.configuration.can_fail)
        .all(Outcome::succeeded);
    if passed {
        0
    } else {
        1
    }
}

/// Runs a shared build against many configurations
pub struct BuildRunner {
    build: Arc<Build>,
    ctx: RunContext,
}

impl BuildRunner {
    pub fn new(build: Build, ctx: RunContext) -> Self {
        Self {
            build: Arc::new(build),
            ctx,
        }
    }

    /// Run every configuration and summarize.
    ///
    /// With a concurrency of 1 configurations run one after another in list
    /// order; otherwise at most `concurrency` run at once. A failing
    /// configuration never affects its siblings. The summary is emitted once
    /// every configuration has finished.
    pub async fn run(
        &self,
        configurations: Vec<BuildConfiguration>,
        concurrency: usize,
    ) -> RunReport {
        let start = Instant::now();
        let concurrency = concurrency.min(configurations.len()).max(1);

        self.ctx.send_event(ExecutionEvent::run_started(
            configurations.len(),
            concurrency,
        ));
        info!(
            configurations = configurations.len(),
            concurrency, "starting build matrix"
        );
        self.warn_about_collisions(&configurations);

        let outcomes = if concurrency == 1 || configurations.len() <= 1 {
            self.run_sequential(configurations).await
        } else {
            self.run_parallel(configurations, concurrency).await
        };

        self.summarize(&outcomes);

        let exit_code = aggregate_exit_code(&outcomes);
        let duration = start.elapsed();
        self.ctx
            .send_event(ExecutionEvent::run_completed(exit_code, duration));

        RunReport {
            outcomes,
            exit_code,
            duration,
        }
    }

    async fn run_sequential(&self, configurations: Vec<BuildConfiguration>) -> Vec<Outcome> {
        let mut outcomes = Vec::with_capacity(configurations.len());
        for configuration in configurations {
            let fallback = configuration.clone();
            let build = Arc::clone(&self.build);
            let ctx = self.ctx.clone();

            let joined =
                tokio::spawn(async move { run_one(configuration, &build, &ctx).await }).await;
            outcomes.push(match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "build task panicked");
                    self.panicked(fallback)
                }
            });
        }
        outcomes
    }

    async fn run_parallel(
        &self,
        configurations: Vec<BuildConfiguration>,
        concurrency: usize,
    ) -> Vec<Outcome> {
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut join_set = JoinSet::new();
        let mut slots: Vec<Option<Outcome>> = configurations.iter().map(|_| None).collect();
        let fallbacks = configurations.clone();

        for (index, configuration) in configurations.into_iter().enumerate() {
            let build = Arc::clone(&self.build);
            let ctx = self.ctx.clone();
            let semaphore = Arc::clone(&semaphore);

            join_set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => run_one(configuration, &build, &ctx).await,
                    Err(_) => Outcome::new(
                        configuration,
                        Err(BuildError::Aborted("worker pool closed".to_string())),
                    ),
                };
                (index, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => error!(error = %e, "build task panicked"),
            }
        }

        slots
            .into_iter()
            .zip(fallbacks)
            .map(|(slot, configuration)| slot.unwrap_or_else(|| self.panicked(configuration)))
            .collect()
    }

    /// Failed outcome for a configuration whose build task panicked
    fn panicked(&self, configuration: BuildConfiguration) -> Outcome {
        let name = configuration.display_name();
        self.ctx.send_event(ExecutionEvent::configuration_completed(
            name.as_str(),
            false,
            Duration::ZERO,
        ));
        Outcome::new(
            configuration,
            Err(BuildError::Aborted(format!("build task for {} panicked", name))),
        )
    }

    fn warn_about_collisions(&self, configurations: &[BuildConfiguration]) {
        for (sanitized, names) in MatrixExpander::path_collisions(configurations) {
            let message = format!(
                "configurations {} share the virtualenv directory {}",
                names.join(" and "),
                sanitized
            );
            warn!(directory = %sanitized, "{}", message);
            self.ctx.send_event(ExecutionEvent::warning(message, None));
        }
    }

    fn summarize(&self, outcomes: &[Outcome]) {
        self.ctx.send_event(ExecutionEvent::SummaryStarted {
            total_outcomes: outcomes.len(),
        });
        for outcome in outcomes {
            self.ctx.send_event(ExecutionEvent::Summary {
                configuration: outcome.configuration.display_name(),
                succeeded: outcome.succeeded(),
                can_fail: outcome.configuration.can_fail,
                message: outcome.message(),
            });
        }
    }
}

async fn run_one(
    mut configuration: BuildConfiguration,
    build: &Build,
    ctx: &RunContext,
) -> Outcome {
    let start = Instant::now();
    let result = configuration.run_build(build, ctx).await;

    ctx.send_event(ExecutionEvent::configuration_completed(
        configuration.display_name(),
        result.is_ok(),
        start.elapsed(),
    ));

    Outcome::new(configuration, result)
}
