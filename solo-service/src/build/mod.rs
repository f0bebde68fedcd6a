// Build Steps
// Lifecycle phases read from settings and the sequential step runner

use crate::error::StepError;
use crate::execution::context::{Environment, RunContext};
use crate::execution::events::ExecutionEvent;
use crate::settings::Settings;

use tracing::{debug, warn};

/// The fixed lifecycle of a build, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    BeforeInstall,
    Install,
    BeforeScript,
    Script,
    AfterScript,
}

impl LifecyclePhase {
    pub const ALL: [LifecyclePhase; 5] = [
        LifecyclePhase::BeforeInstall,
        LifecyclePhase::Install,
        LifecyclePhase::BeforeScript,
        LifecyclePhase::Script,
        LifecyclePhase::AfterScript,
    ];

    /// Settings key of the phase
    pub fn name(&self) -> &'static str {
        match self {
            LifecyclePhase::BeforeInstall => "before_install",
            LifecyclePhase::Install => "install",
            LifecyclePhase::BeforeScript => "before_script",
            LifecyclePhase::Script => "script",
            LifecyclePhase::AfterScript => "after_script",
        }
    }

    /// Only after_script failures leave the build green
    pub fn can_fail(&self) -> bool {
        matches!(self, LifecyclePhase::AfterScript)
    }
}

/// A named list of shell commands run in order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    pub name: String,
    pub commands: Vec<String>,
    pub can_fail: bool,
}

impl Step {
    pub fn new(name: impl Into<String>, commands: Vec<String>, can_fail: bool) -> Self {
        Self {
            name: name.into(),
            commands,
            can_fail,
        }
    }

    /// Run every command of the step with `env`.
    ///
    /// The first failing command stops the step. The failure is returned
    /// unless the step may fail, in which case it is only reported.
    pub async fn perform(
        &self,
        ctx: &RunContext,
        configuration: &str,
        env: &Environment,
    ) -> Result<(), StepError> {
        let result = self.execute_commands(ctx, configuration, env).await;

        let Err(err) = result else {
            return Ok(());
        };

        ctx.send_event(ExecutionEvent::step_failed(
            configuration,
            self.name.as_str(),
            err.to_string(),
            self.can_fail,
        ));

        if self.can_fail {
            warn!(configuration, step = %self.name, error = %err, "step failure ignored");
            Ok(())
        } else {
            Err(err)
        }
    }

    async fn execute_commands(
        &self,
        ctx: &RunContext,
        configuration: &str,
        env: &Environment,
    ) -> Result<(), StepError> {
        for command in &self.commands {
            if command.starts_with("sudo") {
                warn!(configuration, command = %command, "ignoring sudo command");
                ctx.send_event(ExecutionEvent::command_skipped(
                    configuration,
                    command.as_str(),
                    "contains sudo reference",
                ));
                continue;
            }

            ctx.send_event(ExecutionEvent::command_started(
                configuration,
                self.name.as_str(),
                command.as_str(),
            ));
            debug!(configuration, step = %self.name, command = %command, "running command");

            ctx.executor
                .execute(command, env.as_map(), ctx.output_callback(configuration))
                .await
                .map_err(|source| StepError {
                    step: self.name.clone(),
                    source,
                })?;
        }
        Ok(())
    }
}

/// Turns the lifecycle section of the settings into steps
pub struct StepBuilder;

impl StepBuilder {
    /// One step per non-empty lifecycle phase, always in lifecycle order
    pub fn build(settings: &Settings) -> Vec<Step> {
        LifecyclePhase::ALL
            .iter()
            .filter_map(|phase| {
                let commands = settings.commands(phase.name());
                if commands.is_empty() {
                    None
                } else {
                    Some(Step::new(phase.name(), commands.to_vec(), phase.can_fail()))
                }
            })
            .collect()
    }
}

/// The steps every configuration runs, shared by all of them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Build {
    pub steps: Vec<Step>,
}

impl Build {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    /// Perform the steps in order, stopping at the first step that fails
    pub async fn run(
        &self,
        ctx: &RunContext,
        configuration: &str,
        env: &Environment,
    ) -> Result<(), StepError> {
        for step in &self.steps {
            step.perform(ctx, configuration, env).await?;
        }
        Ok(())
    }
}
