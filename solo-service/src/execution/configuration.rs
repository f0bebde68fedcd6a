// Build Configuration
// One cell of the build matrix: a Python version plus its environment variables

use crate::build::Build;
use crate::error::BuildError;
use crate::execution::context::{Environment, RunContext};
use crate::execution::events::ExecutionEvent;
use crate::execution::provision::{interpreter_for, prepare_virtualenv};
use crate::matrix::env_set::Variables;

use std::fmt;
use std::path::PathBuf;

use tracing::{error, info};

/// Directory, relative to the project, holding every configuration's virtualenv
pub const DEFAULT_BASE_DIR: &str = ".travis-solo";

/// Set by macOS framework Python; leaks the outer interpreter into the virtualenv
const PYVENV_LAUNCHER: &str = "__PYVENV_LAUNCHER__";

/// A concrete build configuration produced by matrix expansion.
///
/// Identity is `(version, variables)`. `can_fail` is a tag set by
/// allow-failure rules and plays no part in matching.
#[derive(Debug, Clone)]
pub struct BuildConfiguration {
    pub version: String,
    pub variables: Variables,
    pub can_fail: bool,
    pub base_path: PathBuf,
    pub recreate: bool,
    environ: Environment,
}

impl BuildConfiguration {
    /// Create a configuration with a snapshot of the current process environment
    pub fn new(version: impl Into<String>, variables: Variables) -> Self {
        Self {
            version: version.into(),
            variables,
            can_fail: false,
            base_path: PathBuf::from(DEFAULT_BASE_DIR),
            recreate: false,
            environ: Environment::from_current(),
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Remove an existing virtualenv before provisioning
    pub fn with_recreate(mut self, recreate: bool) -> Self {
        self.recreate = recreate;
        self
    }

    pub fn with_can_fail(mut self, can_fail: bool) -> Self {
        self.can_fail = can_fail;
        self
    }

    /// Replace the environment snapshot
    pub fn with_environment(mut self, environ: Environment) -> Self {
        self.environ = environ;
        self
    }

    pub fn environment(&self) -> &Environment {
        &self.environ
    }

    /// Whether this configuration is the matrix cell `(version, variables)`
    pub fn matches(&self, version: &str, variables: &Variables) -> bool {
        self.version == version && self.variables == *variables
    }

    /// Version, followed by the variables in parentheses when there are any
    pub fn display_name(&self) -> String {
        if self.variables.is_empty() {
            self.version.clone()
        } else {
            format!("{} ({})", self.version, self.variables)
        }
    }

    /// Display name made safe for use as a directory name
    pub fn sanitized_name(&self) -> String {
        self.display_name()
            .chars()
            .map(|c| match c {
                ',' | '(' | ')' => '_',
                c if c.is_whitespace() => '_',
                c => c,
            })
            .collect()
    }

    pub fn virtualenv_path(&self) -> PathBuf {
        self.base_path.join(self.sanitized_name())
    }

    pub fn interpreter(&self) -> String {
        interpreter_for(&self.version)
    }

    /// Point the snapshot at the virtualenv and export the CI variables
    pub fn prepare_environment(&mut self) {
        let bin = self.virtualenv_path().join("bin");
        self.environ.prepend_path(&bin);
        self.environ.remove(PYVENV_LAUNCHER);

        for name in ["CI", "TRAVIS", "TRAVIS_SOLO"] {
            self.environ.set(name, "true");
        }
        self.environ.set("TRAVIS_PYTHON_VERSION", self.version.as_str());

        for (name, value) in self.variables.iter() {
            self.environ.set(name, value);
        }
    }

    /// Provision the virtualenv and run every step of `build` in it.
    ///
    /// The environment snapshot is back to its previous contents when this
    /// returns, whether the build passed or not.
    pub async fn run_build(&mut self, build: &Build, ctx: &RunContext) -> Result<(), BuildError> {
        let name = self.display_name();
        let original = self.environ.clone();

        ctx.send_event(ExecutionEvent::configuration_started(name.as_str()));
        ctx.send_event(ExecutionEvent::info(
            "Preparing the environment",
            Some(name.clone()),
        ));
        info!(configuration = %name, "build configuration running");

        let result = self.build_in_virtualenv(build, ctx, &name).await;
        self.environ = original;

        if let Err(err) = &result {
            error!(configuration = %name, error = %err, "build configuration failed");
            ctx.send_event(ExecutionEvent::error(err.to_string(), Some(name)));
        }
        result
    }

    async fn build_in_virtualenv(
        &mut self,
        build: &Build,
        ctx: &RunContext,
        name: &str,
    ) -> Result<(), BuildError> {
        let path = self.virtualenv_path();
        prepare_virtualenv(
            ctx,
            name,
            &self.interpreter(),
            &path,
            self.recreate,
            &self.environ,
        )
        .await?;

        self.prepare_environment();
        build.run(ctx, name, &self.environ).await?;
        Ok(())
    }
}

impl PartialEq for BuildConfiguration {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.version, &other.variables)
    }
}

impl Eq for BuildConfiguration {}

impl fmt::Display for BuildConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::build::Step;
    use crate::runners::recording::RecordingExecutor;

    use std::sync::Arc;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn configuration(version: &str, pairs: &[(&str, &str)]) -> BuildConfiguration {
        BuildConfiguration::new(version, vars(pairs))
            .with_base_path("/project/.travis-solo")
            .with_environment(Environment::from_vars([
                ("PATH", "/usr/bin"),
                ("HOME", "/home/user"),
                (PYVENV_LAUNCHER, "/usr/bin/python"),
            ]))
    }

    fn build() -> Build {
        Build::new(vec![
            Step::new("install", vec!["pip install .".to_string()], false),
            Step::new("script", vec!["nosetests".to_string()], false),
        ])
    }

    #[test]
    fn test_display_and_sanitized_names() {
        let plain = configuration("2.7", &[]);
        assert_eq!(plain.display_name(), "2.7");
        assert_eq!(plain.sanitized_name(), "2.7");

        let with_vars = configuration("3.3", &[("A", "a"), ("B", "x y")]);
        assert_eq!(with_vars.display_name(), "3.3 (A=a, B=x y)");
        assert_eq!(with_vars.sanitized_name(), "3.3__A=a__B=x_y_");
        assert_eq!(
            with_vars.virtualenv_path(),
            PathBuf::from("/project/.travis-solo/3.3__A=a__B=x_y_")
        );
    }

    #[test]
    fn test_interpreter() {
        assert_eq!(configuration("2.7", &[]).interpreter(), "python2.7");
        assert_eq!(configuration("pypy", &[]).interpreter(), "pypy");
    }

    #[test]
    fn test_identity_ignores_can_fail_and_variable_order() {
        let a = configuration("2.7", &[("A", "a"), ("B", "b")]);
        let b = configuration("2.7", &[("B", "b"), ("A", "a")]).with_can_fail(true);
        assert_eq!(a, b);
        assert_ne!(a, configuration("3.3", &[("A", "a"), ("B", "b")]));
    }

    #[test]
    fn test_prepare_environment() {
        let mut config = configuration("3.3", &[("A", "a"), ("PATH", "/override")]);
        config.prepare_environment();

        let env = config.environment();
        assert_eq!(env.get("CI"), Some("true"));
        assert_eq!(env.get("TRAVIS"), Some("true"));
        assert_eq!(env.get("TRAVIS_SOLO"), Some("true"));
        assert_eq!(env.get("TRAVIS_PYTHON_VERSION"), Some("3.3"));
        assert_eq!(env.get("A"), Some("a"));
        assert_eq!(env.get(PYVENV_LAUNCHER), None);
        assert_eq!(env.get("PATH"), Some("/override"));
    }

    #[tokio::test]
    async fn test_commands_see_prepared_environment() {
        let executor = Arc::new(RecordingExecutor::new());
        let ctx = RunContext::new(executor.clone());
        let mut config = configuration("2.7", &[("A", "a")]);

        config.run_build(&build(), &ctx).await.unwrap();

        let calls = executor.calls();
        assert_eq!(
            executor.commands(),
            vec![
                "virtualenv --distribute --python=python2.7 /project/.travis-solo/2.7__A=a_",
                "pip install .",
                "nosetests",
            ]
        );

        // virtualenv itself runs with the untouched snapshot
        assert_eq!(calls[0].env.get("CI"), None);
        assert!(calls[0].env.contains_key(PYVENV_LAUNCHER));

        let step_env = &calls[1].env;
        assert_eq!(step_env.get("CI").map(String::as_str), Some("true"));
        assert_eq!(step_env.get("A").map(String::as_str), Some("a"));
        assert!(!step_env.contains_key(PYVENV_LAUNCHER));
        let first_path_entry = step_env["PATH"].split(':').next().unwrap();
        assert_eq!(first_path_entry, "/project/.travis-solo/2.7__A=a_/bin");
    }

    #[tokio::test]
    async fn test_environment_restored_after_success() {
        let ctx = RunContext::new(Arc::new(RecordingExecutor::new()));
        let mut config = configuration("2.7", &[("A", "a")]);
        let before = config.environment().clone();

        config.run_build(&build(), &ctx).await.unwrap();

        assert_eq!(config.environment(), &before);
    }

    #[tokio::test]
    async fn test_environment_restored_after_failure() {
        let ctx = RunContext::new(Arc::new(RecordingExecutor::new().fail_with("nosetests", 1)));
        let mut config = configuration("2.7", &[("A", "a")]);
        let before = config.environment().clone();

        let err = config.run_build(&build(), &ctx).await.unwrap_err();

        assert!(matches!(err, BuildError::Step(ref e) if e.step == "script"));
        assert_eq!(config.environment(), &before);
        assert_eq!(config.environment().len(), before.len());
        assert_eq!(config.environment().get("CI"), None);
    }

    #[tokio::test]
    async fn test_provisioning_failure_skips_steps() {
        let executor = Arc::new(RecordingExecutor::new().fail_with("virtualenv", 3));
        let ctx = RunContext::new(executor.clone());
        let mut config = configuration("9.9", &[]);

        let err = config.run_build(&build(), &ctx).await.unwrap_err();

        assert_eq!(err.to_string(), "interpreter not found: python9.9");
        assert_eq!(executor.commands().len(), 1);
    }
}
