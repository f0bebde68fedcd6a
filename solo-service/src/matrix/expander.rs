// Build Matrix Expansion
// Expands version and environment axes into concrete build configurations

use crate::error::{ConfigError, ConfigResult};
use crate::execution::configuration::{BuildConfiguration, DEFAULT_BASE_DIR};
use crate::matrix::env_set::{EnvironmentSet, Variables};
use crate::settings::{RuleSettings, Settings};

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

/// One `(version, env)` entry of an include, exclude or allow-failure list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatrixRule {
    pub version: String,
    pub env: EnvironmentSet,
}

impl MatrixRule {
    pub fn new(version: impl Into<String>, env: EnvironmentSet) -> Self {
        Self {
            version: version.into(),
            env,
        }
    }

    fn variables(&self) -> Variables {
        self.env.to_variables()
    }
}

/// Expander for the build matrix
#[derive(Debug, Clone)]
pub struct MatrixExpander {
    base_path: PathBuf,
    recreate: bool,
}

impl Default for MatrixExpander {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DIR)
    }
}

impl MatrixExpander {
    /// Configurations will keep their virtualenvs under `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            recreate: false,
        }
    }

    pub fn with_recreate(mut self, recreate: bool) -> Self {
        self.recreate = recreate;
        self
    }

    /// Expand the matrix.
    ///
    /// The base matrix is every version combined with every environment set,
    /// versions outermost. Include rules then append missing cells, exclude
    /// rules remove the first matching cell and allow-failure rules tag
    /// matching cells in place. Rules that match nothing are ignored.
    pub fn expand(
        &self,
        versions: &[String],
        env_sets: &[EnvironmentSet],
        include: &[MatrixRule],
        exclude: &[MatrixRule],
        allow_failures: &[MatrixRule],
    ) -> Vec<BuildConfiguration> {
        let mut cells: Vec<(String, Variables)> = Vec::new();

        for version in versions {
            for env in env_sets {
                push_unique(&mut cells, version.clone(), env.to_variables());
            }
        }

        for rule in include {
            push_unique(&mut cells, rule.version.clone(), rule.variables());
        }

        for rule in exclude {
            let variables = rule.variables();
            match cells
                .iter()
                .position(|(v, vars)| *v == rule.version && *vars == variables)
            {
                Some(index) => {
                    cells.remove(index);
                }
                None => debug!(version = %rule.version, "exclude rule matches no configuration"),
            }
        }

        let mut configurations: Vec<BuildConfiguration> = cells
            .into_iter()
            .map(|(version, variables)| {
                BuildConfiguration::new(version, variables)
                    .with_base_path(self.base_path.clone())
                    .with_recreate(self.recreate)
            })
            .collect();

        for rule in allow_failures {
            let variables = rule.variables();
            for configuration in configurations
                .iter_mut()
                .filter(|c| c.matches(&rule.version, &variables))
            {
                configuration.can_fail = true;
            }
        }

        configurations
    }

    /// Read the matrix from settings and expand it.
    ///
    /// Fails before anything runs when the language is not Python or an
    /// environment string cannot be parsed.
    pub fn expand_settings(&self, settings: &Settings) -> ConfigResult<Vec<BuildConfiguration>> {
        settings.ensure_supported_language()?;

        let versions = settings.versions();
        let env_sets = settings.env_sets()?;
        let matrix = settings.matrix();

        let include = rules(&matrix.include, "include")?;
        let exclude = rules(&matrix.exclude, "exclude")?;
        let allow_failures: Vec<MatrixRule> = matrix
            .allow_failures
            .iter()
            .filter_map(|rule| parse_rule(rule, "allow_failures").transpose())
            .collect::<ConfigResult<_>>()?;

        let configurations =
            self.expand(&versions, &env_sets, &include, &exclude, &allow_failures);
        debug!(count = configurations.len(), "expanded build matrix");
        Ok(configurations)
    }

    /// Groups of configurations that would share a virtualenv directory
    pub fn path_collisions(configurations: &[BuildConfiguration]) -> Vec<(String, Vec<String>)> {
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();

        for configuration in configurations {
            let sanitized = configuration.sanitized_name();
            let names = groups.entry(sanitized.clone()).or_insert_with(|| {
                order.push(sanitized);
                Vec::new()
            });
            names.push(configuration.display_name());
        }

        order
            .into_iter()
            .filter_map(|sanitized| {
                let names = groups.remove(&sanitized)?;
                (names.len() > 1).then_some((sanitized, names))
            })
            .collect()
    }
}

fn push_unique(cells: &mut Vec<(String, Variables)>, version: String, variables: Variables) {
    if !cells
        .iter()
        .any(|(v, vars)| *v == version && *vars == variables)
    {
        cells.push((version, variables));
    }
}

fn rules(settings: &[RuleSettings], section: &str) -> ConfigResult<Vec<MatrixRule>> {
    settings
        .iter()
        .map(|rule| {
            parse_rule(rule, section)?.ok_or_else(|| {
                ConfigError::Schema(format!("every matrix.{} entry needs a python version", section))
            })
        })
        .collect()
}

/// `None` when the rule names no python version
fn parse_rule(rule: &RuleSettings, section: &str) -> ConfigResult<Option<MatrixRule>> {
    let Some(version) = &rule.python else {
        debug!(section, "matrix rule without python version");
        return Ok(None);
    };

    let env = match &rule.env {
        Some(text) => EnvironmentSet::parse(text.as_str())?,
        None => EnvironmentSet::new(),
    };
    Ok(Some(MatrixRule::new(version.as_str(), env)))
}
