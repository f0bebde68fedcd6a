// Service Error Types
// Error taxonomy for settings loading, provisioning, and build execution

use std::path::PathBuf;

use thiserror::Error;

use crate::matrix::env_set::EnvSetError;

/// Result type for settings loading and matrix expansion
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Fatal errors raised while discovering configurations, before anything runs
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("settings file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {line}:{column}: {message}")]
    Yaml {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("invalid --overwrite value: {0}")]
    Overwrite(String),

    #[error("invalid settings: {0}")]
    Schema(String),

    #[error("only Python projects are supported right now (language: {0:?})")]
    UnsupportedLanguage(String),

    #[error(transparent)]
    EnvSet(#[from] EnvSetError),
}

impl ConfigError {
    /// Build a YAML error, keeping the location reported by serde_yaml
    pub fn from_yaml_error(err: &serde_yaml::Error) -> Self {
        let (line, column) = err
            .location()
            .map(|loc| (loc.line(), loc.column()))
            .unwrap_or((1, 1));

        ConfigError::Yaml {
            message: err.to_string(),
            line,
            column,
        }
    }
}

/// Failure reported by the process-execution collaborator
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to launch '{command}': {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command '{command}' returned non-zero exit status {}", display_code(.code))]
    Exit { command: String, code: Option<i32> },

    #[error("command '{command}' timed out after {seconds}s")]
    TimedOut { command: String, seconds: u64 },
}

impl ExecError {
    /// Exit code of the failed command, if it exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecError::Exit { code, .. } => *code,
            _ => None,
        }
    }
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "(terminated by signal)".to_string(),
    }
}

/// Failure while creating a configuration's isolated environment
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("no virtualenv executable found, please install virtualenv")]
    ToolNotFound(#[source] ExecError),

    #[error("interpreter not found: {0}")]
    InterpreterNotFound(String),

    #[error("failed to remove {}: {source}", path.display())]
    Cleanup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Command(ExecError),
}

/// A non-suppressed command failure inside a lifecycle step
#[derive(Debug, Error)]
#[error("error performing {step} step: {source}")]
pub struct StepError {
    pub step: String,
    #[source]
    pub source: ExecError,
}

/// Anything that fails a single configuration's build
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Step(#[from] StepError),

    #[error("build task aborted: {0}")]
    Aborted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_error_display() {
        let err = ExecError::Exit {
            command: "nosetests".to_string(),
            code: Some(2),
        };
        assert_eq!(
            err.to_string(),
            "command 'nosetests' returned non-zero exit status 2"
        );
        assert_eq!(err.exit_code(), Some(2));

        let signalled = ExecError::Exit {
            command: "nosetests".to_string(),
            code: None,
        };
        assert!(signalled.to_string().contains("terminated by signal"));
        assert_eq!(signalled.exit_code(), None);
    }

    #[test]
    fn test_step_error_keeps_step_name() {
        let err = StepError {
            step: "script".to_string(),
            source: ExecError::Exit {
                command: "make test".to_string(),
                code: Some(1),
            },
        };
        assert!(err.to_string().starts_with("error performing script step"));
    }

    #[test]
    fn test_build_error_is_transparent() {
        let err: BuildError = ProvisionError::InterpreterNotFound("python9.9".to_string()).into();
        assert_eq!(err.to_string(), "interpreter not found: python9.9");
    }

    #[test]
    fn test_yaml_error_location() {
        let err = serde_yaml::from_str::<serde_yaml::Value>("a: [1, 2\nb: 3").unwrap_err();
        match ConfigError::from_yaml_error(&err) {
            ConfigError::Yaml { line, .. } => assert!(line >= 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
