// Isolated Environment Provisioning
// Creates a configuration's virtualenv and maps tool failures to provisioning errors

use crate::error::{ExecError, ProvisionError};
use crate::execution::context::{Environment, RunContext};
use crate::execution::events::ExecutionEvent;

use std::io;
use std::path::Path;

use tracing::{debug, info};

/// Exit status virtualenv uses when the requested interpreter does not exist
const INTERPRETER_NOT_FOUND: i32 = 3;

/// Exit status POSIX shells use for "command not found"
const COMMAND_NOT_FOUND: i32 = 127;

/// Filesystem probing, injectable for tests
pub trait Filesystem: Send + Sync {
    fn is_dir(&self, path: &Path) -> bool;
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}

/// Interpreter executable for a version: `pypy` stays as is, `2.7` becomes `python2.7`
pub fn interpreter_for(version: &str) -> String {
    if version.starts_with("py") {
        version.to_string()
    } else {
        format!("python{}", version)
    }
}

/// Command line that creates the virtualenv
pub fn virtualenv_command(interpreter: &str, path: &Path) -> String {
    format!(
        "virtualenv --distribute --python={} {}",
        interpreter,
        path.display()
    )
}

/// Create the virtualenv at `path`, removing an existing one first when `recreate` is set
pub(crate) async fn prepare_virtualenv(
    ctx: &RunContext,
    configuration: &str,
    interpreter: &str,
    path: &Path,
    recreate: bool,
    env: &Environment,
) -> Result<(), ProvisionError> {
    if recreate && ctx.filesystem.is_dir(path) {
        info!(path = %path.display(), "removing existing virtualenv");
        ctx.send_event(ExecutionEvent::info(
            format!("Removing existing virtualenv {}", path.display()),
            Some(configuration.to_string()),
        ));
        ctx.filesystem
            .remove_dir_all(path)
            .map_err(|source| ProvisionError::Cleanup {
                path: path.to_path_buf(),
                source,
            })?;
    }

    let command = virtualenv_command(interpreter, path);
    ctx.send_event(ExecutionEvent::command_started(
        configuration,
        "virtualenv",
        command.as_str(),
    ));
    debug!(command = %command, "provisioning virtualenv");

    ctx.executor
        .execute(&command, env.as_map(), ctx.output_callback(configuration))
        .await
        .map_err(|err| classify_failure(err, interpreter))
}

fn classify_failure(err: ExecError, interpreter: &str) -> ProvisionError {
    match err {
        ExecError::Launch { .. } => ProvisionError::ToolNotFound(err),
        ExecError::Exit {
            code: Some(COMMAND_NOT_FOUND),
            ..
        } => ProvisionError::ToolNotFound(err),
        ExecError::Exit {
            code: Some(INTERPRETER_NOT_FOUND),
            ..
        } => ProvisionError::InterpreterNotFound(interpreter.to_string()),
        other => ProvisionError::Command(other),
    }
}
