// Runtime Execution Context
// Environment snapshots and the collaborators shared by every configuration run

use crate::execution::events::{ExecutionEvent, EventSender, ProgressSender};
use crate::execution::provision::{Filesystem, LocalFilesystem};
use crate::runners::{OutputCallback, ProcessExecutor};

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

const PATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// A private copy of process environment variables.
///
/// Configurations mutate their own snapshot; the real process environment is
/// only ever read, once, when a snapshot is taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Snapshot the current process environment
    pub fn from_current() -> Self {
        Self::from_os_vars(std::env::vars_os())
    }

    /// Variables whose name or value is not valid UTF-8 are left out
    fn from_os_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        Self::from_vars(vars.into_iter().filter_map(|(name, value)| {
            match (name.into_string(), value.into_string()) {
                (Ok(name), Ok(value)) => Some((name, value)),
                (name, _) => {
                    debug!(name = ?name, "skipping environment variable that is not UTF-8");
                    None
                }
            }
        }))
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.remove(name)
    }

    /// Put `dir` in front of every other PATH entry
    pub fn prepend_path(&mut self, dir: &Path) {
        let dir = dir.display().to_string();
        let path = match self.get("PATH") {
            Some(existing) if !existing.is_empty() => {
                format!("{}{}{}", dir, PATH_SEPARATOR, existing)
            }
            _ => dir,
        };
        self.set("PATH", path);
    }

    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.vars
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Collaborators a configuration needs while it runs.
///
/// Cheap to clone: every concurrent configuration gets its own copy.
#[derive(Clone)]
pub struct RunContext {
    pub executor: Arc<dyn ProcessExecutor>,
    pub filesystem: Arc<dyn Filesystem>,
    pub events: Option<ProgressSender>,
}

impl RunContext {
    pub fn new(executor: Arc<dyn ProcessExecutor>) -> Self {
        Self {
            executor,
            filesystem: Arc::new(LocalFilesystem),
            events: None,
        }
    }

    pub fn with_filesystem(mut self, filesystem: Arc<dyn Filesystem>) -> Self {
        self.filesystem = filesystem;
        self
    }

    /// Set progress event sender
    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn send_event(&self, event: ExecutionEvent) {
        self.events.send_event(event);
    }

    /// Output callback that forwards command output as events for `configuration`
    pub fn output_callback(&self, configuration: &str) -> Option<OutputCallback> {
        let tx = self.events.clone()?;
        let configuration = configuration.to_string();
        Some(Box::new(move |line: &str, is_error: bool| {
            tx.send_event(ExecutionEvent::command_output(
                configuration.as_str(),
                line,
                is_error,
            ));
        }))
    }
}
