// Recording Executor
// Test double that records every command and scripts failures by substring

use crate::error::ExecError;
use crate::runners::{OutputCallback, ProcessExecutor};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub command: String,
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy)]
enum Scripted {
    Exit(i32),
    Launch,
}

#[derive(Default)]
pub(crate) struct RecordingExecutor {
    calls: Mutex<Vec<RecordedCall>>,
    failures: Vec<(String, Scripted)>,
    output: Vec<(String, String)>,
    delay: Option<Duration>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `pattern` exit with `code`
    pub fn fail_with(mut self, pattern: &str, code: i32) -> Self {
        self.failures
            .push((pattern.to_string(), Scripted::Exit(code)));
        self
    }

    /// Commands containing `pattern` cannot be launched
    pub fn fail_to_launch(mut self, pattern: &str) -> Self {
        self.failures.push((pattern.to_string(), Scripted::Launch));
        self
    }

    /// Commands containing `pattern` print `line` on stdout
    pub fn print(mut self, pattern: &str, line: &str) -> Self {
        self.output.push((pattern.to_string(), line.to_string()));
        self
    }

    /// Every command takes `delay` to finish
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command).collect()
    }

    /// Highest number of commands that were running at the same time
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProcessExecutor for RecordingExecutor {
    async fn execute(
        &self,
        command_line: &str,
        env: &HashMap<String, String>,
        on_output: Option<OutputCallback>,
    ) -> Result<(), ExecError> {
        self.calls.lock().unwrap().push(RecordedCall {
            command: command_line.to_string(),
            env: env.clone(),
        });

        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if let Some(callback) = &on_output {
            for (pattern, line) in &self.output {
                if command_line.contains(pattern.as_str()) {
                    callback(line, false);
                }
            }
        }

        let scripted = self
            .failures
            .iter()
            .find(|(pattern, _)| command_line.contains(pattern.as_str()))
            .map(|(_, scripted)| *scripted);

        match scripted {
            None => Ok(()),
            Some(Scripted::Exit(code)) => Err(ExecError::Exit {
                command: command_line.to_string(),
                code: Some(code),
            }),
            Some(Scripted::Launch) => Err(ExecError::Launch {
                command: command_line.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
        }
    }
}
