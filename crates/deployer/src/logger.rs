//! logger collaborator
//!
//! The [Logger] records what happens during a run: nested action groups, host commands, forks and exceptions. It is
//! independent of `tracing`, which is used for diagnostics of the library itself. [TracingLogger] forwards logger
//! events to `tracing`, [MemoryLogger] keeps them in memory.
use crate::error::DeployError;
use crate::value::Args;
use std::sync::{Arc, Mutex};

/// A host command about to be run
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RunRecord {
    pub host: String,
    pub command: String,
    pub use_sudo: bool,
    pub sandbox: bool,
}

pub trait Logger: Send + Sync {
    fn enter_group(&self, name: &str, args: &Args);

    fn leave_group(&self);

    fn log_run(&self, run: &RunRecord);

    /// Starts a fork, the returned handle reports its outcome
    fn log_fork(&self, name: &str) -> Box<dyn ForkHandle>;

    fn log_notice(&self, message: &str);

    fn log_exception(&self, error: &dyn std::fmt::Display);
}

pub trait ForkHandle: Send {
    /// Logger to be used inside the fork
    fn child_logger(&self) -> Arc<dyn Logger>;

    fn set_succeeded(&self);

    fn set_failed(&self, error: &DeployError);
}

/// Enters a group on creation and leaves it when dropped
pub struct LogGroup {
    logger: Arc<dyn Logger>,
}

impl LogGroup {
    pub fn enter(logger: &Arc<dyn Logger>, name: &str, args: &Args) -> Self {
        logger.enter_group(name, args);
        Self {
            logger: logger.clone(),
        }
    }
}

impl Drop for LogGroup {
    fn drop(&mut self) {
        self.logger.leave_group();
    }
}

/// Forwards logger events to `tracing`
#[derive(Debug, Default, Clone)]
pub struct TracingLogger {
    fork: Option<String>,
}

impl Logger for TracingLogger {
    fn enter_group(&self, name: &str, args: &Args) {
        tracing::info!(fork = self.fork, group = name, %args, "enter");
    }

    fn leave_group(&self) {
        tracing::debug!(fork = self.fork, "leave");
    }

    fn log_run(&self, run: &RunRecord) {
        tracing::info!(
            fork = self.fork,
            host = run.host,
            sudo = run.use_sudo,
            sandbox = run.sandbox,
            "{}",
            run.command
        );
    }

    fn log_fork(&self, name: &str) -> Box<dyn ForkHandle> {
        tracing::info!(fork = name, "fork started");
        Box::new(TracingFork {
            name: name.to_string(),
        })
    }

    fn log_notice(&self, message: &str) {
        tracing::warn!(fork = self.fork, "{message}");
    }

    fn log_exception(&self, error: &dyn std::fmt::Display) {
        tracing::error!(fork = self.fork, "{error}");
    }
}

struct TracingFork {
    name: String,
}

impl ForkHandle for TracingFork {
    fn child_logger(&self) -> Arc<dyn Logger> {
        Arc::new(TracingLogger {
            fork: Some(self.name.clone()),
        })
    }

    fn set_succeeded(&self) {
        tracing::info!(fork = self.name, "fork succeeded");
    }

    fn set_failed(&self, error: &DeployError) {
        tracing::warn!(fork = self.name, %error, "fork failed");
    }
}

/// A recorded logger event
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    EnterGroup { name: String, args: String },
    LeaveGroup,
    Run(RunRecord),
    ForkStarted { name: String },
    ForkSucceeded { name: String },
    ForkFailed { name: String, error: String },
    Notice { message: String },
    Exception { message: String },
}

/// Keeps every event in memory, forks append to the same list
#[derive(Debug, Default, Clone)]
pub struct MemoryLogger {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.lock().clone()
    }

    fn push(&self, event: LogEvent) {
        self.lock().push(event);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LogEvent>> {
        // a panic while holding the lock leaves the list intact
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Logger for MemoryLogger {
    fn enter_group(&self, name: &str, args: &Args) {
        self.push(LogEvent::EnterGroup {
            name: name.to_string(),
            args: args.to_string(),
        });
    }

    fn leave_group(&self) {
        self.push(LogEvent::LeaveGroup);
    }

    fn log_run(&self, run: &RunRecord) {
        self.push(LogEvent::Run(run.clone()));
    }

    fn log_fork(&self, name: &str) -> Box<dyn ForkHandle> {
        self.push(LogEvent::ForkStarted {
            name: name.to_string(),
        });
        Box::new(MemoryFork {
            logger: self.clone(),
            name: name.to_string(),
        })
    }

    fn log_notice(&self, message: &str) {
        self.push(LogEvent::Notice {
            message: message.to_string(),
        });
    }

    fn log_exception(&self, error: &dyn std::fmt::Display) {
        self.push(LogEvent::Exception {
            message: error.to_string(),
        });
    }
}

struct MemoryFork {
    logger: MemoryLogger,
    name: String,
}

impl ForkHandle for MemoryFork {
    fn child_logger(&self) -> Arc<dyn Logger> {
        Arc::new(self.logger.clone())
    }

    fn set_succeeded(&self) {
        self.logger.push(LogEvent::ForkSucceeded {
            name: self.name.clone(),
        });
    }

    fn set_failed(&self, error: &DeployError) {
        self.logger.push(LogEvent::ForkFailed {
            name: self.name.clone(),
            error: error.to_string(),
        });
    }
}

/// Installs a `tracing` subscriber writing to stderr, filtered through `DEPLOYER_LOG`
pub fn init_tracing() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("DEPLOYER_LOG"))
        .with_writer(std::io::stderr)
        .try_init()
}
