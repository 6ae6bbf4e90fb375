//! in-memory hosts and helpers shared by the integration tests
#![allow(dead_code)]

use deployer::console::{BatchConsole, Console};
use deployer::env::{Env, EnvContext, EnvOptions};
use deployer::hosts::{ExecFailed, Host, HostHandle, RunOptions};
use deployer::logger::MemoryLogger;
use deployer::node::NodeClass;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Answers every command with the command itself, optionally failing the first runs
#[derive(Debug)]
pub struct EchoHost {
    slug: String,
    address: String,
    failures: AtomicUsize,
    commands: Mutex<Vec<String>>,
}

impl EchoHost {
    pub fn new(slug: &str) -> Arc<Self> {
        Self::failing(slug, 0)
    }

    /// The first `failures` commands exit with status 1
    pub fn failing(slug: &str, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            slug: slug.to_string(),
            address: format!("{slug}.example.org"),
            failures: AtomicUsize::new(failures),
            commands: Mutex::new(Vec::new()),
        })
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn handle(self: &Arc<Self>) -> HostHandle {
        HostHandle::from_arc(self.clone())
    }
}

impl Host for EchoHost {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn run(&self, command: &str, options: &RunOptions) -> Result<String, ExecFailed> {
        self.commands.lock().unwrap().push(command.to_string());

        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if fail {
            return Err(ExecFailed {
                command: command.to_string(),
                host: self.slug.clone(),
                use_sudo: options.use_sudo,
                status_code: Some(1),
                output: format!("{command}: failed\n"),
            });
        }
        Ok(command.to_string())
    }
}

pub fn hosts(slugs: &[&str]) -> Vec<Arc<EchoHost>> {
    slugs.iter().map(|slug| EchoHost::new(slug)).collect()
}

pub fn handles(hosts: &[Arc<EchoHost>]) -> Vec<HostHandle> {
    hosts.iter().map(EchoHost::handle).collect()
}

/// Root environment with a memory logger and the given console and options
pub fn root_with(
    class: &Arc<NodeClass>,
    console: Arc<dyn Console>,
    options: EnvOptions,
) -> (Env, MemoryLogger) {
    let logger = MemoryLogger::new();
    let context = EnvContext::new(Arc::new(logger.clone()), console, options);
    let env = Env::root(class, context).expect("root must instantiate");
    (env, logger)
}

pub fn root(class: &Arc<NodeClass>) -> (Env, MemoryLogger) {
    root_with(class, Arc::new(BatchConsole), EnvOptions::default())
}

/// Counts how often something ran
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}
