//! bound actions, properties and queries
//!
//! Calling an [EnvAction] on a simple node that is not isolated yet fans the call out: it runs once per cell, in
//! parallel, and the results are collected in cell order. Everything else runs once, directly.
use super::{Env, ForkErrorPolicy, InvocationRecord};
use crate::error::{DeployError, Result};
use crate::hosts::ExecFailed;
use crate::logger::LogGroup;
use crate::node::class::{Action, Property};
use crate::query::{Query, QueryError};
use crate::value::{Args, Value};
use std::sync::Arc;

const RETRY_OPTIONS: [&str; 3] = ["Retry", "Skip (this will not always work)", "Abort"];

#[derive(Debug, Clone)]
enum ActionTarget {
    Action(Action),
    Property(Property),
    Query(Query),
}

/// A member bound to an environment
#[derive(Clone)]
pub struct EnvAction {
    env: Env,
    name: String,
    target: ActionTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterFailure {
    Retry,
    Skip,
    Abort,
}

impl EnvAction {
    pub(crate) fn action(env: Env, name: &str, action: Action) -> Self {
        Self::new(env, name, ActionTarget::Action(action))
    }

    pub(crate) fn property(env: Env, name: &str, property: Property) -> Self {
        Self::new(env, name, ActionTarget::Property(property))
    }

    pub(crate) fn query(env: Env, name: &str, query: Query) -> Self {
        Self::new(env, name, ActionTarget::Query(query))
    }

    fn new(env: Env, name: &str, target: ActionTarget) -> Self {
        Self {
            env,
            name: name.to_string(),
            target,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn is_dont_isolate_yet(&self) -> bool {
        matches!(&self.target, ActionTarget::Action(action) if action.is_dont_isolate_yet())
    }

    pub fn is_isolate_one_only(&self) -> bool {
        matches!(&self.target, ActionTarget::Action(action) if action.is_isolate_one_only())
    }

    pub fn is_suppress_result(&self) -> bool {
        matches!(&self.target, ActionTarget::Action(action) if action.is_suppress_result())
    }

    /// Runs the member
    ///
    /// On a simple node that is not isolated yet (and unless the action says otherwise) the call runs on every cell
    /// and returns an array of the results in cell order. With `isolate_one_only` and several cells, a single cell is
    /// chosen through the console and its result returned as is.
    #[tracing::instrument(level = "debug", skip_all, fields(node = %self.env.node(), action = %self.name))]
    pub fn call(&self, args: impl Into<Args>) -> Result<Value> {
        let args = args.into();
        let node = self.env.node();

        if !node.kind().is_simple() || node.is_isolated() || self.is_dont_isolate_yet() {
            return self.run_on_cell(&self.env, &args);
        }

        let cells = self.env.isolations()?;
        match cells.len() {
            0 => {
                let message = format!("Nothing to do. No hosts in {node}");
                tracing::warn!("{message}");
                self.env.notice(&message);
                Ok(Value::Array(Vec::new()))
            }
            1 => Ok(Value::Array(vec![self.run_on_cell(&cells[0], &args)?])),
            _ if self.is_isolate_one_only() => {
                let cell = self.pin(&cells)?;
                self.run_on_cell(&cell, &args)
            }
            _ => self.fork(&cells, &args),
        }
    }

    /// Asks which of several cells to run on, the default is the one with the smallest host slug
    fn pin(&self, cells: &[Env]) -> Result<Env> {

        let hosts: Vec<Option<_>> = cells
            .iter()
            .map(|cell| cell.hosts().role("host").first().cloned())
            .collect();
        let labels: Vec<String> = hosts
            .iter()
            .zip(cells)
            .map(|(host, cell)| match host {
                Some(host) => format!("{}    [{}]", host.slug(), host.address()),
                None => cell.node().path().to_string(),
            })
            .collect();
        let default = hosts
            .iter()
            .enumerate()
            .min_by_key(|(_, host)| host.as_ref().map(|host| host.slug().to_string()))
            .map(|(index, _)| index)
            .unwrap_or(0);

        let index = self
            .env
            .console()
            .choose_one(&format!("Choose a host for {}", self.name), &labels, default)?;
        let cell = cells
            .get(index)
            .cloned()
            .ok_or(crate::console::ConsoleError::InvalidChoice(index))?;
        tracing::debug!(cell = %cell.node(), "pinned");
        Ok(cell)
    }

    fn fork(&self, cells: &[Env], args: &Args) -> Result<Value> {
        tracing::info!(forks = cells.len(), "forking");

        let results: Vec<Result<Value>> = std::thread::scope(|scope| {
            let handles: Vec<_> = cells
                .iter()
                .map(|cell| {
                    let fork = self.env.logger().log_fork(&format!("On: {}", cell.node()));
                    scope.spawn(move || {
                        let cell = cell.with_logger(fork.child_logger());
                        let result = self.run_on_cell(&cell, args);
                        match &result {
                            Ok(_) => fork.set_succeeded(),
                            Err(err) => fork.set_failed(err),
                        }
                        result
                    })
                })
                .collect();

            handles
                .into_iter()
                .zip(cells)
                .map(|(handle, cell)| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| Err(self.panicked(cell, panic)))
                })
                .collect()
        });

        let mut values = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(value) => values.push(value),
                Err(err) => errors.push(err),
            }
        }

        if errors.is_empty() {
            return Ok(Value::Array(values));
        }

        tracing::debug!(failed = errors.len(), "forks failed");
        match self.env.options().fork_errors {
            ForkErrorPolicy::First => Err(errors.remove(0)),
            ForkErrorPolicy::Aggregate => Err(ForkAggregateError {
                node: self.env.node().path().to_string(),
                action: self.name.clone(),
                errors,
            }
            .into()),
        }
    }

    fn panicked(&self, cell: &Env, panic: Box<dyn std::any::Any + Send>) -> DeployError {
        let message = panic
            .downcast_ref::<&str>()
            .map(|message| message.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        let mut trace = cell.call_stack().to_vec();
        trace.push(format!("{}.{}", cell.node(), self.name));
        trace.push(format!("panicked: {message}"));
        ActionException::new(
            cell.node().path().to_string(),
            self.name.clone(),
            anyhow::anyhow!("panicked: {message}"),
            String::new(),
            trace.join("\n"),
        )
        .into()
    }

    /// Runs once on `cell`, asking whether to retry when a host command fails
    fn run_on_cell(&self, cell: &Env, args: &Args) -> Result<Value> {
        let _group = LogGroup::enter(cell.logger(), &self.name, args);

        let frame = format!("{}.{}({args})", cell.node(), self.name);
        loop {
            let record = Arc::new(InvocationRecord::default());
            let env = cell.with_record(record).with_frame(frame.clone());

            let result = match &self.target {
                ActionTarget::Query(query) => {
                    return query
                        .evaluate(&Value::Node(env.clone()))
                        .map(|result| result.result)
                        .map_err(|inner| {
                            QueryError {
                                node: env.node().path().to_string(),
                                attribute: self.name.clone(),
                                query: query.clone(),
                                inner,
                            }
                            .into()
                        });
                }
                ActionTarget::Action(action) => action.run(&env, args),
                ActionTarget::Property(property) => property.run(&env),
            };

            let err = match result {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            // failures of nested actions are already reported
            if let Some(DeployError::Action(_)) = err.downcast_ref::<DeployError>() {
                return match err.downcast::<DeployError>() {
                    Ok(err) => Err(err),
                    Err(err) => Err(self.exception(&env, err)),
                };
            }

            if is_exec_failure(&err) {
                match self.after_failure(cell)? {
                    AfterFailure::Retry => {
                        tracing::info!(cell = %cell.node(), "retrying");
                        continue;
                    }
                    AfterFailure::Skip => {
                        cell.notice(&format!("Skipped {} on {}", self.name, cell.node()));
                        return Ok(Value::Null);
                    }
                    AfterFailure::Abort => {}
                }
            }

            return Err(self.exception(&env, err));
        }
    }

    /// Wraps a failure of the action body run in `env`
    fn exception(&self, env: &Env, err: anyhow::Error) -> DeployError {
        let output = env.record.as_ref().map(|record| record.output()).unwrap_or_default();
        let mut trace = env.call_stack().join("\n");
        trace.push_str(&format!("\n{err:?}"));

        let exception = ActionException::new(
            env.node().path().to_string(),
            self.name.clone(),
            err,
            output,
            trace,
        );
        env.logger().log_exception(&exception);
        exception.into()
    }

    fn after_failure(&self, cell: &Env) -> Result<AfterFailure> {
        let console = cell.console();
        if !console.is_interactive() {
            return Ok(AfterFailure::Abort);
        }

        let options: Vec<String> = RETRY_OPTIONS.iter().map(|option| option.to_string()).collect();
        let choice = console.choose_one(
            &format!("{} failed on {}, continue?", self.name, cell.node()),
            &options,
            2,
        )?;
        Ok(match choice {
            0 => AfterFailure::Retry,
            1 => AfterFailure::Skip,
            _ => AfterFailure::Abort,
        })
    }
}

fn is_exec_failure(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ExecFailed>().is_some()
        || matches!(
            err.downcast_ref::<DeployError>(),
            Some(DeployError::ExecFailed(_))
        )
}

impl std::fmt::Debug for EnvAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Action {}.{}>", self.env.node().path(), self.name)
    }
}

/// An action failed on a node
#[derive(thiserror::Error, Debug)]
#[error("{action} failed on {node}: {inner}")]
pub struct ActionException {
    pub node: String,
    pub action: String,
    #[source]
    pub inner: anyhow::Error,
    /// Output of the host commands run before the failure
    pub output: String,
    /// Calls leading to the failure, outermost first, followed by the error chain
    pub trace: String,
}

impl ActionException {
    pub fn new(node: String, action: String, inner: anyhow::Error, output: String, trace: String) -> Self {
        Self {
            node,
            action,
            inner,
            output,
            trace,
        }
    }

    pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        self.inner.root_cause()
    }
}

/// Several forks of a call failed
#[derive(thiserror::Error, Debug)]
#[error("{action} failed on {} cells of {node}", .errors.len())]
pub struct ForkAggregateError {
    pub node: String,
    pub action: String,
    pub errors: Vec<DeployError>,
}
