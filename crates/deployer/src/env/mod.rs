//! node environments
//!
//! An [Env] is what action bodies, properties and queries see: a [Node] plus the shared context of the run (logger,
//! console, options). Attribute access resolves members of the node class:
//!
//! - actions become bound [EnvAction]s
//! - children become the child's environment
//! - properties and queries are evaluated (and fanned out over cells, see [EnvAction::call])
//! - plain attributes are returned as they are
//!
//! Environments are read only, [Env::set_attribute] always fails.
pub mod action;

pub use action::{ActionException, EnvAction, ForkAggregateError};

use crate::console::{BatchConsole, Console};
use crate::error::Result;
use crate::hosts::{HostFilter, HostHandle, RoleBindings, RunOptions};
use crate::logger::{Logger, RunRecord, TracingLogger};
use crate::node::class::{Action, Member, NodeClass};
use crate::node::{IdentifierScheme, IsolationId, Node};
use crate::query::{QueryError, QueryResult};
use crate::value::{Args, Value};
use std::sync::{Arc, Mutex};

/// What to do when some forks of a fanned out call fail
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkErrorPolicy {
    /// The error of the first failed fork, in dispatch order
    #[default]
    First,
    /// All errors, as a [ForkAggregateError]
    Aggregate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EnvOptions {
    /// Host commands are logged but not run
    pub sandbox: bool,
    pub fork_errors: ForkErrorPolicy,
}

/// Shared by every environment of a run
#[derive(Clone)]
pub struct EnvContext {
    logger: Arc<dyn Logger>,
    console: Arc<dyn Console>,
    options: EnvOptions,
}

impl EnvContext {
    pub fn new(logger: Arc<dyn Logger>, console: Arc<dyn Console>, options: EnvOptions) -> Self {
        Self {
            logger,
            console,
            options,
        }
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn console(&self) -> &Arc<dyn Console> {
        &self.console
    }

    pub fn options(&self) -> &EnvOptions {
        &self.options
    }
}

impl Default for EnvContext {
    fn default() -> Self {
        Self::new(
            Arc::new(TracingLogger::default()),
            Arc::new(BatchConsole),
            EnvOptions::default(),
        )
    }
}

impl std::fmt::Debug for EnvContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvContext")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Output collected by one action invocation on one cell
#[derive(Debug, Default)]
pub(crate) struct InvocationRecord {
    output: Mutex<String>,
}

impl InvocationRecord {
    fn append(&self, output: &str) {
        self.output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_str(output);
    }

    pub(crate) fn output(&self) -> String {
        self.output
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[derive(Clone)]
pub struct Env {
    node: Node,
    context: EnvContext,
    record: Option<Arc<InvocationRecord>>,
    call_stack: Vec<String>,
}

impl Env {
    pub fn new(node: Node) -> Self {
        Self::with_context(node, EnvContext::default())
    }

    pub fn with_context(node: Node, context: EnvContext) -> Self {
        Self {
            node,
            context,
            record: None,
            call_stack: Vec::new(),
        }
    }

    /// Environment of a new root node of `class`
    pub fn root(class: &Arc<NodeClass>, context: EnvContext) -> Result<Self> {
        Ok(Self::with_context(Node::root(class)?, context))
    }

    fn wrap(&self, node: Node) -> Self {
        Self {
            node,
            context: self.context.clone(),
            record: None,
            call_stack: self.call_stack.clone(),
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn context(&self) -> &EnvContext {
        &self.context
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.context.logger
    }

    pub fn console(&self) -> &Arc<dyn Console> {
        &self.context.console
    }

    pub fn options(&self) -> &EnvOptions {
        &self.context.options
    }

    /// Actions running while this environment was created, outermost first
    pub fn call_stack(&self) -> &[String] {
        &self.call_stack
    }

    pub fn hosts(&self) -> &RoleBindings {
        self.node.hosts()
    }

    /// The single host of an isolated simple node
    pub fn host(&self) -> Result<HostHandle> {
        self.node.host()
    }

    pub fn parent(&self) -> Option<Env> {
        self.node.parent().map(|parent| self.wrap(parent.clone()))
    }

    pub fn child(&self, name: &str) -> Result<Env> {
        Ok(self.wrap(self.node.child(name)?))
    }

    /// Every cell of this node, in host order
    pub fn isolations(&self) -> Result<Vec<Env>> {
        Ok(self
            .node
            .isolations()?
            .into_iter()
            .map(|node| self.wrap(node))
            .collect())
    }

    pub fn iter_isolations(&self, scheme: IdentifierScheme) -> Result<Vec<(IsolationId, Env)>> {
        Ok(self
            .node
            .iter_isolations(scheme)?
            .into_iter()
            .map(|(id, node)| (id, self.wrap(node)))
            .collect())
    }

    /// The cell matching `index`, see [Node::get]
    pub fn get(&self, index: impl Into<IsolationId>) -> Result<Env> {
        Ok(self.wrap(self.node.get(index)?))
    }

    /// Resolves the member `name`, or one of `host`, `hosts` and `parent`
    #[tracing::instrument(level = "trace", skip(self), fields(node = %self.node))]
    pub fn attr(&self, name: &str) -> Result<Value> {
        let Some(member) = self.node.member(name) else {
            return self.reserved_attr(name);
        };

        match member {
            Member::Action(action) => Ok(Value::Action(EnvAction::action(
                self.clone(),
                name,
                action.clone(),
            ))),
            Member::Child(_) => Ok(Value::Node(self.child(name)?)),
            Member::Property(property) => {
                EnvAction::property(self.clone(), name, property.clone()).call(())
            }
            Member::Query(query) => EnvAction::query(self.clone(), name, query.clone()).call(()),
            Member::RequiredProperty { description } => Err(RequiredPropertyError {
                attribute: name.to_string(),
                class: self.node.class().name().to_string(),
                description: description.clone(),
            }
            .into()),
            Member::Attribute(value) => Ok(value.clone()),
        }
    }

    fn reserved_attr(&self, name: &str) -> Result<Value> {
        let unknown = || AttributeError::Unknown {
            node: self.node.path().to_string(),
            name: name.to_string(),
        };

        match name {
            "host" => Ok(Value::Host(self.host()?)),
            "hosts" => Ok(Value::Object(
                self.hosts()
                    .iter()
                    .map(|(role, hosts)| (role.to_string(), Value::from(hosts.to_vec())))
                    .collect(),
            )),
            "parent" => Ok(Value::Node(self.parent().ok_or_else(unknown)?)),
            _ => Err(unknown().into()),
        }
    }

    /// Environments can not be changed
    pub fn set_attribute(&self, name: &str, _value: impl Into<Value>) -> Result<()> {
        Err(AttributeError::EnvLocked {
            name: name.to_string(),
        }
        .into())
    }

    /// The action `name`, bound to this environment
    pub fn action(&self, name: &str) -> Result<EnvAction> {
        match self.node.member(name) {
            Some(Member::Action(action)) => Ok(EnvAction::action(self.clone(), name, action.clone())),
            Some(other) => Err(AttributeError::NotAnAction {
                node: self.node.path().to_string(),
                name: name.to_string(),
                kind: other.kind_name(),
            }
            .into()),
            None => Err(AttributeError::Unknown {
                node: self.node.path().to_string(),
                name: name.to_string(),
            }
            .into()),
        }
    }

    pub fn call(&self, name: &str, args: impl Into<Args>) -> Result<Value> {
        self.action(name)?.call(args)
    }

    /// Calls the class' default action
    pub fn call_default(&self, args: impl Into<Args>) -> Result<Value> {
        let action = self
            .node
            .class()
            .default_action()
            .ok_or_else(|| AttributeError::NotCallable(self.node.path().to_string()))?;
        EnvAction::action(self.clone(), action.name(), action.clone()).call(args)
    }

    /// Calls `action` on this environment even if the class replaced it, for calling a base class' version
    pub fn call_unbound(&self, action: &Action, args: impl Into<Args>) -> Result<Value> {
        EnvAction::action(self.clone(), action.name(), action.clone()).call(args)
    }

    /// Environment of a new, unrelated root node sharing this run's context
    pub fn initialize_node(&self, class: &Arc<NodeClass>) -> Result<Env> {
        Env::root(class, self.context.clone())
    }

    /// Evaluates the query `name` directly, without fanning out, keeping every intermediate result
    pub fn trace_query(&self, name: &str) -> Result<QueryResult> {
        let Some(Member::Query(query)) = self.node.member(name) else {
            return Err(AttributeError::Unknown {
                node: self.node.path().to_string(),
                name: name.to_string(),
            }
            .into());
        };

        query
            .evaluate(&Value::Node(self.clone()))
            .map_err(|inner| {
                QueryError {
                    node: self.node.path().to_string(),
                    attribute: name.to_string(),
                    query: query.clone(),
                    inner,
                }
                .into()
            })
    }

    /// Reports `message` through the logger
    pub fn notice(&self, message: &str) {
        self.logger().log_notice(message);
    }

    /// Runs `command` on `host`, logged, skipped in sandbox mode
    pub fn run_on(&self, host: &HostHandle, command: &str, options: RunOptions) -> Result<String> {
        let sandbox = self.options().sandbox;
        self.logger().log_run(&RunRecord {
            host: host.slug().to_string(),
            command: command.to_string(),
            use_sudo: options.use_sudo,
            sandbox,
        });
        if sandbox {
            return Ok(String::new());
        }

        let output = host.run(command, &options)?;
        if let Some(record) = &self.record {
            record.append(&output);
        }
        Ok(output)
    }

    /// Runs `command` on the host of this cell
    pub fn run(&self, command: &str) -> Result<String> {
        self.run_on(&self.host()?, command, RunOptions::default())
    }

    /// Runs `command` through sudo on the host of this cell
    pub fn sudo(&self, command: &str) -> Result<String> {
        self.run_on(&self.host()?, command, RunOptions::sudo())
    }

    /// Runs `command` on every matching host, one after the other
    pub fn run_role(&self, filter: impl Into<HostFilter>, command: &str) -> Result<Vec<String>> {
        self.hosts()
            .filter(filter)
            .iter()
            .map(|host| self.run_on(host, command, RunOptions::default()))
            .collect()
    }

    /// Whether `path` exists on the host of this cell, always `false` in sandbox mode
    pub fn exists(&self, path: &str) -> Result<bool> {
        let host = self.host()?;
        if self.options().sandbox {
            return Ok(false);
        }
        Ok(host.exists(path)?)
    }

    pub(crate) fn with_logger(&self, logger: Arc<dyn Logger>) -> Env {
        let mut env = self.clone();
        env.context.logger = logger;
        env
    }

    pub(crate) fn with_record(&self, record: Arc<InvocationRecord>) -> Env {
        let mut env = self.clone();
        env.record = Some(record);
        env
    }

    pub(crate) fn with_frame(&self, frame: String) -> Env {
        let mut env = self.clone();
        env.call_stack.push(frame);
        env
    }
}

/// Iterating an environment yields one environment per cell, see [Env::isolations]
///
/// A node that can not be split yields its error as the only item.
impl<'a> IntoIterator for &'a Env {
    type Item = Result<Env>;
    type IntoIter = std::vec::IntoIter<Result<Env>>;

    fn into_iter(self) -> Self::IntoIter {
        match self.isolations() {
            Ok(cells) => cells.into_iter().map(Ok).collect::<Vec<_>>().into_iter(),
            Err(err) => vec![Err(err)].into_iter(),
        }
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Env({})", self.node.path())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum AttributeError {
    #[error("{node} has no attribute `{name}`")]
    Unknown { node: String, name: String },
    #[error("`{name}` of {node} is a {kind}, not a child node")]
    NotAChild {
        node: String,
        name: String,
        kind: &'static str,
    },
    #[error("`{name}` of {node} is a {kind}, not an action")]
    NotAnAction {
        node: String,
        name: String,
        kind: &'static str,
    },
    #[error("{0} has no single host, only isolated simple nodes do")]
    NoHost(String),
    #[error("{0} has no default action")]
    NotCallable(String),
    #[error("can not set `{name}`: node environments are read only")]
    EnvLocked { name: String },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("required property `{attribute}` of {class} is not defined: {description}")]
pub struct RequiredPropertyError {
    pub attribute: String,
    pub class: String,
    pub description: String,
}
