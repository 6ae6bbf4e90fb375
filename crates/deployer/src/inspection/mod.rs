//! inspection: reflection over node trees
//!
//! The [Inspector] answers questions about a node without running anything: its children, actions, queries, group,
//! position in the tree. Front ends (shells, documentation generators) are built on top of it.
pub mod filters;

pub use filters::Filter;

use crate::env::Env;
use crate::error::{DeployError, Result};
use crate::node::class::{Member, DEFAULT_ACTION};
use crate::node::{Group, IdentifierScheme, IsolationError, IsolationId, IsolationKey, Node, NodePath};
use crate::query::{Query, QueryResult};
use crate::value::{Args, Value};
use crate::visit::VisitNodes;

#[derive(Debug, Clone)]
pub struct Inspector {
    env: Env,
}

impl From<Env> for Inspector {
    fn from(env: Env) -> Self {
        Self { env }
    }
}

impl From<&Env> for Inspector {
    fn from(env: &Env) -> Self {
        env.clone().into()
    }
}

impl From<Node> for Inspector {
    fn from(node: Node) -> Self {
        Env::new(node).into()
    }
}

impl Inspector {
    pub fn new(target: impl Into<Inspector>) -> Self {
        target.into()
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    fn members_named(&self, select: impl Fn(&Member) -> bool) -> Vec<String> {
        self.env
            .node()
            .class()
            .members()
            .filter(|(_, member)| select(member))
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Children in declaration order
    pub fn get_childnodes(&self) -> Result<Vec<Env>> {
        self.env
            .node()
            .class()
            .children()
            .map(|(name, _)| self.env.child(name))
            .collect()
    }

    pub fn get_childnode(&self, name: &str) -> Result<Env> {
        self.env.child(name)
    }

    pub fn has_childnode(&self, name: &str) -> bool {
        matches!(self.env.node().member(name), Some(Member::Child(_)))
    }

    /// Names of all actions, the default action excluded
    pub fn get_actions(&self) -> Vec<String> {
        let mut actions = self.members_named(|member| matches!(member, Member::Action(_)));
        actions.retain(|name| name != DEFAULT_ACTION);
        actions
    }

    pub fn get_action(&self, name: &str) -> Result<crate::env::EnvAction> {
        self.env.action(name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.env.node().class().action(name).is_some()
    }

    pub fn get_properties(&self) -> Vec<String> {
        self.members_named(|member| {
            matches!(member, Member::Property(_) | Member::RequiredProperty { .. })
        })
    }

    pub fn get_queries(&self) -> Vec<String> {
        self.members_named(|member| matches!(member, Member::Query(_)))
    }

    pub fn get_query(&self, name: &str) -> Option<&Query> {
        match self.env.node().member(name) {
            Some(Member::Query(query)) => Some(query),
            _ => None,
        }
    }

    pub fn get_path(&self) -> NodePath {
        self.env.node().path()
    }

    pub fn get_name(&self) -> &str {
        self.env.node().name()
    }

    pub fn get_root(&self) -> Env {
        let mut env = self.env.clone();
        while let Some(parent) = env.parent() {
            env = parent;
        }
        env
    }

    pub fn get_parent(&self) -> Option<Env> {
        self.env.parent()
    }

    /// Group of the nearest node (this one or an ancestor) that has one
    pub fn get_group(&self) -> Group {
        let mut env = Some(self.env.clone());
        while let Some(current) = env {
            if let Some(group) = current.node().class().group() {
                return group.clone();
            }
            env = current.parent();
        }
        Group::default()
    }

    pub fn get_isolation_identifier(&self) -> Option<&IsolationKey> {
        self.env.node().isolation_identifier()
    }

    pub fn is_callable(&self) -> bool {
        self.env.node().class().default_action().is_some()
    }

    pub fn iter_isolations(&self, scheme: IdentifierScheme) -> Result<Vec<(IsolationId, Env)>> {
        self.env.iter_isolations(scheme)
    }

    pub fn get_isolation(&self, index: impl Into<IsolationId>) -> Result<Env> {
        self.env.get(index)
    }

    pub fn trace_query(&self, name: &str) -> Result<QueryResult> {
        self.env.trace_query(name)
    }

    /// This node and every node below it, breadth first, each once
    pub fn walk(&self) -> Result<NodeIterator> {
        let mut nodes = Vec::new();
        self.env
            .visit_nodes(&mut |env: &Env| nodes.push(env.clone()))?;
        Ok(NodeIterator::new(nodes))
    }
}

/// A list of nodes, usually from [Inspector::walk]
#[derive(Debug, Clone, Default)]
pub struct NodeIterator {
    nodes: std::vec::IntoIter<Env>,
}

impl NodeIterator {
    pub fn new(nodes: Vec<Env>) -> Self {
        Self {
            nodes: nodes.into_iter(),
        }
    }

    pub fn filter(self, filter: Filter) -> Self {
        Self::new(self.nodes.filter(|env| filter.matches(env)).collect())
    }

    /// Replaces every node that can be isolated by its cell `index`, nodes without that cell are kept as they are
    pub fn prefer_isolation(self, index: impl Into<IsolationId>) -> Result<Self> {
        let index = index.into();
        let nodes = self
            .nodes
            .map(|env| {
                if env.node().is_isolated() {
                    return Ok(env);
                }
                match env.get(index.clone()) {
                    Err(DeployError::Isolation(IsolationError::NotFound { .. })) => Ok(env),
                    cell => cell,
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(nodes))
    }

    /// Calls `action` on every node that has it
    pub fn call_action(self, action: &str, args: impl Into<Args>) -> Vec<(Env, Result<Value>)> {
        let args = args.into();
        self.nodes
            .filter(|env| env.node().class().action(action).is_some())
            .map(|env| {
                let result = env.call(action, args.clone());
                (env, result)
            })
            .collect()
    }
}

impl Iterator for NodeIterator {
    type Item = Env;

    fn next(&mut self) -> Option<Self::Item> {
        self.nodes.next()
    }
}
