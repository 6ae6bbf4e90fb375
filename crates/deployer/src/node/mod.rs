//! node instances
//!
//! A [Node] is a cheap view: a class, its parent and the role bindings computed for this position in the tree.
//! Children are instantiated on every access, two views are equal when they have the same root class and path.
pub mod class;
pub mod group;
pub mod isolation;
pub mod role_mapping;

pub use class::{Action, HostsSpec, Member, NodeClass, NodeClassBuilder, NodeKind};
pub use group::Group;
pub use isolation::{IdentifierScheme, IsolationError, IsolationId, IsolationKey};
pub use role_mapping::{MappingTarget, RoleMapping, ALL_HOSTS};

use crate::env::AttributeError;
use crate::error::Result;
use crate::hosts::{HostHandle, RoleBindings};
use std::sync::Arc;

#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

struct NodeInner {
    class: Arc<NodeClass>,
    parent: Option<Node>,
    name: String,
    hosts: RoleBindings,
    isolated: bool,
    identifier: Option<IsolationKey>,
}

impl Node {
    /// Instantiates `class` as the root of a tree
    pub fn root(class: &Arc<NodeClass>) -> Result<Node> {
        if matches!(class.kind(), NodeKind::SimpleArray | NodeKind::SimpleOne) {
            return Err(IsolationError::MissingParent {
                class: class.name().to_string(),
                kind: class.kind(),
            }
            .into());
        }

        let hosts = match class.hosts() {
            Some(HostsSpec::Static(definition)) => RoleBindings::from_static_definition(definition)?,
            Some(HostsSpec::Mapping(mapping)) => mapping.apply(&RoleBindings::empty())?,
            None => RoleBindings::empty(),
        };

        Ok(Node::from_inner(NodeInner {
            class: class.clone(),
            parent: None,
            name: class.name().to_string(),
            hosts,
            isolated: class.kind() == NodeKind::Normal,
            identifier: None,
        }))
    }

    fn from_inner(inner: NodeInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn class(&self) -> &Arc<NodeClass> {
        &self.inner.class
    }

    pub fn kind(&self) -> NodeKind {
        self.inner.class.kind()
    }

    /// Attribute name in the parent, class name for the root
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn parent(&self) -> Option<&Node> {
        self.inner.parent.as_ref()
    }

    pub fn root_node(&self) -> Node {
        let mut node = self;
        while let Some(parent) = node.parent() {
            node = parent;
        }
        node.clone()
    }

    pub fn hosts(&self) -> &RoleBindings {
        &self.inner.hosts
    }

    pub fn is_isolated(&self) -> bool {
        self.inner.isolated
    }

    /// Position of this cell within its array, `None` unless this node is a cell
    pub fn isolation_identifier(&self) -> Option<&IsolationKey> {
        self.inner.identifier.as_ref()
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.inner.class.member(name)
    }

    /// The single host of an isolated simple node
    pub fn host(&self) -> Result<HostHandle> {
        if !self.kind().is_simple() || !self.is_isolated() {
            return Err(AttributeError::NoHost(self.path().to_string()).into());
        }
        Ok(self.hosts().get("host")?)
    }

    /// Instantiates the child node `name`
    pub fn child(&self, name: &str) -> Result<Node> {
        match self.member(name) {
            Some(Member::Child(class)) => {
                let class = class.clone();
                self.instantiate_child(name, &class)
            }
            Some(other) => Err(AttributeError::NotAChild {
                node: self.path().to_string(),
                name: name.to_string(),
                kind: other.kind_name(),
            }
            .into()),
            None => Err(AttributeError::Unknown {
                node: self.path().to_string(),
                name: name.to_string(),
            }
            .into()),
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(parent = %self.path(), child = name))]
    fn instantiate_child(&self, name: &str, class: &Arc<NodeClass>) -> Result<Node> {
        let hosts = match class.hosts() {
            Some(HostsSpec::Static(definition)) => RoleBindings::from_static_definition(definition)?,
            Some(HostsSpec::Mapping(mapping)) => mapping.apply(self.hosts())?,
            None => self.hosts().clone(),
        };

        if class.kind() == NodeKind::SimpleOne {
            let count = hosts.role("host").len();
            if count != 1 {
                return Err(IsolationError::JustOneHostCount {
                    class: class.name().to_string(),
                    count,
                }
                .into());
            }
        }

        let isolated = self.is_isolated() && class.kind() != NodeKind::SimpleArray;
        tracing::trace!(isolated, %hosts, "child instantiated");

        Ok(Node::from_inner(NodeInner {
            class: class.clone(),
            parent: Some(self.clone()),
            name: name.to_string(),
            hosts,
            isolated,
            identifier: None,
        }))
    }

    /// Isolated copy of this node bound to the host at `index` of its `host` role
    pub(crate) fn to_cell(&self, parent: Option<Node>, hosts: RoleBindings, index: usize) -> Node {
        Node::from_inner(NodeInner {
            class: self.inner.class.clone(),
            parent,
            name: self.inner.name.clone(),
            hosts,
            isolated: true,
            identifier: Some(IsolationKey::Index(index)),
        })
    }

    pub fn iter_isolations(&self, scheme: IdentifierScheme) -> Result<Vec<(IsolationId, Node)>> {
        isolation::iter_isolations(self, scheme)
    }

    /// Every cell of this node, in host order
    pub fn isolations(&self) -> Result<Vec<Node>> {
        Ok(self
            .iter_isolations(IdentifierScheme::default())?
            .into_iter()
            .map(|(_, node)| node)
            .collect())
    }

    /// The cell matching `index`, trying integer, host and slug identifiers in that order
    pub fn get(&self, index: impl Into<IsolationId>) -> Result<Node> {
        let index = index.into();
        if self.is_isolated() {
            return Err(IsolationError::AlreadyIsolated(self.path().to_string()).into());
        }

        for scheme in IdentifierScheme::ALL {
            for (id, node) in self.iter_isolations(scheme)? {
                if id == index {
                    return Ok(node);
                }
            }
        }

        Err(IsolationError::NotFound {
            node: self.path().to_string(),
            index: index.to_string(),
        }
        .into())
    }

    pub fn path(&self) -> NodePath {
        let mut segments = Vec::new();
        let mut node = Some(self);
        while let Some(current) = node {
            segments.push(PathSegment {
                name: current.inner.name.clone(),
                identifier: current.inner.identifier.clone(),
            });
            node = current.parent();
        }
        segments.reverse();
        NodePath(segments)
    }

    /// Identity of this position in the tree
    pub fn key(&self) -> NodeKey {
        NodeKey {
            root: Arc::as_ptr(self.root_node().class()) as usize,
            path: self.path(),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Node {}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<Node {}>", self.path())
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment {
    pub name: String,
    pub identifier: Option<IsolationKey>,
}

/// Names from the root to a node, cells carry their identifier: `Site.web[0].nginx`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath(pub Vec<PathSegment>);

impl NodePath {
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|segment| segment.name.as_str()).collect()
    }
}

impl std::fmt::Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, segment) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            f.write_str(&segment.name)?;
            if let Some(identifier) = &segment.identifier {
                write!(f, "[{identifier}]")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeKey {
    root: usize,
    path: NodePath,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::DeployError;
    use crate::hosts::{HostsDefinition, LocalHost};
    use pretty_assertions::assert_eq;

    fn hosts(slugs: &[&str]) -> Vec<HostHandle> {
        slugs
            .iter()
            .map(|slug| HostHandle::new(LocalHost::new(*slug)))
            .collect()
    }

    fn slugs(node: &Node, role: &str) -> Vec<String> {
        node.hosts()
            .role(role)
            .iter()
            .map(|h| h.slug().to_string())
            .collect()
    }

    fn site(array_hosts: usize) -> Arc<NodeClass> {
        let inner = NodeClass::simple("Web").build().unwrap();
        let all = hosts(&["a", "b", "c", "d"]);
        NodeClass::builder("Site")
            .hosts(
                HostsDefinition::new()
                    .role("web", all[..array_hosts].to_vec())
                    .role("db", all[3..].to_vec()),
            )
            .child("plain", &NodeClass::builder("Plain").build().unwrap())
            .child(
                "web",
                &inner.array().unwrap().map_roles(RoleMapping::new().host("web")),
            )
            .child("everything", &inner.array().unwrap())
            .build()
            .unwrap()
    }

    #[test]
    fn children_inherit_bindings_without_mapping() {
        let root = Node::root(&site(2)).unwrap();
        let plain = root.child("plain").unwrap();
        assert_eq!(plain.hosts(), root.hosts());
        assert!(plain.is_isolated());
    }

    #[test]
    fn array_cells() {
        let root = Node::root(&site(3)).unwrap();
        let web = root.child("web").unwrap();
        assert!(!web.is_isolated());
        assert_eq!(slugs(&web, "host"), ["a", "b", "c"]);

        let cells = web.isolations().unwrap();
        assert_eq!(cells.len(), 3);
        assert!(cells.iter().all(Node::is_isolated));
        assert_eq!(cells[1].host().unwrap().slug(), "b");
        assert_eq!(cells[1].path().to_string(), "Site.web[1]");
    }

    #[test]
    fn default_array_mapping_takes_all_hosts() {
        let root = Node::root(&site(3)).unwrap();
        let everything = root.child("everything").unwrap();
        assert_eq!(slugs(&everything, "host"), ["a", "b", "c", "d"]);
    }

    #[test]
    fn indexing_by_every_scheme() {
        let root = Node::root(&site(3)).unwrap();
        let web = root.child("web").unwrap();
        let b = web.hosts().get_from_slug("b").unwrap();

        let by_index = web.get(1usize).unwrap();
        let by_host = web.get(b).unwrap();
        let by_slug = web.get("b").unwrap();
        assert_eq!(by_index.hosts(), by_host.hosts());
        assert_eq!(by_index.hosts(), by_slug.hosts());

        assert_eq!(by_index, by_host);
        assert_eq!(by_index, by_slug);
        assert_eq!(by_slug.path().to_string(), "Site.web[1]");
        assert_eq!(by_slug.key(), by_index.key());

        assert!(matches!(
            web.get(7usize),
            Err(DeployError::Isolation(IsolationError::NotFound { .. }))
        ));
        assert!(matches!(
            by_index.get(0usize),
            Err(DeployError::Isolation(IsolationError::AlreadyIsolated(_)))
        ));
    }

    #[test]
    fn views_compare_by_path() {
        let class = site(2);
        let root = Node::root(&class).unwrap();
        assert_eq!(root.child("web").unwrap(), root.child("web").unwrap());
        assert_ne!(root.child("web").unwrap(), root.child("plain").unwrap());
        assert_ne!(
            root.child("web").unwrap(),
            Node::root(&site(2)).unwrap().child("web").unwrap()
        );
    }

    #[test]
    fn just_one() {
        let one = NodeClass::simple("One").build().unwrap().just_one().unwrap();
        let build = |count: usize| {
            let class = NodeClass::builder("Root")
                .hosts(HostsDefinition::new().role("host", hosts(&["a", "b"])[..count].to_vec()))
                .child("one", &one.map_roles(RoleMapping::new().host("host")))
                .build()
                .unwrap();
            Node::root(&class).unwrap().child("one")
        };

        let node = build(1).unwrap();
        assert!(node.is_isolated());
        assert_eq!(node.host().unwrap().slug(), "a");

        assert!(matches!(
            build(2),
            Err(DeployError::Isolation(IsolationError::JustOneHostCount { count: 2, .. }))
        ));
    }

    #[test]
    fn arrays_need_a_parent() {
        let array = NodeClass::simple("S").build().unwrap().array().unwrap();
        assert!(matches!(
            Node::root(&array),
            Err(DeployError::Isolation(IsolationError::MissingParent { .. }))
        ));
    }

    #[test]
    fn simple_roots_enumerate_their_hosts() {
        let class = NodeClass::simple("S")
            .hosts(HostsDefinition::new().role("host", hosts(&["x", "y"])))
            .build()
            .unwrap();
        let root = Node::root(&class).unwrap();
        assert!(!root.is_isolated());

        let ids: Vec<String> = root
            .iter_isolations(IdentifierScheme::HostSlugs)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id.to_string())
            .collect();
        assert_eq!(ids, [r#"("x")"#, r#"("y")"#]);
    }

    #[test]
    fn unknown_children() {
        let root = Node::root(&site(1)).unwrap();
        assert!(matches!(
            root.child("nope"),
            Err(DeployError::Attribute(AttributeError::Unknown { .. }))
        ));
    }
}
