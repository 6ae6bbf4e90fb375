//! isolation: splitting not yet isolated nodes into cells, one per host
//!
//! A cell is addressed by one key per array dimension between the root and the node. The key of a dimension is the
//! host's position in the `host` role, the host itself or its slug, depending on the [IdentifierScheme]. Cells always
//! remember their position, so a cell has the same path whichever scheme found it.
use super::{Node, NodeKind};
use crate::error::Result;
use crate::hosts::HostHandle;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IsolationKey {
    Index(usize),
    Host(HostHandle),
    Slug(String),
}

impl std::fmt::Display for IsolationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IsolationKey::Index(index) => write!(f, "{index}"),
            IsolationKey::Host(host) => write!(f, "{host}"),
            IsolationKey::Slug(slug) => write!(f, "{slug:?}"),
        }
    }
}

impl serde::Serialize for IsolationKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            IsolationKey::Index(index) => serializer.serialize_u64(*index as u64),
            IsolationKey::Host(host) => serializer.serialize_str(host.slug()),
            IsolationKey::Slug(slug) => serializer.serialize_str(slug),
        }
    }
}

/// Identifier of one cell, one key per array dimension
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, serde::Serialize)]
pub struct IsolationId(pub Vec<IsolationKey>);

impl IsolationId {
    fn extended(&self, key: IsolationKey) -> Self {
        let mut keys = self.0.clone();
        keys.push(key);
        Self(keys)
    }
}

impl std::fmt::Display for IsolationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "({})", keys.join(", "))
    }
}

impl From<usize> for IsolationId {
    fn from(index: usize) -> Self {
        Self(vec![IsolationKey::Index(index)])
    }
}

impl From<&str> for IsolationId {
    fn from(slug: &str) -> Self {
        Self(vec![IsolationKey::Slug(slug.to_string())])
    }
}

impl From<String> for IsolationId {
    fn from(slug: String) -> Self {
        Self(vec![IsolationKey::Slug(slug)])
    }
}

impl From<HostHandle> for IsolationId {
    fn from(host: HostHandle) -> Self {
        Self(vec![IsolationKey::Host(host)])
    }
}

impl From<&HostHandle> for IsolationId {
    fn from(host: &HostHandle) -> Self {
        host.clone().into()
    }
}

impl<const N: usize> From<[usize; N]> for IsolationId {
    fn from(indexes: [usize; N]) -> Self {
        Self(indexes.into_iter().map(IsolationKey::Index).collect())
    }
}

impl<const N: usize> From<[&str; N]> for IsolationId {
    fn from(slugs: [&str; N]) -> Self {
        Self(
            slugs
                .into_iter()
                .map(|slug| IsolationKey::Slug(slug.to_string()))
                .collect(),
        )
    }
}

impl From<Vec<IsolationKey>> for IsolationId {
    fn from(keys: Vec<IsolationKey>) -> Self {
        Self(keys)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IdentifierScheme {
    /// Position of the host in the `host` role
    #[default]
    IntTuples,
    HostTuples,
    HostSlugs,
}

impl IdentifierScheme {
    pub const ALL: [IdentifierScheme; 3] = [
        IdentifierScheme::IntTuples,
        IdentifierScheme::HostTuples,
        IdentifierScheme::HostSlugs,
    ];

    fn key(self, index: usize, host: &HostHandle) -> IsolationKey {
        match self {
            IdentifierScheme::IntTuples => IsolationKey::Index(index),
            IdentifierScheme::HostTuples => IsolationKey::Host(host.clone()),
            IdentifierScheme::HostSlugs => IsolationKey::Slug(host.slug().to_string()),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum IsolationError {
    #[error("indexing {0} is not allowed, the node is already isolated")]
    AlreadyIsolated(String),
    #[error("{node} has no isolation {index}")]
    NotFound { node: String, index: String },
    #[error("a {kind} node ({class}) can not be created without a parent")]
    MissingParent { class: String, kind: NodeKind },
    #[error("{class} requires exactly one host for role `host`, {count} given")]
    JustOneHostCount { class: String, count: usize },
}

/// Every cell of `node` with its identifier, in host order
#[tracing::instrument(level = "trace", skip_all, fields(node = %node.path()))]
pub(crate) fn iter_isolations(
    node: &Node,
    scheme: IdentifierScheme,
) -> Result<Vec<(IsolationId, Node)>> {
    if node.is_isolated() {
        return Ok(vec![(IsolationId::default(), node.clone())]);
    }

    let mut cells = Vec::new();
    match (node.kind(), node.parent()) {
        (NodeKind::Normal | NodeKind::Simple, Some(parent)) => {
            for (id, parent_cell) in iter_isolations(parent, scheme)? {
                cells.push((id, parent_cell.child(node.name())?));
            }
        }
        (NodeKind::SimpleArray | NodeKind::SimpleOne, Some(parent)) => {
            for (parent_id, parent_cell) in iter_isolations(parent, scheme)? {
                let resolved = parent_cell.child(node.name())?;
                for (index, (host, narrowed)) in resolved.hosts().iterate_isolations("host").enumerate() {
                    let cell = resolved.to_cell(Some(parent_cell.clone()), narrowed, index);
                    cells.push((parent_id.extended(scheme.key(index, &host)), cell));
                }
            }
        }
        (NodeKind::Simple, None) => {
            for (index, (host, narrowed)) in node.hosts().iterate_isolations("host").enumerate() {
                let id = IsolationId(vec![scheme.key(index, &host)]);
                cells.push((id, node.to_cell(None, narrowed, index)));
            }
        }
        (kind, None) => {
            // normal roots are isolated, array roots are rejected when created
            return Err(IsolationError::MissingParent {
                class: node.class().name().to_string(),
                kind,
            }
            .into());
        }
    }

    tracing::trace!(count = cells.len(), "isolations");
    Ok(cells)
}
