//! role mapping: derive a child's role bindings from its parent's
//!
//! ```
//! # use deployer::node::role_mapping::{RoleMapping, ALL_HOSTS};
//! let mapping = RoleMapping::new()
//!     .host("web")
//!     .map("extra", ["cache", "db"])
//!     .map("everything", ALL_HOSTS);
//! ```
//!
//! A child without a mapping receives its parent's bindings unchanged.
use crate::hosts::{HostFilter, HostHandle, HostsError, RoleBindings};
use indexmap::IndexMap;

/// Source of hosts for one role of the child
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingTarget {
    Role(String),
    Host(HostHandle),
    AllHosts,
}

/// Every host of the parent
pub const ALL_HOSTS: MappingTarget = MappingTarget::AllHosts;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleMapping {
    mappings: IndexMap<String, Vec<MappingTarget>>,
    keep_unmapped: bool,
}

impl RoleMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps the `host` role, the role cells of arrays are split on
    pub fn host(self, targets: impl IntoMappingTargets) -> Self {
        self.map("host", targets)
    }

    pub fn map(mut self, role: impl Into<String>, targets: impl IntoMappingTargets) -> Self {
        self.mappings
            .entry(role.into())
            .or_default()
            .extend(targets.into_mapping_targets());
        self
    }

    /// Parent roles that are not mapped explicitly are passed on unchanged
    pub fn keep_unmapped(mut self) -> Self {
        self.keep_unmapped = true;
        self
    }

    pub fn mappings(&self) -> impl Iterator<Item = (&str, &[MappingTarget])> {
        self.mappings
            .iter()
            .map(|(role, targets)| (role.as_str(), targets.as_slice()))
    }

    #[tracing::instrument(level = "trace", skip_all)]
    pub fn apply(&self, parent: &RoleBindings) -> Result<RoleBindings, HostsError> {
        let mut roles: IndexMap<String, Vec<HostHandle>> = IndexMap::new();

        for (role, targets) in &self.mappings {
            let filter: Vec<HostFilter> = targets
                .iter()
                .map(|target| match target {
                    MappingTarget::Role(parent_role) => parent_role.into(),
                    MappingTarget::Host(host) => host.into(),
                    MappingTarget::AllHosts => HostFilter::All,
                })
                .collect();
            let hosts = parent.filter(filter);
            tracing::trace!(%role, ?hosts, "mapped role");
            roles.insert(role.clone(), hosts);
        }

        if self.keep_unmapped {
            for (role, hosts) in parent.iter() {
                if !roles.contains_key(role) {
                    roles.insert(role.to_string(), hosts.to_vec());
                }
            }
        }

        RoleBindings::new(roles)
    }
}

/// Anything that names the parent hosts for a role
pub trait IntoMappingTargets {
    fn into_mapping_targets(self) -> Vec<MappingTarget>;
}

impl IntoMappingTargets for MappingTarget {
    fn into_mapping_targets(self) -> Vec<MappingTarget> {
        vec![self]
    }
}

impl IntoMappingTargets for &str {
    fn into_mapping_targets(self) -> Vec<MappingTarget> {
        vec![MappingTarget::Role(self.to_string())]
    }
}

impl IntoMappingTargets for String {
    fn into_mapping_targets(self) -> Vec<MappingTarget> {
        vec![MappingTarget::Role(self)]
    }
}

impl IntoMappingTargets for HostHandle {
    fn into_mapping_targets(self) -> Vec<MappingTarget> {
        vec![MappingTarget::Host(self)]
    }
}

impl<const N: usize> IntoMappingTargets for [&str; N] {
    fn into_mapping_targets(self) -> Vec<MappingTarget> {
        self.into_iter()
            .flat_map(IntoMappingTargets::into_mapping_targets)
            .collect()
    }
}

impl IntoMappingTargets for Vec<&str> {
    fn into_mapping_targets(self) -> Vec<MappingTarget> {
        self.into_iter()
            .flat_map(IntoMappingTargets::into_mapping_targets)
            .collect()
    }
}

impl<const N: usize> IntoMappingTargets for [MappingTarget; N] {
    fn into_mapping_targets(self) -> Vec<MappingTarget> {
        self.into()
    }
}

impl IntoMappingTargets for Vec<MappingTarget> {
    fn into_mapping_targets(self) -> Vec<MappingTarget> {
        self
    }
}
