//! role bindings: role name -> ordered hosts
use super::HostHandle;
use indexmap::IndexMap;
use std::sync::Arc;

/// Declared hosts of a node class
///
/// ```
/// # use deployer::hosts::{HostHandle, HostsDefinition, LocalHost};
/// let web = HostHandle::new(LocalHost::new("web"));
/// let definition = HostsDefinition::new()
///     .role("host", [web.clone()])
///     .role("proxy", [web]);
/// assert_eq!(definition.roles().count(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct HostsDefinition {
    roles: IndexMap<String, Vec<HostHandle>>,
}

impl HostsDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds hosts to `role`, creating the role when needed
    pub fn role(
        mut self,
        name: impl Into<String>,
        hosts: impl IntoIterator<Item = HostHandle>,
    ) -> Self {
        self.roles.entry(name.into()).or_default().extend(hosts);
        self
    }

    pub fn roles(&self) -> impl Iterator<Item = (&str, &[HostHandle])> {
        self.roles
            .iter()
            .map(|(role, hosts)| (role.as_str(), hosts.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Role bindings of one node instance
///
/// Roles and the hosts inside a role keep their declaration order, [RoleBindings::roles] is sorted by name.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RoleBindings {
    roles: IndexMap<String, Vec<HostHandle>>,
}

impl RoleBindings {
    /// Creates bindings, failing when two different host objects share a slug
    pub fn new(
        roles: impl IntoIterator<Item = (String, Vec<HostHandle>)>,
    ) -> Result<Self, HostsError> {
        let roles: IndexMap<String, Vec<HostHandle>> = roles.into_iter().collect();

        let mut seen: std::collections::HashMap<&str, &HostHandle> = Default::default();
        for host in roles.values().flatten() {
            match seen.get(host.slug()) {
                Some(existing) if !existing.same_instance(host) => {
                    return Err(HostsError::DuplicateSlug(host.slug().to_string()))
                }
                Some(_) => {}
                None => {
                    seen.insert(host.slug(), host);
                }
            }
        }

        Ok(Self { roles })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_static_definition(definition: &HostsDefinition) -> Result<Self, HostsError> {
        Self::new(
            definition
                .roles()
                .map(|(role, hosts)| (role.to_string(), hosts.to_vec())),
        )
    }

    /// Hosts matching `filter`, deduplicated, in first seen order
    pub fn filter(&self, filter: impl Into<HostFilter>) -> Vec<HostHandle> {
        let mut result = Vec::new();
        self.collect_into(&filter.into(), &mut result);
        result
    }

    fn collect_into(&self, filter: &HostFilter, result: &mut Vec<HostHandle>) {
        let mut push = |host: &HostHandle| {
            if !result.contains(host) {
                result.push(host.clone());
            }
        };

        match filter {
            HostFilter::All => self.roles.values().flatten().for_each(push),
            HostFilter::Role(role) => self.role(role).iter().for_each(push),
            HostFilter::Host(host) => push(host),
            HostFilter::Matching(predicate) => self
                .roles
                .values()
                .flatten()
                .filter(|host| predicate(host))
                .for_each(push),
            HostFilter::Any(filters) => {
                for filter in filters {
                    self.collect_into(filter, result);
                }
            }
        }
    }

    /// Exactly one host matching `filter`
    pub fn get(&self, filter: impl Into<HostFilter>) -> Result<HostHandle, HostsError> {
        let filter = filter.into();
        let mut hosts = self.filter(filter.clone());
        if hosts.len() != 1 {
            return Err(HostsError::NotExactlyOne {
                filter: filter.to_string(),
                count: hosts.len(),
            });
        }
        Ok(hosts.remove(0))
    }

    /// Hosts bound to `role`, empty when the role does not exist
    pub fn role(&self, role: &str) -> &[HostHandle] {
        self.roles.get(role).map(Vec::as_slice).unwrap_or_default()
    }

    /// One `(host, bindings)` pair per host of `role`, where `role` is narrowed to that single host
    pub fn iterate_isolations<'a>(
        &'a self,
        role: &'a str,
    ) -> impl Iterator<Item = (HostHandle, RoleBindings)> + 'a {
        self.role(role).iter().map(move |host| {
            let mut narrowed = self.clone();
            narrowed.roles.insert(role.to_string(), vec![host.clone()]);
            (host.clone(), narrowed)
        })
    }

    /// Role names, sorted
    pub fn roles(&self) -> impl Iterator<Item = &str> {
        let mut roles: Vec<&str> = self.roles.keys().map(String::as_str).collect();
        roles.sort_unstable();
        roles.into_iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[HostHandle])> {
        self.roles
            .iter()
            .map(|(role, hosts)| (role.as_str(), hosts.as_slice()))
    }

    /// All distinct hosts
    pub fn all(&self) -> Vec<HostHandle> {
        self.filter(HostFilter::All)
    }

    /// Number of distinct hosts
    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.values().all(Vec::is_empty)
    }

    pub fn contains(&self, host: &HostHandle) -> bool {
        self.roles.values().flatten().any(|h| h == host)
    }

    pub fn get_from_slug(&self, slug: &str) -> Option<HostHandle> {
        self.roles
            .values()
            .flatten()
            .find(|host| host.slug() == slug)
            .cloned()
    }
}

impl std::fmt::Debug for RoleBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.roles
                    .iter()
                    .map(|(role, hosts)| (role, hosts.iter().map(HostHandle::slug).collect::<Vec<_>>())),
            )
            .finish()
    }
}

impl std::fmt::Display for RoleBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, role) in self.roles().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            let slugs: Vec<&str> = self.role(role).iter().map(HostHandle::slug).collect();
            write!(f, "{role}: {}", slugs.join(", "))?;
        }
        Ok(())
    }
}

impl serde::Serialize for RoleBindings {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.roles.iter())
    }
}

/// Selects hosts out of [RoleBindings]
///
/// `"*"` selects every host, any other string selects a role.
#[derive(Clone)]
pub enum HostFilter {
    All,
    Role(String),
    Host(HostHandle),
    Any(Vec<HostFilter>),
    Matching(Arc<dyn Fn(&HostHandle) -> bool + Send + Sync>),
}

impl HostFilter {
    pub fn matching(predicate: impl Fn(&HostHandle) -> bool + Send + Sync + 'static) -> Self {
        Self::Matching(Arc::new(predicate))
    }
}

impl std::fmt::Display for HostFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostFilter::All => f.write_str("*"),
            HostFilter::Role(role) => f.write_str(role),
            HostFilter::Host(host) => write!(f, "{host}"),
            HostFilter::Any(filters) => {
                let filters: Vec<String> = filters.iter().map(ToString::to_string).collect();
                write!(f, "({})", filters.join(" | "))
            }
            HostFilter::Matching(_) => f.write_str("<predicate>"),
        }
    }
}

impl std::fmt::Debug for HostFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HostFilter({self})")
    }
}

impl From<&str> for HostFilter {
    fn from(value: &str) -> Self {
        match value {
            "*" => HostFilter::All,
            role => HostFilter::Role(role.to_string()),
        }
    }
}

impl From<String> for HostFilter {
    fn from(value: String) -> Self {
        value.as_str().into()
    }
}

impl From<&String> for HostFilter {
    fn from(value: &String) -> Self {
        value.as_str().into()
    }
}

impl From<HostHandle> for HostFilter {
    fn from(value: HostHandle) -> Self {
        HostFilter::Host(value)
    }
}

impl From<&HostHandle> for HostFilter {
    fn from(value: &HostHandle) -> Self {
        HostFilter::Host(value.clone())
    }
}

impl From<&[&str]> for HostFilter {
    fn from(value: &[&str]) -> Self {
        HostFilter::Any(value.iter().map(|role| (*role).into()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for HostFilter {
    fn from(value: [&str; N]) -> Self {
        value.as_slice().into()
    }
}

impl From<Vec<&str>> for HostFilter {
    fn from(value: Vec<&str>) -> Self {
        value.as_slice().into()
    }
}

impl From<Vec<HostFilter>> for HostFilter {
    fn from(value: Vec<HostFilter>) -> Self {
        HostFilter::Any(value)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HostsError {
    #[error("two different hosts use the slug `{0}`")]
    DuplicateSlug(String),
    #[error("expected exactly one host for `{filter}`, found {count}")]
    NotExactlyOne { filter: String, count: usize },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hosts::LocalHost;
    use pretty_assertions::assert_eq;

    fn host(slug: &str) -> HostHandle {
        HostHandle::new(LocalHost::new(slug))
    }

    fn slugs(hosts: &[HostHandle]) -> Vec<&str> {
        hosts.iter().map(HostHandle::slug).collect()
    }

    fn bindings() -> RoleBindings {
        let (h1, h2, h3) = (host("h1"), host("h2"), host("h3"));
        RoleBindings::from_static_definition(
            &HostsDefinition::new()
                .role("role2", [h3, h1.clone()])
                .role("role1", [h1, h2]),
        )
        .unwrap()
    }

    #[test]
    fn roles_are_sorted() {
        let bindings = bindings();
        assert_eq!(bindings.roles().collect::<Vec<_>>(), ["role1", "role2"]);
        assert_eq!(
            bindings.iter().map(|(role, _)| role).collect::<Vec<_>>(),
            ["role2", "role1"]
        );
        assert_eq!(bindings.to_string(), "role1: h1, h2; role2: h3, h1");
    }

    #[test]
    fn every_host_in_declaration_order() {
        let (d, a, b) = (host("d"), host("a"), host("b"));
        let bindings = RoleBindings::from_static_definition(
            &HostsDefinition::new()
                .role("web", [a.clone(), b.clone()])
                .role("db", [d.clone()]),
        )
        .unwrap();
        assert_eq!(slugs(&bindings.all()), ["a", "b", "d"]);
        assert_eq!(slugs(&bindings.filter("*")), ["a", "b", "d"]);
        assert_eq!(bindings.get_from_slug("d"), Some(d));
    }

    #[test]
    fn filter() {
        let bindings = bindings();
        assert_eq!(slugs(&bindings.filter("role1")), ["h1", "h2"]);
        assert_eq!(slugs(&bindings.filter(["role2", "role1"])), ["h3", "h1", "h2"]);
        assert_eq!(slugs(&bindings.filter("*")), ["h3", "h1", "h2"]);
        assert_eq!(slugs(&bindings.filter("missing")), Vec::<&str>::new());

        let extra = host("extra");
        let mixed = HostFilter::from(vec![HostFilter::from("role2"), extra.into()]);
        assert_eq!(slugs(&bindings.filter(mixed)), ["h3", "h1", "extra"]);

        let odd = HostFilter::matching(|host| host.slug() != "h2");
        assert_eq!(slugs(&bindings.filter(odd)), ["h3", "h1"]);
    }

    #[test]
    fn get_requires_exactly_one() {
        let bindings = bindings();
        let err = bindings.get("role1").unwrap_err();
        assert_eq!(
            err,
            HostsError::NotExactlyOne {
                filter: "role1".to_string(),
                count: 2
            }
        );
        assert_eq!(bindings.get_from_slug("h3").unwrap().slug(), "h3");
    }

    #[test]
    fn isolations_narrow_only_the_given_role() {
        let bindings = bindings();
        let cells: Vec<_> = bindings.iterate_isolations("role1").collect();
        assert_eq!(cells.len(), 2);

        let (host, narrowed) = &cells[1];
        assert_eq!(host.slug(), "h2");
        assert_eq!(slugs(narrowed.role("role1")), ["h2"]);
        assert_eq!(slugs(narrowed.role("role2")), ["h3", "h1"]);
    }

    #[test]
    fn duplicate_slugs_are_rejected() {
        let err = RoleBindings::from_static_definition(
            &HostsDefinition::new().role("a", [host("same")]).role("b", [host("same")]),
        )
        .unwrap_err();
        assert_eq!(err, HostsError::DuplicateSlug("same".to_string()));
    }

    #[test]
    fn equality_is_order_sensitive_within_roles() {
        let (a, b) = (host("a"), host("b"));
        let one = RoleBindings::new([("r".to_string(), vec![a.clone(), b.clone()])]).unwrap();
        let same = RoleBindings::new([("r".to_string(), vec![a.clone(), b.clone()])]).unwrap();
        let swapped = RoleBindings::new([("r".to_string(), vec![b, a])]).unwrap();
        assert_eq!(one, same);
        assert_ne!(one, swapped);
        assert_eq!(one.to_string(), "r: a, b");
    }
}
