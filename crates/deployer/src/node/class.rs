//! node classes: immutable descriptions of nodes
//!
//! A [NodeClass] is built once through [NodeClassBuilder] and shared as `Arc<NodeClass>`. Building validates the
//! whole declaration (nesting rules, reserved names, nested overrides) and reports every issue at once.
//!
//! ```
//! # use deployer::node::class::NodeClass;
//! # use deployer::node::role_mapping::RoleMapping;
//! # use deployer::value::Value;
//! let web = NodeClass::simple("Web")
//!     .action("restart", |env, _args| Ok(Value::from(env.host()?.slug())))
//!     .build()?;
//!
//! let site = NodeClass::builder("Site")
//!     .child("web", &web.array()?.map_roles(RoleMapping::new().host("web")))
//!     .build()?;
//! # Ok::<(), deployer::error::DefinitionErrors>(())
//! ```
use super::group::Group;
use super::role_mapping::{RoleMapping, ALL_HOSTS};
use crate::env::Env;
use crate::hosts::HostsDefinition;
use crate::query::Query;
use crate::value::{Args, Value};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;

/// Name of the member holding the default action
pub const DEFAULT_ACTION: &str = "__default__";

const RESERVED_NAMES: &[&str] = &["host", "hosts", "parent"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum NodeKind {
    /// One logical instance, never split
    Normal,
    /// Base of arrays, nestable in other simple kinds
    Simple,
    /// One cell per host of the `host` role
    SimpleArray,
    /// Like [NodeKind::SimpleArray] but bound to exactly one host
    SimpleOne,
}

impl NodeKind {
    pub fn is_simple(self) -> bool {
        !matches!(self, NodeKind::Normal)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Normal => f.write_str("normal"),
            NodeKind::Simple => f.write_str("simple"),
            NodeKind::SimpleArray => f.write_str("simple array"),
            NodeKind::SimpleOne => f.write_str("simple one"),
        }
    }
}

/// Whether a nested class has to carry a hosts definition or mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingRule {
    Optional,
    Required,
    NotAllowed,
}

impl MappingRule {
    /// Nesting table, `None` when `child` can not be nested in `parent` at all
    pub fn for_nesting(parent: NodeKind, child: NodeKind) -> Option<MappingRule> {
        use NodeKind::*;

        match (parent, child) {
            (Normal, Normal) => Some(MappingRule::Optional),
            (Normal, SimpleArray | SimpleOne) => Some(MappingRule::Required),
            (Simple | SimpleArray | SimpleOne, Simple | Normal) => Some(MappingRule::Optional),
            _ => None,
        }
    }

    pub fn allows(self, has_mapping: bool) -> bool {
        match self {
            MappingRule::Optional => true,
            MappingRule::Required => has_mapping,
            MappingRule::NotAllowed => !has_mapping,
        }
    }
}

/// Where the hosts of a node come from
#[derive(Debug, Clone)]
pub enum HostsSpec {
    /// Fixed hosts, the parent's bindings are ignored
    Static(HostsDefinition),
    /// Derived from the parent's bindings
    Mapping(RoleMapping),
}

pub type ActionFn = Arc<dyn Fn(&Env, &Args) -> anyhow::Result<Value> + Send + Sync>;
pub type PropertyFn = Arc<dyn Fn(&Env) -> anyhow::Result<Value> + Send + Sync>;

/// An action: a function run with the node's [Env] as first argument
#[derive(Clone)]
pub struct Action {
    name: String,
    func: ActionFn,
    dont_isolate_yet: bool,
    isolate_one_only: bool,
    suppress_result: bool,
    aliases: Vec<String>,
}

impl Action {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&Env, &Args) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            func: Arc::new(func),
            dont_isolate_yet: false,
            isolate_one_only: false,
            suppress_result: false,
            aliases: Vec::new(),
        }
    }

    /// Runs once on a not yet isolated node instead of once per cell
    pub fn dont_isolate_yet(mut self) -> Self {
        self.dont_isolate_yet = true;
        self
    }

    /// Runs on a single cell, chosen through the console
    pub fn isolate_one_only(mut self) -> Self {
        self.isolate_one_only = true;
        self
    }

    /// The result is not meant to be shown to a user
    pub fn suppress_result(mut self) -> Self {
        self.suppress_result = true;
        self
    }

    /// Makes the action available under `alias` as well
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_dont_isolate_yet(&self) -> bool {
        self.dont_isolate_yet
    }

    pub fn is_isolate_one_only(&self) -> bool {
        self.isolate_one_only
    }

    pub fn is_suppress_result(&self) -> bool {
        self.suppress_result
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub(crate) fn run(&self, env: &Env, args: &Args) -> anyhow::Result<Value> {
        (self.func)(env, args)
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Action({})", self.name)
    }
}

#[derive(Clone)]
pub struct Property {
    func: PropertyFn,
}

impl Property {
    pub fn new(func: impl Fn(&Env) -> anyhow::Result<Value> + Send + Sync + 'static) -> Self {
        Self {
            func: Arc::new(func),
        }
    }

    pub(crate) fn run(&self, env: &Env) -> anyhow::Result<Value> {
        (self.func)(env)
    }
}

impl std::fmt::Debug for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Property")
    }
}

/// A declared member of a node class
#[derive(Debug, Clone)]
pub enum Member {
    Action(Action),
    Child(Arc<NodeClass>),
    Property(Property),
    Query(Query),
    /// Has to be provided by a derived class
    RequiredProperty { description: String },
    /// Plain value, passed through unchanged
    Attribute(Value),
}

impl Member {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Member::Action(_) => "action",
            Member::Child(_) => "child node",
            Member::Property(_) => "property",
            Member::Query(_) => "query",
            Member::RequiredProperty { .. } => "required property",
            Member::Attribute(_) => "attribute",
        }
    }
}

#[derive(Debug)]
pub struct NodeClass {
    name: String,
    kind: NodeKind,
    hosts: Option<HostsSpec>,
    members: IndexMap<String, Member>,
    lineage: Vec<String>,
    group: Option<Group>,
}

impl NodeClass {
    /// Starts a class of kind [NodeKind::Normal]
    pub fn builder(name: impl Into<String>) -> NodeClassBuilder {
        NodeClassBuilder::new(name.into(), NodeKind::Normal)
    }

    /// Starts a class of kind [NodeKind::Simple]
    pub fn simple(name: impl Into<String>) -> NodeClassBuilder {
        NodeClassBuilder::new(name.into(), NodeKind::Simple)
    }

    /// Starts a class deriving from this one
    pub fn extend(self: &Arc<Self>, name: impl Into<String>) -> NodeClassBuilder {
        NodeClassBuilder::new(name.into(), self.kind).extends(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn hosts(&self) -> Option<&HostsSpec> {
        self.hosts.as_ref()
    }

    pub fn group(&self) -> Option<&Group> {
        self.group.as_ref()
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.get(name)
    }

    /// All members in declaration order, inherited ones first
    pub fn members(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|(name, member)| (name.as_str(), member))
    }

    /// Action declared (or inherited) under `name`
    pub fn action(&self, name: &str) -> Option<&Action> {
        match self.members.get(name) {
            Some(Member::Action(action)) => Some(action),
            _ => None,
        }
    }

    pub fn default_action(&self) -> Option<&Action> {
        self.action(DEFAULT_ACTION)
    }

    /// Child classes in declaration order
    pub fn children(&self) -> impl Iterator<Item = (&str, &Arc<NodeClass>)> {
        self.members.iter().filter_map(|(name, member)| match member {
            Member::Child(class) => Some((name.as_str(), class)),
            _ => None,
        })
    }

    /// Names of this class and all its base classes, most derived first
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.lineage.iter().any(|n| n == name)
    }

    /// Array variant: one cell per host of the `host` role
    pub fn array(self: &Arc<Self>) -> Result<Arc<NodeClass>, DefinitionErrors> {
        self.simple_variant("Array", NodeKind::SimpleArray)
    }

    /// Variant that requires exactly one host in the `host` role
    pub fn just_one(self: &Arc<Self>) -> Result<Arc<NodeClass>, DefinitionErrors> {
        self.simple_variant("JustOne", NodeKind::SimpleOne)
    }

    fn simple_variant(
        self: &Arc<Self>,
        suffix: &'static str,
        kind: NodeKind,
    ) -> Result<Arc<NodeClass>, DefinitionErrors> {
        if self.kind != NodeKind::Simple {
            let mut e = DefinitionErrors::new(self.name.clone());
            e.log(DefinitionIssue::NotSimple {
                operation: suffix,
                kind: self.kind,
            });
            return Err(e);
        }

        let name = format!("{}.{suffix}", self.name);
        let mut lineage = vec![name.clone()];
        lineage.extend(self.lineage.iter().cloned());

        Ok(Arc::new(NodeClass {
            name,
            kind,
            hosts: Some(
                self.hosts
                    .clone()
                    .unwrap_or_else(|| HostsSpec::Mapping(RoleMapping::new().host(ALL_HOSTS))),
            ),
            members: self.members.clone(),
            lineage,
            group: self.group.clone(),
        }))
    }

    /// Same class, with hosts derived from the parent through `mapping`
    pub fn map_roles(self: &Arc<Self>, mapping: RoleMapping) -> Arc<NodeClass> {
        Arc::new(NodeClass {
            name: self.name.clone(),
            kind: self.kind,
            hosts: Some(HostsSpec::Mapping(mapping)),
            members: self.members.clone(),
            lineage: self.lineage.clone(),
            group: self.group.clone(),
        })
    }
}

/// Collects the declaration of a [NodeClass]
pub struct NodeClassBuilder {
    name: String,
    kind: NodeKind,
    hosts: Option<HostsSpec>,
    members: IndexMap<String, Member>,
    own: IndexSet<String>,
    lineage: Vec<String>,
    has_base: bool,
    group: Option<Group>,
    issues: DefinitionErrors,
}

impl NodeClassBuilder {
    fn new(name: String, kind: NodeKind) -> Self {
        Self {
            lineage: vec![name.clone()],
            issues: DefinitionErrors::new(name.clone()),
            name,
            kind,
            hosts: None,
            members: IndexMap::new(),
            own: IndexSet::new(),
            has_base: false,
            group: None,
        }
    }

    /// Inherits kind, hosts, group and members of `base`
    ///
    /// A class has at most one base class.
    pub fn extends(mut self, base: &Arc<NodeClass>) -> Self {
        if self.has_base {
            self.issues.log(DefinitionIssue::MultipleInheritance {
                base: base.name.clone(),
            });
            return self;
        }

        self.has_base = true;
        self.kind = base.kind;
        self.hosts = base.hosts.clone();
        self.group = base.group.clone();
        self.lineage.extend(base.lineage.iter().cloned());

        for (name, member) in &base.members {
            if !self.own.contains(name) {
                self.members.insert(name.clone(), member.clone());
            }
        }
        self
    }

    pub fn member(mut self, name: impl Into<String>, member: Member) -> Self {
        let name = name.into();
        if RESERVED_NAMES.contains(&name.as_str()) {
            self.issues.log(DefinitionIssue::ReservedName(name));
            return self;
        }

        self.own.insert(name.clone());
        self.members.insert(name, member);
        self
    }

    pub fn action(
        self,
        name: impl Into<String>,
        func: impl Fn(&Env, &Args) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        self.with_action(Action::new(name, func))
    }

    /// Adds an action with its flags, registering all its aliases
    pub fn with_action(mut self, action: Action) -> Self {
        for alias in action.aliases.clone() {
            self = self.member(alias, Member::Action(action.clone()));
        }
        let name = action.name.clone();
        self.member(name, Member::Action(action))
    }

    pub fn default_action(
        self,
        func: impl Fn(&Env, &Args) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.action(DEFAULT_ACTION, func)
    }

    pub fn property(
        self,
        name: impl Into<String>,
        func: impl Fn(&Env) -> anyhow::Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.member(name, Member::Property(Property::new(func)))
    }

    pub fn required_property(self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.member(
            name,
            Member::RequiredProperty {
                description: description.into(),
            },
        )
    }

    pub fn query(self, name: impl Into<String>, query: Query) -> Self {
        self.member(name, Member::Query(query))
    }

    pub fn attribute(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.member(name, Member::Attribute(value.into()))
    }

    pub fn child(self, name: impl Into<String>, class: &Arc<NodeClass>) -> Self {
        self.member(name, Member::Child(class.clone()))
    }

    pub fn hosts(mut self, definition: HostsDefinition) -> Self {
        self.hosts = Some(HostsSpec::Static(definition));
        self
    }

    pub fn map_roles(mut self, mapping: RoleMapping) -> Self {
        self.hosts = Some(HostsSpec::Mapping(mapping));
        self
    }

    pub fn group(mut self, group: Group) -> Self {
        self.group = Some(group);
        self
    }

    #[tracing::instrument(level = "trace", skip_all, fields(class = %self.name))]
    pub fn build(mut self) -> Result<Arc<NodeClass>, DefinitionErrors> {
        self.apply_nested_overrides();

        for (name, member) in &self.members {
            let Member::Child(child) = member else {
                continue;
            };

            match MappingRule::for_nesting(self.kind, child.kind) {
                None => self.issues.log(DefinitionIssue::IllegalNesting {
                    child: name.clone(),
                    parent_kind: self.kind,
                    child_kind: child.kind,
                }),
                Some(rule) if !rule.allows(child.hosts.is_some()) => {
                    self.issues.log(DefinitionIssue::InvalidMapping {
                        child: name.clone(),
                        rule,
                    })
                }
                Some(_) => {}
            }
        }

        if !self.issues.is_empty() {
            return Err(self.issues);
        }

        Ok(Arc::new(NodeClass {
            name: self.name,
            kind: self.kind,
            hosts: self.hosts,
            members: self.members,
            lineage: self.lineage,
            group: self.group,
        }))
    }

    /// Members named `child__member` replace `member` inside the inherited child class `child`
    fn apply_nested_overrides(&mut self) {
        let mut overrides: IndexMap<String, Vec<(String, Member)>> = IndexMap::new();

        for name in &self.own {
            if name.starts_with("__") {
                continue;
            }
            let Some((target, rest)) = name.split_once("__") else {
                continue;
            };
            if let Some(member) = self.members.shift_remove(name) {
                overrides
                    .entry(target.to_string())
                    .or_default()
                    .push((rest.to_string(), member));
            }
        }

        for (target, members) in overrides {
            let conflict = self.own.contains(&target);
            let child = match self.members.get(&target) {
                _ if conflict => {
                    self.issues.log(DefinitionIssue::NestedOverrideConflict { target });
                    continue;
                }
                Some(Member::Child(child)) => child.clone(),
                Some(_) => {
                    self.issues.log(DefinitionIssue::NestedOverrideNotANode { target });
                    continue;
                }
                None => {
                    self.issues.log(DefinitionIssue::NestedOverrideMissing { target });
                    continue;
                }
            };

            tracing::trace!(%target, count = members.len(), "nested override");
            let mut builder = child.extend(child.name.clone());
            for (name, member) in members {
                builder = builder.member(name, member);
            }
            match builder.build() {
                Ok(overridden) => {
                    self.members.insert(target, Member::Child(overridden));
                }
                Err(errors) => self.issues.issues.extend(errors.issues),
            }
        }
    }
}

/// Every problem found while building a [NodeClass]
#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionErrors {
    class: String,
    issues: Vec<DefinitionIssue>,
}

impl DefinitionErrors {
    fn new(class: String) -> Self {
        Self {
            class,
            issues: Vec::new(),
        }
    }

    pub fn log(&mut self, issue: DefinitionIssue) {
        tracing::trace!(?issue, "issue found");
        self.issues.push(issue);
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn issues(&self) -> &[DefinitionIssue] {
        &self.issues
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

impl std::error::Error for DefinitionErrors {}

impl std::fmt::Display for DefinitionErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid node class `{}`", self.class)?;
        if let Some(first) = self.issues.first() {
            write!(f, ": {first}")?;
        }
        if self.issues.len() > 1 {
            write!(f, " (and {} more)", self.issues.len() - 1)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DefinitionIssue {
    #[error("`{0}` is a reserved name")]
    ReservedName(String),
    #[error("a node class can only extend one base class (`{base}` is the second)")]
    MultipleInheritance { base: String },
    #[error("a {child_kind} node (`{child}`) can not be nested in a {parent_kind} node")]
    IllegalNesting {
        child: String,
        parent_kind: NodeKind,
        child_kind: NodeKind,
    },
    #[error("child `{child}` violates the mapping rule ({rule:?}) for its nesting")]
    InvalidMapping { child: String, rule: MappingRule },
    #[error("`{target}` is overridden and declared in the same class")]
    NestedOverrideConflict { target: String },
    #[error("override target `{target}` does not exist")]
    NestedOverrideMissing { target: String },
    #[error("override target `{target}` is not a node")]
    NestedOverrideNotANode { target: String },
    #[error(".{operation}() requires a simple node, not a {kind} node")]
    NotSimple {
        operation: &'static str,
        kind: NodeKind,
    },
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn noop(_: &Env, _: &Args) -> anyhow::Result<Value> {
        Ok(Value::Null)
    }

    fn issues(result: Result<Arc<NodeClass>, DefinitionErrors>) -> Vec<DefinitionIssue> {
        result.expect_err("must error").issues().to_vec()
    }

    #[test]
    fn nesting_table() {
        use NodeKind::*;
        let kinds = [Normal, Simple, SimpleArray, SimpleOne];
        let table: Vec<Vec<Option<MappingRule>>> = kinds
            .iter()
            .map(|parent| {
                kinds
                    .iter()
                    .map(|child| MappingRule::for_nesting(*parent, *child))
                    .collect()
            })
            .collect();

        let (o, r) = (Some(MappingRule::Optional), Some(MappingRule::Required));
        assert_eq!(
            table,
            [
                vec![o, None, r, r],
                vec![o, o, None, None],
                vec![o, o, None, None],
                vec![o, o, None, None],
            ]
        );
    }

    #[test]
    fn simple_nodes_can_not_be_nested_in_normal_nodes() {
        let simple = NodeClass::simple("S").build().unwrap();
        assert_eq!(
            issues(NodeClass::builder("N").child("s", &simple).build()),
            [DefinitionIssue::IllegalNesting {
                child: "s".to_string(),
                parent_kind: NodeKind::Normal,
                child_kind: NodeKind::Simple,
            }]
        );
    }

    #[test]
    fn arrays_in_normal_nodes_require_a_mapping() {
        let simple = NodeClass::simple("S").build().unwrap();
        let array = simple.array().unwrap();

        // .array() installs the default mapping
        assert!(NodeClass::builder("N").child("s", &array).build().is_ok());

        let unmapped = Arc::new(NodeClass {
            name: "S.Array".to_string(),
            kind: NodeKind::SimpleArray,
            hosts: None,
            members: IndexMap::new(),
            lineage: vec!["S.Array".to_string()],
            group: None,
        });
        assert_eq!(
            issues(NodeClass::builder("N").child("s", &unmapped).build()),
            [DefinitionIssue::InvalidMapping {
                child: "s".to_string(),
                rule: MappingRule::Required,
            }]
        );
    }

    #[test]
    fn arrays_can_not_be_nested_in_simple_nodes() {
        let array = NodeClass::simple("S").build().unwrap().array().unwrap();
        let result = NodeClass::simple("Outer").child("inner", &array).build();
        assert!(matches!(
            issues(result).as_slice(),
            [DefinitionIssue::IllegalNesting { .. }]
        ));
    }

    #[test]
    fn array_requires_simple_kind() {
        let normal = NodeClass::builder("N").build().unwrap();
        assert!(normal.array().is_err());

        let array = NodeClass::simple("S").build().unwrap().array().unwrap();
        assert_eq!(array.name(), "S.Array");
        assert!(array.is_named("S"));
        assert!(array.just_one().is_err());
    }

    #[test]
    fn reserved_names_and_multiple_inheritance() {
        let a = NodeClass::builder("A").build().unwrap();
        let b = NodeClass::builder("B").build().unwrap();
        let result = a
            .extend("C")
            .extends(&b)
            .attribute("host", 1)
            .action("hosts", noop)
            .build();
        assert_eq!(
            issues(result),
            [
                DefinitionIssue::MultipleInheritance {
                    base: "B".to_string()
                },
                DefinitionIssue::ReservedName("host".to_string()),
                DefinitionIssue::ReservedName("hosts".to_string()),
            ]
        );
    }

    #[test]
    fn aliases_share_the_action() {
        let class = NodeClass::builder("N")
            .with_action(Action::new("start", noop).alias("run").alias("go"))
            .build()
            .unwrap();
        assert_eq!(class.action("go").unwrap().name(), "start");
        assert_eq!(
            class.members().map(|(name, _)| name).collect::<Vec<_>>(),
            ["run", "go", "start"]
        );
    }

    #[test]
    fn inherited_members_can_be_replaced() {
        let base = NodeClass::builder("Base")
            .attribute("a", 1)
            .attribute("b", 2)
            .build()
            .unwrap();
        let derived = base.extend("Derived").attribute("b", 3).build().unwrap();

        assert!(derived.is_named("Base"));
        assert!(matches!(derived.member("a"), Some(Member::Attribute(v)) if *v == Value::from(1)));
        assert!(matches!(derived.member("b"), Some(Member::Attribute(v)) if *v == Value::from(3)));
    }

    #[test]
    fn nested_overrides() {
        let leaf = NodeClass::builder("Leaf").attribute("value", 1).build().unwrap();
        let middle = NodeClass::builder("Middle").child("leaf", &leaf).build().unwrap();
        let base = NodeClass::builder("Base").child("middle", &middle).build().unwrap();

        let derived = base
            .extend("Derived")
            .attribute("middle__leaf__value", 2)
            .build()
            .unwrap();

        let Some(Member::Child(middle)) = derived.member("middle") else {
            panic!("middle must stay a child");
        };
        let Some(Member::Child(leaf)) = middle.member("leaf") else {
            panic!("leaf must stay a child");
        };
        assert!(matches!(leaf.member("value"), Some(Member::Attribute(v)) if *v == Value::from(2)));
        assert!(derived.member("middle__leaf__value").is_none());

        // the base class is untouched
        let Some(Member::Child(original)) = base.member("middle") else {
            panic!()
        };
        assert!(original.member("leaf").is_some());
    }

    #[test]
    fn invalid_nested_overrides() {
        let leaf = NodeClass::builder("Leaf").build().unwrap();
        let base = NodeClass::builder("Base")
            .child("leaf", &leaf)
            .attribute("plain", 1)
            .build()
            .unwrap();

        let result = base
            .extend("Derived")
            .attribute("missing__value", 1)
            .attribute("plain__value", 1)
            .child("leaf", &leaf)
            .attribute("leaf__value", 1)
            .build();

        assert_eq!(
            issues(result),
            [
                DefinitionIssue::NestedOverrideMissing {
                    target: "missing".to_string()
                },
                DefinitionIssue::NestedOverrideNotANode {
                    target: "plain".to_string()
                },
                DefinitionIssue::NestedOverrideConflict {
                    target: "leaf".to_string()
                },
            ]
        );
    }

    #[test]
    fn display_lists_the_first_issue() {
        let errors = issues_as_error();
        assert_eq!(
            errors.to_string(),
            "invalid node class `N`: `host` is a reserved name (and 1 more)"
        );
    }

    fn issues_as_error() -> DefinitionErrors {
        NodeClass::builder("N")
            .attribute("host", 1)
            .attribute("parent", 1)
            .build()
            .expect_err("must error")
    }
}
