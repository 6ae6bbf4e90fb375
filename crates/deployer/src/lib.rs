//! # deployer - declarative deployment trees
//!
//! ## Introduction for developers
//!
//! Read this to understand how `deployer` works internally.
//!
//! ### Terms
//!
//! - a **node class** ([node::NodeClass]) describes a node: its kind, where its hosts come from and its members
//!   (actions, child nodes, properties, queries, plain attributes)
//! - a **node** ([node::Node]) is an instance of a class at one position of the tree, with concrete role bindings
//! - a **role** is a named list of hosts (`web`, `db`, ...), [hosts::RoleBindings] holds all roles of a node
//! - the `host` role is special: arrays are split on it into **cells**, one per host
//!
//! ### Declaring
//!
//! Classes are declared through [node::NodeClassBuilder] and validated as a whole in
//! [node::NodeClassBuilder::build]. Nesting rules depend on the kinds involved:
//!
//! | parent \ child | Normal   | Simple   | SimpleArray | SimpleOne |
//! |----------------|----------|----------|-------------|-----------|
//! | Normal         | optional | illegal  | required    | required  |
//! | Simple*        | optional | optional | illegal     | illegal   |
//!
//! _optional/required refers to the hosts definition or role mapping of the child._
//!
//! ### Instantiating
//!
//! A root node gets its bindings from its static hosts definition. Children are instantiated on access: without a
//! mapping they inherit the parent's bindings, otherwise [node::RoleMapping::apply] derives them. A class with a static
//! hosts definition ignores its parent.
//!
//! Nodes are views, nothing is cached. Two views of the same position compare equal ([node::NodeKey]).
//!
//! ### Isolation
//!
//! A simple node is *isolated* when it is bound to exactly one host. Arrays are not isolated, their cells are
//! ([node::Node::isolations], [node::Node::get]). Everything nested in a cell is isolated as well.
//!
//! ### Running
//!
//! Actions run through [env::Env], the node together with the logger, console and options of the run. Calling an
//! action on an array that is not isolated yet forks one thread per cell and returns the results in cell order
//! ([env::EnvAction::call]). Failed host commands can be retried when a user is attending ([console::Console]).
//!
//! ### Queries
//!
//! [query::Q] builds lazy expressions (`Q.parent().attr("port") + 1`) that are stored as members and evaluated
//! against the node they are accessed on.
//!
//! ### Configuration
//!
//! Hosts, roles and run options can be loaded from `*.hosts.hcl` files, see [hosts::inventory].
//!
pub mod console;
pub mod env;
pub mod error;
pub mod hosts;
pub mod inspection;
pub mod logger;
pub mod node;
pub mod query;
pub mod value;
pub mod visit;
