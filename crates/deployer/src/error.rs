//! error taxonomy
//!
//! Each concern defines its own error next to the code that raises it, [DeployError] collects all of them.
//! Action bodies return [anyhow::Result] and may return any of these errors, they are recovered through downcasting.
pub use crate::console::ConsoleError;
pub use crate::env::action::{ActionException, ForkAggregateError};
pub use crate::env::{AttributeError, RequiredPropertyError};
pub use crate::hosts::inventory::InventoryError;
pub use crate::hosts::{ExecFailed, HostsError};
pub use crate::node::class::{DefinitionErrors, DefinitionIssue};
pub use crate::node::isolation::IsolationError;
pub use crate::query::{EvaluationError, QueryError};

#[derive(thiserror::Error, Debug)]
pub enum DeployError {
    #[error(transparent)]
    Definition(#[from] DefinitionErrors),
    #[error(transparent)]
    RequiredProperty(#[from] RequiredPropertyError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Isolation(#[from] IsolationError),
    #[error(transparent)]
    Action(#[from] ActionException),
    #[error(transparent)]
    Fork(#[from] ForkAggregateError),
    #[error(transparent)]
    ExecFailed(#[from] ExecFailed),
    #[error(transparent)]
    Hosts(#[from] HostsError),
    #[error(transparent)]
    Attribute(#[from] AttributeError),
    #[error(transparent)]
    Console(#[from] ConsoleError),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

pub type Result<T, E = DeployError> = std::result::Result<T, E>;

impl DeployError {
    /// The innermost error of an action failure, following nested [ActionException]s
    pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
        match self {
            DeployError::Action(exception) => exception.root_cause(),
            other => other,
        }
    }
}
