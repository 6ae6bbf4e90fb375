//! inventory: hosts, roles and environment options loaded from hcl files
//!
//! ```hcl
//! host "web1" {
//!   address = "10.0.0.1"
//! }
//!
//! role "web" {
//!   hosts = ["web1"]
//! }
//!
//! options {
//!   sandbox     = true
//!   fork_errors = "aggregate"
//! }
//! ```
//!
//! Every `host` block becomes a [LocalHost] unless a host with that slug was registered before
//! ([Inventory::register_host]). Roles may reference hosts declared in any loaded file, they are resolved by
//! [Inventory::definition].
use super::{HostHandle, HostsDefinition, LocalHost};
use crate::env::EnvOptions;
use crate::value::{UnsupportedExpression, Value};
use hcl_edit::structure::{Block, Body, Structure};
use indexmap::IndexMap;
use std::path::Path;

#[derive(Debug, Default)]
pub struct Inventory {
    hosts: IndexMap<String, HostHandle>,
    roles: IndexMap<String, Vec<String>>,
    options: IndexMap<String, Value>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a host object, `host` blocks with the same slug reuse it
    pub fn register_host(&mut self, host: HostHandle) {
        self.hosts.insert(host.slug().to_string(), host);
    }

    /// Adds an hcl document
    pub fn insert(&mut self, document: Body) -> Result<(), InventoryError> {
        let mut declared = std::collections::HashSet::new();

        for structure in document.into_iter() {
            let Structure::Block(block) = structure else {
                return Err(InventoryError::RootAttribute);
            };

            match block.ident.value().as_str() {
                "host" => {
                    let slug = single_label(&block)?;
                    if !declared.insert(slug.clone()) {
                        return Err(InventoryError::DuplicateHost(slug));
                    }
                    self.insert_host(slug, &block)?;
                }
                "role" => {
                    let role = single_label(&block)?;
                    let hosts = match block_attributes(&block)?.shift_remove("hosts") {
                        Some(Value::Array(hosts)) => hosts
                            .into_iter()
                            .map(|host| match host {
                                Value::String(slug) => Ok(slug),
                                other => Err(invalid("hosts", other)),
                            })
                            .collect::<Result<Vec<_>, _>>()?,
                        Some(other) => return Err(invalid("hosts", other)),
                        None => Vec::new(),
                    };
                    tracing::trace!(%role, ?hosts, "role");
                    self.roles.entry(role).or_default().extend(hosts);
                }
                "options" => {
                    self.options.extend(block_attributes(&block)?);
                }
                other => return Err(InventoryError::UnknownBlock(other.to_string())),
            }
        }

        Ok(())
    }

    fn insert_host(&mut self, slug: String, block: &Block) -> Result<(), InventoryError> {
        if self.hosts.contains_key(&slug) {
            tracing::debug!(%slug, "host block refers to registered host");
            return Ok(());
        }

        let host = match block_attributes(block)?.shift_remove("address") {
            Some(Value::String(address)) => LocalHost::with_address(slug.clone(), address),
            Some(other) => return Err(invalid("address", other)),
            None => LocalHost::new(slug.clone()),
        };
        self.hosts.insert(slug, HostHandle::new(host));
        Ok(())
    }

    pub fn load_file(&mut self, file_path: &Path) -> Result<(), InventoryError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path=%file_path.display(), "loading inventory file");

        let file_contents = std::fs::read_to_string(&file_path)?;
        let body = hcl_edit::parser::parse_body(&file_contents)?;

        self.insert(body)
    }

    /// Loads every `*.hosts.hcl` file of a directory
    pub fn load_directory(&mut self, dir_path: &Path) -> Result<(), InventoryError> {
        let mut files = Vec::new();

        for dir_entry in std::fs::read_dir(dir_path)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_file() {
                continue;
            }

            let is_inventory_file = dir_entry
                .file_name()
                .to_string_lossy()
                .ends_with(".hosts.hcl");
            if is_inventory_file {
                files.push(dir_entry.path());
            }
        }

        if files.is_empty() {
            return Err(InventoryError::NoFilesFound);
        }

        // read_dir order is platform dependent
        files.sort();
        for file_path in files {
            self.load_file(&file_path)?;
        }

        Ok(())
    }

    pub fn host(&self, slug: &str) -> Option<&HostHandle> {
        self.hosts.get(slug)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &HostHandle> {
        self.hosts.values()
    }

    /// Resolves every role into a [HostsDefinition]
    pub fn definition(&self) -> Result<HostsDefinition, InventoryError> {
        let mut definition = HostsDefinition::new();
        for (role, slugs) in &self.roles {
            let hosts = slugs
                .iter()
                .map(|slug| {
                    self.hosts
                        .get(slug)
                        .cloned()
                        .ok_or_else(|| InventoryError::UnknownHost {
                            role: role.clone(),
                            host: slug.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            definition = definition.role(role.clone(), hosts);
        }
        Ok(definition)
    }

    pub fn options(&self) -> Result<EnvOptions, InventoryError> {
        let options = serde_json::to_value(Value::Object(self.options.clone()))?;
        Ok(serde_json::from_value(options)?)
    }
}

impl std::str::FromStr for Inventory {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut inventory = Inventory::default();
        inventory.insert(hcl_edit::parser::parse_body(s)?)?;
        Ok(inventory)
    }
}

fn single_label(block: &Block) -> Result<String, InventoryError> {
    match block.labels.as_slice() {
        [label] => Ok(label.as_str().to_string()),
        _ => Err(InventoryError::LabelMissing(
            block.ident.value().as_str().to_string(),
        )),
    }
}

fn block_attributes(block: &Block) -> Result<IndexMap<String, Value>, InventoryError> {
    block
        .body
        .attributes()
        .map(|attribute| {
            let expression: hcl::Expression = attribute.value.clone().into();
            Ok((
                attribute.key.value().as_str().to_string(),
                Value::try_from(expression)?,
            ))
        })
        .collect()
}

fn invalid(attribute: &str, value: Value) -> InventoryError {
    InventoryError::InvalidAttribute {
        attribute: attribute.to_string(),
        found: value.type_name(),
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InventoryError {
    #[error("No inventory files found in directory")]
    NoFilesFound,
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse hcl file")]
    HclParseFailed(#[from] hcl_edit::parser::Error),
    #[error("attributes are not allowed at the root of an inventory")]
    RootAttribute,
    #[error("unknown block type `{0}`")]
    UnknownBlock(String),
    #[error("`{0}` blocks require exactly one label")]
    LabelMissing(String),
    #[error("host `{0}` is declared twice")]
    DuplicateHost(String),
    #[error("role `{role}` references unknown host `{host}`")]
    UnknownHost { role: String, host: String },
    #[error("attribute `{attribute}` has an unexpected type ({found})")]
    InvalidAttribute {
        attribute: String,
        found: &'static str,
    },
    #[error(transparent)]
    Expression(#[from] UnsupportedExpression),
    #[error("invalid options")]
    InvalidOptions(#[from] serde_json::Error),
}

/// Utility macro to create an [Inventory] from hcl text
///
/// ```
/// # use deployer::inventory;
/// let inventory = inventory!(r#"
///   host "a" {}
///   role "host" { hosts = ["a"] }
/// "#);
/// assert!(inventory.host("a").is_some());
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use deployer::inventory;
/// inventory!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! inventory {
    { $expr:expr } => {
        <$crate::hosts::inventory::Inventory as ::std::str::FromStr>::from_str($expr)
            .expect("inventory must parse")
    };
}
