//! hosts: the machines actions run on
//!
//! A [Host] is an external collaborator. The core only needs a slug (unique, stable identifier), an address for
//! display and a way to run a command. Transports (ssh, ...) live outside of this crate, [LocalHost] is provided for
//! running commands on the current machine.
pub mod bindings;
pub mod inventory;

pub use bindings::{HostFilter, HostsDefinition, HostsError, RoleBindings};

use std::sync::Arc;

/// Options for a single command execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunOptions {
    pub use_sudo: bool,
    pub interactive: bool,
}

impl RunOptions {
    pub fn sudo() -> Self {
        Self {
            use_sudo: true,
            ..Self::default()
        }
    }
}

pub trait Host: Send + Sync + std::fmt::Debug {
    fn slug(&self) -> &str;

    fn address(&self) -> &str;

    /// Runs `command` and returns its output, failing on a non-zero exit status
    fn run(&self, command: &str, options: &RunOptions) -> Result<String, ExecFailed>;

    fn exists(&self, path: &str) -> Result<bool, ExecFailed> {
        match self.run(&format!("test -e {}", shell_quote(path)), &RunOptions::default()) {
            Ok(_) => Ok(true),
            Err(failed) if failed.status_code == Some(1) => Ok(false),
            Err(failed) => Err(failed),
        }
    }
}

/// Shared reference to a [Host]
///
/// Handles are compared and hashed by slug.
#[derive(Clone)]
pub struct HostHandle(Arc<dyn Host>);

impl HostHandle {
    pub fn new(host: impl Host + 'static) -> Self {
        Self(Arc::new(host))
    }

    pub fn from_arc(host: Arc<dyn Host>) -> Self {
        Self(host)
    }

    pub fn slug(&self) -> &str {
        self.0.slug()
    }

    pub fn address(&self) -> &str {
        self.0.address()
    }

    pub fn run(&self, command: &str, options: &RunOptions) -> Result<String, ExecFailed> {
        self.0.run(command, options)
    }

    pub fn exists(&self, path: &str) -> Result<bool, ExecFailed> {
        self.0.exists(path)
    }

    /// `true` when both handles point to the very same host object
    pub fn same_instance(&self, other: &HostHandle) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }
}

impl PartialEq for HostHandle {
    fn eq(&self, other: &Self) -> bool {
        self.slug() == other.slug()
    }
}

impl Eq for HostHandle {}

impl std::hash::Hash for HostHandle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.slug().hash(state)
    }
}

impl std::fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Host({})", self.slug())
    }
}

impl std::fmt::Display for HostHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

impl serde::Serialize for HostHandle {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.slug())
    }
}

/// A command that did not exit successfully
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("command `{command}` failed on {host} ({})", status_description(.status_code))]
pub struct ExecFailed {
    pub command: String,
    pub host: String,
    pub use_sudo: bool,
    pub status_code: Option<i32>,
    pub output: String,
}

fn status_description(status_code: &Option<i32>) -> String {
    match status_code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

/// Runs commands on the current machine through `sh -c`
#[derive(Debug, Clone)]
pub struct LocalHost {
    slug: String,
    address: String,
}

impl LocalHost {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            address: "localhost".to_string(),
        }
    }

    pub fn with_address(slug: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            address: address.into(),
        }
    }
}

impl Host for LocalHost {
    fn slug(&self) -> &str {
        &self.slug
    }

    fn address(&self) -> &str {
        &self.address
    }

    #[tracing::instrument(level = "trace", skip(self, options), fields(host = %self.slug))]
    fn run(&self, command: &str, options: &RunOptions) -> Result<String, ExecFailed> {
        let mut process = if options.use_sudo {
            let mut process = std::process::Command::new("sudo");
            process.args(["sh", "-c", command]);
            process
        } else {
            let mut process = std::process::Command::new("sh");
            process.args(["-c", command]);
            process
        };

        let failed = |status_code, output: String| ExecFailed {
            command: command.to_string(),
            host: self.slug.clone(),
            use_sudo: options.use_sudo,
            status_code,
            output,
        };

        let output = process
            .output()
            .map_err(|err| failed(None, err.to_string()))?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

        if !output.status.success() {
            let mut combined = stdout;
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            tracing::debug!(status = ?output.status, "command failed");
            return Err(failed(output.status.code(), combined));
        }

        Ok(stdout)
    }
}

/// Quotes `value` for use as a single POSIX shell word
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn handles_compare_by_slug() {
        let a = HostHandle::new(LocalHost::new("a"));
        let a_again = HostHandle::new(LocalHost::with_address("a", "10.0.0.1"));

        assert_eq!(a, a_again);
        assert!(!a.same_instance(&a_again));
        assert!(a.same_instance(&a.clone()));
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
    }

    #[test]
    fn local_host_runs_commands() {
        let host = LocalHost::new("local");
        assert_eq!(host.run("echo hello", &RunOptions::default()).unwrap(), "hello\n");

        let failed = host.run("exit 3", &RunOptions::default()).unwrap_err();
        assert_eq!(failed.status_code, Some(3));
        assert_eq!(failed.host, "local");
    }
}
