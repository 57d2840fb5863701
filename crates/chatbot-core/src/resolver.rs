//! Version and user resolution from the runtime environment.

use std::path::Path;

use crate::domain::error::{ChatbotError, Result};
use crate::domain::version::VersionString;

/// Environment variable that overrides the packaged version.
pub const VERSION_OVERRIDE_VAR: &str = "CHATBOT_VERSION";

/// Environment variables consulted for the user name, first non-empty wins.
pub const USER_VARS: [&str; 4] = ["CHATBOT_USER", "USER", "USERNAME", "LOGNAME"];

/// Resolves who is running which version of the chatbot.
///
/// Both lookups are pure queries; failure is fatal to the caller since the
/// Release record is keyed on the version.
pub trait IdentityResolver: Send + Sync {
    fn resolve_version(&self) -> Result<VersionString>;
    fn resolve_user(&self) -> Result<String>;
}

/// Resolver backed by process environment variables and the packaged version.
#[derive(Debug, Clone)]
pub struct EnvironmentResolver {
    package_version: String,
    version_override_var: String,
    user_vars: Vec<String>,
}

impl EnvironmentResolver {
    /// `package_version` is normally the binary's `CARGO_PKG_VERSION`.
    pub fn new(package_version: impl Into<String>) -> Self {
        Self {
            package_version: package_version.into(),
            version_override_var: VERSION_OVERRIDE_VAR.to_string(),
            user_vars: USER_VARS.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn with_user_vars<I, S>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.user_vars = vars.into_iter().map(Into::into).collect();
        self
    }

    fn version_from<F>(&self, lookup: F) -> Result<VersionString>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup(&self.version_override_var).filter(|v| !v.trim().is_empty()) {
            Some(overridden) => VersionString::parse(&overridden),
            None => VersionString::parse(&self.package_version),
        }
    }

    fn user_from<F>(&self, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.user_vars
            .iter()
            .filter_map(|var| lookup(var))
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
            .ok_or_else(|| {
                ChatbotError::UserResolution(format!(
                    "none of {} is set",
                    self.user_vars.join(", ")
                ))
            })
    }
}

impl IdentityResolver for EnvironmentResolver {
    fn resolve_version(&self) -> Result<VersionString> {
        self.version_from(|var| std::env::var(var).ok())
    }

    fn resolve_user(&self) -> Result<String> {
        self.user_from(|var| std::env::var(var).ok())
    }
}

/// Resolver that always answers with the same identity.
#[derive(Debug, Clone)]
pub struct FixedIdentity {
    version: VersionString,
    user: String,
}

impl FixedIdentity {
    pub fn new(version: VersionString, user: impl Into<String>) -> Self {
        Self {
            version,
            user: user.into(),
        }
    }
}

impl IdentityResolver for FixedIdentity {
    fn resolve_version(&self) -> Result<VersionString> {
        Ok(self.version.clone())
    }

    fn resolve_user(&self) -> Result<String> {
        Ok(self.user.clone())
    }
}

/// Read the version from a Cargo manifest.
///
/// Looks at `package.version` first, then `workspace.package.version`.
pub fn version_from_manifest(path: &Path) -> Result<VersionString> {
    let content = std::fs::read_to_string(path)?;
    let manifest: toml::Table = content.parse().map_err(|e| {
        ChatbotError::VersionResolution(format!("{} is not valid TOML: {e}", path.display()))
    })?;

    let package_version = manifest
        .get("package")
        .and_then(|p| p.get("version"))
        .and_then(|v| v.as_str());
    let workspace_version = manifest
        .get("workspace")
        .and_then(|w| w.get("package"))
        .and_then(|p| p.get("version"))
        .and_then(|v| v.as_str());

    match package_version.or(workspace_version) {
        Some(version) => VersionString::parse(version),
        None => Err(ChatbotError::VersionResolution(format!(
            "{} declares no package version",
            path.display()
        ))),
    }
}
