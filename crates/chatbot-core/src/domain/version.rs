//! Validated chatbot version strings.

use serde::{Deserialize, Serialize};

use super::error::{ChatbotError, Result};

/// A semantic version string, the key that Release records are looked up by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionString(String);

impl VersionString {
    /// Parse and validate a semantic version. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ChatbotError::VersionResolution(
                "version string is empty".to_string(),
            ));
        }
        semver::Version::parse(trimmed).map_err(|e| {
            ChatbotError::VersionResolution(format!("{trimmed:?} is not a semantic version: {e}"))
        })?;
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for VersionString {
    type Err = ChatbotError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VersionString {
    type Error = ChatbotError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<VersionString> for String {
    fn from(v: VersionString) -> Self {
        v.0
    }
}

impl std::fmt::Display for VersionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
