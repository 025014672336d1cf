//! Named credentials loaded from a JSON file.
//!
//! ```json
//! {"secrets": [{"secretName": "chat", "key": "", "secret": "...", "url": ""}]}
//! ```
//!
//! The `chat` entry signs session cookies. Other entries hold OAuth provider
//! credentials for the login flow.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Name of the entry whose secret signs session cookies.
pub const CHAT_SECRET: &str = "chat";

/// One named credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Secret {
    /// Entry name, e.g. `chat` or `github`.
    #[serde(rename = "secretName")]
    pub name: String,
    /// Client key.
    #[serde(default)]
    pub key: String,
    /// Client secret.
    #[serde(default)]
    pub secret: String,
    /// Callback URL.
    #[serde(default)]
    pub url: String,
}

#[derive(Deserialize)]
struct SecretsFile {
    secrets: Vec<Secret>,
}

/// Credentials indexed by name. Later entries win on duplicate names.
#[derive(Debug, Clone, Default)]
pub struct Secrets(HashMap<String, Secret>);

impl Secrets {
    /// Read and parse a secrets file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read secrets file: {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("Failed to parse secrets file: {}", path.display()))
    }

    /// Parse secrets from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a secrets document.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(json)?;
        Ok(Self(
            file.secrets
                .into_iter()
                .map(|secret| (secret.name.clone(), secret))
                .collect(),
        ))
    }

    /// Look up an entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Secret> {
        self.0.get(name)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_secrets() {
        let secrets = Secrets::from_json(
            r#"{"secrets":[
                {"secretName":"chat","key":"","secret":"s3cret","url":""},
                {"secretName":"github","key":"id","secret":"gh","url":"http://localhost/auth/callback/github"}
            ]}"#,
        )
        .unwrap();

        assert_eq!(secrets.len(), 2);
        assert_eq!(secrets.get(CHAT_SECRET).unwrap().secret, "s3cret");
        assert_eq!(secrets.get("github").unwrap().key, "id");
        assert!(secrets.get("facebook").is_none());
    }

    #[test]
    fn test_optional_fields() {
        let secrets = Secrets::from_json(r#"{"secrets":[{"secretName":"chat"}]}"#).unwrap();
        assert_eq!(secrets.get("chat").unwrap().secret, "");
    }

    #[test]
    fn test_malformed_secrets() {
        assert!(Secrets::from_json(r#"{"secrets":"nope"}"#).is_err());
        assert!(Secrets::from_json("").is_err());
        assert!(Secrets::load("/nonexistent/secrets.json").is_err());
    }
}
