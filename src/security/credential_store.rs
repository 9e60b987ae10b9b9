//! Feed secret resolution with memory-safe handling and masking capabilities
//!
//! Secrets are read from a snapshot of the environment taken at startup. When a secret
//! is missing and interaction is permitted, the operator may supply it; the answer is
//! cached for the rest of the run so that a feed never prompts twice.

use crate::core::error::PublishError;
use crate::core::interaction::Interaction;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Secret store for feed authentication
///
/// # Examples
///
/// ```
/// use artifact_publisher::security::CredentialStore;
/// use secrecy::ExposeSecret;
/// use std::collections::HashMap;
///
/// let mut env = HashMap::new();
/// env.insert("MYGET_CI_API_KEY".to_string(), "0123456789abcdef".to_string());
/// let store = CredentialStore::new(env);
///
/// let secret = store.get("MYGET_CI_API_KEY").unwrap();
/// assert_eq!(CredentialStore::mask(secret.expose_secret()), "012...def");
/// ```
#[derive(Debug, Default)]
pub struct CredentialStore {
    env: HashMap<String, String>,
    prompted: Mutex<HashMap<String, SecretString>>,
}

impl CredentialStore {
    pub fn new(env: HashMap<String, String>) -> Self {
        Self {
            env,
            prompted: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot of the process environment
    pub fn from_env() -> Self {
        Self::new(std::env::vars().collect())
    }

    /// Retrieves a secret from the environment snapshot or the prompt cache
    ///
    /// Empty values count as missing.
    pub fn get(&self, key: &str) -> Option<SecretString> {
        if let Some(value) = self.env.get(key).filter(|v| !v.is_empty()) {
            return Some(SecretString::new(value.as_str().into()));
        }
        let prompted = self.prompted.lock().unwrap_or_else(|e| e.into_inner());
        prompted
            .get(key)
            .map(|s| SecretString::new(s.expose_secret().into()))
    }

    /// Checks if a secret is available without prompting
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Resolve a secret, asking the operator when it is missing
    ///
    /// Returns `Ok(None)` when the secret is absent and no value was supplied.
    pub async fn resolve(
        &self,
        key: &str,
        interaction: &dyn Interaction,
    ) -> Result<Option<SecretString>, PublishError> {
        if let Some(secret) = self.get(key) {
            return Ok(Some(secret));
        }

        let Some(secret) = interaction.read_secret(key).await? else {
            return Ok(None);
        };
        debug!(key, secret = %Self::mask(secret.expose_secret()), "secret supplied by operator");

        let copy = SecretString::new(secret.expose_secret().into());
        self.prompted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), copy);
        Ok(Some(secret))
    }

    /// Masks a secret for safe logging
    ///
    /// Shows only the first 3 and last 3 characters for identification purposes.
    /// Secrets shorter than 10 characters are fully masked as "****".
    pub fn mask(secret: &str) -> String {
        if secret.chars().count() < 10 {
            return "****".to_string();
        }

        let prefix: String = secret.chars().take(3).collect();
        let suffix: String = secret.chars().skip(secret.chars().count() - 3).collect();
        format!("{}...{}", prefix, suffix)
    }

    /// Masks every known secret appearing in a string
    ///
    /// `keys` are the secret names that may have been resolved during the run.
    pub fn mask_secrets_in(&self, text: &str, keys: &[&str]) -> String {
        let mut masked = text.to_string();

        for key in keys {
            if let Some(secret) = self.get(key) {
                let value = secret.expose_secret();
                if let Ok(regex) = Regex::new(&regex::escape(value)) {
                    masked = regex
                        .replace_all(&masked, Self::mask(value).as_str())
                        .to_string();
                }
            }
        }

        masked
    }
}
