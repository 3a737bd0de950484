//! Runtime provider configuration.
//!
//! Provider endpoints and credentials arrive from an external call (an HTTP
//! request, the environment) as [`ProviderSettings`], where every field is
//! optional. [`ProviderSettings::validate`] turns them into a complete
//! [`ProviderConfig`], and a [`ConfigStore`] holds the current one.
//!
//! Pipelines never read the store field by field. Each invocation takes one
//! [`ConfigStore::snapshot`], an `Arc` to an immutable config, and uses it for
//! its whole run. Reconfiguring swaps the `Arc`, so in-flight invocations keep
//! the values they started with.

use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Provider settings as received from a configuration source.
///
/// Field names on the wire follow the web frontend (`azureEndpoint`,
/// `embeddingDeploymentName`, ...). Snake-case aliases are also accepted.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    /// Base URL of the provider resource, shared by embeddings and chat.
    #[serde(rename = "azureEndpoint", alias = "endpoint")]
    pub endpoint: Option<String>,
    /// Embedding deployment (model) identifier.
    #[serde(rename = "embeddingDeploymentName", alias = "embedding_deployment")]
    pub embedding_deployment: Option<String>,
    /// API version used for embedding calls.
    #[serde(rename = "embedModelApiVersion", alias = "embedding_api_version")]
    pub embedding_api_version: Option<String>,
    /// Chat deployment (model) identifier.
    #[serde(rename = "chatCompletionDeploymentName", alias = "chat_deployment")]
    pub chat_deployment: Option<String>,
    /// API version used for chat calls.
    #[serde(rename = "chatCompletionModelApiVersion", alias = "chat_api_version")]
    pub chat_api_version: Option<String>,
    /// Shared credential for embeddings and chat.
    #[serde(rename = "azureApiKey", alias = "api_key")]
    pub api_key: Option<String>,
    /// Name of the vector index collection.
    #[serde(rename = "chromaDbCollectionName", alias = "collection")]
    pub collection: Option<String>,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("endpoint", &self.endpoint)
            .field("embedding_deployment", &self.embedding_deployment)
            .field("embedding_api_version", &self.embedding_api_version)
            .field("chat_deployment", &self.chat_deployment)
            .field("chat_api_version", &self.chat_api_version)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("collection", &self.collection)
            .finish()
    }
}

impl ProviderSettings {
    /// Environment variables read by [`from_env`](Self::from_env), in field order.
    pub const ENV_VARS: [&'static str; 7] = [
        "AZURE_OPENAI_ENDPOINT",
        "OPENAI_EMBED_DEPLOYMENT",
        "OPENAI_API_VERSION",
        "OPENAI_CHAT_DEPLOYMENT",
        "OPENAI_CHAT_API_VERSION",
        "OPENAI_API_KEY",
        "CHROMA_COLLECTION_NAME",
    ];

    /// Read settings from the process environment. Unset variables stay `None`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let [endpoint, embed_deployment, embed_version, chat_deployment, chat_version, key, collection] =
            Self::ENV_VARS;
        Self {
            endpoint: lookup(endpoint),
            embedding_deployment: lookup(embed_deployment),
            embedding_api_version: lookup(embed_version),
            chat_deployment: lookup(chat_deployment),
            chat_api_version: lookup(chat_version),
            api_key: lookup(key),
            collection: lookup(collection),
        }
    }

    /// Names (wire names) of every field that is absent or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let fields: [(&'static str, &Option<String>); 7] = [
            ("azureEndpoint", &self.endpoint),
            ("embeddingDeploymentName", &self.embedding_deployment),
            ("embedModelApiVersion", &self.embedding_api_version),
            ("chatCompletionDeploymentName", &self.chat_deployment),
            ("chatCompletionModelApiVersion", &self.chat_api_version),
            ("azureApiKey", &self.api_key),
            ("chromaDbCollectionName", &self.collection),
        ];
        fields
            .into_iter()
            .filter(|(_, value)| value.as_deref().is_none_or(|v| v.trim().is_empty()))
            .map(|(name, _)| name)
            .collect()
    }

    /// Validate that every field is present and non-blank.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] naming every missing field.
    pub fn validate(&self) -> Result<ProviderConfig> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(RagError::ConfigError(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }

        let take = |value: &Option<String>| value.as_deref().unwrap_or_default().trim().to_string();
        Ok(ProviderConfig {
            endpoint: take(&self.endpoint).trim_end_matches('/').to_string(),
            embedding_deployment: take(&self.embedding_deployment),
            embedding_api_version: take(&self.embedding_api_version),
            chat_deployment: take(&self.chat_deployment),
            chat_api_version: take(&self.chat_api_version),
            api_key: take(&self.api_key),
            collection: take(&self.collection),
        })
    }
}

/// A complete, validated provider configuration.
///
/// Construct one through [`ProviderSettings::validate`]. The credential is
/// never printed: `Debug` masks it and [`redacted`](Self::redacted) produces a
/// view safe to return to clients.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    endpoint: String,
    embedding_deployment: String,
    embedding_api_version: String,
    chat_deployment: String,
    chat_api_version: String,
    api_key: String,
    collection: String,
}

impl ProviderConfig {
    /// Base URL of the provider resource, without a trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Embedding deployment identifier.
    pub fn embedding_deployment(&self) -> &str {
        &self.embedding_deployment
    }

    /// API version for embedding calls.
    pub fn embedding_api_version(&self) -> &str {
        &self.embedding_api_version
    }

    /// Chat deployment identifier.
    pub fn chat_deployment(&self) -> &str {
        &self.chat_deployment
    }

    /// API version for chat calls.
    pub fn chat_api_version(&self) -> &str {
        &self.chat_api_version
    }

    /// The shared credential.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The target collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// A copy of the settings with the credential masked.
    pub fn redacted(&self) -> ProviderSettings {
        ProviderSettings {
            endpoint: Some(self.endpoint.clone()),
            embedding_deployment: Some(self.embedding_deployment.clone()),
            embedding_api_version: Some(self.embedding_api_version.clone()),
            chat_deployment: Some(self.chat_deployment.clone()),
            chat_api_version: Some(self.chat_api_version.clone()),
            api_key: Some(mask(&self.api_key)),
            collection: Some(self.collection.clone()),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint)
            .field("embedding_deployment", &self.embedding_deployment)
            .field("embedding_api_version", &self.embedding_api_version)
            .field("chat_deployment", &self.chat_deployment)
            .field("chat_api_version", &self.chat_api_version)
            .field("api_key", &"<redacted>")
            .field("collection", &self.collection)
            .finish()
    }
}

/// Keep the last four characters of a secret, mask the rest.
fn mask(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "*".repeat(count);
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("{}{tail}", "*".repeat(count - 4))
}

/// Process-wide holder of the current [`ProviderConfig`]. Last write wins.
#[derive(Debug, Default)]
pub struct ConfigStore {
    current: RwLock<Option<Arc<ProviderConfig>>>,
}

impl ConfigStore {
    /// Create an empty store. Every [`snapshot`](Self::snapshot) fails until [`set`](Self::set) succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store already holding a validated config.
    pub fn with_config(config: ProviderConfig) -> Self {
        Self { current: RwLock::new(Some(Arc::new(config))) }
    }

    /// Validate `settings` and make them the current configuration.
    ///
    /// On a validation error the previous configuration stays in place.
    pub fn set(&self, settings: &ProviderSettings) -> Result<Arc<ProviderConfig>> {
        let config = Arc::new(settings.validate()?);
        let mut current = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Some(Arc::clone(&config));
        Ok(config)
    }

    /// The current configuration, if one has been set.
    pub fn current(&self) -> Option<Arc<ProviderConfig>> {
        self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    /// An immutable snapshot of the current configuration for one invocation.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if no complete configuration has been set.
    pub fn snapshot(&self) -> Result<Arc<ProviderConfig>> {
        self.current().ok_or_else(|| {
            RagError::ConfigError(
                "provider configuration has not been set; all provider fields are required"
                    .to_string(),
            )
        })
    }
}
