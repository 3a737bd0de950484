//! Azure OpenAI providers: embeddings and chat completions.
//!
//! This module is only available when the `azure` feature is enabled.
//!
//! - [`AzureOpenAIEmbeddingProvider`] calls the deployment's `/embeddings`
//!   endpoint directly with `reqwest`.
//! - [`AzureChatModel`] uses `async-openai`'s Azure configuration for chat
//!   completions, with its built-in retry disabled.
//! - [`AzureProviderFactory`] builds both from a [`ProviderConfig`] snapshot.

use std::sync::Arc;
use std::time::Duration;

use async_openai::Client;
use async_openai::config::AzureConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::llm::LanguageModel;
use crate::runtime::ProviderConfig;
use crate::service::ProviderFactory;

/// Default dimensionality of `text-embedding-3-small`, the usual embedding deployment.
pub const DEFAULT_DIMENSIONS: usize = 1536;

/// Default timeout applied to every provider request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const EMBEDDING_PROVIDER: &str = "AzureOpenAI";
const CHAT_PROVIDER: &str = "AzureOpenAIChat";

/// An [`EmbeddingProvider`] backed by an Azure OpenAI embedding deployment.
///
/// Requests go to
/// `{endpoint}/openai/deployments/{deployment}/embeddings?api-version={version}`
/// with the credential in the `api-key` header.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::azure::AzureOpenAIEmbeddingProvider;
///
/// let provider = AzureOpenAIEmbeddingProvider::new(
///     "https://my-resource.openai.azure.com",
///     "text-embedding-3-small",
///     "2024-02-01",
///     "key",
/// )?;
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct AzureOpenAIEmbeddingProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    deployment: String,
    dimensions: usize,
}

impl AzureOpenAIEmbeddingProvider {
    /// Create a new provider for the given endpoint, deployment, API version and key.
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_version: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(RagError::ConfigError("embedding API key must not be empty".into()));
        }
        let endpoint = endpoint.into();
        let deployment = deployment.into();
        let api_version = api_version.into();
        let url = format!(
            "{}/openai/deployments/{deployment}/embeddings?api-version={api_version}",
            endpoint.trim_end_matches('/')
        );
        let client = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build().map_err(|e| {
            RagError::EmbeddingError {
                provider: EMBEDDING_PROVIDER.into(),
                message: format!("failed to build HTTP client: {e}"),
            }
        })?;

        Ok(Self { client, url, api_key, deployment, dimensions: DEFAULT_DIMENSIONS })
    }

    /// Create a provider from a configuration snapshot.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Self::new(
            config.endpoint(),
            config.embedding_deployment(),
            config.embedding_api_version(),
            config.api_key(),
        )
    }

    /// Override the reported dimensionality (for deployments of other models).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }

    /// Use a caller-configured HTTP client (timeouts, proxies).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

// ── Azure OpenAI API request/response types ────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── EmbeddingProvider implementation ───────────────────────────────

#[async_trait]
impl EmbeddingProvider for AzureOpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = EMBEDDING_PROVIDER, text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results.into_iter().next().ok_or_else(|| RagError::EmbeddingError {
            provider: EMBEDDING_PROVIDER.into(),
            message: "API returned empty response".into(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = EMBEDDING_PROVIDER,
            batch_size = texts.len(),
            deployment = %self.deployment,
            "embedding batch"
        );

        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&EmbeddingRequest { input: texts })
            .send()
            .await
            .map_err(|e| {
                error!(provider = EMBEDDING_PROVIDER, error = %e, "request failed");
                RagError::EmbeddingError {
                    provider: EMBEDDING_PROVIDER.into(),
                    message: format!("request failed: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = EMBEDDING_PROVIDER, %status, "API error");
            return Err(RagError::EmbeddingError {
                provider: EMBEDDING_PROVIDER.into(),
                message: format!("API returned {status}: {detail}"),
            });
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            error!(provider = EMBEDDING_PROVIDER, error = %e, "failed to parse response");
            RagError::EmbeddingError {
                provider: EMBEDDING_PROVIDER.into(),
                message: format!("failed to parse response: {e}"),
            }
        })?;

        if parsed.data.len() != texts.len() {
            return Err(RagError::EmbeddingError {
                provider: EMBEDDING_PROVIDER.into(),
                message: format!(
                    "API returned {} embeddings for {} inputs",
                    parsed.data.len(),
                    texts.len()
                ),
            });
        }

        parsed.data.sort_by_key(|d| d.index);
        let embeddings: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();

        let dims = embeddings[0].len();
        if embeddings.iter().any(|e| e.len() != dims) {
            return Err(RagError::EmbeddingError {
                provider: EMBEDDING_PROVIDER.into(),
                message: "API returned embeddings of differing dimensions".into(),
            });
        }

        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        EMBEDDING_PROVIDER
    }
}

/// A [`LanguageModel`] backed by an Azure OpenAI chat deployment.
///
/// Sends the prompt as a single user message with temperature 0. The client's
/// automatic retry is disabled; retry policy belongs to the caller.
pub struct AzureChatModel {
    client: Client<AzureConfig>,
    deployment_id: String,
}

impl AzureChatModel {
    /// Create a new chat model for the given endpoint, deployment, API version and key.
    pub fn new(
        endpoint: impl Into<String>,
        deployment_id: impl Into<String>,
        api_version: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let endpoint = endpoint.into();
        let deployment_id = deployment_id.into();
        let azure_config = AzureConfig::new()
            .with_api_base(endpoint.trim_end_matches('/'))
            .with_api_version(api_version.into())
            .with_deployment_id(&deployment_id)
            .with_api_key(api_key.into());

        let http_client = reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build().map_err(
            |e| RagError::ModelError {
                provider: CHAT_PROVIDER.into(),
                message: format!("failed to build HTTP client: {e}"),
            },
        )?;
        let no_retry = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        let client =
            Client::with_config(azure_config).with_http_client(http_client).with_backoff(no_retry);
        Ok(Self { client, deployment_id })
    }

    /// Create a chat model from a configuration snapshot.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Self::new(
            config.endpoint(),
            config.chat_deployment(),
            config.chat_api_version(),
            config.api_key(),
        )
    }

    fn map_err(e: OpenAIError) -> RagError {
        let message = match e {
            OpenAIError::ApiError(api) => format!("API error: {}", api.message),
            other => other.to_string(),
        };
        RagError::ModelError { provider: CHAT_PROVIDER.into(), message }
    }
}

#[async_trait]
impl LanguageModel for AzureChatModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(
            provider = CHAT_PROVIDER,
            deployment = %self.deployment_id,
            prompt_len = prompt.len(),
            "requesting completion"
        );

        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(Self::map_err)?;
        let messages: Vec<ChatCompletionRequestMessage> = vec![message.into()];

        // Azure routes by deployment; the model field is informational.
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.deployment_id)
            .messages(messages)
            .temperature(0.0_f32)
            .build()
            .map_err(Self::map_err)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            error!(provider = CHAT_PROVIDER, error = %e, "chat completion failed");
            Self::map_err(e)
        })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| RagError::ModelError {
                provider: CHAT_PROVIDER.into(),
                message: "completion contained no text".into(),
            })
    }

    fn name(&self) -> &str {
        &self.deployment_id
    }
}

/// Builds Azure OpenAI providers from each invocation's configuration snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct AzureProviderFactory;

impl ProviderFactory for AzureProviderFactory {
    fn embedding_provider(&self, config: &ProviderConfig) -> Result<Arc<dyn EmbeddingProvider>> {
        Ok(Arc::new(AzureOpenAIEmbeddingProvider::from_config(config)?))
    }

    fn language_model(&self, config: &ProviderConfig) -> Result<Arc<dyn LanguageModel>> {
        Ok(Arc::new(AzureChatModel::from_config(config)?))
    }
}
