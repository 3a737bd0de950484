use docqa_rag::{Metadata, ProviderSettings};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigResponse {
    pub ok: bool,
    pub message: String,
    pub config: ProviderSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentConfigResponse {
    /// Current provider settings with the credential masked; `null` when unset.
    pub config: Option<ProviderSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub ok: bool,
    /// Stored file names. Indexing continues in the background.
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexRequest {
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum IndexOutcome {
    Indexed { file: String, chunks: usize },
    Failed { file: String, error: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResponse {
    pub results: Vec<IndexOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Metadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}
