use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    response::IntoResponse,
    routing::{get, post},
};
use docqa_rag::{
    AzureProviderFactory, BatchPolicy, ChromaVectorStore, ConfigStore, InMemoryVectorStore,
    ProviderSettings, RagService, VectorStore,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::error::ApiError;
use crate::protocol::{
    ConfigResponse, CurrentConfigResponse, HealthResponse, IndexOutcome, IndexRequest,
    IndexResponse, QueryRequest, QueryResponse, UploadResponse,
};

/// Largest accepted request body (uploads included).
pub const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RagService>,
    pub upload_dir: PathBuf,
}

impl AppState {
    pub fn new(service: Arc<RagService>, upload_dir: impl Into<PathBuf>) -> Self {
        Self { service, upload_dir: upload_dir.into() }
    }
}

/// Connection settings for a Chroma server.
#[derive(Clone, Debug, PartialEq)]
pub struct ChromaSettings {
    pub url: String,
    pub tenant: String,
    pub database: String,
    pub api_key: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    /// `None` selects the in-memory vector index.
    pub chroma: Option<ChromaSettings>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            upload_dir: PathBuf::from("uploads"),
            chroma: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let chroma = non_blank("CHROMA_TENANT").map(|tenant| ChromaSettings {
            url: non_blank("CHROMA_URL")
                .unwrap_or_else(|| docqa_rag::chroma::DEFAULT_CHROMA_URL.to_string()),
            tenant,
            database: non_blank("CHROMA_DATABASE").unwrap_or_else(|| "dev".to_string()),
            api_key: non_blank("CHROMA_API_KEY"),
        });

        Self {
            host: non_blank("DOCQA_HOST").unwrap_or(defaults.host),
            port: non_blank("BACKEND_PORT")
                .and_then(|value| value.parse::<u16>().ok())
                .unwrap_or(defaults.port),
            upload_dir: non_blank("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            chroma,
        }
    }

    fn vector_store(&self) -> anyhow::Result<Arc<dyn VectorStore>> {
        let Some(chroma) = &self.chroma else {
            info!("using in-memory vector index");
            return Ok(Arc::new(InMemoryVectorStore::new()));
        };
        let mut store = ChromaVectorStore::new(&chroma.url, &chroma.tenant, &chroma.database)
            .context("failed to create Chroma client")?;
        if let Some(token) = &chroma.api_key {
            store = store.with_token(token);
        }
        info!(url = %chroma.url, tenant = %chroma.tenant, database = %chroma.database, "using Chroma vector index");
        Ok(Arc::new(store))
    }
}

pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/config", get(get_config).post(post_config))
        .route("/upload", post(upload))
        .route("/index", post(index_files))
        .route("/query", post(query))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let config_store = Arc::new(ConfigStore::new());
    match config_store.set(&ProviderSettings::from_env()) {
        Ok(provider) => info!(collection = provider.collection(), "provider configuration loaded from environment"),
        Err(e) => info!(reason = %e, "provider configuration not set; waiting for POST /config"),
    }

    let service = RagService::builder()
        .provider_factory(Arc::new(AzureProviderFactory))
        .vector_store(config.vector_store()?)
        .config_store(config_store)
        .build()
        .context("failed to build RAG service")?;

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("failed to create upload dir {}", config.upload_dir.display()))?;

    let app = app_router(AppState::new(Arc::new(service), config.upload_dir.clone()));
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| "invalid host/port for docqa server")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("docqa-server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok".to_string() })
}

async fn get_config(State(state): State<AppState>) -> Json<CurrentConfigResponse> {
    Json(CurrentConfigResponse { config: state.service.config().map(|c| c.redacted()) })
}

async fn post_config(
    State(state): State<AppState>,
    Json(settings): Json<ProviderSettings>,
) -> Result<Json<ConfigResponse>, ApiError> {
    let config = state.service.configure(&settings)?;
    info!(collection = config.collection(), "provider configuration updated");
    Ok(Json(ConfigResponse {
        ok: true,
        message: "configuration updated".to_string(),
        config: config.redacted(),
    }))
}

/// Keep only the final path component of a client-supplied file name.
fn base_name(name: &str) -> Option<String> {
    let name = name.rsplit(['/', '\\']).next()?.trim();
    if name.is_empty() || name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|e| ApiError::internal(format!("failed to create upload dir: {e}")))?;

    let mut stored = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        let Some(name) = field.file_name().and_then(base_name) else {
            continue;
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read upload '{name}': {e}")))?;
        let path = state.upload_dir.join(&name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ApiError::internal(format!("failed to save '{name}': {e}")))?;
        info!(file = %path.display(), bytes = bytes.len(), "stored upload");

        spawn_indexing(Arc::clone(&state.service), path);
        stored.push(name);
    }

    if stored.is_empty() {
        return Err(ApiError::bad_request("no file uploaded"));
    }
    Ok(Json(UploadResponse { ok: true, files: stored }))
}

fn spawn_indexing(service: Arc<RagService>, path: PathBuf) {
    tokio::spawn(async move {
        match service.index_file(&path).await {
            Ok(report) if report.is_empty() => {
                warn!(file = %path.display(), "upload produced no chunks")
            }
            Ok(report) => {
                info!(file = %path.display(), chunks = report.chunk_count, "background indexing finished")
            }
            Err(e) => error!(file = %path.display(), error = %e, "background indexing failed"),
        }
    });
}

/// Resolve a client-supplied path against the upload directory.
///
/// Relative paths are joined to `upload_dir`. Anything that ends up outside
/// it, through `..`, an absolute path or a symlink, is rejected.
async fn resolve_upload_path(upload_dir: &Path, requested: &str) -> Result<PathBuf, ApiError> {
    let outside = || ApiError::bad_request(format!("'{requested}' is outside the upload directory"));
    if requested.trim().is_empty() {
        return Err(ApiError::bad_request("file paths must not be blank"));
    }
    let path = Path::new(requested);
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(outside());
    }
    let joined = if path.is_absolute() { path.to_path_buf() } else { upload_dir.join(path) };

    let root = tokio::fs::canonicalize(upload_dir)
        .await
        .map_err(|e| ApiError::internal(format!("failed to resolve upload dir: {e}")))?;
    let inside = match tokio::fs::canonicalize(&joined).await {
        Ok(real) => real.starts_with(&root),
        // Missing files are left to the loader to report, if they would live inside.
        Err(_) => joined.starts_with(upload_dir) || joined.starts_with(&root),
    };
    if !inside {
        warn!(file = requested, "rejected index request outside the upload directory");
        return Err(outside());
    }
    Ok(joined)
}

async fn index_files(
    State(state): State<AppState>,
    Json(request): Json<IndexRequest>,
) -> Result<Json<IndexResponse>, ApiError> {
    if request.files.is_empty() {
        return Err(ApiError::bad_request("files must not be empty"));
    }
    tokio::fs::create_dir_all(&state.upload_dir)
        .await
        .map_err(|e| ApiError::internal(format!("failed to create upload dir: {e}")))?;

    let mut paths = Vec::with_capacity(request.files.len());
    for file in &request.files {
        paths.push(resolve_upload_path(&state.upload_dir, file).await?);
    }
    let report = state.service.index_files(&paths, BatchPolicy::ContinueOnError).await?;

    let results = request
        .files
        .into_iter()
        .zip(report.outcomes)
        .map(|(file, outcome)| match outcome.result {
            Ok(report) => IndexOutcome::Indexed { file, chunks: report.chunk_count },
            Err(e) => IndexOutcome::Failed { file, error: e.root().to_string() },
        })
        .collect();
    Ok(Json(IndexResponse { results }))
}

async fn query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let question = request
        .question
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("question is required"))?;
    let answer = state.service.ask(&question, request.k).await?;
    Ok(Json(QueryResponse { answer: answer.answer, sources: answer.sources }))
}
