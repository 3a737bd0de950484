//! `docqa-server` exposes the document QA service over HTTP: configure the
//! providers, upload or index files, and ask questions.

pub mod error;
pub mod protocol;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, ChromaSettings, ServerConfig, app_router, run_server};
