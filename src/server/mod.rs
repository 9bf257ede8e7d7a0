pub mod handlers;
pub mod multipart;
pub mod payload;
pub(crate) mod relay;
pub(crate) mod request_logging;
pub mod session;
pub mod storage_traits;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Settings;
use crate::error::Result as AppResult;
use crate::providers::{ChatBackend, OpenAIBackend};
use crate::server::session::InMemorySessionStore;
use crate::server::storage_traits::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Settings,
    pub backend: Arc<dyn ChatBackend>,
    pub sessions: Arc<dyn SessionStore>,
}

pub fn create_app(config: Settings) -> AppResult<Router> {
    let backend = OpenAIBackend::new(config.upstream.clone())?;
    tracing::info!(
        "Using {:?} upstream at {}",
        config.upstream.api_type,
        config.upstream.chat_completions_url()
    );

    Ok(build_router(AppState {
        config,
        backend: Arc::new(backend),
        sessions: Arc::new(InMemorySessionStore::new()),
    }))
}

pub fn build_router(app_state: AppState) -> Router {
    let max_body_bytes = app_state.config.server.max_body_bytes;

    // CORS 全放开：网关本身不做调用方鉴权
    handlers::routes().with_state(Arc::new(app_state)).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(DefaultBodyLimit::max(max_body_bytes)),
    )
}
