use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod api;
pub mod startup_checks;
pub mod static_files;
pub mod watermark;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub static_files: StaticConfig,
    #[serde(default)]
    pub watermark: WatermarkConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticConfig {
    pub directory: PathBuf,
}

/// Engine settings and the defaults offered to the browser form.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatermarkConfig {
    pub font_path: PathBuf,
    pub jpeg_quality: u8,
    pub max_source_pixels: u64,
    pub defaults: watermark::WatermarkOptions,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            font_path: PathBuf::from("static/DejaVuSans.ttf"),
            jpeg_quality: watermark::DEFAULT_JPEG_QUALITY,
            max_source_pixels: watermark::DEFAULT_MAX_SOURCE_PIXELS,
            defaults: watermark::WatermarkOptions::default(),
        }
    }
}

impl WatermarkConfig {
    /// Renderer built from these settings; text watermarks need the font to load.
    pub fn renderer(&self) -> watermark::WatermarkRenderer {
        watermark::WatermarkRenderer::from_font_path(
            &self.font_path,
            watermark::TilingEngine::new(),
            self.jpeg_quality,
        )
        .with_max_source_pixels(self.max_source_pixels)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 4000,
            },
            app: AppConfig {
                name: "Tilemark".to_string(),
                log_level: "info".to_string(),
            },
            static_files: StaticConfig {
                directory: PathBuf::from("static"),
            },
            watermark: WatermarkConfig::default(),
        }
    }
}

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub static_handler: static_files::StaticFileHandler,
    pub config: Config,
    pub renderer: Arc<watermark::WatermarkRenderer>,
}

async fn index_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    app_state.static_handler.serve("index.html").await
}

async fn static_file_handler(
    State(app_state): State<AppState>,
    Path(path): Path<String>,
) -> impl IntoResponse {
    app_state.static_handler.serve(&path).await
}

pub async fn create_app(config: Config) -> Router {
    let static_handler =
        static_files::StaticFileHandler::new(config.static_files.directory.clone());

    let renderer = Arc::new(config.watermark.renderer());
    tracing::info!("Watermark engine ready: {:?}", renderer);

    let app_state = AppState {
        static_handler,
        config,
        renderer,
    };

    Router::new()
        .route("/", axum::routing::get(index_handler))
        .route("/api/health", axum::routing::get(api::health_handler))
        .route("/api/info", axum::routing::get(api::info_handler))
        .route("/{*path}", axum::routing::get(static_file_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            target: "access_log",
                            status = %response.status(),
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}
