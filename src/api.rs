use axum::{extract::State, response::Json};
use serde::Serialize;

use crate::watermark::{
    ACCEPTED_TYPES, Anchor, CoverPattern, Density, FONT_SIZE_RANGE_PX, FULL_COVER, OUTPUT_PREFIX,
    WatermarkOptions, WatermarkRenderer,
};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: String,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct InfoResponse {
    pub name: String,
    pub mode: &'static str,
    pub description: &'static str,
    pub benefits: Vec<&'static str>,
    pub capabilities: Capabilities,
    pub defaults: WatermarkOptions,
}

#[derive(Serialize)]
pub struct Capabilities {
    pub positions: Vec<&'static str>,
    pub cover_patterns: Vec<&'static str>,
    pub density_range: [u8; 2],
    pub font_size_range: [f32; 2],
    pub accepted_types: Vec<&'static str>,
    pub output_type: &'static str,
    pub output_prefix: &'static str,
    pub output_quality: u8,
    pub text_watermarks: bool,
    pub max_source_pixels: u64,
}

impl Capabilities {
    /// What `renderer` can do, as advertised to the browser form.
    pub fn current(renderer: &WatermarkRenderer) -> Self {
        let mut positions: Vec<&'static str> = Anchor::ALL.iter().map(Anchor::name).collect();
        positions.push(FULL_COVER);

        Self {
            positions,
            cover_patterns: CoverPattern::ALL.iter().map(CoverPattern::name).collect(),
            density_range: [Density::MIN, Density::MAX],
            font_size_range: [*FONT_SIZE_RANGE_PX.start(), *FONT_SIZE_RANGE_PX.end()],
            accepted_types: ACCEPTED_TYPES.to_vec(),
            output_type: "image/jpeg",
            output_prefix: OUTPUT_PREFIX,
            output_quality: renderer.jpeg_quality(),
            text_watermarks: renderer.has_font(),
            max_source_pixels: renderer.max_source_pixels(),
        }
    }
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "Images are watermarked in the browser; the server only serves static files"
            .to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn info_handler(State(app_state): State<crate::AppState>) -> Json<InfoResponse> {
    tracing::debug!("Serving capability description");
    Json(InfoResponse {
        name: app_state.config.app.name.clone(),
        mode: "client-side-processing",
        description: "All image processing happens on the client; the server only serves static files",
        benefits: vec![
            "No image processing load on the server",
            "Pictures never leave the user's machine",
            "Instant preview of the result",
            "No upload of original images",
        ],
        capabilities: Capabilities::current(&app_state.renderer),
        defaults: app_state.config.watermark.defaults.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_list_every_layout() {
        let capabilities = Capabilities::current(&WatermarkRenderer::without_font());
        assert_eq!(
            capabilities.positions,
            vec!["top-left", "top-right", "bottom-left", "bottom-right", "center", "full-cover"]
        );
        assert_eq!(
            capabilities.cover_patterns,
            vec!["grid", "diagonal", "random", "spiral"]
        );
        assert_eq!(capabilities.density_range, [1, 10]);
        assert_eq!(capabilities.font_size_range, [8.0, 200.0]);
        assert!(!capabilities.text_watermarks);
        assert_eq!(capabilities.output_quality, 90);
    }

    #[tokio::test]
    async fn test_health_timestamp_is_rfc3339() {
        let Json(health) = health_handler().await;
        assert_eq!(health.status, "ok");
        assert!(chrono::DateTime::parse_from_rfc3339(&health.timestamp).is_ok());
    }
}
