use crate::Config;
use crate::watermark::load_font;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Static files directory does not exist: {0}")]
    StaticDirectoryMissing(String),

    #[error("Required file missing: {0}")]
    RequiredFileMissing(String),

    #[error("Font cannot be used for text watermarks: {0}")]
    FontUnusable(String),
}

impl StartupCheckError {
    /// Whether the server cannot do anything useful without this being fixed.
    pub fn is_critical(&self) -> bool {
        matches!(self, StartupCheckError::StaticDirectoryMissing(_))
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let static_dir = &config.static_files.directory;
    if !static_dir.exists() {
        error!("Static files directory does not exist: {:?}", static_dir);
        errors.push(StartupCheckError::StaticDirectoryMissing(
            static_dir.display().to_string(),
        ));
    } else {
        info!("Static files directory exists: {:?}", static_dir);
        let index = static_dir.join("index.html");
        if !index.exists() {
            warn!("Front page missing: {:?}", index);
            errors.push(StartupCheckError::RequiredFileMissing(
                index.display().to_string(),
            ));
        }
    }

    let font_path = &config.watermark.font_path;
    if !font_path.exists() {
        warn!("Watermark font missing: {:?}", font_path);
        errors.push(StartupCheckError::RequiredFileMissing(
            font_path.display().to_string(),
        ));
    } else if let Err(e) = load_font(font_path) {
        warn!("Watermark font unusable: {}", e);
        errors.push(StartupCheckError::FontUnusable(e.to_string()));
    } else {
        info!("Watermark font found: {:?}", font_path);
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
