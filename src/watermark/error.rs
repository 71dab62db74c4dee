use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("Invalid watermark request: {0}")]
    Validation(String),

    #[error("Failed to decode {file}: {source}")]
    Decode {
        file: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode {file}: {source}")]
    Encode {
        file: String,
        #[source]
        source: image::ImageError,
    },

    #[error("{file} is {width}x{height}, above the {limit} pixel limit")]
    TooLarge {
        file: String,
        width: u64,
        height: u64,
        limit: u64,
    },

    #[error("Font unavailable: {0}")]
    FontUnavailable(String),

    #[error("Batch cancelled before {file}")]
    Cancelled { file: String },

    #[error("Render task for {file} failed: {message}")]
    Task { file: String, message: String },
}

impl WatermarkError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Fails when a `width` by `height` raster would exceed `limit` pixels.
    pub fn check_pixels(
        file: &str,
        width: u64,
        height: u64,
        limit: u64,
    ) -> Result<(), WatermarkError> {
        if width.saturating_mul(height) > limit {
            return Err(Self::TooLarge {
                file: file.to_string(),
                width,
                height,
                limit,
            });
        }
        Ok(())
    }

    /// Name of the file the failure belongs to, if any.
    pub fn file(&self) -> Option<&str> {
        match self {
            Self::Decode { file, .. }
            | Self::Encode { file, .. }
            | Self::TooLarge { file, .. }
            | Self::Cancelled { file }
            | Self::Task { file, .. } => Some(file),
            Self::Validation(_) | Self::FontUnavailable(_) => None,
        }
    }
}
