use image::Rgba;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::WatermarkError;

/// Distance kept between a corner-anchored watermark and the canvas edges.
pub const EDGE_MARGIN: f32 = 20.0;

/// Image watermarks are scaled to this many times the font size in width.
pub const IMAGE_WIDTH_PER_FONT_PX: f32 = 2.5;

/// Font sizes the form's slider offers; they also bound tile spacing.
pub const FONT_SIZE_RANGE_PX: std::ops::RangeInclusive<f32> = 8.0..=200.0;

/// Largest watermark raster a batch will allocate.
pub const MAX_STAMP_PIXELS: u64 = 4_000_000;

/// Minimum gap between consecutive downloads when saving a whole batch.
pub const DOWNLOAD_SPACING: Duration = Duration::from_millis(500);

pub const OUTPUT_PREFIX: &str = "watermarked_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
}

impl Anchor {
    pub const ALL: [Anchor; 5] = [
        Anchor::TopLeft,
        Anchor::TopRight,
        Anchor::BottomLeft,
        Anchor::BottomRight,
        Anchor::Center,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Anchor::TopLeft => "top-left",
            Anchor::TopRight => "top-right",
            Anchor::BottomLeft => "bottom-left",
            Anchor::BottomRight => "bottom-right",
            Anchor::Center => "center",
        }
    }

    /// Unknown names resolve to bottom-right.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|anchor| anchor.name().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverPattern {
    #[default]
    Grid,
    Diagonal,
    Random,
    Spiral,
}

impl CoverPattern {
    pub const ALL: [CoverPattern; 4] = [
        CoverPattern::Grid,
        CoverPattern::Diagonal,
        CoverPattern::Random,
        CoverPattern::Spiral,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CoverPattern::Grid => "grid",
            CoverPattern::Diagonal => "diagonal",
            CoverPattern::Random => "random",
            CoverPattern::Spiral => "spiral",
        }
    }

    /// Unknown names resolve to grid.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|pattern| pattern.name().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }
}

/// Tiling density from 1 (sparsest) to 10 (densest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Density(u8);

impl Density {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: u8) -> Result<Self, WatermarkError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(WatermarkError::validation(format!(
                "density must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Scales `base` down as density grows: `base * (11 - density) / 10`.
    pub fn spacing(self, base: f32) -> f32 {
        base * f32::from(11 - self.0) / 10.0
    }
}

impl Default for Density {
    fn default() -> Self {
        Self(5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Opacity(f32);

impl Opacity {
    pub fn new(value: f32) -> Result<Self, WatermarkError> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(WatermarkError::validation(format!(
                "opacity must be within [0, 1], got {}",
                value
            )))
        }
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Layout {
    Anchored(Anchor),
    FullCover {
        pattern: CoverPattern,
        density: Density,
    },
}

/// Top-left pixel offset of one watermark instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
}

impl Placement {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Extent {
    pub width: f32,
    pub height: f32,
}

impl Extent {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self::new(width as f32, height as f32)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    pub fn longest_side(&self) -> f32 {
        self.width.max(self.height)
    }
}

#[derive(Debug, Clone)]
pub struct WatermarkImage {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

#[derive(Debug, Clone)]
pub enum WatermarkContent {
    Text { text: String, color: Rgba<u8> },
    Image(WatermarkImage),
}

/// What the user supplied as the watermark, before validation.
#[derive(Debug, Clone)]
pub enum WatermarkSource {
    Text(String),
    Image { name: String, bytes: Vec<u8> },
}

/// The raw configuration axes as they arrive from a form or a config file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WatermarkOptions {
    pub position: String,
    pub opacity: f32,
    pub font_size: f32,
    pub color: String,
    #[serde(default)]
    pub cover_pattern: Option<String>,
    #[serde(default)]
    pub cover_density: Option<u8>,
}

impl Default for WatermarkOptions {
    fn default() -> Self {
        Self {
            position: Anchor::BottomRight.name().to_string(),
            opacity: 0.7,
            font_size: 24.0,
            color: "#ffffff".to_string(),
            cover_pattern: None,
            cover_density: None,
        }
    }
}

pub const FULL_COVER: &str = "full-cover";

/// Immutable configuration for one batch run.
#[derive(Debug, Clone)]
pub struct WatermarkSpec {
    content: WatermarkContent,
    font_size_px: f32,
    opacity: Opacity,
    layout: Layout,
}

impl WatermarkSpec {
    pub fn new(
        content: WatermarkContent,
        font_size_px: f32,
        opacity: Opacity,
        layout: Layout,
    ) -> Result<Self, WatermarkError> {
        if !FONT_SIZE_RANGE_PX.contains(&font_size_px) {
            return Err(WatermarkError::validation(format!(
                "font size must be between {} and {} px, got {}",
                FONT_SIZE_RANGE_PX.start(),
                FONT_SIZE_RANGE_PX.end(),
                font_size_px
            )));
        }
        match &content {
            WatermarkContent::Text { text, .. } if text.trim().is_empty() => {
                return Err(WatermarkError::validation("watermark text is empty"));
            }
            WatermarkContent::Image(image) if image.bytes.is_empty() => {
                return Err(WatermarkError::validation(format!(
                    "watermark image {} is empty",
                    image.name
                )));
            }
            _ => {}
        }

        Ok(Self {
            content,
            font_size_px,
            opacity,
            layout,
        })
    }

    pub fn from_options(
        source: WatermarkSource,
        options: &WatermarkOptions,
    ) -> Result<Self, WatermarkError> {
        let content = match source {
            WatermarkSource::Text(text) => WatermarkContent::Text {
                text: text.trim().to_string(),
                color: parse_hex_color(&options.color)?,
            },
            WatermarkSource::Image { name, bytes } => {
                let is_image = mime_guess::from_path(&name)
                    .first()
                    .map(|mime| mime.type_() == mime_guess::mime::IMAGE)
                    .unwrap_or(false);
                if !is_image {
                    return Err(WatermarkError::validation(format!(
                        "watermark {} is not an image file",
                        name
                    )));
                }
                WatermarkContent::Image(WatermarkImage {
                    name,
                    bytes: Arc::from(bytes),
                })
            }
        };

        let layout = if options.position.trim().eq_ignore_ascii_case(FULL_COVER) {
            Layout::FullCover {
                pattern: options
                    .cover_pattern
                    .as_deref()
                    .map(CoverPattern::from_name)
                    .unwrap_or_default(),
                density: options
                    .cover_density
                    .map(Density::new)
                    .transpose()?
                    .unwrap_or_default(),
            }
        } else {
            Layout::Anchored(Anchor::from_name(&options.position))
        };

        Self::new(
            content,
            options.font_size,
            Opacity::new(options.opacity)?,
            layout,
        )
    }

    pub fn content(&self) -> &WatermarkContent {
        &self.content
    }

    pub fn font_size_px(&self) -> f32 {
        self.font_size_px
    }

    pub fn opacity(&self) -> Opacity {
        self.opacity
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }
}

/// Parses `#rrggbb` or `#rgb` into an opaque colour.
pub fn parse_hex_color(value: &str) -> Result<Rgba<u8>, WatermarkError> {
    let invalid = || WatermarkError::validation(format!("invalid colour: {:?}", value));
    let hex = value.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !hex.is_ascii() {
        return Err(invalid());
    }

    let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|_| invalid());
    match hex.len() {
        6 => Ok(Rgba([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
            255,
        ])),
        3 => {
            let short = |i: usize| channel(&hex[i..i + 1]).map(|v| v * 17);
            Ok(Rgba([short(0)?, short(1)?, short(2)?, 255]))
        }
        _ => Err(invalid()),
    }
}

/// An input picture: its file name and encoded bytes.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: Arc::from(bytes.into()),
        }
    }

    /// Reads the pixel size from the header without decoding the image.
    pub fn dimensions(&self) -> Result<(u32, u32), WatermarkError> {
        image::ImageReader::new(std::io::Cursor::new(&self.bytes[..]))
            .with_guessed_format()
            .map_err(|e| WatermarkError::Decode {
                file: self.name.clone(),
                source: image::ImageError::IoError(e),
            })?
            .into_dimensions()
            .map_err(|source| WatermarkError::Decode {
                file: self.name.clone(),
                source,
            })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderResult {
    pub original_name: String,
    #[serde(skip)]
    pub output_bytes: Vec<u8>,
    pub success: bool,
}

impl RenderResult {
    pub fn download_name(&self) -> String {
        format!("{}{}", OUTPUT_PREFIX, self.original_name)
    }

    pub fn content_type(&self) -> &'static str {
        "image/jpeg"
    }
}

/// Offsets at which each result should be handed to the browser when saving all of them.
pub fn download_schedule(
    results: &[RenderResult],
) -> impl Iterator<Item = (Duration, &RenderResult)> {
    results
        .iter()
        .enumerate()
        .map(|(index, result)| (DOWNLOAD_SPACING * index as u32, result))
}
