use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use image::{
    DynamicImage, GrayImage, ImageEncoder, Luma, Rgba, RgbaImage, codecs::jpeg::JpegEncoder,
    imageops::{self, FilterType},
};
use imageproc::drawing::{draw_text_mut, text_size};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

use super::WatermarkError;
use super::position::PositionResolver;
use super::tiling::{Rotation, TileUnit, TilingEngine};
use super::types::{
    Extent, IMAGE_WIDTH_PER_FONT_PX, Layout, MAX_STAMP_PIXELS, Placement, RenderResult,
    SourceImage, WatermarkContent, WatermarkImage, WatermarkSpec,
};

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Pictures above this many pixels are refused before decoding.
pub const DEFAULT_MAX_SOURCE_PIXELS: u64 = 100_000_000;

/// A watermark rasterised once per batch and blended at every placement.
#[derive(Debug, Clone)]
pub struct Stamp {
    pixels: RgbaImage,
    extent: Extent,
    unit: TileUnit,
}

impl Stamp {
    /// The box used for placement geometry. For text this is the advance width by the
    /// font size; descenders may paint below it.
    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn unit(&self) -> TileUnit {
        self.unit
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Source-over at `at`. Placements whose box misses `target` entirely are skipped.
    fn blend_onto(&self, target: &mut RgbaImage, at: Placement) {
        let left = at.x.round() as i64;
        let top = at.y.round() as i64;
        if left >= i64::from(target.width())
            || top >= i64::from(target.height())
            || left + i64::from(self.pixels.width()) <= 0
            || top + i64::from(self.pixels.height()) <= 0
        {
            return;
        }
        imageops::overlay(target, &self.pixels, left, top);
    }
}

/// Bakes a batch-wide opacity into the stamp's alpha channel.
fn apply_opacity(pixels: &mut RgbaImage, opacity: f32) {
    for pixel in pixels.pixels_mut() {
        pixel[3] = (f32::from(pixel[3]) * opacity).round().clamp(0.0, 255.0) as u8;
    }
}

/// A transparent layer drawn in the rotated frame of a canvas.
///
/// The canvas is only touched by [`RotatedLayer::commit`]; dropping the layer without
/// committing leaves it exactly as it was.
pub struct RotatedLayer<'a> {
    target: &'a mut RgbaImage,
    layer: RgbaImage,
    origin: Placement,
    rotation: Rotation,
}

impl<'a> RotatedLayer<'a> {
    pub fn acquire(target: &'a mut RgbaImage, rotation: Rotation) -> Self {
        let (w, h) = (target.width() as f32, target.height() as f32);
        let (sin, cos) = rotation.radians().sin_cos();
        // Bounding box of the canvas seen from the rotated frame.
        let span_w = w * cos.abs() + h * sin.abs();
        let span_h = w * sin.abs() + h * cos.abs();

        let origin = Placement::new(
            rotation.center.x - span_w / 2.0,
            rotation.center.y - span_h / 2.0,
        );
        let layer = RgbaImage::new(span_w.ceil().max(1.0) as u32, span_h.ceil().max(1.0) as u32);
        debug!(
            "Acquired rotated layer {}x{} at {:.1} degrees",
            layer.width(),
            layer.height(),
            rotation.degrees
        );

        Self {
            target,
            layer,
            origin,
            rotation,
        }
    }

    fn draw(&mut self, stamp: &Stamp, at: Placement) {
        let local = Placement::new(at.x - self.origin.x, at.y - self.origin.y);
        stamp.blend_onto(&mut self.layer, local);
    }

    pub fn commit(self) {
        let center = self.rotation.center;
        let projection = Projection::translate(center.x, center.y)
            * Projection::rotate(self.rotation.radians())
            * Projection::translate(-center.x, -center.y)
            * Projection::translate(self.origin.x, self.origin.y);

        let mut rotated = RgbaImage::new(self.target.width(), self.target.height());
        warp_into(
            &self.layer,
            &projection,
            Interpolation::Bilinear,
            Rgba([0, 0, 0, 0]),
            &mut rotated,
        );

        imageops::overlay(self.target, &rotated, 0, 0);
    }
}

pub fn load_font(path: &Path) -> Result<FontVec, WatermarkError> {
    let data = std::fs::read(path).map_err(|e| {
        WatermarkError::FontUnavailable(format!("{}: {}", path.display(), e))
    })?;
    FontVec::try_from_vec(data).map_err(|_| {
        WatermarkError::FontUnavailable(format!("{}: not a usable font", path.display()))
    })
}

pub(crate) fn decode_image(file: &str, bytes: &[u8]) -> Result<DynamicImage, WatermarkError> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| WatermarkError::Decode {
            file: file.to_string(),
            source: image::ImageError::IoError(e),
        })?
        .decode()
        .map_err(|source| WatermarkError::Decode {
            file: file.to_string(),
            source,
        })
}

fn encode_jpeg(canvas: RgbaImage, quality: u8, file: &str) -> Result<Vec<u8>, WatermarkError> {
    // JPEG doesn't support alpha channel, so convert to RGB
    let rgb_image = DynamicImage::ImageRgba8(canvas).to_rgb8();
    let mut output = Vec::new();
    JpegEncoder::new_with_quality(&mut output, quality)
        .write_image(
            &rgb_image,
            rgb_image.width(),
            rgb_image.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|source| WatermarkError::Encode {
            file: file.to_string(),
            source,
        })?;
    Ok(output)
}

/// Draws a prepared [`Stamp`] onto pictures and encodes the result.
pub struct WatermarkRenderer {
    font: Option<FontVec>,
    positions: PositionResolver,
    tiling: TilingEngine,
    jpeg_quality: u8,
    max_source_pixels: u64,
}

impl std::fmt::Debug for WatermarkRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkRenderer")
            .field("has_font", &self.font.is_some())
            .field("positions", &self.positions)
            .field("tiling", &self.tiling)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_source_pixels", &self.max_source_pixels)
            .finish()
    }
}

impl WatermarkRenderer {
    pub fn new(
        font: Option<FontVec>,
        positions: PositionResolver,
        tiling: TilingEngine,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            font,
            positions,
            tiling,
            jpeg_quality: jpeg_quality.clamp(1, 100),
            max_source_pixels: DEFAULT_MAX_SOURCE_PIXELS,
        }
    }

    /// Image-only renderer with default geometry; text watermarks fail with
    /// [`WatermarkError::FontUnavailable`].
    pub fn without_font() -> Self {
        Self::new(
            None,
            PositionResolver::new(),
            TilingEngine::new(),
            DEFAULT_JPEG_QUALITY,
        )
    }

    /// Loads the font if present, otherwise renders image watermarks only.
    pub fn from_font_path(font_path: &Path, tiling: TilingEngine, jpeg_quality: u8) -> Self {
        let font = match load_font(font_path) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("Text watermarks disabled: {}", e);
                None
            }
        };
        Self::new(font, PositionResolver::new(), tiling, jpeg_quality)
    }

    /// Pictures (and image watermarks) whose header reports more pixels are refused.
    pub fn with_max_source_pixels(mut self, limit: u64) -> Self {
        self.max_source_pixels = limit;
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    pub fn max_source_pixels(&self) -> u64 {
        self.max_source_pixels
    }

    /// Rasterises the watermark once, with the spec's opacity already applied.
    pub fn prepare_stamp(&self, spec: &WatermarkSpec) -> Result<Stamp, WatermarkError> {
        let mut stamp = match spec.content() {
            WatermarkContent::Text { text, color } => {
                let font = self.font.as_ref().ok_or_else(|| {
                    WatermarkError::FontUnavailable("no font loaded for text watermarks".into())
                })?;
                text_stamp(font, text, spec.font_size_px(), *color)?
            }
            WatermarkContent::Image(image) => {
                let probe = SourceImage {
                    name: image.name.clone(),
                    bytes: image.bytes.clone(),
                };
                self.check_header(&probe)?;
                image_stamp(image, spec.font_size_px())?
            }
        };
        apply_opacity(&mut stamp.pixels, spec.opacity().get());
        Ok(stamp)
    }

    /// Draws `stamp` onto `canvas` at every placement of the layout in `spec`.
    pub fn compose(&self, canvas: &mut RgbaImage, stamp: &Stamp, spec: &WatermarkSpec) {
        let canvas_extent = Extent::from_pixels(canvas.width(), canvas.height());

        match spec.layout() {
            Layout::Anchored(anchor) => {
                let at = self.positions.resolve(anchor, canvas_extent, stamp.extent());
                stamp.blend_onto(canvas, at);
            }
            Layout::FullCover { pattern, density } => {
                let layout =
                    self.tiling
                        .layout(pattern, density, stamp.unit(), stamp.extent(), canvas_extent);
                match layout.rotation() {
                    Some(rotation) => {
                        let mut layer = RotatedLayer::acquire(canvas, rotation);
                        for at in layout.placements() {
                            layer.draw(stamp, at);
                        }
                        layer.commit();
                    }
                    None => {
                        for at in layout.placements() {
                            stamp.blend_onto(canvas, at);
                        }
                    }
                }
            }
        }
    }

    /// Decodes one source, watermarks it at its native size and encodes a JPEG.
    pub fn render(
        &self,
        source: &SourceImage,
        stamp: &Stamp,
        spec: &WatermarkSpec,
    ) -> Result<RenderResult, WatermarkError> {
        let (width, height) = self.check_header(source)?;
        debug!("Rendering {} ({}x{})", source.name, width, height);

        let mut canvas = decode_image(&source.name, &source.bytes)?.to_rgba8();
        self.compose(&mut canvas, stamp, spec);
        let output_bytes = encode_jpeg(canvas, self.jpeg_quality, &source.name)?;

        Ok(RenderResult {
            original_name: source.name.clone(),
            output_bytes,
            success: true,
        })
    }

    fn check_header(&self, source: &SourceImage) -> Result<(u32, u32), WatermarkError> {
        let (width, height) = source.dimensions()?;
        WatermarkError::check_pixels(
            &source.name,
            u64::from(width),
            u64::from(height),
            self.max_source_pixels,
        )?;
        Ok((width, height))
    }
}

fn text_stamp(
    font: &FontVec,
    text: &str,
    font_size_px: f32,
    color: Rgba<u8>,
) -> Result<Stamp, WatermarkError> {
    let scale = PxScale::from(font_size_px);
    let (text_width, _) = text_size(scale, font, text);
    let scaled = font.as_scaled(scale);

    // imageproc puts the baseline at the ascent; the layout box wants it at the font size.
    let baseline_shift = (font_size_px - scaled.ascent()).round() as i32;
    let height = (font_size_px - scaled.descent()).ceil().max(1.0) as u32;
    let width = text_width.max(1);
    WatermarkError::check_pixels(
        "text watermark",
        u64::from(width),
        u64::from(height),
        MAX_STAMP_PIXELS,
    )?;

    let mut coverage = GrayImage::new(width, height);
    draw_text_mut(
        &mut coverage,
        Luma([255u8]),
        0,
        baseline_shift,
        scale,
        font,
        text,
    );

    let pixels = RgbaImage::from_fn(width, height, |x, y| {
        let alpha = u16::from(coverage.get_pixel(x, y)[0]) * u16::from(color[3]) / 255;
        Rgba([color[0], color[1], color[2], alpha as u8])
    });

    Ok(Stamp {
        pixels,
        extent: Extent::new(text_width as f32, font_size_px),
        unit: TileUnit::Text { font_size_px },
    })
}

fn image_stamp(image: &WatermarkImage, font_size_px: f32) -> Result<Stamp, WatermarkError> {
    let decoded = decode_image(&image.name, &image.bytes)?;
    let width = font_size_px * IMAGE_WIDTH_PER_FONT_PX;
    let height = decoded.height() as f32 / decoded.width() as f32 * width;

    let (target_width, target_height) = (
        width.round().max(1.0) as u32,
        height.round().max(1.0) as u32,
    );
    WatermarkError::check_pixels(
        &image.name,
        u64::from(target_width),
        u64::from(target_height),
        MAX_STAMP_PIXELS,
    )?;

    let pixels = imageops::resize(
        &decoded.to_rgba8(),
        target_width,
        target_height,
        FilterType::Lanczos3,
    );

    Ok(Stamp {
        pixels,
        extent: Extent::new(width, height),
        unit: TileUnit::Image,
    })
}
