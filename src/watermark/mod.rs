// Watermark engine - placement geometry, compositing and sequential batches
mod batch;
mod error;
mod position;
mod render;
mod sources;
mod tiling;
mod types;

pub use batch::{BatchCoordinator, BatchProgress, BatchState};
pub use error::WatermarkError;
pub use position::PositionResolver;
pub use render::{
    DEFAULT_JPEG_QUALITY, DEFAULT_MAX_SOURCE_PIXELS, RotatedLayer, Stamp, WatermarkRenderer,
    load_font,
};
pub use sources::{ACCEPTED_TYPES, SourceList, is_accepted};
pub use tiling::{
    DIAGONAL_ANGLE_DEGREES, Lattice, PlacementPlan, Placements, Rotation, Scatter, Spiral,
    TileLayout, TileUnit, TilingEngine,
};
pub use types::{
    Anchor, CoverPattern, DOWNLOAD_SPACING, Density, EDGE_MARGIN, Extent, FONT_SIZE_RANGE_PX,
    FULL_COVER, IMAGE_WIDTH_PER_FONT_PX, Layout, MAX_STAMP_PIXELS, OUTPUT_PREFIX, Opacity,
    Placement, RenderResult, SourceImage, WatermarkContent, WatermarkImage, WatermarkOptions, WatermarkSource,
    WatermarkSpec, download_schedule, parse_hex_color,
};
