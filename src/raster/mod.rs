//! Pixel work: decoding, resampling, border sampling and maskable padding.
//!
//! Everything here is synchronous and CPU bound. The generator moves calls
//! onto blocking tasks; the [`Rasterizer`] trait is the seam it renders
//! through, so tests can substitute a double that fails on chosen sizes.

mod border;
mod decode;
mod maskable;

pub use border::{dominant_border_color, rgb_to_hex};
pub use decode::{DecodedImage, decode};
pub use maskable::{compose_maskable, composite_over, parse_fill_color};

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{ImageFormat, RgbaImage};

use crate::config::ForgeConfig;
use crate::error::ProductionError;

// ============================================================================
// Rasterizer Trait
// ============================================================================

/// Produces encoded square icons from a decoded source.
pub trait Rasterizer: Send + Sync {
    /// Resamples the source to exactly `size`x`size` and encodes it as PNG.
    ///
    /// The source is stretched; squareness is guaranteed upstream.
    fn resize(&self, source: &DecodedImage, size: u32) -> Result<Vec<u8>, ProductionError>;

    /// Renders a padded maskable icon on a `fill_hex` background.
    fn maskable(
        &self,
        source: &DecodedImage,
        size: u32,
        fill_hex: &str,
    ) -> Result<Vec<u8>, ProductionError>;
}

// ============================================================================
// ImageRasterizer
// ============================================================================

/// The default [`Rasterizer`], backed by `image::imageops`.
#[derive(Debug, Clone, Copy)]
pub struct ImageRasterizer {
    filter: FilterType,
    safe_zone_ratio: f32,
}

impl ImageRasterizer {
    pub fn new(config: &ForgeConfig) -> Self {
        Self {
            filter: config.filter(),
            safe_zone_ratio: config.safe_zone_ratio(),
        }
    }
}

impl Default for ImageRasterizer {
    fn default() -> Self {
        Self::new(&ForgeConfig::default())
    }
}

impl Rasterizer for ImageRasterizer {
    fn resize(&self, source: &DecodedImage, size: u32) -> Result<Vec<u8>, ProductionError> {
        if size == 0 {
            return Err(ProductionError::InvalidSize(size));
        }
        let resized = imageops::resize(source.pixels(), size, size, self.filter);
        encode_png(&resized)
    }

    fn maskable(
        &self,
        source: &DecodedImage,
        size: u32,
        fill_hex: &str,
    ) -> Result<Vec<u8>, ProductionError> {
        if size == 0 {
            return Err(ProductionError::InvalidSize(size));
        }
        let fill = parse_fill_color(fill_hex)?;
        let icon = compose_maskable(source.pixels(), size, fill, self.safe_zone_ratio, self.filter);
        encode_png(&icon)
    }
}

/// Losslessly encodes an RGBA buffer as PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ProductionError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}
