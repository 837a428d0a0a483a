//! Source decoding for raster formats and SVG.

use std::sync::Arc;

use image::{ImageFormat, RgbaImage};
use resvg::tiny_skia::{Pixmap, Transform};
use resvg::usvg::{Options, Tree};

use crate::error::DecodeError;
use crate::icon::SizePx;

/// A decoded source raster.
///
/// The pixels live behind an `Arc`, so clones are cheap and can be moved
/// into concurrent render tasks. The buffer is freed when the last clone is
/// dropped.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: Arc<RgbaImage>,
}

impl DecodedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> SizePx {
        SizePx::new(self.width(), self.height())
    }
}

/// Decodes source bytes according to their declared mime type.
///
/// SVG sources are rasterized with their longest side at `svg_render_size`.
pub fn decode(bytes: &[u8], mime_type: &str, svg_render_size: u32) -> Result<DecodedImage, DecodeError> {
    let pixels = match mime_type {
        "image/png" => decode_raster(bytes, ImageFormat::Png)?,
        "image/jpeg" | "image/jpg" => decode_raster(bytes, ImageFormat::Jpeg)?,
        "image/webp" => decode_raster(bytes, ImageFormat::WebP)?,
        "image/svg+xml" => render_svg(bytes, svg_render_size)?,
        other => return Err(DecodeError::UnsupportedMime(other.to_string())),
    };

    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(DecodeError::Empty);
    }

    let decoded = DecodedImage::new(pixels);
    if !decoded.dimensions().is_square() {
        tracing::warn!(
            width = decoded.width(),
            height = decoded.height(),
            "source image is not square, output will be stretched"
        );
    }
    Ok(decoded)
}

fn decode_raster(bytes: &[u8], format: ImageFormat) -> Result<RgbaImage, DecodeError> {
    Ok(image::load_from_memory_with_format(bytes, format)?.to_rgba8())
}

/// Renders SVG data so that its larger dimension is `size` pixels.
fn render_svg(bytes: &[u8], size: u32) -> Result<RgbaImage, DecodeError> {
    let tree = Tree::from_data(bytes, &Options::default())
        .map_err(|e| DecodeError::Svg(e.to_string()))?;

    let svg_size = tree.size();
    let scale = (size as f32) / svg_size.width().max(svg_size.height());
    let width = (svg_size.width() * scale).ceil() as u32;
    let height = (svg_size.height() * scale).ceil() as u32;

    let mut pixmap = Pixmap::new(width, height).ok_or(DecodeError::Empty)?;
    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    Ok(pixmap_to_rgba_image(&pixmap))
}

/// Converts a premultiplied tiny_skia pixmap to straight-alpha RGBA.
fn pixmap_to_rgba_image(pixmap: &Pixmap) -> RgbaImage {
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in img.pixels_mut().zip(pixmap.pixels()) {
        let color = src.demultiply();
        dst.0 = [color.red(), color.green(), color.blue(), color.alpha()];
    }
    img
}
