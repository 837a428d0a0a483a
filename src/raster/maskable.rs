//! Maskable icon composition: source art inside a padded safe zone.

use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use palette::Srgb;

use crate::error::ProductionError;
use crate::icon::RectPx;

/// Parses a `#rrggbb` / `#rgb` hex color into an opaque pixel.
pub fn parse_fill_color(hex: &str) -> Result<Rgba<u8>, ProductionError> {
    let rgb = Srgb::<u8>::from_str(hex.trim())
        .map_err(|_| ProductionError::InvalidColor(hex.to_string()))?;
    Ok(Rgba([rgb.red, rgb.green, rgb.blue, 255]))
}

/// Builds a `size`x`size` maskable icon.
///
/// The surface is filled with `fill`, then the source is resampled into the
/// centered safe zone (see [`RectPx::centered_square`]) and composited over
/// the fill, so adaptive platform masks never clip the artwork.
pub fn compose_maskable(
    source: &RgbaImage,
    size: u32,
    fill: Rgba<u8>,
    safe_zone_ratio: f32,
    filter: FilterType,
) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(size, size, fill);
    let zone = RectPx::centered_square(size, safe_zone_ratio);
    if zone.width == 0 {
        return canvas;
    }

    let content = imageops::resize(source, zone.width, zone.height, filter);
    composite_over(&mut canvas, &content, zone.x as i32, zone.y as i32);
    canvas
}

/// Composites a source image onto a destination image at the specified position.
///
/// Uses standard alpha blending (source over destination).
pub fn composite_over(dest: &mut RgbaImage, src: &RgbaImage, x: i32, y: i32) {
    let dest_width = dest.width() as i32;
    let dest_height = dest.height() as i32;

    for (sx, sy, src_pixel) in src.enumerate_pixels() {
        let dx = x + sx as i32;
        let dy = y + sy as i32;

        if dx < 0 || dy < 0 || dx >= dest_width || dy >= dest_height {
            continue;
        }

        let dst_pixel = dest.get_pixel(dx as u32, dy as u32);
        let blended = alpha_blend(*src_pixel, *dst_pixel);
        dest.put_pixel(dx as u32, dy as u32, blended);
    }
}

/// Alpha blends two RGBA pixels (source over destination).
fn alpha_blend(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3] as f32 / 255.0;
    let da = dst[3] as f32 / 255.0;

    let out_a = sa + da * (1.0 - sa);
    if out_a == 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |s: u8, d: u8| -> u8 {
        let sf = s as f32 / 255.0;
        let df = d as f32 / 255.0;
        let out = (sf * sa + df * da * (1.0 - sa)) / out_a;
        (out * 255.0).round() as u8
    };

    Rgba([
        blend(src[0], dst[0]),
        blend(src[1], dst[1]),
        blend(src[2], dst[2]),
        (out_a * 255.0).round() as u8,
    ])
}
