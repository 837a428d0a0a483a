//! Perimeter color sampling used to pad maskable icons.

use std::collections::HashMap;

use image::{Rgba, RgbaImage};

use crate::config::FALLBACK_BORDER_COLOR;

/// Formats an RGB triple as a lowercase `#rrggbb` hex string.
pub fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}

/// Returns the most frequent opaque color on the 1px outer ring of `image`.
///
/// Pixels are visited top row, bottom row, then the left and right columns
/// without their corners. Only pixels with alpha `>= alpha_threshold` count.
/// Ties go to the color seen first in that order. If no pixel qualifies the
/// result is [`FALLBACK_BORDER_COLOR`].
pub fn dominant_border_color(image: &RgbaImage, alpha_threshold: u8) -> String {
    let mut tally = ColorTally::default();
    for (x, y) in border_coordinates(image.width(), image.height()) {
        let pixel = image.get_pixel(x, y);
        if pixel[3] >= alpha_threshold {
            tally.add(pixel);
        }
    }

    tally
        .dominant()
        .unwrap_or_else(|| FALLBACK_BORDER_COLOR.to_string())
}

/// Coordinates of the outer ring in scan order, each visited once.
fn border_coordinates(width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    let has_pixels = width > 0 && height > 0;
    let top = (0..width).filter(move |_| has_pixels).map(|x| (x, 0));
    let bottom = (0..width)
        .filter(move |_| has_pixels && height > 1)
        .map(move |x| (x, height - 1));
    let inner_rows = 1..height.saturating_sub(1);
    let left = inner_rows.clone().filter(move |_| has_pixels).map(|y| (0, y));
    let right = inner_rows
        .filter(move |_| has_pixels && width > 1)
        .map(move |y| (width - 1, y));
    top.chain(bottom).chain(left).chain(right)
}

/// Frequency map that remembers first-insertion order.
#[derive(Default)]
struct ColorTally {
    index: HashMap<[u8; 3], usize>,
    counts: Vec<([u8; 3], u32)>,
}

impl ColorTally {
    fn add(&mut self, pixel: &Rgba<u8>) {
        let rgb = [pixel[0], pixel[1], pixel[2]];
        match self.index.get(&rgb) {
            Some(&slot) => self.counts[slot].1 += 1,
            None => {
                self.index.insert(rgb, self.counts.len());
                self.counts.push((rgb, 1));
            }
        }
    }

    fn dominant(&self) -> Option<String> {
        let mut best: Option<&([u8; 3], u32)> = None;
        for entry in &self.counts {
            // Strictly greater keeps the earliest color on ties.
            if best.is_none_or(|b| entry.1 > b.1) {
                best = Some(entry);
            }
        }
        best.map(|([r, g, b], _)| rgb_to_hex(*r, *g, *b))
    }
}
