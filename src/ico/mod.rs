//! Multi-resolution icon container (`.ico`) with PNG-embedded frames.
//!
//! Layout, all integers little-endian:
//!
//! | bytes | field |
//! |---|---|
//! | 6 | header: reserved `0`, type `1`, frame count |
//! | 16 × n | directory: width, height (`0` means 256), colour count, reserved, planes, bit count, length, offset |
//! | … | PNG frames, in directory order |

pub mod endpoint;

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use crate::error::ComposeError;
use crate::icon::{FREE_ICONS, GeneratedAsset};

const HEADER_LEN: usize = 6;
const ENTRY_LEN: usize = 16;
const MAX_FRAME_EDGE: u32 = 256;
const ICON_TYPE: u16 = 1;

/// One parsed directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconDirEntry {
    pub width: u32,
    pub height: u32,
    pub planes: u16,
    pub bit_count: u16,
    pub length: u32,
    pub offset: u32,
}

impl IconDirEntry {
    /// The embedded frame bytes inside `container`.
    pub fn frame<'a>(&self, container: &'a [u8]) -> Option<&'a [u8]> {
        let start = self.offset as usize;
        container.get(start..start.checked_add(self.length as usize)?)
    }
}

/// Composes PNG frames into one icon container.
///
/// Every frame must be a PNG no larger than 256x256.
pub fn compose(frames: &[&[u8]]) -> Result<Vec<u8>, ComposeError> {
    if frames.is_empty() {
        return Err(ComposeError::NoFrames);
    }
    let count =
        u16::try_from(frames.len()).map_err(|_| ComposeError::TooManyFrames(frames.len()))?;

    let mut dimensions = Vec::with_capacity(frames.len());
    for (index, frame) in frames.iter().enumerate() {
        let (width, height) = png_dimensions(index, frame)?;
        if width > MAX_FRAME_EDGE || height > MAX_FRAME_EDGE {
            return Err(ComposeError::FrameTooLarge {
                index,
                width,
                height,
            });
        }
        dimensions.push((width, height));
    }

    let data_len: usize = frames.iter().map(|f| f.len()).sum();
    let mut out = Vec::with_capacity(HEADER_LEN + ENTRY_LEN * frames.len() + data_len);

    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&ICON_TYPE.to_le_bytes());
    out.extend_from_slice(&count.to_le_bytes());

    let mut offset = HEADER_LEN + ENTRY_LEN * frames.len();
    for (frame, (width, height)) in frames.iter().zip(&dimensions) {
        let length = u32::try_from(frame.len())
            .map_err(|_| ComposeError::Malformed("frame exceeds 4 GiB".to_string()))?;
        let start = u32::try_from(offset)
            .map_err(|_| ComposeError::Malformed("container exceeds 4 GiB".to_string()))?;

        out.push(edge_byte(*width));
        out.push(edge_byte(*height));
        out.push(0); // colour count
        out.push(0); // reserved
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&32u16.to_le_bytes());
        out.extend_from_slice(&length.to_le_bytes());
        out.extend_from_slice(&start.to_le_bytes());

        offset += frame.len();
    }

    for frame in frames {
        out.extend_from_slice(frame);
    }

    tracing::debug!(frames = frames.len(), bytes = out.len(), "composed icon container");
    Ok(out)
}

/// Composes the favicon from the free-tier assets (16, 32, 48 in that order).
pub fn compose_favicon(assets: &[GeneratedAsset]) -> Result<Vec<u8>, ComposeError> {
    let mut frames = Vec::with_capacity(FREE_ICONS.len());
    for spec in &FREE_ICONS {
        let asset = assets
            .iter()
            .find(|a| a.size == spec.size && a.name == spec.name)
            .ok_or(ComposeError::MissingFrame(spec.size))?;
        frames.push(asset.bytes.as_slice());
    }
    compose(&frames)
}

/// Parses the header and directory of an icon container.
///
/// Every frame range is checked to lie inside `bytes`.
pub fn read_directory(bytes: &[u8]) -> Result<Vec<IconDirEntry>, ComposeError> {
    if bytes.len() < HEADER_LEN {
        return Err(ComposeError::Malformed("truncated header".to_string()));
    }
    if read_u16(bytes, 0) != 0 || read_u16(bytes, 2) != ICON_TYPE {
        return Err(ComposeError::Malformed("not an icon container".to_string()));
    }

    let count = read_u16(bytes, 4) as usize;
    if count == 0 {
        return Err(ComposeError::NoFrames);
    }
    if bytes.len() < HEADER_LEN + ENTRY_LEN * count {
        return Err(ComposeError::Malformed("truncated directory".to_string()));
    }

    (0..count)
        .map(|i| {
            let base = HEADER_LEN + ENTRY_LEN * i;
            let entry = IconDirEntry {
                width: edge_from_byte(bytes[base]),
                height: edge_from_byte(bytes[base + 1]),
                planes: read_u16(bytes, base + 4),
                bit_count: read_u16(bytes, base + 6),
                length: read_u32(bytes, base + 8),
                offset: read_u32(bytes, base + 12),
            };
            if entry.frame(bytes).is_none() {
                return Err(ComposeError::Malformed(format!(
                    "frame {i} lies outside the container"
                )));
            }
            Ok(entry)
        })
        .collect()
}

fn png_dimensions(index: usize, frame: &[u8]) -> Result<(u32, u32), ComposeError> {
    let invalid = |reason: String| ComposeError::InvalidFrame { index, reason };

    let reader = ImageReader::new(Cursor::new(frame))
        .with_guessed_format()
        .map_err(|e| invalid(e.to_string()))?;
    if reader.format() != Some(ImageFormat::Png) {
        return Err(invalid("not a png".to_string()));
    }
    reader.into_dimensions().map_err(|e| invalid(e.to_string()))
}

fn edge_byte(edge: u32) -> u8 {
    if edge >= MAX_FRAME_EDGE { 0 } else { edge as u8 }
}

fn edge_from_byte(byte: u8) -> u32 {
    if byte == 0 { MAX_FRAME_EDGE } else { byte as u32 }
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
