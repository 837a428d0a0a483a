//! Core data model: tiers, source images, generated assets and the fixed
//! size tables every platform expects.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Mime type of every generated raster.
pub const PNG_MIME: &str = "image/png";

/// A rectangle defined in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RectPx {
    /// X offset from the left edge of the image
    pub x: u32,
    /// Y offset from the top edge of the image
    pub y: u32,
    /// Width of the rectangle
    pub width: u32,
    /// Height of the rectangle
    pub height: u32,
}

impl RectPx {
    /// Creates a new rectangle with the given position and dimensions.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// The centered square occupying `ratio` of a `size`x`size` surface.
    ///
    /// The offset is rounded first and the extent derived from it, so the
    /// margin is identical on all four sides.
    pub fn centered_square(size: u32, ratio: f32) -> Self {
        let offset = (size as f32 * (1.0 - ratio) / 2.0).round() as u32;
        let offset = offset.min(size / 2);
        let extent = size - 2 * offset;
        Self::new(offset, offset, extent, extent)
    }
}

/// A 2D size in pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizePx {
    pub width: u32,
    pub height: u32,
}

impl SizePx {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true if width equals height.
    pub fn is_square(&self) -> bool {
        self.width == self.height
    }
}

// ============================================================================
// Tier
// ============================================================================

/// Which set of assets a user is entitled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Premium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(Self::Free),
            "premium" => Some(Self::Premium),
            _ => None,
        }
    }

    pub fn is_premium(&self) -> bool {
        matches!(self, Self::Premium)
    }
}

// ============================================================================
// Size tables
// ============================================================================

/// One entry of a fixed size table: what to render and where it goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IconSpec {
    pub size: u32,
    pub name: &'static str,
    pub path: &'static str,
    pub tier: Tier,
}

impl IconSpec {
    const fn new(size: u32, name: &'static str, path: &'static str, tier: Tier) -> Self {
        Self {
            size,
            name,
            path,
            tier,
        }
    }
}

/// Sizes every tier receives. These also make up the icon container.
pub const FREE_ICONS: [IconSpec; 3] = [
    IconSpec::new(16, "favicon-16x16.png", "web/", Tier::Free),
    IconSpec::new(32, "favicon-32x32.png", "web/", Tier::Free),
    IconSpec::new(48, "favicon-48x48.png", "web/", Tier::Free),
];

/// Platform icons added on the premium tier.
pub const PREMIUM_ICONS: [IconSpec; 6] = [
    IconSpec::new(180, "apple-touch-icon.png", "ios/", Tier::Premium),
    IconSpec::new(192, "icon-192.png", "android/", Tier::Premium),
    IconSpec::new(384, "icon-384.png", "android/", Tier::Premium),
    IconSpec::new(512, "icon-512.png", "android/", Tier::Premium),
    IconSpec::new(1024, "icon-1024.png", "android/", Tier::Premium),
    IconSpec::new(150, "mstile-150x150.png", "windows/", Tier::Premium),
];

/// Padded android icons, premium only.
pub const MASKABLE_ICONS: [IconSpec; 4] = [
    IconSpec::new(192, "icon-192-maskable.png", "android/", Tier::Premium),
    IconSpec::new(384, "icon-384-maskable.png", "android/", Tier::Premium),
    IconSpec::new(512, "icon-512-maskable.png", "android/", Tier::Premium),
    IconSpec::new(1024, "icon-1024-maskable.png", "android/", Tier::Premium),
];

/// Plain (unpadded) icon specs for a tier, in production order.
pub fn plain_icons(tier: Tier) -> Vec<IconSpec> {
    let mut specs = FREE_ICONS.to_vec();
    if tier.is_premium() {
        specs.extend_from_slice(&PREMIUM_ICONS);
    }
    specs
}

// ============================================================================
// SourceImage
// ============================================================================

/// The one uploaded image a workflow run works from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub filename: String,
    /// Milliseconds since the Unix epoch.
    pub captured_at: i64,
}

impl SourceImage {
    /// Wraps freshly received bytes, stamping them with the current time.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            filename: filename.into(),
            captured_at: Utc::now().timestamp_millis(),
        }
    }
}

// ============================================================================
// GeneratedAsset
// ============================================================================

/// One rendered icon file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAsset {
    /// File name, e.g. `favicon-16x16.png`.
    pub name: String,
    /// Folder prefix inside the archive, e.g. `web/`.
    pub path: String,
    /// Edge length in pixels.
    pub size: u32,
    pub tier: Tier,
    /// PNG-encoded pixels.
    pub bytes: Vec<u8>,
}

impl GeneratedAsset {
    /// Creates an asset placed according to its size-table entry.
    pub fn from_spec(spec: &IconSpec, bytes: Vec<u8>) -> Self {
        Self {
            name: spec.name.to_string(),
            path: spec.path.to_string(),
            size: spec.size,
            tier: spec.tier,
            bytes,
        }
    }

    /// Location of the asset inside an archive.
    pub fn archive_path(&self) -> String {
        format!("{}{}", self.path, self.name)
    }

    pub fn mime_type(&self) -> &'static str {
        PNG_MIME
    }
}
