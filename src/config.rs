//! Pipeline configuration, loadable from a TOML file.
//!
//! Every field has a named default, so a partial (or empty) file is valid:
//!
//! ```
//! use faviconforge_core::ForgeConfig;
//!
//! let config = ForgeConfig::from_toml_str("safe_zone_ratio = 0.75").unwrap();
//! assert_eq!(config.safe_zone_ratio, 0.75);
//! assert_eq!(config.opaque_alpha_threshold, 128);
//! ```

use crate::error::ConfigError;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Defaults
// ============================================================================

/// Border pixels with at least this alpha count as opaque.
pub const DEFAULT_OPAQUE_ALPHA_THRESHOLD: u8 = 128;

/// Fraction of a maskable icon occupied by the source (the safe zone).
pub const DEFAULT_SAFE_ZONE_RATIO: f32 = 0.8;

/// Smallest accepted safe-zone ratio.
pub const MIN_SAFE_ZONE_RATIO: f32 = 0.1;

/// Color returned when no border pixel is opaque enough.
pub const FALLBACK_BORDER_COLOR: &str = "#ffffff";

/// Longest side, in pixels, that SVG sources are rendered at before resizing.
pub const DEFAULT_SVG_RENDER_SIZE: u32 = 1024;

/// Prefix of suggested archive filenames.
pub const DEFAULT_ARCHIVE_PREFIX: &str = "faviconforge";

// ============================================================================
// ResizeFilter
// ============================================================================

/// Resampling filter used for every resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    #[default]
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

// ============================================================================
// CacheConfig
// ============================================================================

/// Where the result cache lives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// SQLite database file. `None` keeps the cache in memory.
    pub path: Option<PathBuf>,

    /// Upper bound on stored bytes. `None` means unbounded.
    pub quota_bytes: Option<u64>,
}

// ============================================================================
// ForgeConfig
// ============================================================================

/// Tunables for generation and packaging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub opaque_alpha_threshold: u8,
    pub safe_zone_ratio: f32,
    pub resize_filter: ResizeFilter,
    pub svg_render_size: u32,
    pub archive_prefix: String,
    pub cache: CacheConfig,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            opaque_alpha_threshold: DEFAULT_OPAQUE_ALPHA_THRESHOLD,
            safe_zone_ratio: DEFAULT_SAFE_ZONE_RATIO,
            resize_filter: ResizeFilter::default(),
            svg_render_size: DEFAULT_SVG_RENDER_SIZE,
            archive_prefix: DEFAULT_ARCHIVE_PREFIX.to_string(),
            cache: CacheConfig::default(),
        }
    }
}

impl ForgeConfig {
    /// Parses a config from TOML text, normalizing out-of-range values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        Ok(config.normalized())
    }

    /// Loads a config file. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Writes the config as TOML, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Safe-zone ratio clamped to `MIN_SAFE_ZONE_RATIO..=1.0`.
    pub fn safe_zone_ratio(&self) -> f32 {
        if self.safe_zone_ratio.is_finite() {
            self.safe_zone_ratio.clamp(MIN_SAFE_ZONE_RATIO, 1.0)
        } else {
            DEFAULT_SAFE_ZONE_RATIO
        }
    }

    pub fn filter(&self) -> FilterType {
        self.resize_filter.into()
    }

    fn normalized(mut self) -> Self {
        self.safe_zone_ratio = self.safe_zone_ratio();
        if self.svg_render_size == 0 {
            self.svg_render_size = DEFAULT_SVG_RENDER_SIZE;
        }
        if self.archive_prefix.trim().is_empty() {
            self.archive_prefix = DEFAULT_ARCHIVE_PREFIX.to_string();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = ForgeConfig::from_toml_str("").unwrap();
        assert_eq!(config, ForgeConfig::default());
        assert_eq!(config.opaque_alpha_threshold, 128);
        assert_eq!(config.safe_zone_ratio, 0.8);
        assert_eq!(config.resize_filter, ResizeFilter::CatmullRom);
    }

    #[test]
    fn out_of_range_values_are_normalized() {
        let config = ForgeConfig::from_toml_str(
            "safe_zone_ratio = 3.0\nsvg_render_size = 0\narchive_prefix = \"  \"",
        )
        .unwrap();
        assert_eq!(config.safe_zone_ratio, 1.0);
        assert_eq!(config.svg_render_size, DEFAULT_SVG_RENDER_SIZE);
        assert_eq!(config.archive_prefix, DEFAULT_ARCHIVE_PREFIX);
    }

    #[test]
    fn invalid_toml_is_an_error() {
        let result = ForgeConfig::from_toml_str("not = valid = toml");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().expect("failed to create temp dir");
        let path = dir.path().join("nested").join("forge.toml");

        let config = ForgeConfig {
            resize_filter: ResizeFilter::Lanczos3,
            archive_prefix: "icons".to_string(),
            cache: CacheConfig {
                path: Some(dir.path().join("cache.db")),
                quota_bytes: Some(1024 * 1024),
            },
            ..ForgeConfig::default()
        };

        config.save_to_path(&path).expect("save should create directories");
        let loaded = ForgeConfig::load_from_path(&path).expect("load should succeed");
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().expect("failed to create temp dir");
        let loaded = ForgeConfig::load_from_path(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, ForgeConfig::default());
    }

    #[test]
    fn filter_kebab_case() {
        let config = ForgeConfig::from_toml_str("resize_filter = \"lanczos3\"").unwrap();
        assert_eq!(config.filter(), FilterType::Lanczos3);
    }
}
