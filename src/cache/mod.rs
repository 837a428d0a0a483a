//! Single-slot result cache.
//!
//! Two fixed slots exist: the uploaded [`SourceImage`] and the last
//! generation snapshot. Writing a slot always replaces what was there.
//! Backends implement [`SlotStore`]; [`ResultCache`] is the typed facade the
//! rest of the crate talks to.
//!
//! # Example
//!
//! ```
//! use faviconforge_core::{MemoryStore, ResultCache, SourceImage};
//!
//! let cache = ResultCache::new(MemoryStore::new());
//! cache.store_source(&SourceImage::new(vec![1, 2, 3], "image/png", "logo.png")).unwrap();
//!
//! let source = cache.source_image().unwrap().unwrap();
//! assert_eq!(source.filename, "logo.png");
//! assert!(cache.cached_result().unwrap().is_none());
//! ```

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use chrono::Utc;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::generator::GenerationResult;
use crate::icon::{GeneratedAsset, SourceImage, Tier};

// ============================================================================
// Slots
// ============================================================================

/// The fixed keys of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    SourceImage,
    FaviconCache,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::SourceImage, Slot::FaviconCache];

    /// Stable key the slot is persisted under.
    pub fn key(&self) -> &'static str {
        match self {
            Self::SourceImage => "source_image",
            Self::FaviconCache => "favicon_cache",
        }
    }
}

/// One persisted asset, bytes stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAsset {
    pub name: String,
    pub bytes: Vec<u8>,
    pub path: String,
    pub size: u32,
    pub tier: Tier,
    pub mime_type: String,
}

impl From<&GeneratedAsset> for CachedAsset {
    fn from(asset: &GeneratedAsset) -> Self {
        Self {
            name: asset.name.clone(),
            bytes: asset.bytes.clone(),
            path: asset.path.clone(),
            size: asset.size,
            tier: asset.tier,
            mime_type: asset.mime_type().to_string(),
        }
    }
}

impl From<CachedAsset> for GeneratedAsset {
    fn from(asset: CachedAsset) -> Self {
        Self {
            name: asset.name,
            path: asset.path,
            size: asset.size,
            tier: asset.tier,
            bytes: asset.bytes,
        }
    }
}

/// Snapshot of a generation together with the source it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaviconCacheRecord {
    pub assets: Vec<CachedAsset>,
    pub manifest_text: Option<String>,
    pub browser_config_text: Option<String>,
    pub html_snippet_text: String,
    pub source: SourceImage,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl FaviconCacheRecord {
    pub fn new(result: &GenerationResult, source: &SourceImage) -> Self {
        Self {
            assets: result.assets.iter().map(CachedAsset::from).collect(),
            manifest_text: result.manifest_text.clone(),
            browser_config_text: result.browser_config_text.clone(),
            html_snippet_text: result.html_snippet_text.clone(),
            source: source.clone(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Approximate payload size, used for quota accounting.
    pub fn byte_len(&self) -> usize {
        let assets: usize = self
            .assets
            .iter()
            .map(|a| a.bytes.len() + a.name.len() + a.path.len() + a.mime_type.len())
            .sum();
        assets
            + self.manifest_text.as_ref().map_or(0, String::len)
            + self.browser_config_text.as_ref().map_or(0, String::len)
            + self.html_snippet_text.len()
            + source_byte_len(&self.source)
    }
}

fn source_byte_len(source: &SourceImage) -> usize {
    source.bytes.len() + source.filename.len() + source.mime_type.len()
}

/// A value bound to its slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotValue {
    SourceImage(SourceImage),
    FaviconCache(FaviconCacheRecord),
}

impl SlotValue {
    pub fn slot(&self) -> Slot {
        match self {
            Self::SourceImage(_) => Slot::SourceImage,
            Self::FaviconCache(_) => Slot::FaviconCache,
        }
    }

    pub fn byte_len(&self) -> usize {
        match self {
            Self::SourceImage(source) => source_byte_len(source),
            Self::FaviconCache(record) => record.byte_len(),
        }
    }
}

// ============================================================================
// SlotStore Trait
// ============================================================================

/// Storage backend with one value per [`Slot`].
pub trait SlotStore: Send + Sync {
    /// Returns the value in `slot`, or `None` if nothing is stored.
    fn get(&self, slot: Slot) -> Result<Option<SlotValue>, CacheError>;

    /// Replaces the value in the value's slot.
    fn set(&self, value: SlotValue) -> Result<(), CacheError>;

    /// Empties `slot`. Clearing an empty slot is not an error.
    fn clear(&self, slot: Slot) -> Result<(), CacheError>;
}

// ============================================================================
// ResultCache
// ============================================================================

/// A generation restored from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedGeneration {
    pub result: GenerationResult,
    pub source: SourceImage,
    pub timestamp: i64,
}

/// Typed access to the two cache slots.
pub struct ResultCache {
    store: Box<dyn SlotStore>,
}

impl ResultCache {
    pub fn new(store: impl SlotStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Opens the backend named by `config`: SQLite when a path is set,
    /// memory otherwise.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        match &config.path {
            Some(path) => {
                let store = SqliteStore::open(path)?;
                let store = match config.quota_bytes {
                    Some(quota) => store.with_quota(quota)?,
                    None => store,
                };
                Ok(Self::new(store))
            }
            None => {
                let store = match config.quota_bytes {
                    Some(quota) => MemoryStore::with_quota(quota),
                    None => MemoryStore::new(),
                };
                Ok(Self::new(store))
            }
        }
    }

    pub fn store_source(&self, source: &SourceImage) -> Result<(), CacheError> {
        tracing::debug!(filename = %source.filename, bytes = source.bytes.len(), "caching source image");
        self.store.set(SlotValue::SourceImage(source.clone()))
    }

    pub fn source_image(&self) -> Result<Option<SourceImage>, CacheError> {
        match self.store.get(Slot::SourceImage)? {
            Some(SlotValue::SourceImage(source)) => Ok(Some(source)),
            Some(other) => Err(mismatch(Slot::SourceImage, &other)),
            None => Ok(None),
        }
    }

    /// Snapshots `result` and its `source` into the favicon slot.
    pub fn store_result(
        &self,
        result: &GenerationResult,
        source: &SourceImage,
    ) -> Result<(), CacheError> {
        let record = FaviconCacheRecord::new(result, source);
        tracing::debug!(
            assets = record.assets.len(),
            bytes = record.byte_len(),
            "caching generation result"
        );
        self.store.set(SlotValue::FaviconCache(record))
    }

    /// Restores the last stored generation. No pixels are re-rendered; the
    /// assets are rebuilt from the stored bytes and warnings start empty.
    pub fn cached_result(&self) -> Result<Option<CachedGeneration>, CacheError> {
        let record = match self.store.get(Slot::FaviconCache)? {
            Some(SlotValue::FaviconCache(record)) => record,
            Some(other) => return Err(mismatch(Slot::FaviconCache, &other)),
            None => return Ok(None),
        };

        let result = GenerationResult {
            assets: record.assets.into_iter().map(GeneratedAsset::from).collect(),
            warnings: Vec::new(),
            manifest_text: record.manifest_text,
            browser_config_text: record.browser_config_text,
            html_snippet_text: record.html_snippet_text,
        };
        Ok(Some(CachedGeneration {
            result,
            source: record.source,
            timestamp: record.timestamp,
        }))
    }

    pub fn clear(&self, slot: Slot) -> Result<(), CacheError> {
        self.store.clear(slot)
    }

    pub fn clear_all(&self) -> Result<(), CacheError> {
        for slot in Slot::ALL {
            self.store.clear(slot)?;
        }
        Ok(())
    }
}

fn mismatch(expected: Slot, found: &SlotValue) -> CacheError {
    CacheError::Corrupt(format!(
        "slot {} holds a {} value",
        expected.key(),
        found.slot().key()
    ))
}
