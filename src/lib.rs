//! faviconforge-core: favicon generation and packaging
//!
//! Turns one uploaded logo into a set of favicon PNGs, an ICO container,
//! web manifest metadata and a downloadable zip archive. Results are kept in
//! a single-slot cache so a download never re-renders.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use faviconforge_core::{
//!     FaviconGenerator, FaviconWorkflow, ForgeConfig, Packager, ResultCache, SourceImage, Tier,
//! };
//!
//! # async fn run(png: Vec<u8>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ForgeConfig::load_from_path(Path::new("forge.toml"))?;
//! let cache = Arc::new(ResultCache::from_config(&config.cache)?);
//! let workflow = FaviconWorkflow::new(FaviconGenerator::new(config.clone()), cache.clone());
//!
//! workflow.set_source(&SourceImage::new(png, "image/png", "logo.png"))?;
//! let result = workflow.run(Tier::Premium, None).await?;
//! println!("{} assets, {} warnings", result.assets.len(), result.warnings.len());
//!
//! let archive = Packager::new(&config).package_cached(&cache, Tier::Premium, None)?;
//! std::fs::write(&archive.filename, &archive.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Standalone ICO
//!
//! ```
//! use faviconforge_core::ico;
//! # let png = |size: u32| {
//! #     let mut bytes = Vec::new();
//! #     image::RgbaImage::new(size, size)
//! #         .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
//! #         .unwrap();
//! #     bytes
//! # };
//!
//! let frames = [png(16), png(32)];
//! let container = ico::compose(&[frames[0].as_slice(), frames[1].as_slice()]).unwrap();
//! assert_eq!(ico::read_directory(&container).unwrap().len(), 2);
//! ```

mod archive;
mod cache;
mod config;
mod error;
mod gather;
mod generator;
pub mod ico;
mod icon;
mod manifest;
mod raster;
mod workflow;

pub use archive::{
    ArchiveRequest, ArchiveResult, EndpointIcoProvider, ICO_ENTRY, ICO_FAILED_WARNING, IcoInput,
    IcoProvider, LocalIcoProvider, Packager,
};
pub use cache::{
    CachedAsset, CachedGeneration, FaviconCacheRecord, MemoryStore, ResultCache, Slot, SlotStore,
    SlotValue, SqliteStore,
};
pub use config::{
    CacheConfig, DEFAULT_ARCHIVE_PREFIX, DEFAULT_OPAQUE_ALPHA_THRESHOLD, DEFAULT_SAFE_ZONE_RATIO,
    DEFAULT_SVG_RENDER_SIZE, FALLBACK_BORDER_COLOR, ForgeConfig, MIN_SAFE_ZONE_RATIO, ResizeFilter,
};
pub use error::{
    CacheError, ComposeError, ConfigError, DecodeError, GenerateError, IcoError, PackageError,
    ProductionError,
};
pub use gather::{Settled, settle_all};
pub use generator::{FaviconGenerator, GenerationRequest, GenerationResult};
pub use ico::IconDirEntry;
pub use ico::endpoint::{ICO_MIME, IcoEndpoint, IcoRequest, IcoResponse};
pub use icon::{
    FREE_ICONS, GeneratedAsset, IconSpec, MASKABLE_ICONS, PNG_MIME, PREMIUM_ICONS, RectPx, SizePx,
    SourceImage, Tier, plain_icons,
};
pub use manifest::{
    IconPurpose, ManifestIcon, ManifestOptions, WebManifest, browser_config, html_snippet,
};
pub use raster::{
    DecodedImage, ImageRasterizer, Rasterizer, compose_maskable, composite_over, decode,
    dominant_border_color, encode_png, parse_fill_color, rgb_to_hex,
};
pub use workflow::{
    FaviconWorkflow, GenerationEpoch, PreviewHandle, PreviewRegistry, WorkflowState,
};
