//! Tier-aware zip packaging.
//!
//! The favicon container is built here, at packaging time, through an
//! [`IcoProvider`]. If it cannot be built the archive is still produced
//! without it and carries the `ico_generation_failed` warning. Every other
//! entry is written independently; one failed entry never drops the rest.

use std::io::{Cursor, Write};
use std::sync::Arc;

use chrono::Utc;
use http::{Request, header};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::cache::ResultCache;
use crate::config::ForgeConfig;
use crate::error::{IcoError, PackageError};
use crate::generator::GenerationResult;
use crate::icon::{FREE_ICONS, GeneratedAsset, SourceImage, Tier};
use crate::ico::compose_favicon;
use crate::ico::endpoint::IcoEndpoint;
use crate::manifest::{ManifestOptions, WebManifest, browser_config, html_snippet};

/// Path the favicon endpoint is mounted at.
const ICO_ROUTE: &str = "/api/favicon/ico";

/// Warning recorded when the favicon container could not be built.
pub const ICO_FAILED_WARNING: &str = "ico_generation_failed";

/// Archive path of the favicon container.
pub const ICO_ENTRY: &str = "web/favicon.ico";

const README: &str = r#"# FaviconForge Icon Package

Thanks for using FaviconForge! This package contains everything needed to
give your site a complete set of favicons and app icons.

## Quick Start

1. Copy every folder from this package to the root of your website.
2. Move `web/favicon.ico` to the site root so browsers find it at `/favicon.ico`.
3. Copy `manifest.json` and `browserconfig.xml` to the site root.
4. Paste the contents of `snippet.html` into the `<head>` of your pages.
5. Adjust the `name`, `short_name` and colors in `manifest.json` if needed.

## Folder Structure

```
web/        favicon.ico and 16/32/48 px PNG favicons
ios/        apple-touch-icon.png (180x180) for iOS home screens
android/    192/384/512/1024 px icons and their maskable variants
windows/    mstile-150x150.png for Windows start tiles
manifest.json       web app manifest for installable apps
browserconfig.xml   tile configuration for Windows
snippet.html        HTML tags to paste into <head>
```

## Maskable Icons

The `*-maskable.png` icons keep the artwork inside the central 80% safe
zone, padded with the edge color of your image, so Android adaptive icon
masks never cut it off.
"#;

// ============================================================================
// Request / Result
// ============================================================================

/// Everything that goes into one archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveRequest {
    pub tier: Tier,
    pub assets: Vec<GeneratedAsset>,
    /// Original upload, handed to the [`IcoProvider`].
    pub source: Option<SourceImage>,
    /// Rendered for `tier` when absent.
    pub html_snippet_text: Option<String>,
    pub manifest_text: Option<String>,
    pub browser_config_text: Option<String>,
    /// When set, the premium manifest is rendered from these instead of
    /// using `manifest_text`.
    pub manifest_options: Option<ManifestOptions>,
}

impl ArchiveRequest {
    pub fn new(tier: Tier, assets: Vec<GeneratedAsset>) -> Self {
        Self {
            tier,
            assets,
            ..Self::default()
        }
    }

    /// Packages a generation result for `tier`.
    ///
    /// The result's snippet is reused only when it was generated for the
    /// same tier, so a free archive never links to premium files.
    pub fn from_result(result: &GenerationResult, tier: Tier) -> Self {
        let html_snippet_text =
            (result.tier() == tier).then(|| result.html_snippet_text.clone());
        Self {
            tier,
            assets: result.assets.clone(),
            source: None,
            html_snippet_text,
            manifest_text: result.manifest_text.clone(),
            browser_config_text: result.browser_config_text.clone(),
            manifest_options: None,
        }
    }

    pub fn with_source(mut self, source: SourceImage) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_manifest_options(mut self, options: ManifestOptions) -> Self {
        self.manifest_options = Some(options);
        self
    }
}

/// A finished archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveResult {
    pub bytes: Vec<u8>,
    pub warnings: Vec<String>,
    /// Suggested download name, `<prefix>-<epochMillis>.zip`.
    pub filename: String,
}

// ============================================================================
// IcoProvider
// ============================================================================

/// What an [`IcoProvider`] gets to build the favicon from.
#[derive(Debug, Clone, Copy)]
pub struct IcoInput<'a> {
    /// The free-tier assets of the archive.
    pub assets: &'a [GeneratedAsset],
    pub source: Option<&'a SourceImage>,
}

/// Builds the favicon container at packaging time.
pub trait IcoProvider: Send + Sync {
    fn favicon(&self, input: &IcoInput<'_>) -> Result<Vec<u8>, IcoError>;
}

/// Composes the container from the already rendered 16/32/48 assets.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalIcoProvider;

impl IcoProvider for LocalIcoProvider {
    fn favicon(&self, input: &IcoInput<'_>) -> Result<Vec<u8>, IcoError> {
        Ok(compose_favicon(input.assets)?)
    }
}

/// Sends the original upload through an [`IcoEndpoint`].
#[derive(Clone, Default)]
pub struct EndpointIcoProvider {
    endpoint: IcoEndpoint,
}

impl EndpointIcoProvider {
    pub fn new(endpoint: IcoEndpoint) -> Self {
        Self { endpoint }
    }
}

impl IcoProvider for EndpointIcoProvider {
    /// Posts the source through the endpoint's HTTP boundary. Any
    /// non-success answer becomes [`IcoError::Transport`].
    fn favicon(&self, input: &IcoInput<'_>) -> Result<Vec<u8>, IcoError> {
        let source = input.source.ok_or(IcoError::InvalidFileUpload)?;
        let request = Request::post(ICO_ROUTE)
            .header(header::CONTENT_TYPE, source.mime_type.as_str())
            .body(source.bytes.clone())
            .map_err(|e| IcoError::Transport(e.to_string()))?;

        let response = self.endpoint.respond(request);
        let status = response.status();
        if !status.is_success() {
            let body = String::from_utf8_lossy(response.body());
            return Err(IcoError::Transport(format!("{status}: {body}")));
        }
        Ok(response.into_body())
    }
}

// ============================================================================
// Packager
// ============================================================================

/// Writes archives.
///
/// ```
/// use faviconforge_core::{ArchiveRequest, ForgeConfig, Packager, Tier};
///
/// let packager = Packager::new(&ForgeConfig::default());
/// // No assets: the favicon cannot be built, everything else still is.
/// let archive = packager.package(&ArchiveRequest::new(Tier::Free, Vec::new())).unwrap();
///
/// assert_eq!(archive.warnings, vec!["ico_generation_failed".to_string()]);
/// assert!(archive.filename.starts_with("faviconforge-"));
/// ```
#[derive(Clone)]
pub struct Packager {
    provider: Arc<dyn IcoProvider>,
    archive_prefix: String,
}

impl Packager {
    /// A packager composing the favicon locally.
    pub fn new(config: &ForgeConfig) -> Self {
        Self::with_provider(config, Arc::new(LocalIcoProvider))
    }

    pub fn with_provider(config: &ForgeConfig, provider: Arc<dyn IcoProvider>) -> Self {
        Self {
            provider,
            archive_prefix: config.archive_prefix.clone(),
        }
    }

    /// Builds the archive for `request.tier`.
    ///
    /// Only a failure of the zip container itself is an error; failed
    /// entries become warnings.
    pub fn package(&self, request: &ArchiveRequest) -> Result<ArchiveResult, PackageError> {
        let tier = request.tier;
        let assets: Vec<&GeneratedAsset> = request
            .assets
            .iter()
            .filter(|asset| tier.is_premium() || asset.tier == Tier::Free)
            .collect();

        let mut archive = ArchiveWriter::new();

        let free_assets: Vec<GeneratedAsset> = assets
            .iter()
            .filter(|asset| FREE_ICONS.iter().any(|spec| spec.name == asset.name))
            .map(|asset| (*asset).clone())
            .collect();
        let input = IcoInput {
            assets: &free_assets,
            source: request.source.as_ref(),
        };
        match self.provider.favicon(&input) {
            Ok(ico) => archive.add(ICO_ENTRY, &ico),
            Err(err) => {
                tracing::warn!(code = err.code(), error = %err, "favicon container failed");
                archive.warnings.push(ICO_FAILED_WARNING.to_string());
            }
        }

        for asset in &assets {
            archive.add(&asset.archive_path(), &asset.bytes);
        }

        let snippet = request
            .html_snippet_text
            .clone()
            .unwrap_or_else(|| html_snippet(tier, request.manifest_options.as_ref()));
        archive.add("snippet.html", snippet.as_bytes());

        if tier.is_premium() {
            match self.manifest_json(request) {
                Ok(manifest) => archive.add("manifest.json", manifest.as_bytes()),
                Err(err) => archive.warnings.push(format!("manifest.json: {err}")),
            }
            let config = request
                .browser_config_text
                .clone()
                .unwrap_or_else(browser_config);
            archive.add("browserconfig.xml", config.as_bytes());
            archive.add("README.md", README.as_bytes());
        }

        let (bytes, warnings) = archive.finish()?;
        let filename = format!("{}-{}.zip", self.archive_prefix, Utc::now().timestamp_millis());
        tracing::info!(
            tier = tier.as_str(),
            filename = %filename,
            bytes = bytes.len(),
            warnings = warnings.len(),
            "archive packaged"
        );
        Ok(ArchiveResult {
            bytes,
            warnings,
            filename,
        })
    }

    /// Packages the cached generation without re-rendering anything.
    pub fn package_cached(
        &self,
        cache: &ResultCache,
        tier: Tier,
        options: Option<ManifestOptions>,
    ) -> Result<ArchiveResult, PackageError> {
        let cached = cache.cached_result()?.ok_or(PackageError::NothingCached)?;
        let mut request = ArchiveRequest::from_result(&cached.result, tier).with_source(cached.source);
        request.manifest_options = options;
        self.package(&request)
    }

    fn manifest_json(&self, request: &ArchiveRequest) -> Result<String, serde_json::Error> {
        match (&request.manifest_options, &request.manifest_text) {
            (Some(options), _) => WebManifest::new(options).to_json_pretty(),
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => WebManifest::new(&ManifestOptions::default()).to_json_pretty(),
        }
    }
}

/// Zip writer that turns per-entry failures into warnings.
struct ArchiveWriter {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    warnings: Vec<String>,
}

impl ArchiveWriter {
    fn new() -> Self {
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options: SimpleFileOptions::default().compression_method(CompressionMethod::Deflated),
            warnings: Vec::new(),
        }
    }

    fn add(&mut self, path: &str, bytes: &[u8]) {
        // abort_file drops the last entry, so it must only follow a started one.
        if let Err(err) = self.zip.start_file(path, self.options) {
            self.warn(path, &err);
            return;
        }
        if let Err(err) = self.zip.write_all(bytes) {
            let _ = self.zip.abort_file();
            self.warn(path, &err);
        }
    }

    fn warn(&mut self, path: &str, err: &dyn std::fmt::Display) {
        tracing::warn!(entry = path, error = %err, "archive entry failed");
        self.warnings.push(format!("{path}: {err}"));
    }

    fn finish(self) -> Result<(Vec<u8>, Vec<String>), PackageError> {
        let cursor = self.zip.finish()?;
        Ok((cursor.into_inner(), self.warnings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::ico::read_directory;
    use crate::icon::{MASKABLE_ICONS, PREMIUM_ICONS};
    use crate::raster::encode_png;
    use image::{Rgba, RgbaImage};
    use std::collections::BTreeSet;
    use std::io::Read;
    use zip::ZipArchive;

    fn png(size: u32) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(size, size, Rgba([20, 40, 60, 255]))).unwrap()
    }

    fn free_assets() -> Vec<GeneratedAsset> {
        FREE_ICONS
            .iter()
            .map(|spec| GeneratedAsset::from_spec(spec, png(spec.size)))
            .collect()
    }

    fn premium_assets() -> Vec<GeneratedAsset> {
        let mut assets = free_assets();
        assets.extend(
            PREMIUM_ICONS
                .iter()
                .chain(MASKABLE_ICONS.iter())
                .map(|spec| GeneratedAsset::from_spec(spec, format!("png-{}", spec.name).into_bytes())),
        );
        assets
    }

    fn entries(bytes: &[u8]) -> BTreeSet<String> {
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    fn read_entry(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut content = String::new();
        archive.by_name(name).unwrap().read_to_string(&mut content).unwrap();
        content
    }

    struct FailingProvider;

    impl IcoProvider for FailingProvider {
        fn favicon(&self, _input: &IcoInput<'_>) -> Result<Vec<u8>, IcoError> {
            Err(IcoError::Transport("connection reset".to_string()))
        }
    }

    #[test]
    fn free_archive_layout() {
        let packager = Packager::new(&ForgeConfig::default());
        let result = packager
            .package(&ArchiveRequest::new(Tier::Free, free_assets()))
            .unwrap();

        let expected: BTreeSet<String> = [
            "web/favicon.ico",
            "web/favicon-16x16.png",
            "web/favicon-32x32.png",
            "web/favicon-48x48.png",
            "snippet.html",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert_eq!(entries(&result.bytes), expected);
        assert!(result.warnings.is_empty());

        let snippet = read_entry(&result.bytes, "snippet.html");
        assert!(snippet.contains("favicon.ico"));
        assert!(!snippet.contains("apple-touch-icon"));
        assert!(!snippet.contains("manifest.json"));
    }

    #[test]
    fn favicon_entry_holds_three_frames() {
        let packager = Packager::new(&ForgeConfig::default());
        let result = packager
            .package(&ArchiveRequest::new(Tier::Free, free_assets()))
            .unwrap();

        let mut archive = ZipArchive::new(Cursor::new(result.bytes.as_slice())).unwrap();
        let mut ico = Vec::new();
        archive.by_name(ICO_ENTRY).unwrap().read_to_end(&mut ico).unwrap();
        let sizes: Vec<u32> = read_directory(&ico).unwrap().iter().map(|e| e.width).collect();
        assert_eq!(sizes, vec![16, 32, 48]);
    }

    #[test]
    fn free_archive_drops_premium_assets() {
        let packager = Packager::new(&ForgeConfig::default());
        let result = packager
            .package(&ArchiveRequest::new(Tier::Free, premium_assets()))
            .unwrap();

        let names = entries(&result.bytes);
        assert!(!names.contains("ios/apple-touch-icon.png"));
        assert!(!names.contains("README.md"));
        assert!(names.contains("web/favicon-16x16.png"));
    }

    #[test]
    fn premium_archive_layout() {
        let packager = Packager::new(&ForgeConfig::default());
        let options = ManifestOptions {
            name: "Test App".to_string(),
            short_name: "Test".to_string(),
            theme_color: "#000000".to_string(),
            background_color: "#ffffff".to_string(),
        };
        let request =
            ArchiveRequest::new(Tier::Premium, premium_assets()).with_manifest_options(options);
        let result = packager.package(&request).unwrap();
        assert!(result.warnings.is_empty());

        let names = entries(&result.bytes);
        for expected in [
            "web/favicon.ico",
            "ios/apple-touch-icon.png",
            "android/icon-192.png",
            "android/icon-512.png",
            "android/icon-192-maskable.png",
            "android/icon-1024-maskable.png",
            "windows/mstile-150x150.png",
            "manifest.json",
            "browserconfig.xml",
            "snippet.html",
            "README.md",
        ] {
            assert!(names.contains(expected), "missing {expected}");
        }

        let manifest = WebManifest::from_json(&read_entry(&result.bytes, "manifest.json")).unwrap();
        assert_eq!(manifest.name, "Test App");
        assert_eq!(manifest.short_name, "Test");
        assert_eq!(manifest.theme_color, "#000000");

        let snippet = read_entry(&result.bytes, "snippet.html");
        assert!(snippet.contains("apple-touch-icon"));
        assert!(snippet.contains("manifest.json"));
        assert!(snippet.contains("browserconfig.xml"));

        let readme = read_entry(&result.bytes, "README.md");
        assert!(readme.contains("FaviconForge"));
        assert!(readme.contains("Quick Start"));
        assert!(readme.contains("Folder Structure"));
    }

    #[test]
    fn ico_failure_degrades_to_warning() {
        let packager = Packager::with_provider(&ForgeConfig::default(), Arc::new(FailingProvider));
        let result = packager
            .package(&ArchiveRequest::new(Tier::Premium, premium_assets()))
            .unwrap();

        assert_eq!(result.warnings, vec![ICO_FAILED_WARNING.to_string()]);
        let names = entries(&result.bytes);
        assert!(!names.contains(ICO_ENTRY));
        assert!(names.contains("web/favicon-16x16.png"));
        assert!(names.contains("manifest.json"));
    }

    #[test]
    fn malformed_frame_degrades_to_warning() {
        let mut assets = free_assets();
        assets[1].bytes = b"not a png".to_vec();

        let packager = Packager::new(&ForgeConfig::default());
        let result = packager
            .package(&ArchiveRequest::new(Tier::Free, assets))
            .unwrap();

        assert_eq!(result.warnings, vec![ICO_FAILED_WARNING.to_string()]);
        assert_eq!(entries(&result.bytes).len(), 4);
    }

    #[test]
    fn endpoint_provider_uses_source() {
        let source_png =
            encode_png(&RgbaImage::from_pixel(64, 64, Rgba([200, 100, 0, 255]))).unwrap();
        let source = SourceImage::new(source_png, "image/png", "logo.png");
        let packager = Packager::with_provider(
            &ForgeConfig::default(),
            Arc::new(EndpointIcoProvider::default()),
        );

        let request = ArchiveRequest::new(Tier::Free, free_assets()).with_source(source);
        let result = packager.package(&request).unwrap();
        assert!(result.warnings.is_empty());
        assert!(entries(&result.bytes).contains(ICO_ENTRY));

        let without_source = packager
            .package(&ArchiveRequest::new(Tier::Free, free_assets()))
            .unwrap();
        assert_eq!(without_source.warnings, vec![ICO_FAILED_WARNING.to_string()]);
    }

    #[test]
    fn endpoint_rejection_is_a_transport_error() {
        let provider = EndpointIcoProvider::default();
        let source = SourceImage::new(b"GIF89a".to_vec(), "image/gif", "logo.gif");
        let input = IcoInput {
            assets: &[],
            source: Some(&source),
        };

        let err = provider.favicon(&input).unwrap_err();
        let IcoError::Transport(message) = &err else {
            panic!("unexpected error {err:?}");
        };
        assert!(message.starts_with("400"));
        assert!(message.contains("invalid_file_upload"));
        assert_eq!(err.code(), "ico_generation_failed");
    }

    #[test]
    fn duplicate_entry_keeps_first_write() {
        let mut assets = free_assets();
        let mut duplicate = assets[2].clone();
        duplicate.bytes = b"second".to_vec();
        assets.push(duplicate);

        let packager = Packager::new(&ForgeConfig::default());
        let result = packager
            .package(&ArchiveRequest::new(Tier::Free, assets))
            .unwrap();

        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("web/favicon-48x48.png: "));

        let names = entries(&result.bytes);
        assert_eq!(names.len(), 5);
        assert!(names.contains("web/favicon-32x32.png"));
        assert!(names.contains("snippet.html"));

        let mut archive = ZipArchive::new(Cursor::new(result.bytes.as_slice())).unwrap();
        let mut kept = Vec::new();
        archive
            .by_name("web/favicon-48x48.png")
            .unwrap()
            .read_to_end(&mut kept)
            .unwrap();
        assert_eq!(kept, png(48));
    }

    #[test]
    fn filename_is_timestamped() {
        let config = ForgeConfig {
            archive_prefix: "icons".to_string(),
            ..ForgeConfig::default()
        };
        let result = Packager::new(&config)
            .package(&ArchiveRequest::new(Tier::Free, free_assets()))
            .unwrap();

        let stamp = result
            .filename
            .strip_prefix("icons-")
            .and_then(|rest| rest.strip_suffix(".zip"))
            .unwrap();
        assert!(!stamp.is_empty());
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn from_result_rerenders_snippet_for_other_tier() {
        let result = GenerationResult {
            assets: premium_assets(),
            warnings: Vec::new(),
            manifest_text: Some("{}".to_string()),
            browser_config_text: Some(browser_config()),
            html_snippet_text: html_snippet(Tier::Premium, None),
        };

        let premium = ArchiveRequest::from_result(&result, Tier::Premium);
        assert_eq!(premium.html_snippet_text.as_deref(), Some(result.html_snippet_text.as_str()));

        let free = ArchiveRequest::from_result(&result, Tier::Free);
        assert!(free.html_snippet_text.is_none());

        let archive = Packager::new(&ForgeConfig::default()).package(&free).unwrap();
        let snippet = read_entry(&archive.bytes, "snippet.html");
        assert!(!snippet.contains("apple-touch-icon"));
    }

    #[test]
    fn package_cached_requires_a_result() {
        let cache = ResultCache::new(MemoryStore::new());
        let packager = Packager::new(&ForgeConfig::default());

        let err = packager.package_cached(&cache, Tier::Free, None).unwrap_err();
        assert!(matches!(err, PackageError::NothingCached));

        let result = GenerationResult {
            assets: free_assets(),
            html_snippet_text: html_snippet(Tier::Free, None),
            ..GenerationResult::default()
        };
        let source = SourceImage::new(png(64), "image/png", "logo.png");
        cache.store_result(&result, &source).unwrap();

        let archive = packager.package_cached(&cache, Tier::Free, None).unwrap();
        assert!(archive.warnings.is_empty());
        assert_eq!(entries(&archive.bytes).len(), 5);
    }
}
