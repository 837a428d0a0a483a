//! Favicon generation: turns one source image into the tier's asset set.

use std::sync::Arc;

use crate::config::{FALLBACK_BORDER_COLOR, ForgeConfig};
use crate::error::{GenerateError, ProductionError};
use crate::gather::{Settled, settle_all};
use crate::icon::{GeneratedAsset, IconSpec, MASKABLE_ICONS, SourceImage, Tier, plain_icons};
use crate::manifest::{ManifestOptions, WebManifest, browser_config, html_snippet};
use crate::raster::{DecodedImage, ImageRasterizer, Rasterizer, decode, dominant_border_color};

// ============================================================================
// Request / Result
// ============================================================================

/// What to generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub source: SourceImage,
    pub tier: Tier,
    /// Only read on the premium tier.
    pub manifest_options: Option<ManifestOptions>,
}

impl GenerationRequest {
    pub fn new(source: SourceImage, tier: Tier) -> Self {
        Self {
            source,
            tier,
            manifest_options: None,
        }
    }

    pub fn with_manifest_options(mut self, options: ManifestOptions) -> Self {
        self.manifest_options = Some(options);
        self
    }
}

/// Everything one generation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResult {
    /// Successfully rendered assets: free, premium, then maskable.
    pub assets: Vec<GeneratedAsset>,
    /// `"<assetName>: <error>"` for every asset that failed.
    pub warnings: Vec<String>,
    pub manifest_text: Option<String>,
    pub browser_config_text: Option<String>,
    pub html_snippet_text: String,
}

impl GenerationResult {
    /// The tier this result was produced for, judged by its contents.
    pub fn tier(&self) -> Tier {
        let premium = self.manifest_text.is_some()
            || self.assets.iter().any(|asset| asset.tier.is_premium());
        if premium { Tier::Premium } else { Tier::Free }
    }

    pub fn asset(&self, name: &str) -> Option<&GeneratedAsset> {
        self.assets.iter().find(|asset| asset.name == name)
    }
}

// ============================================================================
// FaviconGenerator
// ============================================================================

/// Renders the asset set for a tier.
///
/// Every size is rendered on its own blocking task. A size that fails is
/// reported in [`GenerationResult::warnings`] and left out; only an
/// undecodable source fails the whole generation.
///
/// # Example
///
/// ```no_run
/// use faviconforge_core::{FaviconGenerator, ForgeConfig, GenerationRequest, SourceImage, Tier};
///
/// # async fn run(png: Vec<u8>) -> Result<(), faviconforge_core::GenerateError> {
/// let generator = FaviconGenerator::new(ForgeConfig::default());
/// let source = SourceImage::new(png, "image/png", "logo.png");
///
/// let result = generator.generate(&GenerationRequest::new(source, Tier::Free)).await?;
/// assert_eq!(result.assets.len(), 3);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct FaviconGenerator {
    config: ForgeConfig,
    rasterizer: Arc<dyn Rasterizer>,
}

impl FaviconGenerator {
    pub fn new(config: ForgeConfig) -> Self {
        let rasterizer = Arc::new(ImageRasterizer::new(&config));
        Self { config, rasterizer }
    }

    /// Uses a custom rasterizer, e.g. a test double.
    pub fn with_rasterizer(config: ForgeConfig, rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self { config, rasterizer }
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// Generates all assets and text documents for `request`.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerateError> {
        let tier = request.tier;
        tracing::info!(
            tier = tier.as_str(),
            filename = %request.source.filename,
            "generating favicons"
        );

        let decoded = decode(
            &request.source.bytes,
            &request.source.mime_type,
            self.config.svg_render_size,
        )?;

        let plain = plain_icons(tier);
        let (plain, maskable) = if tier.is_premium() {
            tokio::join!(
                self.produce(&decoded, plain, None),
                self.produce_maskable(&decoded)
            )
        } else {
            (self.produce(&decoded, plain, None).await, Vec::new())
        };

        let mut result = GenerationResult::default();
        for (spec, outcome) in plain.into_iter().chain(maskable) {
            match outcome {
                Settled::Fulfilled(bytes) => {
                    result.assets.push(GeneratedAsset::from_spec(&spec, bytes));
                }
                Settled::Rejected(err) => {
                    tracing::warn!(asset = spec.name, error = %err, "asset production failed");
                    result.warnings.push(format!("{}: {}", spec.name, err));
                }
            }
        }

        let options = request.manifest_options.as_ref();
        if tier.is_premium() {
            let defaults = ManifestOptions::default();
            let manifest = WebManifest::new(options.unwrap_or(&defaults));
            result.manifest_text = Some(manifest.to_json_pretty()?);
            result.browser_config_text = Some(browser_config());
        }
        result.html_snippet_text = html_snippet(tier, options);

        tracing::info!(
            assets = result.assets.len(),
            warnings = result.warnings.len(),
            "generation finished"
        );
        Ok(result)
    }

    /// Extracts the border color once, then renders every maskable size
    /// with it.
    async fn produce_maskable(
        &self,
        decoded: &DecodedImage,
    ) -> Vec<(IconSpec, Settled<Vec<u8>, ProductionError>)> {
        let source = decoded.clone();
        let threshold = self.config.opaque_alpha_threshold;
        let color =
            tokio::task::spawn_blocking(move || dominant_border_color(source.pixels(), threshold))
                .await
                .unwrap_or_else(|err| {
                    tracing::warn!(error = %err, "border sampling failed, using fallback");
                    FALLBACK_BORDER_COLOR.to_string()
                });
        tracing::debug!(color = %color, "maskable fill color");

        self.produce(decoded, MASKABLE_ICONS.to_vec(), Some(color))
            .await
    }

    /// Renders `specs` concurrently, keeping every outcome in spec order.
    async fn produce(
        &self,
        decoded: &DecodedImage,
        specs: Vec<IconSpec>,
        fill: Option<String>,
    ) -> Vec<(IconSpec, Settled<Vec<u8>, ProductionError>)> {
        let tasks = specs.iter().map(|spec| {
            let rasterizer = Arc::clone(&self.rasterizer);
            let source = decoded.clone();
            let fill = fill.clone();
            let size = spec.size;
            let name = spec.name;

            async move {
                let handle = tokio::task::spawn_blocking(move || {
                    tracing::debug!(asset = name, size, "rendering asset");
                    match fill {
                        Some(color) => rasterizer.maskable(&source, size, &color),
                        None => rasterizer.resize(&source, size),
                    }
                });
                match handle.await {
                    Ok(outcome) => outcome,
                    Err(err) => Err(ProductionError::Task(err.to_string())),
                }
            }
        });

        let outcomes = settle_all(tasks).await;
        specs.into_iter().zip(outcomes).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icon::{FREE_ICONS, PREMIUM_ICONS};
    use crate::raster::encode_png;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Delegates to the real rasterizer but fails on chosen sizes.
    struct FlakyRasterizer {
        inner: ImageRasterizer,
        fail_sizes: HashSet<u32>,
        calls: Mutex<Vec<u32>>,
    }

    impl FlakyRasterizer {
        fn failing(sizes: &[u32]) -> Self {
            Self {
                inner: ImageRasterizer::default(),
                fail_sizes: sizes.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn check(&self, size: u32) -> Result<(), ProductionError> {
            self.calls.lock().unwrap().push(size);
            if self.fail_sizes.contains(&size) {
                return Err(ProductionError::Task(format!("simulated failure at {size}")));
            }
            Ok(())
        }
    }

    impl Rasterizer for FlakyRasterizer {
        fn resize(&self, source: &DecodedImage, size: u32) -> Result<Vec<u8>, ProductionError> {
            self.check(size)?;
            self.inner.resize(source, size)
        }

        fn maskable(
            &self,
            source: &DecodedImage,
            size: u32,
            fill_hex: &str,
        ) -> Result<Vec<u8>, ProductionError> {
            self.check(size)?;
            self.inner.maskable(source, size, fill_hex)
        }
    }

    /// 64x64 blue square with a 1px red frame.
    fn framed_source() -> SourceImage {
        let img = RgbaImage::from_fn(64, 64, |x, y| {
            if x == 0 || y == 0 || x == 63 || y == 63 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        SourceImage::new(encode_png(&img).unwrap(), "image/png", "logo.png")
    }

    fn decode_png(bytes: &[u8]) -> RgbaImage {
        image::load_from_memory_with_format(bytes, ImageFormat::Png)
            .unwrap()
            .to_rgba8()
    }

    #[tokio::test]
    async fn free_tier_produces_three_favicons() {
        let generator = FaviconGenerator::new(ForgeConfig::default());
        let result = generator
            .generate(&GenerationRequest::new(framed_source(), Tier::Free))
            .await
            .unwrap();

        let sizes: Vec<u32> = result.assets.iter().map(|a| a.size).collect();
        assert_eq!(sizes, vec![16, 32, 48]);
        assert!(result.assets.iter().all(|a| a.tier == Tier::Free && a.path == "web/"));
        assert!(result.warnings.is_empty());
        assert!(result.manifest_text.is_none());
        assert!(result.browser_config_text.is_none());
        assert!(result.html_snippet_text.contains("favicon-16x16.png"));
        assert!(!result.html_snippet_text.contains("manifest.json"));
        assert_eq!(result.tier(), Tier::Free);

        for asset in &result.assets {
            assert_eq!(decode_png(&asset.bytes).dimensions(), (asset.size, asset.size));
        }
    }

    #[tokio::test]
    async fn premium_tier_produces_full_set() {
        let generator = FaviconGenerator::new(ForgeConfig::default());
        let options = ManifestOptions {
            short_name: "Forge".to_string(),
            theme_color: "#112233".to_string(),
            ..ManifestOptions::default()
        };
        let request =
            GenerationRequest::new(framed_source(), Tier::Premium).with_manifest_options(options);
        let result = generator.generate(&request).await.unwrap();

        let expected: Vec<&str> = FREE_ICONS
            .iter()
            .chain(PREMIUM_ICONS.iter())
            .chain(MASKABLE_ICONS.iter())
            .map(|spec| spec.name)
            .collect();
        let names: Vec<&str> = result.assets.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, expected);
        assert!(result.warnings.is_empty());
        assert_eq!(result.tier(), Tier::Premium);

        let manifest = WebManifest::from_json(result.manifest_text.as_deref().unwrap()).unwrap();
        assert_eq!(manifest.icons.len(), 8);
        assert_eq!(manifest.short_name, "Forge");
        assert!(result.browser_config_text.unwrap().contains("mstile-150x150.png"));
        assert!(result.html_snippet_text.contains(r##"content="#112233""##));
        assert!(result.html_snippet_text.contains(r#"content="Forge""#));
    }

    #[tokio::test]
    async fn maskable_background_matches_border() {
        let generator = FaviconGenerator::new(ForgeConfig::default());
        let result = generator
            .generate(&GenerationRequest::new(framed_source(), Tier::Premium))
            .await
            .unwrap();

        let icon = decode_png(&result.asset("icon-192-maskable.png").unwrap().bytes);
        assert_eq!(icon.dimensions(), (192, 192));
        assert_eq!(icon.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(icon.get_pixel(96, 96).0, [0, 0, 255, 255]);
    }

    #[tokio::test]
    async fn single_failure_becomes_warning() {
        let rasterizer = Arc::new(FlakyRasterizer::failing(&[32]));
        let generator = FaviconGenerator::with_rasterizer(ForgeConfig::default(), rasterizer);
        let result = generator
            .generate(&GenerationRequest::new(framed_source(), Tier::Free))
            .await
            .unwrap();

        assert_eq!(result.assets.len(), 2);
        assert!(result.asset("favicon-32x32.png").is_none());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("favicon-32x32.png: "));
        assert!(result.warnings[0].contains("simulated failure at 32"));
    }

    #[tokio::test]
    async fn shared_size_failure_hits_plain_and_maskable() {
        let rasterizer = Arc::new(FlakyRasterizer::failing(&[192]));
        let generator =
            FaviconGenerator::with_rasterizer(ForgeConfig::default(), rasterizer.clone());
        let result = generator
            .generate(&GenerationRequest::new(framed_source(), Tier::Premium))
            .await
            .unwrap();

        assert_eq!(result.assets.len(), 13 - 2);
        assert_eq!(result.warnings.len(), 2);
        assert!(result.asset("icon-192.png").is_none());
        assert!(result.asset("icon-192-maskable.png").is_none());
        assert_eq!(rasterizer.calls.lock().unwrap().len(), 13);
    }

    #[tokio::test]
    async fn undecodable_source_aborts() {
        let generator = FaviconGenerator::new(ForgeConfig::default());
        let source = SourceImage::new(b"not an image".to_vec(), "image/png", "broken.png");
        let err = generator
            .generate(&GenerationRequest::new(source, Tier::Premium))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerateError::Decode(_)));
        assert_eq!(err.code(), "image_load_failed");
    }
}
