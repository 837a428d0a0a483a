//! Text documents shipped next to the icons: the web app manifest, the
//! Windows tile config and the HTML head snippet.
//!
//! # Example
//!
//! ```
//! use faviconforge_core::{ManifestOptions, WebManifest};
//!
//! let options = ManifestOptions {
//!     name: "Forge Demo".to_string(),
//!     short_name: "Forge".to_string(),
//!     ..ManifestOptions::default()
//! };
//!
//! let json = WebManifest::new(&options).to_json_pretty().unwrap();
//! let restored = WebManifest::from_json(&json).unwrap();
//! assert_eq!(restored.short_name, "Forge");
//! assert_eq!(restored.icons.len(), 8);
//! ```

use serde::{Deserialize, Serialize};

use crate::icon::{MASKABLE_ICONS, PNG_MIME, PREMIUM_ICONS, Tier};

// ============================================================================
// ManifestOptions
// ============================================================================

/// User-editable app metadata, consumed only on the premium tier.
///
/// Serializes with camelCase keys:
///
/// ```json
/// { "name": "My App", "shortName": "App", "themeColor": "#ffffff", "backgroundColor": "#ffffff" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[serde(rename_all = "camelCase", default)]
pub struct ManifestOptions {
    pub name: String,
    pub short_name: String,
    pub theme_color: String,
    pub background_color: String,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            name: "My App".to_string(),
            short_name: "App".to_string(),
            theme_color: "#ffffff".to_string(),
            background_color: "#ffffff".to_string(),
        }
    }
}

impl ManifestOptions {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// WebManifest
// ============================================================================

/// Whether a manifest icon may be masked by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconPurpose {
    Any,
    Maskable,
}

/// One `icons` entry of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIcon {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub purpose: IconPurpose,
}

impl ManifestIcon {
    fn new(path: &str, name: &str, size: u32, purpose: IconPurpose) -> Self {
        Self {
            src: format!("/{path}{name}"),
            sizes: format!("{size}x{size}"),
            mime_type: PNG_MIME.to_string(),
            purpose,
        }
    }
}

/// The `manifest.json` document. Keys follow the web manifest format
/// (snake_case), unlike [`ManifestOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebManifest {
    pub name: String,
    pub short_name: String,
    pub theme_color: String,
    pub background_color: String,
    pub display: String,
    pub start_url: String,
    pub icons: Vec<ManifestIcon>,
}

impl WebManifest {
    /// Builds the manifest, listing each android icon followed by its
    /// maskable variant.
    pub fn new(options: &ManifestOptions) -> Self {
        let icons = MASKABLE_ICONS
            .iter()
            .flat_map(|maskable| {
                let plain = PREMIUM_ICONS
                    .iter()
                    .find(|spec| spec.path == maskable.path && spec.size == maskable.size);
                plain
                    .map(|spec| ManifestIcon::new(spec.path, spec.name, spec.size, IconPurpose::Any))
                    .into_iter()
                    .chain(std::iter::once(ManifestIcon::new(
                        maskable.path,
                        maskable.name,
                        maskable.size,
                        IconPurpose::Maskable,
                    )))
            })
            .collect();

        Self {
            name: options.name.clone(),
            short_name: options.short_name.clone(),
            theme_color: options.theme_color.clone(),
            background_color: options.background_color.clone(),
            display: "standalone".to_string(),
            start_url: "/".to_string(),
            icons,
        }
    }

    /// Serializes with two-space indentation.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ============================================================================
// Static documents
// ============================================================================

/// The `browserconfig.xml` document pointing Windows at the tile icon.
pub fn browser_config() -> String {
    r##"<?xml version="1.0" encoding="utf-8"?>
<browserconfig>
  <msapplication>
    <tile>
      <square150x150logo src="/windows/mstile-150x150.png"/>
      <TileColor>#ffffff</TileColor>
    </tile>
  </msapplication>
</browserconfig>"##
        .to_string()
}

const BASIC_FAVICONS: &str = r#"<!-- Basic Favicons -->
<link rel="icon" type="image/x-icon" href="/favicon.ico">
<link rel="icon" type="image/png" sizes="16x16" href="/web/favicon-16x16.png">
<link rel="icon" type="image/png" sizes="32x32" href="/web/favicon-32x32.png">
<link rel="icon" type="image/png" sizes="48x48" href="/web/favicon-48x48.png">"#;

/// Markup for the page `<head>`.
///
/// The free tier references only the favicon set. Premium appends iOS,
/// Android/PWA, Windows and theme blocks; the theme color and app title come
/// from `options`, falling back to [`ManifestOptions::default`].
pub fn html_snippet(tier: Tier, options: Option<&ManifestOptions>) -> String {
    if !tier.is_premium() {
        return BASIC_FAVICONS.to_string();
    }

    let defaults = ManifestOptions::default();
    let options = options.unwrap_or(&defaults);

    format!(
        r#"{BASIC_FAVICONS}

<!-- iOS -->
<link rel="apple-touch-icon" sizes="180x180" href="/ios/apple-touch-icon.png">

<!-- Android/PWA -->
<link rel="icon" type="image/png" sizes="192x192" href="/android/icon-192.png">
<link rel="icon" type="image/png" sizes="512x512" href="/android/icon-512.png">
<link rel="manifest" href="/manifest.json">

<!-- Windows -->
<meta name="msapplication-TileImage" content="/windows/mstile-150x150.png">
<meta name="msapplication-config" content="/browserconfig.xml">

<!-- Theme & PWA Meta -->
<meta name="theme-color" content="{theme}">
<meta name="apple-mobile-web-app-capable" content="yes">
<meta name="apple-mobile-web-app-status-bar-style" content="black-translucent">
<meta name="apple-mobile-web-app-title" content="{title}">
<meta name="mobile-web-app-capable" content="yes">"#,
        theme = escape_attribute(&options.theme_color),
        title = escape_attribute(&options.short_name),
    )
}

/// Escapes a value for a double-quoted HTML attribute.
fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_json_format() {
        let json = ManifestOptions::default().to_json().unwrap();
        assert!(json.contains("\"shortName\":\"App\""));
        assert!(json.contains("\"themeColor\":\"#ffffff\""));
        assert!(json.contains("\"backgroundColor\""));
    }

    #[test]
    fn partial_options_deserialize() {
        let options = ManifestOptions::from_json(r#"{"name":"Only Name"}"#).unwrap();
        assert_eq!(options.name, "Only Name");
        assert_eq!(options.short_name, "App");
    }

    #[test]
    fn manifest_lists_any_and_maskable() {
        let manifest = WebManifest::new(&ManifestOptions::default());
        assert_eq!(manifest.icons.len(), 8);
        assert_eq!(manifest.display, "standalone");
        assert_eq!(manifest.start_url, "/");

        assert_eq!(manifest.icons[0].src, "/android/icon-192.png");
        assert_eq!(manifest.icons[0].purpose, IconPurpose::Any);
        assert_eq!(manifest.icons[1].src, "/android/icon-192-maskable.png");
        assert_eq!(manifest.icons[1].purpose, IconPurpose::Maskable);
        assert_eq!(manifest.icons[7].sizes, "1024x1024");

        let maskable = manifest
            .icons
            .iter()
            .filter(|icon| icon.purpose == IconPurpose::Maskable)
            .count();
        assert_eq!(maskable, 4);
    }

    #[test]
    fn manifest_json_uses_web_keys() {
        let json = WebManifest::new(&ManifestOptions::default())
            .to_json_pretty()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["short_name"], "App");
        assert_eq!(value["icons"][0]["type"], "image/png");
        assert_eq!(value["icons"][1]["purpose"], "maskable");
        assert!(json.contains("\n  \"name\""));
    }

    #[test]
    fn browser_config_references_tile() {
        let xml = browser_config();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("/windows/mstile-150x150.png"));
        assert!(xml.contains("<TileColor>#ffffff</TileColor>"));
    }

    #[test]
    fn free_snippet_has_only_basic_links() {
        let html = html_snippet(Tier::Free, None);
        assert!(html.contains("favicon.ico"));
        assert!(html.contains("/web/favicon-48x48.png"));
        assert!(!html.contains("apple-touch-icon"));
        assert!(!html.contains("manifest.json"));
    }

    #[test]
    fn premium_snippet_uses_options() {
        let options = ManifestOptions {
            theme_color: "#123456".to_string(),
            short_name: "Forge".to_string(),
            ..ManifestOptions::default()
        };
        let html = html_snippet(Tier::Premium, Some(&options));
        assert!(html.contains("apple-touch-icon"));
        assert!(html.contains("manifest.json"));
        assert!(html.contains("browserconfig.xml"));
        assert!(html.contains(r##"<meta name="theme-color" content="#123456">"##));
        assert!(html.contains(r#"content="Forge">"#));
    }

    #[test]
    fn premium_snippet_defaults() {
        let html = html_snippet(Tier::Premium, None);
        assert!(html.contains(r##"<meta name="theme-color" content="#ffffff">"##));
        assert!(html.contains(r#"<meta name="apple-mobile-web-app-title" content="App">"#));
    }

    #[test]
    fn snippet_escapes_attribute_values() {
        let options = ManifestOptions {
            short_name: r#"Tom & "Jerry" <3"#.to_string(),
            theme_color: r#""><script>"#.to_string(),
            ..ManifestOptions::default()
        };
        let html = html_snippet(Tier::Premium, Some(&options));
        assert!(html.contains(
            r#"<meta name="apple-mobile-web-app-title" content="Tom &amp; &quot;Jerry&quot; &lt;3">"#
        ));
        assert!(html.contains(r#"<meta name="theme-color" content="&quot;&gt;&lt;script&gt;">"#));
        assert!(!html.contains("<script>"));
    }
}
