//! Request/response boundary that turns one uploaded image into a favicon.
//!
//! ```
//! use faviconforge_core::{IcoEndpoint, IcoRequest};
//!
//! let endpoint = IcoEndpoint::default();
//! let request = IcoRequest::new(http::Method::GET, Some("image/png"), None);
//!
//! let err = endpoint.handle(&request).unwrap_err();
//! assert_eq!(err.status(), http::StatusCode::METHOD_NOT_ALLOWED);
//! ```

use std::sync::Arc;

use http::{Method, Request, Response, StatusCode, header};

use crate::config::ForgeConfig;
use crate::error::IcoError;
use crate::icon::FREE_ICONS;
use crate::raster::{ImageRasterizer, Rasterizer, decode};

/// Content type of the container.
pub const ICO_MIME: &str = "image/x-icon";

const ACCEPTED_UPLOADS: [&str; 3] = ["image/png", "image/jpeg", "image/jpg"];

// ============================================================================
// Request / Response
// ============================================================================

/// An incoming favicon request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcoRequest {
    pub method: Method,
    /// Declared mime of the upload, without parameters.
    pub content_type: Option<String>,
    pub body: Option<Vec<u8>>,
}

impl IcoRequest {
    pub fn new(method: Method, content_type: Option<&str>, body: Option<Vec<u8>>) -> Self {
        Self {
            method,
            content_type: content_type.map(normalize_mime),
            body,
        }
    }

    /// A `POST` carrying `bytes` as its body.
    pub fn upload(content_type: &str, bytes: Vec<u8>) -> Self {
        Self::new(Method::POST, Some(content_type), Some(bytes))
    }

    /// Reads the method, `Content-Type` header and body of an HTTP request.
    pub fn from_http(request: Request<Vec<u8>>) -> Self {
        let content_type = request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(normalize_mime);
        let method = request.method().clone();
        let body = Some(request.into_body()).filter(|b| !b.is_empty());
        Self {
            method,
            content_type,
            body,
        }
    }
}

/// A successful favicon response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcoResponse {
    pub content_type: &'static str,
    pub content_disposition: String,
    pub body: Vec<u8>,
}

impl IcoResponse {
    fn attachment(body: Vec<u8>) -> Self {
        Self {
            content_type: ICO_MIME,
            content_disposition: "attachment; filename=\"favicon.ico\"".to_string(),
            body,
        }
    }
}

fn normalize_mime(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

// ============================================================================
// IcoEndpoint
// ============================================================================

/// Accepts `POST` uploads of PNG or JPEG and answers with a 16/32/48
/// icon container.
#[derive(Clone)]
pub struct IcoEndpoint {
    rasterizer: Arc<dyn Rasterizer>,
    svg_render_size: u32,
}

impl Default for IcoEndpoint {
    fn default() -> Self {
        Self::new(&ForgeConfig::default())
    }
}

impl IcoEndpoint {
    pub fn new(config: &ForgeConfig) -> Self {
        Self::with_rasterizer(config, Arc::new(ImageRasterizer::new(config)))
    }

    pub fn with_rasterizer(config: &ForgeConfig, rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            rasterizer,
            svg_render_size: config.svg_render_size,
        }
    }

    /// Validates the request and builds the container.
    pub fn handle(&self, request: &IcoRequest) -> Result<IcoResponse, IcoError> {
        if request.method != Method::POST {
            return Err(IcoError::MethodNotAllowed);
        }

        let (Some(body), Some(mime)) = (&request.body, &request.content_type) else {
            return Err(IcoError::InvalidFileUpload);
        };
        if body.is_empty() || !ACCEPTED_UPLOADS.contains(&mime.as_str()) {
            return Err(IcoError::InvalidFileUpload);
        }

        let source = decode(body, mime, self.svg_render_size)
            .map_err(|e| IcoError::GenerationFailed(e.to_string()))?;

        let mut frames = Vec::with_capacity(FREE_ICONS.len());
        for spec in &FREE_ICONS {
            let frame = self
                .rasterizer
                .resize(&source, spec.size)
                .map_err(|e| IcoError::GenerationFailed(e.to_string()))?;
            frames.push(frame);
        }

        let refs: Vec<&[u8]> = frames.iter().map(Vec::as_slice).collect();
        let ico =
            super::compose(&refs).map_err(|e| IcoError::GenerationFailed(e.to_string()))?;
        Ok(IcoResponse::attachment(ico))
    }

    /// Full HTTP round trip: errors become JSON bodies with their status.
    pub fn respond(&self, request: Request<Vec<u8>>) -> Response<Vec<u8>> {
        let request = IcoRequest::from_http(request);
        let (status, content_type, disposition, body) = match self.handle(&request) {
            Ok(ok) => (
                StatusCode::OK,
                ok.content_type,
                Some(ok.content_disposition),
                ok.body,
            ),
            Err(err) => {
                tracing::warn!(code = err.code(), error = %err, "ico request rejected");
                (
                    err.status(),
                    "application/json",
                    None,
                    err.to_json_body().into_bytes(),
                )
            }
        };

        let mut response = Response::new(body);
        *response.status_mut() = status;
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
        if let Some(value) = disposition.and_then(|d| header::HeaderValue::from_str(&d).ok()) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        response
    }
}
