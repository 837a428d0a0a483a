//! Error types for every stage of the favicon pipeline.
//!
//! Each error carries a stable [`code`](DecodeError::code) alongside its
//! human-readable message, so callers can branch on the kind without parsing
//! `Display` output.

use thiserror::Error;

/// The source image could not be turned into a raster.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported image type: {0}")]
    UnsupportedMime(String),

    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to parse svg: {0}")]
    Svg(String),

    #[error("decoded image has no pixels")]
    Empty,
}

impl DecodeError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnsupportedMime(_) => "unsupported_image_type",
            Self::Image(_) | Self::Svg(_) | Self::Empty => "image_load_failed",
        }
    }
}

/// A single asset failed to render. Downgraded to a warning by the generator.
#[derive(Debug, Error)]
pub enum ProductionError {
    #[error("invalid target size {0}")]
    InvalidSize(u32),

    #[error("invalid fill color {0:?}")]
    InvalidColor(String),

    #[error("failed to encode png: {0}")]
    Encode(#[from] image::ImageError),

    #[error("render task failed: {0}")]
    Task(String),
}

impl ProductionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSize(_) => "invalid_size",
            Self::InvalidColor(_) => "invalid_color",
            Self::Encode(_) => "encode_failed",
            Self::Task(_) => "task_failed",
        }
    }
}

/// The icon container could not be assembled from its frames.
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("icon container needs at least one frame")]
    NoFrames,

    #[error("icon container cannot hold {0} frames")]
    TooManyFrames(usize),

    #[error("frame {index} is invalid: {reason}")]
    InvalidFrame { index: usize, reason: String },

    #[error("frame {index} is {width}x{height}, larger than 256x256")]
    FrameTooLarge { index: usize, width: u32, height: u32 },

    #[error("missing {0}x{0} frame")]
    MissingFrame(u32),

    #[error("malformed icon container: {0}")]
    Malformed(String),
}

impl ComposeError {
    pub fn code(&self) -> &'static str {
        "ico_generation_failed"
    }
}

/// The durable result cache failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("storage is not available: {0}")]
    Unavailable(String),

    #[error("storage quota exceeded")]
    QuotaExceeded,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

impl CacheError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "storage_not_available",
            Self::QuotaExceeded => "storage_quota_exceeded",
            Self::Storage(_) | Self::Corrupt(_) => "storage_error",
        }
    }
}

/// Generation as a whole failed; no assets could be produced.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("failed to build manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("no source image available")]
    NoSourceImage,

    #[error("generation was superseded by a newer run")]
    Cancelled,
}

impl GenerateError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode(e) => e.code(),
            Self::Cache(e) => e.code(),
            Self::Manifest(_) => "manifest_failed",
            Self::NoSourceImage => "no_source_image",
            Self::Cancelled => "cancelled",
        }
    }
}

/// The archive could not be produced at all.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("failed to write archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("nothing has been generated yet")]
    NothingCached,
}

impl PackageError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Zip(_) => "zip_generation_failed",
            Self::Cache(e) => e.code(),
            Self::NothingCached => "no_source_image",
        }
    }
}

/// Failure at the icon-container request boundary.
#[derive(Debug, Error)]
pub enum IcoError {
    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("invalid file upload")]
    InvalidFileUpload,

    #[error("ico generation failed: {0}")]
    GenerationFailed(String),

    #[error("ico request failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Compose(#[from] ComposeError),
}

impl IcoError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MethodNotAllowed => "method_not_allowed",
            Self::InvalidFileUpload => "invalid_file_upload",
            Self::GenerationFailed(_) | Self::Transport(_) | Self::Compose(_) => {
                "ico_generation_failed"
            }
        }
    }

    /// HTTP status the boundary answers with for this error.
    pub fn status(&self) -> http::StatusCode {
        match self {
            Self::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidFileUpload => http::StatusCode::BAD_REQUEST,
            Self::Transport(_) => http::StatusCode::BAD_GATEWAY,
            Self::GenerationFailed(_) | Self::Compose(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Renders the structured JSON error body.
    ///
    /// ```json
    /// { "error": "ico_generation_failed", "message": "..." }
    /// ```
    pub fn to_json_body(&self) -> String {
        let body = match self {
            Self::MethodNotAllowed | Self::InvalidFileUpload => {
                serde_json::json!({ "error": self.code() })
            }
            _ => serde_json::json!({ "error": self.code(), "message": self.to_string() }),
        };
        body.to_string()
    }
}

/// Configuration could not be read or written.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
