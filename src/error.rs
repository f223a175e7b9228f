//! Error types for background removal operations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Comprehensive error types for background removal operations
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image codec errors raised by the `image` crate
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Input bytes could not be decoded into an image
    #[error("Decode error: {0}")]
    Decode(String),

    /// Unsupported upload format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Tensor or image dimensions do not line up
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Backend inference errors
    #[error("Inference error: {0}")]
    Inference(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Segmentation capability failed to initialize at start-up
    #[error("Segmentation unavailable: {0}")]
    Unavailable(String),

    /// Model download errors
    #[error("Download error: {0}")]
    Download(String),

    /// The worker thread panicked or could not be spawned
    #[error("Task failed: {0}")]
    Task(String),

    /// A removal task is already in flight
    #[error("A background removal task is already running")]
    TaskBusy,

    /// An action needs an uploaded image
    #[error("No image loaded; upload a JPEG or PNG first")]
    NoImage,

    /// Download requested before any removal finished
    #[error("No processed image yet; remove the background first")]
    NoResult,

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure categories surfaced when a removal falls back to the original image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The image could not be decoded or converted
    Decode,
    /// Tensor or image dimensions did not match what the model expects
    Shape,
    /// The model runtime reported an error
    Runtime,
    /// Anything not covered above
    Unknown,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode => write!(f, "decode"),
            Self::Shape => write!(f, "shape"),
            Self::Runtime => write!(f, "runtime"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl BgRemovalError {
    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new shape mismatch error
    pub fn shape<S: Into<String>>(msg: S) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new inference error
    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new download error
    pub fn download<S: Into<String>>(msg: S) -> Self {
        Self::Download(msg.into())
    }

    /// Create a new task error
    pub fn task<S: Into<String>>(msg: S) -> Self {
        Self::Task(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
        recommended: Option<T>,
    ) -> Self {
        let recommendation = match recommended {
            Some(rec) => format!(" Recommended: {}", rec),
            None => String::new(),
        };

        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {}).{}",
            parameter, value, valid_range, recommendation
        ))
    }

    /// Classify this error for the fail-open path
    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Image(_) | Self::Decode(_) | Self::UnsupportedFormat(_) => FailureKind::Decode,
            Self::ShapeMismatch(_) => FailureKind::Shape,
            Self::Inference(_) | Self::Model(_) => FailureKind::Runtime,
            Self::Io(_)
            | Self::InvalidConfig(_)
            | Self::Unavailable(_)
            | Self::Download(_)
            | Self::Task(_)
            | Self::TaskBusy
            | Self::NoImage
            | Self::NoResult
            | Self::Internal(_) => FailureKind::Unknown,
        }
    }
}
