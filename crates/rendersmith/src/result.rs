//! Result and error types for Rendersmith.

use thiserror::Error;

/// Result type for Rendersmith operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Coarse classification of a [`RenderError`].
///
/// Transports use this to pick a status code without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed request fields
    InputValidation,
    /// Batch with zero items or too many items
    BatchSize,
    /// Video composition id outside the allowlist
    UnknownComposition,
    /// Browser, page, runtime or scene failure for a single render
    RenderRuntime,
    /// Bundle build or video render failure
    Video,
    /// Operation exceeded its deadline
    Timeout,
    /// Local I/O or serialization failure
    Internal,
}

/// Errors that can occur in Rendersmith
#[derive(Debug, Error)]
pub enum RenderError {
    /// Request field is missing or malformed
    #[error("Invalid `{field}`: {message}")]
    InvalidInput {
        /// Offending field
        field: String,
        /// Error message
        message: String,
    },

    /// Batch item count outside the accepted range
    #[error("Batch must contain between 1 and {max} items, got {count}")]
    BatchSize {
        /// Submitted item count
        count: usize,
        /// Maximum accepted item count
        max: usize,
    },

    /// Composition id not in the allowlist
    #[error("Unknown composition: {id}")]
    UnknownComposition {
        /// Requested composition id
        id: String,
    },

    /// Baseline document loaded but the canvas runtime never initialised
    #[error("Canvas runtime is not initialised on the page")]
    RuntimeUninitialized,

    /// The canvas runtime rejected the scene
    #[error("Scene failed to load: {message}")]
    SceneLoad {
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Page error
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Image decoding or encoding error
    #[error("Image processing failed: {message}")]
    ImageProcessing {
        /// Error message
        message: String,
    },

    /// Video bundle build error
    #[error("Bundle build failed: {message}")]
    Bundle {
        /// Error message
        message: String,
    },

    /// Video render error
    #[error("Video render failed: {message}")]
    VideoRender {
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("{operation} timed out after {ms}ms")]
    Timeout {
        /// Name of the operation
        operation: String,
        /// Timeout in milliseconds
        ms: u64,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RenderError {
    /// Create an input validation error
    #[must_use]
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a scene load error
    #[must_use]
    pub fn scene_load(message: impl Into<String>) -> Self {
        Self::SceneLoad {
            message: message.into(),
        }
    }

    /// Create a browser launch error
    #[must_use]
    pub fn browser_launch(message: impl Into<String>) -> Self {
        Self::BrowserLaunch {
            message: message.into(),
        }
    }

    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Create an image processing error
    #[must_use]
    pub fn image_processing(message: impl Into<String>) -> Self {
        Self::ImageProcessing {
            message: message.into(),
        }
    }

    /// Create a bundle build error
    #[must_use]
    pub fn bundle(message: impl Into<String>) -> Self {
        Self::Bundle {
            message: message.into(),
        }
    }

    /// Create a video render error
    #[must_use]
    pub fn video_render(message: impl Into<String>) -> Self {
        Self::VideoRender {
            message: message.into(),
        }
    }

    /// Create a timeout error
    #[must_use]
    pub fn timeout(operation: impl Into<String>, timeout: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Classify this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InputValidation,
            Self::BatchSize { .. } => ErrorKind::BatchSize,
            Self::UnknownComposition { .. } => ErrorKind::UnknownComposition,
            Self::RuntimeUninitialized
            | Self::SceneLoad { .. }
            | Self::BrowserLaunch { .. }
            | Self::Page { .. }
            | Self::ImageProcessing { .. } => ErrorKind::RenderRuntime,
            Self::Bundle { .. } | Self::VideoRender { .. } => ErrorKind::Video,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Io(_) | Self::Json(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller sent a request that can never succeed as-is
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InputValidation | ErrorKind::BatchSize | ErrorKind::UnknownComposition
        )
    }
}
