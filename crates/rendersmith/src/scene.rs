//! Scene descriptions and render request/outcome records.
//!
//! A scene is passed through to the canvas runtime verbatim. Its structure is
//! never validated here: a malformed scene surfaces as a
//! [`RenderError::SceneLoad`](crate::RenderError::SceneLoad) when the runtime
//! tries to load it. That is the trust boundary of the service.

use crate::config::DEFAULT_DIMENSION;
use crate::optimizer::{ImageFormat, DEFAULT_QUALITY};
use crate::result::{RenderError, RenderResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declarative scene document interpreted by the canvas runtime
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SceneDescription(Value);

impl SceneDescription {
    /// Wrap a JSON document
    #[must_use]
    pub const fn new(value: Value) -> Self {
        Self(value)
    }

    /// Borrow the raw document
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Whether the document is a JSON object
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.0.is_object()
    }

    /// Unwrap into the raw document
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for SceneDescription {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// One item of a batch render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    /// Caller correlation id, echoed verbatim in the outcome
    pub id: Value,
    /// Scene to rasterise
    pub scene: SceneDescription,
    /// Logical width in CSS pixels
    pub width: u32,
    /// Logical height in CSS pixels
    pub height: u32,
    /// Output format
    pub format: ImageFormat,
    /// Output quality (1-100)
    pub quality: u8,
}

impl RenderRequest {
    /// Create a request with default size, format and quality
    #[must_use]
    pub fn new(id: impl Into<Value>, scene: impl Into<SceneDescription>) -> Self {
        Self {
            id: id.into(),
            scene: scene.into(),
            width: DEFAULT_DIMENSION,
            height: DEFAULT_DIMENSION,
            format: ImageFormat::default(),
            quality: DEFAULT_QUALITY,
        }
    }

    /// Set logical dimensions
    #[must_use]
    pub const fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set output format
    #[must_use]
    pub const fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = format;
        self
    }

    /// Set output quality
    #[must_use]
    pub const fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }
}

/// Check that a logical canvas size is renderable.
pub fn validate_dimensions(width: u32, height: u32, max: u32) -> RenderResult<()> {
    for (field, value) in [("width", width), ("height", height)] {
        if value == 0 {
            return Err(RenderError::invalid_input(
                field,
                "must be a positive integer",
            ));
        }
        if value > max {
            return Err(RenderError::invalid_input(
                field,
                format!("must not exceed {max}"),
            ));
        }
    }
    Ok(())
}

/// Check that an output quality is in `1..=100`.
pub fn validate_quality(quality: u8) -> RenderResult<()> {
    if (1..=100).contains(&quality) {
        Ok(())
    } else {
        Err(RenderError::invalid_input(
            "quality",
            "must be between 1 and 100",
        ))
    }
}

/// Outcome of one batch item. Exactly one of `image` / `error` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    /// Correlation id copied from the request
    pub id: Value,
    /// Whether the item rendered
    pub success: bool,
    /// Encoded image on success
    pub image: Option<Vec<u8>>,
    /// Requested output format
    pub format: ImageFormat,
    /// Failure description
    pub error: Option<String>,
}

impl RenderOutcome {
    /// Successful outcome
    #[must_use]
    pub const fn succeeded(id: Value, image: Vec<u8>, format: ImageFormat) -> Self {
        Self {
            id,
            success: true,
            image: Some(image),
            format,
            error: None,
        }
    }

    /// Failed outcome
    #[must_use]
    pub fn failed(id: Value, error: &RenderError, format: ImageFormat) -> Self {
        Self {
            id,
            success: false,
            image: None,
            format,
            error: Some(error.to_string()),
        }
    }
}
