//! Request and response bodies

use base64::Engine;
use rendersmith::{
    scoped_to_item, BatchEntry, Codec, ImageFormat, RenderError, RenderOutcome, RenderRequest,
    RenderResult, SceneDescription, VideoCompositionRequest, DEFAULT_DIMENSION, DEFAULT_QUALITY,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /render`
#[derive(Debug, Deserialize)]
pub struct RenderBody {
    /// Scene document; required and must be an object
    #[serde(default)]
    pub scene: Option<Value>,
    /// Logical width
    pub width: Option<u32>,
    /// Logical height
    pub height: Option<u32>,
    /// Output format
    pub format: Option<ImageFormat>,
    /// Output quality
    pub quality: Option<u8>,
}

impl RenderBody {
    /// Convert into an engine request
    pub fn into_request(self) -> RenderResult<RenderRequest> {
        let scene = self
            .scene
            .ok_or_else(|| RenderError::invalid_input("scene", "is required"))?;
        Ok(build_request(
            Value::Null,
            scene,
            self.width,
            self.height,
            self.format,
            self.quality,
        ))
    }
}

/// One item of `POST /render/batch`
#[derive(Debug, Deserialize)]
pub struct BatchItem {
    /// Caller correlation id, echoed back verbatim
    #[serde(default)]
    pub id: Value,
    /// Scene document, passed through as-is
    #[serde(default)]
    pub scene: Value,
    /// Logical width
    pub width: Option<u32>,
    /// Logical height
    pub height: Option<u32>,
    /// Output format
    pub format: Option<ImageFormat>,
    /// Output quality
    pub quality: Option<u8>,
}

impl From<BatchItem> for RenderRequest {
    fn from(item: BatchItem) -> Self {
        build_request(
            item.id,
            item.scene,
            item.width,
            item.height,
            item.format,
            item.quality,
        )
    }
}

fn build_request(
    id: Value,
    scene: Value,
    width: Option<u32>,
    height: Option<u32>,
    format: Option<ImageFormat>,
    quality: Option<u8>,
) -> RenderRequest {
    RenderRequest::new(id, SceneDescription::new(scene))
        .with_size(
            width.unwrap_or(DEFAULT_DIMENSION),
            height.unwrap_or(DEFAULT_DIMENSION),
        )
        .with_format(format.unwrap_or_default())
        .with_quality(quality.unwrap_or(DEFAULT_QUALITY))
}

/// Decode one raw batch item.
///
/// An item that does not fit [`BatchItem`] (wrong types, negative sizes,
/// unknown format) becomes a failed outcome in its own slot, keeping whatever
/// `id` and `format` could still be read from it.
pub fn decode_batch_item(index: usize, raw: Value) -> BatchEntry {
    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    let format = raw
        .get("format")
        .and_then(|format| ImageFormat::deserialize(format).ok())
        .unwrap_or_default();

    match serde_json::from_value::<BatchItem>(raw) {
        Ok(item) => BatchEntry::Render(item.into()),
        Err(e) => {
            let err = scoped_to_item(RenderError::invalid_input("", e.to_string()), index);
            BatchEntry::Rejected(RenderOutcome::failed(id, &err, format))
        }
    }
}

/// Body of `POST /render/batch`
#[derive(Debug, Deserialize)]
pub struct BatchBody {
    /// Raw items, decoded one at a time by [`decode_batch_item`]
    pub items: Option<Vec<Value>>,
}

/// One entry of a batch response
#[derive(Debug, Serialize, PartialEq)]
pub struct BatchResult {
    /// Correlation id copied from the request
    pub id: Value,
    /// Whether the item rendered
    pub success: bool,
    /// Encoded image, base64
    pub image_base64: Option<String>,
    /// Requested output format
    pub format: ImageFormat,
    /// Failure description
    pub error: Option<String>,
}

impl From<RenderOutcome> for BatchResult {
    fn from(outcome: RenderOutcome) -> Self {
        Self {
            id: outcome.id,
            success: outcome.success,
            image_base64: outcome
                .image
                .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes)),
            format: outcome.format,
            error: outcome.error,
        }
    }
}

/// Response of `POST /render/batch`
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    /// One result per submitted item, in order
    pub results: Vec<BatchResult>,
}

/// Body of `POST /render/video`
#[derive(Debug, Deserialize)]
pub struct VideoBody {
    /// Allowlisted composition id
    pub composition_id: Option<String>,
    /// Properties for the composition; must be an object
    #[serde(default)]
    pub input_props: Option<Value>,
    /// Output codec
    pub codec: Option<Codec>,
}

impl VideoBody {
    /// Validate into an engine request
    pub fn into_request(self) -> RenderResult<VideoCompositionRequest> {
        let id = self
            .composition_id
            .ok_or_else(|| RenderError::invalid_input("composition_id", "is required"))?;
        let props = self
            .input_props
            .ok_or_else(|| RenderError::invalid_input("input_props", "is required"))?;
        Ok(VideoCompositionRequest::new(&id, props)?.with_codec(self.codec.unwrap_or_default()))
    }
}

/// Successful response of `POST /render/video`
#[derive(Debug, Serialize)]
pub struct VideoResponse {
    /// Always `true`
    pub success: bool,
    /// Encoded video, base64
    pub video_base64: String,
    /// Size of the decoded video
    pub size_bytes: usize,
    /// Composition that was rendered
    pub composition_id: String,
    /// Container reported to callers
    pub format: &'static str,
}

impl VideoResponse {
    /// Wrap rendered bytes
    #[must_use]
    pub fn new(composition_id: &str, bytes: &[u8]) -> Self {
        Self {
            success: true,
            video_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
            size_bytes: bytes.len(),
            composition_id: composition_id.to_string(),
            format: "mp4",
        }
    }
}

/// Response of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"`
    pub status: &'static str,
    /// Service name
    pub service: &'static str,
}
