//! Video composition rendering.
//!
//! A composition project is compiled once into a [`Bundle`] by the
//! [`VideoBundleCache`], then every [`VideoRenderer::render`] call renders a
//! named composition from that bundle into a temporary file and returns its
//! bytes. Only ids in [`COMPOSITION_ALLOWLIST`] are ever passed to the
//! tooling.

mod bundle;
mod command;
mod renderer;
mod temp;

pub use bundle::{Bundle, VideoBundleCache};
pub use command::{parse_composition_listing, CommandBundler, CommandRenderer};
pub use renderer::VideoRenderer;
pub use temp::TempArtifact;

use crate::result::{RenderError, RenderResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{self, Debug};
use std::path::Path;
use std::str::FromStr;

/// Compositions that may be rendered
pub const COMPOSITION_ALLOWLIST: [&str; 2] = ["BrandedStatic", "ServiceHero"];

/// A composition id known to be in [`COMPOSITION_ALLOWLIST`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositionId(&'static str);

impl CompositionId {
    /// Accept `id` only if it is allowlisted.
    pub fn parse(id: &str) -> RenderResult<Self> {
        COMPOSITION_ALLOWLIST
            .into_iter()
            .find(|allowed| *allowed == id)
            .map(Self)
            .ok_or_else(|| RenderError::UnknownComposition { id: id.to_string() })
    }

    /// The id as passed to the tooling
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for CompositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Video codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// H.264 in MP4
    #[default]
    H264,
    /// H.265 in MP4
    H265,
    /// VP8 in WebM
    Vp8,
    /// VP9 in WebM
    Vp9,
    /// ProRes in QuickTime
    Prores,
}

impl Codec {
    /// Name understood by the composition tooling
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H265 => "h265",
            Self::Vp8 => "vp8",
            Self::Vp9 => "vp9",
            Self::Prores => "prores",
        }
    }

    /// Container extension for rendered files
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::H264 | Self::H265 => "mp4",
            Self::Vp8 | Self::Vp9 => "webm",
            Self::Prores => "mov",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Codec {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "h264" => Ok(Self::H264),
            "h265" => Ok(Self::H265),
            "vp8" => Ok(Self::Vp8),
            "vp9" => Ok(Self::Vp9),
            "prores" => Ok(Self::Prores),
            other => Err(RenderError::invalid_input(
                "codec",
                format!("unsupported codec '{other}'"),
            )),
        }
    }
}

/// A request to render one composition
#[derive(Debug, Clone, PartialEq)]
pub struct VideoCompositionRequest {
    /// Allowlisted composition
    pub composition_id: CompositionId,
    /// Properties handed to the composition
    pub input_props: Value,
    /// Output codec
    pub codec: Codec,
}

impl VideoCompositionRequest {
    /// Validate and build a request with the default codec.
    pub fn new(composition_id: &str, input_props: Value) -> RenderResult<Self> {
        let composition_id = CompositionId::parse(composition_id)?;
        if !input_props.is_object() {
            return Err(RenderError::invalid_input(
                "input_props",
                "must be a JSON object",
            ));
        }
        Ok(Self {
            composition_id,
            input_props,
            codec: Codec::default(),
        })
    }

    /// Set the codec
    #[must_use]
    pub const fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }
}

/// Resolved composition parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionMetadata {
    /// Composition id
    pub id: String,
    /// Length in frames
    pub duration_in_frames: u32,
    /// Frames per second
    pub fps: f64,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
}

/// Where a built bundle can be served from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLocation(String);

impl BundleLocation {
    /// Wrap a path or URL
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    /// The location as passed to the renderer
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Compiles the composition project
#[async_trait]
pub trait Bundler: Send + Sync + Debug {
    /// Build the project into `out_dir`
    async fn build(&self, out_dir: &Path) -> RenderResult<BundleLocation>;
}

/// Renders compositions from a built bundle
#[async_trait]
pub trait CompositionRenderer: Send + Sync + Debug {
    /// Resolve duration, frame rate and size for `id` with `input_props`
    async fn select_composition(
        &self,
        bundle: &BundleLocation,
        id: &CompositionId,
        input_props: &Value,
    ) -> RenderResult<CompositionMetadata>;

    /// Encode the composition into `output`
    async fn render_media(
        &self,
        bundle: &BundleLocation,
        metadata: &CompositionMetadata,
        input_props: &Value,
        codec: Codec,
        output: &Path,
    ) -> RenderResult<()>;
}
