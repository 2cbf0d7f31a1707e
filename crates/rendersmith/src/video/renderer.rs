//! Render one composition from the cached bundle to bytes.

use super::{
    Bundle, Codec, CompositionId, CompositionRenderer, TempArtifact, VideoBundleCache,
};
use crate::result::{RenderError, RenderResult};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Renders allowlisted compositions against the shared bundle
#[derive(Debug, Clone)]
pub struct VideoRenderer {
    bundles: Arc<VideoBundleCache>,
    renderer: Arc<dyn CompositionRenderer>,
    output_dir: PathBuf,
    timeout: Duration,
}

impl VideoRenderer {
    /// Create a renderer writing scratch files into `output_dir`
    #[must_use]
    pub fn new(
        bundles: Arc<VideoBundleCache>,
        renderer: Arc<dyn CompositionRenderer>,
        output_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            bundles,
            renderer,
            output_dir: output_dir.into(),
            timeout,
        }
    }

    /// Render `composition_id` with `input_props` and return the encoded file.
    ///
    /// Unknown ids are rejected before the bundle is touched or any file is
    /// created. The scratch file is removed on every exit path.
    #[tracing::instrument(skip(self, input_props))]
    pub async fn render(
        &self,
        composition_id: &str,
        input_props: &Value,
        codec: Codec,
    ) -> RenderResult<Vec<u8>> {
        let id = CompositionId::parse(composition_id)?;

        let bundle = self.bundles.warmup().await?;

        let output = TempArtifact::new(&self.output_dir, id.as_str(), codec.extension());
        let rendered = tokio::time::timeout(
            self.timeout,
            self.render_to(&bundle, &id, input_props, codec, &output),
        )
        .await
        .unwrap_or_else(|_| Err(RenderError::timeout("video render", self.timeout)));
        output.cleanup().await;

        let bytes = rendered?;
        info!(size_bytes = bytes.len(), "video rendered");
        Ok(bytes)
    }

    async fn render_to(
        &self,
        bundle: &Bundle,
        id: &CompositionId,
        input_props: &Value,
        codec: Codec,
        output: &TempArtifact,
    ) -> RenderResult<Vec<u8>> {
        let metadata = self
            .renderer
            .select_composition(bundle.location(), id, input_props)
            .await?;
        debug!(
            frames = metadata.duration_in_frames,
            fps = metadata.fps,
            "composition selected"
        );

        self.renderer
            .render_media(bundle.location(), &metadata, input_props, codec, output.path())
            .await?;

        let bytes = tokio::fs::read(output.path()).await?;
        if bytes.is_empty() {
            return Err(RenderError::video_render("renderer produced an empty file"));
        }
        Ok(bytes)
    }
}
