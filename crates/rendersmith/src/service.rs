//! The service object owning all cross-request state.
//!
//! One [`RenderService`] is built at startup and shared by every request.
//! It owns the browser pool and the bundle cache, the only two pieces of
//! state that requests share, and tears both down in [`RenderService::shutdown`].

use crate::batch::{BatchCoordinator, BatchEntry};
use crate::browser::{default_launcher, BrowserLauncher, BrowserPool, RuntimeSource};
use crate::canvas::CanvasRenderer;
use crate::config::ServiceConfig;
use crate::optimizer::{ImageFormat, ImageOptimizer};
use crate::result::{RenderError, RenderResult};
use crate::scene::{validate_dimensions, validate_quality, RenderOutcome, RenderRequest};
use crate::video::{
    Bundler, CommandBundler, CommandRenderer, CompositionRenderer, VideoBundleCache,
    VideoCompositionRequest, VideoRenderer,
};
use std::sync::Arc;
use tracing::info;

/// An encoded single render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// Encoded bytes
    pub bytes: Vec<u8>,
    /// Encoding of `bytes`
    pub format: ImageFormat,
    /// Logical width requested
    pub width: u32,
    /// Logical height requested
    pub height: u32,
}

/// Rendering engine shared by all requests
#[derive(Debug)]
pub struct RenderService {
    config: ServiceConfig,
    canvas: CanvasRenderer,
    optimizer: ImageOptimizer,
    batch: BatchCoordinator,
    bundles: Arc<VideoBundleCache>,
    video: VideoRenderer,
}

impl RenderService {
    /// Build the service with the default browser and composition tooling
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        let launcher = default_launcher(&config.browser);
        let video = &config.video;
        let bundler = Arc::new(CommandBundler::new(
            video.tool_program.clone(),
            video.project_dir.clone(),
            video.entry_point.clone(),
        ));
        let renderer = Arc::new(CommandRenderer::new(
            video.tool_program.clone(),
            video.project_dir.clone(),
            video.output_dir.clone(),
        ));
        Self::with_backends(config, launcher, bundler, renderer)
    }

    /// Build the service on explicit backends
    #[must_use]
    pub fn with_backends(
        config: ServiceConfig,
        launcher: Arc<dyn BrowserLauncher>,
        bundler: Arc<dyn Bundler>,
        renderer: Arc<dyn CompositionRenderer>,
    ) -> Self {
        let pool = BrowserPool::new(
            launcher,
            RuntimeSource::from_config(&config.browser),
            config.max_idle_pages,
        );
        let canvas = CanvasRenderer::new(pool, config.render_timeout);
        let optimizer = ImageOptimizer::new();
        let batch = BatchCoordinator::new(canvas.clone(), optimizer, config.max_dimension);
        let bundles = Arc::new(VideoBundleCache::new(bundler, config.video.bundle_timeout));
        let video = VideoRenderer::new(
            Arc::clone(&bundles),
            renderer,
            config.video.output_dir.clone(),
            config.video.render_timeout,
        );

        Self {
            config,
            canvas,
            optimizer,
            batch,
            bundles,
            video,
        }
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The browser pool
    #[must_use]
    pub const fn pool(&self) -> &BrowserPool {
        self.canvas.pool()
    }

    /// The video bundle cache
    #[must_use]
    pub fn bundles(&self) -> &VideoBundleCache {
        &self.bundles
    }

    fn validate_request(&self, request: &RenderRequest) -> RenderResult<()> {
        validate_dimensions(request.width, request.height, self.config.max_dimension)?;
        validate_quality(request.quality)
    }

    /// Render one scene and encode it.
    ///
    /// Unlike batch items, a single render requires the scene to be a JSON
    /// object.
    pub async fn render_image(&self, request: &RenderRequest) -> RenderResult<RenderedImage> {
        if !request.scene.is_object() {
            return Err(RenderError::invalid_input("scene", "must be a JSON object"));
        }
        self.validate_request(request)?;

        let pixels = self
            .canvas
            .render(&request.scene, request.width, request.height)
            .await?;
        let bytes = self
            .optimizer
            .optimize(&pixels, request.format, request.quality)?;

        Ok(RenderedImage {
            bytes,
            format: request.format,
            width: request.width,
            height: request.height,
        })
    }

    /// Reject batches with no items or more than `max_batch_items`.
    pub fn check_batch_len(&self, count: usize) -> RenderResult<()> {
        let max = self.config.max_batch_items;
        if count == 0 || count > max {
            return Err(RenderError::BatchSize { count, max });
        }
        Ok(())
    }

    /// Check the batch size, then render every entry.
    ///
    /// Only a missing or out-of-range item count rejects the batch. Field
    /// errors and render failures are reported on the item they belong to.
    pub async fn render_batch(&self, items: Vec<BatchEntry>) -> RenderResult<Vec<RenderOutcome>> {
        self.check_batch_len(items.len())?;
        Ok(self.batch.render_batch(items).await)
    }

    /// Render one video composition.
    pub async fn render_video(&self, request: &VideoCompositionRequest) -> RenderResult<Vec<u8>> {
        self.video
            .render(
                request.composition_id.as_str(),
                &request.input_props,
                request.codec,
            )
            .await
    }

    /// Build the video bundle now instead of on the first video request.
    pub async fn warmup_video(&self) -> RenderResult<()> {
        self.bundles.warmup().await.map(|_| ())
    }

    /// Close the browser and release the bundle.
    pub async fn shutdown(&self) {
        self.pool().shutdown().await;
        self.bundles.shutdown();
        info!("render service shut down");
    }
}
