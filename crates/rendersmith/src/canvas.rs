//! Rasterise one scene on a pooled page.

use crate::browser::{BrowserPool, PooledPage, Viewport};
use crate::result::{RenderError, RenderResult};
use crate::scene::SceneDescription;
use std::time::Duration;
use tracing::debug;

/// Device pixels per logical pixel for every render
pub const DEVICE_SCALE_FACTOR: f64 = 2.0;

/// Renders scenes to lossless PNG bytes
#[derive(Debug, Clone)]
pub struct CanvasRenderer {
    pool: BrowserPool,
    timeout: Duration,
}

impl CanvasRenderer {
    /// Create a renderer drawing pages from `pool`
    #[must_use]
    pub const fn new(pool: BrowserPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// The pool this renderer draws pages from
    #[must_use]
    pub const fn pool(&self) -> &BrowserPool {
        &self.pool
    }

    /// Render `scene` at `width` x `height` logical pixels.
    ///
    /// The output is a PNG of `width * 2` x `height * 2` device pixels. The
    /// page goes back to the pool after a success or a scene-level failure.
    /// It is closed instead when the page itself failed or the timeout fired
    /// mid-render.
    #[tracing::instrument(skip(self, scene))]
    pub async fn render(
        &self,
        scene: &SceneDescription,
        width: u32,
        height: u32,
    ) -> RenderResult<Vec<u8>> {
        if width == 0 {
            return Err(RenderError::invalid_input("width", "must be a positive integer"));
        }
        if height == 0 {
            return Err(RenderError::invalid_input("height", "must be a positive integer"));
        }

        let viewport = Viewport {
            width,
            height,
            device_scale_factor: DEVICE_SCALE_FACTOR,
        };

        let work = async {
            let mut page = self.pool.acquire().await?;
            let drawn = draw(&mut page, scene, viewport).await;
            match &drawn {
                Err(RenderError::Page { .. } | RenderError::BrowserLaunch { .. }) => {
                    self.pool.discard(page).await;
                }
                _ => self.pool.release(page).await,
            }
            drawn
        };

        let pixels = tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| RenderError::timeout("canvas render", self.timeout))??;
        debug!(bytes = pixels.len(), "scene rendered");
        Ok(pixels)
    }
}

async fn draw(
    page: &mut PooledPage,
    scene: &SceneDescription,
    viewport: Viewport,
) -> RenderResult<Vec<u8>> {
    page.set_viewport(viewport).await?;
    page.clear().await?;
    page.load_scene(scene).await?;
    page.render_all().await?;
    page.export_png().await
}
