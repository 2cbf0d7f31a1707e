//! Browser control for canvas rendering.
//!
//! The pool talks to the browser through three traits so the same pooling
//! logic drives either a real Chromium over CDP (the `browser` feature) or the
//! in-process fakes in [`crate::mock`].
//!
//! ```text
//! BrowserLauncher ──launch──► BrowserHandle ──new_page──► CanvasPage
//!                                 (one per process)        (many, pooled)
//! ```

use crate::config::BrowserConfig;
use crate::result::{RenderError, RenderResult};
use crate::scene::SceneDescription;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Debug;
use std::sync::Arc;

#[cfg(feature = "browser")]
mod cdp;
mod pool;

#[cfg(feature = "browser")]
pub use cdp::CdpLauncher;
pub use pool::{BrowserPool, PoolStats, PooledPage};

/// Bundled baseline document hosting the canvas runtime.
///
/// Fabric.js is fetched from `cdn.jsdelivr.net` when the page loads. Hosts
/// without outbound access should set `BrowserConfig::runtime_url` to a
/// self-hosted copy instead.
pub const CANVAS_RUNTIME_HTML: &str = include_str!("../../assets/canvas_runtime.html");

/// Where a fresh page loads its baseline document from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeSource {
    /// Inline HTML document
    Html(String),
    /// Remote or file URL
    Url(String),
}

impl RuntimeSource {
    /// Resolve the runtime source from browser configuration
    #[must_use]
    pub fn from_config(config: &BrowserConfig) -> Self {
        config.runtime_url.as_ref().map_or_else(
            || Self::Html(CANVAS_RUNTIME_HTML.to_string()),
            |url| Self::Url(url.clone()),
        )
    }
}

/// Page viewport in logical pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Logical width
    pub width: u32,
    /// Logical height
    pub height: u32,
    /// Device pixels per logical pixel
    pub device_scale_factor: f64,
}

/// Starts browser processes
#[async_trait]
pub trait BrowserLauncher: Send + Sync + Debug {
    /// Launch a new browser process
    async fn launch(&self) -> RenderResult<Box<dyn BrowserHandle>>;
}

/// A running browser process
#[async_trait]
pub trait BrowserHandle: Send + Sync + Debug {
    /// Whether the process is still reachable
    fn is_connected(&self) -> bool;

    /// Open a blank page
    async fn new_page(&self) -> RenderResult<Box<dyn CanvasPage>>;

    /// Terminate the process
    async fn close(&mut self) -> RenderResult<()>;
}

/// A page hosting the canvas runtime
#[async_trait]
pub trait CanvasPage: Send + Debug {
    /// Navigate to the baseline document
    async fn load_runtime(&mut self, source: &RuntimeSource) -> RenderResult<()>;

    /// Resize the viewport and the canvas
    async fn set_viewport(&mut self, viewport: Viewport) -> RenderResult<()>;

    /// Drop whatever the previous render left on the canvas
    async fn clear(&mut self) -> RenderResult<()>;

    /// Load a scene into the canvas runtime
    async fn load_scene(&mut self, scene: &SceneDescription) -> RenderResult<()>;

    /// Force a synchronous re-render
    async fn render_all(&mut self) -> RenderResult<()>;

    /// Export the canvas as PNG bytes
    async fn export_png(&mut self) -> RenderResult<Vec<u8>>;

    /// Close the page
    async fn close(self: Box<Self>) -> RenderResult<()>;
}

/// Launcher used when the crate is built without the `browser` feature
#[derive(Debug, Default)]
pub struct UnavailableLauncher;

#[async_trait]
impl BrowserLauncher for UnavailableLauncher {
    async fn launch(&self) -> RenderResult<Box<dyn BrowserHandle>> {
        Err(RenderError::browser_launch(
            "Browser feature not enabled. Enable 'browser' feature for real CDP support.",
        ))
    }
}

/// Default launcher for this build
#[cfg(feature = "browser")]
#[must_use]
pub fn default_launcher(config: &BrowserConfig) -> Arc<dyn BrowserLauncher> {
    Arc::new(CdpLauncher::new(config.clone()))
}

/// Default launcher for this build
#[cfg(not(feature = "browser"))]
#[must_use]
pub fn default_launcher(_config: &BrowserConfig) -> Arc<dyn BrowserLauncher> {
    Arc::new(UnavailableLauncher)
}

/// Stage of a runtime call, used to classify in-page failures
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RuntimeStage {
    Resize,
    Clear,
    Load,
    Render,
    Export,
}

/// Envelope returned by every in-page runtime call
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
#[derive(Debug, Deserialize)]
pub(crate) struct RuntimeReply {
    ok: bool,
    #[serde(default)]
    uninitialized: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    value: Option<serde_json::Value>,
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
impl RuntimeReply {
    pub(crate) fn into_result(self, stage: RuntimeStage) -> RenderResult<serde_json::Value> {
        if self.uninitialized {
            return Err(RenderError::RuntimeUninitialized);
        }
        if self.ok {
            return Ok(self.value.unwrap_or(serde_json::Value::Null));
        }
        let message = self
            .error
            .unwrap_or_else(|| "unknown runtime error".to_string());
        Err(match stage {
            RuntimeStage::Load => RenderError::scene_load(message),
            _ => RenderError::page(format!("{stage:?} failed: {message}")),
        })
    }
}

/// Decode a `data:image/png;base64,...` URL
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn decode_png_data_url(url: &str) -> RenderResult<Vec<u8>> {
    use base64::Engine;

    let payload = url
        .strip_prefix("data:image/png;base64,")
        .ok_or_else(|| RenderError::page("canvas export did not return a PNG data URL"))?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| RenderError::page(format!("invalid canvas export: {e}")))?;
    if bytes.is_empty() {
        return Err(RenderError::page("canvas export was empty"));
    }
    Ok(bytes)
}
