//! In-process fakes for the browser and video backends.
//!
//! These let the pool, renderers and HTTP surface be exercised without a
//! Chromium binary or a composition toolchain. The fake page rasterises a
//! solid image of the requested size and rejects any scene that is not a JSON
//! object, mirroring how the real canvas runtime refuses such documents.

use crate::browser::{BrowserHandle, BrowserLauncher, CanvasPage, RuntimeSource, Viewport};
use crate::result::{RenderError, RenderResult};
use crate::scene::SceneDescription;
use crate::video::{
    BundleLocation, Bundler, Codec, CompositionId, CompositionMetadata, CompositionRenderer,
};
use async_trait::async_trait;
use image::{DynamicImage, Rgba, RgbaImage};
use serde_json::Value;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct LauncherState {
    launches: AtomicU64,
    pages_created: AtomicU64,
    pages_closed: AtomicU64,
    browsers_closed: AtomicU64,
    fail_launch: AtomicBool,
    fail_navigation: AtomicBool,
    runtime_missing: AtomicBool,
    fail_exports: AtomicBool,
    render_delay_ms: AtomicU64,
    connections: Mutex<Vec<Arc<AtomicBool>>>,
}

/// Launcher producing fake browsers
#[derive(Debug, Clone, Default)]
pub struct MockLauncher {
    state: Arc<LauncherState>,
}

impl MockLauncher {
    /// Create a new mock launcher
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent launches fail
    pub fn fail_launches(&self, fail: bool) {
        self.state.fail_launch.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent page navigations fail
    pub fn fail_navigation(&self, fail: bool) {
        self.state.fail_navigation.store(fail, Ordering::SeqCst);
    }

    /// Serve a baseline document without the canvas runtime
    pub fn runtime_missing(&self, missing: bool) {
        self.state.runtime_missing.store(missing, Ordering::SeqCst);
    }

    /// Make subsequent exports fail as if the page had crashed
    pub fn fail_exports(&self, fail: bool) {
        self.state.fail_exports.store(fail, Ordering::SeqCst);
    }

    /// Delay every scene load
    pub fn render_delay(&self, delay: Duration) {
        self.state
            .render_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Mark every launched browser as crashed
    pub fn disconnect_all(&self) {
        let connections = self
            .state
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for connected in connections.iter() {
            connected.store(false, Ordering::SeqCst);
        }
    }

    /// Browsers launched
    #[must_use]
    pub fn launches(&self) -> u64 {
        self.state.launches.load(Ordering::SeqCst)
    }

    /// Pages opened
    #[must_use]
    pub fn pages_created(&self) -> u64 {
        self.state.pages_created.load(Ordering::SeqCst)
    }

    /// Pages closed
    #[must_use]
    pub fn pages_closed(&self) -> u64 {
        self.state.pages_closed.load(Ordering::SeqCst)
    }

    /// Browsers closed
    #[must_use]
    pub fn browsers_closed(&self) -> u64 {
        self.state.browsers_closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self) -> RenderResult<Box<dyn BrowserHandle>> {
        if self.state.fail_launch.load(Ordering::SeqCst) {
            return Err(RenderError::browser_launch("mock launch failure"));
        }
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        let connected = Arc::new(AtomicBool::new(true));
        self.state
            .connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&connected));
        Ok(Box::new(MockBrowser {
            state: Arc::clone(&self.state),
            connected,
        }))
    }
}

#[derive(Debug)]
struct MockBrowser {
    state: Arc<LauncherState>,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl BrowserHandle for MockBrowser {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn new_page(&self) -> RenderResult<Box<dyn CanvasPage>> {
        if !self.is_connected() {
            return Err(RenderError::page("browser disconnected"));
        }
        self.state.pages_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockPage {
            state: Arc::clone(&self.state),
            connected: Arc::clone(&self.connected),
            runtime_ready: false,
            viewport: None,
            scene: None,
        }))
    }

    async fn close(&mut self) -> RenderResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.state.browsers_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
struct MockPage {
    state: Arc<LauncherState>,
    connected: Arc<AtomicBool>,
    runtime_ready: bool,
    viewport: Option<Viewport>,
    scene: Option<Value>,
}

impl MockPage {
    fn ensure_runtime(&self) -> RenderResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(RenderError::page("target closed"));
        }
        if self.runtime_ready {
            Ok(())
        } else {
            Err(RenderError::RuntimeUninitialized)
        }
    }
}

/// Fill colour taken from a scene's `background` field, grey otherwise
fn background(scene: &Value) -> Rgba<u8> {
    let hex = scene
        .get("background")
        .and_then(Value::as_str)
        .and_then(|s| s.strip_prefix('#'))
        .filter(|s| s.len() == 6 && s.is_ascii());
    let channel = |hex: &str, i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(128);
    hex.map_or(Rgba([128, 128, 128, 255]), |hex| {
        Rgba([channel(hex, 0), channel(hex, 2), channel(hex, 4), 255])
    })
}

#[async_trait]
impl CanvasPage for MockPage {
    async fn load_runtime(&mut self, _source: &RuntimeSource) -> RenderResult<()> {
        if self.state.fail_navigation.load(Ordering::SeqCst) {
            return Err(RenderError::page("mock navigation failure"));
        }
        self.runtime_ready = !self.state.runtime_missing.load(Ordering::SeqCst);
        Ok(())
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> RenderResult<()> {
        self.ensure_runtime()?;
        self.viewport = Some(viewport);
        Ok(())
    }

    async fn clear(&mut self) -> RenderResult<()> {
        self.ensure_runtime()?;
        self.scene = None;
        Ok(())
    }

    async fn load_scene(&mut self, scene: &SceneDescription) -> RenderResult<()> {
        self.ensure_runtime()?;
        let delay = self.state.render_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if !scene.is_object() {
            return Err(RenderError::scene_load("scene must be a JSON object"));
        }
        self.scene = Some(scene.as_value().clone());
        Ok(())
    }

    async fn render_all(&mut self) -> RenderResult<()> {
        self.ensure_runtime()
    }

    async fn export_png(&mut self) -> RenderResult<Vec<u8>> {
        self.ensure_runtime()?;
        if self.state.fail_exports.load(Ordering::SeqCst) {
            return Err(RenderError::page("mock page crashed"));
        }
        let viewport = self
            .viewport
            .ok_or_else(|| RenderError::page("viewport not set"))?;
        let scene = self
            .scene
            .as_ref()
            .ok_or_else(|| RenderError::page("no scene loaded"))?;

        let scale = viewport.device_scale_factor;
        let width = (f64::from(viewport.width) * scale).round() as u32;
        let height = (f64::from(viewport.height) * scale).round() as u32;
        let canvas = RgbaImage::from_pixel(width, height, background(scene));

        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| RenderError::image_processing(e.to_string()))?;
        Ok(out.into_inner())
    }

    async fn close(self: Box<Self>) -> RenderResult<()> {
        self.state.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Bundler that writes a marker file instead of compiling a project
#[derive(Debug, Clone, Default)]
pub struct MockBundler {
    builds: Arc<AtomicUsize>,
    failures_left: Arc<AtomicUsize>,
    delay_ms: Arc<AtomicU64>,
}

impl MockBundler {
    /// Create a new mock bundler
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` builds
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Make every build take `delay`
    pub fn build_delay(&self, delay: Duration) {
        self.delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Builds started
    #[must_use]
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Bundler for MockBundler {
    async fn build(&self, out_dir: &Path) -> RenderResult<BundleLocation> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(RenderError::bundle("mock bundle failure"));
        }
        tokio::fs::write(out_dir.join("index.html"), "<html></html>").await?;
        Ok(BundleLocation::new(out_dir.display().to_string()))
    }
}

/// Composition renderer that writes a fixed payload
#[derive(Debug, Clone, Default)]
pub struct MockCompositionRenderer {
    fail: Arc<AtomicBool>,
    renders: Arc<AtomicUsize>,
    outputs: Arc<Mutex<Vec<PathBuf>>>,
}

/// Bytes written by [`MockCompositionRenderer`]
pub const MOCK_VIDEO_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42mock-video";

impl MockCompositionRenderer {
    /// Create a new mock renderer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail after creating the output file
    pub fn fail_renders(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Renders attempted
    #[must_use]
    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    /// Output paths handed to the renderer
    #[must_use]
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl CompositionRenderer for MockCompositionRenderer {
    async fn select_composition(
        &self,
        _bundle: &BundleLocation,
        id: &CompositionId,
        _input_props: &Value,
    ) -> RenderResult<CompositionMetadata> {
        Ok(CompositionMetadata {
            id: id.as_str().to_string(),
            duration_in_frames: 150,
            fps: 30.0,
            width: 1080,
            height: 1080,
        })
    }

    async fn render_media(
        &self,
        _bundle: &BundleLocation,
        _metadata: &CompositionMetadata,
        _input_props: &Value,
        _codec: Codec,
        output: &Path,
    ) -> RenderResult<()> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.outputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(output.to_path_buf());
        tokio::fs::write(output, MOCK_VIDEO_BYTES).await?;
        if self.fail.load(Ordering::SeqCst) {
            return Err(RenderError::video_render("mock encoder crashed"));
        }
        Ok(())
    }
}
