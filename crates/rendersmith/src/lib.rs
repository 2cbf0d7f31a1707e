//! Rendersmith: headless rendering of canvas scenes and video compositions
//!
//! Turns declarative scene documents into images by driving a canvas runtime
//! inside a pooled headless Chromium, and renders named video compositions
//! from a bundle that is built once per process.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                          RenderService                            │
//! ├───────────────────────────────────────────────────────────────────┤
//! │  render_image ─┐                                                  │
//! │                ├─► CanvasRenderer ──► BrowserPool ──► Chromium    │
//! │  render_batch ─┴─► BatchCoordinator       (pages)       (CDP)     │
//! │                         │                                         │
//! │                         └──► ImageOptimizer (png / jpeg)          │
//! │                                                                   │
//! │  render_video ───► VideoRenderer ──► VideoBundleCache ──► Bundler │
//! │                         │              (single-flight)            │
//! │                         └──► CompositionRenderer                  │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The pool and the bundle cache are the only state shared between
//! requests. Both are owned by [`RenderService`].

#![warn(missing_docs)]

mod batch;
pub mod browser;
mod canvas;
mod config;
mod optimizer;
mod result;
mod scene;
mod service;

/// In-process fake backends for tests and local development
pub mod mock;

/// Video composition bundling and rendering
pub mod video;

pub use batch::{scoped_to_item, BatchCoordinator, BatchEntry};
pub use browser::{BrowserPool, PoolStats, PooledPage, RuntimeSource, Viewport};
pub use canvas::{CanvasRenderer, DEVICE_SCALE_FACTOR};
pub use config::{
    BrowserConfig, ServiceConfig, VideoConfig, DEFAULT_DIMENSION, DEFAULT_MAX_BATCH_ITEMS,
    DEFAULT_MAX_IDLE_PAGES,
};
pub use optimizer::{ImageFormat, ImageOptimizer, DEFAULT_QUALITY};
pub use result::{ErrorKind, RenderError, RenderResult};
pub use scene::{
    validate_dimensions, validate_quality, RenderOutcome, RenderRequest, SceneDescription,
};
pub use service::{RenderService, RenderedImage};
pub use video::{Codec, CompositionId, VideoCompositionRequest, COMPOSITION_ALLOWLIST};
