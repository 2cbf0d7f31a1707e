//! Chromium over CDP, via chromiumoxide.

use super::{
    decode_png_data_url, BrowserHandle, BrowserLauncher, CanvasPage, RuntimeReply, RuntimeSource,
    RuntimeStage, Viewport,
};
use crate::config::BrowserConfig;
use crate::result::{RenderError, RenderResult};
use crate::scene::SceneDescription;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::debug;

/// Launches Chromium with the configured flags
#[derive(Debug, Clone)]
pub struct CdpLauncher {
    config: BrowserConfig,
}

impl CdpLauncher {
    /// Create a launcher for `config`
    #[must_use]
    pub const fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for CdpLauncher {
    async fn launch(&self) -> RenderResult<Box<dyn BrowserHandle>> {
        let mut builder = CdpConfig::builder();

        if !self.config.headless {
            builder = builder.with_head();
        }

        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }

        if let Some(ref path) = self.config.chromium_path {
            builder = builder.chrome_executable(path);
        }

        let cdp_config = builder.build().map_err(RenderError::browser_launch)?;

        let (browser, mut handler) = Browser::launch(cdp_config)
            .await
            .map_err(|e| RenderError::browser_launch(e.to_string()))?;

        // The handler stream drives the websocket; it ends when the browser goes away.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            debug!("CDP handler finished");
        });

        Ok(Box::new(CdpBrowser { browser, handler }))
    }
}

#[derive(Debug)]
struct CdpBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

#[async_trait]
impl BrowserHandle for CdpBrowser {
    fn is_connected(&self) -> bool {
        !self.handler.is_finished()
    }

    async fn new_page(&self) -> RenderResult<Box<dyn CanvasPage>> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::page(e.to_string()))?;
        Ok(Box::new(CdpPage { page }))
    }

    async fn close(&mut self) -> RenderResult<()> {
        let closed = self.browser.close().await;
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "waiting for browser exit failed");
        }
        self.handler.abort();
        closed
            .map(|_| ())
            .map_err(|e| RenderError::browser_launch(e.to_string()))
    }
}

#[derive(Debug)]
struct CdpPage {
    page: Page,
}

/// Wrap a runtime call so every outcome comes back as a [`RuntimeReply`]
fn runtime_script(call: &str) -> String {
    format!(
        "(async () => {{\
            const rt = window.__rendersmith;\
            if (!rt) {{ return {{ ok: false, uninitialized: true }}; }}\
            try {{\
                const value = await ({call});\
                return {{ ok: true, value: value === undefined ? null : value }};\
            }} catch (err) {{\
                return {{ ok: false, error: String((err && err.message) || err) }};\
            }}\
        }})()"
    )
}

impl CdpPage {
    async fn call_runtime(&self, stage: RuntimeStage, call: &str) -> RenderResult<Value> {
        let params = EvaluateParams::builder()
            .expression(runtime_script(call))
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(RenderError::page)?;

        let reply: RuntimeReply = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| RenderError::page(e.to_string()))?
            .into_value()
            .map_err(|e| RenderError::page(format!("malformed runtime reply: {e}")))?;

        reply.into_result(stage)
    }
}

#[async_trait]
impl CanvasPage for CdpPage {
    async fn load_runtime(&mut self, source: &RuntimeSource) -> RenderResult<()> {
        match source {
            RuntimeSource::Html(html) => {
                self.page
                    .set_content(html)
                    .await
                    .map_err(|e| RenderError::page(format!("loading runtime page: {e}")))?;
            }
            RuntimeSource::Url(url) => {
                self.page
                    .goto(url.as_str())
                    .await
                    .map_err(|e| RenderError::page(format!("navigating to {url}: {e}")))?;
            }
        }
        Ok(())
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> RenderResult<()> {
        let metrics = SetDeviceMetricsOverrideParams::new(
            i64::from(viewport.width),
            i64::from(viewport.height),
            viewport.device_scale_factor,
            false,
        );
        self.page
            .execute(metrics)
            .await
            .map_err(|e| RenderError::page(e.to_string()))?;

        self.call_runtime(
            RuntimeStage::Resize,
            &format!("rt.resize({}, {})", viewport.width, viewport.height),
        )
        .await
        .map(|_| ())
    }

    async fn clear(&mut self) -> RenderResult<()> {
        self.call_runtime(RuntimeStage::Clear, "rt.clear()")
            .await
            .map(|_| ())
    }

    async fn load_scene(&mut self, scene: &SceneDescription) -> RenderResult<()> {
        let json = serde_json::to_string(scene)?;
        self.call_runtime(RuntimeStage::Load, &format!("rt.load({json})"))
            .await
            .map(|_| ())
    }

    async fn render_all(&mut self) -> RenderResult<()> {
        self.call_runtime(RuntimeStage::Render, "rt.renderAll()")
            .await
            .map(|_| ())
    }

    async fn export_png(&mut self) -> RenderResult<Vec<u8>> {
        let value = self
            .call_runtime(RuntimeStage::Export, "rt.exportPng()")
            .await?;
        let url = value
            .as_str()
            .ok_or_else(|| RenderError::page("canvas export returned no data URL"))?;
        decode_png_data_url(url)
    }

    async fn close(self: Box<Self>) -> RenderResult<()> {
        self.page
            .close()
            .await
            .map_err(|e| RenderError::page(e.to_string()))
    }
}
