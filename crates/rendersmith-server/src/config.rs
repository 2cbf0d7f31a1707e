//! Server configuration assembled from command-line arguments

use crate::commands::{ServeArgs, VideoOptions};
use crate::error::{CliError, CliResult};
use rendersmith::{BrowserConfig, ServiceConfig, VideoConfig};
use std::net::SocketAddr;
use std::time::Duration;

impl VideoOptions {
    /// Video pipeline configuration for these options
    #[must_use]
    pub fn to_video_config(&self) -> VideoConfig {
        let mut config = VideoConfig::default()
            .with_project_dir(&self.video_project)
            .with_entry_point(&self.video_entry)
            .with_bundle_timeout(Duration::from_secs(self.bundle_timeout_secs))
            .with_render_timeout(Duration::from_secs(self.video_timeout_secs));
        config.tool_program.clone_from(&self.video_tool);
        if let Some(dir) = &self.scratch_dir {
            config = config.with_output_dir(dir);
        }
        config
    }
}

/// Everything the `serve` command needs
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    pub addr: SocketAddr,
    /// Expected `x-api-key`; `None` disables authentication
    pub api_key: Option<String>,
    /// Build the video bundle at startup
    pub warmup_video: bool,
    /// Allow cross-origin requests
    pub cors: bool,
    /// Rendering engine configuration
    pub service: ServiceConfig,
}

impl ServerConfig {
    /// Build and validate configuration from `serve` arguments
    pub fn from_args(args: &ServeArgs) -> CliResult<Self> {
        let addr: SocketAddr = format!("{}:{}", args.host, args.port)
            .parse()
            .map_err(|e| CliError::config(format!("invalid bind address: {e}")))?;

        if args.max_batch == 0 {
            return Err(CliError::config("--max-batch must be at least 1"));
        }
        if args.max_dimension == 0 {
            return Err(CliError::config("--max-dimension must be at least 1"));
        }
        if args.render_timeout_secs == 0 {
            return Err(CliError::config("--render-timeout-secs must be at least 1"));
        }

        let mut browser = BrowserConfig::default();
        browser.headless = !args.headful;
        if args.no_sandbox {
            browser = browser.with_no_sandbox();
        }
        if let Some(path) = &args.chromium_path {
            browser = browser.with_chromium_path(path);
        }
        if let Some(url) = &args.runtime_url {
            browser = browser.with_runtime_url(url);
        }

        let service = ServiceConfig::new()
            .with_browser(browser)
            .with_max_idle_pages(args.max_idle_pages)
            .with_max_batch_items(args.max_batch)
            .with_max_dimension(args.max_dimension)
            .with_render_timeout(Duration::from_secs(args.render_timeout_secs))
            .with_video(args.video.to_video_config());

        // An empty secret would accept an empty header; treat it as unset.
        let api_key = args.api_key.clone().filter(|key| !key.is_empty());

        Ok(Self {
            addr,
            api_key,
            warmup_video: args.warmup_video,
            cors: args.cors,
            service,
        })
    }
}
