//! Service configuration

use std::path::PathBuf;
use std::time::Duration;

/// Default logical canvas edge when a request omits width or height
pub const DEFAULT_DIMENSION: u32 = 1080;

/// Default idle-page capacity of the browser pool
pub const DEFAULT_MAX_IDLE_PAGES: usize = 4;

/// Default maximum number of items in one batch request
pub const DEFAULT_MAX_BATCH_ITEMS: usize = 24;

/// Browser launch configuration
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Baseline document URL; `None` loads the bundled canvas runtime page
    pub runtime_url: Option<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            sandbox: true,
            runtime_url: None,
        }
    }
}

impl BrowserConfig {
    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }

    /// Load the baseline document from a URL instead of the bundled page
    #[must_use]
    pub fn with_runtime_url(mut self, url: impl Into<String>) -> Self {
        self.runtime_url = Some(url.into());
        self
    }
}

/// Video composition project configuration
#[derive(Debug, Clone)]
pub struct VideoConfig {
    /// Directory of the composition project
    pub project_dir: PathBuf,
    /// Entry point of the project, relative to `project_dir`
    pub entry_point: String,
    /// Program used to invoke the composition tooling
    pub tool_program: String,
    /// Directory receiving per-render temporary files
    pub output_dir: PathBuf,
    /// Deadline for the one-time bundle build
    pub bundle_timeout: Duration,
    /// Deadline for a single video render
    pub render_timeout: Duration,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("video"),
            entry_point: "src/index.ts".to_string(),
            tool_program: "npx".to_string(),
            output_dir: std::env::temp_dir(),
            bundle_timeout: Duration::from_secs(300),
            render_timeout: Duration::from_secs(600),
        }
    }
}

impl VideoConfig {
    /// Set the project directory
    #[must_use]
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = dir.into();
        self
    }

    /// Set the project entry point
    #[must_use]
    pub fn with_entry_point(mut self, entry: impl Into<String>) -> Self {
        self.entry_point = entry.into();
        self
    }

    /// Set the temporary output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the bundle build deadline
    #[must_use]
    pub const fn with_bundle_timeout(mut self, timeout: Duration) -> Self {
        self.bundle_timeout = timeout;
        self
    }

    /// Set the video render deadline
    #[must_use]
    pub const fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }
}

/// Rendersmith service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Browser launch options
    pub browser: BrowserConfig,
    /// Idle pages kept for reuse
    pub max_idle_pages: usize,
    /// Largest accepted logical width or height
    pub max_dimension: u32,
    /// Largest accepted batch
    pub max_batch_items: usize,
    /// Deadline for a single canvas render
    pub render_timeout: Duration,
    /// Video pipeline options
    pub video: VideoConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            max_idle_pages: DEFAULT_MAX_IDLE_PAGES,
            max_dimension: 4096,
            max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
            render_timeout: Duration::from_secs(30),
            video: VideoConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set browser options
    #[must_use]
    pub fn with_browser(mut self, browser: BrowserConfig) -> Self {
        self.browser = browser;
        self
    }

    /// Set the idle-page capacity
    #[must_use]
    pub const fn with_max_idle_pages(mut self, max: usize) -> Self {
        self.max_idle_pages = max;
        self
    }

    /// Set the largest accepted dimension
    #[must_use]
    pub const fn with_max_dimension(mut self, max: u32) -> Self {
        self.max_dimension = max;
        self
    }

    /// Set the largest accepted batch
    #[must_use]
    pub const fn with_max_batch_items(mut self, max: usize) -> Self {
        self.max_batch_items = max;
        self
    }

    /// Set the canvas render deadline
    #[must_use]
    pub const fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    /// Set video options
    #[must_use]
    pub fn with_video(mut self, video: VideoConfig) -> Self {
        self.video = video;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.max_idle_pages, 4);
        assert_eq!(config.max_batch_items, 24);
        assert_eq!(config.render_timeout, Duration::from_secs(30));
        assert!(config.browser.headless);
        assert!(config.browser.sandbox);
        assert!(config.browser.runtime_url.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let config = ServiceConfig::new()
            .with_max_idle_pages(2)
            .with_max_batch_items(10)
            .with_max_dimension(2048)
            .with_browser(
                BrowserConfig::default()
                    .with_no_sandbox()
                    .with_chromium_path("/usr/bin/chromium"),
            )
            .with_video(VideoConfig::default().with_entry_point("src/Root.tsx"));

        assert_eq!(config.max_idle_pages, 2);
        assert_eq!(config.max_batch_items, 10);
        assert_eq!(config.max_dimension, 2048);
        assert!(!config.browser.sandbox);
        assert_eq!(
            config.browser.chromium_path.as_deref(),
            Some("/usr/bin/chromium")
        );
        assert_eq!(config.video.entry_point, "src/Root.tsx");
    }
}
