//! CLI command definitions using clap

use clap::{Args, Parser, Subcommand, ValueEnum};
use rendersmith::Codec;
use std::path::PathBuf;

/// Rendersmith: headless canvas and video rendering service
#[derive(Parser, Debug)]
#[command(name = "rendersmith")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "compact",
        env = "RENDERSMITH_LOG_FORMAT",
        global = true
    )]
    pub log_format: LogFormat,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP rendering service
    Serve(ServeArgs),

    /// Render one video composition to a file
    Video(VideoArgs),
}

/// Log output format
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Compact,
    /// One JSON object per event
    Json,
}

/// Video project options shared by `serve` and `video`
#[derive(Args, Debug, Clone)]
pub struct VideoOptions {
    /// Composition project directory
    #[arg(long, default_value = "video", env = "RENDERSMITH_VIDEO_PROJECT")]
    pub video_project: PathBuf,

    /// Project entry point, relative to the project directory
    #[arg(long, default_value = "src/index.ts", env = "RENDERSMITH_VIDEO_ENTRY")]
    pub video_entry: String,

    /// Program used to run the composition tooling
    #[arg(long, default_value = "npx", env = "RENDERSMITH_VIDEO_TOOL")]
    pub video_tool: String,

    /// Directory for per-render scratch files (default: system temp dir)
    #[arg(long, env = "RENDERSMITH_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Bundle build timeout in seconds
    #[arg(long, default_value = "300", env = "RENDERSMITH_BUNDLE_TIMEOUT")]
    pub bundle_timeout_secs: u64,

    /// Video render timeout in seconds
    #[arg(long, default_value = "600", env = "RENDERSMITH_VIDEO_TIMEOUT")]
    pub video_timeout_secs: u64,
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0", env = "RENDERSMITH_HOST")]
    pub host: String,

    /// HTTP port to listen on
    #[arg(short, long, default_value = "3100", env = "RENDERSMITH_PORT")]
    pub port: u16,

    /// Shared secret expected in the `x-api-key` header (unset: no auth)
    #[arg(long, env = "RENDER_SERVICE_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Path to the Chromium binary (default: auto-detect)
    #[arg(long, env = "CHROMIUM_PATH")]
    pub chromium_path: Option<String>,

    /// Disable the Chromium sandbox (containers, CI)
    #[arg(long)]
    pub no_sandbox: bool,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headful: bool,

    /// Load the canvas runtime page from this URL instead of the bundled page.
    /// The bundled page fetches Fabric.js from cdn.jsdelivr.net; set this on
    /// hosts without outbound access.
    #[arg(long, env = "RENDERSMITH_RUNTIME_URL")]
    pub runtime_url: Option<String>,

    /// Idle pages kept for reuse
    #[arg(long, default_value = "4", env = "RENDERSMITH_MAX_IDLE_PAGES")]
    pub max_idle_pages: usize,

    /// Largest accepted batch
    #[arg(long, default_value = "24", env = "RENDERSMITH_MAX_BATCH")]
    pub max_batch: usize,

    /// Largest accepted width or height
    #[arg(long, default_value = "4096", env = "RENDERSMITH_MAX_DIMENSION")]
    pub max_dimension: u32,

    /// Single render timeout in seconds
    #[arg(long, default_value = "30", env = "RENDERSMITH_RENDER_TIMEOUT")]
    pub render_timeout_secs: u64,

    /// Build the video bundle at startup instead of on first request
    #[arg(long)]
    pub warmup_video: bool,

    /// Allow cross-origin requests
    #[arg(long)]
    pub cors: bool,

    /// Video project options
    #[command(flatten)]
    pub video: VideoOptions,
}

/// Arguments for the video command
#[derive(Parser, Debug)]
pub struct VideoArgs {
    /// Composition to render (BrandedStatic or ServiceHero)
    pub composition_id: String,

    /// JSON file with the composition's input properties
    pub props: PathBuf,

    /// Where to write the rendered video
    pub output: PathBuf,

    /// Output codec (h264, h265, vp8, vp9, prores)
    #[arg(long, default_value = "h264")]
    pub codec: Codec,

    /// Video project options
    #[command(flatten)]
    pub video: VideoOptions,
}
