//! Rendersmith server: HTTP API and command-line entry points
//!
//! ```bash
//! rendersmith serve --port 3100                       # Run the HTTP service
//! rendersmith video ServiceHero props.json hero.mp4   # Render one composition
//! ```

#![warn(missing_docs)]

pub mod api;
pub mod auth;
mod commands;
mod config;
mod error;
pub mod handlers;
pub mod server;
pub mod telemetry;

pub use commands::{Cli, Commands, LogFormat, ServeArgs, VideoArgs, VideoOptions};
pub use config::ServerConfig;
pub use error::{CliError, CliResult};
