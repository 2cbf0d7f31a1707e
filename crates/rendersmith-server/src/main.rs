//! Rendersmith CLI
//!
//! ```bash
//! rendersmith serve                                   # HTTP service on :3100
//! rendersmith --log-format json serve --warmup-video  # JSON logs, eager bundle
//! rendersmith video BrandedStatic props.json out.mp4  # One-off video render
//! ```

use clap::Parser;
use rendersmith_server::{
    handlers, server, telemetry, Cli, CliError, CliResult, Commands, ServerConfig,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::server(format!("Failed to create runtime: {e}")))?;

    match cli.command {
        Commands::Serve(args) => {
            let config = ServerConfig::from_args(&args)?;
            rt.block_on(server::serve(config))
        }
        Commands::Video(args) => rt.block_on(handlers::run_video(&args)),
    }
}
