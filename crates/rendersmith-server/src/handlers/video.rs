//! `rendersmith video`: render one composition to a file without the HTTP layer

use crate::commands::VideoArgs;
use crate::error::{CliError, CliResult};
use rendersmith::{RenderService, ServiceConfig, VideoCompositionRequest};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Build a video request from command arguments.
///
/// The composition id is checked before the props file is touched.
pub fn load_request(args: &VideoArgs) -> CliResult<VideoCompositionRequest> {
    rendersmith::CompositionId::parse(&args.composition_id)?;

    let raw = std::fs::read_to_string(&args.props).map_err(|e| {
        CliError::config(format!("cannot read props file {}: {e}", args.props.display()))
    })?;
    let props: Value = serde_json::from_str(&raw).map_err(|e| {
        CliError::config(format!("props file {} is not JSON: {e}", args.props.display()))
    })?;

    Ok(VideoCompositionRequest::new(&args.composition_id, props)?.with_codec(args.codec))
}

/// Render a composition and write it to `output`.
///
/// Returns the number of bytes written. Nothing is written on failure.
pub async fn render_to_file(
    service: &RenderService,
    request: &VideoCompositionRequest,
    output: &Path,
) -> CliResult<usize> {
    let bytes = service.render_video(request).await?;
    tokio::fs::write(output, &bytes).await?;
    info!(
        composition_id = %request.composition_id,
        output = %output.display(),
        size_bytes = bytes.len(),
        "video written"
    );
    Ok(bytes.len())
}

/// Entry point for the `video` command
pub async fn run_video(args: &VideoArgs) -> CliResult<()> {
    let request = load_request(args)?;
    let config = ServiceConfig::default().with_video(args.video.to_video_config());
    let service = RenderService::new(config);
    let result = render_to_file(&service, &request, &args.output).await;
    service.shutdown().await;

    let size = result?;
    eprintln!("Wrote {} ({size} bytes)", args.output.display());
    Ok(())
}
