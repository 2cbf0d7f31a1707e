//! Bundler and renderer backed by the composition project's command-line
//! tooling (`npx remotion ...`).

use super::{
    BundleLocation, Bundler, Codec, CompositionId, CompositionMetadata, CompositionRenderer,
    TempArtifact,
};
use crate::result::{RenderError, RenderResult};
use async_trait::async_trait;
use serde_json::Value;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};

/// Longest stderr excerpt carried in an error
const STDERR_TAIL: usize = 2000;

fn tail(text: &str) -> &str {
    let start = text.len().saturating_sub(STDERR_TAIL);
    let start = (start..text.len())
        .find(|i| text.is_char_boundary(*i))
        .unwrap_or(text.len());
    text[start..].trim()
}

/// Run the tooling and return stdout, mapping failure through `error`
async fn run<I, S>(
    program: &str,
    project_dir: &Path,
    args: I,
    error: fn(String) -> RenderError,
) -> RenderResult<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let started = Instant::now();
    let mut command = Command::new(program);
    command
        .arg("remotion")
        .args(args)
        .current_dir(project_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    debug!(?command, "running composition tooling");

    let output = command
        .output()
        .await
        .map_err(|e| error(format!("failed to spawn {program}: {e}")))?;

    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        warn!(
            status = %output.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            stderr = tail(&stderr),
            "composition tooling failed"
        );
        return Err(error(format!(
            "{program} exited with {}: {}",
            output.status,
            tail(&stderr)
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Write `props` to a scratch JSON file for the tooling to read
async fn write_props(dir: &Path, props: &Value) -> RenderResult<TempArtifact> {
    let file = TempArtifact::new(dir, "props", "json");
    tokio::fs::write(file.path(), serde_json::to_vec(props)?).await?;
    Ok(file)
}

/// Find `id` in the table printed by `remotion compositions`.
///
/// Rows look like `ServiceHero   30   1920x1080   300 (10.00 sec)`.
#[must_use]
pub fn parse_composition_listing(stdout: &str, id: &str) -> Option<CompositionMetadata> {
    stdout.lines().find_map(|line| {
        let mut cols = line.split_whitespace();
        if cols.next()? != id {
            return None;
        }
        let fps = cols.next()?.parse().ok()?;
        let (width, height) = cols.next()?.split_once('x')?;
        let duration_in_frames = cols.next()?.parse().ok()?;
        Some(CompositionMetadata {
            id: id.to_string(),
            duration_in_frames,
            fps,
            width: width.parse().ok()?,
            height: height.parse().ok()?,
        })
    })
}

/// Builds the project with `remotion bundle`
#[derive(Debug, Clone)]
pub struct CommandBundler {
    program: String,
    project_dir: PathBuf,
    entry_point: String,
}

impl CommandBundler {
    /// Create a bundler for the project at `project_dir`
    #[must_use]
    pub fn new(
        program: impl Into<String>,
        project_dir: impl Into<PathBuf>,
        entry_point: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            project_dir: project_dir.into(),
            entry_point: entry_point.into(),
        }
    }
}

#[async_trait]
impl Bundler for CommandBundler {
    async fn build(&self, out_dir: &Path) -> RenderResult<BundleLocation> {
        run(
            &self.program,
            &self.project_dir,
            [
                OsStr::new("bundle"),
                OsStr::new(&self.entry_point),
                OsStr::new("--out-dir"),
                out_dir.as_os_str(),
            ],
            RenderError::bundle,
        )
        .await?;
        Ok(BundleLocation::new(out_dir.display().to_string()))
    }
}

/// Selects and renders compositions with `remotion compositions` and
/// `remotion render`
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: String,
    project_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl CommandRenderer {
    /// Create a renderer; props files are written to `scratch_dir`
    #[must_use]
    pub fn new(
        program: impl Into<String>,
        project_dir: impl Into<PathBuf>,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            project_dir: project_dir.into(),
            scratch_dir: scratch_dir.into(),
        }
    }
}

#[async_trait]
impl CompositionRenderer for CommandRenderer {
    async fn select_composition(
        &self,
        bundle: &BundleLocation,
        id: &CompositionId,
        input_props: &Value,
    ) -> RenderResult<CompositionMetadata> {
        let props = write_props(&self.scratch_dir, input_props).await?;
        let listed = run(
            &self.program,
            &self.project_dir,
            [
                "compositions".to_string(),
                bundle.as_str().to_string(),
                format!("--props={}", props.path().display()),
            ],
            RenderError::video_render,
        )
        .await;
        props.cleanup().await;

        parse_composition_listing(&listed?, id.as_str()).ok_or_else(|| {
            RenderError::video_render(format!("composition {id} not found in bundle"))
        })
    }

    async fn render_media(
        &self,
        bundle: &BundleLocation,
        metadata: &CompositionMetadata,
        input_props: &Value,
        codec: Codec,
        output: &Path,
    ) -> RenderResult<()> {
        let props = write_props(&self.scratch_dir, input_props).await?;
        let rendered = run(
            &self.program,
            &self.project_dir,
            [
                "render".to_string(),
                bundle.as_str().to_string(),
                metadata.id.clone(),
                output.display().to_string(),
                format!("--props={}", props.path().display()),
                format!("--codec={codec}"),
            ],
            RenderError::video_render,
        )
        .await;
        props.cleanup().await;
        rendered.map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const LISTING: &str = "\
The following compositions are available:

BrandedStatic    30      1080x1080      150 (5.00 sec)
ServiceHero      29.97   1920x1080      300 (10.01 sec)
";

    #[test]
    fn test_parse_listing_finds_row() {
        let meta = parse_composition_listing(LISTING, "ServiceHero").unwrap();
        assert_eq!(meta.id, "ServiceHero");
        assert_eq!((meta.width, meta.height), (1920, 1080));
        assert_eq!(meta.duration_in_frames, 300);
        assert!((meta.fps - 29.97).abs() < 1e-9);
    }

    #[test]
    fn test_parse_listing_missing_row() {
        assert!(parse_composition_listing(LISTING, "Other").is_none());
        assert!(parse_composition_listing("", "ServiceHero").is_none());
        assert!(parse_composition_listing("ServiceHero 30 bad 10", "ServiceHero").is_none());
    }

    #[test]
    fn test_tail_keeps_end_of_long_output() {
        let long = format!("{}END", "x".repeat(5000));
        let t = tail(&long);
        assert!(t.len() <= STDERR_TAIL);
        assert!(t.ends_with("END"));
        assert_eq!(tail("  short \n"), "short");
    }

    #[tokio::test]
    async fn test_missing_program_is_bundle_error() {
        let dir = tempfile::tempdir().unwrap();
        let bundler = CommandBundler::new(
            "rendersmith-no-such-program",
            dir.path(),
            "src/index.ts",
        );
        let err = bundler.build(dir.path()).await.unwrap_err();
        assert!(matches!(err, RenderError::Bundle { .. }));
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[tokio::test]
    async fn test_props_file_removed_after_failed_select() {
        let scratch = tempfile::tempdir().unwrap();
        let renderer = CommandRenderer::new(
            "rendersmith-no-such-program",
            scratch.path(),
            scratch.path(),
        );
        let id = CompositionId::parse("ServiceHero").unwrap();

        let err = renderer
            .select_composition(&BundleLocation::new("/nowhere"), &id, &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::VideoRender { .. }));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }
}
