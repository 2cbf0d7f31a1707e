//! Single-flight cache for the composition bundle.
//!
//! The cache cell is one of three states:
//!
//! ```text
//! Idle ──warmup──► Building(shared future) ──ok──► Ready(bundle)
//!   ▲                      │
//!   └───────── err ────────┘
//! ```
//!
//! Every caller arriving while a build is running clones and awaits the same
//! shared future. A failed build is reported to all of them, after which the
//! cell goes back to `Idle` and the next `warmup` starts a fresh attempt.

use super::{BundleLocation, Bundler};
use crate::result::{RenderError, RenderResult};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{info, warn};

/// A built composition bundle. Its directory is removed when the last
/// reference is dropped.
pub struct Bundle {
    location: BundleLocation,
    dir: TempDir,
}

impl Bundle {
    /// Where the renderer should load the bundle from
    #[must_use]
    pub const fn location(&self) -> &BundleLocation {
        &self.location
    }

    /// Directory holding the bundle
    #[must_use]
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }
}

impl fmt::Debug for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("location", &self.location)
            .field("dir", &self.dir.path())
            .finish()
    }
}

type BuildOutcome = Result<Arc<Bundle>, Arc<RenderError>>;
type BuildFuture = Shared<BoxFuture<'static, BuildOutcome>>;

enum BundleState {
    Idle,
    Building { attempt: u64, build: BuildFuture },
    Ready(Arc<Bundle>),
}

/// Builds the bundle at most once at a time and memoises the result
pub struct VideoBundleCache {
    bundler: Arc<dyn Bundler>,
    timeout: Duration,
    state: Mutex<BundleState>,
    attempts: AtomicU64,
}

impl fmt::Debug for VideoBundleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoBundleCache")
            .field("bundler", &self.bundler)
            .field("timeout", &self.timeout)
            .field("ready", &self.is_ready())
            .field("attempts", &self.attempts)
            .finish()
    }
}

impl VideoBundleCache {
    /// Create an empty cache; nothing is built until the first warmup
    #[must_use]
    pub fn new(bundler: Arc<dyn Bundler>, timeout: Duration) -> Self {
        Self {
            bundler,
            timeout,
            state: Mutex::new(BundleState::Idle),
            attempts: AtomicU64::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, BundleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the bundle, building it first if needed.
    ///
    /// Concurrent callers share one build. The build runs on its own task, so
    /// a caller that gives up waiting does not cancel it for the others.
    pub async fn warmup(&self) -> RenderResult<Arc<Bundle>> {
        let (attempt, build) = {
            let mut state = self.state();
            match &*state {
                BundleState::Ready(bundle) => return Ok(Arc::clone(bundle)),
                BundleState::Building { attempt, build } => (*attempt, build.clone()),
                BundleState::Idle => {
                    let attempt = self.attempts.fetch_add(1, Ordering::AcqRel) + 1;
                    let build = self.spawn_build(attempt);
                    *state = BundleState::Building {
                        attempt,
                        build: build.clone(),
                    };
                    (attempt, build)
                }
            }
        };

        let outcome = build.await;

        let mut state = self.state();
        let current = matches!(&*state, BundleState::Building { attempt: a, .. } if *a == attempt);
        match outcome {
            Ok(bundle) => {
                if current {
                    *state = BundleState::Ready(Arc::clone(&bundle));
                }
                Ok(bundle)
            }
            Err(err) => {
                if current {
                    *state = BundleState::Idle;
                }
                Err(replay(&err))
            }
        }
    }

    fn spawn_build(&self, attempt: u64) -> BuildFuture {
        let bundler = Arc::clone(&self.bundler);
        let timeout = self.timeout;
        let task = tokio::spawn(build_bundle(bundler, timeout, attempt));
        async move {
            match task.await {
                Ok(outcome) => outcome.map_err(Arc::new),
                Err(e) => Err(Arc::new(RenderError::bundle(format!(
                    "build task failed: {e}"
                )))),
            }
        }
        .boxed()
        .shared()
    }

    /// Whether a built bundle is memoised
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(&*self.state(), BundleState::Ready(_))
    }

    /// Number of builds started so far
    #[must_use]
    pub fn builds_started(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Forget the memoised bundle. Its directory goes away once in-flight
    /// renders holding it finish.
    pub fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.state(), BundleState::Idle);
        if let BundleState::Ready(bundle) = previous {
            info!(dir = %bundle.dir().display(), "releasing video bundle");
        }
    }
}

async fn build_bundle(
    bundler: Arc<dyn Bundler>,
    timeout: Duration,
    attempt: u64,
) -> RenderResult<Arc<Bundle>> {
    let dir = tempfile::Builder::new()
        .prefix("rendersmith-bundle-")
        .tempdir()?;
    let started = Instant::now();
    info!(attempt, dir = %dir.path().display(), "building video bundle");

    let location = match tokio::time::timeout(timeout, bundler.build(dir.path())).await {
        Ok(Ok(location)) => location,
        Ok(Err(e)) => {
            warn!(attempt, error = %e, "video bundle build failed");
            return Err(e);
        }
        Err(_) => {
            warn!(attempt, timeout_ms = timeout.as_millis() as u64, "video bundle build timed out");
            return Err(RenderError::timeout("video bundle build", timeout));
        }
    };

    info!(
        attempt,
        elapsed_ms = started.elapsed().as_millis() as u64,
        location = location.as_str(),
        "video bundle ready"
    );
    Ok(Arc::new(Bundle { location, dir }))
}

/// Rebuild a shared build error for one waiter
fn replay(err: &RenderError) -> RenderError {
    match err {
        RenderError::Timeout { operation, ms } => RenderError::Timeout {
            operation: operation.clone(),
            ms: *ms,
        },
        RenderError::Bundle { message } => RenderError::bundle(message.clone()),
        other => RenderError::bundle(other.to_string()),
    }
}
