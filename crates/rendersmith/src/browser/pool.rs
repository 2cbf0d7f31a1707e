//! Bounded pool of canvas pages backed by one shared browser process.
//!
//! The browser is launched lazily by the first [`BrowserPool::acquire`] that
//! finds no idle page, and relaunched when it reports itself disconnected.
//! Every relaunch bumps a generation counter; pages from an older generation
//! are never handed out again.

use super::{BrowserHandle, BrowserLauncher, CanvasPage, RuntimeSource};
use crate::result::RenderResult;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Snapshot of pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Pages waiting for reuse
    pub idle: usize,
    /// Idle-page capacity
    pub max_idle: usize,
    /// Browser processes launched so far
    pub launches: u64,
    /// Pages successfully created and navigated
    pub pages_created: u64,
}

#[derive(Debug)]
struct BrowserSlot {
    handle: Box<dyn BrowserHandle>,
    generation: u64,
}

#[derive(Debug)]
struct IdlePage {
    page: Box<dyn CanvasPage>,
    generation: u64,
}

struct PoolShared {
    launcher: Arc<dyn BrowserLauncher>,
    runtime: RuntimeSource,
    max_idle: usize,
    browser: tokio::sync::Mutex<Option<BrowserSlot>>,
    idle: Mutex<Vec<IdlePage>>,
    generation: AtomicU64,
    launches: AtomicU64,
    pages_created: AtomicU64,
}

impl fmt::Debug for PoolShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolShared")
            .field("launcher", &self.launcher)
            .field("max_idle", &self.max_idle)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl PoolShared {
    fn idle(&self) -> MutexGuard<'_, Vec<IdlePage>> {
        // The idle list holds no invariant a panicking holder could break.
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_idle(&self) -> Option<IdlePage> {
        let current = self.generation.load(Ordering::Acquire);
        let mut idle = self.idle();
        while let Some(entry) = idle.pop() {
            if entry.generation == current {
                return Some(entry);
            }
            debug!(generation = entry.generation, "dropping idle page from previous browser");
        }
        None
    }

    /// Put a page back. Returns the page when it must be closed instead.
    fn check_in(&self, page: Box<dyn CanvasPage>, generation: u64) -> Option<Box<dyn CanvasPage>> {
        if generation != self.generation.load(Ordering::Acquire) {
            return Some(page);
        }
        let mut idle = self.idle();
        if idle.len() < self.max_idle {
            idle.push(IdlePage { page, generation });
            debug!(idle = idle.len(), "page returned to pool");
            None
        } else {
            Some(page)
        }
    }
}

async fn close_page(page: Box<dyn CanvasPage>) {
    if let Err(e) = page.close().await {
        debug!(error = %e, "closing surplus page failed");
    }
}

/// Pool of reusable canvas pages
#[derive(Debug, Clone)]
pub struct BrowserPool {
    shared: Arc<PoolShared>,
}

impl BrowserPool {
    /// Create an empty pool; nothing is launched until the first acquire
    #[must_use]
    pub fn new(launcher: Arc<dyn BrowserLauncher>, runtime: RuntimeSource, max_idle: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                launcher,
                runtime,
                max_idle,
                browser: tokio::sync::Mutex::new(None),
                idle: Mutex::new(Vec::new()),
                generation: AtomicU64::new(0),
                launches: AtomicU64::new(0),
                pages_created: AtomicU64::new(0),
            }),
        }
    }

    /// Hand out a page owned exclusively by the caller.
    ///
    /// Reuses an idle page when one exists; otherwise opens a new page on the
    /// shared browser, launching or relaunching the browser as needed. If the
    /// browser has disconnected, its idle pages are closed first so the
    /// caller always gets a page from a live process.
    ///
    /// # Errors
    ///
    /// Returns the launch, page-creation or navigation error. The pool is left
    /// unchanged in that case.
    pub async fn acquire(&self) -> RenderResult<PooledPage> {
        self.retire_disconnected().await;

        if let Some(entry) = self.shared.take_idle() {
            debug!("reusing idle page");
            return Ok(PooledPage::new(entry.page, entry.generation, &self.shared));
        }

        let (page, generation) = self.create_page().await?;
        Ok(PooledPage::new(page, generation, &self.shared))
    }

    /// Return a page after use.
    ///
    /// The page goes back to the idle list if there is room, otherwise it is
    /// closed.
    pub async fn release(&self, mut page: PooledPage) {
        if let Some(surplus) = page.check_in() {
            close_page(surplus).await;
        }
    }

    /// Close a page instead of returning it to the pool.
    ///
    /// For pages left in an unknown state by a failed render.
    pub async fn discard(&self, mut page: PooledPage) {
        if let Some(page) = page.page.take() {
            debug!("discarding failed page");
            close_page(page).await;
        }
    }

    /// Current pool counters
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            idle: self.shared.idle().len(),
            max_idle: self.shared.max_idle,
            launches: self.shared.launches.load(Ordering::Relaxed),
            pages_created: self.shared.pages_created.load(Ordering::Relaxed),
        }
    }

    /// Close every idle page and the browser process
    pub async fn shutdown(&self) {
        let idle: Vec<IdlePage> = std::mem::take(&mut *self.shared.idle());
        for entry in idle {
            close_page(entry.page).await;
        }

        // Pages still in flight belong to this generation; retire them.
        self.shared.generation.fetch_add(1, Ordering::AcqRel);

        let mut slot = self.shared.browser.lock().await;
        if let Some(mut browser) = slot.take() {
            if let Err(e) = browser.handle.close().await {
                warn!(error = %e, "browser did not close cleanly");
            } else {
                info!("browser closed");
            }
        }
    }

    /// Drop a crashed browser along with every idle page it owns.
    async fn retire_disconnected(&self) {
        let mut slot = self.shared.browser.lock().await;
        let mut old = match slot.take() {
            Some(browser) if !browser.handle.is_connected() => browser,
            live => {
                *slot = live;
                return;
            }
        };

        warn!(generation = old.generation, "browser disconnected, retiring its pages");
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
        let stale: Vec<IdlePage> = std::mem::take(&mut *self.shared.idle());
        for entry in stale {
            close_page(entry.page).await;
        }
        if let Err(e) = old.handle.close().await {
            debug!(error = %e, "closing disconnected browser failed");
        }
    }

    async fn create_page(&self) -> RenderResult<(Box<dyn CanvasPage>, u64)> {
        let mut slot = self.shared.browser.lock().await;

        let browser = match slot.take() {
            Some(browser) if browser.handle.is_connected() => browser,
            stale => {
                if let Some(mut old) = stale {
                    warn!(generation = old.generation, "browser disconnected, relaunching");
                    if let Err(e) = old.handle.close().await {
                        debug!(error = %e, "closing disconnected browser failed");
                    }
                }
                let handle = self.shared.launcher.launch().await?;
                let generation = self.shared.generation.fetch_add(1, Ordering::AcqRel) + 1;
                self.shared.launches.fetch_add(1, Ordering::Relaxed);
                info!(generation, "browser launched");
                BrowserSlot { handle, generation }
            }
        };

        let opened = Self::open_page(browser.handle.as_ref(), &self.shared.runtime).await;
        let generation = browser.generation;
        *slot = Some(browser);

        let page = opened?;
        self.shared.pages_created.fetch_add(1, Ordering::Relaxed);
        debug!(generation, "page created");
        Ok((page, generation))
    }

    async fn open_page(
        browser: &dyn BrowserHandle,
        runtime: &RuntimeSource,
    ) -> RenderResult<Box<dyn CanvasPage>> {
        let mut page = browser.new_page().await?;
        if let Err(e) = page.load_runtime(runtime).await {
            close_page(page).await;
            return Err(e);
        }
        Ok(page)
    }
}

/// A page checked out of a [`BrowserPool`].
///
/// Pass it back through [`BrowserPool::release`]. A page dropped without
/// release (e.g. its render was cancelled) is in an unknown state and is
/// closed rather than reused.
#[derive(Debug)]
pub struct PooledPage {
    page: Option<Box<dyn CanvasPage>>,
    generation: u64,
    shared: Arc<PoolShared>,
}

impl PooledPage {
    fn new(page: Box<dyn CanvasPage>, generation: u64, shared: &Arc<PoolShared>) -> Self {
        Self {
            page: Some(page),
            generation,
            shared: Arc::clone(shared),
        }
    }

    fn check_in(&mut self) -> Option<Box<dyn CanvasPage>> {
        let page = self.page.take()?;
        self.shared.check_in(page, self.generation)
    }
}

impl Deref for PooledPage {
    type Target = dyn CanvasPage;

    #[allow(clippy::expect_used)]
    fn deref(&self) -> &Self::Target {
        self.page.as_deref().expect("page is present until released")
    }
}

impl DerefMut for PooledPage {
    #[allow(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.page.as_deref_mut().expect("page is present until released")
    }
}

impl Drop for PooledPage {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        debug!("discarding page dropped without release");
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(close_page(page));
        }
    }
}
