use std::sync::{Mutex, MutexGuard};

use tracing::{info, warn};

use crate::dispatch::{self, OperationRequest, OperationResult};
use crate::error::{BridgeError, BridgeResult};
use crate::handle::{Handle, HandleRegistry, LiveRef};
use crate::host::DocumentHost;
use crate::picture::{PictureFetcher, PictureLimits};
use crate::style::Precedence;
use crate::table::TableLimits;

/// Tunables a session runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeSettings {
    /// Hit cap used when a search does not ask for one.
    pub default_max_results: usize,
    /// Ceiling applied to every requested hit cap.
    pub max_results_cap: usize,
    pub default_precedence: Precedence,
    pub pictures: PictureLimits,
    pub tables: TableLimits,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            default_max_results: 100,
            max_results_cap: 1000,
            default_precedence: Precedence::StyleFirst,
            pictures: PictureLimits::default(),
            tables: TableLimits::default(),
        }
    }
}

impl BridgeSettings {
    pub fn search_limit(&self, requested: Option<usize>) -> BridgeResult<usize> {
        match requested {
            Some(0) => Err(BridgeError::invalid("maxResults must be at least 1")),
            Some(limit) => Ok(limit.min(self.max_results_cap)),
            None => Ok(self.default_max_results.min(self.max_results_cap)),
        }
    }
}

/// One caller's view of one document: the host plus the handles issued for it.
pub struct Session<H: DocumentHost> {
    pub(crate) host: H,
    pub(crate) registry: HandleRegistry,
    pub(crate) settings: BridgeSettings,
    pub(crate) fetcher: Option<Box<dyn PictureFetcher>>,
}

impl<H: DocumentHost> Session<H> {
    pub fn new(host: H) -> Self {
        info!("session opened");
        Self {
            host,
            registry: HandleRegistry::new(),
            settings: BridgeSettings::default(),
            fetcher: None,
        }
    }

    pub fn with_settings(mut self, settings: BridgeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Box<dyn PictureFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn dispatch(&mut self, request: &OperationRequest) -> OperationResult {
        dispatch::dispatch(self, request)
    }

    /// Forgets a handle and lets the host stop tracking its object. Returns
    /// whether the handle was registered.
    pub fn release_handle(&mut self, handle: &Handle) -> bool {
        release(&mut self.host, &mut self.registry, handle)
    }

    /// Releases every outstanding handle and returns the host.
    pub fn close(mut self) -> H {
        let released = self.registry.clear();
        let count = released.len();
        for live in released {
            untrack(&mut self.host, live);
        }
        info!(released = count, "session closed");
        self.host
    }
}

/// Drops `handle` from `registry` and untracks its object on `host`.
pub(crate) fn release(
    host: &mut dyn DocumentHost,
    registry: &mut HandleRegistry,
    handle: &Handle,
) -> bool {
    match registry.release(handle) {
        Some(live) => {
            untrack(host, live);
            true
        }
        None => false,
    }
}

fn untrack(host: &mut dyn DocumentHost, live: LiveRef) {
    match live {
        LiveRef::Range(range) => host.release_range(range),
        LiveRef::Table(table) => host.release_table(table),
    }
}

/// A session shared between callers; requests are serialized on a lock.
pub struct SharedSession<H: DocumentHost> {
    inner: Mutex<Session<H>>,
}

impl<H: DocumentHost> SharedSession<H> {
    pub fn new(session: Session<H>) -> Self {
        Self {
            inner: Mutex::new(session),
        }
    }

    pub fn dispatch(&self, request: &OperationRequest) -> OperationResult {
        self.lock().dispatch(request)
    }

    /// Runs `f` with exclusive access to the session.
    pub fn with<R>(&self, f: impl FnOnce(&mut Session<H>) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn into_inner(self) -> Session<H> {
        self.inner
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock(&self) -> MutexGuard<'_, Session<H>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            warn!("session lock was poisoned by an earlier panic; continuing");
            poisoned.into_inner()
        })
    }
}
