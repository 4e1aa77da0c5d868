use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use atc_contracts::SimulationSnapshot;
use tokio::sync::mpsc;

/// Sequence number taken when a call is issued. Larger tokens were issued
/// later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn sequence(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    Applied,
    /// A call issued later already landed; the write was dropped.
    Stale { latest: RequestToken },
}

/// What a subscriber sees: the current snapshot (absent until the first
/// successful call), the initialized flag, and how many writes have landed.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheView {
    pub snapshot: Option<Arc<SimulationSnapshot>>,
    pub initialized: bool,
    pub revision: u64,
}

impl CacheView {
    pub fn step(&self) -> Option<u64> {
        self.snapshot.as_ref().map(|snapshot| snapshot.step)
    }
}

#[derive(Debug, Default)]
struct CacheState {
    snapshot: Option<Arc<SimulationSnapshot>>,
    initialized: bool,
    revision: u64,
    applied: Option<RequestToken>,
    subscribers: Vec<mpsc::UnboundedSender<CacheView>>,
}

impl CacheState {
    fn view(&self) -> CacheView {
        CacheView {
            snapshot: self.snapshot.clone(),
            initialized: self.initialized,
            revision: self.revision,
        }
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    next_token: AtomicU64,
    state: RwLock<CacheState>,
}

/// Latest engine snapshot shared between a controller and its consumers.
///
/// Lifecycle is absent, then initialized, then replaced any number of
/// times. `initialized` never goes back to false for the life of the
/// cache. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCache {
    inner: Arc<CacheInner>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_request(&self) -> RequestToken {
        RequestToken(self.inner.next_token.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Replaces the snapshot unless a newer token already landed.
    pub fn apply(
        &self,
        token: RequestToken,
        snapshot: impl Into<Arc<SimulationSnapshot>>,
    ) -> CacheWrite {
        let mut state = self.write_state();

        if let Some(latest) = state.applied {
            if token <= latest {
                return CacheWrite::Stale { latest };
            }
        }

        state.applied = Some(token);
        state.snapshot = Some(snapshot.into());
        state.initialized = true;
        state.revision += 1;

        // Sending under the write lock keeps delivery in application order.
        let view = state.view();
        state
            .subscribers
            .retain(|subscriber| subscriber.send(view.clone()).is_ok());

        CacheWrite::Applied
    }

    /// Writes outside the request flow, e.g. a snapshot loaded at startup.
    pub fn store(&self, snapshot: impl Into<Arc<SimulationSnapshot>>) -> CacheWrite {
        let token = self.begin_request();
        self.apply(token, snapshot)
    }

    pub fn latest(&self) -> Option<Arc<SimulationSnapshot>> {
        self.read_state().snapshot.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.read_state().initialized
    }

    pub fn view(&self) -> CacheView {
        self.read_state().view()
    }

    /// The current view is delivered immediately, followed by every later
    /// replacement in order.
    pub fn subscribe(&self) -> SnapshotSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.write_state();
        // The receiver is held right here, so this send cannot fail.
        let _ = sender.send(state.view());
        state.subscribers.push(sender);
        SnapshotSubscription { receiver }
    }

    pub fn subscriber_count(&self) -> usize {
        self.read_state()
            .subscribers
            .iter()
            .filter(|subscriber| !subscriber.is_closed())
            .count()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CacheState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ordered stream of cache views. Ends when every handle to the cache has
/// been dropped.
#[derive(Debug)]
pub struct SnapshotSubscription {
    receiver: mpsc::UnboundedReceiver<CacheView>,
}

impl SnapshotSubscription {
    pub async fn recv(&mut self) -> Option<CacheView> {
        self.receiver.recv().await
    }

    /// Next view if one is already queued.
    pub fn try_recv(&mut self) -> Option<CacheView> {
        self.receiver.try_recv().ok()
    }

    /// Every queued view, oldest first.
    pub fn drain(&mut self) -> Vec<CacheView> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
