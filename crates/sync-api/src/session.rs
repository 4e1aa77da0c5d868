use std::fmt;
use std::sync::Arc;

use atc_contracts::{SimulationConfig, SimulationSnapshot};
use tokio::task::JoinHandle;

use crate::{
    CacheView, CacheWrite, ClientConfig, ConfigError, HttpTransport, RequestToken,
    SimulationClient, SnapshotCache, SnapshotSubscription, SyncError, Transport, TransportError,
};

const TASK_PANICKED: &str = "sync task panicked";
const TASK_CANCELLED: &str = "sync task was cancelled";

#[derive(Debug, Clone, PartialEq)]
pub enum SyncRequest {
    Reset(SimulationConfig),
    Step(i64),
    GetState,
}

impl fmt::Display for SyncRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reset(config) => write!(f, "reset({})", config.scenario),
            Self::Step(count) => write!(f, "step({count})"),
            Self::GetState => f.write_str("state"),
        }
    }
}

/// A client bound to the cache it feeds.
///
/// Each call takes a [`RequestToken`] when issued and offers its snapshot to
/// the cache when it completes; a completion older than one already applied
/// is discarded. Failures leave the cache untouched.
pub struct SimulationSession<T = HttpTransport> {
    client: Arc<SimulationClient<T>>,
    cache: SnapshotCache,
}

impl<T> Clone for SimulationSession<T> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            cache: self.cache.clone(),
        }
    }
}

impl SimulationSession<HttpTransport> {
    pub fn connect(config: &ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(SimulationClient::connect(config)?))
    }
}

impl<T: Transport> SimulationSession<T> {
    pub fn new(client: SimulationClient<T>) -> Self {
        Self::with_cache(client, SnapshotCache::new())
    }

    pub fn with_cache(client: SimulationClient<T>, cache: SnapshotCache) -> Self {
        Self {
            client: Arc::new(client),
            cache,
        }
    }

    pub fn client(&self) -> &SimulationClient<T> {
        &self.client
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn subscribe(&self) -> SnapshotSubscription {
        self.cache.subscribe()
    }

    pub fn view(&self) -> CacheView {
        self.cache.view()
    }

    pub async fn reset(
        &self,
        config: &SimulationConfig,
    ) -> Result<Arc<SimulationSnapshot>, SyncError> {
        self.run(SyncRequest::Reset(config.clone())).await
    }

    pub async fn step(&self, count: i64) -> Result<Arc<SimulationSnapshot>, SyncError> {
        self.run(SyncRequest::Step(count)).await
    }

    pub async fn get_state(&self) -> Result<Arc<SimulationSnapshot>, SyncError> {
        self.run(SyncRequest::GetState).await
    }

    /// Returns the call's own snapshot even when the cache discarded it as
    /// stale.
    pub async fn run(&self, request: SyncRequest) -> Result<Arc<SimulationSnapshot>, SyncError> {
        let token = self.cache.begin_request();
        self.complete(token, request).await
    }

    /// Runs the call on a background task. Dropping the returned handle
    /// abandons the call; its response still goes through the staleness
    /// check if it arrives.
    pub fn spawn(&self, request: SyncRequest) -> PendingSync
    where
        T: 'static,
    {
        let token = self.cache.begin_request();
        let session = self.clone();
        let handle = tokio::spawn(async move { session.complete(token, request).await });
        PendingSync { token, handle }
    }

    async fn complete(
        &self,
        token: RequestToken,
        request: SyncRequest,
    ) -> Result<Arc<SimulationSnapshot>, SyncError> {
        let result = match &request {
            SyncRequest::Reset(config) => self.client.reset(config).await,
            SyncRequest::Step(count) => self.client.step(*count).await,
            SyncRequest::GetState => self.client.get_state().await,
        };
        let snapshot = Arc::new(result?);

        match self.cache.apply(token, Arc::clone(&snapshot)) {
            CacheWrite::Applied => {
                log::debug!(
                    "{request} applied step={} token={}",
                    snapshot.step,
                    token.sequence()
                );
            }
            CacheWrite::Stale { latest } => {
                log::debug!(
                    "{request} discarded as stale: token={} superseded by {}",
                    token.sequence(),
                    latest.sequence()
                );
            }
        }

        Ok(snapshot)
    }
}

/// Handle to a call running in the background.
#[derive(Debug)]
pub struct PendingSync {
    token: RequestToken,
    handle: JoinHandle<Result<Arc<SimulationSnapshot>, SyncError>>,
}

impl PendingSync {
    pub fn token(&self) -> RequestToken {
        self.token
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// A task that panicked or was cancelled never produced a response, so
    /// it surfaces as a [`TransportError`] whose context names the task
    /// failure rather than a network one. The cache is left untouched.
    pub async fn wait(self) -> Result<Arc<SimulationSnapshot>, SyncError> {
        match self.handle.await {
            Ok(result) => result,
            Err(err) => {
                let context = if err.is_panic() {
                    TASK_PANICKED
                } else {
                    TASK_CANCELLED
                };
                log::warn!("{context} (token {})", self.token.sequence());
                Err(TransportError::new(context, err).into())
            }
        }
    }

    /// Stops waiting without cancelling the call.
    pub fn abandon(self) {
        drop(self.handle);
    }
}
