use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::Stream;
use shared::{
    domain::{AlbumId, Identity},
    protocol::{AlbumPage, AlbumRecord, CreateAlbumInput, ListAlbumsFilter},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

pub mod compare;
pub mod config;
pub mod sync;
pub mod transport;

use compare::{make_comparator, SortOrder};
use sync::{FeedPhase, SyncedList};

/// Upper bound on the one-shot initial fetch.
pub const DEFAULT_PAGE_LIMIT: u32 = 999;
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Failures surfaced by the album feed. None of them retry automatically;
/// a later [`AlbumClient::start_feed`] begins cleanly.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    #[error("initial album fetch failed: {0}")]
    Fetch(String),
    #[error("identity resolution failed: {0}")]
    Identity(String),
    #[error("album subscription setup failed: {0}")]
    SubscriptionSetup(String),
}

/// Cancellation handle for a live subscription. Aborts the pump task when
/// cancelled or dropped.
pub struct SubscriptionHandle {
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    /// Handle for subscriptions with no background task to stop.
    pub fn detached() -> Self {
        Self { task: None }
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Unbounded live feed of album creation events plus its cancellation
/// handle. The stream ends when the backend closes it or the handle is
/// cancelled.
pub struct AlbumStream {
    events: mpsc::Receiver<AlbumRecord>,
    handle: SubscriptionHandle,
}

impl AlbumStream {
    pub fn new(events: mpsc::Receiver<AlbumRecord>, handle: SubscriptionHandle) -> Self {
        Self { events, handle }
    }

    pub async fn recv(&mut self) -> Option<AlbumRecord> {
        self.events.recv().await
    }

    pub fn cancel(mut self) {
        self.handle.cancel();
    }

    /// Adapter for callers that want `futures` combinators. The
    /// subscription stays alive for as long as the returned stream does.
    pub fn into_stream(self) -> AlbumEventStream {
        AlbumEventStream {
            inner: ReceiverStream::new(self.events),
            _handle: self.handle,
        }
    }
}

pub struct AlbumEventStream {
    inner: ReceiverStream<AlbumRecord>,
    _handle: SubscriptionHandle,
}

impl Stream for AlbumEventStream {
    type Item = AlbumRecord;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<AlbumRecord>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

/// The managed album backend, treated as an opaque collaborator.
#[async_trait]
pub trait AlbumApi: Send + Sync {
    /// One-shot bulk read, bounded by `limit`.
    async fn list_albums(&self, filter: ListAlbumsFilter, limit: u32) -> Result<AlbumPage>;

    async fn get_album(&self, id: &AlbumId) -> Result<AlbumRecord>;

    async fn create_album(&self, input: CreateAlbumInput) -> Result<AlbumRecord>;

    /// Live creation feed scoped to `owner`.
    async fn subscribe_on_create(&self, owner: &str) -> Result<AlbumStream>;
}

/// Identity resolution is a separate backend dependency with its own
/// failure mode, consumed once per subscription setup.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_identity(&self) -> Result<Identity>;
}

pub struct MissingAlbumApi;

#[async_trait]
impl AlbumApi for MissingAlbumApi {
    async fn list_albums(&self, _filter: ListAlbumsFilter, _limit: u32) -> Result<AlbumPage> {
        Err(anyhow!("album backend unavailable"))
    }

    async fn get_album(&self, id: &AlbumId) -> Result<AlbumRecord> {
        Err(anyhow!("album backend unavailable for album {id}"))
    }

    async fn create_album(&self, _input: CreateAlbumInput) -> Result<AlbumRecord> {
        Err(anyhow!("album backend unavailable"))
    }

    async fn subscribe_on_create(&self, owner: &str) -> Result<AlbumStream> {
        Err(anyhow!("album backend unavailable for owner {owner}"))
    }
}

pub struct MissingIdentityProvider;

#[async_trait]
impl IdentityProvider for MissingIdentityProvider {
    async fn current_identity(&self) -> Result<Identity> {
        Err(anyhow!("identity backend unavailable"))
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Full ordered snapshot, emitted after every applied fetch result or
    /// live event.
    AlbumsUpdated { albums: Vec<AlbumRecord> },
    AlbumCreated { album: AlbumRecord },
    Error(FeedError),
}

struct FeedState {
    albums: SyncedList<AlbumRecord>,
    fetch_task: Option<JoinHandle<()>>,
    feed_task: Option<JoinHandle<()>>,
}

/// Client facade owning one synchronized ordered view of the caller's
/// albums, sorted ascending by name.
pub struct AlbumClient {
    api: Arc<dyn AlbumApi>,
    identity: Arc<dyn IdentityProvider>,
    page_limit: u32,
    inner: Mutex<FeedState>,
    events: broadcast::Sender<ClientEvent>,
}

fn album_ordering() -> SyncedList<AlbumRecord> {
    SyncedList::new(make_comparator::<AlbumRecord>("name", SortOrder::Asc))
}

impl AlbumClient {
    pub fn new(api: Arc<dyn AlbumApi>, identity: Arc<dyn IdentityProvider>) -> Arc<Self> {
        Self::new_with_page_limit(api, identity, DEFAULT_PAGE_LIMIT)
    }

    pub fn new_with_page_limit(
        api: Arc<dyn AlbumApi>,
        identity: Arc<dyn IdentityProvider>,
        page_limit: u32,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            api,
            identity,
            page_limit,
            inner: Mutex::new(FeedState {
                albums: album_ordering(),
                fetch_task: None,
                feed_task: None,
            }),
            events,
        })
    }

    /// Client with no backends wired; every operation fails until real
    /// collaborators are supplied.
    pub fn disconnected() -> Arc<Self> {
        Self::new(Arc::new(MissingAlbumApi), Arc::new(MissingIdentityProvider))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn albums(&self) -> Vec<AlbumRecord> {
        self.inner.lock().await.albums.items().to_vec()
    }

    pub async fn feed_phase(&self) -> FeedPhase {
        self.inner.lock().await.albums.phase()
    }

    pub async fn create_album(&self, input: CreateAlbumInput) -> Result<AlbumRecord> {
        self.api.create_album(input).await
    }

    pub async fn get_album(&self, id: &AlbumId) -> Result<AlbumRecord> {
        self.api.get_album(id).await
    }

    /// Begins the initial bounded fetch and the live subscription as
    /// independent tasks. There is no ordering guarantee between the
    /// fetch's completion and the first live event, and a record delivered
    /// by both paths is kept twice.
    pub async fn start_feed(self: &Arc<Self>, filter: ListAlbumsFilter) {
        {
            let mut inner = self.inner.lock().await;
            if let Some(task) = inner.fetch_task.take() {
                task.abort();
            }
            if let Some(task) = inner.feed_task.take() {
                task.abort();
            }
            inner.albums = album_ordering();
            inner.albums.mark_loading();
        }

        let fetch_client = Arc::clone(self);
        let fetch_task = tokio::spawn(async move {
            match fetch_client
                .api
                .list_albums(filter, fetch_client.page_limit)
                .await
            {
                Ok(page) => {
                    let snapshot = {
                        let mut inner = fetch_client.inner.lock().await;
                        if !inner.albums.apply_initial(page.items) {
                            return;
                        }
                        inner.albums.items().to_vec()
                    };
                    info!(count = snapshot.len(), "albums: initial fetch applied");
                    let _ = fetch_client
                        .events
                        .send(ClientEvent::AlbumsUpdated { albums: snapshot });
                }
                Err(err) => {
                    warn!("albums: initial fetch failed: {err:#}");
                    let _ = fetch_client
                        .events
                        .send(ClientEvent::Error(FeedError::Fetch(err.to_string())));
                }
            }
        });

        let feed_client = Arc::clone(self);
        let feed_task = tokio::spawn(async move {
            let identity = match feed_client.identity.current_identity().await {
                Ok(identity) => identity,
                Err(err) => {
                    warn!("albums: identity resolution failed: {err:#}");
                    let _ = feed_client
                        .events
                        .send(ClientEvent::Error(FeedError::Identity(err.to_string())));
                    return;
                }
            };

            let mut stream = match feed_client.api.subscribe_on_create(&identity.username).await {
                Ok(stream) => stream,
                Err(err) => {
                    warn!("albums: subscription setup failed: {err:#}");
                    let _ = feed_client.events.send(ClientEvent::Error(
                        FeedError::SubscriptionSetup(err.to_string()),
                    ));
                    return;
                }
            };
            info!(owner = %identity.username, "albums: live feed established");

            while let Some(album) = stream.recv().await {
                let snapshot = {
                    let mut inner = feed_client.inner.lock().await;
                    if !inner.albums.apply_created(album.clone()) {
                        break;
                    }
                    inner.albums.items().to_vec()
                };
                let _ = feed_client
                    .events
                    .send(ClientEvent::AlbumCreated { album });
                let _ = feed_client
                    .events
                    .send(ClientEvent::AlbumsUpdated { albums: snapshot });
            }
        });

        let mut inner = self.inner.lock().await;
        inner.fetch_task = Some(fetch_task);
        inner.feed_task = Some(feed_task);
    }

    /// Releases the live subscription and tears down the view. Safe to call
    /// when nothing was started, and idempotent. An in-flight initial fetch
    /// is not cancelled; its result is discarded by the torn-down view.
    pub async fn stop_feed(&self) {
        let feed_task = {
            let mut inner = self.inner.lock().await;
            inner.albums.tear_down();
            inner.feed_task.take()
        };
        if let Some(task) = feed_task {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
