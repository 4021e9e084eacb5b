//! Background enumeration behind "Refresh Data".
//!
//! A [`Refresher`] owns the shared [`ApiClient`] and hands out at most one
//! [`RefreshTask`] at a time. The task pages through media items, albums and
//! shared albums in that order and reports each fully collected kind through
//! an optional progress channel.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use api_client::{Album, ApiClient, ApiClientError, MediaItem};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    MediaItems,
    Albums,
    SharedAlbums,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::MediaItems,
        ResourceKind::Albums,
        ResourceKind::SharedAlbums,
    ];
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::MediaItems => "media items",
            ResourceKind::Albums => "albums",
            ResourceKind::SharedAlbums => "shared albums",
        };
        f.write_str(name)
    }
}

/// Every record of one kind, in API order.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceBatch {
    MediaItems(Vec<MediaItem>),
    Albums(Vec<Album>),
    SharedAlbums(Vec<Album>),
}

impl ResourceBatch {
    fn empty(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::MediaItems => ResourceBatch::MediaItems(Vec::new()),
            ResourceKind::Albums => ResourceBatch::Albums(Vec::new()),
            ResourceKind::SharedAlbums => ResourceBatch::SharedAlbums(Vec::new()),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceBatch::MediaItems(_) => ResourceKind::MediaItems,
            ResourceBatch::Albums(_) => ResourceKind::Albums,
            ResourceBatch::SharedAlbums(_) => ResourceKind::SharedAlbums,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResourceBatch::MediaItems(items) => items.len(),
            ResourceBatch::Albums(albums) | ResourceBatch::SharedAlbums(albums) => albums.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&mut self, page: ResourceBatch) {
        match (self, page) {
            (ResourceBatch::MediaItems(all), ResourceBatch::MediaItems(page)) => all.extend(page),
            (ResourceBatch::Albums(all), ResourceBatch::Albums(page)) => all.extend(page),
            (ResourceBatch::SharedAlbums(all), ResourceBatch::SharedAlbums(page)) => {
                all.extend(page)
            }
            (all, page) => tracing::warn!(
                "Dropping {} page appended to {} batch",
                page.kind(),
                all.kind()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshProgress {
    Started,
    PageFetched { kind: ResourceKind, total: usize },
    Completed(ResourceBatch),
    Finished(RefreshSummary),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshSummary {
    pub media_items: usize,
    pub albums: usize,
    pub shared_albums: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LibrarySnapshot {
    pub media_items: Vec<MediaItem>,
    pub albums: Vec<Album>,
    pub shared_albums: Vec<Album>,
}

impl LibrarySnapshot {
    pub fn summary(&self) -> RefreshSummary {
        RefreshSummary {
            media_items: self.media_items.len(),
            albums: self.albums.len(),
            shared_albums: self.shared_albums.len(),
        }
    }

    fn store(&mut self, batch: ResourceBatch) {
        match batch {
            ResourceBatch::MediaItems(items) => self.media_items = items,
            ResourceBatch::Albums(albums) => self.albums = albums,
            ResourceBatch::SharedAlbums(albums) => self.shared_albums = albums,
        }
    }
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("A refresh is already in progress")]
    InProgress,
    #[error("Failed to fetch {kind}: {source}")]
    Fetch {
        kind: ResourceKind,
        #[source]
        source: ApiClientError,
    },
}

/// The "a refresh is running" flag.
///
/// Refreshers built over clones of one slot never run concurrently, so a
/// task started for an earlier session still blocks the next one until it
/// has really ended.
#[derive(Debug, Clone, Default)]
pub struct RefreshSlot(Arc<AtomicBool>);

impl RefreshSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_taken(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn try_take(&self) -> Option<InFlightGuard> {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| InFlightGuard(Arc::clone(&self.0)))
    }
}

/// Clears the in-flight flag when the task finishes or is dropped unrun.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct Refresher {
    client: Arc<Mutex<ApiClient>>,
    slot: RefreshSlot,
}

impl Refresher {
    pub fn new(client: ApiClient) -> Self {
        Self::with_slot(client, RefreshSlot::new())
    }

    /// Share `slot` with other refreshers, e.g. one per signed-in session.
    pub fn with_slot(client: ApiClient, slot: RefreshSlot) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
            slot,
        }
    }

    pub fn is_running(&self) -> bool {
        self.slot.is_taken()
    }

    /// Reserve the single refresh slot and return the task to run.
    ///
    /// Fails with [`RefreshError::InProgress`] while an earlier task is alive.
    pub fn begin(
        &self,
        progress: Option<mpsc::UnboundedSender<RefreshProgress>>,
    ) -> Result<RefreshTask, RefreshError> {
        let Some(guard) = self.slot.try_take() else {
            tracing::info!("Refresh requested while one is running; ignoring");
            return Err(RefreshError::InProgress);
        };
        Ok(RefreshTask {
            client: Arc::clone(&self.client),
            progress,
            _guard: guard,
        })
    }

    /// Begin a refresh and run it on the current tokio runtime.
    pub fn spawn(
        &self,
        progress: Option<mpsc::UnboundedSender<RefreshProgress>>,
    ) -> Result<JoinHandle<Result<LibrarySnapshot, RefreshError>>, RefreshError> {
        let task = self.begin(progress)?;
        Ok(tokio::spawn(task.run()))
    }
}

pub struct RefreshTask {
    client: Arc<Mutex<ApiClient>>,
    progress: Option<mpsc::UnboundedSender<RefreshProgress>>,
    _guard: InFlightGuard,
}

impl RefreshTask {
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn run(self) -> Result<LibrarySnapshot, RefreshError> {
        tracing::info!("Starting library refresh...");
        self.send(RefreshProgress::Started);

        let mut client = self.client.lock().await;
        let mut snapshot = LibrarySnapshot::default();
        for kind in ResourceKind::ALL {
            match self.fetch_kind(&mut client, kind).await {
                Ok(batch) => {
                    tracing::info!("Fetched {} {}", batch.len(), kind);
                    self.send(RefreshProgress::Completed(batch.clone()));
                    snapshot.store(batch);
                }
                Err(e) => {
                    tracing::error!("Refresh failed: {}", e);
                    self.send(RefreshProgress::Failed(e.to_string()));
                    return Err(e);
                }
            }
        }

        let summary = snapshot.summary();
        tracing::info!(
            "Refresh complete: {} media items, {} albums, {} shared albums",
            summary.media_items,
            summary.albums,
            summary.shared_albums
        );
        self.send(RefreshProgress::Finished(summary));
        Ok(snapshot)
    }

    async fn fetch_kind(
        &self,
        client: &mut ApiClient,
        kind: ResourceKind,
    ) -> Result<ResourceBatch, RefreshError> {
        let mut batch = ResourceBatch::empty(kind);
        let mut page_token: Option<String> = None;
        loop {
            let token = page_token.as_deref();
            let result = match kind {
                ResourceKind::MediaItems => client
                    .list_media_items(token)
                    .await
                    .map(|(items, next)| (ResourceBatch::MediaItems(items), next)),
                ResourceKind::Albums => client
                    .list_albums(token)
                    .await
                    .map(|(albums, next)| (ResourceBatch::Albums(albums), next)),
                ResourceKind::SharedAlbums => client
                    .list_shared_albums(token)
                    .await
                    .map(|(albums, next)| (ResourceBatch::SharedAlbums(albums), next)),
            };
            let (page, next) = result.map_err(|source| RefreshError::Fetch { kind, source })?;
            batch.append(page);
            self.send(RefreshProgress::PageFetched {
                kind,
                total: batch.len(),
            });

            match next {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }
        Ok(batch)
    }

    fn send(&self, update: RefreshProgress) {
        if let Some(tx) = &self.progress {
            if tx.send(update).is_err() {
                tracing::debug!("Progress receiver dropped");
            }
        }
    }
}
