//! Paginated list cache.
//!
//! A [`PagedList`] keeps a growing, page-indexed view over a list endpoint.
//! Pages are keyed by `(endpoint, page, page_size)` and fetched strictly in
//! order: page `i + 1` is only requested once page `i` has resolved.
//!
//! Reaching the end is inferred from a short (or empty) page, since list
//! endpoints return plain arrays without a total count. Once observed it
//! never resets for the lifetime of the list.
//!
//! ### Response policy
//!
//! Every request is tagged with the list's epoch at issue time. Mutations
//! and full revalidations bump the epoch.
//!
//! | Situation                                          | Policy              |
//! |----------------------------------------------------|---------------------|
//! | page already in flight in the current epoch        | not re-issued; wait |
//! | response issued before the current epoch           | ignored as stale    |
//! | several responses for one page in the same epoch   | last resolved wins  |
//! | rollback after a newer mutation was applied        | not restored        |
//!
//! Mutations apply their optimistic value synchronously, before the
//! returned future is first polled.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use url::Url;

use crate::credentials::CredentialsProvider;
use crate::error::{ClientError, SharedError};
use crate::fetch::{FetchClient, FetchRequest};
use crate::resource::Resources;

/// Cache identity of one page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    /// Absolute URL of the list endpoint, without pagination parameters.
    pub endpoint: String,
    pub page: u32,
    pub page_size: u32,
}

impl PageKey {
    /// The endpoint URL with `page` and `page_size` query parameters.
    pub fn url(&self) -> Result<String, ClientError> {
        let mut url = Url::parse(&self.endpoint).map_err(|source| {
            ClientError::InvalidUrl {
                url: self.endpoint.clone(),
                source,
            }
        })?;
        url.query_pairs_mut()
            .append_pair("page", &self.page.to_string())
            .append_pair("page_size", &self.page_size.to_string());
        Ok(url.into())
    }
}

/// Source of pages for a [`PagedList`].
pub trait PageLoader<T>: Send + Sync + 'static {
    /// Key for the page, or `None` when the list must not be fetched yet
    /// (for example before sign-in).
    fn page_key(&self, page: u32, page_size: u32) -> Option<PageKey>;

    fn load_page(
        &self,
        key: &PageKey,
    ) -> impl Future<Output = Result<Vec<T>, ClientError>> + Send;
}

/// Loads pages over HTTP through the fetch client.
#[derive(Clone)]
pub struct HttpPageLoader {
    fetch: FetchClient,
    endpoint: String,
    credentials: Arc<dyn CredentialsProvider>,
}

impl HttpPageLoader {
    pub fn new(resources: &Resources, path: &str) -> Self {
        Self {
            fetch: resources.fetch_client().clone(),
            endpoint: resources.url(path),
            credentials: resources.credentials().clone(),
        }
    }
}

impl<T> PageLoader<T> for HttpPageLoader
where
    T: DeserializeOwned + Send + 'static,
{
    fn page_key(&self, page: u32, page_size: u32) -> Option<PageKey> {
        // no token yet: null key, nothing is fetched
        self.credentials.bearer_token()?;
        Some(PageKey {
            endpoint: self.endpoint.clone(),
            page,
            page_size,
        })
    }

    async fn load_page(&self, key: &PageKey) -> Result<Vec<T>, ClientError> {
        // the token may have changed since the key was computed
        let token = self
            .credentials
            .bearer_token()
            .ok_or(ClientError::NoSession)?;
        let request = FetchRequest::new(Method::GET, key.url()?).bearer(Some(token));
        self.fetch.fetch(request).await
    }
}

/// Point-in-time view of a [`PagedList`].
#[derive(Debug, Clone)]
pub struct ListSnapshot<T> {
    /// All resolved pages flattened in page order; `None` until the first
    /// page has resolved.
    pub items: Option<Vec<T>>,
    /// Consecutive resolved pages starting at page 0.
    pub pages: Vec<Vec<T>>,
    /// The most recent user-visible failure.
    pub error: Option<SharedError>,
    /// Number of pages requested.
    pub size: usize,
    pub is_loading_more: bool,
    pub is_reaching_end: bool,
    /// Any request for this list is outstanding, including revalidations.
    pub is_validating: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutateOptions {
    /// Refetch the requested pages after applying the optimistic value.
    pub revalidate: bool,
    /// Restore the pre-mutation pages if reconciliation fails.
    pub rollback_on_error: bool,
}

impl Default for MutateOptions {
    fn default() -> Self {
        Self {
            revalidate: true,
            rollback_on_error: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Reconciliation succeeded and the cache holds the server's data.
    Committed,
    /// Nothing was reconciled, because revalidation was disabled or there
    /// was no session to fetch with; the optimistic value stays as is.
    NoOp,
}

#[derive(Debug, thiserror::Error)]
#[error("Mutation failed: {source}")]
pub struct MutationError {
    /// Whether the cache was restored to its pre-mutation pages.
    pub rolled_back: bool,
    #[source]
    pub source: SharedError,
}

struct Slot<T> {
    data: Option<Vec<T>>,
    error: Option<SharedError>,
    /// Epoch of the outstanding request for this page.
    in_flight: Option<u64>,
}

impl<T> Slot<T> {
    fn empty() -> Self {
        Self {
            data: None,
            error: None,
            in_flight: None,
        }
    }
}

struct ListState<T> {
    size: usize,
    slots: Vec<Slot<T>>,
    error: Option<SharedError>,
    reaching_end: bool,
    epoch: u64,
    mutation_seq: u64,
}

enum Resolution {
    Stale,
    Loaded { short: bool },
    Failed(SharedError),
}

enum Refetch {
    Done,
    Skipped,
}

enum Step {
    Next,
    Wait,
    Fetch(u64),
    Fail(SharedError),
}

/// Pages saved by a mutation for rollback.
struct Saved<T> {
    seq: u64,
    data: Vec<Option<Vec<T>>>,
    size: usize,
    error: Option<SharedError>,
}

impl<T: Clone> ListState<T> {
    fn new() -> Self {
        Self {
            size: 1,
            slots: Vec::new(),
            error: None,
            reaching_end: false,
            epoch: 0,
            mutation_seq: 0,
        }
    }

    fn slot_mut(&mut self, index: usize) -> &mut Slot<T> {
        while self.slots.len() <= index {
            self.slots.push(Slot::empty());
        }
        &mut self.slots[index]
    }

    fn resolve(
        &mut self,
        index: usize,
        epoch: u64,
        page_size: u32,
        result: Result<Vec<T>, ClientError>,
    ) -> Resolution {
        if self.epoch != epoch {
            if let Some(slot) = self.slots.get_mut(index)
                && slot.in_flight == Some(epoch)
            {
                slot.in_flight = None;
            }
            return Resolution::Stale;
        }
        let Some(slot) = self.slots.get_mut(index) else {
            return Resolution::Stale;
        };
        slot.in_flight = None;
        match result {
            Ok(items) => {
                let short = items.len() < page_size as usize;
                slot.data = Some(items);
                slot.error = None;
                if short {
                    self.reaching_end = true;
                    self.slots.truncate(index + 1);
                    self.size = index + 1;
                }
                if self.slots.iter().all(|s| s.error.is_none()) {
                    self.error = None;
                }
                Resolution::Loaded { short }
            }
            Err(e) => {
                let e = Arc::new(e);
                slot.error = Some(e.clone());
                if e.is_user_visible() {
                    self.error = Some(e.clone());
                }
                Resolution::Failed(e)
            }
        }
    }

    fn save(&mut self) -> Saved<T> {
        self.mutation_seq += 1;
        Saved {
            seq: self.mutation_seq,
            data: self.slots.iter().map(|s| s.data.clone()).collect(),
            size: self.size,
            error: self.error.clone(),
        }
    }

    fn apply(&mut self, mut pages: Vec<Vec<T>>) {
        if pages.is_empty() {
            pages.push(Vec::new());
        }
        self.size = pages.len();
        self.slots = pages
            .into_iter()
            .map(|page| Slot {
                data: Some(page),
                ..Slot::empty()
            })
            .collect();
        self.epoch += 1;
    }

    fn restore(&mut self, saved: Saved<T>) {
        self.slots = saved
            .data
            .into_iter()
            .map(|data| Slot {
                data,
                ..Slot::empty()
            })
            .collect();
        self.size = saved.size;
        self.error = saved.error;
        self.epoch += 1;
    }

    fn snapshot(&self) -> ListSnapshot<T> {
        let requested = &self.slots[..self.size.min(self.slots.len())];
        let pages: Vec<Vec<T>> = requested
            .iter()
            .map_while(|s| s.data.clone())
            .collect();
        // items never skip an unresolved page, so they always equal pages
        let items = requested
            .first()
            .and_then(|s| s.data.as_ref())
            .map(|_| pages.concat());
        ListSnapshot {
            items,
            pages,
            error: self.error.clone(),
            size: self.size,
            is_loading_more: requested
                .iter()
                .any(|s| s.in_flight.is_some() && s.data.is_none()),
            is_reaching_end: self.reaching_end,
            is_validating: self.slots.iter().any(|s| s.in_flight.is_some()),
        }
    }
}

struct Inner<T, L> {
    loader: L,
    page_size: u32,
    state: Mutex<ListState<T>>,
    updates: watch::Sender<ListSnapshot<T>>,
}

/// A forward-only paginated view over a list endpoint.
///
/// Clones share the same cache. Page requests run on spawned tokio tasks,
/// so a list must be loaded from within a tokio runtime.
pub struct PagedList<T, L> {
    inner: Arc<Inner<T, L>>,
}

impl<T, L> Clone for PagedList<T, L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, L> PagedList<T, L>
where
    T: Clone + Send + Sync + 'static,
    L: PageLoader<T>,
{
    /// Create an empty list requesting one page. Nothing is fetched until
    /// [`load`](Self::load) or [`set_page`](Self::set_page) is called.
    pub fn new(loader: L, page_size: u32) -> Self {
        let state = ListState::new();
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            inner: Arc::new(Inner {
                loader,
                page_size: page_size.max(1),
                state: Mutex::new(state),
                updates,
            }),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.inner.page_size
    }

    pub fn snapshot(&self) -> ListSnapshot<T> {
        self.state().snapshot()
    }

    /// Feed of snapshots, updated on every state change.
    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot<T>> {
        self.inner.updates.subscribe()
    }

    /// Fetch every requested page that has not resolved yet.
    pub async fn load(&self) -> Result<(), SharedError> {
        self.fill().await
    }

    /// Request one more page.
    pub async fn load_more(&self) -> Result<(), SharedError> {
        self.set_page(|size| size + 1).await
    }

    /// Set the number of requested pages to an absolute count.
    pub async fn set_size(&self, size: usize) -> Result<(), SharedError> {
        self.set_page(|_| size).await
    }

    /// Update the number of requested pages and fetch any that are missing.
    ///
    /// Already resolved pages are left alone. Once the end has been reached
    /// the count cannot grow past the pages already loaded. Calling this
    /// again after a failure retries the failed page.
    pub async fn set_page(
        &self,
        update: impl FnOnce(usize) -> usize,
    ) -> Result<(), SharedError> {
        {
            let mut state = self.state();
            let mut size = update(state.size).max(1);
            if state.reaching_end {
                size = size.min(state.slots.len().max(1));
            }
            state.size = size;
            self.publish(&state);
        }
        self.fill().await
    }

    /// Refetch every requested page in order, keeping the current data
    /// visible until each replacement arrives.
    pub async fn revalidate(&self) -> Result<(), SharedError> {
        self.refetch().await.map(|_| ())
    }

    /// Like [`revalidate`](Self::revalidate), reporting whether the pages
    /// were actually refetched (`Skipped` on a null key).
    async fn refetch(&self) -> Result<Refetch, SharedError> {
        let (epoch, count) = {
            let mut state = self.state();
            state.epoch += 1;
            (state.epoch, state.size)
        };
        for index in 0..count {
            let Some(key) = self.key(index) else {
                tracing::debug!(index, "no page key, revalidation skipped");
                return Ok(Refetch::Skipped);
            };
            {
                let mut state = self.state();
                // superseded by a newer mutation or revalidation
                if state.epoch != epoch || index >= state.size {
                    return Ok(Refetch::Done);
                }
                state.slot_mut(index).in_flight = Some(epoch);
                self.publish(&state);
            }
            tracing::debug!(?key, "revalidating page");
            match self.load_detached(index, epoch, key).await {
                Resolution::Stale => return Ok(Refetch::Done),
                Resolution::Loaded { short: true } => break,
                Resolution::Loaded { short: false } => {}
                Resolution::Failed(e) => return Err(e),
            }
        }
        Ok(Refetch::Done)
    }

    /// Overwrite the cached pages with `optimistic` (if given) right away,
    /// then reconcile by revalidating.
    ///
    /// The optimistic value is visible as soon as this returns, before the
    /// returned future is polled.
    pub fn mutate(
        &self,
        optimistic: Option<Vec<Vec<T>>>,
        options: MutateOptions,
    ) -> impl Future<Output = Result<MutationOutcome, MutationError>>
    + Send
    + 'static
    + use<T, L> {
        let saved = self.begin_mutation(optimistic);
        let list = self.clone();
        async move {
            if !options.revalidate {
                return Ok(MutationOutcome::NoOp);
            }
            let result = list.refetch().await;
            list.settle(saved, result, options)
        }
    }

    /// Like [`mutate`](Self::mutate), but reconciliation first runs
    /// `request` (typically the write that the optimistic value predicts)
    /// and only revalidates once it has succeeded.
    pub fn mutate_with<F, R>(
        &self,
        optimistic: Option<Vec<Vec<T>>>,
        request: F,
        options: MutateOptions,
    ) -> impl Future<Output = Result<MutationOutcome, MutationError>>
    + Send
    + 'static
    + use<T, L, F, R>
    where
        F: Future<Output = Result<R, ClientError>> + Send + 'static,
        R: Send + 'static,
    {
        let saved = self.begin_mutation(optimistic);
        let list = self.clone();
        async move {
            let result = match request.await {
                Ok(_) if options.revalidate => list.refetch().await,
                // the write itself confirmed the change
                Ok(_) => Ok(Refetch::Done),
                Err(e) => Err(Arc::new(e)),
            };
            list.settle(saved, result, options)
        }
    }

    fn begin_mutation(&self, optimistic: Option<Vec<Vec<T>>>) -> Saved<T> {
        let mut state = self.state();
        let saved = state.save();
        if let Some(pages) = optimistic {
            state.apply(pages);
            self.publish(&state);
        }
        saved
    }

    fn settle(
        &self,
        saved: Saved<T>,
        result: Result<Refetch, SharedError>,
        options: MutateOptions,
    ) -> Result<MutationOutcome, MutationError> {
        let source = match result {
            Ok(Refetch::Done) => return Ok(MutationOutcome::Committed),
            // nothing confirmed the optimistic value; it stays as is
            Ok(Refetch::Skipped) => return Ok(MutationOutcome::NoOp),
            Err(e) => e,
        };
        let mut state = self.state();
        let rolled_back =
            options.rollback_on_error && state.mutation_seq == saved.seq;
        if rolled_back {
            tracing::info!("mutation failed, restoring previous pages: {source}");
            state.restore(saved);
        } else {
            tracing::warn!("mutation failed: {source}");
        }
        if source.is_user_visible() {
            state.error = Some(source.clone());
        }
        self.publish(&state);
        Err(MutationError {
            rolled_back,
            source,
        })
    }

    async fn fill(&self) -> Result<(), SharedError> {
        let mut index = 0;
        let mut waited = false;
        loop {
            // subscribe before inspecting state so no update is missed
            let mut updates = self.inner.updates.subscribe();
            let Some(key) = self.key(index) else {
                return Ok(());
            };
            let step = {
                let mut state = self.state();
                if index >= state.size {
                    return Ok(());
                }
                let epoch = state.epoch;
                let slot = state.slot_mut(index);
                let step = if slot.data.is_some() {
                    Step::Next
                } else if slot.in_flight == Some(epoch) {
                    Step::Wait
                } else if let (true, Some(e)) = (waited, &slot.error) {
                    // the request we waited on failed; retrying is the
                    // caller's decision
                    Step::Fail(e.clone())
                } else {
                    slot.in_flight = Some(epoch);
                    Step::Fetch(epoch)
                };
                if matches!(step, Step::Fetch(_)) {
                    self.publish(&state);
                }
                step
            };

            match step {
                Step::Next => {
                    index += 1;
                    waited = false;
                }
                Step::Wait => {
                    waited = true;
                    if updates.changed().await.is_err() {
                        return Ok(());
                    }
                }
                Step::Fail(e) => return Err(e),
                Step::Fetch(epoch) => {
                    tracing::debug!(?key, "loading page");
                    match self.load_detached(index, epoch, key.clone()).await {
                        Resolution::Stale => {
                            tracing::debug!(?key, "ignoring stale page");
                            waited = false;
                        }
                        Resolution::Loaded { .. } => {
                            index += 1;
                            waited = false;
                        }
                        Resolution::Failed(e) => {
                            if e.is_user_visible() {
                                tracing::warn!(?key, "page failed to load: {e}");
                            }
                            return Err(e);
                        }
                    }
                }
            }
        }
    }

    /// Load a page on its own task. The request runs to completion and
    /// resolves its slot even when the caller stops waiting for it.
    async fn load_detached(
        &self,
        index: usize,
        epoch: u64,
        key: PageKey,
    ) -> Resolution {
        let list = self.clone();
        let task = tokio::spawn(async move {
            let result = list.inner.loader.load_page(&key).await;
            list.resolve_page(index, epoch, result)
        });
        match task.await {
            Ok(resolution) => resolution,
            Err(e) => {
                // the task died before resolving; release the slot
                let resolution =
                    self.resolve_page(index, epoch, Err(ClientError::Cancelled));
                if e.is_panic() {
                    std::panic::resume_unwind(e.into_panic());
                }
                resolution
            }
        }
    }

    fn resolve_page(
        &self,
        index: usize,
        epoch: u64,
        result: Result<Vec<T>, ClientError>,
    ) -> Resolution {
        let mut state = self.state();
        let resolution =
            state.resolve(index, epoch, self.inner.page_size, result);
        self.publish(&state);
        resolution
    }

    fn key(&self, index: usize) -> Option<PageKey> {
        let page = u32::try_from(index).ok()?;
        self.inner.loader.page_key(page, self.inner.page_size)
    }

    fn state(&self) -> MutexGuard<'_, ListState<T>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &ListState<T>) {
        self.inner.updates.send_replace(state.snapshot());
    }
}
