use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::SpeciesClient;
use crate::domain::{PageCursor, SpeciesPage, SpeciesRecord};
use crate::error::{FetchError, StoreError};
use crate::search::{Debouncer, SearchMode, SearchQuery, filter_species};
use crate::store::SpeciesStore;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Loading,
    LoadedWithMore,
    LoadedComplete,
    Errored,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SyncState::Idle => "idle",
            SyncState::Loading => "loading",
            SyncState::LoadedWithMore => "loaded (more available)",
            SyncState::LoadedComplete => "loaded (complete)",
            SyncState::Errored => "errored",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub page_size: u32,
    pub search_debounce: Duration,
    pub search_mode: SearchMode,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
            search_mode: SearchMode::Names,
        }
    }
}

/// Everything the presentation layer needs to render, captured after a
/// transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub state: SyncState,
    pub current_page: u32,
    pub has_more_pages: bool,
    pub error_message: Option<String>,
    pub search_text: String,
    pub species: Vec<SpeciesRecord>,
    pub cached_total: usize,
    pub remote_total: Option<u64>,
}

impl Snapshot {
    pub fn is_loading(&self) -> bool {
        self.state == SyncState::Loading
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FetchTicket {
    page: u32,
    generation: u64,
}

type FetchOutcome = (FetchTicket, Result<SpeciesPage, FetchError>);

/// Owns the page cursor and search query, pulls pages from the remote client
/// into the local store, and keeps the filtered projection current.
///
/// All mutation happens on the owning thread. Background fetches only run the
/// client call on a worker and hand the result back through `poll`/`wait`.
pub struct SyncCoordinator<C, S> {
    client: Arc<C>,
    store: S,
    options: CoordinatorOptions,
    cursor: PageCursor,
    state: SyncState,
    error_message: Option<String>,
    local: Vec<SpeciesRecord>,
    filtered: Vec<SpeciesRecord>,
    query: SearchQuery,
    debouncer: Debouncer<String>,
    remote_total: Option<u64>,
    generation: u64,
    in_flight: Option<FetchTicket>,
    results_tx: Sender<FetchOutcome>,
    results_rx: Receiver<FetchOutcome>,
    subscribers: Vec<Sender<Snapshot>>,
}

impl<C, S> SyncCoordinator<C, S>
where
    C: SpeciesClient + 'static,
    S: SpeciesStore,
{
    pub fn new(client: C, store: S, options: CoordinatorOptions) -> Self {
        let local = store.all();
        let cursor = PageCursor::resume_after(store.highest_fetched_page());
        let query = SearchQuery::default();
        let filtered = filter_species(&local, &query, options.search_mode);
        let (results_tx, results_rx) = mpsc::channel();
        debug!(
            cached = local.len(),
            next_page = cursor.current_page(),
            "coordinator initialised"
        );
        Self {
            client: Arc::new(client),
            store,
            debouncer: Debouncer::new(options.search_debounce),
            options,
            cursor,
            state: SyncState::Idle,
            error_message: None,
            local,
            filtered,
            query,
            remote_total: None,
            generation: 0,
            in_flight: None,
            results_tx,
            results_rx,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn cursor(&self) -> PageCursor {
        self.cursor
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn filtered_species(&self) -> &[SpeciesRecord] {
        &self.filtered
    }

    pub fn search_text(&self) -> &str {
        self.query.as_str()
    }

    pub fn search_mode(&self) -> SearchMode {
        self.options.search_mode
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            current_page: self.cursor.current_page(),
            has_more_pages: self.cursor.has_more_pages(),
            error_message: self.error_message.clone(),
            search_text: self.query.as_str().to_string(),
            species: self.filtered.clone(),
            cached_total: self.local.len(),
            remote_total: self.remote_total,
        }
    }

    /// Registers a listener that receives a snapshot after every change.
    pub fn subscribe(&mut self) -> Receiver<Snapshot> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    fn can_load_more(&self) -> bool {
        self.state != SyncState::Loading && self.cursor.has_more_pages()
    }

    /// Fetches the next page and merges it. Returns `false` without doing
    /// anything while a fetch is in flight or once the listing is exhausted.
    pub fn load_next_page(&mut self) -> bool {
        if !self.can_load_more() {
            return false;
        }
        let ticket = self.begin_fetch();
        self.fetch_now(ticket);
        true
    }

    /// Restarts pagination from page 1. No-op while a fetch is in flight.
    pub fn refresh(&mut self) -> bool {
        match self.restart(false) {
            Some(ticket) => {
                self.fetch_now(ticket);
                true
            }
            None => false,
        }
    }

    /// Restarts pagination from page 1 even if a fetch is in flight; that
    /// fetch's records still land in the store but no longer move the cursor.
    pub fn force_refresh(&mut self) {
        if let Some(ticket) = self.restart(true) {
            self.fetch_now(ticket);
        }
    }

    /// Re-issues the page that failed, keeping the cursor where it is.
    pub fn retry(&mut self) -> bool {
        if self.state != SyncState::Errored {
            return false;
        }
        let ticket = self.begin_fetch();
        self.fetch_now(ticket);
        true
    }

    /// Background variant of `load_next_page`.
    pub fn start_next_page(&mut self) -> bool {
        if !self.can_load_more() {
            return false;
        }
        let ticket = self.begin_fetch();
        self.spawn_fetch(ticket);
        true
    }

    /// Background variant of `refresh` / `force_refresh`.
    pub fn start_refresh(&mut self, force: bool) -> bool {
        match self.restart(force) {
            Some(ticket) => {
                self.spawn_fetch(ticket);
                true
            }
            None => false,
        }
    }

    /// Infinite-scroll hook: loads the next page when the last visible record
    /// has been rendered.
    pub fn on_item_rendered(&mut self, id: i64) -> bool {
        let is_last = self.filtered.last().is_some_and(|record| record.id == id);
        if is_last && self.can_load_more() {
            return self.load_next_page();
        }
        false
    }

    /// Records raw search input; the filter is applied once input has been
    /// quiet for the configured debounce delay.
    pub fn set_search_text(&mut self, text: impl Into<String>) {
        self.debouncer.push(text.into(), Instant::now());
    }

    /// Applies pending search input immediately.
    pub fn flush_search(&mut self) -> bool {
        match self.debouncer.flush() {
            Some(text) => {
                self.apply_query(&text);
                true
            }
            None => false,
        }
    }

    pub fn set_search_mode(&mut self, mode: SearchMode) {
        if self.options.search_mode != mode {
            self.options.search_mode = mode;
            self.recompute();
            self.emit();
        }
    }

    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> bool {
        match self.debouncer.poll(now) {
            Some(text) => {
                self.apply_query(&text);
                true
            }
            None => false,
        }
    }

    /// Applies finished background fetches and due search input without
    /// blocking. Returns whether anything changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok((ticket, result)) = self.results_rx.try_recv() {
            self.complete_fetch(ticket, result);
            changed = true;
        }
        self.tick() || changed
    }

    /// Blocks up to `timeout` for one background fetch to finish and applies
    /// it.
    pub fn wait(&mut self, timeout: Duration) -> bool {
        match self.results_rx.recv_timeout(timeout) {
            Ok((ticket, result)) => {
                self.complete_fetch(ticket, result);
                true
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }

    fn restart(&mut self, force: bool) -> Option<FetchTicket> {
        if self.state == SyncState::Loading {
            if !force {
                return None;
            }
            debug!(
                stale_page = self.in_flight.map(|ticket| ticket.page),
                "forcing refresh over in-flight fetch"
            );
        }
        self.generation += 1;
        self.in_flight = None;
        self.cursor.reset();
        Some(self.begin_fetch())
    }

    fn begin_fetch(&mut self) -> FetchTicket {
        let ticket = FetchTicket {
            page: self.cursor.current_page(),
            generation: self.generation,
        };
        self.in_flight = Some(ticket);
        self.error_message = None;
        self.transition(SyncState::Loading);
        ticket
    }

    fn fetch_now(&mut self, ticket: FetchTicket) {
        let result = self.client.fetch_page(ticket.page, self.options.page_size);
        self.complete_fetch(ticket, result);
    }

    fn spawn_fetch(&self, ticket: FetchTicket) {
        let client = Arc::clone(&self.client);
        let tx = self.results_tx.clone();
        let page_size = self.options.page_size;
        thread::spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                client.fetch_page(ticket.page, page_size)
            }))
            .unwrap_or_else(|_| Err(FetchError::Network("fetch worker panicked".to_string())));
            let _ = tx.send((ticket, result));
        });
    }

    fn complete_fetch(&mut self, ticket: FetchTicket, result: Result<SpeciesPage, FetchError>) {
        if self.in_flight != Some(ticket) {
            self.land_stale(ticket, result);
            return;
        }
        self.in_flight = None;

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                warn!(page = ticket.page, error = %err, "species fetch failed");
                self.fail(fetch_message(&err));
                return;
            }
        };

        if let Some(meta) = page.meta {
            self.remote_total = Some(meta.total);
        }

        if page.is_empty() {
            debug!(page = ticket.page, "empty page, listing exhausted");
            self.cursor.mark_exhausted();
            self.transition(SyncState::LoadedComplete);
            return;
        }

        let records = stamp(page, ticket.page);
        if let Err(err) = self.store.upsert(records) {
            self.fail(store_message(&err));
            return;
        }
        self.cursor.advance();
        self.reload_local();
        self.transition(SyncState::LoadedWithMore);
    }

    /// A response from before a forced refresh. Its records are still valid
    /// and upserts are idempotent, so they are merged; the cursor and state
    /// belong to the newer fetch and are left alone.
    fn land_stale(&mut self, ticket: FetchTicket, result: Result<SpeciesPage, FetchError>) {
        let Ok(page) = result else {
            debug!(page = ticket.page, "dropping failed stale fetch");
            return;
        };
        if page.is_empty() {
            return;
        }
        debug!(page = ticket.page, "merging stale fetch");
        match self.store.upsert(stamp(page, ticket.page)) {
            Ok(()) => {
                self.reload_local();
                self.emit();
            }
            Err(err) => {
                // The newer fetch still owns the state; only the message changes.
                warn!(page = ticket.page, error = %err, "stale merge failed");
                self.error_message = Some(store_message(&err));
                self.emit();
            }
        }
    }

    fn fail(&mut self, message: String) {
        self.error_message = Some(message);
        // Whatever is already cached stays visible.
        self.reload_local();
        self.transition(SyncState::Errored);
    }

    fn apply_query(&mut self, text: &str) {
        self.query = SearchQuery::new(text);
        self.recompute();
        debug!(query = text, matches = self.filtered.len(), "search applied");
        self.emit();
    }

    fn reload_local(&mut self) {
        self.local = self.store.all();
        self.recompute();
    }

    fn recompute(&mut self) {
        self.filtered = filter_species(&self.local, &self.query, self.options.search_mode);
    }

    fn transition(&mut self, next: SyncState) {
        debug!(from = %self.state, to = %next, page = self.cursor.current_page(), "sync transition");
        self.state = next;
        self.emit();
    }

    fn emit(&mut self) {
        if self.subscribers.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        self.subscribers
            .retain(|subscriber| subscriber.send(snapshot.clone()).is_ok());
    }
}

fn stamp(page: SpeciesPage, page_number: u32) -> Vec<SpeciesRecord> {
    let now = Utc::now();
    page.species
        .into_iter()
        .map(|raw| SpeciesRecord::from_raw(raw, page_number, now))
        .collect()
}

fn fetch_message(err: &FetchError) -> String {
    match err {
        FetchError::Network(cause) => format!("Request failed: {cause}"),
        FetchError::Server(code) => format!("Server error with code: {code}"),
        FetchError::Decoding(cause) => format!("Failed to decode response: {cause}"),
    }
}

fn store_message(err: &StoreError) -> String {
    format!("Could not save species locally: {err}")
}
