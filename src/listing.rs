use crate::models::{MoviePage, MovieSummary};
use crate::tmdb::{CatalogApi, CatalogError, CatalogResult};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MAX_SESSIONS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    Popular,
    TopRated,
}

impl ListingKind {
    pub fn batch_size(self) -> usize {
        match self {
            ListingKind::Popular => 8,
            ListingKind::TopRated => 20,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            ListingKind::Popular => "Featured Movies",
            ListingKind::TopRated => "Trending Now",
        }
    }

    pub async fn fetch(self, api: &dyn CatalogApi, page: u32) -> CatalogResult<MoviePage> {
        match self {
            ListingKind::Popular => api.fetch_popular(page).await,
            ListingKind::TopRated => api.fetch_top_rated(page).await,
        }
    }
}

impl FromStr for ListingKind {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "popular" => Ok(ListingKind::Popular),
            "top_rated" | "top-rated" | "trending" => Ok(ListingKind::TopRated),
            _ => Err(anyhow::anyhow!("unknown listing '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingPhase {
    Initial,
    Loaded,
    LoadingMore,
}

#[derive(Debug)]
pub enum LoadMore {
    Appended { count: usize, has_more: bool },
    Rejected,
    Failed(CatalogError),
}

#[derive(Debug, Default, Clone)]
pub struct VisibilityTrigger {
    fired_at: Option<usize>,
}

impl VisibilityTrigger {
    pub fn on_visible(&mut self, item_count: usize) -> bool {
        if self.fired_at == Some(item_count) {
            return false;
        }
        self.fired_at = Some(item_count);
        true
    }
}

#[derive(Debug)]
pub struct ListingController {
    kind: ListingKind,
    items: Vec<MovieSummary>,
    current_page: u32,
    total_pages: u32,
    has_more: bool,
    phase: ListingPhase,
    trigger: VisibilityTrigger,
}

impl ListingController {
    pub fn new(kind: ListingKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
            current_page: 0,
            total_pages: 0,
            has_more: false,
            phase: ListingPhase::Initial,
            trigger: VisibilityTrigger::default(),
        }
    }

    pub fn kind(&self) -> ListingKind {
        self.kind
    }

    pub fn items(&self) -> &[MovieSummary] {
        &self.items
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn phase(&self) -> ListingPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == ListingPhase::Initial
    }

    pub fn is_loading_more(&self) -> bool {
        self.phase == ListingPhase::LoadingMore
    }

    pub async fn load_initial(&mut self, api: &dyn CatalogApi) -> CatalogResult<()> {
        if self.phase != ListingPhase::Initial {
            return Ok(());
        }
        let page = self.kind.fetch(api, 1).await?;
        self.items = page.results.into_iter().take(self.kind.batch_size()).collect();
        self.current_page = 1;
        self.total_pages = page.total_pages;
        self.has_more = 1 < page.total_pages;
        self.phase = ListingPhase::Loaded;
        debug!(
            "Loaded {:?} page 1/{} ({} items)",
            self.kind,
            self.total_pages,
            self.items.len()
        );
        Ok(())
    }

    /// Moves to `LoadingMore` and returns the page to fetch, or `None` if growth isn't allowed now.
    pub fn begin_load_more(&mut self) -> Option<u32> {
        if self.phase != ListingPhase::Loaded || !self.has_more {
            debug!(
                "Ignoring load more for {:?} (phase {:?}, has_more {})",
                self.kind, self.phase, self.has_more
            );
            return None;
        }
        self.phase = ListingPhase::LoadingMore;
        Some(self.current_page + 1)
    }

    pub fn finish_load_more(&mut self, page: u32, result: CatalogResult<MoviePage>) -> LoadMore {
        if self.phase != ListingPhase::LoadingMore || page != self.current_page + 1 {
            warn!("Dropping unexpected {:?} page {} response", self.kind, page);
            return LoadMore::Rejected;
        }
        self.phase = ListingPhase::Loaded;
        match result {
            Ok(resp) => {
                let before = self.items.len();
                self.items
                    .extend(resp.results.into_iter().take(self.kind.batch_size()));
                self.current_page = page;
                self.total_pages = resp.total_pages;
                if page >= resp.total_pages {
                    self.has_more = false;
                    info!("{:?} listing exhausted at page {}", self.kind, page);
                }
                LoadMore::Appended {
                    count: self.items.len() - before,
                    has_more: self.has_more,
                }
            }
            Err(e) => {
                warn!("Failed to load {:?} page {}: {}", self.kind, page, e);
                LoadMore::Failed(e)
            }
        }
    }

    pub async fn load_more(&mut self, api: &dyn CatalogApi) -> LoadMore {
        let Some(page) = self.begin_load_more() else {
            return LoadMore::Rejected;
        };
        let result = self.kind.fetch(api, page).await;
        self.finish_load_more(page, result)
    }

    pub fn on_sentinel_visible(&mut self) -> Option<u32> {
        if !self.trigger.on_visible(self.items.len()) {
            return None;
        }
        self.begin_load_more()
    }
}

pub type SharedListing = Arc<Mutex<ListingController>>;

/// Runs a load-more cycle on a shared controller without holding its lock across the fetch,
/// so concurrent triggers observe `LoadingMore` and are rejected.
pub async fn drive_load_more(
    listing: &SharedListing,
    api: &dyn CatalogApi,
    page: Option<u32>,
) -> LoadMore {
    let (kind, page) = match page {
        Some(p) => (listing.lock().await.kind(), p),
        None => {
            let mut guard = listing.lock().await;
            match guard.begin_load_more() {
                Some(p) => (guard.kind(), p),
                None => return LoadMore::Rejected,
            }
        }
    };
    let result = kind.fetch(api, page).await;
    listing.lock().await.finish_load_more(page, result)
}

struct SessionEntry {
    listing: SharedListing,
    last_used: Instant,
}

#[derive(Clone, Default)]
pub struct ListingSessions {
    inner: Arc<Mutex<HashMap<Uuid, SessionEntry>>>,
}

impl ListingSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self, kind: ListingKind) -> (Uuid, SharedListing) {
        let id = Uuid::new_v4();
        let listing = Arc::new(Mutex::new(ListingController::new(kind)));
        let mut guard = self.inner.lock().await;
        if guard.len() >= MAX_SESSIONS {
            if let Some(oldest) = guard
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| *k)
            {
                debug!("Evicting idle listing session {}", oldest);
                guard.remove(&oldest);
            }
        }
        guard.insert(
            id,
            SessionEntry {
                listing: listing.clone(),
                last_used: Instant::now(),
            },
        );
        (id, listing)
    }

    pub async fn get(&self, id: &Uuid) -> Option<SharedListing> {
        let mut guard = self.inner.lock().await;
        let entry = guard.get_mut(id)?;
        entry.last_used = Instant::now();
        Some(entry.listing.clone())
    }

    pub async fn close(&self, id: &Uuid) -> bool {
        self.inner.lock().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
