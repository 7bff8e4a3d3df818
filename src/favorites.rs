use crate::models::MovieId;
use crate::storage::KeyValueStore;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const FAVORITES_KEY: &str = "favorites";

pub type SharedFavorites = Arc<Mutex<FavoritesStore>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteEvent {
    Added(MovieId),
    Removed(MovieId),
}

impl FavoriteEvent {
    pub fn id(&self) -> MovieId {
        match self {
            FavoriteEvent::Added(id) | FavoriteEvent::Removed(id) => *id,
        }
    }

    pub fn is_favorite(&self) -> bool {
        matches!(self, FavoriteEvent::Added(_))
    }

    pub fn message(&self) -> &'static str {
        match self {
            FavoriteEvent::Added(_) => "Added to favorites",
            FavoriteEvent::Removed(_) => "Removed from favorites",
        }
    }
}

pub struct FavoritesStore {
    storage: Arc<dyn KeyValueStore>,
    ids: Vec<MovieId>,
    members: HashSet<MovieId>,
}

impl std::fmt::Debug for FavoritesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FavoritesStore")
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

impl FavoritesStore {
    pub fn load(storage: Arc<dyn KeyValueStore>) -> Self {
        let ids = read_ids(storage.as_ref());
        let mut store = Self {
            storage,
            ids: Vec::new(),
            members: HashSet::new(),
        };
        store.replace(ids);
        store
    }

    pub fn shared(self) -> SharedFavorites {
        Arc::new(Mutex::new(self))
    }

    pub fn reload(&mut self) {
        let ids = read_ids(self.storage.as_ref());
        self.replace(ids);
    }

    pub fn is_favorite(&self, id: MovieId) -> bool {
        self.members.contains(&id)
    }

    pub fn ids(&self) -> &[MovieId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Flips membership of `id` and persists the whole set before returning.
    ///
    /// If persisting fails the in-memory set is rolled back, order included.
    pub fn toggle(&mut self, id: MovieId) -> Result<FavoriteEvent> {
        let removed_at = self.ids.iter().position(|x| *x == id);
        let event = match removed_at {
            Some(pos) => {
                self.ids.remove(pos);
                self.members.remove(&id);
                FavoriteEvent::Removed(id)
            }
            None => {
                self.ids.push(id);
                self.members.insert(id);
                FavoriteEvent::Added(id)
            }
        };

        if let Err(e) = self.persist() {
            match removed_at {
                Some(pos) => {
                    self.ids.insert(pos, id);
                    self.members.insert(id);
                }
                None => {
                    self.ids.pop();
                    self.members.remove(&id);
                }
            }
            return Err(e);
        }
        info!("{} (movie {})", event.message(), id);
        Ok(event)
    }

    pub fn remove(&mut self, id: MovieId) -> Result<Option<FavoriteEvent>> {
        if !self.is_favorite(id) {
            return Ok(None);
        }
        self.toggle(id).map(Some)
    }

    fn replace(&mut self, ids: Vec<MovieId>) {
        self.ids.clear();
        self.members.clear();
        for id in ids {
            if self.members.insert(id) {
                self.ids.push(id);
            }
        }
    }

    fn persist(&self) -> Result<()> {
        let encoded = serde_json::to_string(&self.ids).context("encoding favorites")?;
        self.storage
            .set(FAVORITES_KEY, &encoded)
            .context("persisting favorites")
    }
}

fn read_ids(storage: &dyn KeyValueStore) -> Vec<MovieId> {
    let raw = match storage.get(FAVORITES_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("Failed to read favorites, starting empty: {:#}", e);
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<MovieId>>(&raw) {
        Ok(ids) => ids,
        Err(e) => {
            warn!("Stored favorites are not a JSON id array, starting empty: {}", e);
            Vec::new()
        }
    }
}
