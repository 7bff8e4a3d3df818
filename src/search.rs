use crate::models::{MoviePage, MovieSummary};
use crate::tmdb::{CatalogApi, CatalogError, CatalogResult};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    Idle,
    Loading,
    Empty,
    Results,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    generation: u64,
    query: String,
}

impl SearchTicket {
    pub fn query(&self) -> &str {
        &self.query
    }
}

#[derive(Debug, Default)]
pub struct SearchController {
    query: String,
    generation: u64,
    results: Vec<MovieSummary>,
    total_results: u32,
    loading: bool,
    last_error: Option<String>,
}

impl SearchController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> &[MovieSummary] {
        &self.results
    }

    pub fn total_results(&self) -> u32 {
        self.total_results
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn phase(&self) -> SearchPhase {
        if self.query.is_empty() {
            SearchPhase::Idle
        } else if self.loading {
            SearchPhase::Loading
        } else if self.results.is_empty() {
            SearchPhase::Empty
        } else {
            SearchPhase::Results
        }
    }

    pub fn set_query(&mut self, query: &str) -> Option<SearchTicket> {
        self.generation += 1;
        self.query = query.trim().to_string();
        self.results.clear();
        self.total_results = 0;
        self.last_error = None;

        if self.query.is_empty() {
            self.loading = false;
            return None;
        }
        self.loading = true;
        Some(SearchTicket {
            generation: self.generation,
            query: self.query.clone(),
        })
    }

    /// Applies a response. Returns `false` if the ticket is stale and the response was dropped.
    ///
    /// On failure the controller keeps its empty result set; the error is kept for display.
    pub fn apply(&mut self, ticket: &SearchTicket, result: CatalogResult<MoviePage>) -> bool {
        if ticket.generation != self.generation {
            debug!("Discarding stale results for '{}'", ticket.query);
            return false;
        }
        self.loading = false;
        match result {
            Ok(page) => {
                self.total_results = page.total_results;
                self.results = page.results;
            }
            Err(e) => {
                warn!("Search for '{}' failed: {}", ticket.query, e);
                self.last_error = Some(e.to_string());
            }
        }
        true
    }

    pub async fn run(&mut self, api: &dyn CatalogApi, query: &str) -> Result<SearchPhase, CatalogError> {
        let Some(ticket) = self.set_query(query) else {
            return Ok(SearchPhase::Idle);
        };
        let result = api.fetch_by_query(ticket.query(), 1).await;
        let failure = result.as_ref().err().cloned();
        self.apply(&ticket, result);
        match failure {
            Some(e) => Err(e),
            None => Ok(self.phase()),
        }
    }
}
