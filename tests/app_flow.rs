use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use cinefav::app::{build_router, AppState};
use cinefav::favorites::{FavoritesStore, FAVORITES_KEY};
use cinefav::models::{MovieDetail, MovieId, MoviePage, MovieSummary, Video};
use cinefav::storage::{KeyValueStore, MemoryStore};
use cinefav::tmdb::{CatalogApi, CatalogError, CatalogResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

fn movie(id: MovieId) -> MovieSummary {
    MovieSummary {
        id,
        title: format!("Movie {id}"),
        overview: format!("Overview of {id}"),
        poster_path: Some(format!("/poster-{id}.jpg")),
        backdrop_path: Some(format!("/backdrop-{id}.jpg")),
        release_date: "2023-05-01".to_string(),
        vote_average: 6.8,
        genre_ids: vec![18],
    }
}

fn detail(id: MovieId) -> MovieDetail {
    MovieDetail {
        summary: movie(id),
        runtime: Some(101),
        genres: vec![],
        cast: vec![],
        directors: vec![],
        videos: vec![Video {
            key: format!("trailer-{id}"),
            site: "YouTube".to_string(),
            video_type: "Trailer".to_string(),
        }],
    }
}

struct FakeCatalog {
    total_pages: u32,
    details: HashMap<MovieId, MovieDetail>,
    search_hits: Vec<MovieSummary>,
    fail_pages: Mutex<Vec<u32>>,
    malformed_pages: Mutex<Vec<u32>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    fn new(total_pages: u32) -> Self {
        Self {
            total_pages,
            details: HashMap::new(),
            search_hits: Vec::new(),
            fail_pages: Mutex::new(Vec::new()),
            malformed_pages: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_details(mut self, ids: &[MovieId]) -> Self {
        for id in ids {
            self.details.insert(*id, detail(*id));
        }
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn listing_page(&self, offset: MovieId, page: u32) -> CatalogResult<MoviePage> {
        let mut fails = self.fail_pages.lock().unwrap();
        if let Some(pos) = fails.iter().position(|p| *p == page) {
            fails.remove(pos);
            return Err(CatalogError::Network("connection refused".to_string()));
        }
        if self.malformed_pages.lock().unwrap().contains(&page) {
            return Err(CatalogError::Parse("missing field `total_pages`".to_string()));
        }
        Ok(MoviePage {
            page,
            results: (0..20)
                .map(|i| movie(offset + page as MovieId * 100 + i))
                .collect(),
            total_pages: self.total_pages,
            total_results: self.total_pages * 20,
        })
    }
}

#[async_trait::async_trait]
impl CatalogApi for FakeCatalog {
    async fn fetch_popular(&self, page: u32) -> CatalogResult<MoviePage> {
        self.calls.lock().unwrap().push(format!("popular:{page}"));
        self.listing_page(0, page)
    }

    async fn fetch_top_rated(&self, page: u32) -> CatalogResult<MoviePage> {
        self.calls.lock().unwrap().push(format!("top_rated:{page}"));
        self.listing_page(10_000, page)
    }

    async fn fetch_by_query(&self, query: &str, page: u32) -> CatalogResult<MoviePage> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("search:{query}:{page}"));
        Ok(MoviePage {
            page,
            results: self.search_hits.clone(),
            total_pages: if self.search_hits.is_empty() { 0 } else { 1 },
            total_results: self.search_hits.len() as u32,
        })
    }

    async fn fetch_detail(&self, id: MovieId) -> CatalogResult<MovieDetail> {
        self.calls.lock().unwrap().push(format!("detail:{id}"));
        self.details
            .get(&id)
            .cloned()
            .ok_or(CatalogError::NotFound(id))
    }
}

fn app_with(catalog: FakeCatalog, storage: Arc<MemoryStore>) -> (Router, Arc<FakeCatalog>) {
    let catalog = Arc::new(catalog);
    let favorites = FavoritesStore::load(storage).shared();
    let state = AppState::new(catalog.clone(), favorites);
    (build_router(state), catalog)
}

async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("failed to build request");
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

fn ids(cards: &Value) -> Vec<i64> {
    cards
        .as_array()
        .expect("card array")
        .iter()
        .map(|c| c["id"].as_i64().expect("card id"))
        .collect()
}

#[tokio::test]
async fn home_shows_hero_featured_and_trending() {
    let (app, _catalog) = app_with(FakeCatalog::new(5), Arc::new(MemoryStore::new()));
    let (status, body) = call(&app, Method::GET, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hero"]["card"]["id"], 100);
    assert_eq!(ids(&body["featured"]["movies"]), (101..=108).collect::<Vec<_>>());
    assert_eq!(body["trending"]["movies"].as_array().unwrap().len(), 20);
    assert_eq!(body["trending"]["title"], "Trending Now");
}

#[tokio::test]
async fn unknown_movie_renders_not_found_view() {
    let (app, _catalog) = app_with(
        FakeCatalog::new(1).with_details(&[603]),
        Arc::new(MemoryStore::new()),
    );
    let (status, body) = call(&app, Method::GET, "/movie/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["title"], "Movie not found");

    let (status, body) = call(&app, Method::GET, "/movie/603").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["trailer_url"],
        "https://www.youtube.com/watch?v=trailer-603"
    );
    assert_eq!(body["card"]["is_favorite"], false);
}

#[tokio::test]
async fn toggling_twice_restores_membership_with_two_toasts() {
    let storage = Arc::new(MemoryStore::new());
    let (app, _catalog) = app_with(FakeCatalog::new(1).with_details(&[7]), storage.clone());

    let (status, first) = call(&app, Method::POST, "/favorites/7/toggle").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["is_favorite"], true);
    assert_eq!(first["toast"]["message"], "Added to favorites");
    assert_eq!(storage.get(FAVORITES_KEY).unwrap().as_deref(), Some("[7]"));

    let (_, detail) = call(&app, Method::GET, "/movie/7").await;
    assert_eq!(detail["card"]["is_favorite"], true);

    let (_, second) = call(&app, Method::POST, "/favorites/7/toggle").await;
    assert_eq!(second["is_favorite"], false);
    assert_eq!(second["toast"]["message"], "Removed from favorites");
    assert_eq!(second["toast"]["duration_ms"], 3000);
    assert_eq!(storage.get(FAVORITES_KEY).unwrap().as_deref(), Some("[]"));
}

#[tokio::test]
async fn persisted_favorites_survive_restart() {
    let storage = Arc::new(MemoryStore::with_entry(FAVORITES_KEY, "[10,42]"));
    let (app, _catalog) = app_with(
        FakeCatalog::new(1).with_details(&[10, 42]),
        storage.clone(),
    );

    let (_, detail) = call(&app, Method::GET, "/movie/42").await;
    assert_eq!(detail["card"]["is_favorite"], true);

    let (_, toggled) = call(&app, Method::POST, "/favorites/42/toggle").await;
    assert_eq!(toggled["is_favorite"], false);
    assert_eq!(storage.get(FAVORITES_KEY).unwrap().as_deref(), Some("[10]"));

    let (status, page) = call(&app, Method::GET, "/favorites").await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<i64> = page["movies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["card"]["id"].as_i64().unwrap())
        .collect();
    assert_eq!(listed, vec![10]);
}

#[tokio::test]
async fn corrupt_favorites_start_empty() {
    let storage = Arc::new(MemoryStore::with_entry(FAVORITES_KEY, "not json"));
    let (app, catalog) = app_with(FakeCatalog::new(1), storage);
    let (status, page) = call(&app, Method::GET, "/favorites").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["empty"]["title"], "No favorites yet");
    assert!(catalog.calls().is_empty());
}

#[tokio::test]
async fn favorites_page_skips_missing_movies_and_sees_external_writes() {
    let storage = Arc::new(MemoryStore::with_entry(FAVORITES_KEY, "[5]"));
    let (app, _catalog) = app_with(FakeCatalog::new(1).with_details(&[5, 6]), storage.clone());

    storage.set(FAVORITES_KEY, "[6,404,5]").unwrap();
    let (status, page) = call(&app, Method::GET, "/favorites").await;
    assert_eq!(status, StatusCode::OK);
    let listed: Vec<i64> = page["movies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["card"]["id"].as_i64().unwrap())
        .collect();
    assert_eq!(listed, vec![6, 5]);
}

#[tokio::test]
async fn removing_from_favorites_page_never_re_adds() {
    let storage = Arc::new(MemoryStore::with_entry(FAVORITES_KEY, "[3,8,5]"));
    let (app, _catalog) = app_with(FakeCatalog::new(1).with_details(&[3, 8, 5]), storage.clone());

    let (status, removed) = call(&app, Method::DELETE, "/favorites/8").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["is_favorite"], false);
    assert_eq!(removed["toast"]["message"], "Removed from favorites");
    assert_eq!(storage.get(FAVORITES_KEY).unwrap().as_deref(), Some("[3,5]"));

    let (status, again) = call(&app, Method::DELETE, "/favorites/8").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(again["status"], "error");
    assert_eq!(storage.get(FAVORITES_KEY).unwrap().as_deref(), Some("[3,5]"));

    let (_, page) = call(&app, Method::GET, "/favorites").await;
    let listed: Vec<i64> = page["movies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["card"]["id"].as_i64().unwrap())
        .collect();
    assert_eq!(listed, vec![3, 5]);
}

#[tokio::test]
async fn blank_search_is_idle_and_never_fetches() {
    let (app, catalog) = app_with(FakeCatalog::new(1), Arc::new(MemoryStore::new()));
    for uri in ["/search", "/search?q=", "/search?q=%20%20"] {
        let (status, body) = call(&app, Method::GET, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "idle");
        assert_eq!(body["empty"]["title"], "Start searching");
    }
    assert!(catalog.calls().is_empty());
}

#[tokio::test]
async fn search_without_hits_is_not_found_not_idle() {
    let (app, catalog) = app_with(FakeCatalog::new(1), Arc::new(MemoryStore::new()));
    let (status, body) = call(&app, Method::GET, "/search?q=batman").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "empty");
    assert_eq!(body["empty"]["title"], "No results found");
    assert_eq!(catalog.calls(), vec!["search:batman:1".to_string()]);
}

#[tokio::test]
async fn search_with_hits_lists_cards() {
    let mut catalog = FakeCatalog::new(1);
    catalog.search_hits = vec![movie(268), movie(272)];
    let (app, _catalog) = app_with(catalog, Arc::new(MemoryStore::with_entry(FAVORITES_KEY, "[272]")));
    let (_, body) = call(&app, Method::GET, "/search?q=%20the%20dark%20knight%20%20").await;
    assert_eq!(body["phase"], "results");
    assert_eq!(body["summary"], "Found 2 results for \"the dark knight\"");
    assert_eq!(ids(&body["movies"]), vec![268, 272]);
    assert_eq!(body["movies"][1]["is_favorite"], true);
}

#[tokio::test]
async fn listing_grows_until_last_page_then_stops() {
    let (app, catalog) = app_with(FakeCatalog::new(3), Arc::new(MemoryStore::new()));
    let (status, opened) = call(&app, Method::POST, "/listings/popular").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(opened["movies"].as_array().unwrap().len(), 8);
    assert_eq!(opened["has_more"], true);
    let session = opened["session"].as_str().unwrap().to_string();
    let more = format!("/listings/{session}/more");

    let (status, page2) = call(&app, Method::POST, &more).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page2["has_more"], true);
    assert_eq!(page2["current_page"], 2);

    let (_, page3) = call(&app, Method::POST, &more).await;
    assert_eq!(page3["has_more"], false);
    assert_eq!(page3["load_more_enabled"], false);
    assert_eq!(page3["movies"].as_array().unwrap().len(), 24);

    let (status, after) = call(&app, Method::POST, &more).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(after["movies"].as_array().unwrap().len(), 24);
    assert_eq!(
        catalog.calls(),
        vec!["popular:1".to_string(), "popular:2".to_string(), "popular:3".to_string()]
    );
}

#[tokio::test]
async fn failed_load_more_keeps_items_and_allows_retry() {
    let catalog = FakeCatalog::new(4);
    catalog.fail_pages.lock().unwrap().push(2);
    let (app, _catalog) = app_with(catalog, Arc::new(MemoryStore::new()));
    let (_, opened) = call(&app, Method::POST, "/listings/top_rated").await;
    let session = opened["session"].as_str().unwrap().to_string();
    let more = format!("/listings/{session}/more");

    let (status, _) = call(&app, Method::POST, &more).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let (_, current) = call(&app, Method::GET, &format!("/listings/{session}")).await;
    assert_eq!(current["movies"].as_array().unwrap().len(), 20);
    assert_eq!(current["has_more"], true);
    assert_eq!(current["phase"], "loaded");

    let (status, retried) = call(&app, Method::POST, &more).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(retried["movies"].as_array().unwrap().len(), 40);
}

#[tokio::test]
async fn malformed_catalog_response_is_bad_gateway_and_keeps_state() {
    let catalog = FakeCatalog::new(4);
    catalog.malformed_pages.lock().unwrap().push(2);
    let (app, catalog) = app_with(catalog, Arc::new(MemoryStore::new()));
    let (_, opened) = call(&app, Method::POST, "/listings/popular").await;
    let session = opened["session"].as_str().unwrap().to_string();

    let (status, body) = call(&app, Method::POST, &format!("/listings/{session}/more")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("total_pages"));

    let (_, current) = call(&app, Method::GET, &format!("/listings/{session}")).await;
    assert_eq!(ids(&current["movies"]), ids(&opened["movies"]));
    assert_eq!(current["current_page"], 1);
    assert_eq!(current["has_more"], true);
    assert_eq!(current["load_more_enabled"], true);

    catalog.malformed_pages.lock().unwrap().push(1);
    let (status, _) = call(&app, Method::GET, "/").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn sentinel_loads_once_per_growth() {
    let (app, catalog) = app_with(FakeCatalog::new(5), Arc::new(MemoryStore::new()));
    let (_, opened) = call(&app, Method::POST, "/listings/popular").await;
    let session = opened["session"].as_str().unwrap().to_string();
    let visible = format!("/listings/{session}/visible");

    let (_, first) = call(&app, Method::POST, &visible).await;
    assert_eq!(first["movies"].as_array().unwrap().len(), 16);
    let (_, second) = call(&app, Method::POST, &visible).await;
    assert_eq!(second["movies"].as_array().unwrap().len(), 24);

    catalog.fail_pages.lock().unwrap().push(4);
    let (status, _) = call(&app, Method::POST, &visible).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    // Same item count as the failed sighting: stays quiet until something changes.
    let (status, quiet) = call(&app, Method::POST, &visible).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quiet["movies"].as_array().unwrap().len(), 24);
    assert_eq!(catalog.calls().len(), 4);

    let (status, _) = call(&app, Method::POST, &format!("/listings/{session}/more")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(catalog.calls().len(), 5);
}

#[tokio::test]
async fn closed_listing_is_gone() {
    let (app, _catalog) = app_with(FakeCatalog::new(2), Arc::new(MemoryStore::new()));
    let (_, opened) = call(&app, Method::POST, "/listings/popular").await;
    let session = opened["session"].as_str().unwrap().to_string();
    let uri = format!("/listings/{session}");

    let (status, _) = call(&app, Method::DELETE, &uri).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&app, Method::GET, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(&app, Method::DELETE, &uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_listing_kind_is_rejected() {
    let (app, catalog) = app_with(FakeCatalog::new(2), Arc::new(MemoryStore::new()));
    let (status, body) = call(&app, Method::POST, "/listings/upcoming").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert!(catalog.calls().is_empty());
}
