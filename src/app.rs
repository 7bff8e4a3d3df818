use crate::config::Config;
use crate::favorites::{FavoritesStore, SharedFavorites};
use crate::listing::{drive_load_more, ListingKind, ListingSessions, LoadMore, SharedListing};
use crate::models::{MovieId, MovieSummary};
use crate::search::SearchController;
use crate::storage::{FileStore, KeyValueStore};
use crate::tmdb::{CatalogApi, CatalogError, TmdbClient};
use crate::views::{
    DetailView, FavoriteToggleView, FavoritesView, HomeView, ListingView, SearchView,
};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogApi>,
    pub favorites: SharedFavorites,
    pub listings: ListingSessions,
}

impl AppState {
    pub fn new(catalog: Arc<dyn CatalogApi>, favorites: SharedFavorites) -> Self {
        Self {
            catalog,
            favorites,
            listings: ListingSessions::new(),
        }
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let catalog: Arc<dyn CatalogApi> = Arc::new(TmdbClient::new(&config)?);
    let storage = FileStore::open(&config.data_dir)?;
    info!("Using storage directory {}", storage.dir().display());
    let storage: Arc<dyn KeyValueStore> = Arc::new(storage);
    let favorites = FavoritesStore::load(storage);
    info!("Loaded {} favorites", favorites.len());

    let app = build_router(AppState::new(catalog, favorites.shared()));

    info!("Listening on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/movie/:id", get(movie_detail))
        .route("/favorites", get(favorites_page))
        .route("/favorites/:id", delete(remove_favorite))
        .route("/favorites/:id/toggle", post(toggle_favorite))
        .route("/search", get(search))
        // POST takes a listing kind, GET and DELETE a session id.
        .route(
            "/listings/:key",
            post(open_listing).get(show_listing).delete(close_listing),
        )
        .route("/listings/:key/more", post(load_more))
        .route("/listings/:key/visible", post(sentinel_visible))
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (
        status,
        Json(json!({ "status": "error", "message": message.to_string() })),
    )
        .into_response()
}

fn catalog_failure(err: &CatalogError) -> Response {
    match err {
        CatalogError::NotFound(id) => {
            (StatusCode::NOT_FOUND, Json(DetailView::not_found(*id))).into_response()
        }
        _ => error_response(StatusCode::BAD_GATEWAY, err),
    }
}

async fn home(State(state): State<AppState>) -> Response {
    let (popular, trending) = tokio::join!(
        state.catalog.fetch_popular(1),
        state.catalog.fetch_top_rated(1)
    );
    let popular = match popular {
        Ok(page) => page.results,
        Err(e) => {
            warn!("Failed to load popular movies: {}", e);
            return catalog_failure(&e);
        }
    };
    let trending = trending.map(|p| p.results).unwrap_or_else(|e| {
        warn!("Failed to load trending movies: {}", e);
        Vec::new()
    });
    let favorites = state.favorites.lock().await;
    Json(HomeView::build(&popular, &trending, &favorites)).into_response()
}

async fn movie_detail(State(state): State<AppState>, Path(id): Path<MovieId>) -> Response {
    match state.catalog.fetch_detail(id).await {
        Ok(detail) => {
            let is_favorite = state.favorites.lock().await.is_favorite(id);
            Json(DetailView::build(&detail, is_favorite)).into_response()
        }
        Err(e) => {
            warn!("Failed to load movie {}: {}", id, e);
            catalog_failure(&e)
        }
    }
}

async fn favorites_page(State(state): State<AppState>) -> Response {
    let ids = match with_favorites(&state.favorites, |favorites| {
        favorites.reload();
        Ok(favorites.ids().to_vec())
    })
    .await
    {
        Ok(ids) => ids,
        Err(e) => {
            error!("Failed to reload favorites: {:#}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Could not read favorites");
        }
    };

    let lookups = ids.iter().map(|id| state.catalog.fetch_detail(*id));
    let movies: Vec<MovieSummary> = join_all(lookups)
        .await
        .into_iter()
        .zip(&ids)
        .filter_map(|(res, id)| match res {
            Ok(detail) => Some(detail.summary),
            Err(e) => {
                warn!("Skipping favorite {}: {}", id, e);
                None
            }
        })
        .collect();

    Json(FavoritesView::build(&movies)).into_response()
}

// Storage IO is blocking, so the store runs on the blocking pool while its lock is held.
async fn with_favorites<T, F>(favorites: &SharedFavorites, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut FavoritesStore) -> Result<T> + Send + 'static,
{
    let mut guard = favorites.clone().lock_owned().await;
    tokio::task::spawn_blocking(move || f(&mut guard))
        .await
        .context("favorites task panicked")?
}

async fn toggle_favorite(State(state): State<AppState>, Path(id): Path<MovieId>) -> Response {
    match with_favorites(&state.favorites, move |f| f.toggle(id)).await {
        Ok(event) => Json(FavoriteToggleView::from(event)).into_response(),
        Err(e) => {
            error!("Failed to toggle favorite {}: {:#}", id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Could not save favorites")
        }
    }
}

// Remove-only counterpart of toggle, used from the favorites page: repeating it never re-adds.
async fn remove_favorite(State(state): State<AppState>, Path(id): Path<MovieId>) -> Response {
    match with_favorites(&state.favorites, move |f| f.remove(id)).await {
        Ok(Some(event)) => Json(FavoriteToggleView::from(event)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, format!("Movie {id} is not a favorite")),
        Err(e) => {
            error!("Failed to remove favorite {}: {:#}", id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Could not save favorites")
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

async fn search(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Response {
    let mut search = SearchController::new();
    let outcome = search.run(state.catalog.as_ref(), &params.q).await;
    let favorites = state.favorites.lock().await;
    let view = SearchView::build(&search, &favorites);
    match outcome {
        Ok(_) => Json(view).into_response(),
        Err(_) => (StatusCode::BAD_GATEWAY, Json(view)).into_response(),
    }
}

async fn listing_view(state: &AppState, session: Uuid, listing: &SharedListing) -> ListingView {
    let listing = listing.lock().await;
    let favorites = state.favorites.lock().await;
    ListingView::build(session, &listing, &favorites)
}

async fn open_listing(State(state): State<AppState>, Path(kind): Path<String>) -> Response {
    let kind: ListingKind = match kind.parse() {
        Ok(k) => k,
        Err(e) => return error_response(StatusCode::NOT_FOUND, e),
    };
    let (session, listing) = state.listings.open(kind).await;
    let loaded = listing
        .lock()
        .await
        .load_initial(state.catalog.as_ref())
        .await;
    if let Err(e) = loaded {
        warn!("Failed to open {:?} listing: {}", kind, e);
        state.listings.close(&session).await;
        return catalog_failure(&e);
    }
    info!("Opened {:?} listing session {}", kind, session);
    let view = listing_view(&state, session, &listing).await;
    (StatusCode::CREATED, Json(view)).into_response()
}

async fn show_listing(State(state): State<AppState>, Path(session): Path<Uuid>) -> Response {
    let Some(listing) = state.listings.get(&session).await else {
        return error_response(StatusCode::NOT_FOUND, "Unknown listing session");
    };
    Json(listing_view(&state, session, &listing).await).into_response()
}

async fn close_listing(State(state): State<AppState>, Path(session): Path<Uuid>) -> StatusCode {
    if state.listings.close(&session).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn load_more(State(state): State<AppState>, Path(session): Path<Uuid>) -> Response {
    let Some(listing) = state.listings.get(&session).await else {
        return error_response(StatusCode::NOT_FOUND, "Unknown listing session");
    };
    let outcome = drive_load_more(&listing, state.catalog.as_ref(), None).await;
    let view = listing_view(&state, session, &listing).await;
    match outcome {
        LoadMore::Appended { .. } => Json(view).into_response(),
        LoadMore::Rejected => (StatusCode::CONFLICT, Json(view)).into_response(),
        LoadMore::Failed(e) => error_response(StatusCode::BAD_GATEWAY, e),
    }
}

async fn sentinel_visible(State(state): State<AppState>, Path(session): Path<Uuid>) -> Response {
    let Some(listing) = state.listings.get(&session).await else {
        return error_response(StatusCode::NOT_FOUND, "Unknown listing session");
    };
    let page = listing.lock().await.on_sentinel_visible();
    if let Some(page) = page {
        if let LoadMore::Failed(e) =
            drive_load_more(&listing, state.catalog.as_ref(), Some(page)).await
        {
            return error_response(StatusCode::BAD_GATEWAY, e);
        }
    }
    Json(listing_view(&state, session, &listing).await).into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
