use crate::favorites::{FavoriteEvent, FavoritesStore};
use crate::listing::{ListingController, ListingKind, ListingPhase};
use crate::models::{image_url, CastMember, MovieDetail, MovieId, MovieSummary};
use crate::search::{SearchController, SearchPhase};
use serde::Serialize;
use uuid::Uuid;

pub const TOAST_DURATION_MS: u64 = 3_000;
const DETAIL_CAST_LIMIT: usize = 5;
const FEATURED_RANGE: std::ops::Range<usize> = 1..9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieCard {
    pub id: MovieId,
    pub title: String,
    pub poster_url: String,
    pub rating: String,
    pub href: String,
    pub is_favorite: bool,
}

impl MovieCard {
    pub fn new(movie: &MovieSummary, is_favorite: bool) -> Self {
        Self {
            id: movie.id,
            title: movie.title.clone(),
            poster_url: image_url(movie.poster_path.as_deref()),
            rating: movie.rating_label(),
            href: format!("/movie/{}", movie.id),
            is_favorite,
        }
    }
}

fn cards(movies: &[MovieSummary], favorites: &FavoritesStore) -> Vec<MovieCard> {
    movies
        .iter()
        .map(|m| MovieCard::new(m, favorites.is_favorite(m.id)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmptyState {
    pub icon: &'static str,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub label: &'static str,
    pub href: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Toast {
    pub message: &'static str,
    pub duration_ms: u64,
}

impl From<FavoriteEvent> for Toast {
    fn from(event: FavoriteEvent) -> Self {
        Self {
            message: event.message(),
            duration_ms: TOAST_DURATION_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FavoriteToggleView {
    pub id: MovieId,
    pub is_favorite: bool,
    pub toast: Toast,
}

impl From<FavoriteEvent> for FavoriteToggleView {
    fn from(event: FavoriteEvent) -> Self {
        Self {
            id: event.id(),
            is_favorite: event.is_favorite(),
            toast: event.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hero {
    pub card: MovieCard,
    pub overview: String,
    pub backdrop_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub title: &'static str,
    pub movies: Vec<MovieCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HomeView {
    pub hero: Option<Hero>,
    pub featured: Section,
    pub trending: Section,
}

impl HomeView {
    pub fn build(
        popular: &[MovieSummary],
        trending: &[MovieSummary],
        favorites: &FavoritesStore,
    ) -> Self {
        let hero = popular.first().map(|m| Hero {
            card: MovieCard::new(m, favorites.is_favorite(m.id)),
            overview: m.overview.clone(),
            backdrop_url: image_url(m.backdrop_path.as_deref()),
        });
        let end = FEATURED_RANGE.end.min(popular.len());
        let start = FEATURED_RANGE.start.min(end);
        Self {
            hero,
            featured: Section {
                title: ListingKind::Popular.title(),
                movies: cards(&popular[start..end], favorites),
            },
            trending: Section {
                title: ListingKind::TopRated.title(),
                movies: cards(trending, favorites),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingView {
    pub session: Uuid,
    pub kind: ListingKind,
    pub title: &'static str,
    pub phase: ListingPhase,
    pub movies: Vec<MovieCard>,
    pub current_page: u32,
    pub has_more: bool,
    pub is_loading: bool,
    pub is_loading_more: bool,
    pub load_more_enabled: bool,
}

impl ListingView {
    pub fn build(session: Uuid, listing: &ListingController, favorites: &FavoritesStore) -> Self {
        Self {
            session,
            kind: listing.kind(),
            title: listing.kind().title(),
            phase: listing.phase(),
            movies: cards(listing.items(), favorites),
            current_page: listing.current_page(),
            has_more: listing.has_more(),
            is_loading: listing.is_loading(),
            is_loading_more: listing.is_loading_more(),
            load_more_enabled: listing.phase() == ListingPhase::Loaded && listing.has_more(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CastCard {
    pub name: String,
    pub character: String,
    pub profile_url: String,
}

impl From<&CastMember> for CastCard {
    fn from(c: &CastMember) -> Self {
        Self {
            name: c.name.clone(),
            character: c.character.clone(),
            profile_url: image_url(c.profile_path.as_deref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailView {
    pub card: MovieCard,
    pub overview: String,
    pub backdrop_url: String,
    pub release_date: String,
    pub year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
    pub directors: Vec<String>,
    pub cast: Vec<CastCard>,
    pub trailer_url: Option<String>,
}

impl DetailView {
    pub fn build(detail: &MovieDetail, is_favorite: bool) -> Self {
        let s = &detail.summary;
        Self {
            card: MovieCard::new(s, is_favorite),
            overview: s.overview.clone(),
            backdrop_url: image_url(s.backdrop_path.as_deref()),
            release_date: s.release_date.clone(),
            year: s.release_year(),
            runtime_minutes: detail.runtime,
            genres: detail.genres.iter().map(|g| g.name.clone()).collect(),
            directors: detail.directors.iter().map(|d| d.name.clone()).collect(),
            cast: detail
                .top_cast(DETAIL_CAST_LIMIT)
                .iter()
                .map(CastCard::from)
                .collect(),
            trailer_url: detail.trailer_url(),
        }
    }

    pub fn not_found(id: MovieId) -> EmptyState {
        EmptyState {
            icon: "🎬",
            title: "Movie not found".to_string(),
            description: format!("No movie with id {id} exists in the catalog."),
            action: Some(Action {
                label: "Back to Home",
                href: "/",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FavoriteItem {
    pub card: MovieCard,
    pub overview: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FavoritesView {
    pub movies: Vec<FavoriteItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty: Option<EmptyState>,
}

impl FavoritesView {
    pub fn build(movies: &[MovieSummary]) -> Self {
        let empty = movies.is_empty().then(|| EmptyState {
            icon: "❤️",
            title: "No favorites yet".to_string(),
            description: "Start adding movies to your favorites list to see them here"
                .to_string(),
            action: Some(Action {
                label: "Explore Movies",
                href: "/",
            }),
        });
        Self {
            movies: movies
                .iter()
                .map(|m| FavoriteItem {
                    card: MovieCard::new(m, true),
                    overview: m.overview.clone(),
                })
                .collect(),
            empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchView {
    pub query: String,
    pub phase: SearchPhase,
    pub total_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub movies: Vec<MovieCard>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty: Option<EmptyState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchView {
    pub fn build(search: &SearchController, favorites: &FavoritesStore) -> Self {
        let query = search.query().to_string();
        let phase = search.phase();
        let empty = match phase {
            SearchPhase::Idle => Some(EmptyState {
                icon: "🔍",
                title: "Start searching".to_string(),
                description: "Enter a movie title to discover amazing films".to_string(),
                action: None,
            }),
            SearchPhase::Empty => Some(EmptyState {
                icon: "😔",
                title: "No results found".to_string(),
                description: format!(
                    "No movies found for \"{query}\". Try a different search term."
                ),
                action: None,
            }),
            SearchPhase::Loading | SearchPhase::Results => None,
        };
        let summary = (phase == SearchPhase::Results).then(|| {
            format!(
                "Found {} results for \"{}\"",
                search.total_results(),
                query
            )
        });
        Self {
            phase,
            total_results: search.total_results(),
            summary,
            movies: cards(search.results(), favorites),
            empty,
            error: search.last_error().map(str::to_string),
            query,
        }
    }
}
