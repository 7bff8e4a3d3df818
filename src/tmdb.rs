use crate::config::Config;
use crate::models::{
    CastMember, CrewMember, Genre, MovieDetail, MovieId, MoviePage, MovieSummary, Video,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Network(String),
    #[error("movie {0} not found")]
    NotFound(MovieId),
    #[error("catalog returned HTTP {0}: {1}")]
    Status(u16, String),
    #[error("unexpected catalog response: {0}")]
    Parse(String),
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn fetch_popular(&self, page: u32) -> CatalogResult<MoviePage>;
    async fn fetch_top_rated(&self, page: u32) -> CatalogResult<MoviePage>;
    async fn fetch_by_query(&self, query: &str, page: u32) -> CatalogResult<MoviePage>;
    async fn fetch_detail(&self, id: MovieId) -> CatalogResult<MovieDetail>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base: String,
    api_key: String,
}

impl TmdbClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("building HTTP client failed")?;
        Ok(Self {
            client,
            base: config.tmdb_base.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str, params: &str) -> String {
        let mut url = format!("{}{path}?api_key={}", self.base, self.api_key);
        if !params.is_empty() {
            url.push('&');
            url.push_str(params);
        }
        url
    }

    async fn fetch_page(&self, path: &str, params: &str) -> CatalogResult<MoviePage> {
        let url = self.url(path, params);
        self.get_json(path, &url, None).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        url: &str,
        detail_id: Option<MovieId>,
    ) -> CatalogResult<T> {
        debug!("GET {}", path);
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::Network(format!("{path}: {}", e.without_url())))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .map_err(|e| CatalogError::Network(format!("{path}: reading body: {}", e.without_url())))?;
        check_status(status, detail_id, &text)?;
        serde_json::from_str(&text).map_err(|e| CatalogError::Parse(format!("{path}: {e}")))
    }
}

fn check_status(status: StatusCode, detail_id: Option<MovieId>, body: &str) -> CatalogResult<()> {
    if status.is_success() {
        return Ok(());
    }
    match detail_id {
        Some(id) if status.is_client_error() => Err(CatalogError::NotFound(id)),
        _ => Err(CatalogError::Status(
            status.as_u16(),
            body.chars().take(200).collect(),
        )),
    }
}

#[async_trait]
impl CatalogApi for TmdbClient {
    async fn fetch_popular(&self, page: u32) -> CatalogResult<MoviePage> {
        self.fetch_page("/movie/popular", &format!("page={page}"))
            .await
    }

    async fn fetch_top_rated(&self, page: u32) -> CatalogResult<MoviePage> {
        self.fetch_page("/movie/top_rated", &format!("page={page}"))
            .await
    }

    async fn fetch_by_query(&self, query: &str, page: u32) -> CatalogResult<MoviePage> {
        let params = format!("query={}&page={page}", urlencoding::encode(query));
        self.fetch_page("/search/movie", &params).await
    }

    async fn fetch_detail(&self, id: MovieId) -> CatalogResult<MovieDetail> {
        let path = format!("/movie/{id}");
        let url = self.url(&path, "append_to_response=credits,videos");
        let raw: DetailResponse = self.get_json(&path, &url, Some(id)).await?;
        Ok(raw.into_detail())
    }
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(flatten)]
    summary: MovieSummary,
    #[serde(default)]
    runtime: Option<u32>,
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(default)]
    credits: Option<Credits>,
    #[serde(default)]
    videos: Option<Videos>,
}

#[derive(Debug, Default, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<CastMember>,
    #[serde(default)]
    crew: Vec<CrewMember>,
}

#[derive(Debug, Default, Deserialize)]
struct Videos {
    #[serde(default)]
    results: Vec<Video>,
}

impl DetailResponse {
    fn into_detail(self) -> MovieDetail {
        let credits = self.credits.unwrap_or_default();
        let directors = credits
            .crew
            .into_iter()
            .filter(|c| c.job == "Director")
            .collect();
        let mut summary = self.summary;
        if summary.genre_ids.is_empty() {
            summary.genre_ids = self.genres.iter().map(|g| g.id).collect();
        }
        MovieDetail {
            summary,
            runtime: self.runtime,
            genres: self.genres,
            cast: credits.cast,
            directors,
            videos: self.videos.map(|v| v.results).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_appended_detail_response() {
        let value = json!({
            "id": 603,
            "title": "The Matrix",
            "overview": "A hacker learns the truth.",
            "poster_path": "/p.jpg",
            "backdrop_path": null,
            "release_date": "1999-03-30",
            "vote_average": 8.2,
            "runtime": 136,
            "genres": [{ "id": 28, "name": "Action" }],
            "credits": {
                "cast": [{ "id": 6384, "name": "Keanu Reeves", "character": "Neo", "profile_path": null }],
                "crew": [
                    { "id": 9340, "name": "Lana Wachowski", "job": "Director" },
                    { "id": 1, "name": "Someone", "job": "Producer" }
                ]
            },
            "videos": { "results": [{ "key": "abc", "site": "YouTube", "type": "Trailer" }] }
        });
        let raw: DetailResponse = serde_json::from_value(value).expect("detail deserialize");
        let detail = raw.into_detail();
        assert_eq!(detail.summary.id, 603);
        assert_eq!(detail.summary.genre_ids, vec![28]);
        assert_eq!(detail.runtime, Some(136));
        assert_eq!(detail.cast.len(), 1);
        assert_eq!(detail.directors.len(), 1);
        assert_eq!(detail.directors[0].name, "Lana Wachowski");
        assert_eq!(detail.trailer().map(|v| v.key.as_str()), Some("abc"));
    }

    #[test]
    fn detail_without_appends_still_maps() {
        let value = json!({ "id": 1, "title": "Bare", "runtime": null });
        let raw: DetailResponse = serde_json::from_value(value).expect("detail deserialize");
        let detail = raw.into_detail();
        assert!(detail.cast.is_empty());
        assert!(detail.videos.is_empty());
        assert_eq!(detail.runtime, None);
    }

    #[test]
    fn classifies_error_statuses() {
        assert!(check_status(StatusCode::OK, Some(1), "").is_ok());
        assert!(matches!(
            check_status(StatusCode::NOT_FOUND, Some(9), "{}"),
            Err(CatalogError::NotFound(9))
        ));
        assert!(matches!(
            check_status(StatusCode::NOT_FOUND, None, "{}"),
            Err(CatalogError::Status(404, _))
        ));
        assert!(matches!(
            check_status(StatusCode::BAD_GATEWAY, Some(9), "oops"),
            Err(CatalogError::Status(502, _))
        ));
    }

    #[test]
    fn builds_urls_with_key_and_encoded_params() {
        let config = Config::from_lookup(|k| match k {
            "TMDB_API_KEY" => Some("secret".to_string()),
            "TMDB_BASE_URL" => Some("http://catalog.test/3".to_string()),
            _ => None,
        })
        .expect("config");
        let client = TmdbClient::new(&config).expect("client");
        let params = format!("query={}&page=2", urlencoding::encode("star wars"));
        assert_eq!(
            client.url("/search/movie", &params),
            "http://catalog.test/3/search/movie?api_key=secret&query=star%20wars&page=2"
        );
        assert_eq!(
            client.url("/movie/popular", ""),
            "http://catalog.test/3/movie/popular?api_key=secret"
        );
    }
}
