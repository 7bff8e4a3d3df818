use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

pub const IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";
pub const PLACEHOLDER_IMAGE: &str = "/placeholder-movie.png";

pub type MovieId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieSummary {
    pub id: MovieId,
    pub title: String,
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub vote_average: f32,
    #[serde(default)]
    pub genre_ids: Vec<i64>,
}

impl MovieSummary {
    pub fn rating_label(&self) -> String {
        format!("{:.1}/10", self.vote_average.clamp(0.0, 10.0))
    }

    pub fn release_year(&self) -> Option<i32> {
        NaiveDate::parse_from_str(&self.release_date, "%Y-%m-%d")
            .ok()
            .map(|d| d.year())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoviePage {
    pub page: u32,
    pub results: Vec<MovieSummary>,
    pub total_pages: u32,
    pub total_results: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastMember {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub character: String,
    #[serde(default)]
    pub profile_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrewMember {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub job: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Video {
    pub key: String,
    pub site: String,
    #[serde(rename = "type")]
    pub video_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieDetail {
    #[serde(flatten)]
    pub summary: MovieSummary,
    pub runtime: Option<u32>,
    pub genres: Vec<Genre>,
    pub cast: Vec<CastMember>,
    pub directors: Vec<CrewMember>,
    pub videos: Vec<Video>,
}

impl MovieDetail {
    pub fn trailer(&self) -> Option<&Video> {
        self.videos
            .iter()
            .find(|v| v.video_type == "Trailer" && v.site == "YouTube")
    }

    pub fn trailer_url(&self) -> Option<String> {
        self.trailer()
            .map(|v| format!("https://www.youtube.com/watch?v={}", v.key))
    }

    pub fn top_cast(&self, max: usize) -> &[CastMember] {
        &self.cast[..self.cast.len().min(max)]
    }
}

pub fn image_url(path: Option<&str>) -> String {
    match path {
        Some(p) if !p.is_empty() => format!("{IMAGE_BASE}{p}"),
        _ => PLACEHOLDER_IMAGE.to_string(),
    }
}
