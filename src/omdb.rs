use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use std::env;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{CastMember, Genre, Movie, SearchResults};

const OMDB_BASE: &str = "https://www.omdbapi.com/";
const IMAGE_BASE: &str = "https://image.tmdb.org/t/p";
const PLACEHOLDER_POSTER: &str = "https://via.placeholder.com/500x750?text=No+Image";
const MAX_CONCURRENT_ENRICHMENTS: usize = 8;

/// The provider exposes no popularity or trending data; these listings are
/// fixed searches skewed recent by a year filter. A named approximation, not
/// a ranking.
#[derive(Debug, Clone, Copy)]
pub struct RankingQuery {
    pub query: &'static str,
    pub year: &'static str,
}

pub const POPULAR: RankingQuery = RankingQuery {
    query: "movie",
    year: "2023",
};

pub const TRENDING: RankingQuery = RankingQuery {
    query: "movie",
    year: "2024",
};

#[derive(Debug, Clone)]
pub struct OmdbClient {
    client: Client,
    api_key: String,
}

#[async_trait]
pub trait OmdbApi: Send + Sync {
    async fn search(&self, query: &str, page: u32) -> Result<SearchResults>;
    async fn movie_details(&self, imdb_id: &str) -> Result<Movie>;
    async fn popular(&self, page: u32) -> Result<SearchResults>;
    async fn trending(&self) -> Result<SearchResults>;
}

impl OmdbClient {
    pub fn from_env() -> Result<Self> {
        let api_key =
            env::var("OMDB_API_KEY").map_err(|_| Error::Configuration("OMDB_API_KEY"))?;
        Ok(Self {
            client: Client::new(),
            api_key,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<T> {
        let res = self.client.get(url).send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(Error::Provider(format!("{status}: {text}")));
        }
        serde_json::from_str(&text).map_err(|e| Error::Provider(format!("bad response body: {e}")))
    }

    async fn fetch_rating(&self, imdb_id: &str) -> Option<f32> {
        let url = format!(
            "{OMDB_BASE}?i={}&apikey={}",
            urlencoding::encode(imdb_id),
            self.api_key
        );
        match self.get_json::<RawDetail>(&url).await {
            Ok(detail) if detail.response != "False" => {
                detail.imdb_rating.as_deref().and_then(parse_rating)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("rating lookup for {} failed: {}", imdb_id, e);
                None
            }
        }
    }

    async fn fixed_query_listing(&self, ranking: RankingQuery, page: u32) -> Result<SearchResults> {
        let url = format!(
            "{OMDB_BASE}?s={}&type=movie&y={}&apikey={}&page={}",
            urlencoding::encode(ranking.query),
            ranking.year,
            self.api_key,
            page
        );
        let envelope: SearchEnvelope = self.get_json(&url).await?;
        Ok(map_envelope(envelope, page))
    }
}

#[async_trait]
impl OmdbApi for OmdbClient {
    async fn search(&self, query: &str, page: u32) -> Result<SearchResults> {
        if query.trim().is_empty() {
            return Err(Error::InvalidQuery("search query is empty".to_string()));
        }
        let url = format!(
            "{OMDB_BASE}?s={}&type=movie&apikey={}&page={}",
            urlencoding::encode(query),
            self.api_key,
            page
        );
        let envelope: SearchEnvelope = self.get_json(&url).await?;
        let mut listing = map_envelope(envelope, page);
        // Search hits carry no rating; fill it with one detail lookup per hit.
        let results = std::mem::take(&mut listing.results);
        listing.results = enrich_ratings(results, MAX_CONCURRENT_ENRICHMENTS, self).await;
        Ok(listing)
    }

    async fn movie_details(&self, imdb_id: &str) -> Result<Movie> {
        let url = format!(
            "{OMDB_BASE}?i={}&apikey={}",
            urlencoding::encode(imdb_id),
            self.api_key
        );
        let detail: RawDetail = self.get_json(&url).await?;
        if detail.response == "False" {
            return Err(Error::NotFound(
                detail
                    .error
                    .unwrap_or_else(|| format!("no movie with id {imdb_id}")),
            ));
        }
        Ok(detail_to_movie(imdb_id, detail))
    }

    async fn popular(&self, page: u32) -> Result<SearchResults> {
        self.fixed_query_listing(POPULAR, page).await
    }

    async fn trending(&self) -> Result<SearchResults> {
        self.fixed_query_listing(TRENDING, 1).await
    }
}

#[async_trait]
trait RatingSource: Sync {
    async fn rating(&self, imdb_id: &str) -> Option<f32>;
}

#[async_trait]
impl RatingSource for OmdbClient {
    async fn rating(&self, imdb_id: &str) -> Option<f32> {
        self.fetch_rating(imdb_id).await
    }
}

/// Fills `vote_average` per movie, at most `limit` lookups in flight. A
/// failed lookup leaves the default 0 in place; the returned list keeps the
/// input order and the call settles only once every lookup has.
async fn enrich_ratings<S: RatingSource>(movies: Vec<Movie>, limit: usize, source: &S) -> Vec<Movie> {
    let semaphore = Arc::new(Semaphore::new(limit));
    let lookups = movies.into_iter().map(|mut movie| {
        let semaphore = Arc::clone(&semaphore);
        async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return movie,
            };
            if let Some(rating) = source.rating(&movie.imdb_id).await {
                movie.vote_average = rating;
            }
            movie
        }
    });
    join_all(lookups).await
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Search", default)]
    search: Vec<RawSummary>,
    #[serde(rename = "totalResults")]
    total_results: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSummary {
    #[serde(rename = "imdbID")]
    imdb_id: String,
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Year", default)]
    year: String,
    #[serde(rename = "Poster")]
    poster: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDetail {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error")]
    error: Option<String>,
    #[serde(rename = "Title")]
    title: Option<String>,
    #[serde(rename = "Released")]
    released: Option<String>,
    #[serde(rename = "Runtime")]
    runtime: Option<String>,
    #[serde(rename = "Genre")]
    genre: Option<String>,
    #[serde(rename = "Actors")]
    actors: Option<String>,
    #[serde(rename = "Plot")]
    plot: Option<String>,
    #[serde(rename = "Poster")]
    poster: Option<String>,
    #[serde(rename = "imdbRating")]
    imdb_rating: Option<String>,
    #[serde(rename = "imdbVotes")]
    imdb_votes: Option<String>,
}

fn map_envelope(envelope: SearchEnvelope, page: u32) -> SearchResults {
    if envelope.response == "False" {
        return SearchResults {
            page,
            results: Vec::new(),
            total_pages: 0,
            total_results: 0,
        };
    }
    let results = envelope.search.into_iter().map(summary_to_movie).collect();
    SearchResults {
        page,
        results,
        // The provider pages by tens but reports only a flat result count.
        total_pages: 1,
        total_results: envelope
            .total_results
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0),
    }
}

fn summary_to_movie(raw: RawSummary) -> Movie {
    let id = derived_id(&raw.imdb_id);
    Movie {
        id,
        imdb_id: raw.imdb_id,
        title: raw.title,
        poster_path: non_placeholder(raw.poster),
        release_date: raw.year,
        vote_average: 0.0,
        vote_count: None,
        overview: String::new(),
        genres: Vec::new(),
        runtime: None,
        cast: Vec::new(),
    }
}

fn detail_to_movie(imdb_id: &str, raw: RawDetail) -> Movie {
    Movie {
        id: derived_id(imdb_id),
        imdb_id: imdb_id.to_string(),
        title: raw.title.unwrap_or_default(),
        poster_path: non_placeholder(raw.poster),
        release_date: raw
            .released
            .filter(|r| r != "N/A")
            .unwrap_or_default(),
        vote_average: raw
            .imdb_rating
            .as_deref()
            .and_then(parse_rating)
            .unwrap_or(0.0),
        vote_count: raw.imdb_votes.as_deref().and_then(parse_votes),
        overview: raw.plot.filter(|p| p != "N/A").unwrap_or_default(),
        genres: split_genres(raw.genre.as_deref()),
        runtime: raw.runtime.as_deref().and_then(parse_runtime),
        cast: split_cast(raw.actors.as_deref()),
    }
}

/// Display id: the canonical id with its `tt` prefix stripped and the rest
/// parsed, 0 on failure. Lossy outside the provider's 7-digit scheme; the
/// string id stays canonical everywhere that matters.
pub fn derived_id(imdb_id: &str) -> i64 {
    imdb_id
        .strip_prefix("tt")
        .unwrap_or(imdb_id)
        .parse()
        .unwrap_or(0)
}

/// Inverse of `derived_id` under the 7-digit zero-padded scheme. Wider ids
/// pass through without padding.
pub fn imdb_id_from_derived(id: i64) -> String {
    format!("tt{id:07}")
}

pub fn poster_url(path: Option<&str>, size: &str) -> String {
    match path {
        None => PLACEHOLDER_POSTER.to_string(),
        Some(p) if p.starts_with("http") => p.to_string(),
        Some(p) => format!("{IMAGE_BASE}/{size}{p}"),
    }
}

fn non_placeholder(poster: Option<String>) -> Option<String> {
    poster.filter(|p| p != "N/A")
}

fn parse_rating(raw: &str) -> Option<f32> {
    raw.parse().ok()
}

fn parse_votes(raw: &str) -> Option<u64> {
    raw.replace(',', "").parse().ok()
}

fn parse_runtime(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    raw.strip_suffix("min")
        .map(str::trim)
        .unwrap_or(raw)
        .parse()
        .ok()
}

fn split_names(raw: Option<&str>) -> Vec<String> {
    raw.filter(|r| *r != "N/A")
        .map(|r| r.split(", ").map(str::to_string).collect())
        .unwrap_or_default()
}

fn split_genres(raw: Option<&str>) -> Vec<Genre> {
    split_names(raw)
        .into_iter()
        .map(|name| Genre { id: 0, name })
        .collect()
}

fn split_cast(raw: Option<&str>) -> Vec<CastMember> {
    split_names(raw)
        .into_iter()
        .map(|name| CastMember {
            name,
            character: String::new(),
        })
        .collect()
}
