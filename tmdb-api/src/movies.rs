use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    api::{check_status, TmdbApiClient},
    catalog::CatalogError,
};

pub type MovieId = u64;

/// A search hit. Carries just enough to render a result row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct MovieSummary {
    pub id: MovieId,
    pub title: String,
    /// `None` for movies without a poster.
    pub poster_path: Option<String>,
    #[serde(default)]
    pub overview: String,
    pub release_date: Option<String>,
}

/// Response of `search/movie`. Only the first page is ever requested.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub page: u32,
    pub results: Vec<MovieSummary>,
    #[serde(default)]
    pub total_results: u32,
}

/// Response of `movie/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Movie {
    pub id: MovieId,
    pub title: String,
    pub poster_path: Option<String>,
    #[serde(default)]
    pub overview: String,
    pub tagline: Option<String>,
    pub release_date: Option<String>,
    /// In minutes.
    pub runtime: Option<u32>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Genre {
    pub id: u32,
    pub name: String,
}

pub async fn search(client: &TmdbApiClient, query: &str) -> Result<SearchResults, CatalogError> {
    /// Query parameters of `search/movie`.
    #[derive(Debug, Serialize)]
    struct SearchQuery<'a> {
        query: &'a str,
        include_adult: bool,
    }

    debug!(query, "Searching movies");
    let response = client
        .request(Method::GET, "search/movie")
        .query(&SearchQuery {
            query,
            include_adult: false,
        })
        .send()
        .await?;

    let results = check_status(response)?.json::<SearchResults>().await?;

    Ok(results)
}

pub async fn get(client: &TmdbApiClient, id: MovieId) -> Result<Movie, CatalogError> {
    debug!(id, "Fetching movie");
    let response = client
        .request(Method::GET, format!("movie/{id}"))
        .send()
        .await?;

    let movie = check_status(response)?.json::<Movie>().await?;

    Ok(movie)
}
