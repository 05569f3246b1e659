use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use thiserror::Error;

use crate::{
    api::TmdbApiClient,
    configuration::{self, Configuration},
    images,
    movies::{self, Movie, MovieId, SearchResults},
};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} answered with {status}")]
    Status { url: String, status: StatusCode },
}

/// Everything the movie search reads from the outside world.
///
/// Implemented by [`TmdbApiClient`]; tests substitute in-memory catalogs.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn configuration(&self) -> Result<Configuration, CatalogError>;

    async fn search_movies(&self, query: &str) -> Result<SearchResults, CatalogError>;

    async fn movie(&self, id: MovieId) -> Result<Movie, CatalogError>;

    /// Raw bytes of a poster image. Not decoded.
    async fn poster(&self, url: &str) -> Result<Bytes, CatalogError>;
}

#[async_trait]
impl Catalog for TmdbApiClient {
    async fn configuration(&self) -> Result<Configuration, CatalogError> {
        configuration::get(self).await
    }

    async fn search_movies(&self, query: &str) -> Result<SearchResults, CatalogError> {
        movies::search(self, query).await
    }

    async fn movie(&self, id: MovieId) -> Result<Movie, CatalogError> {
        movies::get(self, id).await
    }

    async fn poster(&self, url: &str) -> Result<Bytes, CatalogError> {
        images::get_bytes(self, url).await
    }
}
