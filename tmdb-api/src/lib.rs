//! Minimal client for the TMDB v3 API: image configuration, movie search,
//! movie details and poster bytes.

pub mod api;
pub mod catalog;
pub mod configuration;
pub mod images;
pub mod movies;

pub use api::TmdbApiClient;
pub use catalog::{Catalog, CatalogError};
pub use reqwest::StatusCode;
