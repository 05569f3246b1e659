use std::fmt::Display;

use reqwest::{IntoUrl, Method, Response};

use crate::catalog::CatalogError;

#[derive(Debug, Clone)]
pub struct TmdbApiClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) api_url: String,
}

impl TmdbApiClient {
    pub const DEFAULT_API_URL: &'static str = "https://api.themoviedb.org/3/";

    pub fn new(api_key: &str, api_url: impl Into<String>) -> Self {
        let mut api_url = api_url.into();
        if !api_url.ends_with('/') {
            api_url.push('/');
        }
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.to_string(),
            api_url,
        }
    }

    pub fn new_default(api_key: &str) -> Self {
        Self::new(api_key, Self::DEFAULT_API_URL)
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Request against an absolute URL, without credentials. Used for images,
    /// which live on a different host than the API.
    pub fn request_full_url<U: IntoUrl>(&self, method: Method, url: U) -> reqwest::RequestBuilder {
        self.client.request(method, url)
    }

    /// Request against an API path, e.g. `"search/movie"`.
    pub fn request(&self, method: Method, path: impl Display) -> reqwest::RequestBuilder {
        self.request_full_url(method, format!("{}{}", self.api_url, path))
            .query(&[("api_key", self.api_key.as_str())])
    }
}

/// Maps non-success statuses to [`CatalogError::Status`].
pub(crate) fn check_status(response: Response) -> Result<Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut url = response.url().clone();
    // Don't leak the key into logs and error messages.
    url.set_query(None);
    Err(CatalogError::Status {
        url: url.to_string(),
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_paths_are_joined_onto_the_base_url() {
        let client = TmdbApiClient::new("secret", "http://localhost:8080/3");
        assert_eq!(client.api_url(), "http://localhost:8080/3/");

        let request = client
            .request(Method::GET, "movie/603")
            .build()
            .expect("valid request");
        assert_eq!(request.url().path(), "/3/movie/603");
        assert_eq!(request.url().query(), Some("api_key=secret"));
    }
}
