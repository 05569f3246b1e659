use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use crate::{
    api::{check_status, TmdbApiClient},
    catalog::CatalogError,
};

/// Index into `poster_sizes` used for list thumbnails.
pub const THUMBNAIL_SIZE: usize = 0;
/// Index into `poster_sizes` used for the detail view.
pub const FULL_SIZE: usize = 2;

/// Response of `configuration`. Only the image section is of interest.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Configuration {
    pub images: ImagesConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImagesConfig {
    /// Plain http base URL for images.
    pub base_url: String,
    /// https base URL for images. Preferred.
    pub secure_base_url: String,
    /// Size tokens like `"w92"`, smallest first. The last one is usually
    /// `"original"`.
    #[serde(default)]
    pub poster_sizes: Vec<String>,
}

impl ImagesConfig {
    pub fn poster_size(&self, index: usize) -> Option<&str> {
        self.poster_sizes.get(index).map(String::as_str)
    }

    /// `{secure_base_url}/{size}/{poster_path}`, without doubled slashes.
    pub fn poster_url(&self, size: &str, poster_path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.secure_base_url.trim_end_matches('/'),
            size,
            poster_path.trim_start_matches('/')
        )
    }
}

/// Pixel width encoded in a size token, `"w92"` is 92.
/// Returns `None` for tokens without a width, like `"original"`.
pub fn size_width(size: &str) -> Option<u32> {
    size.strip_prefix('w')?.parse().ok()
}

/// Height of a thumbnail `width` pixels wide, for the 27:40 poster aspect.
pub fn thumbnail_height(width: u32) -> f64 {
    f64::from(width) / 27.0 * 40.0
}

pub async fn get(client: &TmdbApiClient) -> Result<Configuration, CatalogError> {
    debug!("Fetching configuration");
    let response = client.request(Method::GET, "configuration").send().await?;
    let config = check_status(response)?.json::<Configuration>().await?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "images": {
            "base_url": "http://image.tmdb.org/t/p/",
            "secure_base_url": "https://image.tmdb.org/t/p/",
            "backdrop_sizes": ["w300", "w780", "w1280", "original"],
            "poster_sizes": ["w92", "w154", "w185", "w342", "w500", "w780", "original"]
        },
        "change_keys": ["adult", "air_date"]
    }"#;

    #[test]
    fn parses_image_configuration() {
        let config: Configuration = serde_json::from_str(CONFIG).expect("valid configuration");
        assert_eq!(config.images.poster_size(THUMBNAIL_SIZE), Some("w92"));
        assert_eq!(config.images.poster_size(FULL_SIZE), Some("w185"));
        assert_eq!(config.images.poster_size(99), None);
    }

    #[test]
    fn poster_urls_join_cleanly() {
        let config: Configuration = serde_json::from_str(CONFIG).expect("valid configuration");
        assert_eq!(
            config.images.poster_url("w92", "/abc.jpg"),
            "https://image.tmdb.org/t/p/w92/abc.jpg"
        );
    }

    #[test]
    fn thumbnail_dimensions() {
        assert_eq!(size_width("w92"), Some(92));
        assert_eq!(size_width("original"), None);
        assert_eq!(thumbnail_height(27), 40.0);
        assert!((thumbnail_height(92) - 136.296).abs() < 0.001);
    }
}
