use bytes::Bytes;
use reqwest::Method;
use tracing::debug;

use crate::{
    api::{check_status, TmdbApiClient},
    catalog::CatalogError,
};

pub async fn get_bytes(client: &TmdbApiClient, url: &str) -> Result<Bytes, CatalogError> {
    debug!(url, "Fetching image");
    let response = client.request_full_url(Method::GET, url).send().await?;

    let bytes = check_status(response)?.bytes().await?;

    Ok(bytes)
}
