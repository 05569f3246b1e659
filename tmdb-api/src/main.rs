use color_eyre::eyre::{eyre, WrapErr};
use tmdb_api::{configuration, Catalog, TmdbApiClient};

#[tokio::main]
pub async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let key = std::env::var("TMDB_API_KEY").wrap_err("TMDB_API_KEY is not set")?;
    let query = std::env::args()
        .nth(1)
        .ok_or_else(|| eyre!("usage: tmdb-api <query>"))?;
    let client = TmdbApiClient::new_default(&key);

    let config = client.configuration().await?;
    let results = client.search_movies(&query).await?;

    for movie in results.results.iter().take(5) {
        println!("{} ({})", movie.title, movie.id);
        let Some(path) = &movie.poster_path else {
            continue;
        };
        let Some(size) = config.images.poster_size(configuration::THUMBNAIL_SIZE) else {
            continue;
        };
        let poster = client.poster(&config.images.poster_url(size, path)).await?;
        println!(" > {} bytes of poster", poster.len());
    }

    Ok(())
}
