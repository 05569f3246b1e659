use std::{sync::Arc, time::Duration};

use clap::Parser;
use movie_search_core::{RenderConfig, Renderer};
use movie_search_lazy_data::CacheScope;
use parking_lot::Mutex;
use tmdb_api::{Catalog, TmdbApiClient};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::{
    movies::{MovieSearch, Readers, ViewOptions},
    terminal::Snapshot,
};

mod movies;
mod terminal;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TMDB v3 API key
    #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(long, default_value = TmdbApiClient::DEFAULT_API_URL)]
    api_url: String,

    /// Longest time the result list may lag behind the search box
    #[arg(long, value_name = "MS", default_value_t = 5_000)]
    deferred_timeout_ms: u64,

    /// How long a result row keeps a blank thumbnail before showing "loading"
    #[arg(long, value_name = "MS", default_value_t = 0)]
    poster_grace_ms: u64,

    /// How long the detail view waits for its poster before rendering without it
    #[arg(long, value_name = "MS", default_value_t = 2_000)]
    full_poster_grace_ms: u64,

    /// Number of search results to list
    #[arg(long, default_value_t = 5)]
    results: usize,
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    // Frames go to stdout; keep logs out of their way.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    let catalog: Arc<dyn Catalog> = Arc::new(TmdbApiClient::new(&args.api_key, args.api_url));
    let readers = Readers::new(catalog);
    let options = ViewOptions {
        results: args.results,
        poster_grace: Duration::from_millis(args.poster_grace_ms),
        full_poster_grace: Duration::from_millis(args.full_poster_grace_ms),
    };
    let config = RenderConfig {
        deferred_timeout_ms: args.deferred_timeout_ms,
        ..RenderConfig::default()
    };

    let scope = CacheScope::acquire("movies");
    let cache = scope.cache();
    let snapshot = Arc::new(Mutex::new(Snapshot::default()));

    let (tx, rx) = mpsc::unbounded_channel();
    let input = tokio::spawn(terminal::read_commands(tx, snapshot.clone()));

    println!("Type a query, :open N, :back, :stats or :quit");
    let mut renderer = Renderer::mount(
        MovieSearch::new(readers.clone(), options.clone()),
        cache,
        &config,
    );
    renderer
        .run(rx, |frame, state| {
            terminal::present(frame);
            let mut snapshot = snapshot.lock();
            snapshot.listed = readers.listed(cache, &state.deferred().query, options.results);
            snapshot.stats = cache.stats();
        })
        .await;

    drop(renderer);
    input.await??;
    scope.release();

    Ok(())
}
