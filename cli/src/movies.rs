use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use movie_search_core::{Application, Element, RenderCx, SuspenseBoundary, Tiers, ViewResult};
use movie_search_lazy_data::{ResourceCache, ResourceReader};
use tmdb_api::{
    configuration::{size_width, thumbnail_height, Configuration, FULL_SIZE, THUMBNAIL_SIZE},
    movies::{Movie, MovieId, MovieSummary, SearchResults},
    Catalog,
};

/// One reader per catalog endpoint.
#[derive(Debug, Clone)]
pub struct Readers {
    pub config: ResourceReader<(), Arc<Configuration>>,
    pub search: ResourceReader<String, Arc<SearchResults>>,
    pub movie: ResourceReader<MovieId, Arc<Movie>>,
    pub poster: ResourceReader<String, Bytes>,
}

impl Readers {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        let c = catalog.clone();
        let config = ResourceReader::from_future_source("configuration", move |()| {
            let catalog = c.clone();
            async move { catalog.configuration().await.map(Arc::new) }
        });

        let c = catalog.clone();
        let search = ResourceReader::from_future_source("search", move |query: String| {
            let catalog = c.clone();
            async move { catalog.search_movies(&query).await.map(Arc::new) }
        });

        let c = catalog.clone();
        let movie = ResourceReader::from_future_source("movie", move |id: MovieId| {
            let catalog = c.clone();
            async move { catalog.movie(id).await.map(Arc::new) }
        });

        let poster = ResourceReader::from_future_source("poster", move |url: String| {
            let catalog = catalog.clone();
            async move { catalog.poster(&url).await }
        });

        Self {
            config,
            search,
            movie,
            poster,
        }
    }

    /// The first `limit` results for `query`, if they're already loaded.
    ///
    /// Reads the same slot the result list renders from, so this never
    /// starts a search of its own for a query that is on screen.
    pub fn listed(&self, cache: &ResourceCache, query: &str, limit: usize) -> Vec<MovieSummary> {
        if query.trim().is_empty() {
            return Vec::new();
        }
        match self.search.read(cache, query.to_string()) {
            Ok(search) => search.results.iter().take(limit).cloned().collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewOptions {
    /// How many search results to list.
    pub results: usize,
    pub poster_grace: Duration,
    pub full_poster_grace: Duration,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            results: 5,
            poster_grace: Duration::ZERO,
            full_poster_grace: Duration::from_millis(2_000),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub active_result: Option<MovieSummary>,
}

#[derive(Debug, Clone)]
pub enum Message {
    Clear,
    Input(char),
    Open(MovieSummary),
    Back,
}

/// Search box, result list and detail view.
///
/// The search line and the active marker follow the urgent state. Everything
/// that reads the catalog follows the deferred state, so typing never waits
/// on the network.
pub struct MovieSearch {
    readers: Readers,
    options: ViewOptions,
}

impl MovieSearch {
    pub fn new(readers: Readers, options: ViewOptions) -> Self {
        Self { readers, options }
    }

    pub fn readers(&self) -> &Readers {
        &self.readers
    }

    fn results(
        &self,
        cx: &mut RenderCx<'_>,
        query: &str,
        active: Option<&MovieSummary>,
    ) -> ViewResult {
        if query.trim().is_empty() {
            return Ok("Search for something".into());
        }

        let search = cx.read(&self.readers.search, query.to_string())?;
        if search.results.is_empty() {
            return Ok(format!("No movies found for {query:?}").into());
        }

        let mut rows = Vec::new();
        for (index, result) in search.results.iter().take(self.options.results).enumerate() {
            let is_active = active.is_some_and(|active| active.id == result.id);
            rows.push(self.result_row(cx, index, result, is_active)?);
        }
        Ok(Element::column(rows))
    }

    fn result_row(
        &self,
        cx: &mut RenderCx<'_>,
        index: usize,
        result: &MovieSummary,
        is_active: bool,
    ) -> ViewResult {
        let config = cx.read(&self.readers.config, ())?;
        let marker = if is_active { '*' } else { ' ' };
        let title = Element::text(format!("{marker} {}. {}", index + 1, result.title));

        let size = config.images.poster_size(THUMBNAIL_SIZE);
        let thumbnail = match (&result.poster_path, size) {
            (Some(path), Some(size)) => {
                let url = config.images.poster_url(size, path);
                SuspenseBoundary::new(format!("thumbnail-{}", result.id))
                    .fallback("loading")
                    .error_fallback("no poster")
                    .grace(self.options.poster_grace)
                    .render(cx, |cx| {
                        let bytes = cx.read(&self.readers.poster, url)?;
                        Ok(describe_poster(size, &bytes).into())
                    })?
            }
            _ => Element::Empty,
        };

        Ok(Element::column([title, Element::indent(thumbnail)]))
    }

    fn details(&self, cx: &mut RenderCx<'_>, active: &MovieSummary) -> ViewResult {
        let movie = cx.read(&self.readers.movie, active.id)?;
        let poster = self.full_poster(cx, active)?;

        let mut lines = vec![Element::text("[:back]"), poster];
        lines.push(Element::text(active.title.as_str()));
        if let Some(tagline) = movie.tagline.as_deref().filter(|t| !t.is_empty()) {
            lines.push(Element::text(format!("\"{tagline}\"")));
        }
        if let Some(runtime) = movie.runtime {
            lines.push(Element::text(format!("{runtime} min")));
        }
        lines.push(Element::text(active.overview.as_str()));
        Ok(Element::column(lines))
    }

    fn full_poster(&self, cx: &mut RenderCx<'_>, movie: &MovieSummary) -> ViewResult {
        let Some(path) = &movie.poster_path else {
            return Ok(Element::Empty);
        };
        let config = cx.read(&self.readers.config, ())?;
        let Some(size) = config.images.poster_size(FULL_SIZE) else {
            return Ok(Element::Empty);
        };
        let url = config.images.poster_url(size, path);

        SuspenseBoundary::new("full-poster")
            .error_fallback("no poster")
            .grace(self.options.full_poster_grace)
            .render(cx, |cx| {
                let bytes = cx.read(&self.readers.poster, url)?;
                Ok(describe_poster(size, &bytes).into())
            })
    }
}

/// Stand-in for the image itself: its display size and byte count.
fn describe_poster(size: &str, bytes: &Bytes) -> String {
    match size_width(size) {
        Some(width) => format!(
            "[{width}x{:.0} poster, {} bytes]",
            thumbnail_height(width),
            bytes.len()
        ),
        None => format!("[{size} poster, {} bytes]", bytes.len()),
    }
}

impl Application for MovieSearch {
    type State = SearchState;
    type Message = Message;

    fn initial_state(&self) -> SearchState {
        SearchState::default()
    }

    fn update(&self, state: &mut SearchState, message: Message) {
        match message {
            Message::Clear => state.query.clear(),
            Message::Input(c) => state.query.push(c),
            Message::Open(result) => state.active_result = Some(result),
            Message::Back => state.active_result = None,
        }
    }

    fn view(&self, cx: &mut RenderCx<'_>, state: Tiers<'_, SearchState>) -> ViewResult {
        let results = self.results(
            cx,
            &state.deferred.query,
            state.urgent.active_result.as_ref(),
        )?;

        let mut page = vec![
            Element::text("Movie search"),
            Element::text(format!("> {}", state.urgent.query)),
            Element::indent(results),
        ];
        if let Some(active) = &state.deferred.active_result {
            page.push(Element::indent(self.details(cx, active)?));
        }
        Ok(Element::column(page))
    }
}
