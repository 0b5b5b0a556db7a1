//! Search pipeline: paginate the backend, fetch each result page, extract a
//! company record and merge it into the session until the cap is reached or
//! results run out.

use futures::future::join_all;
use indexmap::IndexMap;
use tracing::{debug, info, trace, warn};

use crate::company::{CandidateCompany, CandidateId, PartialCandidate};
use crate::config::AppConfig;
use crate::error::{FetchOutcome, SearchError};
use crate::extractor::{extract, html_to_text};
use crate::fetcher::PageFetcher;
use crate::search_backend::SearchBackend;
use crate::session::SearchSession;

/// Where the pipeline currently is, logged at trace level on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Idle,
    Paginating,
    Fetching,
    Parsing,
    Extracting,
    Deduplicating,
    Accumulated,
    Done,
}

fn enter(phase: &mut SearchPhase, next: SearchPhase) {
    trace!("Search phase {:?} -> {:?}", phase, next);
    *phase = next;
}

pub struct SearchOrchestrator {
    backend: SearchBackend,
    fetcher: PageFetcher,
    query_token: String,
    max_pages: u32,
    candidate_cap: usize,
    fetch_concurrency: usize,
}

impl SearchOrchestrator {
    pub fn new(config: &AppConfig) -> Result<Self, SearchError> {
        Ok(Self {
            backend: SearchBackend::new(&config.search)?,
            fetcher: PageFetcher::new(&config.http)?,
            query_token: config.search.query_token.clone(),
            max_pages: config.search.max_pages,
            candidate_cap: config.search.candidate_cap,
            fetch_concurrency: config.search.fetch_concurrency.max(1),
        })
    }

    /// Override pagination limits from the command line
    pub fn with_limits(mut self, max_pages: Option<u32>, candidate_cap: Option<usize>) -> Self {
        if let Some(pages) = max_pages {
            self.max_pages = pages;
        }
        if let Some(cap) = candidate_cap {
            self.candidate_cap = cap;
        }
        self
    }

    pub fn build_query(&self, category: &str, location: &str) -> String {
        [category.trim(), location.trim(), self.query_token.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run a search and return the admitted companies keyed by id, in
    /// discovery order
    pub async fn search(
        &self,
        category: &str,
        location: &str,
    ) -> Result<IndexMap<CandidateId, CandidateCompany>, SearchError> {
        Ok(self.search_session(category, location).await?.into_companies())
    }

    /// Same as [`search`](Self::search) but hands back the whole session so
    /// callers can report its statistics
    pub async fn search_session(
        &self,
        category: &str,
        location: &str,
    ) -> Result<SearchSession, SearchError> {
        if category.trim().is_empty() {
            return Err(SearchError::InvalidQuery("category must not be empty".to_string()));
        }

        let query = self.build_query(category, location);
        info!("Searching for {:?} (up to {} pages, cap {})", query, self.max_pages, self.candidate_cap);

        let mut session = SearchSession::new();
        let mut phase = SearchPhase::Idle;

        for page in 0..self.max_pages {
            enter(&mut phase, SearchPhase::Paginating);

            let envelope = match self.backend.submit(&query, page).await {
                FetchOutcome::Success(envelope) => envelope,
                FetchOutcome::TransientFailure(reason) => {
                    warn!("Stopping pagination at page {}: {}", page, reason);
                    break;
                }
                FetchOutcome::FatalFailure(reason) => {
                    return Err(SearchError::Backend { page, reason });
                }
            };
            session.record_page_fetched();

            let urls = envelope.urls();
            if urls.is_empty() {
                info!("Result page {} is empty, stopping pagination", page);
                break;
            }
            info!("Result page {}: {} URLs", page, urls.len());

            if self.process_page(&urls, &mut session, &mut phase).await {
                info!("Reached the cap of {} companies", self.candidate_cap);
                break;
            }
        }

        enter(&mut phase, SearchPhase::Done);
        let stats = session.stats();
        info!(
            "Search finished: {} companies from {} URLs on {} result pages ({} without data, {} duplicates)",
            session.len(),
            stats.urls_visited,
            stats.pages_fetched,
            stats.pages_without_data,
            stats.duplicates_suppressed
        );
        Ok(session)
    }

    /// Fetch and extract every URL of one result page.
    ///
    /// URLs are fetched in chunks of `fetch_concurrency` and admitted in URL
    /// order. Once the cap is hit nothing more is admitted, the current chunk
    /// is allowed to finish and no further chunk is started. Returns true when
    /// the cap was reached.
    async fn process_page(
        &self,
        urls: &[String],
        session: &mut SearchSession,
        phase: &mut SearchPhase,
    ) -> bool {
        if session.len() >= self.candidate_cap {
            return true;
        }

        for chunk in urls.chunks(self.fetch_concurrency) {
            enter(phase, SearchPhase::Fetching);
            let outcomes = join_all(chunk.iter().map(|url| self.fetcher.fetch(url))).await;

            for (url, outcome) in chunk.iter().zip(outcomes) {
                if session.len() >= self.candidate_cap {
                    debug!("Cap reached, not admitting {}", url);
                    continue;
                }

                let partial = match outcome.ok() {
                    Some(html) => {
                        enter(phase, SearchPhase::Parsing);
                        let text = html_to_text(&html);
                        enter(phase, SearchPhase::Extracting);
                        extract(&text)
                    }
                    None => {
                        debug!("No content from {}", url);
                        PartialCandidate::default()
                    }
                };
                session.record_url_visited(!partial.is_empty());

                enter(phase, SearchPhase::Deduplicating);
                if session.admit(partial, url).is_some() {
                    enter(phase, SearchPhase::Accumulated);
                }
            }

            if session.len() >= self.candidate_cap {
                return true;
            }
        }

        false
    }
}
