//! Listing crawler: walks pages 1, 2, ... and publishes image URLs

use super::{ExitReason, WorkerReport};
use crate::config::SourceConfig;
use crate::extract::Extractor;
use crate::fetch::Fetcher;
use crate::observability::WorkerStats;
use crate::queue::WorkQueue;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use url::Url;

pub struct ExtractionWorker {
    source: SourceConfig,
    queue_key: String,
    queue: Arc<dyn WorkQueue>,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    shutdown: CancellationToken,
}

impl ExtractionWorker {
    pub fn new(
        source: SourceConfig,
        queue_key: String,
        queue: Arc<dyn WorkQueue>,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            queue_key,
            queue,
            fetcher,
            extractor,
            shutdown,
        }
    }

    pub async fn run(self) -> WorkerReport {
        info!("Extraction worker started");
        let mut stats = WorkerStats::default();
        let mut page: u32 = 1;

        loop {
            if self.shutdown.is_cancelled() {
                info!(page, "Extraction worker stopping on shutdown");
                return WorkerReport::new(ExitReason::Cancelled, stats);
            }
            if self.source.max_pages.is_some_and(|max| page > max) {
                info!(page, "Page limit reached");
                break;
            }

            let page_url = self.source.page_url(page);
            let content = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!(page, "Extraction worker stopping on shutdown");
                    return WorkerReport::new(ExitReason::Cancelled, stats);
                }
                result = self.fetcher.get_text(&page_url) => match result {
                    Ok(content) => {
                        stats.pages_fetched += 1;
                        content
                    }
                    Err(e) => {
                        warn!(page, url = %page_url, error = %e, "Listing fetch failed, treating page as empty");
                        String::new()
                    }
                },
            };

            let matches = self.extractor.extract(&content);
            if self.is_last_page(matches.len()) {
                info!(page, matches = matches.len(), "URL extraction complete");
                break;
            }

            let urls = resolve_candidates(&page_url, matches);
            match self.queue.add_members(&self.queue_key, &urls).await {
                Ok(inserted) => {
                    stats.urls_published += inserted as u64;
                    info!(page, count = urls.len(), inserted, "Published page URLs");
                }
                Err(e) => {
                    error!(page, error = %e, "Queue insert failed, stopping extraction");
                    break;
                }
            }

            page += 1;
        }

        WorkerReport::new(ExitReason::Finished, stats)
    }

    /// Empty page, or the site-specific repeat sentinel when configured
    fn is_last_page(&self, match_count: usize) -> bool {
        match_count == 0 || self.source.repeat_sentinel == Some(match_count)
    }
}

/// Drop blanks, resolve relative links against the page, dedup in first-seen order
fn resolve_candidates(page_url: &str, matches: Vec<String>) -> Vec<String> {
    let base = Url::parse(page_url).ok();
    let mut seen = HashSet::new();

    matches
        .iter()
        .map(|candidate| candidate.trim())
        .filter(|candidate| !candidate.is_empty())
        .filter_map(|candidate| match &base {
            Some(base) => base.join(candidate).ok(),
            None => Url::parse(candidate).ok(),
        })
        .map(String::from)
        .filter(|url| seen.insert(url.clone()))
        .collect()
}
