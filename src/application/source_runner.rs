//! Fetch, extract, enrich, normalize and reconcile one source.
//!
//! Failures stay inside the source: a fetch error ends the source, a detail
//! or store error costs one item.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::normalizer::{NormalizeError, normalize};
use super::reconciler::{Reconciled, Reconciler};
use crate::domain::{PageFetcher, PostingKind, RawPosting, SourceConfig, SourceLayout};
use crate::infrastructure::parsing::{ParsingResult, PostingExtractor, extractor_for};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub kind: PostingKind,
    pub url: String,
    /// Set when the listing page could not be fetched
    pub fetch_error: Option<String>,
    pub extracted: usize,
    /// Listing items without a usable link
    pub dropped: usize,
    pub created: usize,
    pub updated: usize,
    /// Items the store rejected
    pub failed: usize,
    /// Detail pages that could not be fetched; those items keep placeholders
    pub detail_failures: usize,
    pub elapsed: Duration,
}

impl SourceReport {
    fn new(source: &SourceConfig) -> Self {
        Self {
            source: source.name.clone(),
            kind: source.kind,
            url: source.url.clone(),
            fetch_error: None,
            extracted: 0,
            dropped: 0,
            created: 0,
            updated: 0,
            failed: 0,
            detail_failures: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_success(&self) -> bool {
        self.fetch_error.is_none()
    }

    pub fn stored(&self) -> usize {
        self.created + self.updated
    }
}

pub struct SourceRunner {
    fetcher: Arc<dyn PageFetcher>,
    reconciler: Reconciler,
    extractors: HashMap<SourceLayout, Box<dyn PostingExtractor>>,
    detail_concurrency: usize,
}

impl SourceRunner {
    /// Builds one extractor per layout up front
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        reconciler: Reconciler,
        detail_concurrency: usize,
    ) -> ParsingResult<Self> {
        let layouts = [
            SourceLayout::ElementorPosts,
            SourceLayout::JobsRegion,
            SourceLayout::DeRoundTable,
            SourceLayout::ScholarshipRegion,
        ];
        let mut extractors = HashMap::with_capacity(layouts.len());
        for layout in layouts {
            extractors.insert(layout, extractor_for(layout)?);
        }

        Ok(Self {
            fetcher,
            reconciler,
            extractors,
            detail_concurrency: detail_concurrency.max(1),
        })
    }

    pub async fn run(&self, source: &SourceConfig) -> SourceReport {
        let started = Instant::now();
        let mut report = SourceReport::new(source);

        let Some(extractor) = self.extractors.get(&source.layout) else {
            report.fetch_error = Some(format!("no extractor for layout {}", source.layout));
            report.elapsed = started.elapsed();
            return report;
        };

        let listing = match self.fetcher.fetch_text(&source.url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("[{}] Listing fetch failed, skipping source: {}", source, e);
                report.fetch_error = Some(e.to_string());
                report.elapsed = started.elapsed();
                return report;
            }
        };

        let extracted = extractor.extract_listing(&listing);
        report.dropped = extracted.skipped;
        let mut raws = extracted.items;
        report.extracted = raws.len();
        if raws.is_empty() && report.dropped == 0 {
            warn!("[{}] No postings found on {}; markup may have changed", source, source.url);
        }

        if extractor.detail_enrichment() {
            let (enriched, failures) = self.enrich(extractor.as_ref(), raws, source).await;
            raws = enriched;
            report.detail_failures = failures;
        }

        for raw in raws {
            let posting = match normalize(raw, &source.name) {
                Ok(posting) => posting,
                Err(NormalizeError::MissingLink { title }) => {
                    debug!("[{}] Dropping '{}': no link", source, title);
                    report.dropped += 1;
                    continue;
                }
            };

            match self.reconciler.reconcile(source.kind, &posting).await {
                Ok(Reconciled::Created) => report.created += 1,
                Ok(Reconciled::Updated) => report.updated += 1,
                Err(e) => {
                    warn!("[{}] Could not store {}: {}", source, posting.link, e);
                    report.failed += 1;
                }
            }
        }

        report.elapsed = started.elapsed();
        info!(
            "[{}] {} extracted, {} created, {} updated, {} dropped, {} failed in {:?}",
            source,
            report.extracted,
            report.created,
            report.updated,
            report.dropped,
            report.failed,
            report.elapsed
        );
        report
    }

    /// Fetches each item's own page, `detail_concurrency` at a time, keeping
    /// listing order
    async fn enrich(
        &self,
        extractor: &dyn PostingExtractor,
        raws: Vec<RawPosting>,
        source: &SourceConfig,
    ) -> (Vec<RawPosting>, usize) {
        let results: Vec<(RawPosting, bool)> = stream::iter(raws)
            .map(|mut raw| async move {
                let Some(link) = raw.usable_link().map(str::to_string) else {
                    return (raw, true);
                };
                match self.fetcher.fetch_text(&link).await {
                    Ok(body) => {
                        extractor.enrich_from_str(&mut raw, &body);
                        (raw, true)
                    }
                    Err(e) => {
                        warn!("[{}] Detail page {} unavailable: {}", source, link, e);
                        (raw, false)
                    }
                }
            })
            .buffered(self.detail_concurrency)
            .collect()
            .await;

        let failures = results.iter().filter(|(_, ok)| !ok).count();
        (results.into_iter().map(|(raw, _)| raw).collect(), failures)
    }
}
