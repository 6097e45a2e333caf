//! Reconciles normalized postings against the store, keyed by link

use std::sync::Arc;
use tracing::debug;

use crate::domain::{NewPosting, Posting, PostingKind, PostingRepository, StoreResult};

/// How an upsert landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    Created,
    Updated,
}

#[derive(Clone)]
pub struct Reconciler {
    repository: Arc<dyn PostingRepository>,
}

impl Reconciler {
    pub fn new(repository: Arc<dyn PostingRepository>) -> Self {
        Self { repository }
    }

    /// Creates the posting or overwrites every field but the link and the
    /// first-seen time. A later, poorer scrape replaces richer stored data.
    pub async fn upsert(&self, kind: PostingKind, posting: &NewPosting) -> StoreResult<(Posting, bool)> {
        let (stored, created) = self.repository.upsert(kind, posting).await?;
        debug!(
            "{} {} posting {} ({})",
            if created { "Created" } else { "Refreshed" },
            kind,
            stored.link,
            stored.title
        );
        Ok((stored, created))
    }

    pub async fn reconcile(&self, kind: PostingKind, posting: &NewPosting) -> StoreResult<Reconciled> {
        let (_, created) = self.upsert(kind, posting).await?;
        Ok(if created {
            Reconciled::Created
        } else {
            Reconciled::Updated
        })
    }
}
