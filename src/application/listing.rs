//! Read side: newest-first pages of stored postings

use std::sync::Arc;

use crate::domain::{
    PageRequest, PostingFilter, PostingKind, PostingOrder, PostingPage, PostingQuery, PostingRepository,
    StoreResult,
};

#[derive(Clone)]
pub struct PostingListing {
    repository: Arc<dyn PostingRepository>,
}

impl PostingListing {
    pub fn new(repository: Arc<dyn PostingRepository>) -> Self {
        Self { repository }
    }

    pub async fn page(&self, kind: PostingKind, request: PageRequest) -> StoreResult<PostingPage> {
        self.page_filtered(kind, &PostingFilter::default(), request).await
    }

    /// A page past the end comes back empty with the real totals
    pub async fn page_filtered(
        &self,
        kind: PostingKind,
        filter: &PostingFilter,
        request: PageRequest,
    ) -> StoreResult<PostingPage> {
        let count = self.repository.count(kind, filter).await?;
        let query = PostingQuery {
            filter: filter.clone(),
            order: PostingOrder::NewestFirst,
            limit: Some(request.page_size),
            offset: request.offset(),
        };
        let results = self.repository.list(kind, &query).await?;

        let total_pages = u32::try_from(count.div_ceil(u64::from(request.page_size))).unwrap_or(u32::MAX);
        Ok(PostingPage {
            count,
            page: request.page,
            page_size: request.page_size,
            total_pages,
            has_next: request.page < total_pages,
            has_previous: request.page > 1,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::SqlitePostingRepository;
    use crate::test_utils::{TestDatabase, new_posting};

    async fn listing_with(n: usize) -> (PostingListing, TestDatabase) {
        let db = TestDatabase::new().await.unwrap();
        let repository = Arc::new(SqlitePostingRepository::new(db.pool()));
        for i in 1..=n {
            repository
                .create(PostingKind::Job, &new_posting(&format!("https://x.test/{i}"), &format!("Job {i}")))
                .await
                .unwrap();
        }
        (PostingListing::new(repository), db)
    }

    #[tokio::test]
    async fn first_page_holds_newest_postings() {
        let (listing, _db) = listing_with(25).await;

        let page = listing.page(PostingKind::Job, PageRequest::default()).await.unwrap();

        assert_eq!(page.count, 25);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(!page.has_previous);
        assert_eq!(page.results.len(), 10);
        assert_eq!(page.results[0].title, "Job 25");
    }

    #[tokio::test]
    async fn last_page_is_partial() {
        let (listing, _db) = listing_with(25).await;

        let page = listing.page(PostingKind::Job, PageRequest::new(3, None)).await.unwrap();

        assert_eq!(page.results.len(), 5);
        assert!(!page.has_next);
        assert!(page.has_previous);
        assert_eq!(page.results[4].title, "Job 1");
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty() {
        let (listing, _db) = listing_with(3).await;

        let page = listing.page(PostingKind::Job, PageRequest::new(7, None)).await.unwrap();

        assert!(page.results.is_empty());
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_next);
    }

    #[tokio::test]
    async fn huge_page_number_is_empty_not_a_panic() {
        let (listing, _db) = listing_with(3).await;

        let page = listing
            .page(PostingKind::Job, PageRequest::new(500_000_000, None))
            .await
            .unwrap();

        assert!(page.results.is_empty());
        assert_eq!(page.count, 3);
        assert_eq!(page.page, 500_000_000);
        assert!(page.has_previous);
        assert!(!page.has_next);
    }

    #[tokio::test]
    async fn filter_narrows_count_and_results() {
        let (listing, _db) = listing_with(12).await;
        let filter = PostingFilter {
            title_contains: Some("job 1".into()),
            ..PostingFilter::default()
        };

        let page = listing
            .page_filtered(PostingKind::Job, &filter, PageRequest::new(1, Some(50)))
            .await
            .unwrap();

        // Job 1, Job 10, Job 11, Job 12
        assert_eq!(page.count, 4);
        assert_eq!(page.results.len(), 4);
    }

    #[tokio::test]
    async fn empty_table_has_zero_pages() {
        let (listing, _db) = listing_with(0).await;

        let page = listing.page(PostingKind::Scholarship, PageRequest::default()).await.unwrap();

        assert_eq!(page.count, 0);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next);
    }
}
