//! End-to-end cycles over canned listing pages

mod common;

use common::{DIX_JOBS, DIX_SCHOLARSHIPS, DRT_JOBS, default_test_sources, elementor_item, page, pipeline};
use opportunity_harvester::application::PostingListing;
use opportunity_harvester::domain::posting::{NO_SUMMARY, NO_TITLE};
use opportunity_harvester::domain::{PageRequest, PostingFilter, PostingKind, PostingRepository};

fn drt_item(link: &str, title: &str) -> String {
    format!(
        r#"<article>
             <h2 class="entry-title"><a href="{link}">{title}</a></h2>
             <div class="entry-excerpt">Closing soon</div>
             <ul><li class="meta-date">May 1, 2024</li></ul>
           </article>"#
    )
}

#[tokio::test]
async fn repeated_cycle_over_same_html_is_idempotent() {
    let p = pipeline(default_test_sources()).await;
    p.pages.set_page(
        DIX_JOBS,
        &page(&[
            elementor_item("https://dix.test/jobs/1", "Graduate Trainee", Some("Apply now.")),
            elementor_item("https://dix.test/jobs/2", "Analyst", None),
        ]),
    );
    p.pages.set_page(DRT_JOBS, &page(&[drt_item("https://drt.test/jobs/1", "Engineer")]));
    p.pages.set_page(
        DIX_SCHOLARSHIPS,
        &page(&[elementor_item("https://dix.test/s/1", "MSc Award", None)]),
    );

    let first = p.cycle.run_cycle().await.unwrap();
    let second = p.cycle.run_cycle().await.unwrap();

    assert_eq!(first.created(), 4);
    assert_eq!(second.created(), 0);
    assert_eq!(second.updated(), 4);
    let all = PostingFilter::default();
    assert_eq!(p.postings.count(PostingKind::Job, &all).await.unwrap(), 3);
    assert_eq!(p.postings.count(PostingKind::Scholarship, &all).await.unwrap(), 1);
}

#[tokio::test]
async fn same_link_as_job_and_scholarship_is_stored_once_per_kind() {
    let p = pipeline(default_test_sources()).await;
    let item = page(&[elementor_item("https://dix.test/shared", "Fellowship", None)]);
    p.pages.set_page(DIX_JOBS, &item);
    p.pages.set_page(DIX_SCHOLARSHIPS, &item);

    p.cycle.run_cycle().await.unwrap();

    for kind in PostingKind::ALL {
        let stored = p.postings.find_by_link(kind, "https://dix.test/shared").await.unwrap();
        assert!(stored.is_some(), "missing {kind} posting");
    }
}

#[tokio::test]
async fn failed_source_does_not_stop_the_others() {
    let p = pipeline(default_test_sources()).await;
    p.pages.set_status(DIX_JOBS, 503);
    p.pages.set_page(DRT_JOBS, &page(&[drt_item("https://drt.test/jobs/1", "Engineer")]));
    p.pages.set_page(
        DIX_SCHOLARSHIPS,
        &page(&[elementor_item("https://dix.test/s/1", "MSc Award", None)]),
    );

    let report = p.cycle.run_cycle().await.unwrap();

    assert_eq!(report.failed_sources().len(), 1);
    assert_eq!(report.failed_sources()[0].url, DIX_JOBS);
    assert_eq!(report.created(), 2);
    assert!(
        p.postings
            .find_by_link(PostingKind::Job, "https://drt.test/jobs/1")
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn item_without_link_is_dropped_and_title_placeholder_applied() {
    let p = pipeline(default_test_sources()).await;
    p.pages.set_page(
        DIX_JOBS,
        r#"
        <article class="elementor-post"><h3 class="elementor-post__title">No link here</h3></article>
        <article class="elementor-post">
          <a class="elementor-post__read-more" href="https://dix.test/jobs/untitled">Read more</a>
        </article>"#,
    );

    let report = p.cycle.run_cycle().await.unwrap();

    let dix = &report.sources[0];
    assert_eq!(dix.extracted, 1);
    assert_eq!(dix.dropped, 1);
    assert_eq!(dix.created, 1);
    let stored = p
        .postings
        .find_by_link(PostingKind::Job, "https://dix.test/jobs/untitled")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, NO_TITLE);
}

#[tokio::test]
async fn degraded_scrape_overwrites_richer_record() {
    let p = pipeline(default_test_sources()).await;
    let link = "https://dix.test/jobs/9";

    p.pages.set_page(DIX_JOBS, &page(&[elementor_item(link, "Old", Some("full text"))]));
    p.cycle.run_cycle().await.unwrap();
    let before = p.postings.find_by_link(PostingKind::Job, link).await.unwrap().unwrap();

    p.pages.set_page(DIX_JOBS, &page(&[elementor_item(link, "New", None)]));
    p.cycle.run_cycle().await.unwrap();
    let after = p.postings.find_by_link(PostingKind::Job, link).await.unwrap().unwrap();

    assert_eq!(before.summary, "full text");
    assert_eq!(after.summary, NO_SUMMARY);
    assert_eq!(after.title, "New");
    assert_eq!(after.id, before.id);
    assert_eq!(after.created_at, before.created_at);
}

#[tokio::test]
async fn scholarship_refresh_moves_updated_at_only() {
    let p = pipeline(default_test_sources()).await;
    let link = "https://dix.test/s/7";
    p.pages.set_page(DIX_SCHOLARSHIPS, &page(&[elementor_item(link, "Award", None)]));

    p.cycle.run_cycle().await.unwrap();
    let first = p.postings.find_by_link(PostingKind::Scholarship, link).await.unwrap().unwrap();
    p.cycle.run_cycle().await.unwrap();
    let second = p.postings.find_by_link(PostingKind::Scholarship, link).await.unwrap().unwrap();

    assert_eq!(first.created_at, second.created_at);
    assert!(second.updated_at >= first.updated_at);
    assert!(second.updated_at.is_some());
}

#[tokio::test]
async fn stored_postings_are_listed_newest_first() {
    let p = pipeline(default_test_sources()).await;
    let items: Vec<String> = (1..=12)
        .map(|i| elementor_item(&format!("https://dix.test/jobs/{i}"), &format!("Job {i}"), None))
        .collect();
    p.pages.set_page(DIX_JOBS, &page(&items));
    p.cycle.run_cycle().await.unwrap();

    let listing = PostingListing::new(p.postings.clone());
    let first = listing.page(PostingKind::Job, PageRequest::default()).await.unwrap();
    let second = listing.page(PostingKind::Job, PageRequest::new(2, None)).await.unwrap();

    assert_eq!(first.count, 12);
    assert_eq!(first.total_pages, 2);
    // Items are stored in listing order, so the last one is the newest
    assert_eq!(first.results[0].link, "https://dix.test/jobs/12");
    assert_eq!(second.results.len(), 2);
    assert!(!second.has_next);
}
