//! Shared fixtures for the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use opportunity_harvester::application::{OpportunityCycle, Reconciler, SourceRunner};
use opportunity_harvester::domain::{PostingKind, SourceConfig, SourceLayout};
use opportunity_harvester::infrastructure::{SqlitePostingRepository, SqliteTaskRegistry};
use opportunity_harvester::test_utils::{StubFetcher, TestDatabase};

pub const DIX_JOBS: &str = "https://dix.test/category/jobs/";
pub const DIX_SCHOLARSHIPS: &str = "https://dix.test/category/scholarships/";
pub const DRT_JOBS: &str = "https://drt.test/category/jobs-vacancies/";

pub struct Pipeline {
    pub pages: Arc<StubFetcher>,
    /// Keeps the in-memory database alive
    pub db: TestDatabase,
    pub postings: Arc<SqlitePostingRepository>,
    pub registry: Arc<SqliteTaskRegistry>,
    pub cycle: Arc<OpportunityCycle>,
}

pub fn default_test_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig::new("Dixcoverhub", PostingKind::Job, SourceLayout::ElementorPosts, DIX_JOBS),
        SourceConfig::new("DeRoundTable", PostingKind::Job, SourceLayout::DeRoundTable, DRT_JOBS),
        SourceConfig::new(
            "Dixcoverhub",
            PostingKind::Scholarship,
            SourceLayout::ElementorPosts,
            DIX_SCHOLARSHIPS,
        ),
    ]
}

pub async fn pipeline(sources: Vec<SourceConfig>) -> Pipeline {
    let db = TestDatabase::new().await.unwrap();
    let pool = Arc::new(db.pool());
    let pages = Arc::new(StubFetcher::new());
    let postings = Arc::new(SqlitePostingRepository::from_arc(Arc::clone(&pool)));
    let registry = Arc::new(SqliteTaskRegistry::from_arc(pool));

    let runner = SourceRunner::new(pages.clone(), Reconciler::new(postings.clone()), 2).unwrap();
    let cycle = Arc::new(OpportunityCycle::new(runner, sources));

    Pipeline {
        pages,
        db,
        postings,
        registry,
        cycle,
    }
}

pub fn elementor_item(link: &str, title: &str, excerpt: Option<&str>) -> String {
    let excerpt = excerpt
        .map(|text| format!(r#"<div class="elementor-post__excerpt"><p>{text}</p></div>"#))
        .unwrap_or_default();
    format!(
        r#"<article class="elementor-post">
             <h3 class="elementor-post__title"><a href="{link}">{title}</a></h3>
             <span class="elementor-post-date">2 days ago</span>
             {excerpt}
           </article>"#
    )
}

pub fn page(items: &[String]) -> String {
    format!("<html><body>{}</body></html>", items.concat())
}
