//! Newspaper-theme thumbnail listings whose summary and date only exist on
//! each posting's own page.

use scraper::{Html, Selector};
use tracing::debug;

use super::dom::{self, AttrRule};
use super::error::ParsingResult;
use super::PostingExtractor;
use crate::domain::posting::NO_TITLE;
use crate::domain::{RawPosting, SourceLayout};

/// Detail-page summaries are cut to this many characters
pub const SUMMARY_MAX_CHARS: usize = 300;

pub struct JobsRegionExtractor {
    container: Selector,
    titled_link: Selector,
    link_fallbacks: Vec<Selector>,
    image: Vec<AttrRule>,
    detail_date: Selector,
    detail_content: Selector,
}

impl JobsRegionExtractor {
    pub fn new() -> ParsingResult<Self> {
        Ok(Self {
            container: dom::compile("div.td-module-thumb")?,
            titled_link: dom::compile("a[href][title]")?,
            link_fallbacks: dom::compile_all(&["a[href][title]", "a[href]"])?,
            image: vec![AttrRule::new("span.entry-thumb[data-img-url]", "data-img-url")?],
            detail_date: dom::compile("time.entry-date")?,
            detail_content: dom::compile("div.td-post-content")?,
        })
    }
}

impl PostingExtractor for JobsRegionExtractor {
    fn layout(&self) -> SourceLayout {
        SourceLayout::JobsRegion
    }

    fn container(&self) -> &Selector {
        &self.container
    }

    fn extract(&self, document: &Html) -> Vec<RawPosting> {
        let postings: Vec<RawPosting> = document
            .select(&self.container)
            .filter_map(|item| {
                let link = dom::first_href(item, &self.link_fallbacks)?;
                let title = item
                    .select(&self.titled_link)
                    .find_map(|a| dom::attr_of(a, "title"))
                    .unwrap_or_else(|| NO_TITLE.to_string());
                Some(RawPosting {
                    title,
                    link: Some(link),
                    image_url: dom::first_attr(item, &self.image),
                    ..RawPosting::default()
                })
            })
            .collect();

        debug!("JobsRegion listing yielded {} items", postings.len());
        postings
    }

    fn detail_enrichment(&self) -> bool {
        true
    }

    fn enrich_from_detail(&self, raw: &mut RawPosting, detail: &Html) {
        let root = detail.root_element();
        if let Some(date) = dom::text_of(root, &self.detail_date) {
            raw.date_text = Some(date);
        }
        if let Some(content) = dom::text_of(root, &self.detail_content) {
            raw.summary = Some(dom::truncate_chars(&content, SUMMARY_MAX_CHARS));
        }
    }
}
