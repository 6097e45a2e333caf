//! Newspaper-theme module blocks with inline excerpts

use scraper::{Html, Selector};
use tracing::debug;

use super::dom::{self, AttrRule};
use super::error::ParsingResult;
use super::PostingExtractor;
use crate::domain::posting::NO_TITLE;
use crate::domain::{RawPosting, SourceLayout};

pub struct ScholarshipRegionExtractor {
    container: Selector,
    title_link: Selector,
    link_fallbacks: Vec<Selector>,
    summary: Selector,
    date: Selector,
    /// Lazy-loaded thumbnail first, then a plain image
    image: Vec<AttrRule>,
}

impl ScholarshipRegionExtractor {
    pub fn new() -> ParsingResult<Self> {
        Ok(Self {
            container: dom::compile("div.td_module_wrap")?,
            title_link: dom::compile("h3.entry-title a")?,
            link_fallbacks: dom::compile_all(&["h3.entry-title a[href]", "div.td-module-thumb a[href]"])?,
            summary: dom::compile("div.td-excerpt")?,
            date: dom::compile("time.entry-date")?,
            image: vec![
                AttrRule::new("span.entry-thumb[data-img-url]", "data-img-url")?,
                AttrRule::new("img[src]", "src")?,
            ],
        })
    }
}

impl PostingExtractor for ScholarshipRegionExtractor {
    fn layout(&self) -> SourceLayout {
        SourceLayout::ScholarshipRegion
    }

    fn container(&self) -> &Selector {
        &self.container
    }

    fn extract(&self, document: &Html) -> Vec<RawPosting> {
        let postings: Vec<RawPosting> = document
            .select(&self.container)
            .filter_map(|item| {
                let link = dom::first_href(item, &self.link_fallbacks)?;
                Some(RawPosting {
                    title: dom::text_of(item, &self.title_link).unwrap_or_else(|| NO_TITLE.to_string()),
                    link: Some(link),
                    summary: dom::text_of(item, &self.summary),
                    date_text: dom::text_of(item, &self.date),
                    image_url: dom::first_attr(item, &self.image),
                })
            })
            .collect();

        debug!("ScholarshipRegion listing yielded {} items", postings.len());
        postings
    }
}
