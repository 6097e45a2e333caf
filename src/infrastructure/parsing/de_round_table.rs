//! Plain WordPress archive pages

use scraper::{Html, Selector};
use tracing::debug;

use super::dom;
use super::error::ParsingResult;
use super::PostingExtractor;
use crate::domain::posting::NO_TITLE;
use crate::domain::{RawPosting, SourceLayout};

pub struct DeRoundTableExtractor {
    container: Selector,
    title_link: Selector,
    link_fallbacks: Vec<Selector>,
    summary: Selector,
    date: Selector,
}

impl DeRoundTableExtractor {
    pub fn new() -> ParsingResult<Self> {
        Ok(Self {
            container: dom::compile("article")?,
            title_link: dom::compile("h2.entry-title a")?,
            link_fallbacks: dom::compile_all(&[
                "h2.entry-title a[href]",
                "a.more-link[href]",
                "div.post-thumbnail a[href]",
            ])?,
            summary: dom::compile("div.entry-excerpt")?,
            date: dom::compile("li.meta-date")?,
        })
    }
}

impl PostingExtractor for DeRoundTableExtractor {
    fn layout(&self) -> SourceLayout {
        SourceLayout::DeRoundTable
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
                    image_url: None,
                })
            })
            .collect();

        debug!("DeRoundTable listing yielded {} items", postings.len());
        postings
    }
}
