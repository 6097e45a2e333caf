//! Elementor "posts" widget listings

use scraper::{Html, Selector};
use tracing::debug;

use super::dom::{self, AttrRule};
use super::error::ParsingResult;
use super::PostingExtractor;
use crate::domain::posting::NO_TITLE;
use crate::domain::{RawPosting, SourceLayout};

pub struct ElementorPostsExtractor {
    container: Selector,
    title_link: Selector,
    /// Title link first, then the read-more and thumbnail links
    link_fallbacks: Vec<Selector>,
    summary: Selector,
    date: Selector,
    image: Vec<AttrRule>,
}

impl ElementorPostsExtractor {
    pub fn new() -> ParsingResult<Self> {
        Ok(Self {
            container: dom::compile("article.elementor-post")?,
            title_link: dom::compile("h3.elementor-post__title a")?,
            link_fallbacks: dom::compile_all(&[
                "h3.elementor-post__title a[href]",
                "a.elementor-post__read-more[href]",
                "a.elementor-post__thumbnail__link[href]",
            ])?,
            summary: dom::compile("div.elementor-post__excerpt")?,
            date: dom::compile("span.elementor-post-date")?,
            image: vec![AttrRule::new("img[src]", "src")?],
        })
    }
}

impl PostingExtractor for ElementorPostsExtractor {
    fn layout(&self) -> SourceLayout {
        SourceLayout::ElementorPosts
    }

    fn container(&self) -> &Selector {
        &self.container
    }

    fn extract(&self, document: &Html) -> Vec<RawPosting> {
        let postings: Vec<RawPosting> = document
            .select(&self.container)
            .filter_map(|item| {
                let link = dom::first_href(item, &self.link_fallbacks)?;
                let title = dom::text_of(item, &self.title_link).unwrap_or_else(|| NO_TITLE.to_string());
                Some(RawPosting {
                    title,
                    link: Some(link),
                    summary: dom::text_of(item, &self.summary),
                    date_text: dom::text_of(item, &self.date),
                    image_url: dom::first_attr(item, &self.image),
                })
            })
            .collect();

        debug!("Elementor listing yielded {} items", postings.len());
        postings
    }
}
