//! HTML extraction for the supported listing layouts
//!
//! One extractor per layout. Extractors compile their selectors once and
//! never fail on markup: missing pieces come back as `None` and an item
//! without a link is skipped.

pub mod de_round_table;
pub mod dom;
pub mod elementor;
pub mod error;
pub mod jobs_region;
pub mod scholarship_region;

pub use de_round_table::DeRoundTableExtractor;
pub use elementor::ElementorPostsExtractor;
pub use error::{ParsingError, ParsingResult};
pub use jobs_region::JobsRegionExtractor;
pub use scholarship_region::ScholarshipRegionExtractor;

use scraper::{Html, Selector};

use crate::domain::{RawPosting, SourceLayout};

/// Items read from one listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub items: Vec<RawPosting>,
    /// Item containers that had no usable link
    pub skipped: usize,
}

pub trait PostingExtractor: Send + Sync {
    fn layout(&self) -> SourceLayout;

    /// Matches one listing item
    fn container(&self) -> &Selector;

    /// Items found on a listing page, in document order
    fn extract(&self, document: &Html) -> Vec<RawPosting>;

    /// Whether each item's own page must be fetched to fill it in
    fn detail_enrichment(&self) -> bool {
        false
    }

    fn enrich_from_detail(&self, _raw: &mut RawPosting, _detail: &Html) {}

    /// Parses and extracts without letting the document escape
    fn extract_from_str(&self, html: &str) -> Vec<RawPosting> {
        let document = Html::parse_document(html);
        self.extract(&document)
    }

    /// Extracts and counts the containers that were skipped for lack of a link
    fn extract_listing(&self, html: &str) -> Listing {
        let document = Html::parse_document(html);
        let items = self.extract(&document);
        let containers = document.select(self.container()).count();
        Listing {
            skipped: containers.saturating_sub(items.len()),
            items,
        }
    }

    fn enrich_from_str(&self, raw: &mut RawPosting, html: &str) {
        let document = Html::parse_document(html);
        self.enrich_from_detail(raw, &document);
    }
}

pub fn extractor_for(layout: SourceLayout) -> ParsingResult<Box<dyn PostingExtractor>> {
    Ok(match layout {
        SourceLayout::ElementorPosts => Box::new(ElementorPostsExtractor::new()?),
        SourceLayout::JobsRegion => Box::new(JobsRegionExtractor::new()?),
        SourceLayout::DeRoundTable => Box::new(DeRoundTableExtractor::new()?),
        SourceLayout::ScholarshipRegion => Box::new(ScholarshipRegionExtractor::new()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_layout_has_an_extractor() {
        for layout in [
            SourceLayout::ElementorPosts,
            SourceLayout::JobsRegion,
            SourceLayout::DeRoundTable,
            SourceLayout::ScholarshipRegion,
        ] {
            let extractor = extractor_for(layout).unwrap();
            assert_eq!(extractor.layout(), layout);
            assert_eq!(extractor.detail_enrichment(), layout == SourceLayout::JobsRegion);
        }
    }

    #[test]
    fn listing_counts_items_without_links() {
        let extractor = extractor_for(SourceLayout::DeRoundTable).unwrap();
        let listing = extractor.extract_listing(
            r#"
            <article><h2 class="entry-title">No link</h2></article>
            <article><h2 class="entry-title"><a href="https://x.test/1">Linked</a></h2></article>"#,
        );

        assert_eq!(listing.items.len(), 1);
        assert_eq!(listing.skipped, 1);
    }

    #[test]
    fn empty_document_yields_nothing() {
        let extractor = extractor_for(SourceLayout::DeRoundTable).unwrap();
        assert!(extractor.extract_from_str("<html><body></body></html>").is_empty());
    }
}
