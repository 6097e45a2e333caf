//! Upstream sources and the layout family each one is parsed with

use serde::{Deserialize, Serialize};
use std::fmt;

use super::posting::PostingKind;

/// Markup family of a listing page. Each layout has its own extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLayout {
    /// Elementor "posts" widget (Dixcoverhub)
    ElementorPosts,
    /// Newspaper-theme thumbnails whose details live on the post page
    JobsRegion,
    /// Plain WordPress archive articles
    DeRoundTable,
    /// Newspaper-theme module blocks with inline excerpts
    ScholarshipRegion,
}

impl fmt::Display for SourceLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ElementorPosts => "elementor_posts",
            Self::JobsRegion => "jobs_region",
            Self::DeRoundTable => "de_round_table",
            Self::ScholarshipRegion => "scholarship_region",
        };
        f.write_str(name)
    }
}

/// One listing page to scrape per cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Stored as `source` on every posting from this page
    pub name: String,
    pub kind: PostingKind,
    pub layout: SourceLayout,
    pub url: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

const fn enabled_by_default() -> bool {
    true
}

impl SourceConfig {
    pub fn new(name: &str, kind: PostingKind, layout: SourceLayout, url: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            layout,
            url: url.to_string(),
            enabled: true,
        }
    }
}

impl fmt::Display for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}
