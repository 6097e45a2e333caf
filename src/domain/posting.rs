//! Posting entities: what an extractor sees, what the normalizer produces,
//! and what the store keeps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder title when the listing has no title element.
pub const NO_TITLE: &str = "No title";
/// Placeholder summary when neither listing nor detail page yields one.
pub const NO_SUMMARY: &str = "No summary";
/// Placeholder for a missing posting date.
pub const UNKNOWN_DATE: &str = "Unknown date";
/// Image URL stored when no image was found.
pub const NO_IMAGE: &str = "";

/// The two stored variants. They share a shape but live in separate tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostingKind {
    Job,
    Scholarship,
}

impl PostingKind {
    pub const ALL: [Self; 2] = [Self::Job, Self::Scholarship];

    /// Table holding this variant
    pub const fn table(self) -> &'static str {
        match self {
            Self::Job => "job_posts",
            Self::Scholarship => "scholarship_posts",
        }
    }

    /// Column set once on first insert
    pub const fn first_seen_column(self) -> &'static str {
        match self {
            Self::Job => "scraped_at",
            Self::Scholarship => "created_at",
        }
    }

    /// Whether the variant records the time of the last upsert
    pub const fn tracks_updates(self) -> bool {
        matches!(self, Self::Scholarship)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Scholarship => "scholarship",
        }
    }
}

impl fmt::Display for PostingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whatever a listing item contained. Nothing is guaranteed here except that
/// the extractor already substituted a title placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawPosting {
    pub title: String,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub date_text: Option<String>,
    pub image_url: Option<String>,
}

impl RawPosting {
    pub fn new(title: impl Into<String>, link: Option<String>) -> Self {
        Self {
            title: title.into(),
            link,
            ..Self::default()
        }
    }

    /// The identity key if it is present and not blank
    pub fn usable_link(&self) -> Option<&str> {
        self.link.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }
}

/// A normalized posting that has not been reconciled yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPosting {
    pub link: String,
    pub title: String,
    pub summary: String,
    pub date_posted: String,
    pub image_url: String,
    pub source: String,
}

/// A stored posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub id: i64,
    pub kind: PostingKind,
    pub link: String,
    pub title: String,
    pub summary: String,
    pub date_posted: String,
    pub image_url: String,
    pub source: String,
    /// First time the link was seen (`scraped_at` for jobs)
    pub created_at: DateTime<Utc>,
    /// Last upsert; only scholarships record it
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingFilter {
    /// Exact upstream source name
    pub source: Option<String>,
    /// Case-insensitive substring of the title
    pub title_contains: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostingOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingQuery {
    pub filter: PostingFilter,
    pub order: PostingOrder,
    pub limit: Option<u32>,
    pub offset: u64,
}

/// Page request for the read side. Pages start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: u32 = 10;
    pub const MAX_PAGE_SIZE: u32 = 100;

    pub fn new(page: u32, page_size: Option<u32>) -> Self {
        let page_size = page_size
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .clamp(1, Self::MAX_PAGE_SIZE);
        Self {
            page: page.max(1),
            page_size,
        }
    }

    /// Rows to skip; computed in `u64` so any page number is representable
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingPage {
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
    pub results: Vec<Posting>,
}
