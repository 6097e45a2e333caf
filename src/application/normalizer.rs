//! Turns extractor output into a storable posting

use thiserror::Error;

use crate::domain::posting::{NO_IMAGE, NO_SUMMARY, NO_TITLE, UNKNOWN_DATE};
use crate::domain::{NewPosting, RawPosting};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Posting '{title}' has no link")]
    MissingLink { title: String },
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Trims the link and substitutes placeholders for anything missing or blank.
/// URL shape is left to the store.
pub fn normalize(raw: RawPosting, source_name: &str) -> Result<NewPosting, NormalizeError> {
    let Some(link) = raw.usable_link().map(str::to_string) else {
        return Err(NormalizeError::MissingLink { title: raw.title });
    };

    Ok(NewPosting {
        link,
        title: or_default(Some(raw.title), NO_TITLE),
        summary: or_default(raw.summary, NO_SUMMARY),
        date_posted: or_default(raw.date_text, UNKNOWN_DATE),
        image_url: or_default(raw.image_url, NO_IMAGE),
        source: source_name.to_string(),
    })
}
