//! Opportunity Harvester
//!
//! Scrapes job and scholarship listings from a fixed set of sites once a day,
//! normalizes every item and keeps one record per link.

pub mod application;
pub mod bootstrap;
pub mod domain;
pub mod infrastructure;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
