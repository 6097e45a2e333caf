//! Domain module - postings, sources and the contracts the pipeline depends on
//!
//! Nothing in here touches the network or the database. Infrastructure
//! implements the traits declared in `repositories` and `services`.

pub mod posting;
pub mod repositories;
pub mod services;
pub mod source;

pub use posting::{
    NewPosting, PageRequest, Posting, PostingFilter, PostingKind, PostingOrder, PostingPage,
    PostingQuery, RawPosting,
};
pub use repositories::{
    PostingRepository, Registration, RunOutcome, ScheduledTask, StoreError, StoreResult,
    TaskRegistry,
};
pub use services::{FetchError, PageFetcher};
pub use source::{SourceConfig, SourceLayout};
