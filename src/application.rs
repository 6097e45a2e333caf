//! Use cases: one scraping cycle, the schedule around it and the read side

pub mod cycle;
pub mod listing;
pub mod normalizer;
pub mod reconciler;
pub mod scheduler;
pub mod source_runner;

pub use cycle::{CycleError, CycleReport, OpportunityCycle};
pub use listing::PostingListing;
pub use normalizer::{NormalizeError, normalize};
pub use reconciler::{Reconciled, Reconciler};
pub use scheduler::{Scheduler, SchedulerError, next_run_after};
pub use source_runner::{SourceReport, SourceRunner};
