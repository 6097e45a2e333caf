//! Infrastructure layer: configuration, logging, HTTP, HTML extraction and
//! SQLite persistence.

pub mod config;
pub mod database_connection;
pub mod http_client;
pub mod logging;
pub mod parsing;
pub mod posting_repository;
pub mod task_registry;

pub use config::{AppConfig, ConfigManager};
pub use database_connection::DatabaseConnection;
pub use http_client::HttpClient;
pub use parsing::{PostingExtractor, extractor_for};
pub use posting_repository::SqlitePostingRepository;
pub use task_registry::SqliteTaskRegistry;
