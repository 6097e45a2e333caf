//! Test utilities
//!
//! Isolated in-memory databases and a canned-HTML fetcher, shared by unit
//! tests and (through the `test-utils` feature) the integration tests.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::{FetchError, NewPosting, PageFetcher};
use crate::infrastructure::DatabaseConnection;

/// Fresh, migrated in-memory database per test
pub struct TestDatabase {
    pub connection: DatabaseConnection,
}

impl TestDatabase {
    pub async fn new() -> Result<Self> {
        let db = DatabaseConnection::new("sqlite::memory:").await?;
        db.migrate().await?;
        Ok(Self { connection: db })
    }

    pub fn pool(&self) -> sqlx::SqlitePool {
        self.connection.pool().clone()
    }
}

pub fn new_posting(link: &str, title: &str) -> NewPosting {
    NewPosting {
        link: link.to_string(),
        title: title.to_string(),
        summary: "full text".to_string(),
        date_posted: "2 days ago".to_string(),
        image_url: String::new(),
        source: "Test".to_string(),
    }
}

/// Serves fixed responses per URL; unknown URLs answer 404
#[derive(Default)]
pub struct StubFetcher {
    responses: Mutex<HashMap<String, Result<String, FetchError>>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: &str, body: &str) -> Self {
        self.set_page(url, body);
        self
    }

    pub fn failing(self, url: &str, error: FetchError) -> Self {
        self.set(url, Err(error));
        self
    }

    pub fn set(&self, url: &str, response: Result<String, FetchError>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(url.to_string(), response);
        }
    }

    /// Replaces what `url` serves, e.g. between two cycles
    pub fn set_page(&self, url: &str, body: &str) {
        self.set(url, Ok(body.to_string()));
    }

    pub fn set_status(&self, url: &str, status: u16) {
        self.set(
            url,
            Err(FetchError::Status {
                status,
                url: url.to_string(),
            }),
        );
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.responses
            .lock()
            .ok()
            .and_then(|responses| responses.get(url).cloned())
            .unwrap_or_else(|| {
                Err(FetchError::Status {
                    status: 404,
                    url: url.to_string(),
                })
            })
    }
}
