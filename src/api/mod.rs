//! Query service client: outcome type, capability trait, HTTP implementation.

/// reqwest-backed implementation.
pub mod client;
/// Request/response payloads.
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

use crate::draft::{DateBounds, QueryLocator, QueryType};
use types::{Comment, NewComment, ResultRecord, SaveRequest, SavedQuery, SavedQuerySummary};

/// Result of a data fetch, with "no data" kept apart from real failures.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The remote answered with data.
    Success(T),
    /// The remote answered, but nothing matched.
    Empty,
    /// Transport, status or decoding failure.
    Failure(String),
}

impl<T> Outcome<T> {
    /// Short tag used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::Empty => "empty",
            Outcome::Failure(_) => "failure",
        }
    }
}

/// Remote capabilities consumed by the wizard and the saved-query screens.
#[async_trait]
pub trait QueryApi: Send + Sync {
    /// Earliest and latest dates with data for the query type.
    async fn date_bounds(&self, query_type: QueryType) -> Outcome<DateBounds>;

    /// Run a built query.
    async fn execute(&self, locator: &QueryLocator) -> Outcome<Vec<ResultRecord>>;

    /// Persist a named query.
    async fn save_query(&self, req: &SaveRequest) -> Result<()>;

    /// All saved queries (summary form).
    async fn list_queries(&self) -> Result<Vec<SavedQuerySummary>>;

    /// One saved query with its locator.
    async fn get_query(&self, id: i64) -> Result<SavedQuery>;

    /// Attach a comment to a saved query.
    async fn post_comment(&self, comment: &NewComment) -> Result<()>;

    /// Comments of a saved query, newest first.
    async fn list_comments(&self, query_id: i64) -> Result<Vec<Comment>>;
}
