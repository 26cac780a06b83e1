//! Date interval lookup for a query type.

use crate::{
    api::{Outcome, QueryApi},
    draft::{DateBounds, QueryType},
};

/// Fetch the date bounds for `query_type`. Nothing is cached; every call hits the service.
pub async fn resolve(api: &dyn QueryApi, query_type: QueryType) -> Outcome<DateBounds> {
    tracing::info!("resolving date bounds: {query_type}");
    match api.date_bounds(query_type).await {
        Outcome::Success(b) if b.min > b.max => {
            tracing::error!("date bounds inverted for {query_type}: {} > {}", b.min, b.max);
            Outcome::Failure(format!("invalid date bounds {} .. {}", b.min, b.max))
        }
        Outcome::Success(b) => {
            tracing::info!("date bounds for {query_type}: {} .. {}", b.min, b.max);
            Outcome::Success(b)
        }
        Outcome::Empty => {
            tracing::warn!("no date bounds available for {query_type}");
            Outcome::Empty
        }
        Outcome::Failure(e) => {
            tracing::error!("error fetching date bounds for {query_type}: {e}");
            Outcome::Failure(e)
        }
    }
}
