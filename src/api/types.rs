//! Wire types exchanged with the query service.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::draft::QueryLocator;

/// One row of a query result.
///
/// Every result carries a term; day-range queries add `Day`, rising-term
/// queries add `percent_gain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "Top_Term")]
    pub term: String,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(rename = "Day", default)]
    pub day: Option<NaiveDate>,
    #[serde(default)]
    pub percent_gain: Option<f64>,
}

/// Row returned by the `*_interval_dates` endpoints.
///
/// Both columns come from `MIN`/`MAX` aggregates and are null on an empty table.
#[derive(Debug, Deserialize)]
pub(crate) struct IntervalRow {
    #[serde(default)]
    pub min_refresh_date: Option<NaiveDate>,
    #[serde(default)]
    pub max_refresh_date: Option<NaiveDate>,
}

/// Everything needed to persist a built query.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub locator: QueryLocator,
    pub name: String,
    pub username: String,
    pub comment: String,
}

/// JSON body accepted by `POST /api/db/post/query`.
#[derive(Debug, Serialize)]
pub(crate) struct SaveBody<'a> {
    pub query: &'a str,
    pub name: &'a str,
    pub username: &'a str,
    pub query_comment: &'a str,
}

/// Entry of the saved-query list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SavedQuerySummary {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub date: NaiveDate,
}

/// Full saved query including its locator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SavedQuery {
    pub id: i64,
    pub name: String,
    /// Locator as stored by whichever client saved it.
    pub query: String,
    pub username: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub query_comment: String,
}

/// Comment attached to a saved query.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Comment {
    /// Missing for comments added locally before a reload.
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    pub comment_text: String,
}

/// New comment to post on a saved query.
#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub query_id: i64,
    pub username: String,
    pub text: String,
}
