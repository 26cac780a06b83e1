//! HTTP implementation of [`QueryApi`] on top of reqwest.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{
    Outcome, QueryApi,
    types::{
        Comment, IntervalRow, NewComment, ResultRecord, SaveBody, SaveRequest, SavedQuery,
        SavedQuerySummary,
    },
};
use crate::{
    config::ApiCfg,
    draft::{DateBounds, QueryLocator, QueryType},
};

/// How a response status is treated by data fetches.
#[derive(Debug, PartialEq, Eq)]
enum StatusClass {
    Ok,
    /// The service answers 404 when a query matched no rows.
    NoData,
    Failed,
}

fn classify(status: StatusCode) -> StatusClass {
    if status.is_success() {
        StatusClass::Ok
    } else if status == StatusCode::NOT_FOUND {
        StatusClass::NoData
    } else {
        StatusClass::Failed
    }
}

/// Endpoint listing the date interval for a query type.
fn interval_path(query_type: QueryType) -> String {
    format!("/api/bigquery/get/{}_interval_dates", query_type.as_str())
}

/// Comments are posted with every field in the path.
fn comment_path(c: &NewComment) -> String {
    format!(
        "/api/db/post/comment/{}/{}/{}",
        c.query_id,
        urlencoding::encode(&c.username),
        urlencoding::encode(&c.text)
    )
}

/// Client bound to one service base URL.
#[derive(Clone, Debug)]
pub struct HttpApi {
    http: Client,
    base_url: String,
}

impl HttpApi {
    /// Build a client from the `[api]` config section.
    pub fn new(cfg: &ApiCfg) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URL for a locator; absolute locators pass through unchanged.
    pub fn resolve(&self, locator: &QueryLocator) -> String {
        let raw = locator.as_str();
        if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else {
            format!("{}{}", self.base_url, raw)
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET a JSON document and fold the response into an [`Outcome`].
    async fn fetch<T: DeserializeOwned>(&self, url: &str) -> Outcome<T> {
        tracing::debug!("GET {url}");
        let resp = match self.http.get(url).send().await {
            Ok(r) => r,
            Err(e) => return Outcome::Failure(format!("request failed: {e}")),
        };
        match classify(resp.status()) {
            StatusClass::Ok => match resp.json::<T>().await {
                Ok(v) => Outcome::Success(v),
                Err(e) => Outcome::Failure(format!("invalid response body: {e}")),
            },
            StatusClass::NoData => Outcome::Empty,
            StatusClass::Failed => match ensure_success(resp).await {
                Err(e) => Outcome::Failure(e.to_string()),
                Ok(_) => Outcome::Failure("unexpected status".into()),
            },
        }
    }

    /// GET a JSON document where any non-2xx is an error.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.http.get(self.url(path)).send().await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl QueryApi for HttpApi {
    async fn date_bounds(&self, query_type: QueryType) -> Outcome<DateBounds> {
        let url = self.url(&interval_path(query_type));
        match self.fetch::<Vec<IntervalRow>>(&url).await {
            Outcome::Success(rows) => {
                // The endpoint returns a single aggregate row.
                match rows.into_iter().next() {
                    Some(IntervalRow {
                        min_refresh_date: Some(min),
                        max_refresh_date: Some(max),
                    }) => Outcome::Success(DateBounds { min, max }),
                    _ => Outcome::Empty,
                }
            }
            Outcome::Empty => Outcome::Empty,
            Outcome::Failure(e) => Outcome::Failure(e),
        }
    }

    async fn execute(&self, locator: &QueryLocator) -> Outcome<Vec<ResultRecord>> {
        let url = self.resolve(locator);
        match self.fetch::<Vec<ResultRecord>>(&url).await {
            Outcome::Success(rows) if rows.is_empty() => Outcome::Empty,
            other => other,
        }
    }

    async fn save_query(&self, req: &SaveRequest) -> Result<()> {
        // Store the absolute URL so any client can run the query later.
        let query = self.resolve(&req.locator);
        let body = SaveBody {
            query: &query,
            name: &req.name,
            username: &req.username,
            query_comment: &req.comment,
        };
        let resp = self
            .http
            .post(self.url("/api/db/post/query"))
            .json(&body)
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn list_queries(&self) -> Result<Vec<SavedQuerySummary>> {
        self.get_json("/api/db/get/queries").await
    }

    async fn get_query(&self, id: i64) -> Result<SavedQuery> {
        self.get_json(&format!("/api/db/get/query/{id}")).await
    }

    async fn post_comment(&self, comment: &NewComment) -> Result<()> {
        let resp = self.http.post(self.url(&comment_path(comment))).send().await?;
        ensure_success(resp).await?;
        Ok(())
    }

    async fn list_comments(&self, query_id: i64) -> Result<Vec<Comment>> {
        self.get_json(&format!("/api/db/get/comments/{query_id}")).await
    }
}

/// Convert non-2xx responses into a structured error.
async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(anyhow!("HTTP status {status} error: {body}"))
}
