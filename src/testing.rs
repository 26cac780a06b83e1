//! In-memory query service used by unit tests.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Mutex;

use crate::{
    api::{
        Outcome, QueryApi,
        types::{Comment, NewComment, ResultRecord, SaveRequest, SavedQuery, SavedQuerySummary},
    },
    draft::{DateBounds, QueryLocator, QueryType},
};

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn record(term: &str) -> ResultRecord {
    ResultRecord {
        term: term.into(),
        rank: None,
        day: None,
        percent_gain: None,
    }
}

#[derive(Default)]
struct Calls {
    bounds: Vec<QueryType>,
    executed: Vec<QueryLocator>,
    saved: Vec<SaveRequest>,
    comments: Vec<NewComment>,
}

/// Fixed responses plus a record of every call.
pub struct FakeApi {
    bounds: Outcome<DateBounds>,
    results: Outcome<Vec<ResultRecord>>,
    save_fails: bool,
    queries: Vec<SavedQuery>,
    comments: Vec<Comment>,
    calls: Mutex<Calls>,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            bounds: Outcome::Failure("bounds not configured".into()),
            results: Outcome::Failure("results not configured".into()),
            save_fails: false,
            queries: vec![],
            comments: vec![],
            calls: Mutex::new(Calls::default()),
        }
    }
}

impl FakeApi {
    pub fn with_bounds(mut self, bounds: Outcome<DateBounds>) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_results(mut self, results: Outcome<Vec<ResultRecord>>) -> Self {
        self.results = results;
        self
    }

    pub fn with_failing_save(mut self) -> Self {
        self.save_fails = true;
        self
    }

    pub fn with_query(mut self, query: SavedQuery) -> Self {
        self.queries.push(query);
        self
    }

    pub fn with_comment(mut self, comment: Comment) -> Self {
        self.comments.push(comment);
        self
    }

    pub fn bounds_calls(&self) -> Vec<QueryType> {
        self.calls.lock().unwrap().bounds.clone()
    }

    pub fn executed(&self) -> Vec<QueryLocator> {
        self.calls.lock().unwrap().executed.clone()
    }

    pub fn saved(&self) -> Vec<SaveRequest> {
        self.calls.lock().unwrap().saved.clone()
    }

    pub fn posted_comments(&self) -> Vec<NewComment> {
        self.calls.lock().unwrap().comments.clone()
    }
}

#[async_trait]
impl QueryApi for FakeApi {
    async fn date_bounds(&self, query_type: QueryType) -> Outcome<DateBounds> {
        self.calls.lock().unwrap().bounds.push(query_type);
        self.bounds.clone()
    }

    async fn execute(&self, locator: &QueryLocator) -> Outcome<Vec<ResultRecord>> {
        self.calls.lock().unwrap().executed.push(locator.clone());
        self.results.clone()
    }

    async fn save_query(&self, req: &SaveRequest) -> Result<()> {
        if self.save_fails {
            return Err(anyhow!("HTTP status 400 Bad Request error: {{}}"));
        }
        self.calls.lock().unwrap().saved.push(req.clone());
        Ok(())
    }

    async fn list_queries(&self) -> Result<Vec<SavedQuerySummary>> {
        Ok(self
            .queries
            .iter()
            .map(|q| SavedQuerySummary {
                id: q.id,
                name: q.name.clone(),
                username: q.username.clone(),
                date: q.date,
            })
            .collect())
    }

    async fn get_query(&self, id: i64) -> Result<SavedQuery> {
        self.queries
            .iter()
            .find(|q| q.id == id)
            .cloned()
            .ok_or_else(|| anyhow!("HTTP status 404 Not Found error: query {id}"))
    }

    async fn post_comment(&self, comment: &NewComment) -> Result<()> {
        self.calls.lock().unwrap().comments.push(comment.clone());
        Ok(())
    }

    async fn list_comments(&self, _query_id: i64) -> Result<Vec<Comment>> {
        Ok(self.comments.clone())
    }
}
