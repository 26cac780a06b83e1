//! Locator construction and query execution.

use thiserror::Error;

use crate::{
    api::{Outcome, QueryApi, types::ResultRecord},
    draft::{DateType, QueryDraft, QueryLocator},
};

/// A draft field the locator needs is still unset.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing {0} in query draft")]
pub struct MissingContext(pub &'static str);

const DATE_FMT: &str = "%Y-%m-%d";

/// Build the locator for a draft.
///
/// Depends only on country, query type, date type and the dates, so the same
/// selections always target the same remote resource.
pub fn build_locator(draft: &QueryDraft) -> Result<QueryLocator, MissingContext> {
    let country = draft.country.as_deref().ok_or(MissingContext("country"))?;
    let query_type = draft.query_type.ok_or(MissingContext("query type"))?;
    let date_type = draft.date_type.ok_or(MissingContext("date type"))?;
    let start = draft.start_date.ok_or(MissingContext("start date"))?;
    let country = urlencoding::encode(country);

    let path = match date_type {
        DateType::DateInterval => {
            let end = draft.end_date.ok_or(MissingContext("end date"))?;
            format!(
                "/api/bigquery/get/{}_dates/{}/{}/{}",
                query_type.as_str(),
                country,
                start.format(DATE_FMT),
                end.format(DATE_FMT)
            )
        }
        DateType::SingleDate => format!(
            "/api/bigquery/get/{}_day/{}/{}",
            query_type.as_str(),
            country,
            start.format(DATE_FMT)
        ),
    };
    Ok(QueryLocator::new(path))
}

/// Run a locator once. Used by the wizard and for saved queries; results are never cached.
pub async fn run(api: &dyn QueryApi, locator: &QueryLocator) -> Outcome<Vec<ResultRecord>> {
    tracing::info!("executing query: {locator}");
    let outcome = api.execute(locator).await;
    match &outcome {
        Outcome::Success(rows) => tracing::info!("query returned {} rows", rows.len()),
        Outcome::Empty => tracing::warn!("query returned no results: {locator}"),
        Outcome::Failure(e) => tracing::error!("error executing query {locator}: {e}"),
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        draft::QueryType,
        testing::{FakeApi, record, ymd},
    };

    fn single_day_draft() -> QueryDraft {
        QueryDraft {
            country: Some("US".into()),
            query_type: Some(QueryType::TopTerms),
            date_type: Some(DateType::SingleDate),
            start_date: Some(ymd(2024, 3, 1)),
            ..QueryDraft::default()
        }
    }

    #[test]
    fn test_single_day_locator_is_deterministic() {
        let d = single_day_draft();
        let a = build_locator(&d).unwrap();
        let b = build_locator(&d).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "/api/bigquery/get/top_terms_day/US/2024-03-01");
    }

    #[test]
    fn test_single_day_ignores_end_date() {
        let mut d = single_day_draft();
        d.end_date = Some(ymd(2024, 3, 9));
        assert_eq!(
            build_locator(&d).unwrap().as_str(),
            "/api/bigquery/get/top_terms_day/US/2024-03-01"
        );
    }

    #[test]
    fn test_interval_locator_shape() {
        let d = QueryDraft {
            country: Some("United Kingdom".into()),
            query_type: Some(QueryType::TopRisingTerms),
            date_type: Some(DateType::DateInterval),
            start_date: Some(ymd(2024, 1, 5)),
            end_date: Some(ymd(2024, 1, 10)),
            ..QueryDraft::default()
        };
        assert_eq!(
            build_locator(&d).unwrap().as_str(),
            "/api/bigquery/get/top_rising_terms_dates/United%20Kingdom/2024-01-05/2024-01-10"
        );
    }

    #[test]
    fn test_missing_context_reported() {
        let mut d = single_day_draft();
        d.country = None;
        assert_eq!(build_locator(&d), Err(MissingContext("country")));
    }

    #[tokio::test]
    async fn test_run_passes_outcome_through() {
        let api = FakeApi::default()
            .with_results(Outcome::Success(vec![record("eclipse"), record("weather")]));
        let loc = build_locator(&single_day_draft()).unwrap();
        let out = run(&api, &loc).await;
        assert!(matches!(out, Outcome::Success(ref rows) if rows.len() == 2));
        // 同じロケータで再実行すると毎回リモートへ問い合わせる。
        run(&api, &loc).await;
        assert_eq!(api.executed(), vec![loc.clone(), loc]);
    }
}
