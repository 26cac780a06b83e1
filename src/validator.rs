//! 実行前・保存前の入力検証。

use chrono::NaiveDate;
use thiserror::Error;

use crate::draft::{DateBounds, DateType, QueryDraft};

/// クエリ名・ユーザー名の最大文字数（保存先の列長）。
pub const MAX_NAME_CHARS: usize = 50;

/// ユーザーに表示する検証エラー。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select both start and end dates.")]
    MissingDateRange,
    #[error("End date cannot be earlier than the start date.")]
    EndBeforeStart,
    #[error("Please select a date.")]
    MissingDate,
    #[error("Please choose a date type first.")]
    MissingDateType,
    #[error("{date} is outside the available range {min} to {max}.")]
    OutOfBounds {
        date: NaiveDate,
        min: NaiveDate,
        max: NaiveDate,
    },
    #[error("An end date only applies to a date interval.")]
    EndDateNotApplicable,
    #[error("Please enter a query name.")]
    MissingName,
    #[error("Query name must be at most 50 characters.")]
    NameTooLong,
    #[error("Set a user name in settings before saving.")]
    MissingUsername,
    #[error("User name must be at most 50 characters.")]
    UsernameTooLong,
}

/// 日付入力ステップを抜ける前の検証。
pub fn validate_dates(draft: &QueryDraft) -> Result<(), ValidationError> {
    match draft.date_type {
        Some(DateType::DateInterval) => {
            // 期間指定は開始日・終了日の両方が必要。
            let (Some(start), Some(end)) = (draft.start_date, draft.end_date) else {
                return Err(ValidationError::MissingDateRange);
            };
            // 終了日が開始日より前なら拒否する。
            if end < start {
                return Err(ValidationError::EndBeforeStart);
            }
            Ok(())
        }
        Some(DateType::SingleDate) => {
            // 単日指定は開始日のみ必要。
            if draft.start_date.is_none() {
                return Err(ValidationError::MissingDate);
            }
            Ok(())
        }
        None => Err(ValidationError::MissingDateType),
    }
}

/// 取得済みの日付範囲に収まっているかを確認する。範囲未取得なら制限しない。
pub fn check_in_bounds(
    bounds: Option<&DateBounds>,
    date: NaiveDate,
) -> Result<(), ValidationError> {
    match bounds {
        Some(b) if !b.contains(date) => Err(ValidationError::OutOfBounds {
            date,
            min: b.min,
            max: b.max,
        }),
        _ => Ok(()),
    }
}

/// 保存リクエストを送る前の検証。
pub fn validate_save(name: &str, username: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::MissingName);
    }
    if name.trim().chars().count() > MAX_NAME_CHARS {
        return Err(ValidationError::NameTooLong);
    }
    if username.trim().is_empty() {
        return Err(ValidationError::MissingUsername);
    }
    if username.trim().chars().count() > MAX_NAME_CHARS {
        return Err(ValidationError::UsernameTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn interval(start: Option<&str>, end: Option<&str>) -> QueryDraft {
        QueryDraft {
            date_type: Some(DateType::DateInterval),
            start_date: start.map(date),
            end_date: end.map(date),
            ..QueryDraft::default()
        }
    }

    #[test]
    fn test_interval_end_before_start_rejected() {
        let d = interval(Some("2024-01-10"), Some("2024-01-05"));
        assert_eq!(validate_dates(&d), Err(ValidationError::EndBeforeStart));
    }

    #[test]
    fn test_interval_in_order_accepted() {
        let d = interval(Some("2024-01-05"), Some("2024-01-10"));
        assert_eq!(validate_dates(&d), Ok(()));
        // 同じ日付の期間も許可する。
        let same = interval(Some("2024-01-05"), Some("2024-01-05"));
        assert_eq!(validate_dates(&same), Ok(()));
    }

    #[test]
    fn test_interval_requires_both_dates() {
        assert_eq!(
            validate_dates(&interval(Some("2024-01-05"), None)),
            Err(ValidationError::MissingDateRange)
        );
        assert_eq!(
            validate_dates(&interval(None, Some("2024-01-05"))),
            Err(ValidationError::MissingDateRange)
        );
    }

    #[test]
    fn test_single_date_requires_start() {
        let mut d = QueryDraft {
            date_type: Some(DateType::SingleDate),
            ..QueryDraft::default()
        };
        assert_eq!(validate_dates(&d), Err(ValidationError::MissingDate));
        d.start_date = Some(date("2024-03-01"));
        assert_eq!(validate_dates(&d), Ok(()));
    }

    #[test]
    fn test_bounds_check() {
        let b = DateBounds {
            min: date("2023-01-01"),
            max: date("2024-01-01"),
        };
        assert!(check_in_bounds(Some(&b), date("2023-06-01")).is_ok());
        assert!(matches!(
            check_in_bounds(Some(&b), date("2024-02-01")),
            Err(ValidationError::OutOfBounds { .. })
        ));
        assert!(check_in_bounds(None, date("1999-01-01")).is_ok());
    }

    #[test]
    fn test_save_metadata_rules() {
        assert_eq!(validate_save("  ", "ana"), Err(ValidationError::MissingName));
        assert_eq!(
            validate_save(&"x".repeat(51), "ana"),
            Err(ValidationError::NameTooLong)
        );
        assert_eq!(validate_save("march", ""), Err(ValidationError::MissingUsername));
        assert_eq!(validate_save("march", "ana"), Ok(()));
    }
}
