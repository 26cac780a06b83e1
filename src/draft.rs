//! クエリ下書き（ウィザードで蓄積する選択内容）のモデル。

use chrono::NaiveDate;
use std::fmt;

use crate::api::types::ResultRecord;

/// クエリ種別。リモート側のテーブルとエンドポイントを決める。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryType {
    /// 上位の検索語。
    TopTerms,
    /// 急上昇中の検索語。
    TopRisingTerms,
}

impl QueryType {
    /// 選択肢として表示する順序。
    pub const ALL: [QueryType; 2] = [QueryType::TopTerms, QueryType::TopRisingTerms];

    /// パスに埋め込む識別子。
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::TopTerms => "top_terms",
            QueryType::TopRisingTerms => "top_rising_terms",
        }
    }

    /// 画面表示用のラベル。
    pub fn label(&self) -> &'static str {
        match self {
            QueryType::TopTerms => "Top Terms",
            QueryType::TopRisingTerms => "Top Rising Terms",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 日付指定の方式。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateType {
    /// 開始日〜終了日の期間指定。
    DateInterval,
    /// 1日のみの指定。
    SingleDate,
}

impl DateType {
    /// 選択肢として表示する順序。
    pub const ALL: [DateType; 2] = [DateType::DateInterval, DateType::SingleDate];

    pub fn as_str(&self) -> &'static str {
        match self {
            DateType::DateInterval => "date_interval",
            DateType::SingleDate => "single_date",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DateType::DateInterval => "Date Interval",
            DateType::SingleDate => "Single Date",
        }
    }
}

/// データが存在する日付の範囲（両端を含む）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateBounds {
    /// 最も古い日付。
    pub min: NaiveDate,
    /// 最も新しい日付。
    pub max: NaiveDate,
}

impl DateBounds {
    /// 日付が範囲内かを判定する。
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.min <= date && date <= self.max
    }
}

/// 実行対象を指すロケータ（ベースURLからの相対パス、または絶対URL）。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryLocator(String);

impl QueryLocator {
    /// 文字列からロケータを作る（保存済みクエリの再実行用）。
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ウィザード1セッション分の選択内容。
#[derive(Clone, Debug, Default)]
pub struct QueryDraft {
    /// 選択された国。
    pub country: Option<String>,
    /// 選択されたクエリ種別。
    pub query_type: Option<QueryType>,
    /// 選択された日付指定方式。
    pub date_type: Option<DateType>,
    /// 開始日（単日指定ではその日）。
    pub start_date: Option<NaiveDate>,
    /// 終了日（期間指定のときのみ意味を持つ）。
    pub end_date: Option<NaiveDate>,
    /// 入力可能な日付範囲。
    pub date_bounds: Option<DateBounds>,
    /// 組み立て済みのロケータ。
    pub locator: Option<QueryLocator>,
    /// 取得したクエリ結果。
    pub result: Option<Vec<ResultRecord>>,
    /// 保存時のクエリ名。
    pub name: String,
    /// 保存時のコメント。
    pub comment: String,
}

impl QueryDraft {
    /// 空の下書きを作る。
    pub fn new() -> Self {
        Self::default()
    }

    /// 結果件数（未取得なら0）。
    pub fn result_len(&self) -> usize {
        self.result.as_ref().map_or(0, Vec::len)
    }
}
