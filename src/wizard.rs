//! クエリビルダーのウィザード（ステートマシン）。
//!
//! 画面やネットワークには依存せず、ユーザー操作と非同期処理の完了を
//! 入力として受け取り、ステップと下書きを更新する。リモート呼び出しが必要な
//! 遷移は [`Effect`] を返し、呼び出し側が実行して `settle_*` で結果を戻す。

use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    api::{
        Outcome,
        types::{ResultRecord, SaveRequest},
    },
    draft::{DateBounds, DateType, QueryDraft, QueryLocator, QueryType},
    executor::{self, MissingContext},
    validator::{self, ValidationError},
};

/// 結果が0件だったときの通知文。
pub const NO_RESULTS_NOTICE: &str = "Query did not return any results. Please try again.";

/// ウィザードの各ステップ
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WizardStep {
    /// ウェルカムメッセージ
    Welcome,
    /// 国の選択
    SelectCountry,
    /// クエリ種別の選択
    SelectQueryType,
    /// 日付範囲の取得中
    LoadingDateBounds,
    /// 日付指定方式の選択
    SelectDateType,
    /// 日付の入力
    EnterDates,
    /// クエリ結果の取得中
    LoadingResult,
    /// 結果の確認
    ReviewResult,
    /// 保存情報の入力
    SaveDetails,
}

/// 戻る操作の行き先。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Back {
    /// 指定ステップへ戻る。
    To(WizardStep),
    /// ウィザードを抜ける。
    Exit,
    /// 保存の完了待ちなので移動しない。
    Blocked,
}

impl WizardStep {
    /// 全ステップ（番号順）。
    pub const ALL: [WizardStep; 9] = [
        WizardStep::Welcome,
        WizardStep::SelectCountry,
        WizardStep::SelectQueryType,
        WizardStep::LoadingDateBounds,
        WizardStep::SelectDateType,
        WizardStep::EnterDates,
        WizardStep::LoadingResult,
        WizardStep::ReviewResult,
        WizardStep::SaveDetails,
    ];

    /// ステップ番号（0始まり）。
    pub fn index(self) -> usize {
        match self {
            WizardStep::Welcome => 0,
            WizardStep::SelectCountry => 1,
            WizardStep::SelectQueryType => 2,
            WizardStep::LoadingDateBounds => 3,
            WizardStep::SelectDateType => 4,
            WizardStep::EnterDates => 5,
            WizardStep::LoadingResult => 6,
            WizardStep::ReviewResult => 7,
            WizardStep::SaveDetails => 8,
        }
    }

    /// 非同期処理の完了待ちステップか。
    pub fn is_loading(self) -> bool {
        matches!(
            self,
            WizardStep::LoadingDateBounds | WizardStep::LoadingResult
        )
    }

    /// 戻る操作の遷移先。読み込みステップへは戻らない。
    pub fn back(self) -> Back {
        match self {
            WizardStep::Welcome => Back::Exit,
            // 日付範囲の再取得を避けるためクエリ種別選択へ戻す。
            WizardStep::SelectDateType => Back::To(WizardStep::SelectQueryType),
            // クエリの再実行を避けるため日付入力へ戻す。
            WizardStep::ReviewResult => Back::To(WizardStep::EnterDates),
            WizardStep::SelectCountry => Back::To(WizardStep::Welcome),
            WizardStep::SelectQueryType => Back::To(WizardStep::SelectCountry),
            WizardStep::LoadingDateBounds => Back::To(WizardStep::SelectQueryType),
            WizardStep::EnterDates => Back::To(WizardStep::SelectDateType),
            WizardStep::LoadingResult => Back::To(WizardStep::EnterDates),
            WizardStep::SaveDetails => Back::To(WizardStep::ReviewResult),
        }
    }

    /// 画面タイトル。
    pub fn title(self) -> &'static str {
        match self {
            WizardStep::Welcome => "Welcome",
            WizardStep::SelectCountry => "Country",
            WizardStep::SelectQueryType => "Query type",
            WizardStep::LoadingDateBounds => "Loading dates",
            WizardStep::SelectDateType => "Date type",
            WizardStep::EnterDates => "Dates",
            WizardStep::LoadingResult => "Running query",
            WizardStep::ReviewResult => "Result",
            WizardStep::SaveDetails => "Save",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.index(), self.title())
    }
}

/// 発行したリクエストの識別子。完了通知の照合に使う。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ticket(Uuid);

impl Ticket {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ウィザードが呼び出し側へ依頼するリモート処理。
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// クエリ種別の日付範囲を取得する。
    FetchDateBounds {
        ticket: Ticket,
        query_type: QueryType,
    },
    /// 組み立てたクエリを実行する。
    ExecuteQuery {
        ticket: Ticket,
        locator: QueryLocator,
    },
    /// クエリを保存する。
    SaveQuery { ticket: Ticket, request: SaveRequest },
}

impl Effect {
    pub fn ticket(&self) -> Ticket {
        match self {
            Effect::FetchDateBounds { ticket, .. }
            | Effect::ExecuteQuery { ticket, .. }
            | Effect::SaveQuery { ticket, .. } => *ticket,
        }
    }
}

/// 非同期処理の完了を反映した結果。
#[derive(Clone, Debug, PartialEq)]
pub enum Settled {
    /// 次のステップへ進んだ。
    Advanced(WizardStep),
    /// 対話ステップへ戻した（通知付き）。
    RolledBack { to: WizardStep, notice: String },
    /// 失敗したため現在のステップに留まる。
    Stalled { reason: String },
    /// 保存が完了した。
    Saved,
    /// 古いリクエストの完了なので無視した。
    Ignored,
}

/// 遷移が拒否された理由。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WizardError {
    #[error("{action} is not available at step {step}")]
    WrongStep {
        action: &'static str,
        step: WizardStep,
    },
    #[error("a request is already in progress")]
    Busy,
    #[error("nothing to retry at this step")]
    NothingToRetry,
    #[error("unknown country: {0}")]
    UnknownCountry(String),
    #[error("this query has already been saved")]
    AlreadySaved,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    MissingContext(#[from] MissingContext),
}

/// ウィザード1セッション分の状態。
#[derive(Clone, Debug)]
pub struct Wizard {
    /// 現在のステップ
    step: WizardStep,
    /// 選択内容
    draft: QueryDraft,
    /// 選択可能な国
    countries: Vec<String>,
    /// 完了待ちのリクエスト
    pending: Option<Ticket>,
    /// 保存済みか
    saved: bool,
}

impl Wizard {
    /// 全ステップ数
    pub const TOTAL_STEPS: usize = WizardStep::ALL.len();

    /// 空の下書きでウィザードを作る。
    pub fn new(countries: Vec<String>) -> Self {
        // 最初はWelcomeステップから開始する。
        Self {
            step: WizardStep::Welcome,
            draft: QueryDraft::new(),
            countries,
            pending: None,
            saved: false,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &QueryDraft {
        &self.draft
    }

    pub fn countries(&self) -> &[String] {
        &self.countries
    }

    /// 完了待ちのリクエストがあるか。
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// 下書きを破棄して最初に戻す。
    pub fn reset(&mut self) {
        tracing::info!("wizard reset");
        self.step = WizardStep::Welcome;
        self.draft = QueryDraft::new();
        self.pending = None;
        self.saved = false;
    }

    /// 現在のステップが期待どおりか確認する。
    fn require_step(&self, step: WizardStep, action: &'static str) -> Result<(), WizardError> {
        if self.step == step {
            Ok(())
        } else {
            tracing::warn!("rejected {action} at step {}", self.step);
            Err(WizardError::WrongStep {
                action,
                step: self.step,
            })
        }
    }

    /// ステップを移動してログに残す。
    fn goto(&mut self, step: WizardStep) {
        tracing::info!("wizard step {} -> {}", self.step, step);
        self.step = step;
    }

    /// 新しいリクエストを発行する。
    fn issue(&mut self) -> Result<Ticket, WizardError> {
        if self.pending.is_some() {
            return Err(WizardError::Busy);
        }
        let ticket = Ticket::new();
        self.pending = Some(ticket);
        Ok(ticket)
    }

    /// 完了通知が現在の待ち状態に対応するか判定し、対応すれば待ちを解除する。
    fn accept(&mut self, ticket: Ticket, step: WizardStep) -> bool {
        if self.step != step || self.pending != Some(ticket) {
            tracing::warn!(
                "ignoring stale completion {ticket} (step {}, pending {:?})",
                self.step,
                self.pending
            );
            return false;
        }
        self.pending = None;
        true
    }

    /// 0 → 1: 作成を開始する。
    pub fn start(&mut self) -> Result<(), WizardError> {
        self.require_step(WizardStep::Welcome, "start")?;
        self.goto(WizardStep::SelectCountry);
        Ok(())
    }

    /// 1 → 2: 国を選ぶ。
    pub fn select_country(&mut self, country: &str) -> Result<(), WizardError> {
        self.require_step(WizardStep::SelectCountry, "select country")?;
        // 設定にない国は受け付けない。
        if !self.countries.iter().any(|c| c == country) {
            return Err(WizardError::UnknownCountry(country.to_string()));
        }
        self.draft.country = Some(country.to_string());
        self.goto(WizardStep::SelectQueryType);
        Ok(())
    }

    /// 2 → 3: クエリ種別を選び、日付範囲の取得を依頼する。
    pub fn select_query_type(&mut self, query_type: QueryType) -> Result<Effect, WizardError> {
        self.require_step(WizardStep::SelectQueryType, "select query type")?;
        let ticket = self.issue()?;
        self.draft.query_type = Some(query_type);
        // 範囲は毎回取り直す。入力済みの日付は新しい範囲で入れ直させる。
        self.draft.date_bounds = None;
        self.draft.start_date = None;
        self.draft.end_date = None;
        self.goto(WizardStep::LoadingDateBounds);
        Ok(Effect::FetchDateBounds { ticket, query_type })
    }

    /// 3 → 4: 日付範囲の取得結果を反映する。
    pub fn settle_date_bounds(&mut self, ticket: Ticket, outcome: Outcome<DateBounds>) -> Settled {
        if !self.accept(ticket, WizardStep::LoadingDateBounds) {
            return Settled::Ignored;
        }
        match outcome {
            Outcome::Success(bounds) => {
                self.draft.date_bounds = Some(bounds);
                self.goto(WizardStep::SelectDateType);
                Settled::Advanced(self.step)
            }
            // 自動での再試行・巻き戻しはしない。
            Outcome::Empty => Settled::Stalled {
                reason: "No dates are available for this query type.".into(),
            },
            Outcome::Failure(reason) => Settled::Stalled { reason },
        }
    }

    /// 4 → 5: 日付指定方式を選ぶ。
    pub fn select_date_type(&mut self, date_type: DateType) -> Result<(), WizardError> {
        self.require_step(WizardStep::SelectDateType, "select date type")?;
        if self.draft.date_bounds.is_none() {
            return Err(MissingContext("date bounds").into());
        }
        self.draft.date_type = Some(date_type);
        tracing::info!("date type: {}", date_type.as_str());
        // 単日指定では終了日を持たない。
        if date_type == DateType::SingleDate {
            self.draft.end_date = None;
        }
        self.goto(WizardStep::EnterDates);
        Ok(())
    }

    /// 5: 開始日（単日指定ではその日）を入力する。
    pub fn set_start_date(&mut self, date: NaiveDate) -> Result<(), WizardError> {
        self.require_step(WizardStep::EnterDates, "set start date")?;
        validator::check_in_bounds(self.draft.date_bounds.as_ref(), date)?;
        self.draft.start_date = Some(date);
        Ok(())
    }

    /// 5: 終了日を入力する（期間指定のみ）。
    pub fn set_end_date(&mut self, date: NaiveDate) -> Result<(), WizardError> {
        self.require_step(WizardStep::EnterDates, "set end date")?;
        if self.draft.date_type != Some(DateType::DateInterval) {
            return Err(ValidationError::EndDateNotApplicable.into());
        }
        validator::check_in_bounds(self.draft.date_bounds.as_ref(), date)?;
        self.draft.end_date = Some(date);
        Ok(())
    }

    /// 5 → 6: 入力を検証し、クエリの実行を依頼する。
    pub fn submit_dates(&mut self) -> Result<Effect, WizardError> {
        self.require_step(WizardStep::EnterDates, "submit dates")?;
        if let Err(e) = validator::validate_dates(&self.draft) {
            tracing::warn!("date validation failed: {e}");
            return Err(e.into());
        }
        let bounds = self.draft.date_bounds.as_ref();
        for date in [self.draft.start_date, self.draft.end_date].into_iter().flatten() {
            validator::check_in_bounds(bounds, date)?;
        }
        let locator = executor::build_locator(&self.draft)?;
        let ticket = self.issue()?;
        self.draft.locator = Some(locator.clone());
        self.draft.result = None;
        self.goto(WizardStep::LoadingResult);
        Ok(Effect::ExecuteQuery { ticket, locator })
    }

    /// 6 → 7: クエリ結果を反映する。0件なら日付入力へ戻す。
    pub fn settle_query(
        &mut self,
        ticket: Ticket,
        outcome: Outcome<Vec<ResultRecord>>,
    ) -> Settled {
        if !self.accept(ticket, WizardStep::LoadingResult) {
            return Settled::Ignored;
        }
        match outcome {
            Outcome::Success(rows) if !rows.is_empty() => {
                self.draft.result = Some(rows);
                self.goto(WizardStep::ReviewResult);
                Settled::Advanced(self.step)
            }
            Outcome::Success(_) | Outcome::Empty => {
                // 下書きは保持したまま入力をやり直させる。
                self.draft.result = None;
                self.goto(WizardStep::EnterDates);
                Settled::RolledBack {
                    to: self.step,
                    notice: NO_RESULTS_NOTICE.into(),
                }
            }
            Outcome::Failure(reason) => Settled::Stalled { reason },
        }
    }

    /// 読み込みステップで失敗した処理を明示的にやり直す。
    pub fn retry(&mut self) -> Result<Effect, WizardError> {
        match self.step {
            WizardStep::LoadingDateBounds => {
                let query_type = self
                    .draft
                    .query_type
                    .ok_or(MissingContext("query type"))?;
                let ticket = self.issue()?;
                tracing::info!("retrying date bounds for {query_type}");
                Ok(Effect::FetchDateBounds { ticket, query_type })
            }
            WizardStep::LoadingResult => {
                let locator = self
                    .draft
                    .locator
                    .clone()
                    .ok_or(MissingContext("locator"))?;
                let ticket = self.issue()?;
                tracing::info!("retrying query {locator}");
                Ok(Effect::ExecuteQuery { ticket, locator })
            }
            _ => Err(WizardError::NothingToRetry),
        }
    }

    /// 7 → 8: 保存情報の入力へ進む。
    pub fn begin_save(&mut self) -> Result<(), WizardError> {
        self.require_step(WizardStep::ReviewResult, "save")?;
        self.goto(WizardStep::SaveDetails);
        Ok(())
    }

    /// 8: クエリ名を入力する。
    pub fn set_name(&mut self, name: &str) -> Result<(), WizardError> {
        self.require_step(WizardStep::SaveDetails, "set name")?;
        self.draft.name = name.to_string();
        Ok(())
    }

    /// 8: コメントを入力する。
    pub fn set_comment(&mut self, comment: &str) -> Result<(), WizardError> {
        self.require_step(WizardStep::SaveDetails, "set comment")?;
        self.draft.comment = comment.to_string();
        Ok(())
    }

    /// 8: 保存を依頼する。
    pub fn submit_save(&mut self, username: &str) -> Result<Effect, WizardError> {
        self.require_step(WizardStep::SaveDetails, "submit save")?;
        if self.saved {
            return Err(WizardError::AlreadySaved);
        }
        validator::validate_save(&self.draft.name, username)?;
        let locator = self
            .draft
            .locator
            .clone()
            .ok_or(MissingContext("locator"))?;
        let ticket = self.issue()?;
        Ok(Effect::SaveQuery {
            ticket,
            request: SaveRequest {
                locator,
                name: self.draft.name.trim().to_string(),
                username: username.trim().to_string(),
                comment: self.draft.comment.clone(),
            },
        })
    }

    /// 8: 保存結果を反映する。
    pub fn settle_save(&mut self, ticket: Ticket, result: Result<(), String>) -> Settled {
        if !self.accept(ticket, WizardStep::SaveDetails) {
            return Settled::Ignored;
        }
        match result {
            Ok(()) => {
                tracing::info!("query saved: {}", self.draft.name);
                self.saved = true;
                Settled::Saved
            }
            Err(reason) => Settled::Stalled { reason },
        }
    }

    /// 送信に失敗したリクエストの待ちを解除する。
    pub fn abandon(&mut self, ticket: Ticket) {
        if self.pending == Some(ticket) {
            tracing::warn!("abandoning request {ticket}");
            self.pending = None;
        }
    }

    /// 前のステップへ戻る。完了待ちのリクエストは破棄する。
    /// 保存の完了待ちでは結果が分かるまで戻れない。
    pub fn back(&mut self) -> Back {
        if self.step == WizardStep::SaveDetails && self.pending.is_some() {
            tracing::info!("back refused while a save is in flight");
            return Back::Blocked;
        }
        let dest = self.step.back();
        if let Some(t) = self.pending.take() {
            tracing::info!("discarding pending request {t}");
        }
        if let Back::To(step) = dest {
            self.goto(step);
        }
        dest
    }

    /// 現在のステップのプロンプトメッセージを取得
    pub fn get_prompt(&self) -> String {
        // ステップごとの説明文を返す。
        match self.step {
            WizardStep::Welcome => {
                "Welcome to the query builder!\n\nPress Enter to start.".to_string()
            }
            WizardStep::SelectCountry => "Select a country.".to_string(),
            WizardStep::SelectQueryType => "Select the type of query.".to_string(),
            WizardStep::LoadingDateBounds => {
                if self.pending.is_some() {
                    "Loading...".to_string()
                } else {
                    "Could not load the available dates.\nPress r to retry or Esc to go back."
                        .to_string()
                }
            }
            WizardStep::SelectDateType => "Query a date interval or a single date?".to_string(),
            WizardStep::EnterDates => match self.draft.date_type {
                Some(DateType::DateInterval) => {
                    "Enter the start and end dates, then press Enter.".to_string()
                }
                _ => "Enter the date, then press Enter.".to_string(),
            },
            WizardStep::LoadingResult => {
                if self.pending.is_some() {
                    "Loading Query Result...".to_string()
                } else {
                    "The query failed.\nPress r to retry or Esc to go back.".to_string()
                }
            }
            WizardStep::ReviewResult => "Review the result. Press s to save the query.".to_string(),
            WizardStep::SaveDetails => {
                if self.saved {
                    "Query saved successfully!\nPress Enter to build another query.".to_string()
                } else {
                    "Enter a name and a comment, then press Enter to save.".to_string()
                }
            }
        }
    }

    /// 現在のステップ番号を取得（1始まり）
    pub fn get_step_number(&self) -> usize {
        self.step.index() + 1
    }
}
