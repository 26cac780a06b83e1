//! TUIのイベントループ、入力処理、状態管理。

mod handlers;
mod render;

use anyhow::Result;
use crossterm::event::{self, Event};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::mpsc;

use crate::{
    api::{
        Outcome,
        client::HttpApi,
        types::{Comment, ResultRecord, SavedQuery, SavedQuerySummary},
    },
    config::Config,
    events::{Screen, UiState},
    input::InputBoxState,
    shortcuts::Shortcuts,
    ui::Tui,
    wizard::{Effect, Settled, Wizard},
    worker::{self, WorkerCmd, WorkerEvent},
};

use handlers::{handle_key, is_ctrl_c};
use render::draw;

/// 詳細画面で開いている保存済みクエリ。
#[derive(Clone, Debug)]
pub struct QueryDetail {
    pub query: SavedQuery,
    /// 新しいものが先頭。
    pub comments: Vec<Comment>,
    /// 直近の実行結果（未実行ならNone）。
    pub result: Option<Outcome<Vec<ResultRecord>>>,
    /// 実行中か。
    pub running: bool,
}

/// 入力処理と描画で共有するアプリ状態。
pub struct App {
    /// 永続化された設定ファイルのパス。
    pub cfg_path: PathBuf,
    /// メモリ上の現在設定。
    pub cfg: Config,
    /// 選択位置やステータスなどUI固有の状態。
    pub ui: UiState,
    /// クエリ作成ウィザード。
    pub wizard: Wizard,
    /// 保存済みクエリ一覧。
    pub saved: Vec<SavedQuerySummary>,
    /// 詳細画面の対象。
    pub detail: Option<QueryDetail>,
    /// Workerへのコマンド送信チャネル。
    pub worker_tx: mpsc::Sender<WorkerCmd>,
    /// Workerからのイベント受信チャネル。
    pub worker_rx: mpsc::Receiver<WorkerEvent>,

    /// 設定画面で編集するベースURL。
    pub base_url: String,
    /// 設定画面で編集するユーザー名。
    pub username: String,

    /// 入力ボックスの状態（入力中はSome）。
    pub input_box: Option<InputBoxState>,

    /// ショートカットキー設定。
    pub shortcuts: Shortcuts,
}

impl App {
    pub fn new(
        cfg_path: PathBuf,
        cfg: Config,
        shortcuts: Shortcuts,
        worker_tx: mpsc::Sender<WorkerCmd>,
        worker_rx: mpsc::Receiver<WorkerEvent>,
    ) -> Self {
        // ユーザー名が未設定なら設定画面から始める。
        let screen = if cfg.needs_setup() {
            Screen::Settings
        } else {
            Screen::Home
        };
        let mut ui = UiState::new(screen);
        if screen == Screen::Settings {
            ui.status = "Set a user name to get started".into();
        }
        Self {
            cfg_path,
            wizard: Wizard::new(cfg.query.countries.clone()),
            base_url: cfg.api.base_url.clone(),
            username: cfg.user.username.clone(),
            cfg,
            ui,
            saved: vec![],
            detail: None,
            worker_tx,
            worker_rx,
            input_box: None,
            shortcuts,
        }
    }
}

/// ユーザーが終了するまでメインTUIループを回す。
pub async fn run_app(terminal: &mut Tui) -> Result<()> {
    // 設定ファイルを読み込む（初回はデフォルトを生成）。
    let cfg_path = PathBuf::from("config.toml");
    let cfg = Config::load_or_default(&cfg_path)?;

    // ショートカット設定を読み込む（無ければデフォルト）。
    let shortcuts = Shortcuts::load_or_default("shortcut.toml")?;

    // Worker通信用のコマンド/イベントチャネルを作る。
    let (tx_cmd, rx_cmd) = mpsc::channel::<WorkerCmd>(64);
    let (tx_ev, rx_ev) = mpsc::channel::<WorkerEvent>(256);

    let api = HttpApi::new(&cfg.api)?;
    tokio::spawn(worker::run(rx_cmd, tx_ev, Arc::new(api)));

    let mut app = App::new(cfg_path, cfg, shortcuts, tx_cmd, rx_ev);

    loop {
        terminal.draw(|f| draw(f, &app))?;

        // 入力処理の前にWorkerイベントを消化する。
        while let Ok(ev) = app.worker_rx.try_recv() {
            handle_worker_event(&mut app, ev);
        }

        // UIの応答性確保のため短いタイムアウトで入力をポーリングする。
        if event::poll(Duration::from_millis(50))?
            && let Event::Key(k) = event::read()?
        {
            // どの画面でもCtrl+Cで終了できるようにする。
            if is_ctrl_c(&k) {
                break;
            }
            if handle_key(&mut app, k).await? {
                break;
            }
        }
    }
    Ok(())
}

/// ウィザードが依頼したリモート処理をWorkerへ送る。
pub async fn dispatch(app: &mut App, effect: Effect) -> Result<()> {
    let ticket = effect.ticket();
    tracing::debug!("dispatching request {ticket}");
    if let Err(e) = app.worker_tx.send(effect.into()).await {
        // 届かなかったリクエストの完了は来ないので待ちを解除する。
        app.wizard.abandon(ticket);
        return Err(e.into());
    }
    app.ui.status = "Loading...".into();
    Ok(())
}

/// WorkerイベントをUI状態へ反映する。
fn handle_worker_event(app: &mut App, ev: WorkerEvent) {
    match ev {
        WorkerEvent::DateBoundsSettled { ticket, outcome } => {
            let settled = app.wizard.settle_date_bounds(ticket, outcome);
            apply_settled(app, settled);
        }
        WorkerEvent::QuerySettled { ticket, outcome } => {
            let settled = app.wizard.settle_query(ticket, outcome);
            apply_settled(app, settled);
        }
        WorkerEvent::SaveSettled { ticket, result } => {
            let settled = app.wizard.settle_save(ticket, result);
            apply_settled(app, settled);
        }
        WorkerEvent::QueriesLoaded(list) => {
            app.ui.status = format!("Loaded {} saved queries", list.len());
            app.saved = list;
            if app.ui.screen == Screen::SavedQueries {
                app.ui.selected = 0;
            }
        }
        WorkerEvent::QueryOpened { query, comments } => {
            // 一覧から離れていれば開かない。
            if app.ui.screen != Screen::SavedQueries {
                tracing::debug!("dropping late detail for query {}", query.id);
                return;
            }
            app.ui.switch_to(Screen::QueryDetail);
            app.ui.status = format!("Opened '{}'", query.name);
            app.detail = Some(QueryDetail {
                query,
                comments,
                result: None,
                running: false,
            });
        }
        WorkerEvent::SavedQueryRan { id, outcome } => match app.detail.as_mut() {
            Some(d) if d.query.id == id => {
                app.ui.status = match &outcome {
                    Outcome::Success(rows) => format!("{} rows", rows.len()),
                    Outcome::Empty => "Query did not return any results.".into(),
                    Outcome::Failure(e) => format!("Query failed: {e}"),
                };
                d.running = false;
                d.result = Some(outcome);
            }
            _ => tracing::debug!("dropping late result for query {id}"),
        },
        WorkerEvent::CommentPosted(c) => {
            if let Some(d) = app.detail.as_mut().filter(|d| d.query.id == c.query_id) {
                // サーバーから取り直さず先頭に追加する。
                d.comments.insert(
                    0,
                    Comment {
                        id: None,
                        username: c.username,
                        comment_text: c.text,
                    },
                );
            }
            app.ui.status = "Comment posted".into();
        }
        WorkerEvent::Log(s) => {
            app.ui.log.push(s);
        }
        WorkerEvent::Error(s) => {
            app.ui.error = Some(s);
        }
    }
}

/// ウィザードの完了結果を画面へ反映する。
fn apply_settled(app: &mut App, settled: Settled) {
    match settled {
        Settled::Advanced(step) => {
            app.ui.clear_messages();
            app.ui.selected = 0;
            app.ui.status = format!("Step {step}");
        }
        Settled::RolledBack { notice, .. } => {
            app.ui.error = None;
            app.ui.notice = Some(notice);
            app.ui.status = "No results".into();
        }
        Settled::Stalled { reason } => {
            app.ui.error = Some(reason);
            app.ui.status = "Press r to retry".into();
        }
        Settled::Saved => {
            app.ui.clear_messages();
            app.ui.notice = Some("Query saved successfully!".into());
            app.ui.status = "Saved".into();
        }
        Settled::Ignored => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::types::NewComment,
        draft::{DateBounds, QueryType},
        testing::{record, ymd},
        wizard::{NO_RESULTS_NOTICE, Ticket, WizardStep},
    };

    pub(super) fn test_app() -> (App, mpsc::Receiver<WorkerCmd>, mpsc::Sender<WorkerEvent>) {
        let (tx_cmd, rx_cmd) = mpsc::channel(16);
        let (tx_ev, rx_ev) = mpsc::channel(16);
        let mut cfg = Config::default();
        cfg.user.username = "ana".into();
        cfg.query.countries = vec!["US".into(), "Colombia".into()];
        let app = App::new(
            PathBuf::from("unused.toml"),
            cfg,
            Shortcuts::default(),
            tx_cmd,
            rx_ev,
        );
        (app, rx_cmd, tx_ev)
    }

    fn saved_query(id: i64) -> SavedQuery {
        SavedQuery {
            id,
            name: "june".into(),
            query: "http://localhost:8000/api/bigquery/get/top_terms_day/US/2023-06-01".into(),
            username: "ana".into(),
            date: ymd(2024, 5, 1),
            query_comment: String::new(),
        }
    }

    #[test]
    fn test_starts_in_settings_without_username() {
        let (tx, _rx) = mpsc::channel(1);
        let (_tx, rx) = mpsc::channel(1);
        let app = App::new(
            PathBuf::from("unused.toml"),
            Config::default(),
            Shortcuts::default(),
            tx,
            rx,
        );
        assert_eq!(app.ui.screen, Screen::Settings);
        let (app, _, _) = test_app();
        assert_eq!(app.ui.screen, Screen::Home);
    }

    #[test]
    fn test_empty_result_shows_notice() {
        let (mut app, _rx, _tx) = test_app();
        let w = &mut app.wizard;
        w.start().unwrap();
        w.select_country("US").unwrap();
        let eff = w.select_query_type(QueryType::TopTerms).unwrap();
        w.settle_date_bounds(
            eff.ticket(),
            Outcome::Success(DateBounds {
                min: ymd(2023, 1, 1),
                max: ymd(2024, 1, 1),
            }),
        );
        w.select_date_type(crate::draft::DateType::SingleDate)
            .unwrap();
        w.set_start_date(ymd(2023, 6, 1)).unwrap();
        let eff = w.submit_dates().unwrap();

        handle_worker_event(
            &mut app,
            WorkerEvent::QuerySettled {
                ticket: eff.ticket(),
                outcome: Outcome::Success(vec![]),
            },
        );
        assert_eq!(app.wizard.step(), WizardStep::EnterDates);
        assert_eq!(app.ui.notice.as_deref(), Some(NO_RESULTS_NOTICE));
    }

    #[tokio::test]
    async fn test_failed_dispatch_releases_pending_request() {
        let (mut app, rx_cmd, _tx) = test_app();
        drop(rx_cmd);
        app.wizard.start().unwrap();
        app.wizard.select_country("US").unwrap();
        let eff = app.wizard.select_query_type(QueryType::TopTerms).unwrap();
        assert!(dispatch(&mut app, eff).await.is_err());
        assert!(!app.wizard.is_pending());
        assert_eq!(app.wizard.step(), WizardStep::LoadingDateBounds);
    }

    #[test]
    fn test_stale_wizard_event_leaves_ui_alone() {
        let (mut app, _rx, _tx) = test_app();
        app.ui.status = "Ready".into();
        handle_worker_event(
            &mut app,
            WorkerEvent::QuerySettled {
                ticket: Ticket::new(),
                outcome: Outcome::Success(vec![record("x")]),
            },
        );
        assert_eq!(app.wizard.step(), WizardStep::Welcome);
        assert_eq!(app.ui.status, "Ready");
        assert!(app.ui.error.is_none());
    }

    #[test]
    fn test_saved_query_result_only_applies_to_open_detail() {
        let (mut app, _rx, _tx) = test_app();
        app.ui.switch_to(Screen::SavedQueries);
        handle_worker_event(
            &mut app,
            WorkerEvent::QueryOpened {
                query: saved_query(3),
                comments: vec![],
            },
        );
        assert_eq!(app.ui.screen, Screen::QueryDetail);

        handle_worker_event(
            &mut app,
            WorkerEvent::SavedQueryRan {
                id: 9,
                outcome: Outcome::Success(vec![record("x")]),
            },
        );
        assert!(app.detail.as_ref().unwrap().result.is_none());

        handle_worker_event(
            &mut app,
            WorkerEvent::SavedQueryRan {
                id: 3,
                outcome: Outcome::Success(vec![record("x")]),
            },
        );
        assert!(matches!(
            app.detail.as_ref().unwrap().result,
            Some(Outcome::Success(_))
        ));
    }

    #[test]
    fn test_late_detail_ignored_after_leaving_list() {
        let (mut app, _rx, _tx) = test_app();
        handle_worker_event(
            &mut app,
            WorkerEvent::QueryOpened {
                query: saved_query(3),
                comments: vec![],
            },
        );
        assert_eq!(app.ui.screen, Screen::Home);
        assert!(app.detail.is_none());
    }

    #[test]
    fn test_posted_comment_is_prepended() {
        let (mut app, _rx, _tx) = test_app();
        app.ui.switch_to(Screen::SavedQueries);
        handle_worker_event(
            &mut app,
            WorkerEvent::QueryOpened {
                query: saved_query(3),
                comments: vec![Comment {
                    id: Some(1),
                    username: "luis".into(),
                    comment_text: "old".into(),
                }],
            },
        );
        handle_worker_event(
            &mut app,
            WorkerEvent::CommentPosted(NewComment {
                query_id: 3,
                username: "ana".into(),
                text: "new".into(),
            }),
        );
        let comments = &app.detail.as_ref().unwrap().comments;
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].comment_text, "new");
        assert_eq!(comments[0].id, None);
    }
}
