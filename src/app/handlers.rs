//! キー入力ハンドラー関数。

use anyhow::Result;
use chrono::NaiveDate;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::sync::Arc;

use crate::{
    api::{client::HttpApi, types::NewComment},
    draft::{DateType, QueryLocator, QueryType},
    events::{MenuItem, Screen},
    input::{InputBoxState, InputCallbackId},
    shortcuts::matches_shortcut,
    validator,
    wizard::{Back, WizardError, WizardStep},
    worker::WorkerCmd,
};

use super::{App, dispatch};

/// キー入力を1件処理し、終了すべきならtrueを返す。
pub async fn handle_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 入力ボックスが開いていれば最優先で処理する。
    if app.input_box.is_some() {
        return handle_input_box_key(app, k).await;
    }

    match app.ui.screen {
        Screen::Home => handle_home_key(app, k).await,
        Screen::Builder => handle_builder_key(app, k).await,
        Screen::SavedQueries => handle_saved_key(app, k).await,
        Screen::QueryDetail => handle_detail_key(app, k).await,
        Screen::Settings => handle_settings_key(app, k).await,
    }
}

/// Ctrl+Cかどうかを判定する。
pub fn is_ctrl_c(k: &KeyEvent) -> bool {
    k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c')
}

/// ホーム画面のキー処理。
async fn handle_home_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let sc = &app.shortcuts.home;

    if matches_shortcut(&k, &sc.quit) {
        return Ok(true);
    } else if matches_shortcut(&k, &sc.down) {
        app.ui.select_next(MenuItem::ALL.len());
    } else if matches_shortcut(&k, &sc.up) {
        app.ui.select_prev();
    } else if matches_shortcut(&k, &sc.enter) {
        match MenuItem::ALL.get(app.ui.selected) {
            Some(MenuItem::BuildQuery) => {
                // 保存済みのセッションは捨てて新しく始める。
                if app.wizard.is_saved() {
                    app.wizard.reset();
                }
                app.ui.switch_to(Screen::Builder);
            }
            Some(MenuItem::SavedQueries) => {
                app.ui.switch_to(Screen::SavedQueries);
                app.worker_tx.send(WorkerCmd::ListQueries).await?;
                app.ui.status = "Loading saved queries...".into();
            }
            Some(MenuItem::Settings) => {
                reload_settings_buffers(app);
                app.ui.switch_to(Screen::Settings);
            }
            Some(MenuItem::Quit) => return Ok(true),
            None => {}
        }
    }
    Ok(false)
}

/// ウィザードの遷移結果を画面へ反映する。
fn report(app: &mut App, res: Result<(), WizardError>) {
    match res {
        Ok(()) => {
            app.ui.clear_messages();
            app.ui.selected = 0;
        }
        Err(e) => app.ui.error = Some(e.to_string()),
    }
}

/// ウィザード画面のキー処理。
async fn handle_builder_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let sc = app.shortcuts.builder.clone();

    if matches_shortcut(&k, &sc.back) {
        // 処理中のリクエストは結果が届いても無視される。
        match app.wizard.back() {
            Back::To(_) => app.ui.clear_messages(),
            Back::Exit => {
                app.wizard.reset();
                app.ui.switch_to(Screen::Home);
            }
            Back::Blocked => {
                app.ui.status = "Saving... wait for the result".into();
                return Ok(false);
            }
        }
        app.ui.selected = 0;
        return Ok(false);
    }

    let step = app.wizard.step();
    let choices = match step {
        WizardStep::SelectCountry => app.wizard.countries().len(),
        WizardStep::SelectQueryType => QueryType::ALL.len(),
        WizardStep::SelectDateType => DateType::ALL.len(),
        WizardStep::ReviewResult => app.wizard.draft().result_len(),
        _ => 0,
    };
    if matches_shortcut(&k, &sc.down) {
        app.ui.select_next(choices);
        return Ok(false);
    } else if matches_shortcut(&k, &sc.up) {
        app.ui.select_prev();
        return Ok(false);
    }

    let sel = app.ui.selected;
    match step {
        WizardStep::Welcome if matches_shortcut(&k, &sc.proceed) => {
            let res = app.wizard.start();
            report(app, res);
        }
        WizardStep::SelectCountry if matches_shortcut(&k, &sc.proceed) => {
            if let Some(c) = app.wizard.countries().get(sel).cloned() {
                let res = app.wizard.select_country(&c);
                report(app, res);
            }
        }
        WizardStep::SelectQueryType if matches_shortcut(&k, &sc.proceed) => {
            if let Some(qt) = QueryType::ALL.get(sel).copied() {
                match app.wizard.select_query_type(qt) {
                    Ok(effect) => {
                        report(app, Ok(()));
                        dispatch(app, effect).await?;
                    }
                    Err(e) => report(app, Err(e)),
                }
            }
        }
        s if s.is_loading() && matches_shortcut(&k, &sc.retry) => {
            match app.wizard.retry() {
                Ok(effect) => {
                    app.ui.error = None;
                    dispatch(app, effect).await?;
                }
                Err(e) => report(app, Err(e)),
            }
        }
        WizardStep::SelectDateType if matches_shortcut(&k, &sc.proceed) => {
            if let Some(dt) = DateType::ALL.get(sel).copied() {
                let res = app.wizard.select_date_type(dt);
                report(app, res);
            }
        }
        WizardStep::EnterDates => {
            let draft = app.wizard.draft();
            if matches_shortcut(&k, &sc.start_date) {
                let label = match draft.date_type {
                    Some(DateType::DateInterval) => "Start date (YYYY-MM-DD):",
                    _ => "Date (YYYY-MM-DD):",
                };
                app.input_box = Some(InputBoxState::new(
                    label,
                    &fmt_date(draft.start_date),
                    InputCallbackId::StartDate,
                ));
            } else if matches_shortcut(&k, &sc.end_date) {
                if draft.date_type == Some(DateType::DateInterval) {
                    app.input_box = Some(InputBoxState::new(
                        "End date (YYYY-MM-DD):",
                        &fmt_date(draft.end_date),
                        InputCallbackId::EndDate,
                    ));
                }
            } else if matches_shortcut(&k, &sc.proceed) {
                match app.wizard.submit_dates() {
                    Ok(effect) => {
                        report(app, Ok(()));
                        dispatch(app, effect).await?;
                    }
                    Err(e) => report(app, Err(e)),
                }
            }
        }
        WizardStep::ReviewResult if matches_shortcut(&k, &sc.save) => {
            let res = app.wizard.begin_save();
            report(app, res);
        }
        WizardStep::SaveDetails => {
            if app.wizard.is_saved() {
                // 保存後はEnterで新しいクエリを作り始める。
                if matches_shortcut(&k, &sc.proceed) {
                    app.wizard.reset();
                    app.ui.clear_messages();
                }
            } else if matches_shortcut(&k, &sc.name) {
                app.input_box = Some(InputBoxState::new(
                    "Query name:",
                    &app.wizard.draft().name,
                    InputCallbackId::QueryName,
                ));
            } else if matches_shortcut(&k, &sc.comment) {
                app.input_box = Some(InputBoxState::new(
                    "Comment:",
                    &app.wizard.draft().comment,
                    InputCallbackId::QueryComment,
                ));
            } else if matches_shortcut(&k, &sc.proceed) {
                let username = app.cfg.user.username.clone();
                match app.wizard.submit_save(&username) {
                    Ok(effect) => {
                        app.ui.error = None;
                        dispatch(app, effect).await?;
                    }
                    Err(e) => report(app, Err(e)),
                }
            }
        }
        _ => {}
    }
    Ok(false)
}

/// 保存済み一覧のキー処理。
async fn handle_saved_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let sc = &app.shortcuts.saved;

    if matches_shortcut(&k, &sc.back) {
        app.ui.switch_to(Screen::Home);
    } else if matches_shortcut(&k, &sc.down) {
        app.ui.select_next(app.saved.len());
    } else if matches_shortcut(&k, &sc.up) {
        app.ui.select_prev();
    } else if matches_shortcut(&k, &sc.refresh) {
        app.worker_tx.send(WorkerCmd::ListQueries).await?;
        app.ui.status = "Loading saved queries...".into();
    } else if matches_shortcut(&k, &sc.open)
        && let Some(q) = app.saved.get(app.ui.selected)
    {
        let id = q.id;
        app.worker_tx.send(WorkerCmd::OpenQuery { id }).await?;
        app.ui.status = format!("Opening '{}'...", q.name);
    }
    Ok(false)
}

/// 詳細画面のキー処理。
async fn handle_detail_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let sc = &app.shortcuts.detail;

    if matches_shortcut(&k, &sc.back) {
        app.detail = None;
        app.ui.switch_to(Screen::SavedQueries);
    } else if matches_shortcut(&k, &sc.run)
        && let Some(d) = app.detail.as_mut()
    {
        if d.running {
            return Ok(false);
        }
        d.running = true;
        let cmd = WorkerCmd::RunSavedQuery {
            id: d.query.id,
            locator: QueryLocator::new(d.query.query.clone()),
        };
        app.worker_tx.send(cmd).await?;
        app.ui.status = "Running query...".into();
    } else if matches_shortcut(&k, &sc.comment) && app.detail.is_some() {
        app.input_box = Some(InputBoxState::new(
            "Comment:",
            "",
            InputCallbackId::Comment,
        ));
    }
    Ok(false)
}

/// 設定画面のキー処理。
async fn handle_settings_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let sc = &app.shortcuts.settings;

    if matches_shortcut(&k, &sc.cancel) {
        // 変更を破棄してホームへ戻る。
        reload_settings_buffers(app);
        app.ui.switch_to(Screen::Home);
        if app.cfg.needs_setup() {
            app.ui.status = "Settings required before saving queries".into();
        }
    } else if matches_shortcut(&k, &sc.save) {
        save_settings(app).await?;
    } else if matches_shortcut(&k, &sc.base_url) {
        app.input_box = Some(InputBoxState::new(
            "Query service URL:",
            &app.base_url,
            InputCallbackId::SettingsBaseUrl,
        ));
    } else if matches_shortcut(&k, &sc.username) {
        app.input_box = Some(InputBoxState::new(
            "User name:",
            &app.username,
            InputCallbackId::SettingsUsername,
        ));
    }
    Ok(false)
}

/// 編集バッファを検証して設定へ反映し、Workerのクライアントを差し替える。
async fn save_settings(app: &mut App) -> Result<()> {
    let base_url = app.base_url.trim().to_string();
    let username = app.username.trim().to_string();
    if base_url.is_empty() {
        app.ui.error = Some("The query service URL cannot be empty.".into());
        return Ok(());
    }
    if username.chars().count() > validator::MAX_NAME_CHARS {
        app.ui.error = Some(format!(
            "User name must be at most {} characters.",
            validator::MAX_NAME_CHARS
        ));
        return Ok(());
    }

    app.cfg.api.base_url = base_url;
    app.cfg.user.username = username;
    app.cfg.save(&app.cfg_path)?;
    tracing::info!("settings saved to {}", app.cfg_path.display());

    // 新しい接続先でクライアントを作り直す。
    let api = HttpApi::new(&app.cfg.api)?;
    app.worker_tx.send(WorkerCmd::ReplaceApi(Arc::new(api))).await?;

    reload_settings_buffers(app);
    app.ui.switch_to(Screen::Home);
    app.ui.status = "Saved settings".into();
    Ok(())
}

/// 入力ボックスのキー処理。
async fn handle_input_box_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    let Some(input_state) = &mut app.input_box else {
        return Ok(false);
    };
    let sc = &app.shortcuts.input_box;

    if is_ctrl_c(&k) {
        return Ok(true);
    }

    if matches_shortcut(&k, &sc.confirm) {
        let value = input_state.value.clone();
        let callback_id = input_state.callback_id;
        app.input_box = None;
        apply_input_callback(app, callback_id, value).await?;
    } else if matches_shortcut(&k, &sc.cancel) {
        app.input_box = None;
    } else if matches_shortcut(&k, &sc.backspace) {
        input_state.backspace();
    } else if matches_shortcut(&k, &sc.delete) {
        input_state.delete();
    } else if matches_shortcut(&k, &sc.left) {
        input_state.move_left();
    } else if matches_shortcut(&k, &sc.right) {
        input_state.move_right();
    } else if matches_shortcut(&k, &sc.home) {
        input_state.move_home();
    } else if matches_shortcut(&k, &sc.end) {
        input_state.move_end();
    } else if matches_shortcut(&k, &sc.clear_line) {
        input_state.clear_line();
    } else if let KeyCode::Char(c) = k.code
        && !k.modifiers.contains(KeyModifiers::CONTROL)
    {
        input_state.insert_char(c);
    }
    Ok(false)
}

/// 入力ボックスのコールバックを適用する。
async fn apply_input_callback(
    app: &mut App,
    callback_id: InputCallbackId,
    value: String,
) -> Result<()> {
    match callback_id {
        InputCallbackId::StartDate | InputCallbackId::EndDate => {
            let Some(date) = parse_date(app, &value) else {
                return Ok(());
            };
            let res = if callback_id == InputCallbackId::StartDate {
                app.wizard.set_start_date(date)
            } else {
                app.wizard.set_end_date(date)
            };
            if let Err(e) = res {
                app.ui.error = Some(e.to_string());
            } else {
                app.ui.clear_messages();
            }
        }
        InputCallbackId::QueryName => {
            if let Err(e) = app.wizard.set_name(&value) {
                app.ui.error = Some(e.to_string());
            }
        }
        InputCallbackId::QueryComment => {
            if let Err(e) = app.wizard.set_comment(&value) {
                app.ui.error = Some(e.to_string());
            }
        }
        InputCallbackId::Comment => post_comment(app, value).await?,
        InputCallbackId::SettingsBaseUrl => app.base_url = value,
        InputCallbackId::SettingsUsername => app.username = value,
    }
    Ok(())
}

/// 開いているクエリへコメントを送る。
async fn post_comment(app: &mut App, text: String) -> Result<()> {
    let Some(d) = &app.detail else {
        return Ok(());
    };
    let text = text.trim().to_string();
    if text.is_empty() {
        app.ui.error = Some("Comment cannot be empty.".into());
        return Ok(());
    }
    let username = app.cfg.user.username.trim().to_string();
    if username.is_empty() {
        app.ui.error = Some("Set a user name in settings before commenting.".into());
        return Ok(());
    }
    let comment = NewComment {
        query_id: d.query.id,
        username,
        text,
    };
    app.worker_tx.send(WorkerCmd::PostComment(comment)).await?;
    app.ui.status = "Sending comment...".into();
    Ok(())
}

fn parse_date(app: &mut App, value: &str) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            app.ui.error = Some(format!("Invalid date '{}', expected YYYY-MM-DD.", value.trim()));
            None
        }
    }
}

fn fmt_date(d: Option<NaiveDate>) -> String {
    d.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// 設定画面用の編集バッファを設定値から再読み込みする。
fn reload_settings_buffers(app: &mut App) {
    app.base_url = app.cfg.api.base_url.clone();
    app.username = app.cfg.user.username.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        api::Outcome,
        app::{handle_worker_event, tests::test_app},
        draft::DateBounds,
        testing::{record, ymd},
        worker::WorkerEvent,
    };

    fn press(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::empty())
    }

    fn code(c: KeyCode) -> KeyEvent {
        KeyEvent::new(c, KeyModifiers::empty())
    }

    async fn type_text(app: &mut App, s: &str) {
        for c in s.chars() {
            handle_key(app, press(c)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_keyboard_walk_dispatches_commands() {
        let (mut app, mut rx, _tx) = test_app();
        // Home → Builder
        handle_key(&mut app, code(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.ui.screen, Screen::Builder);
        // Welcome → 国選択 → Colombia
        handle_key(&mut app, code(KeyCode::Enter)).await.unwrap();
        handle_key(&mut app, code(KeyCode::Down)).await.unwrap();
        handle_key(&mut app, code(KeyCode::Enter)).await.unwrap();
        assert_eq!(app.wizard.draft().country.as_deref(), Some("Colombia"));
        // Top Rising Terms
        handle_key(&mut app, code(KeyCode::Down)).await.unwrap();
        handle_key(&mut app, code(KeyCode::Enter)).await.unwrap();
        let (ticket, query_type) = match rx.recv().await.unwrap() {
            WorkerCmd::FetchDateBounds { ticket, query_type } => (ticket, query_type),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(query_type, QueryType::TopRisingTerms);

        handle_worker_event(
            &mut app,
            WorkerEvent::DateBoundsSettled {
                ticket,
                outcome: Outcome::Success(DateBounds {
                    min: ymd(2023, 1, 1),
                    max: ymd(2024, 1, 1),
                }),
            },
        );
        assert_eq!(app.wizard.step(), WizardStep::SelectDateType);

        // 期間指定を選び日付を入力する。
        handle_key(&mut app, code(KeyCode::Enter)).await.unwrap();
        handle_key(&mut app, press('d')).await.unwrap();
        type_text(&mut app, "2023-03-01").await;
        handle_key(&mut app, code(KeyCode::Enter)).await.unwrap();
        handle_key(&mut app, press('e')).await.unwrap();
        type_text(&mut app, "2023-03-05").await;
        handle_key(&mut app, code(KeyCode::Enter)).await.unwrap();
        assert!(app.ui.error.is_none());

        handle_key(&mut app, code(KeyCode::Enter)).await.unwrap();
        let ticket = match rx.recv().await.unwrap() {
            WorkerCmd::ExecuteQuery { ticket, locator } => {
                assert_eq!(
                    locator.as_str(),
                    "/api/bigquery/get/top_rising_terms_dates/Colombia/2023-03-01/2023-03-05"
                );
                ticket
            }
            other => panic!("unexpected {other:?}"),
        };
        handle_worker_event(
            &mut app,
            WorkerEvent::QuerySettled {
                ticket,
                outcome: Outcome::Success(vec![record("a"), record("b")]),
            },
        );
        assert_eq!(app.wizard.step(), WizardStep::ReviewResult);

        // 保存
        handle_key(&mut app, press('s')).await.unwrap();
        handle_key(&mut app, press('n')).await.unwrap();
        type_text(&mut app, "march").await;
        handle_key(&mut app, code(KeyCode::Enter)).await.unwrap();
        handle_key(&mut app, code(KeyCode::Enter)).await.unwrap();
        let ticket = match rx.recv().await.unwrap() {
            WorkerCmd::SaveQuery { ticket, request } => {
                assert_eq!(request.name, "march");
                assert_eq!(request.username, "ana");
                ticket
            }
            other => panic!("unexpected {other:?}"),
        };

        // 保存中は戻れない。
        handle_key(&mut app, code(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.wizard.step(), WizardStep::SaveDetails);
        handle_worker_event(
            &mut app,
            WorkerEvent::SaveSettled {
                ticket,
                result: Ok(()),
            },
        );
        assert!(app.wizard.is_saved());
    }

    #[tokio::test]
    async fn test_invalid_date_input_reports_error() {
        let (mut app, _rx, _tx) = test_app();
        app.ui.switch_to(Screen::Builder);
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
        w.select_date_type(DateType::SingleDate).unwrap();

        handle_key(&mut app, press('d')).await.unwrap();
        type_text(&mut app, "03/01/2023").await;
        handle_key(&mut app, code(KeyCode::Enter)).await.unwrap();
        assert!(app.ui.error.as_deref().unwrap().contains("Invalid date"));
        assert!(app.wizard.draft().start_date.is_none());

        // 終了日は単日指定では開かない。
        handle_key(&mut app, press('e')).await.unwrap();
        assert!(app.input_box.is_none());
    }

    #[tokio::test]
    async fn test_escape_from_welcome_returns_home() {
        let (mut app, _rx, _tx) = test_app();
        app.ui.switch_to(Screen::Builder);
        handle_key(&mut app, code(KeyCode::Esc)).await.unwrap();
        assert_eq!(app.ui.screen, Screen::Home);
    }

    #[tokio::test]
    async fn test_empty_comment_not_sent() {
        let (mut app, mut rx, _tx) = test_app();
        app.ui.switch_to(Screen::QueryDetail);
        app.detail = Some(crate::app::QueryDetail {
            query: crate::api::types::SavedQuery {
                id: 4,
                name: "q".into(),
                query: "/x".into(),
                username: "ana".into(),
                date: ymd(2024, 1, 1),
                query_comment: String::new(),
            },
            comments: vec![],
            result: None,
            running: false,
        });
        handle_key(&mut app, press('c')).await.unwrap();
        type_text(&mut app, "   ").await;
        handle_key(&mut app, code(KeyCode::Enter)).await.unwrap();
        assert!(app.ui.error.is_some());
        assert!(rx.try_recv().is_err());

        handle_key(&mut app, press('c')).await.unwrap();
        type_text(&mut app, "nice").await;
        handle_key(&mut app, code(KeyCode::Enter)).await.unwrap();
        assert!(matches!(
            rx.try_recv(),
            Ok(WorkerCmd::PostComment(ref c)) if c.query_id == 4 && c.text == "nice"
        ));
    }

    #[test]
    fn test_ctrl_c_detection() {
        assert!(is_ctrl_c(&KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL
        )));
        assert!(!is_ctrl_c(&press('c')));
    }
}
