//! TUI描画関連の関数。

use ratatui::{
    Frame,
    prelude::*,
    widgets::{Block, Borders, Paragraph, Row, Table, TableState, Wrap},
};

use crate::{
    api::{Outcome, types::ResultRecord},
    draft::{DateType, QueryType},
    events::{MenuItem, Screen},
    input, layout,
    shortcuts::Shortcuts,
    wizard::{Wizard, WizardStep},
};

use super::App;

/// 画面全体のレイアウトを描画する。
pub fn draw(f: &mut Frame, app: &App) {
    let main_layout = layout::create_main_layout(f.area());
    let body = layout::create_body_layout(main_layout.body);

    match app.ui.screen {
        Screen::Home => draw_home(f, app, body.content),
        Screen::Builder => draw_builder(f, app, body.content),
        Screen::SavedQueries => draw_saved_list(f, app, body.content),
        Screen::QueryDetail => draw_detail(f, app, body.content),
        Screen::Settings => draw_settings(f, app, body.content),
    }

    let info_text = if app.ui.screen == Screen::Builder {
        build_draft_info_text(&app.wizard)
    } else {
        build_main_info_text(app)
    };
    let info_panel = Paragraph::new(info_text)
        .block(Block::default().borders(Borders::ALL).title("INFO"))
        .wrap(Wrap { trim: true });
    f.render_widget(info_panel, body.info_panel);

    let help_bar = Paragraph::new(get_help_text(app))
        .block(Block::default().borders(Borders::ALL).title("HELP"))
        .wrap(Wrap { trim: true });
    f.render_widget(help_bar, main_layout.help_bar);

    f.render_widget(build_status_bar(app), main_layout.status_bar);

    // 入力ボックスが開いていれば重ねて描画する。
    if let Some(input_state) = &app.input_box {
        input::render_input_box(f, input_state);
    }
}

fn highlight() -> Style {
    Style::default()
        .bg(Color::Rgb(255, 140, 0))
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

/// 選択中の行に印を付けた選択肢一覧。
fn choice_lines<'a>(items: impl IntoIterator<Item = &'a str>, selected: usize) -> String {
    items
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let marker = if i == selected { "→" } else { " " };
            format!("{marker} {s}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn draw_home(f: &mut Frame, app: &App, area: Rect) {
    let text = format!(
        "=== Search Trends Query Builder ===\n\n{}",
        choice_lines(MenuItem::ALL.iter().map(|m| m.label()), app.ui.selected)
    );
    let p = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("HOME"))
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

/// ウィザード画面を描画する。
fn draw_builder(f: &mut Frame, app: &App, area: Rect) {
    let w = &app.wizard;
    let step = w.step();
    let mut text = format!(
        "=== Query Builder ===\n\nStep {}/{}: {}\n\n{}",
        w.get_step_number(),
        Wizard::TOTAL_STEPS,
        step.title(),
        w.get_prompt()
    );

    let sel = app.ui.selected;
    let extra = match step {
        WizardStep::SelectCountry => {
            choice_lines(w.countries().iter().map(String::as_str), sel)
        }
        WizardStep::SelectQueryType => {
            choice_lines(QueryType::ALL.iter().map(|q| q.label()), sel)
        }
        WizardStep::SelectDateType => choice_lines(DateType::ALL.iter().map(|d| d.label()), sel),
        WizardStep::EnterDates => date_entry_text(w),
        WizardStep::SaveDetails => format!(
            "Name:    {}\nComment: {}\nUser:    {}",
            w.draft().name,
            w.draft().comment,
            app.cfg.user.username
        ),
        _ => String::new(),
    };
    if !extra.is_empty() {
        text.push_str("\n\n");
        text.push_str(&extra);
    }

    let block = Block::default().borders(Borders::ALL).title("BUILDER");
    let rows = match (step, &w.draft().result) {
        (WizardStep::ReviewResult, Some(rows)) => rows,
        _ => {
            let p = Paragraph::new(text).block(block).wrap(Wrap { trim: false });
            f.render_widget(p, area);
            return;
        }
    };

    // 結果確認ではプロンプトの下に表を出す。
    let (top, bottom) = layout::split_prompt(area, 9);
    let p = Paragraph::new(text).block(block).wrap(Wrap { trim: false });
    f.render_widget(p, top);
    draw_result_table(f, rows, sel, bottom, "RESULT");
}

fn date_entry_text(w: &Wizard) -> String {
    let d = w.draft();
    let show = |v: Option<chrono::NaiveDate>| v.map_or("-".to_string(), |v| v.to_string());
    let bounds = d
        .date_bounds
        .map_or("-".to_string(), |b| format!("{} .. {}", b.min, b.max));
    match d.date_type {
        Some(DateType::DateInterval) => format!(
            "Available: {bounds}\nStart:     {}\nEnd:       {}",
            show(d.start_date),
            show(d.end_date)
        ),
        _ => format!("Available: {bounds}\nDate:      {}", show(d.start_date)),
    }
}

fn fmt_opt<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map_or("-".to_string(), |v| v.to_string())
}

/// クエリ結果の表を描画する。
fn draw_result_table(f: &mut Frame, rows: &[ResultRecord], selected: usize, area: Rect, title: &str) {
    let body = rows.iter().map(|r| {
        Row::new(vec![
            r.term.clone(),
            fmt_opt(&r.rank),
            fmt_opt(&r.day),
            r.percent_gain
                .map_or("-".to_string(), |g| format!("{g:.1}%")),
        ])
    });
    let table = Table::new(
        body,
        [
            Constraint::Min(16),
            Constraint::Length(6),
            Constraint::Length(12),
            Constraint::Length(14),
        ],
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("{title} ({} rows)", rows.len())),
    )
    .header(Row::new(vec!["Term", "Rank", "Date", "Percent Gain"]).bold())
    .row_highlight_style(highlight());

    let mut state = TableState::default();
    if !rows.is_empty() {
        state.select(Some(selected));
    }
    f.render_stateful_widget(table, area, &mut state);
}

/// 保存済みクエリ一覧を描画する。
fn draw_saved_list(f: &mut Frame, app: &App, area: Rect) {
    let rows = app.saved.iter().map(|q| {
        Row::new(vec![
            q.id.to_string(),
            q.name.clone(),
            q.username.clone(),
            q.date.to_string(),
        ])
    });
    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(10),
            Constraint::Length(16),
            Constraint::Length(12),
        ],
    )
    .block(Block::default().borders(Borders::ALL).title("SAVED QUERIES"))
    .header(Row::new(vec!["#", "name", "user", "date"]).bold())
    .row_highlight_style(highlight());

    let mut state = TableState::default();
    if !app.saved.is_empty() {
        state.select(Some(app.ui.selected));
    }
    f.render_stateful_widget(table, area, &mut state);
}

/// 保存済みクエリの詳細を描画する。
fn draw_detail(f: &mut Frame, app: &App, area: Rect) {
    let Some(d) = &app.detail else {
        f.render_widget(
            Paragraph::new("No query selected").block(Block::default().borders(Borders::ALL)),
            area,
        );
        return;
    };

    let mut lines = vec![
        format!("Name:    {}", d.query.name),
        format!("User:    {}", d.query.username),
        format!("Saved:   {}", d.query.date),
        format!("Query:   {}", d.query.query),
        format!("Comment: {}", d.query.query_comment),
        String::new(),
        format!("Comments ({}):", d.comments.len()),
    ];
    lines.extend(
        d.comments
            .iter()
            .map(|c| format!("  {}: {}", c.username, c.comment_text)),
    );

    let (top, bottom) = layout::split_prompt(area, area.height / 2);
    let p = Paragraph::new(lines.join("\n"))
        .block(Block::default().borders(Borders::ALL).title("QUERY"))
        .wrap(Wrap { trim: false });
    f.render_widget(p, top);

    match &d.result {
        Some(Outcome::Success(rows)) => draw_result_table(f, rows, 0, bottom, "RESULT"),
        other => {
            let msg = match other {
                _ if d.running => "Loading Query Result...".to_string(),
                Some(Outcome::Empty) => "Query did not return any results.".to_string(),
                Some(Outcome::Failure(e)) => format!("Query failed: {e}"),
                _ => "Press x to run this query.".to_string(),
            };
            let p = Paragraph::new(msg).block(Block::default().borders(Borders::ALL).title("RESULT"));
            f.render_widget(p, bottom);
        }
    }
}

/// 設定画面を描画する。
fn draw_settings(f: &mut Frame, app: &App, area: Rect) {
    let text = format!(
        "Query service URL: {}\nUser name:         {}\n\nTimeout: {}s\nCountries: {}",
        app.base_url,
        app.username,
        app.cfg.api.timeout_secs,
        app.cfg.query.countries.join(", ")
    );
    let p = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("SETTINGS"))
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

/// ウィザードの下書き内容を構築する。
fn build_draft_info_text(w: &Wizard) -> String {
    let d = w.draft();
    format!(
        "Country: {}\nType: {}\nDates: {}\nStart: {}\nEnd: {}\nRange: {}\n\nQuery: {}\nRows: {}",
        d.country.as_deref().unwrap_or("-"),
        d.query_type.map_or("-", |q| q.label()),
        d.date_type.map_or("-", |t| t.label()),
        fmt_opt(&d.start_date),
        fmt_opt(&d.end_date),
        d.date_bounds
            .map_or("-".to_string(), |b| format!("{} .. {}", b.min, b.max)),
        fmt_opt(&d.locator),
        d.result_len(),
    )
}

/// 設定とログを表示する。
fn build_main_info_text(app: &App) -> String {
    format!(
        "Server: {}\nUser: {}\nSaved: {}\n\nLog:\n{}",
        app.cfg.api.base_url,
        app.cfg.user.username,
        app.saved.len(),
        app.ui
            .log
            .iter()
            .rev()
            .take(8)
            .rev()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// ステータスバーを構築する。
fn build_status_bar(app: &App) -> Paragraph<'static> {
    let screen_name = app.ui.screen.name();

    let (text, color) = if let Some(err) = &app.ui.error {
        (format!("[{screen_name}] ERROR: {err}"), Some(Color::Red))
    } else if let Some(notice) = &app.ui.notice {
        (format!("[{screen_name}] {notice}"), Some(Color::Yellow))
    } else {
        (format!("[{screen_name}] {}", app.ui.status), None)
    };

    let mut status_bar = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("STATUS"))
        .wrap(Wrap { trim: true });
    if let Some(c) = color {
        status_bar = status_bar.style(Style::default().fg(c));
    }
    status_bar
}

/// 現在画面に応じたヘルプ文字列を返す。
fn get_help_text(app: &App) -> String {
    let sc: &Shortcuts = &app.shortcuts;
    match app.ui.screen {
        Screen::Home => format!(
            "{}/{}: navigate | {}: select | {}: quit",
            format_keys(&sc.home.up),
            format_keys(&sc.home.down),
            format_keys(&sc.home.enter),
            format_keys(&sc.home.quit)
        ),
        Screen::Builder => builder_help(&app.wizard, sc),
        Screen::SavedQueries => format!(
            "{}: open | {}: refresh | {}/{}: navigate | {}: back",
            format_keys(&sc.saved.open),
            format_keys(&sc.saved.refresh),
            format_keys(&sc.saved.up),
            format_keys(&sc.saved.down),
            format_keys(&sc.saved.back)
        ),
        Screen::QueryDetail => format!(
            "{}: run | {}: comment | {}: back",
            format_keys(&sc.detail.run),
            format_keys(&sc.detail.comment),
            format_keys(&sc.detail.back)
        ),
        Screen::Settings => format!(
            "{}: server URL | {}: user name | {}: save | {}: cancel",
            format_keys(&sc.settings.base_url),
            format_keys(&sc.settings.username),
            format_keys(&sc.settings.save),
            format_keys(&sc.settings.cancel)
        ),
    }
}

fn builder_help(w: &Wizard, sc: &Shortcuts) -> String {
    let b = &sc.builder;
    let back = format_keys(&b.back);
    match w.step() {
        WizardStep::Welcome => format!("{}: start | {back}: exit", format_keys(&b.proceed)),
        WizardStep::SelectCountry | WizardStep::SelectQueryType | WizardStep::SelectDateType => {
            format!(
                "{}/{}: navigate | {}: select | {back}: back",
                format_keys(&b.up),
                format_keys(&b.down),
                format_keys(&b.proceed)
            )
        }
        WizardStep::LoadingDateBounds | WizardStep::LoadingResult if w.is_pending() => {
            format!("waiting for the query service | {back}: back")
        }
        WizardStep::LoadingDateBounds | WizardStep::LoadingResult => {
            format!("{}: retry | {back}: back", format_keys(&b.retry))
        }
        WizardStep::EnterDates => format!(
            "{}: start date | {}: end date | {}: run | {back}: back",
            format_keys(&b.start_date),
            format_keys(&b.end_date),
            format_keys(&b.proceed)
        ),
        WizardStep::ReviewResult => format!(
            "{}: save | {}/{}: scroll | {back}: change dates",
            format_keys(&b.save),
            format_keys(&b.up),
            format_keys(&b.down)
        ),
        WizardStep::SaveDetails if w.is_saved() => {
            format!("{}: new query | {back}: back", format_keys(&b.proceed))
        }
        WizardStep::SaveDetails => format!(
            "{}: name | {}: comment | {}: save | {back}: back",
            format_keys(&b.name),
            format_keys(&b.comment),
            format_keys(&b.proceed)
        ),
    }
}

/// ショートカットキーの配列を表示用文字列に変換する。
fn format_keys(keys: &[String]) -> String {
    keys.join("/")
}
