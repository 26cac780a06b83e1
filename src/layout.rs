//! レイアウト計算のヘルパー関数

use ratatui::prelude::*;

/// 画面全体の3つの領域
pub struct MainLayout {
    /// 本文 + INFOパネルの領域
    pub body: Rect,
    /// HELPバーの領域
    pub help_bar: Rect,
    /// STATUSバーの領域
    pub status_bar: Rect,
}

/// ボディ部の2つの領域
pub struct BodyLayout {
    /// 画面ごとの本文
    pub content: Rect,
    /// 下書きやログを出すINFOパネル
    pub info_panel: Rect,
}

/// 画面を Body + HELP + STATUS に分割
pub fn create_main_layout(area: Rect) -> MainLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(3), // HELPバー
            Constraint::Length(3), // STATUSバー
        ])
        .split(area);

    MainLayout {
        body: chunks[0],
        help_bar: chunks[1],
        status_bar: chunks[2],
    }
}

/// Body領域を 本文70% + INFO 30% に分割
pub fn create_body_layout(area: Rect) -> BodyLayout {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);

    BodyLayout {
        content: chunks[0],
        info_panel: chunks[1],
    }
}

/// 本文を上部の説明文と下部の一覧に分割
pub fn split_prompt(area: Rect, prompt_height: u16) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(prompt_height), Constraint::Min(1)])
        .split(area);
    (chunks[0], chunks[1])
}
