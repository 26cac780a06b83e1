//! TUI内での文字列入力コンポーネント（InputBox）。

use ratatui::{
    layout::Alignment,
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph},
};

/// InputBox入力状態
#[derive(Clone, Debug)]
pub struct InputBoxState {
    /// プロンプトメッセージ
    pub prompt: String,
    /// 現在の入力値
    pub value: String,
    /// カーソル位置（文字単位）
    pub cursor: usize,
    /// 入力完了時のコールバック識別子
    pub callback_id: InputCallbackId,
}

/// 入力完了時のコールバック識別子
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputCallbackId {
    // ウィザード
    StartDate,
    EndDate,
    QueryName,
    QueryComment,

    // 詳細画面
    Comment,

    // 設定画面
    SettingsBaseUrl,
    SettingsUsername,
}

impl InputBoxState {
    /// 既存値を入れた状態で開く（カーソルは末尾）。
    pub fn new(prompt: impl Into<String>, value: &str, callback_id: InputCallbackId) -> Self {
        Self {
            prompt: prompt.into(),
            value: value.to_string(),
            cursor: value.chars().count(),
            callback_id,
        }
    }

    /// 文字位置をバイト位置へ変換する。
    fn byte_at(&self, char_idx: usize) -> usize {
        self.value
            .char_indices()
            .nth(char_idx)
            .map_or(self.value.len(), |(i, _)| i)
    }

    fn char_count(&self) -> usize {
        self.value.chars().count()
    }

    /// 文字を挿入
    pub fn insert_char(&mut self, c: char) {
        let at = self.byte_at(self.cursor);
        self.value.insert(at, c);
        self.cursor += 1;
    }

    /// Backspace（カーソル前の文字を削除）
    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_at(self.cursor);
        self.value.remove(at);
    }

    /// Delete（カーソル位置の文字を削除）
    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let at = self.byte_at(self.cursor);
            self.value.remove(at);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.char_count();
    }

    /// 行全体をクリア
    pub fn clear_line(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    /// 表示幅に収まるよう切り出し、カーソル位置に `|` を入れた文字列。
    fn visible_text(&self, width: usize) -> String {
        let offset = self.cursor.saturating_sub(width.saturating_sub(2));
        let chars: Vec<char> = self.value.chars().skip(offset).take(width).collect();
        let at = (self.cursor - offset).min(chars.len());
        let before: String = chars[..at].iter().collect();
        let after: String = chars[at..].iter().collect();
        format!("{before}|{after}")
    }
}

/// InputBoxをポップアップとして描画
pub fn render_input_box(f: &mut Frame, state: &InputBoxState) {
    let popup_area = centered_popup(f.area(), 70, 7);

    // 既存の描画を消してポップアップ用の背景にする。
    f.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Input")
        .style(Style::default().bg(Color::DarkGray));
    f.render_widget(block, popup_area);

    let inner = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(1), // プロンプト
            Constraint::Length(1), // 入力フィールド
            Constraint::Length(1), // 空行
            Constraint::Length(1), // ヘルプ
        ])
        .split(popup_area);

    let prompt = Paragraph::new(state.prompt.clone()).style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );
    f.render_widget(prompt, inner[0]);

    let field = Paragraph::new(state.visible_text(inner[1].width as usize))
        .style(Style::default().fg(Color::Green));
    f.render_widget(field, inner[1]);

    let help = Paragraph::new("Enter=confirm | Esc=cancel | Ctrl+U=clear")
        .style(Style::default().fg(Color::Gray))
        .alignment(Alignment::Center);
    f.render_widget(help, inner[3]);
}

/// 中央配置のポップアップ領域を計算
fn centered_popup(area: Rect, width_percent: u16, height: u16) -> Rect {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(area.height.saturating_sub(height) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(rows[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editing_multibyte_text() {
        let mut s = InputBoxState::new("Name:", "Bogotá", InputCallbackId::QueryName);
        assert_eq!(s.cursor, 6);
        s.backspace();
        assert_eq!(s.value, "Bogot");
        s.insert_char('a');
        s.move_home();
        s.delete();
        assert_eq!(s.value, "ogota");
        s.insert_char('B');
        assert_eq!(s.value, "Bogota");
        assert_eq!(s.cursor, 1);
    }

    #[test]
    fn test_cursor_bounds() {
        let mut s = InputBoxState::new("Date:", "2024", InputCallbackId::StartDate);
        s.move_right();
        assert_eq!(s.cursor, 4);
        s.move_home();
        s.move_left();
        s.backspace();
        assert_eq!(s.cursor, 0);
        assert_eq!(s.value, "2024");
        s.clear_line();
        assert!(s.value.is_empty());
    }

    #[test]
    fn test_visible_text_scrolls_to_cursor() {
        let s = InputBoxState::new("x", "abcdefghij", InputCallbackId::Comment);
        // 幅6ではカーソル手前の4文字が見える。
        assert_eq!(s.visible_text(6), "ghij|");
        let mut s = s;
        s.move_home();
        assert_eq!(s.visible_text(6), "|abcdef");
    }
}
