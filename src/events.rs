//! 画面遷移用のUI状態と画面種別。

/// TUIで現在表示中の画面。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    /// 起動直後のメニュー。
    Home,
    /// クエリ作成ウィザード。
    Builder,
    /// 保存済みクエリ一覧。
    SavedQueries,
    /// 保存済みクエリの詳細とコメント。
    QueryDetail,
    /// 設定編集画面。
    Settings,
}

impl Screen {
    /// ステータスバーに出す画面名。
    pub fn name(self) -> &'static str {
        match self {
            Screen::Home => "Home",
            Screen::Builder => "Builder",
            Screen::SavedQueries => "Saved",
            Screen::QueryDetail => "Detail",
            Screen::Settings => "Settings",
        }
    }
}

/// ホームメニューの項目。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuItem {
    BuildQuery,
    SavedQueries,
    Settings,
    Quit,
}

impl MenuItem {
    pub const ALL: [MenuItem; 4] = [
        MenuItem::BuildQuery,
        MenuItem::SavedQueries,
        MenuItem::Settings,
        MenuItem::Quit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            MenuItem::BuildQuery => "Build a query",
            MenuItem::SavedQueries => "Saved queries",
            MenuItem::Settings => "Settings",
            MenuItem::Quit => "Quit",
        }
    }
}

/// 描画側と共有するUI状態。
#[derive(Clone, Debug)]
pub struct UiState {
    /// 現在の画面。
    pub screen: Screen,
    /// 一覧の選択行（画面ごとに使い回す）。
    pub selected: usize,
    /// 右側パネルに表示するログ。
    pub log: Vec<String>,
    /// 画面下部のステータス文言。
    pub status: String,
    /// ユーザーへの通知（0件時の案内など）。
    pub notice: Option<String>,
    /// エラーメッセージ（強調表示用）。
    pub error: Option<String>,
}

impl UiState {
    pub fn new(screen: Screen) -> Self {
        Self {
            screen,
            selected: 0,
            log: vec![],
            status: "Ready".into(),
            notice: None,
            error: None,
        }
    }

    /// 画面を切り替え、選択と一時メッセージをリセットする。
    pub fn switch_to(&mut self, screen: Screen) {
        self.screen = screen;
        self.selected = 0;
        self.notice = None;
        self.error = None;
    }

    /// 選択を1行下げる（`len` 行の一覧内に収める）。
    pub fn select_next(&mut self, len: usize) {
        if self.selected + 1 < len {
            self.selected += 1;
        }
    }

    /// 選択を1行上げる。
    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// 通知とエラーを消す。
    pub fn clear_messages(&mut self) {
        self.notice = None;
        self.error = None;
    }
}
