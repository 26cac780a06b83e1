//! ショートカット設定の管理。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// ショートカット設定の全体（`shortcut.toml`）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shortcuts {
    pub home: HomeShortcuts,
    pub builder: BuilderShortcuts,
    pub saved: SavedShortcuts,
    pub detail: DetailShortcuts,
    pub settings: SettingsShortcuts,
    pub input_box: InputBoxShortcuts,
}

/// ホーム画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeShortcuts {
    pub quit: Vec<String>,
    pub enter: Vec<String>,
    pub down: Vec<String>,
    pub up: Vec<String>,
}

/// ウィザード画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuilderShortcuts {
    pub proceed: Vec<String>,
    pub back: Vec<String>,
    pub down: Vec<String>,
    pub up: Vec<String>,
    pub retry: Vec<String>,
    pub start_date: Vec<String>,
    pub end_date: Vec<String>,
    pub save: Vec<String>,
    pub name: Vec<String>,
    pub comment: Vec<String>,
}

/// 保存済み一覧のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedShortcuts {
    pub back: Vec<String>,
    pub open: Vec<String>,
    pub refresh: Vec<String>,
    pub down: Vec<String>,
    pub up: Vec<String>,
}

/// 詳細画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailShortcuts {
    pub back: Vec<String>,
    pub run: Vec<String>,
    pub comment: Vec<String>,
}

/// 設定画面のショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsShortcuts {
    pub cancel: Vec<String>,
    pub save: Vec<String>,
    pub base_url: Vec<String>,
    pub username: Vec<String>,
}

/// InputBoxのショートカット。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputBoxShortcuts {
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub backspace: Vec<String>,
    pub delete: Vec<String>,
    pub left: Vec<String>,
    pub right: Vec<String>,
    pub home: Vec<String>,
    pub end: Vec<String>,
    pub clear_line: Vec<String>,
}

impl Shortcuts {
    /// TOMLから読み込み、無ければデフォルトを返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let shortcuts: Shortcuts = toml::from_str(&content)?;
        for (name, keys) in shortcuts.all_bindings() {
            if let Some(bad) = keys.iter().find(|k| KeyBinding::parse(k).is_none()) {
                tracing::warn!("unrecognised shortcut for {name}: {bad}");
            }
        }
        Ok(shortcuts)
    }

    /// 検証用に全バインドを列挙する。
    fn all_bindings(&self) -> Vec<(&'static str, &[String])> {
        vec![
            ("home.quit", self.home.quit.as_slice()),
            ("home.enter", self.home.enter.as_slice()),
            ("builder.proceed", self.builder.proceed.as_slice()),
            ("builder.back", self.builder.back.as_slice()),
            ("builder.retry", self.builder.retry.as_slice()),
            ("builder.start_date", self.builder.start_date.as_slice()),
            ("builder.end_date", self.builder.end_date.as_slice()),
            ("builder.save", self.builder.save.as_slice()),
            ("builder.name", self.builder.name.as_slice()),
            ("builder.comment", self.builder.comment.as_slice()),
            ("saved.open", self.saved.open.as_slice()),
            ("saved.refresh", self.saved.refresh.as_slice()),
            ("detail.run", self.detail.run.as_slice()),
            ("detail.comment", self.detail.comment.as_slice()),
            ("settings.save", self.settings.save.as_slice()),
            ("settings.base_url", self.settings.base_url.as_slice()),
            ("settings.username", self.settings.username.as_slice()),
            ("input_box.confirm", self.input_box.confirm.as_slice()),
            ("input_box.clear_line", self.input_box.clear_line.as_slice()),
        ]
    }
}

fn keys(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for Shortcuts {
    fn default() -> Self {
        Self {
            home: HomeShortcuts {
                quit: keys(&["q"]),
                enter: keys(&["Enter"]),
                down: keys(&["Down", "j"]),
                up: keys(&["Up", "k"]),
            },
            builder: BuilderShortcuts {
                proceed: keys(&["Enter"]),
                back: keys(&["Esc"]),
                down: keys(&["Down", "j"]),
                up: keys(&["Up", "k"]),
                retry: keys(&["r"]),
                start_date: keys(&["d"]),
                end_date: keys(&["e"]),
                save: keys(&["s"]),
                name: keys(&["n"]),
                comment: keys(&["c"]),
            },
            saved: SavedShortcuts {
                back: keys(&["Esc"]),
                open: keys(&["Enter"]),
                refresh: keys(&["r"]),
                down: keys(&["Down", "j"]),
                up: keys(&["Up", "k"]),
            },
            detail: DetailShortcuts {
                back: keys(&["Esc"]),
                run: keys(&["x"]),
                comment: keys(&["c"]),
            },
            settings: SettingsShortcuts {
                cancel: keys(&["Esc"]),
                save: keys(&["Enter"]),
                base_url: keys(&["b"]),
                username: keys(&["u"]),
            },
            // 文字入力と衝突しないよう文字キーは割り当てない。
            input_box: InputBoxShortcuts {
                confirm: keys(&["Enter"]),
                cancel: keys(&["Esc"]),
                backspace: keys(&["Backspace"]),
                delete: keys(&["Delete"]),
                left: keys(&["Left"]),
                right: keys(&["Right"]),
                home: keys(&["Home"]),
                end: keys(&["End"]),
                clear_line: keys(&["Ctrl+u"]),
            },
        }
    }
}

/// 解析済みのキー指定（例: "Ctrl+u", "a", "Enter"）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    /// ショートカット文字列を解析する。未知の表記はNone。
    pub fn parse(s: &str) -> Option<Self> {
        let (mods, key) = match s.rsplit_once('+') {
            // "+" そのものは修飾なしの文字キー。
            Some((m, k)) if !k.is_empty() => (Some(m), k),
            _ => (None, s),
        };

        let mut modifiers = KeyModifiers::empty();
        for m in mods.into_iter().flat_map(|m| m.split('+')) {
            modifiers |= match m.to_ascii_lowercase().as_str() {
                "ctrl" => KeyModifiers::CONTROL,
                "alt" => KeyModifiers::ALT,
                "shift" => KeyModifiers::SHIFT,
                _ => return None,
            };
        }

        let code = match key.to_ascii_lowercase().as_str() {
            "enter" => KeyCode::Enter,
            "esc" => KeyCode::Esc,
            "tab" => KeyCode::Tab,
            "backspace" => KeyCode::Backspace,
            "delete" => KeyCode::Delete,
            "up" => KeyCode::Up,
            "down" => KeyCode::Down,
            "left" => KeyCode::Left,
            "right" => KeyCode::Right,
            "home" => KeyCode::Home,
            "end" => KeyCode::End,
            _ => {
                let mut chars = key.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => KeyCode::Char(c),
                    _ => return None,
                }
            }
        };
        Some(Self { code, modifiers })
    }

    pub fn matches(&self, key: &KeyEvent) -> bool {
        key.code == self.code && key.modifiers == self.modifiers
    }
}

/// KeyEventがいずれかのショートカット文字列と一致するか判定する。
pub fn matches_shortcut(key: &KeyEvent, shortcuts: &[String]) -> bool {
    shortcuts
        .iter()
        .filter_map(|s| KeyBinding::parse(s))
        .any(|b| b.matches(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_matches_shortcut_simple_char() {
        let k = key(KeyCode::Char('q'), KeyModifiers::empty());
        assert!(matches_shortcut(&k, &keys(&["q"])));
        assert!(!matches_shortcut(&k, &keys(&["w"])));
    }

    #[test]
    fn test_matches_shortcut_special_key_case_insensitive() {
        let k = key(KeyCode::Enter, KeyModifiers::empty());
        assert!(matches_shortcut(&k, &keys(&["Enter"])));
        assert!(matches_shortcut(&k, &keys(&["enter"])));
        assert!(!matches_shortcut(&k, &keys(&["Esc"])));
    }

    #[test]
    fn test_matches_shortcut_with_modifier() {
        let k = key(KeyCode::Char('u'), KeyModifiers::CONTROL);
        assert!(matches_shortcut(&k, &keys(&["Ctrl+u"])));
        assert!(!matches_shortcut(&k, &keys(&["u"])));
    }

    #[test]
    fn test_matches_shortcut_multiple_keys() {
        let list = keys(&["Up", "k"]);
        assert!(matches_shortcut(&key(KeyCode::Up, KeyModifiers::empty()), &list));
        assert!(matches_shortcut(
            &key(KeyCode::Char('k'), KeyModifiers::empty()),
            &list
        ));
        assert!(!matches_shortcut(
            &key(KeyCode::Char('j'), KeyModifiers::empty()),
            &list
        ));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(KeyBinding::parse("Hyper+x"), None);
        assert_eq!(KeyBinding::parse("PageUpish"), None);
        assert_eq!(
            KeyBinding::parse("+"),
            Some(KeyBinding {
                code: KeyCode::Char('+'),
                modifiers: KeyModifiers::empty()
            })
        );
        assert_eq!(
            KeyBinding::parse("Ctrl+Alt+x").map(|b| b.modifiers),
            Some(KeyModifiers::CONTROL | KeyModifiers::ALT)
        );
    }

    #[test]
    fn test_defaults_parse_and_roundtrip() {
        let d = Shortcuts::default();
        for (name, list) in d.all_bindings() {
            assert!(
                list.iter().all(|k| KeyBinding::parse(k).is_some()),
                "{name}"
            );
        }
        // 既定値をTOMLに書き出して読み戻せる。
        let s = toml::to_string_pretty(&d).unwrap();
        let back: Shortcuts = toml::from_str(&s).unwrap();
        assert_eq!(back.builder.retry, d.builder.retry);
    }
}
