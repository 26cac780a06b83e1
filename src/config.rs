//! Config model and persistence helpers.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Top-level configuration stored in `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where the query service lives.
    pub api: ApiCfg,
    /// Identity attached to saved queries and comments.
    pub user: UserCfg,
    /// Choices offered by the query builder.
    pub query: QueryCfg,
}

/// Query service connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiCfg {
    /// Base URL the endpoint paths are appended to.
    pub base_url: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// User profile values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCfg {
    /// Name recorded as the author of saved queries and comments.
    pub username: String,
}

/// Selectable values for the builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCfg {
    /// Country identifiers, shown in this order.
    pub countries: Vec<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load from disk or create defaults when missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = fs::read_to_string(path)?;
            Ok(toml::from_str(&s)?)
        } else {
            let cfg = Self::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    /// Persist the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = toml::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }

    /// A user name is required before anything can be saved.
    pub fn needs_setup(&self) -> bool {
        self.user.username.trim().is_empty() || self.api.base_url.trim().is_empty()
    }
}

impl Default for Config {
    /// Defaults point at a local development server.
    fn default() -> Self {
        Self {
            api: ApiCfg {
                base_url: "http://localhost:8000".into(),
                timeout_secs: default_timeout_secs(),
            },
            user: UserCfg {
                username: "".into(),
            },
            query: QueryCfg {
                countries: [
                    "Argentina",
                    "Australia",
                    "Brazil",
                    "Canada",
                    "Chile",
                    "Colombia",
                    "France",
                    "Germany",
                    "India",
                    "Italy",
                    "Japan",
                    "Mexico",
                    "Spain",
                    "United Kingdom",
                ]
                .into_iter()
                .map(String::from)
                .collect(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_defaults_when_missing() {
        let s = r#"
            [api]
            base_url = "http://trends.internal:8000"

            [user]
            username = "ana"

            [query]
            countries = ["Colombia", "Mexico"]
        "#;
        let cfg: Config = toml::from_str(s).unwrap();
        assert_eq!(cfg.api.timeout_secs, 30);
        assert_eq!(cfg.query.countries, vec!["Colombia", "Mexico"]);
        assert!(!cfg.needs_setup());
    }

    #[test]
    fn test_default_needs_setup() {
        // 初期状態ではユーザー名が空なので設定が必要。
        assert!(Config::default().needs_setup());
    }

    #[test]
    fn test_toml_roundtrip_preserves_values() {
        let mut cfg = Config::default();
        cfg.user.username = "ana".into();
        let s = toml::to_string_pretty(&cfg).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back, cfg);
    }
}
