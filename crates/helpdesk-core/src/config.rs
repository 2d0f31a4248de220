use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use crate::model::{CompanyId, UserId};

/// Directory holding the workspace configuration and database.
pub const WORKSPACE_DIR: &str = ".hdesk";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpdeskConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// The acting user and company rule evaluation runs as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_user_id")]
    pub user_id: UserId,
    #[serde(default)]
    pub company_id: Option<CompanyId>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            company_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// When false, scripted filter layers are skipped.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: Option<String>,
}

impl HelpdeskConfig {
    /// Database path, resolved against `root` when relative.
    #[must_use]
    pub fn database_path(&self, root: &Path) -> PathBuf {
        if self.database.path.is_absolute() {
            self.database.path.clone()
        } else {
            root.join(&self.database.path)
        }
    }
}

#[must_use]
pub fn config_path(root: &Path) -> PathBuf {
    root.join(WORKSPACE_DIR).join("config.toml")
}

/// Load `.hdesk/config.toml` under `root`, or defaults when it is absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(root: &Path) -> Result<HelpdeskConfig> {
    let path = config_path(root);
    if !path.exists() {
        return Ok(HelpdeskConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<HelpdeskConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write `config` to `.hdesk/config.toml` under `root`.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_config(root: &Path, config: &HelpdeskConfig) -> Result<PathBuf> {
    let path = config_path(root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Per-user preferences shared by every workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
}

/// Load `hdesk/config.toml` from the platform config directory.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };

    let path = config_dir.join("hdesk/config.toml");
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Output mode: `--json`, then `FORMAT`, then the workspace config, then the
/// user config, then TTY detection.
#[must_use]
pub fn resolve_output(cli_json: bool, config: &HelpdeskConfig, user: &UserConfig) -> String {
    let env_format = env::var("FORMAT").ok();
    let configured = config.output.format.as_deref().or(user.output.as_deref());
    resolve_output_from(
        cli_json,
        configured,
        env_format.as_deref(),
        std::io::stdout().is_terminal(),
    )
}

fn resolve_output_from(
    cli_json: bool,
    configured: Option<&str>,
    env_format: Option<&str>,
    is_tty: bool,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "table" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }
    if let Some(mode) = env_format.and_then(normalize_output_mode) {
        return mode.to_string();
    }
    if let Some(mode) = configured.and_then(normalize_output_mode) {
        return mode.to_string();
    }
    if is_tty { "pretty" } else { "text" }.to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_user_id() -> UserId {
    UserId(1)
}

fn default_database_path() -> PathBuf {
    PathBuf::from(WORKSPACE_DIR).join("helpdesk.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cfg = load_config(dir.path()).expect("load");
        assert!(cfg.scripts.enabled);
        assert_eq!(cfg.session.user_id, UserId(1));
        assert_eq!(cfg.database_path(dir.path()), dir.path().join(".hdesk/helpdesk.db"));
    }

    #[test]
    fn partial_config_keeps_other_defaults() {
        let cfg: HelpdeskConfig = toml::from_str(
            r"
[session]
company_id = 3

[scripts]
enabled = false
",
        )
        .expect("parse");
        assert_eq!(cfg.session.company_id, Some(CompanyId(3)));
        assert_eq!(cfg.session.user_id, UserId(1));
        assert!(!cfg.scripts.enabled);
        assert_eq!(cfg.database, DatabaseConfig::default());
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut cfg = HelpdeskConfig::default();
        cfg.output.format = Some("json".into());
        let path = write_config(dir.path(), &cfg).expect("write");
        assert!(path.ends_with(".hdesk/config.toml"));
        assert_eq!(load_config(dir.path()).expect("load"), cfg);
    }

    #[test]
    fn broken_config_names_the_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = config_path(dir.path());
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "[scripts\nenabled = ").expect("write");
        let err = load_config(dir.path()).expect_err("parse error");
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn user_config_parses_output() {
        let cfg: UserConfig = toml::from_str("output = \"json\"").expect("parse");
        assert_eq!(cfg.output.as_deref(), Some("json"));
    }

    #[test]
    fn output_precedence() {
        assert_eq!(resolve_output_from(true, Some("text"), Some("pretty"), true), "json");
        assert_eq!(resolve_output_from(false, Some("text"), Some("human"), false), "pretty");
        assert_eq!(resolve_output_from(false, Some("table"), None, true), "text");
        assert_eq!(resolve_output_from(false, Some("bogus"), None, true), "pretty");
        assert_eq!(resolve_output_from(false, None, None, false), "text");
    }
}
