use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Default for Theme {
    fn default() -> Self {
        Theme::Light
    }
}

impl Theme {
    pub fn toggled(self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

/// Durable UI preferences. Last-write-wins on this single client; no
/// expiry, no schema versioning.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Prefs {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub open_project: Option<String>,
    #[serde(default)]
    pub logged_in: bool,
    #[serde(default)]
    pub linked_accounts: Vec<String>,
}

impl Prefs {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::prefs_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let prefs: Prefs = serde_json::from_str(&content)?;
        Ok(prefs)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::prefs_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Record a connected platform. Returns false when it was already
    /// linked (the set semantics of the linked-accounts list).
    pub fn link_account(&mut self, platform: &str) -> bool {
        if self.linked_accounts.iter().any(|p| p == platform) {
            return false;
        }
        self.linked_accounts.push(platform.to_string());
        true
    }

    fn prefs_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("ajaxdash").join("prefs.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Prefs::load_from(&dir.path().join("prefs.json")).unwrap();
        assert_eq!(prefs.theme, Theme::Light);
        assert!(prefs.open_project.is_none());
        assert!(!prefs.logged_in);
        assert!(prefs.linked_accounts.is_empty());
    }

    #[test]
    fn theme_toggle_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut prefs = Prefs::default();
        prefs.theme = prefs.theme.toggled();
        prefs.open_project = Some("remote100k".to_string());
        prefs.save_to(&path).unwrap();

        let reloaded = Prefs::load_from(&path).unwrap();
        assert_eq!(reloaded.theme, Theme::Dark);
        assert_eq!(reloaded.open_project.as_deref(), Some("remote100k"));
    }

    #[test]
    fn link_account_is_a_set() {
        let mut prefs = Prefs::default();
        assert!(prefs.link_account("TikTok"));
        assert!(!prefs.link_account("TikTok"));
        assert!(prefs.link_account("Gmail"));
        assert_eq!(prefs.linked_accounts, vec!["TikTok", "Gmail"]);
    }

    #[test]
    fn partial_documents_fill_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, r#"{"theme": "dark"}"#).unwrap();
        let prefs = Prefs::load_from(&path).unwrap();
        assert_eq!(prefs.theme, Theme::Dark);
        assert!(!prefs.logged_in);
    }
}
