use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use anyhow::{Result, anyhow};

/// Launch configuration: where the backend lives and how often to poll it.
/// The optional HTTP Basic credentials are a stand-in, not a security
/// boundary; the backend decides what they mean.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_poll_secs() -> u64 {
    4
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: default_base_url(),
            poll_secs: default_poll_secs(),
            username: None,
            password: None,
        }
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn basic_auth(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        }
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("ajaxdash").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.base_url, "http://localhost:8000");
        assert_eq!(config.poll_secs, 4);
        assert!(config.basic_auth().is_none());
    }

    #[test]
    fn basic_auth_needs_both_halves() {
        let config: Config = serde_json::from_str(r#"{"username": "logan"}"#).unwrap();
        assert!(config.basic_auth().is_none());

        let config: Config =
            serde_json::from_str(r#"{"username": "logan", "password": "hunter2"}"#).unwrap();
        assert_eq!(
            config.basic_auth(),
            Some(("logan".to_string(), "hunter2".to_string()))
        );
    }
}
