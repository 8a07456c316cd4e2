//! deskhand configuration loader.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeskhandConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneralConfig {
    /// Sender id allowed to approve/cancel pending tasks. Unset means any
    /// authenticated sender may decide.
    #[serde(default)]
    pub admin_sender: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Chat-completions base URL; defaults to the OpenAI endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: None,
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    /// Shared registration secret (compatibility scheme, see auth.rs).
    #[serde(default)]
    pub shared_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            screenshot_dir: default_screenshot_dir(),
        }
    }
}

impl DeskhandConfig {
    pub async fn load(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path, true),
            None => (default_config_path(), false),
        };

        let mut cfg = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Self::from_toml_str(&contents)
                .map_err(|e| anyhow::anyhow!("parse config {}: {e}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                tracing::info!(path = %path.display(), "no config file; using defaults");
                Self::default()
            }
            Err(e) => return Err(anyhow::anyhow!("read config {}: {e}", path.display())),
        };

        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("DESKHAND_MODEL") {
            if !v.trim().is_empty() {
                self.model.model = v;
            }
        }
        if let Ok(v) = std::env::var("DESKHAND_MODEL_API_KEY") {
            if !v.trim().is_empty() {
                self.model.api_key = Some(v);
            }
        }
        if let Ok(v) = std::env::var("DESKHAND_MODEL_BASE_URL") {
            if !v.trim().is_empty() {
                self.model.base_url = Some(v);
            }
        }
        if let Ok(v) = std::env::var("DESKHAND_ADMIN_SENDER") {
            if !v.trim().is_empty() {
                self.general.admin_sender = Some(v);
            }
        }
        if let Ok(v) = std::env::var("DESKHAND_SHARED_SECRET") {
            if !v.trim().is_empty() {
                self.security.shared_secret = v;
            }
        }
        if let Ok(v) = std::env::var("DESKHAND_DATA_DIR") {
            if !v.trim().is_empty() {
                self.storage.data_dir = PathBuf::from(v);
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.security.shared_secret.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "security.shared_secret is required (or set DESKHAND_SHARED_SECRET)"
            ));
        }
        if self.model.api_key.is_some() && self.model.model.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "model.model is required when model.api_key is set"
            ));
        }
        Ok(())
    }
}

pub fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".deskhand").join("config.toml")
}

pub fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".deskhand").join("data")
}

fn default_screenshot_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".deskhand").join("screenshots")
}

pub const CONFIG_TEMPLATE: &str = r#"# deskhand configuration

[general]
# Sender id allowed to approve or cancel pending tasks.
# Leave unset to let any authenticated sender decide.
# admin_sender = "123456789"

[model]
# Chat-completions credentials for the model-backed interpreter.
# Without a key, the deterministic rule interpreter is used alone.
# api_key = "sk-..."
model = "gpt-4o-mini"
# base_url = "https://api.openai.com/v1"

[security]
# Shared registration secret for operators.
shared_secret = "change-me"

[storage]
# data_dir = "~/.deskhand/data"
# screenshot_dir = "~/.deskhand/screenshots"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_parses_with_defaults() {
        let cfg = DeskhandConfig::from_toml_str(
            r#"
[security]
shared_secret = "sesame"
"#,
        )
        .unwrap();
        assert!(cfg.general.admin_sender.is_none());
        assert!(cfg.model.api_key.is_none());
        assert_eq!(cfg.model.model, "gpt-4o-mini");
        cfg.validate().unwrap();
    }

    #[test]
    fn missing_shared_secret_fails_validation() {
        let cfg = DeskhandConfig::default();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn template_is_valid_toml() {
        DeskhandConfig::from_toml_str(CONFIG_TEMPLATE).unwrap();
    }
}
