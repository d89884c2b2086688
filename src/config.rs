use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{BlitzChatError, Result};

pub const DEFAULT_ENDPOINT: &str = "https://llm.chutes.ai/v1";
pub const DEFAULT_MODEL: &str = "chutesai/Mistral-Small-24B-Instruct-2501";
pub const DEFAULT_TEMPERATURE: f32 = 1.0;

/// User settings, persisted as a JSON file. Every field is optional on
/// disk; accessors fill in the defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub instructions: Option<String>,
    pub memory_enabled: Option<bool>,
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        if !path.as_ref().exists() {
            return Ok(Self::default());
        }
        let content =
            fs::read_to_string(path.as_ref()).map_err(|e| BlitzChatError::Config(e.to_string()))?;
        let settings: Settings =
            serde_json::from_str(&content).map_err(|e| BlitzChatError::Config(e.to_string()))?;
        Ok(settings)
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).map_err(|e| BlitzChatError::Config(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| BlitzChatError::Serialization(e.to_string()))?;
        fs::write(path.as_ref(), content).map_err(|e| BlitzChatError::Config(e.to_string()))?;
        Ok(())
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn memory_enabled(&self) -> bool {
        self.memory_enabled.unwrap_or(false)
    }

    /// Sets one key by name, as the CLI `config set` command does. `None`
    /// clears the stored value back to the default.
    pub fn set(&mut self, key: &str, value: Option<&str>) -> Result<()> {
        match key {
            "endpoint" => self.endpoint = value.map(str::to_string),
            "api_key" => self.api_key = value.map(str::to_string),
            "model" => self.model = value.map(str::to_string),
            "temperature" => {
                self.temperature = match value {
                    Some(raw) => Some(
                        raw.parse::<f32>()
                            .map_err(|e| BlitzChatError::Config(e.to_string()))?,
                    ),
                    None => None,
                }
            }
            "instructions" => self.instructions = value.map(str::to_string),
            "memory_enabled" => {
                self.memory_enabled = match value {
                    Some(raw) => Some(
                        raw.parse::<bool>()
                            .map_err(|e| BlitzChatError::Config(e.to_string()))?,
                    ),
                    None => None,
                }
            }
            other => {
                return Err(BlitzChatError::Config(format!(
                    "unknown settings key: {other}"
                )))
            }
        }
        Ok(())
    }

    /// Copy safe to print: the API key is masked.
    pub fn redacted(&self) -> Settings {
        let mut copy = self.clone();
        if copy.api_key.is_some() {
            copy.api_key = Some("***".to_string());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let settings = Settings::default();
        assert_eq!(settings.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(settings.model(), DEFAULT_MODEL);
        assert_eq!(settings.temperature(), DEFAULT_TEMPERATURE);
        assert!(!settings.memory_enabled());
        assert!(settings.api_key().is_none());
    }

    #[test]
    fn set_parses_typed_keys() {
        let mut settings = Settings::default();
        settings.set("temperature", Some("0.7")).unwrap();
        settings.set("memory_enabled", Some("true")).unwrap();
        settings.set("model", Some("openai/gpt-oss-20b")).unwrap();
        assert_eq!(settings.temperature(), 0.7);
        assert!(settings.memory_enabled());
        assert_eq!(settings.model(), "openai/gpt-oss-20b");

        settings.set("temperature", None).unwrap();
        assert_eq!(settings.temperature(), DEFAULT_TEMPERATURE);

        assert!(settings.set("temperature", Some("warm")).is_err());
        assert!(settings.set("unknown", Some("x")).is_err());
    }

    #[test]
    fn redacted_masks_api_key() {
        let mut settings = Settings::default();
        settings.set("api_key", Some("sk-secret")).unwrap();
        assert_eq!(settings.redacted().api_key.as_deref(), Some("***"));
    }
}
