//! Configuration reading and data directory paths.

pub mod paths;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use paths::get_data_dir;

pub const DEFAULT_CHAT_MODEL: &str = "llama3-70b-8192";
pub const DEFAULT_CONTENT_MODEL: &str = "llama3-8b-8192";
pub const DEFAULT_SEARCH_RESULTS: usize = 5;

/// assistant_config.json shape (written by the frontend settings panel).
///
/// Every field is optional on disk; accessors below supply the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub assistant_name: Option<String>,
    #[serde(default)]
    pub input_language: Option<String>,
    #[serde(default)]
    pub assistant_voice: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default)]
    pub groq_base_url: Option<String>,
    #[serde(default)]
    pub huggingface_api_key: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub chat_model: Option<String>,
    #[serde(default)]
    pub decision_model: Option<String>,
    #[serde(default)]
    pub content_model: Option<String>,
    #[serde(default)]
    pub search_results: Option<usize>,
    #[serde(default)]
    pub stt_adapter: Option<String>,
    #[serde(default)]
    pub stt_endpoint: Option<String>,
    #[serde(default)]
    pub tts_adapter: Option<String>,
    #[serde(default)]
    pub tts_volume: Option<f32>,
    #[serde(default)]
    pub input_device: Option<String>,
}

impl AssistantConfig {
    pub fn user_name(&self) -> &str {
        self.user_name.as_deref().unwrap_or("User")
    }

    pub fn assistant_name(&self) -> &str {
        self.assistant_name.as_deref().unwrap_or("Jarvis")
    }

    pub fn chat_model(&self) -> &str {
        self.chat_model.as_deref().unwrap_or(DEFAULT_CHAT_MODEL)
    }

    /// The classifier shares the chat model unless configured separately.
    pub fn decision_model(&self) -> &str {
        self.decision_model.as_deref().unwrap_or_else(|| self.chat_model())
    }

    pub fn content_model(&self) -> &str {
        self.content_model.as_deref().unwrap_or(DEFAULT_CONTENT_MODEL)
    }

    pub fn search_results(&self) -> usize {
        self.search_results.unwrap_or(DEFAULT_SEARCH_RESULTS).max(1)
    }

    pub fn tts_volume(&self) -> f32 {
        self.tts_volume.unwrap_or(1.0)
    }

    /// Apply `.env`-style overrides. `lookup` returns the value for a key.
    ///
    /// Accepts the historical key names (`Username`, `GroqAPIKey`, ...)
    /// alongside conventional upper-case ones.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(*k))
                .find(|v| !v.trim().is_empty())
        };

        if let Some(v) = pick(&["Username", "ASSISTANT_USER_NAME"]) {
            self.user_name = Some(v);
        }
        if let Some(v) = pick(&["Assistantname", "ASSISTANT_NAME"]) {
            self.assistant_name = Some(v);
        }
        if let Some(v) = pick(&["InputLanguage", "ASSISTANT_INPUT_LANGUAGE"]) {
            self.input_language = Some(v);
        }
        if let Some(v) = pick(&["AssistantVoice", "ASSISTANT_VOICE"]) {
            self.assistant_voice = Some(v);
        }
        if let Some(v) = pick(&["GroqAPIKey", "GROQ_API_KEY"]) {
            self.groq_api_key = Some(v);
        }
        if let Some(v) = pick(&["HuggingFaceAPIKey", "HUGGINGFACE_API_KEY", "HF_TOKEN"]) {
            self.huggingface_api_key = Some(v);
        }
        if let Some(v) = pick(&["OPENAI_API_KEY"]) {
            self.openai_api_key = Some(v);
        }
    }
}

/// Read assistant_config.json from the data directory, then layer `.env`
/// and process environment overrides on top.
pub fn read_assistant_config() -> AssistantConfig {
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "Loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Failed to load .env: {}", e),
    }

    let mut config: AssistantConfig = read_json_file(&get_config_path()).unwrap_or_default();
    config.apply_overrides(|key| std::env::var(key).ok());
    config
}

/// Path to assistant_config.json.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("assistant_config.json")
}

/// Generic helper: read a JSON file and deserialize it.
pub fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(val) => Some(val),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to read {}: {}", path.display(), e);
            }
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let cfg = AssistantConfig::default();
        assert_eq!(cfg.user_name(), "User");
        assert_eq!(cfg.assistant_name(), "Jarvis");
        assert_eq!(cfg.chat_model(), DEFAULT_CHAT_MODEL);
        assert_eq!(cfg.decision_model(), DEFAULT_CHAT_MODEL);
        assert_eq!(cfg.content_model(), DEFAULT_CONTENT_MODEL);
        assert_eq!(cfg.search_results(), 5);
    }

    #[test]
    fn test_camel_case_file_shape() {
        let cfg: AssistantConfig = serde_json::from_str(
            r#"{"userName": "Ada", "groqApiKey": "gsk_x", "searchResults": 3}"#,
        )
        .unwrap();
        assert_eq!(cfg.user_name(), "Ada");
        assert_eq!(cfg.groq_api_key.as_deref(), Some("gsk_x"));
        assert_eq!(cfg.search_results(), 3);
    }

    #[test]
    fn test_legacy_env_keys_override() {
        let env: HashMap<&str, &str> = [
            ("Username", "Grace"),
            ("Assistantname", "Friday"),
            ("GroqAPIKey", "gsk_env"),
            ("HuggingFaceAPIKey", ""),
        ]
        .into_iter()
        .collect();

        let mut cfg = AssistantConfig {
            huggingface_api_key: Some("hf_file".into()),
            ..Default::default()
        };
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.user_name(), "Grace");
        assert_eq!(cfg.assistant_name(), "Friday");
        assert_eq!(cfg.groq_api_key.as_deref(), Some("gsk_env"));
        // Blank values do not clobber the file setting.
        assert_eq!(cfg.huggingface_api_key.as_deref(), Some("hf_file"));
    }

    #[test]
    fn test_read_json_file_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let missing: Option<AssistantConfig> = read_json_file(&dir.path().join("nope.json"));
        assert!(missing.is_none());

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        let corrupt: Option<AssistantConfig> = read_json_file(&bad);
        assert!(corrupt.is_none());
    }
}
