//! Application settings: a `verba.toml` file overlaid with `VERBA_`-prefixed
//! environment variables (`VERBA_API_KEY` being the one everybody sets).

use serde::Deserialize;
use verba_foundation::AppError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// API key for the hosted inference service.
    pub api_key: String,
    /// Base URL for one-shot generation calls.
    pub http_endpoint: String,
    /// WebSocket URL for the bidirectional live session.
    pub ws_endpoint: String,
    pub chat_model: String,
    pub feedback_model: String,
    pub live_model: String,
    /// Voice identity for synthesized speech.
    pub voice: String,
    /// beginner | intermediate | advanced
    pub level: String,
    pub audio: AudioSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Name of the input device; the host default when unset.
    pub input_device: Option<String>,
    /// Samples per outbound block.
    pub block_samples: usize,
    /// Capture blocks the outbound queue holds before dropping the oldest.
    pub outbound_queue: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            http_endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            ws_endpoint: "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string(),
            chat_model: "gemini-3-flash-preview".to_string(),
            feedback_model: "gemini-3-pro-preview".to_string(),
            live_model: "models/gemini-2.5-flash-native-audio-preview-12-2025".to_string(),
            voice: "Zephyr".to_string(),
            level: "intermediate".to_string(),
            audio: AudioSettings::default(),
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            input_device: None,
            block_samples: verba_audio::BLOCK_SAMPLES,
            outbound_queue: 32,
        }
    }
}

impl Settings {
    pub fn load(path: Option<&str>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        builder = match path {
            Some(p) => builder.add_source(config::File::with_name(p)),
            None => builder.add_source(config::File::with_name("verba").required(false)),
        };
        builder = builder.add_source(
            config::Environment::with_prefix("VERBA").separator("__"),
        );

        let settings: Settings = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        Ok(settings)
    }

    pub fn require_api_key(&self) -> Result<(), AppError> {
        if self.api_key.is_empty() {
            return Err(AppError::Config(
                "No API key configured; set VERBA_API_KEY or api_key in verba.toml".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_usable_without_a_file() {
        let s = Settings::default();
        assert_eq!(s.audio.block_samples, 4096);
        assert_eq!(s.audio.outbound_queue, 32);
        assert!(s.require_api_key().is_err());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "api_key = \"k-123\"\nvoice = \"Puck\"\n[audio]\noutbound_queue = 8"
        )
        .unwrap();

        let s = Settings::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(s.api_key, "k-123");
        assert_eq!(s.voice, "Puck");
        assert_eq!(s.audio.outbound_queue, 8);
        // Untouched fields keep their defaults
        assert_eq!(s.level, "intermediate");
        assert!(s.require_api_key().is_ok());
    }
}
