use crate::defaults;
use crate::error::{HapticError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub actuator: ActuatorConfig,
    pub speech: SpeechConfig,
    pub random: RandomConfig,
}

/// Actuator server connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ActuatorConfig {
    pub server_address: String,
    pub client_name: String,
    pub reconnect_delay_ms: u64,
}

/// Speech synthesis, timing and playback configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub base_url: String,
    pub voice_model: String,
    pub chunk_char_limit: usize,
    pub silence_ms: u32,
    pub words_per_minute: f64,
    pub playback_speed: f64,
    pub output_volume: f64,
    pub message_debounce_ms: u64,
}

/// Ranges for `values:random` pattern generation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RandomConfig {
    pub min_values: u32,
    pub max_values: u32,
    pub min_duration: u32,
    pub max_duration: u32,
    pub min_intensity: f64,
    pub max_intensity: f64,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            server_address: defaults::SERVER_ADDRESS.to_string(),
            client_name: defaults::CLIENT_NAME.to_string(),
            reconnect_delay_ms: defaults::RECONNECT_DELAY_MS,
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::TTS_BASE_URL.to_string(),
            voice_model: String::new(),
            chunk_char_limit: defaults::TTS_CHUNK_CHAR_LIMIT,
            silence_ms: defaults::LEAD_SILENCE_MS,
            words_per_minute: defaults::WORDS_PER_MINUTE,
            playback_speed: 1.0,
            output_volume: 1.0,
            message_debounce_ms: defaults::MESSAGE_DEBOUNCE_MS,
        }
    }
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self {
            min_values: defaults::RANDOM_MIN_VALUES,
            max_values: defaults::RANDOM_MAX_VALUES,
            min_duration: defaults::RANDOM_MIN_DURATION,
            max_duration: defaults::RANDOM_MAX_DURATION,
            min_intensity: defaults::RANDOM_MIN_INTENSITY,
            max_intensity: defaults::RANDOM_MAX_INTENSITY,
        }
    }
}

impl RandomConfig {
    /// Inclusive range for the number of generated intensities (at least 1).
    pub fn value_count_range(&self) -> (u32, u32) {
        let min = self.min_values.max(1);
        (min, self.max_values.max(min))
    }

    /// Inclusive range for the generated duration in seconds (at least 1).
    pub fn duration_range(&self) -> (u32, u32) {
        let min = self.min_duration.max(1);
        (min, self.max_duration.max(min))
    }

    /// Intensity range clamped to [0, 1] with `min <= max`.
    pub fn intensity_range(&self) -> (f64, f64) {
        let min = clamp_unit(self.min_intensity);
        (min, clamp_unit(self.max_intensity).max(min))
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Only a missing file falls back to defaults; invalid TOML is an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - HAPTICSYNC_SERVER → actuator.server_address
    /// - HAPTICSYNC_TTS_URL → speech.base_url
    /// - HAPTICSYNC_VOICE → speech.voice_model
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(server) = std::env::var("HAPTICSYNC_SERVER")
            && !server.is_empty()
        {
            self.actuator.server_address = server;
        }

        if let Ok(url) = std::env::var("HAPTICSYNC_TTS_URL")
            && !url.is_empty()
        {
            self.speech.base_url = url;
        }

        if let Ok(voice) = std::env::var("HAPTICSYNC_VOICE")
            && !voice.is_empty()
        {
            self.speech.voice_model = voice;
        }

        self
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.speech.words_per_minute.is_finite() && self.speech.words_per_minute > 0.0) {
            return Err(invalid("speech.words_per_minute", "must be a positive number"));
        }
        if self.speech.chunk_char_limit == 0 {
            return Err(invalid("speech.chunk_char_limit", "must be at least 1"));
        }
        if !(self.speech.playback_speed.is_finite() && self.speech.playback_speed > 0.0) {
            return Err(invalid("speech.playback_speed", "must be a positive number"));
        }
        if !self.actuator.server_address.starts_with("ws://")
            && !self.actuator.server_address.starts_with("wss://")
        {
            return Err(invalid(
                "actuator.server_address",
                "must be a ws:// or wss:// URL",
            ));
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/hapticsync/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hapticsync")
            .join("config.toml")
    }
}

fn invalid(key: &str, message: &str) -> HapticError {
    HapticError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_hapticsync_env() {
        remove_env("HAPTICSYNC_SERVER");
        remove_env("HAPTICSYNC_TTS_URL");
        remove_env("HAPTICSYNC_VOICE");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.actuator.server_address, "ws://localhost:12345");
        assert_eq!(config.actuator.reconnect_delay_ms, 2000);

        assert_eq!(config.speech.base_url, "http://localhost:7851");
        assert_eq!(config.speech.voice_model, "");
        assert_eq!(config.speech.chunk_char_limit, 1500);
        assert_eq!(config.speech.silence_ms, 180);
        assert_eq!(config.speech.words_per_minute, 180.0);
        assert_eq!(config.speech.message_debounce_ms, 300);

        assert_eq!(config.random.min_values, 4);
        assert_eq!(config.random.max_values, 10);
        assert_eq!(config.random.min_duration, 1);
        assert_eq!(config.random.max_duration, 15);
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [actuator]
            server_address = "ws://10.0.0.2:12345"
            client_name = "test-client"
            reconnect_delay_ms = 500

            [speech]
            base_url = "http://tts.local:7851"
            voice_model = "female_01.wav"
            silence_ms = 250
            words_per_minute = 150.0

            [random]
            min_values = 2
            max_values = 3
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.actuator.server_address, "ws://10.0.0.2:12345");
        assert_eq!(config.actuator.client_name, "test-client");
        assert_eq!(config.actuator.reconnect_delay_ms, 500);
        assert_eq!(config.speech.base_url, "http://tts.local:7851");
        assert_eq!(config.speech.voice_model, "female_01.wav");
        assert_eq!(config.speech.silence_ms, 250);
        assert_eq!(config.speech.words_per_minute, 150.0);
        assert_eq!(config.random.min_values, 2);
        assert_eq!(config.random.max_values, 3);

        // Untouched fields keep their defaults
        assert_eq!(config.speech.chunk_char_limit, 1500);
        assert_eq!(config.random.max_duration, 15);
    }

    #[test]
    fn test_env_override_server() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_hapticsync_env();

        set_env("HAPTICSYNC_SERVER", "ws://remote:12345");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.actuator.server_address, "ws://remote:12345");
        assert_eq!(config.speech.base_url, "http://localhost:7851");

        clear_hapticsync_env();
    }

    #[test]
    fn test_env_override_all() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_hapticsync_env();

        set_env("HAPTICSYNC_SERVER", "ws://a:1");
        set_env("HAPTICSYNC_TTS_URL", "http://b:2");
        set_env("HAPTICSYNC_VOICE", "narrator");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.actuator.server_address, "ws://a:1");
        assert_eq!(config.speech.base_url, "http://b:2");
        assert_eq!(config.speech.voice_model, "narrator");

        clear_hapticsync_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_hapticsync_env();

        set_env("HAPTICSYNC_VOICE", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.speech.voice_model, "");

        clear_hapticsync_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[speech\nbase_url = \"broken").unwrap();

        assert!(Config::load(temp_file.path()).is_err());
        assert!(Config::load_or_default(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_hapticsync_config_12345.toml");
        let config = Config::load_or_default(missing_path).unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_default_path_ends_with_config_toml() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains("hapticsync"));
        assert!(path_str.ends_with("config.toml"));
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_wpm() {
        let mut config = Config::default();
        config.speech.words_per_minute = 0.0;

        match config.validate() {
            Err(HapticError::ConfigInvalidValue { key, .. }) => {
                assert_eq!(key, "speech.words_per_minute");
            }
            other => panic!("Expected ConfigInvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_http_server_address() {
        let mut config = Config::default();
        config.actuator.server_address = "http://localhost:12345".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_random_ranges_are_normalized() {
        let random = RandomConfig {
            min_values: 0,
            max_values: 0,
            min_duration: 5,
            max_duration: 2,
            min_intensity: -0.5,
            max_intensity: 3.0,
        };

        assert_eq!(random.value_count_range(), (1, 1));
        assert_eq!(random.duration_range(), (5, 5));
        assert_eq!(random.intensity_range(), (0.0, 1.0));
    }
}
