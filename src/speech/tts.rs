//! Speech synthesis client.
//!
//! Speakable text is split into request-sized chunks, each chunk is sent to
//! an AllTalk-compatible server, and the returned WAV bytes are handed to the
//! PCM assembler.

use crate::error::Result;
use serde::Serialize;
use serde_json::Value;

/// Something that turns text into WAV bytes.
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` and return the bytes of a linear-PCM WAV file.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

/// A voice offered by the synthesis server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Voice {
    pub id: String,
    pub label: String,
}

/// Pack words greedily into chunks of at most `max_chars` characters.
///
/// Words are never split, so a single word longer than the limit becomes its
/// own chunk. Text within the limit is returned as one chunk.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            chunks.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Normalize the voice list formats servers reply with.
///
/// Accepts `{"voices": [...]}`, a bare array, or an object whose values are
/// voices. Each voice is a string or an object with one of
/// `id`/`name`/`voice`/`model` and an optional `display_name`.
pub fn normalize_voices(data: &Value) -> Vec<Voice> {
    let entries: Vec<&Value> = match data {
        Value::Object(map) => match map.get("voices") {
            Some(Value::Array(list)) => list.iter().collect(),
            _ => map.values().collect(),
        },
        Value::Array(list) => list.iter().collect(),
        _ => Vec::new(),
    };

    entries.into_iter().filter_map(voice_from_value).collect()
}

fn voice_from_value(value: &Value) -> Option<Voice> {
    match value {
        Value::String(s) if !s.is_empty() => Some(Voice {
            id: s.clone(),
            label: s.clone(),
        }),
        Value::Object(map) => {
            let field = |key: &str| {
                map.get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            };
            let id = field("id")
                .or_else(|| field("name"))
                .or_else(|| field("voice"))
                .or_else(|| field("model"))?;
            let label = field("display_name").or_else(|| field("name")).unwrap_or(id);
            Some(Voice {
                id: id.to_string(),
                label: label.to_string(),
            })
        }
        _ => None,
    }
}

/// Pick the audio location out of a generation reply.
pub fn audio_location(reply: &Value) -> Option<&str> {
    ["output_cache_url", "output_file_url", "audio_url"]
        .iter()
        .find_map(|key| reply.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

/// Resolve a possibly relative audio location against the server base URL.
pub fn resolve_url(base_url: &str, location: &str) -> String {
    if location.starts_with("http://") || location.starts_with("https://") {
        location.to_string()
    } else {
        format!("{}{}", base_url.trim_end_matches('/'), location)
    }
}

#[cfg(feature = "http")]
pub use http::AllTalkClient;

#[cfg(feature = "http")]
mod http {
    use super::{SpeechSynthesizer, Voice, audio_location, normalize_voices, resolve_url};
    use crate::config::SpeechConfig;
    use crate::defaults::TTS_OUTPUT_FILE_NAME;
    use crate::error::{HapticError, Result};
    use tracing::debug;

    /// Client for an AllTalk text-to-speech server.
    #[derive(Debug, Clone)]
    pub struct AllTalkClient {
        client: reqwest::Client,
        base_url: String,
        voice: String,
    }

    impl AllTalkClient {
        pub fn new(config: &SpeechConfig) -> Self {
            Self {
                client: reqwest::Client::new(),
                base_url: config.base_url.trim_end_matches('/').to_string(),
                voice: config.voice_model.clone(),
            }
        }

        pub fn base_url(&self) -> &str {
            &self.base_url
        }

        /// Fetch the voices the server offers.
        pub async fn list_voices(&self) -> Result<Vec<Voice>> {
            let url = format!("{}/api/voices", self.base_url);
            let text = self.get_text(&url).await?;
            let data: serde_json::Value =
                serde_json::from_str(&text).map_err(|e| HapticError::UpstreamRequest {
                    message: format!("Failed to parse voice list: {e}"),
                })?;
            Ok(normalize_voices(&data))
        }

        /// Whether the server answers the voice list endpoint.
        pub async fn check_status(&self) -> bool {
            let url = format!("{}/api/voices", self.base_url);
            self.get_text(&url).await.is_ok()
        }

        async fn get_text(&self, url: &str) -> Result<String> {
            let response = self.client.get(url).send().await.map_err(|e| {
                HapticError::UpstreamRequest {
                    message: format!("GET {url} failed: {e}"),
                }
            })?;

            if !response.status().is_success() {
                return Err(HapticError::UpstreamRequest {
                    message: format!("GET {url} returned status {}", response.status()),
                });
            }

            response
                .text()
                .await
                .map_err(|e| HapticError::UpstreamRequest {
                    message: format!("Failed to read response from {url}: {e}"),
                })
        }
    }

    #[async_trait::async_trait]
    impl SpeechSynthesizer for AllTalkClient {
        async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
            let url = format!("{}/api/tts-generate", self.base_url);
            let form = [
                ("text_input", text),
                ("character_voice_gen", self.voice.as_str()),
                ("output_file_name", TTS_OUTPUT_FILE_NAME),
                ("output_file_timestamp", "true"),
            ];

            let response = self
                .client
                .post(&url)
                .form(&form)
                .send()
                .await
                .map_err(|e| HapticError::UpstreamRequest {
                    message: format!("Speech generation request failed: {e}"),
                })?;

            if !response.status().is_success() {
                return Err(HapticError::UpstreamRequest {
                    message: format!("Speech generation returned status {}", response.status()),
                });
            }

            let body = response
                .text()
                .await
                .map_err(|e| HapticError::UpstreamRequest {
                    message: format!("Failed to read speech generation reply: {e}"),
                })?;
            let reply: serde_json::Value =
                serde_json::from_str(&body).map_err(|e| HapticError::UpstreamRequest {
                    message: format!("Failed to parse speech generation reply: {e}"),
                })?;

            let location = audio_location(&reply).ok_or_else(|| HapticError::UpstreamRequest {
                message: "Speech generation reply has no audio URL".to_string(),
            })?;
            let audio_url = resolve_url(&self.base_url, location);
            debug!("Fetching synthesized audio from {}", audio_url);

            let audio = self.client.get(&audio_url).send().await.map_err(|e| {
                HapticError::UpstreamRequest {
                    message: format!("Audio download failed: {e}"),
                }
            })?;
            if !audio.status().is_success() {
                return Err(HapticError::UpstreamRequest {
                    message: format!("Audio download returned status {}", audio.status()),
                });
            }

            let bytes = audio
                .bytes()
                .await
                .map_err(|e| HapticError::UpstreamRequest {
                    message: format!("Failed to read audio bytes: {e}"),
                })?;
            Ok(bytes.to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(chunk_text("hello world", 1500), vec!["hello world"]);
    }

    #[test]
    fn test_chunks_pack_words_up_to_limit() {
        let chunks = chunk_text("aaa bbb ccc dddd", 7);
        assert_eq!(chunks, vec!["aaa bbb", "ccc", "dddd"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 7));
    }

    #[test]
    fn test_long_word_is_its_own_chunk() {
        let chunks = chunk_text("a supercalifragilistic b", 5);
        assert_eq!(chunks, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_text("   ", 10).is_empty());
    }

    #[test]
    fn test_normalize_voices_wrapped_list() {
        let data = json!({"voices": ["female_01.wav", {"name": "male", "display_name": "Male"}]});
        let voices = normalize_voices(&data);
        assert_eq!(
            voices,
            vec![
                Voice {
                    id: "female_01.wav".into(),
                    label: "female_01.wav".into()
                },
                Voice {
                    id: "male".into(),
                    label: "Male".into()
                },
            ]
        );
    }

    #[test]
    fn test_normalize_voices_bare_array_and_object() {
        let voices = normalize_voices(&json!([{"voice": "v1"}, 42, {"other": 1}]));
        assert_eq!(voices.len(), 1);
        assert_eq!(voices[0].id, "v1");

        let voices = normalize_voices(&json!({"a": {"model": "m1"}, "b": "s2"}));
        let ids: Vec<_> = voices.iter().map(|v| v.id.as_str()).collect();
        assert!(ids.contains(&"m1"));
        assert!(ids.contains(&"s2"));
    }

    #[test]
    fn test_audio_location_prefers_cache_url() {
        let reply = json!({"output_file_url": "/b.wav", "output_cache_url": "/a.wav"});
        assert_eq!(audio_location(&reply), Some("/a.wav"));
        assert_eq!(audio_location(&json!({"audio_url": "/c.wav"})), Some("/c.wav"));
        assert_eq!(audio_location(&json!({"status": "ok"})), None);
    }

    #[test]
    fn test_resolve_url_handles_relative_and_absolute() {
        assert_eq!(
            resolve_url("http://localhost:7851/", "/audio/x.wav"),
            "http://localhost:7851/audio/x.wav"
        );
        assert_eq!(
            resolve_url("http://localhost:7851", "https://cdn/x.wav"),
            "https://cdn/x.wav"
        );
    }
}
