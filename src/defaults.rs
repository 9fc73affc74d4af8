//! Default configuration constants for hapticsync.
//!
//! Shared by the configuration types and the components that fall back to
//! them when a value is missing or unusable.

/// Actuator server WebSocket address.
pub const SERVER_ADDRESS: &str = "ws://localhost:12345";

/// Client name announced in `RequestServerInfo`.
pub const CLIENT_NAME: &str = "hapticsync";

/// Actuator protocol message version spoken by the session.
pub const MESSAGE_VERSION: u32 = 3;

/// Delay before reconnecting after the actuator connection drops.
pub const RECONNECT_DELAY_MS: u64 = 2000;

/// Speech synthesis server base URL.
pub const TTS_BASE_URL: &str = "http://localhost:7851";

/// Longest text submitted to the speech synthesis server in one request.
pub const TTS_CHUNK_CHAR_LIMIT: usize = 1500;

/// Output file name hint sent with every synthesis request.
pub const TTS_OUTPUT_FILE_NAME: &str = "hapticsync_output";

/// Silence prepended to the combined audio.
///
/// Keeps players from clipping the first syllable of the first fragment.
pub const LEAD_SILENCE_MS: u32 = 180;

/// Speaking rate assumed by the timing estimator.
pub const WORDS_PER_MINUTE: f64 = 180.0;

/// Quiet period after the last assistant message before speech is generated.
pub const MESSAGE_DEBOUNCE_MS: u64 = 300;

/// Play-head update interval of the playback clock.
pub const PLAYBACK_TICK_MS: u64 = 50;

/// Duration used by `pattern:custom` when none was given.
pub const PATTERN_DURATION_SECS: f64 = 1.0;

// Procedural `values:random` ranges.
pub const RANDOM_MIN_VALUES: u32 = 4;
pub const RANDOM_MAX_VALUES: u32 = 10;
pub const RANDOM_MIN_DURATION: u32 = 1;
pub const RANDOM_MAX_DURATION: u32 = 15;
pub const RANDOM_MIN_INTENSITY: f64 = 0.1;
pub const RANDOM_MAX_INTENSITY: f64 = 1.0;
