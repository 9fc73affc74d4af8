//! Speech: timing estimates and synthesis.

pub mod estimator;
pub mod tts;

pub use estimator::{SpeechEstimate, estimate};
#[cfg(feature = "http")]
pub use tts::AllTalkClient;
pub use tts::{SpeechSynthesizer, Voice, chunk_text};
