pub mod playback;
pub mod wav;

pub use playback::{PlaybackClock, PlaybackState, PlaybackStatus};
pub use wav::{PcmContainer, combine, parse_container};
