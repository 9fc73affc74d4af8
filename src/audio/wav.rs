//! Linear-PCM WAV containers: parsing, combining and encoding.
//!
//! Speech synthesis returns one WAV file per text chunk. The fragments are
//! parsed, checked against the first fragment's format, and stitched into a
//! single container behind a short lead-in silence.

use crate::error::{HapticError, Result};
use std::io::{Cursor, Read};
use tracing::warn;

/// Decoded 16-bit linear-PCM audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmContainer {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Interleaved samples.
    pub samples: Vec<i16>,
}

impl PcmContainer {
    /// Empty container with the given format.
    pub fn empty(channels: u16, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
            bits_per_sample: 16,
            samples: Vec::new(),
        }
    }

    /// Whether `other` can be appended to `self` without conversion.
    pub fn same_format(&self, other: &PcmContainer) -> bool {
        self.channels == other.channels
            && self.sample_rate == other.sample_rate
            && self.bits_per_sample == other.bits_per_sample
    }

    /// Playback length in seconds.
    pub fn duration_secs(&self) -> f64 {
        let per_second = f64::from(self.sample_rate) * f64::from(self.channels.max(1));
        if per_second > 0.0 {
            self.samples.len() as f64 / per_second
        } else {
            0.0
        }
    }

    /// Scale every sample by `gain`, saturating at the i16 range.
    pub fn apply_gain(&mut self, gain: f64) {
        if (gain - 1.0).abs() < f64::EPSILON {
            return;
        }
        let gain = gain.clamp(0.0, 1.0);
        for sample in &mut self.samples {
            *sample = (f64::from(*sample) * gain).round() as i16;
        }
    }

    /// Encode as a canonical WAV file.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(write_error)?;
        for &sample in &self.samples {
            writer.write_sample(sample).map_err(write_error)?;
        }
        writer.finalize().map_err(write_error)?;
        Ok(cursor.into_inner())
    }

    /// Write as a WAV file at `path`.
    pub fn write_to(&self, path: &std::path::Path) -> Result<()> {
        std::fs::write(path, self.to_wav_bytes()?)?;
        Ok(())
    }
}

fn write_error(e: hound::Error) -> HapticError {
    match e {
        hound::Error::IoError(io) => HapticError::Io(io),
        other => HapticError::AudioFormat {
            message: format!("Failed to encode WAV: {}", other),
        },
    }
}

/// Parse WAV bytes into a [`PcmContainer`].
///
/// Only 16-bit integer PCM is accepted. Any other encoding fails with
/// [`HapticError::UnsupportedFormat`]; a truncated or garbled file fails with
/// [`HapticError::AudioFormat`].
pub fn parse_container(bytes: &[u8]) -> Result<PcmContainer> {
    from_reader(Cursor::new(bytes))
}

/// Parse a WAV file from any reader.
pub fn from_reader<R: Read>(reader: R) -> Result<PcmContainer> {
    let mut wav_reader = hound::WavReader::new(reader).map_err(|e| match e {
        hound::Error::Unsupported => HapticError::UnsupportedFormat {
            message: "audio encoding is not linear PCM".to_string(),
        },
        other => HapticError::AudioFormat {
            message: format!("Failed to parse WAV file: {}", other),
        },
    })?;

    let spec = wav_reader.spec();
    if spec.sample_format != hound::SampleFormat::Int {
        return Err(HapticError::UnsupportedFormat {
            message: "floating point samples are not linear PCM".to_string(),
        });
    }
    if spec.bits_per_sample != 16 {
        return Err(HapticError::UnsupportedFormat {
            message: format!("{}-bit samples are not supported", spec.bits_per_sample),
        });
    }

    let samples = wav_reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| HapticError::AudioFormat {
            message: format!("Failed to read WAV samples: {}", e),
        })?;

    Ok(PcmContainer {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        samples,
    })
}

/// Number of silent samples for `lead_silence_ms` at the container's format.
///
/// The silence is `floor(rate * ms / 1000)` frames. Each frame holds one
/// sample per channel, so interleaved channels stay aligned and mono output
/// gets exactly that many samples.
pub fn silence_samples(sample_rate: u32, channels: u16, lead_silence_ms: u32) -> usize {
    let frames = u64::from(sample_rate) * u64::from(lead_silence_ms) / 1000;
    frames as usize * usize::from(channels.max(1))
}

/// Concatenate fragments behind `lead_silence_ms` of silence.
///
/// The first fragment fixes the output format; later fragments with a
/// different format are skipped with a warning. Returns `None` when there are
/// no fragments.
pub fn combine(fragments: &[PcmContainer], lead_silence_ms: u32) -> Option<PcmContainer> {
    let first = fragments.first()?;
    let silence = silence_samples(first.sample_rate, first.channels, lead_silence_ms);

    let compatible: Vec<&PcmContainer> = fragments
        .iter()
        .enumerate()
        .filter_map(|(i, fragment)| {
            if first.same_format(fragment) {
                Some(fragment)
            } else {
                warn!(
                    "Skipping audio fragment {}: {} ch @ {} Hz / {} bit does not match {} ch @ {} Hz / {} bit",
                    i,
                    fragment.channels,
                    fragment.sample_rate,
                    fragment.bits_per_sample,
                    first.channels,
                    first.sample_rate,
                    first.bits_per_sample
                );
                None
            }
        })
        .collect();

    let total = silence + compatible.iter().map(|f| f.samples.len()).sum::<usize>();
    let mut samples = Vec::with_capacity(total);
    samples.resize(silence, 0);
    for fragment in compatible {
        samples.extend_from_slice(&fragment.samples);
    }

    Some(PcmContainer {
        channels: first.channels,
        sample_rate: first.sample_rate,
        bits_per_sample: first.bits_per_sample,
        samples,
    })
}
