//! Application entry points behind the CLI subcommands.
//!
//! Each `run_*` function owns one subcommand: it builds what it needs from the
//! configuration, does its work and tears everything down before returning.

use crate::actuator::{ActuatorSession, SelectedDevice};
use crate::audio::{PcmContainer, combine};
use crate::audio::wav::from_reader;
use crate::config::Config;
use crate::directive::{DirectiveParser, speakable};
use crate::error::{HapticError, Result};
use crate::pipeline::{AssistantMessage, LogNotifier, Notifier, SessionContext};
use crate::speech::{AllTalkClient, SpeechSynthesizer, estimate};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt};
use tracing::{info, warn};

/// How long `speak` and `listen` wait for a device before starting anyway.
const DEVICE_WAIT: Duration = Duration::from_secs(3);
const DEVICE_POLL: Duration = Duration::from_millis(100);

/// Directives in `text` as pretty JSON.
pub fn format_directives(text: &str, parser: &DirectiveParser) -> Result<String> {
    Ok(serde_json::to_string_pretty(&parser.extract(text))?)
}

#[derive(Debug, Serialize)]
struct WordTiming<'a> {
    word: &'a str,
    onset: f64,
    duration: f64,
}

/// Estimated onsets of the speakable words of `text`, one per line.
pub fn format_estimate(text: &str, words_per_minute: f64) -> String {
    let speakable = speakable(text);
    let estimate = estimate(&speakable.text, words_per_minute);

    let mut out = String::new();
    for (i, word) in speakable.words.iter().enumerate() {
        out.push_str(&format!(
            "{:>8.3}s  {:>6.3}s  {}\n",
            estimate.onsets[i], estimate.durations[i], word.text
        ));
    }
    out.push_str(&format!("total {:.3}s\n", estimate.total_seconds));
    out
}

/// Estimated timings as JSON, for scripting.
pub fn estimate_json(text: &str, words_per_minute: f64) -> Result<String> {
    let speakable = speakable(text);
    let estimate = estimate(&speakable.text, words_per_minute);
    let timings: Vec<WordTiming<'_>> = speakable
        .words
        .iter()
        .zip(estimate.onsets.iter().zip(&estimate.durations))
        .map(|(word, (&onset, &duration))| WordTiming {
            word: &word.text,
            onset,
            duration,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&timings)?)
}

/// Parse and combine WAV files. Unusable files are skipped with a warning.
pub fn combine_files(inputs: &[PathBuf], silence_ms: u32) -> Result<PcmContainer> {
    let mut fragments = Vec::with_capacity(inputs.len());
    for path in inputs {
        let file = File::open(path)?;
        match from_reader(BufReader::new(file)) {
            Ok(fragment) => fragments.push(fragment),
            Err(e) => warn!("Skipping {}: {}", path.display(), e),
        }
    }
    combine(&fragments, silence_ms)
        .ok_or_else(|| HapticError::Other("No usable WAV fragments to combine".to_string()))
}

pub fn run_parse(config: &Config, text: &str) -> Result<()> {
    let parser = DirectiveParser::new(config.random.clone());
    println!("{}", format_directives(text, &parser)?);
    Ok(())
}

pub fn run_estimate(config: &Config, text: &str, wpm: Option<f64>) -> Result<()> {
    let rate = wpm.unwrap_or(config.speech.words_per_minute);
    print!("{}", format_estimate(text, rate));
    Ok(())
}

pub fn run_combine(
    config: &Config,
    inputs: &[PathBuf],
    output: &Path,
    silence_ms: Option<u32>,
) -> Result<()> {
    let combined = combine_files(inputs, silence_ms.unwrap_or(config.speech.silence_ms))?;
    combined.write_to(output)?;
    eprintln!(
        "Wrote {} ({:.2}s, {} Hz, {} channel(s))",
        output.display(),
        combined.duration_secs(),
        combined.sample_rate,
        combined.channels
    );
    Ok(())
}

/// Poll until the session has selected a device or `timeout` passes.
pub async fn wait_for_device(
    session: &ActuatorSession,
    timeout: Duration,
) -> Option<SelectedDevice> {
    let poll = async {
        loop {
            if let Some(device) = session.selected_device() {
                return device;
            }
            tokio::time::sleep(DEVICE_POLL).await;
        }
    };
    tokio::time::timeout(timeout, poll).await.ok()
}

pub async fn run_devices(config: Config, timeout_secs: u64) -> Result<()> {
    let address = config.actuator.server_address.clone();
    let context = SessionContext::open(config, Arc::new(LogNotifier));

    match wait_for_device(context.session(), Duration::from_secs(timeout_secs)).await {
        Some(device) => {
            println!(
                "Device {}: {}",
                device.index,
                device.name.as_deref().unwrap_or("(unnamed)")
            );
            println!("Capabilities: {}", device.capabilities);
        }
        None if context.is_connected() => println!("Connected to {address}, no device found"),
        None => println!("Could not reach actuator server at {address}"),
    }

    context.close().await;
    Ok(())
}

pub async fn run_voices(config: &Config) -> Result<()> {
    let client = AllTalkClient::new(&config.speech);
    let voices = client.list_voices().await?;
    if voices.is_empty() {
        eprintln!("No voices reported by {}", client.base_url());
    }
    for voice in voices {
        if voice.label == voice.id {
            println!("{}", voice.id);
        } else {
            println!("{}\t{}", voice.id, voice.label);
        }
    }
    Ok(())
}

fn synthesizer(config: &Config) -> Arc<dyn SpeechSynthesizer> {
    Arc::new(AllTalkClient::new(&config.speech))
}

async fn open_and_wait(config: Config, notifier: Arc<dyn Notifier>) -> SessionContext {
    let context = SessionContext::open(config, notifier);
    match wait_for_device(context.session(), DEVICE_WAIT).await {
        Some(device) => info!("Using device {} ({})", device.index, device.capabilities),
        None => warn!("No actuator device yet, directives will be ignored until one appears"),
    }
    context
}

pub async fn run_speak(config: Config, text: Option<String>, output: Option<PathBuf>) -> Result<()> {
    let text = match text {
        Some(text) => text,
        None => {
            let mut buf = String::new();
            tokio::io::stdin().read_to_string(&mut buf).await?;
            buf
        }
    };

    let synth = synthesizer(&config);
    let context = open_and_wait(config, Arc::new(LogNotifier)).await;
    let mut pipeline = context.pipeline(synth);
    if let Some(path) = output {
        pipeline = pipeline.with_output(path);
    }

    let result = pipeline.speak(&text).await;
    if let Ok(Some(spoken)) = &result {
        info!(
            "Speaking {:.2}s with {} directive(s)",
            spoken.duration_secs,
            spoken.prepared.timeline.len()
        );
        tokio::select! {
            _ = pipeline.wait_finished() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                pipeline.stop_playback();
            }
        }
    }

    drop(pipeline);
    context.close().await;
    result.map(|_| ())
}

pub async fn run_listen(config: Config, output: Option<PathBuf>) -> Result<()> {
    let synth = synthesizer(&config);
    let context = open_and_wait(config, Arc::new(LogNotifier)).await;
    let mut pipeline = context.pipeline(synth);
    if let Some(path) = output {
        pipeline = pipeline.with_output(path);
    }
    let pipeline = Arc::new(pipeline);

    eprintln!("Listening for messages on stdin (Ctrl+D to finish)...");
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    pipeline.handle_message(AssistantMessage::assistant(line));
                }
                None => {
                    pipeline.flush().await;
                    pipeline.wait_finished().await;
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                pipeline.stop_playback();
                break;
            }
        }
    }

    drop(pipeline);
    context.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RandomConfig;
    use crate::pipeline::CollectingNotifier;

    fn write_wav(path: &Path, rate: u32, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_directives_render_as_json() {
        let parser = DirectiveParser::new(RandomConfig::default());
        let json = format_directives("Hi {vibrate:0.5; duration:2}", &parser).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["kind"], "vibrate");
        assert_eq!(value[0]["value"], 0.5);
        assert_eq!(value[0]["duration"], 2.0);
        assert_eq!(value[0]["source_offset"], 3);
    }

    #[test]
    fn test_estimate_lists_each_word() {
        let out = format_estimate("one {stop} two", 180.0);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("one"));
        assert!(lines[1].ends_with("two"));
        assert!(lines[2].starts_with("total"));
    }

    #[test]
    fn test_estimate_json_matches_words() {
        let json = estimate_json("a b", 180.0).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[1]["word"], "b");
        assert_eq!(value[0]["onset"], 0.0);
    }

    #[test]
    fn test_combine_files_skips_unusable_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.wav");
        let bad = dir.path().join("bad.wav");
        let second = dir.path().join("b.wav");
        write_wav(&first, 8000, &[1; 80]);
        std::fs::write(&bad, b"not a wav").unwrap();
        write_wav(&second, 8000, &[2; 40]);

        let combined = combine_files(&[first, bad, second], 10).unwrap();
        assert_eq!(combined.sample_rate, 8000);
        assert_eq!(combined.samples.len(), 80 + 80 + 40);
        assert_eq!(combined.samples[0], 0);
        assert_eq!(combined.samples[80], 1);
        assert_eq!(combined.samples[199], 2);
    }

    #[test]
    fn test_combine_files_without_usable_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.wav");
        std::fs::write(&bad, b"RIFF").unwrap();
        assert!(combine_files(&[bad], 0).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_device_times_out_without_server() {
        let session = ActuatorSession::new("test", Arc::new(CollectingNotifier::new()));
        let found = wait_for_device(&session, Duration::from_millis(300)).await;
        assert!(found.is_none());
    }
}
