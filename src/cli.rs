//! Command-line interface for hapticsync
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Drive a haptic actuator in time with synthesized speech
#[derive(Parser, Debug)]
#[command(
    name = "hapticsync",
    version,
    about = "Drive a haptic actuator in time with synthesized speech"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: info, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the directives found in TEXT as JSON
    Parse {
        /// Message text containing {key:value} directives
        text: String,
    },

    /// Print estimated word onsets for the speakable part of TEXT
    Estimate {
        text: String,

        /// Speaking rate (default: from config)
        #[arg(long, value_name = "WPM")]
        wpm: Option<f64>,
    },

    /// Combine WAV fragments into one file behind a lead-in silence
    Combine {
        /// Input WAV files, in order
        #[arg(required = true, value_name = "WAV")]
        inputs: Vec<PathBuf>,

        /// Output WAV file
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,

        /// Lead-in silence (default: from config)
        #[arg(long, value_name = "MS")]
        silence_ms: Option<u32>,
    },

    /// Connect to the actuator server and show the selected device
    Devices {
        /// Seconds to wait for a device list
        #[arg(long, value_name = "SECONDS", default_value = "5")]
        timeout: u64,
    },

    /// List voices offered by the speech synthesis server
    Voices,

    /// Speak one message with synchronized actuation
    Speak {
        /// Message text (default: read stdin)
        text: Option<String>,

        /// Also write the combined WAV here
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Treat each stdin line as an assistant message until EOF or Ctrl+C
    Listen {
        /// Also write each combined WAV here
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["hapticsync"]).is_err());
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["hapticsync", "-vv", "voices"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
        assert!(matches!(cli.command, Commands::Voices));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["hapticsync", "voices", "--quiet", "--config", "/tmp/c.toml"])
                .unwrap();
        assert!(cli.quiet);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn test_parse_text_argument() {
        let cli = Cli::try_parse_from(["hapticsync", "parse", "Hi {vibrate:1}"]).unwrap();
        match cli.command {
            Commands::Parse { text } => assert_eq!(text, "Hi {vibrate:1}"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_estimate_with_rate() {
        let cli = Cli::try_parse_from(["hapticsync", "estimate", "hello", "--wpm", "150"]).unwrap();
        match cli.command {
            Commands::Estimate { text, wpm } => {
                assert_eq!(text, "hello");
                assert_eq!(wpm, Some(150.0));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_combine_requires_inputs_and_output() {
        assert!(Cli::try_parse_from(["hapticsync", "combine", "-o", "out.wav"]).is_err());
        assert!(Cli::try_parse_from(["hapticsync", "combine", "a.wav"]).is_err());

        let cli = Cli::try_parse_from([
            "hapticsync",
            "combine",
            "a.wav",
            "b.wav",
            "-o",
            "out.wav",
            "--silence-ms",
            "0",
        ])
        .unwrap();
        match cli.command {
            Commands::Combine {
                inputs,
                output,
                silence_ms,
            } => {
                assert_eq!(inputs.len(), 2);
                assert_eq!(output, PathBuf::from("out.wav"));
                assert_eq!(silence_ms, Some(0));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_devices_default_timeout() {
        let cli = Cli::try_parse_from(["hapticsync", "devices"]).unwrap();
        assert!(matches!(cli.command, Commands::Devices { timeout: 5 }));
    }

    #[test]
    fn test_speak_text_is_optional() {
        let cli = Cli::try_parse_from(["hapticsync", "speak"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Speak {
                text: None,
                output: None
            }
        ));
    }
}
