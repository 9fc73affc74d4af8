use anyhow::Result;
use clap::Parser;
use hapticsync::app;
use hapticsync::cli::{Cli, Commands};
use hapticsync::config::Config;
use hapticsync::error::HapticError;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let config = load_config(cli.config.as_deref())?;
    tracing::debug!("hapticsync {}", hapticsync::version_string());

    match cli.command {
        Commands::Parse { text } => app::run_parse(&config, &text)?,
        Commands::Estimate { text, wpm } => app::run_estimate(&config, &text, wpm)?,
        Commands::Combine {
            inputs,
            output,
            silence_ms,
        } => app::run_combine(&config, &inputs, &output, silence_ms)?,
        Commands::Devices { timeout } => app::run_devices(config, timeout).await?,
        Commands::Voices => app::run_voices(&config).await?,
        Commands::Speak { text, output } => app::run_speak(config, text, output).await?,
        Commands::Listen { output } => app::run_listen(config, output).await?,
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise the level follows `-v` and `--quiet`.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults
fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(p) if !p.exists() => {
            return Err(HapticError::ConfigFileNotFound {
                path: p.display().to_string(),
            }
            .into());
        }
        Some(p) => Config::load(p)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}
