use std::process::ExitCode;

use blendwise_cli::{execute, Cli};
use blendwise_core::config::{EngineSettings, LoggingConfig};
use clap::Parser;

/// Logs go to stderr so stdout carries only the JSON envelope.
fn init_logging(config: &LoggingConfig) {
    use blendwise_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder =
        tracing_subscriber::fmt().with_target(false).with_max_level(log_level).with_writer(std::io::stderr);

    match config.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // A broken config still gets a JSON failure from the command itself.
    if let Ok(settings) = EngineSettings::load(cli.global.load_options()) {
        init_logging(&settings.logging);
    }

    let result = execute(cli);
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
