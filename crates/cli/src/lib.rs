pub mod commands;

use std::path::PathBuf;

use blendwise_core::config::{ConfigOverrides, LoadOptions};
use blendwise_core::{EffectDimension, Intent, IntentOverrides, LogFormat};
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;

use crate::commands::CommandResult;

#[derive(Debug, Parser)]
#[command(
    name = "blendwise",
    about = "Blendwise recommendation engine CLI",
    long_about = "Interpret free-text intents, compose chemotype blends from an inventory snapshot, and inspect engine configuration.",
    after_help = "Examples:\n  blendwise recommend --intent \"focus, no anxiety\"\n  blendwise explain --intent \"energize me then help me wind down\"\n  blendwise inventory > inventory.json\n  blendwise config"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Default, Args)]
pub struct GlobalArgs {
    #[arg(long, global = true, help = "Path to a blendwise.toml config file")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "Disable the in-process recommendation cache")]
    pub no_cache: bool,
    #[arg(long, global = true, help = "Override the log level (trace|debug|info|warn|error)")]
    pub log_level: Option<String>,
    #[arg(long, global = true, value_parser = parse_log_format, help = "compact|pretty|json")]
    pub log_format: Option<LogFormat>,
}

impl GlobalArgs {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                cache_enabled: self.no_cache.then_some(false),
                log_level: self.log_level.clone(),
                log_format: self.log_format,
                ..ConfigOverrides::default()
            },
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[command(about = "Rank blends for an intent against an inventory snapshot")]
    Recommend {
        #[command(flatten)]
        intent: IntentArgs,
        #[arg(long, help = "Inventory snapshot JSON (defaults to the demo inventory)")]
        inventory: Option<PathBuf>,
    },
    #[command(about = "Show the target profile an intent resolves to")]
    Interpret {
        #[command(flatten)]
        intent: IntentArgs,
    },
    #[command(about = "Build the explanation payload, narrate it and review the narration")]
    Explain {
        #[command(flatten)]
        intent: IntentArgs,
        #[arg(long, help = "Inventory snapshot JSON (defaults to the demo inventory)")]
        inventory: Option<PathBuf>,
    },
    #[command(about = "Print the demo inventory snapshot")]
    Inventory,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
}

#[derive(Debug, Clone, Default, Args)]
pub struct IntentArgs {
    #[arg(long, help = "Free-text description of the desired experience")]
    pub intent: String,
    #[arg(long = "target", value_name = "DIMENSION=VALUE", help = "Explicit effect target, repeatable")]
    pub targets: Vec<String>,
    #[arg(long, help = "Ceiling on projected anxiety risk, 0..1")]
    pub max_anxiety: Option<f64>,
    #[arg(long, help = "Ceiling on blended THC percent")]
    pub max_thc: Option<f64>,
    #[arg(long, help = "morning|afternoon|evening|night")]
    pub time_of_day: Option<String>,
    #[arg(long, help = "low|medium|high")]
    pub tolerance: Option<String>,
    #[arg(long, help = "novice|regular|experienced")]
    pub experience: Option<String>,
}

impl IntentArgs {
    pub fn new(text: impl Into<String>) -> Self {
        Self { intent: text.into(), ..Self::default() }
    }

    /// Intent text plus explicit overrides; fails on malformed flag values.
    pub fn to_intent(&self) -> Result<Intent, String> {
        let mut overrides = IntentOverrides {
            max_anxiety_risk: self.max_anxiety,
            max_thc_percent: self.max_thc,
            ..IntentOverrides::default()
        };

        for raw in &self.targets {
            let (dimension, value) = raw
                .split_once('=')
                .ok_or_else(|| format!("target `{raw}` must look like DIMENSION=VALUE"))?;
            let dimension: EffectDimension = dimension.parse()?;
            let value: f64 = value
                .trim()
                .parse()
                .map_err(|_| format!("target value `{value}` for {dimension} is not a number"))?;
            overrides.targets.insert(dimension, value);
        }

        overrides.time_of_day = self.time_of_day.as_deref().map(parse_keyword).transpose()?;
        overrides.tolerance = self.tolerance.as_deref().map(parse_keyword).transpose()?;
        overrides.experience = self.experience.as_deref().map(parse_keyword).transpose()?;

        Ok(Intent::new(self.intent.clone()).with_overrides(overrides))
    }
}

fn parse_keyword<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    let keyword = raw.trim().to_ascii_lowercase();
    serde_json::from_value(serde_json::Value::String(keyword.clone()))
        .map_err(|_| format!("unsupported value `{keyword}`"))
}

fn parse_log_format(raw: &str) -> Result<LogFormat, String> {
    raw.parse::<LogFormat>().map_err(|error| error.to_string())
}

pub fn execute(cli: Cli) -> CommandResult {
    let options = cli.global.load_options();
    match cli.command {
        Command::Recommend { intent, inventory } => {
            commands::recommend::run(&options, &intent, inventory.as_deref())
        }
        Command::Interpret { intent } => commands::interpret::run(&intent),
        Command::Explain { intent, inventory } => {
            commands::explain::run(&options, &intent, inventory.as_deref())
        }
        Command::Inventory => commands::inventory::run(),
        Command::Config => commands::config::run(&options),
    }
}

#[cfg(test)]
mod tests {
    use blendwise_core::domain::profile::{TimeOfDay, ToleranceLevel};
    use blendwise_core::EffectDimension;
    use clap::Parser;

    use super::{Cli, Command, IntentArgs};

    #[test]
    fn intent_args_collect_overrides() {
        let args = IntentArgs {
            targets: vec!["focus=0.9".to_string(), "Relaxation = 0.1".to_string()],
            max_anxiety: Some(0.2),
            time_of_day: Some("Morning".to_string()),
            tolerance: Some("low".to_string()),
            ..IntentArgs::new("work session")
        };

        let intent = args.to_intent().unwrap();
        assert_eq!(intent.text, "work session");
        assert_eq!(intent.overrides.targets.get(&EffectDimension::Focus), Some(&0.9));
        assert_eq!(intent.overrides.targets.get(&EffectDimension::Relaxation), Some(&0.1));
        assert_eq!(intent.overrides.max_anxiety_risk, Some(0.2));
        assert_eq!(intent.overrides.time_of_day, Some(TimeOfDay::Morning));
        assert_eq!(intent.overrides.tolerance, Some(ToleranceLevel::Low));
    }

    #[test]
    fn malformed_targets_are_rejected() {
        let missing_value = IntentArgs { targets: vec!["focus".to_string()], ..IntentArgs::new("x") };
        assert!(missing_value.to_intent().is_err());

        let unknown = IntentArgs { targets: vec!["zen=0.5".to_string()], ..IntentArgs::new("x") };
        assert!(unknown.to_intent().unwrap_err().contains("unknown effect dimension"));

        let bad_keyword = IntentArgs { tolerance: Some("extreme".to_string()), ..IntentArgs::new("x") };
        assert!(bad_keyword.to_intent().is_err());
    }

    #[test]
    fn parses_recommend_with_global_flags() {
        let cli = Cli::try_parse_from([
            "blendwise",
            "recommend",
            "--intent",
            "creative afternoon",
            "--target",
            "creativity=0.9",
            "--no-cache",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert!(cli.global.no_cache);
        let options = cli.global.load_options();
        assert_eq!(options.overrides.cache_enabled, Some(false));
        assert!(!options.require_file);
        match cli.command {
            Command::Recommend { intent, inventory } => {
                assert_eq!(intent.intent, "creative afternoon");
                assert_eq!(intent.targets, vec!["creativity=0.9".to_string()]);
                assert!(inventory.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
