pub mod config;
pub mod explain;
pub mod interpret;
pub mod inventory;
pub mod recommend;

use std::fs;
use std::path::Path;

use anyhow::Context;
use blendwise_core::config::{EngineSettings, LoadOptions};
use blendwise_core::fixtures::demo_inventory;
use blendwise_core::{Inventory, RecommendationEngine};
use serde::Serialize;

pub const EXIT_OK: u8 = 0;
pub const EXIT_INTERNAL: u8 = 1;
pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_INPUT: u8 = 3;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<T: Serialize> {
    command: String,
    status: String,
    error_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl CommandResult {
    pub fn success(command: &str, data: impl Serialize) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: None,
            data: Some(data),
        };
        Self { exit_code: EXIT_OK, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload: CommandOutcome<()> = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: Some(message.into()),
            data: None,
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == EXIT_OK
    }
}

fn serialize_payload<T: Serialize>(payload: &CommandOutcome<T>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Settings plus an engine built from them, or the config failure result.
pub(crate) fn build_engine(
    command: &str,
    options: &LoadOptions,
) -> Result<RecommendationEngine, CommandResult> {
    let settings = EngineSettings::load(options.clone()).map_err(|error| {
        CommandResult::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    })?;
    RecommendationEngine::from_settings(settings).map_err(|error| {
        CommandResult::failure(command, "config_validation", error.to_string(), EXIT_CONFIG)
    })
}

/// Snapshot from a JSON file, or the demo inventory when no path is given.
pub(crate) fn load_inventory(path: Option<&Path>) -> anyhow::Result<Inventory> {
    let Some(path) = path else {
        return Ok(demo_inventory());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read inventory `{}`", path.display()))?;
    Inventory::from_json(&raw)
        .with_context(|| format!("could not decode inventory `{}`", path.display()))
}

pub(crate) fn input_failure(command: &str, error: &anyhow::Error) -> CommandResult {
    CommandResult::failure(command, "invalid_input", format!("{error:#}"), EXIT_INPUT)
}
