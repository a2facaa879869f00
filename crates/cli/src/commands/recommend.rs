use std::path::Path;

use blendwise_core::config::LoadOptions;
use blendwise_core::{ApplicationError, DomainError};
use serde::Serialize;
use tracing::info;

use super::{build_engine, input_failure, load_inventory, CommandResult, EXIT_INPUT, EXIT_INTERNAL};
use crate::IntentArgs;

const COMMAND: &str = "recommend";

#[derive(Debug, Serialize)]
struct RecommendData<'a> {
    intent: &'a str,
    inventory_fingerprint: String,
    result: blendwise_core::EngineOutput,
}

pub fn run(options: &LoadOptions, args: &IntentArgs, inventory: Option<&Path>) -> CommandResult {
    let engine = match build_engine(COMMAND, options) {
        Ok(engine) => engine,
        Err(failure) => return failure,
    };
    let intent = match args.to_intent() {
        Ok(intent) => intent,
        Err(message) => return CommandResult::failure(COMMAND, "invalid_input", message, EXIT_INPUT),
    };
    let inventory = match load_inventory(inventory) {
        Ok(inventory) => inventory,
        Err(error) => return input_failure(COMMAND, &error),
    };

    match engine.recommend(&intent, &inventory) {
        Ok(result) => {
            info!(
                event_name = "cli.recommend.completed",
                stack = result.is_stack(),
                candidates_evaluated = result.candidates_evaluated(),
                "recommend command completed"
            );
            CommandResult::success(
                COMMAND,
                RecommendData {
                    intent: &intent.text,
                    inventory_fingerprint: inventory.fingerprint(),
                    result,
                },
            )
        }
        Err(error) => domain_failure(COMMAND, error),
    }
}

pub(crate) fn domain_failure(command: &str, error: DomainError) -> CommandResult {
    let detail = error.to_string();
    let interface = ApplicationError::from(error).into_interface(format!("cli-{command}"));
    CommandResult::failure(
        command,
        "domain_invariant",
        format!("{} ({detail}; correlation id {})", interface.user_message(), interface.correlation_id()),
        EXIT_INTERNAL,
    )
}
