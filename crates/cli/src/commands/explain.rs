use std::path::Path;

use blendwise_core::config::LoadOptions;
use blendwise_core::explanation::{
    ExplanationBuilder, ExplanationPayload, NarrationDecision, NarrationGuard, Narrator,
    TemplateNarrator,
};
use blendwise_core::StaticTagTable;
use serde::Serialize;
use tracing::warn;

use super::recommend::domain_failure;
use super::{build_engine, input_failure, load_inventory, CommandResult, EXIT_INPUT};
use crate::IntentArgs;

const COMMAND: &str = "explain";

#[derive(Debug, Serialize)]
struct ExplainData {
    payload: ExplanationPayload,
    narration: String,
    guard: NarrationDecision,
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

    let output = match engine.recommend(&intent, &inventory) {
        Ok(output) => output,
        Err(error) => return domain_failure(COMMAND, error),
    };

    let tags = StaticTagTable::demo();
    let payload = ExplanationBuilder::new(&tags).build(&output);
    let narration = TemplateNarrator.narrate(&payload);
    let guard = NarrationGuard::new(engine.tables().known_terpenes()).review(&payload, &narration);
    if !guard.is_allowed() {
        warn!(event_name = "cli.explain.narration_denied", "template narration failed review");
    }

    CommandResult::success(COMMAND, ExplainData { payload, narration, guard })
}
