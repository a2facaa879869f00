use blendwise_core::IntentInterpreter;

use super::{CommandResult, EXIT_INPUT};
use crate::IntentArgs;

const COMMAND: &str = "interpret";

pub fn run(args: &IntentArgs) -> CommandResult {
    match args.to_intent() {
        Ok(intent) => CommandResult::success(COMMAND, IntentInterpreter::new().interpret(&intent)),
        Err(message) => CommandResult::failure(COMMAND, "invalid_input", message, EXIT_INPUT),
    }
}
