use blendwise_core::fixtures::demo_inventory;

use super::CommandResult;

/// The demo snapshot, usable as a starting point for `--inventory` files.
pub fn run() -> CommandResult {
    CommandResult::success("inventory", demo_inventory())
}
