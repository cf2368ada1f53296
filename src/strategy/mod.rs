// =============================================================================
// Strategy — pullback entries and the position exit state machine
// =============================================================================

pub mod entry;
pub mod exit;

pub use entry::{evaluate_entry, EntryParams, EntrySignal};
pub use exit::{evaluate_exit, ExitReason, ExitSignal};
