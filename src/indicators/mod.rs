// =============================================================================
// Indicator library — pure functions over finite price sequences
// =============================================================================

pub mod atr;
pub mod ema;
pub mod rsi;

pub use atr::{calculate_atr, true_range, volatility_percent};
pub use ema::calculate_ema;
pub use rsi::calculate_rsi;
