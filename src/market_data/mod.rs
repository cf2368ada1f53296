// =============================================================================
// Market data — candle model and bounded per-timeframe buffers
// =============================================================================

pub mod ohlcv_buffer;

pub use ohlcv_buffer::{Candle, OhlcvBuffer};
