// =============================================================================
// Entry Evaluator — 5m pullback-to-EMA entries in the direction of the trend
// =============================================================================
//
// Gating preconditions, checked in order:
//   1. advisory gate OPEN
//   2. trend bias not NEUTRAL
//   3. open positions below the cap
//
// Then on the 5m window: price must sit within 0.3% of EMA-20 (the pullback
// band), RSI must confirm residual strength, and the signal levels are laid
// out from the current ATR:
//   LONG : SL = price - m*ATR, TP1 = price + m*ATR, TP2 = price + 2m*ATR
//   SHORT: mirror image
// where m is the configured ATR stop multiplier.
// =============================================================================

use serde::Serialize;
use tracing::debug;

use crate::error::VigilError;
use crate::indicators::{calculate_atr, calculate_ema, calculate_rsi};
use crate::market_data::Candle;
use crate::types::{AiGateStatus, TradeSide, TrendBias};

/// Price distance from EMA-20, as a fraction of EMA-20, inside which a
/// pullback is considered "at" the average.
const PULLBACK_BAND_FRACTION: f64 = 0.003;

/// RSI floor for longs: the pullback must not have broken momentum.
const RSI_LONG_FLOOR: f64 = 45.0;
/// RSI ceiling for shorts.
const RSI_SHORT_CEILING: f64 = 55.0;

/// A fully specified entry signal, ready for sizing and risk validation.
#[derive(Debug, Clone, Serialize)]
pub struct EntrySignal {
    pub side: TradeSide,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit_1: f64,
    pub take_profit_2: f64,
    /// ATR at signal time; carried onto the position for trailing exits.
    pub atr: f64,
}

/// Indicator parameters for the entry evaluation, sourced from config.
#[derive(Debug, Clone, Copy)]
pub struct EntryParams {
    pub ema_pullback: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub atr_stop_multiplier: f64,
}

impl Default for EntryParams {
    fn default() -> Self {
        Self {
            ema_pullback: 20,
            rsi_period: 14,
            atr_period: 14,
            atr_stop_multiplier: 1.5,
        }
    }
}

/// Evaluate the 5m window for a pullback entry.
///
/// Returns `Ok(None)` when any gate or condition fails; `Err` only for
/// computation failures, which the orchestrator treats as "no signal".
pub fn evaluate_entry(
    ohlcv_5m: &[Candle],
    trend_bias: TrendBias,
    ai_gate: AiGateStatus,
    current_positions: usize,
    max_positions: usize,
    params: &EntryParams,
) -> Result<Option<EntrySignal>, VigilError> {
    // --- Gating preconditions, in order --------------------------------------
    if ai_gate != AiGateStatus::Open {
        debug!(gate = %ai_gate, "entry rejected: advisory gate closed");
        return Ok(None);
    }
    if trend_bias == TrendBias::Neutral {
        return Ok(None);
    }
    if current_positions >= max_positions {
        debug!(current_positions, max_positions, "entry rejected: position cap");
        return Ok(None);
    }

    // --- 5m indicators -------------------------------------------------------
    let closes: Vec<f64> = ohlcv_5m.iter().map(|c| c.close).collect();
    let highs: Vec<f64> = ohlcv_5m.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = ohlcv_5m.iter().map(|c| c.low).collect();

    let ema_series = calculate_ema(&closes, params.ema_pullback)?;
    let rsi_series = calculate_rsi(&closes, params.rsi_period)?;
    let atr_series = calculate_atr(&highs, &lows, &closes, params.atr_period)?;

    let (Some(&price), Some(&ema20), Some(&rsi), Some(&atr)) = (
        closes.last(),
        ema_series.last(),
        rsi_series.last(),
        atr_series.last(),
    ) else {
        return Ok(None);
    };

    // --- Pullback proximity --------------------------------------------------
    let band = ema20 * PULLBACK_BAND_FRACTION;
    if (price - ema20).abs() >= band {
        debug!(
            price,
            ema20,
            band,
            "entry rejected: price outside pullback band"
        );
        return Ok(None);
    }

    let m = params.atr_stop_multiplier;

    // --- Directional confirmation --------------------------------------------
    if trend_bias == TrendBias::Bullish && rsi > RSI_LONG_FLOOR && price > ema20 {
        return Ok(Some(EntrySignal {
            side: TradeSide::Long,
            entry_price: price,
            stop_loss: price - m * atr,
            take_profit_1: price + m * atr,
            take_profit_2: price + 2.0 * m * atr,
            atr,
        }));
    }

    if trend_bias == TrendBias::Bearish && rsi < RSI_SHORT_CEILING && price < ema20 {
        return Ok(Some(EntrySignal {
            side: TradeSide::Short,
            entry_price: price,
            stop_loss: price + m * atr,
            take_profit_1: price - m * atr,
            take_profit_2: price - 2.0 * m * atr,
            atr,
        }));
    }

    Ok(None)
}
