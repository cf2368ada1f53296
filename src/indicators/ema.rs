// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = (close_t - EMA_{t-1}) * multiplier + EMA_{t-1}
//
// The very first EMA value is seeded with the SMA of the first `period`
// values. When fewer than `period` values are available the single output is
// seeded with the mean of whatever is available.
// =============================================================================

use crate::error::VigilError;

/// Compute the EMA series for `values` with look-back `period`.
///
/// The output is aligned to the tail of the input: element 0 corresponds to
/// input index `period - 1`, so the result has `len - period + 1` elements.
///
/// # Edge cases
/// - `period == 0` => `Err(Strategy)` — a zero period is a caller bug.
/// - empty input => empty vec
/// - `values.len() < period` => one element, the mean of the available values
pub fn calculate_ema(values: &[f64], period: usize) -> Result<Vec<f64>, VigilError> {
    if period == 0 {
        return Err(VigilError::Strategy("EMA period must be positive".into()));
    }
    if values.is_empty() {
        return Ok(Vec::new());
    }

    if values.len() < period {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        return Ok(vec![mean]);
    }

    let multiplier = 2.0 / (period + 1) as f64;

    // Seed: SMA of the first `period` values.
    let sma: f64 = values[..period].iter().sum::<f64>() / period as f64;

    let mut result = Vec::with_capacity(values.len() - period + 1);
    result.push(sma);

    let mut prev = sma;
    for &value in &values[period..] {
        let ema = (value - prev) * multiplier + prev;
        result.push(ema);
        prev = ema;
    }

    Ok(result)
}
