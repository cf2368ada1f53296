// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Seed average gain / average loss with the SMA of the first `period`
//          gains / losses.
// Step 3 — Apply Wilder's exponential smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + current_gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + current_loss) / period
// Step 4 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// A window with zero average loss reads exactly 100.0.
// =============================================================================

use crate::error::VigilError;

/// Compute the full RSI series for the given `closes` and `period`.
///
/// The returned vector holds one RSI value per close starting at index
/// `period` (the first `period` closes are consumed to seed the averages).
///
/// # Edge cases
/// - `period == 0` => `Err(Strategy)`
/// - `closes.len() < period + 1` => empty vec (need at least `period` deltas)
/// - `avg_loss == 0` => 100.0
pub fn calculate_rsi(closes: &[f64], period: usize) -> Result<Vec<f64>, VigilError> {
    if period == 0 {
        return Err(VigilError::Strategy("RSI period must be positive".into()));
    }
    if closes.len() < period + 1 {
        return Ok(Vec::new());
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    // Seed averages with the SMA of the first `period` deltas.
    let (sum_gain, sum_loss) = deltas[..period]
        .iter()
        .fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l + d.abs())
            }
        });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    let mut result = Vec::with_capacity(deltas.len() - period + 1);
    result.push(rsi_from_averages(avg_gain, avg_loss));

    // Wilder's smoothing for subsequent values.
    for &delta in &deltas[period..] {
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { delta.abs() } else { 0.0 };

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        result.push(rsi_from_averages(avg_gain, avg_loss));
    }

    Ok(result)
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // No down moves in the window — maximum strength.
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_period_zero_is_an_error() {
        assert!(calculate_rsi(&[1.0, 2.0, 3.0], 0).is_err());
    }

    #[test]
    fn rsi_empty_input() {
        assert!(calculate_rsi(&[], 14).unwrap().is_empty());
    }

    #[test]
    fn rsi_insufficient_data() {
        // Need period+1 closes (period deltas). 14 closes => 13 deltas < 14.
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        assert!(calculate_rsi(&closes, 14).unwrap().is_empty());
    }

    #[test]
    fn rsi_zero_losses_reads_exactly_100() {
        // Strictly ascending prices: no losing deltas anywhere.
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let series = calculate_rsi(&closes, 14).unwrap();
        assert!(!series.is_empty());
        for &v in &series {
            assert_eq!(v, 100.0, "expected exactly 100.0, got {v}");
        }
    }

    #[test]
    fn rsi_all_losses() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        let series = calculate_rsi(&closes, 14).unwrap();
        assert!(!series.is_empty());
        for &v in &series {
            assert!(v.abs() < 1e-10, "expected 0.0, got {v}");
        }
    }

    #[test]
    fn rsi_flat_market_has_no_losses() {
        // Zero movement means zero average loss, which reads as 100.
        let closes = vec![100.0; 30];
        let series = calculate_rsi(&closes, 14).unwrap();
        for &v in &series {
            assert_eq!(v, 100.0);
        }
    }

    #[test]
    fn rsi_range_check() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        let series = calculate_rsi(&closes, 14).unwrap();
        assert!(!series.is_empty());
        for &v in &series {
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }

    #[test]
    fn rsi_output_alignment() {
        // 20 closes, period 14 => 19 deltas => 6 RSI values.
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        let series = calculate_rsi(&closes, 14).unwrap();
        assert_eq!(series.len(), closes.len() - 14);
    }
}
