// =============================================================================
// Trade State Journal — append-only trade history plus daily stats, on disk
// =============================================================================
//
// One JSON document holding everything the bot wants back after a restart:
//
//   { trades: [...], daily_stats: {"YYYY-MM-DD": {...}},
//     bot_state: { started_at, last_run, total_trades, errors: [...] },
//     saved_at }
//
// Persisted on every state change with the atomic tmp + rename pattern so a
// crash mid-write never corrupts the file. Reloaded on startup.
// =============================================================================

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::VigilError;

/// Errors retained in the bot-state ring.
const MAX_ERROR_ENTRIES: usize = 100;

// ---------------------------------------------------------------------------
// Document model
// ---------------------------------------------------------------------------

/// Record of one completed trade (or completed partial).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub trade_id: String,
    pub symbol: String,
    pub side: String,
    pub entry_price: f64,
    pub exit_price: f64,
    pub amount: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub exit_reason: String,
    pub pnl_percent: f64,
    pub pnl_amount: f64,
    #[serde(default)]
    pub fees: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DailyStats {
    pub trades: u32,
    pub pnl: f64,
    pub wins: u32,
    pub losses: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub time: DateTime<Utc>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotState {
    pub started_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub total_trades: usize,
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalDoc {
    trades: Vec<TradeRecord>,
    daily_stats: BTreeMap<String, DailyStats>,
    bot_state: BotState,
    saved_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Journal
// ---------------------------------------------------------------------------

pub struct TradeJournal {
    path: PathBuf,
    doc: Mutex<JournalDoc>,
    clock: Arc<dyn Clock>,
}

impl TradeJournal {
    /// Open (or create) the journal at `path`, reloading any prior state.
    pub fn open(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        let path = path.into();
        let now = clock.now_utc();

        let doc = match Self::load(&path) {
            Ok(Some(doc)) => {
                info!(
                    path = %path.display(),
                    trades = doc.trades.len(),
                    "trade journal reloaded"
                );
                doc
            }
            Ok(None) => Self::fresh_doc(now),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "journal unreadable; starting fresh");
                Self::fresh_doc(now)
            }
        };

        Self {
            path,
            doc: Mutex::new(doc),
            clock,
        }
    }

    fn fresh_doc(now: DateTime<Utc>) -> JournalDoc {
        JournalDoc {
            trades: Vec::new(),
            daily_stats: BTreeMap::new(),
            bot_state: BotState {
                started_at: now,
                last_run: None,
                total_trades: 0,
                errors: Vec::new(),
            },
            saved_at: now,
        }
    }

    fn load(path: &Path) -> Result<Option<JournalDoc>, VigilError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| VigilError::Data(format!("journal read failed: {e}")))?;
        let doc = serde_json::from_str(&content)
            .map_err(|e| VigilError::Data(format!("journal parse failed: {e}")))?;
        Ok(Some(doc))
    }

    // -------------------------------------------------------------------------
    // Mutations (each one persists)
    // -------------------------------------------------------------------------

    /// Append a completed trade and roll it into that day's stats.
    pub fn record_trade(&self, record: TradeRecord) {
        {
            let mut doc = self.doc.lock();
            let day = record.exit_time.format("%Y-%m-%d").to_string();
            let stats = doc.daily_stats.entry(day).or_default();
            stats.trades += 1;
            stats.pnl += record.pnl_percent;
            if record.pnl_percent >= 0.0 {
                stats.wins += 1;
            } else {
                stats.losses += 1;
            }

            info!(
                trade_id = %record.trade_id,
                pnl_percent = record.pnl_percent,
                "trade recorded"
            );
            doc.trades.push(record);
            doc.bot_state.total_trades = doc.trades.len();
        }
        self.save();
    }

    /// Record a caught error into the bounded bot-state ring.
    pub fn log_error(&self, error: &str) {
        {
            let mut doc = self.doc.lock();
            doc.bot_state.errors.push(ErrorEntry {
                time: self.clock.now_utc(),
                error: error.to_string(),
            });
            let excess = doc.bot_state.errors.len().saturating_sub(MAX_ERROR_ENTRIES);
            if excess > 0 {
                doc.bot_state.errors.drain(..excess);
            }
        }
        self.save();
    }

    /// Stamp the last completed tick.
    pub fn update_last_run(&self) {
        {
            let mut doc = self.doc.lock();
            doc.bot_state.last_run = Some(self.clock.now_utc());
        }
        self.save();
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub fn trade_count(&self) -> usize {
        self.doc.lock().trades.len()
    }

    pub fn recent_trades(&self, count: usize) -> Vec<TradeRecord> {
        let doc = self.doc.lock();
        doc.trades.iter().rev().take(count).cloned().collect()
    }

    /// Stats for one calendar day (UTC); zeroed when the day has no trades.
    pub fn daily_stats_for(&self, day: &str) -> DailyStats {
        self.doc
            .lock()
            .daily_stats
            .get(day)
            .copied()
            .unwrap_or_default()
    }

    pub fn bot_state(&self) -> BotState {
        self.doc.lock().bot_state.clone()
    }

    /// Cumulative realised PnL percent across all recorded trades.
    pub fn total_pnl_percent(&self) -> f64 {
        self.doc.lock().trades.iter().map(|t| t.pnl_percent).sum()
    }

    /// Win rate across all recorded trades, 0.0 when empty.
    pub fn win_rate(&self) -> f64 {
        let doc = self.doc.lock();
        if doc.trades.is_empty() {
            return 0.0;
        }
        let wins = doc.trades.iter().filter(|t| t.pnl_percent > 0.0).count();
        wins as f64 / doc.trades.len() as f64
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Atomic write: serialise to a `.tmp` sibling, then rename over the
    /// target. Failures are logged; the in-memory state stays authoritative.
    fn save(&self) {
        let content = {
            let mut doc = self.doc.lock();
            doc.saved_at = self.clock.now_utc();
            match serde_json::to_string_pretty(&*doc) {
                Ok(content) => content,
                Err(e) => {
                    warn!(error = %e, "journal serialisation failed");
                    return;
                }
            }
        };

        let tmp_path = self.path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&tmp_path, &content) {
            warn!(path = %tmp_path.display(), error = %e, "journal tmp write failed");
            return;
        }
        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            warn!(path = %self.path.display(), error = %e, "journal rename failed");
        }
    }
}

impl std::fmt::Debug for TradeJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeJournal")
            .field("path", &self.path)
            .field("trades", &self.trade_count())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    fn clock() -> Arc<FixedClock> {
        FixedClock::new(Utc.with_ymd_and_hms(2024, 5, 10, 15, 30, 0).unwrap())
    }

    fn record(id: &str, pnl: f64, exit_time: DateTime<Utc>) -> TradeRecord {
        TradeRecord {
            trade_id: id.into(),
            symbol: "BTCUSDT".into(),
            side: "LONG".into(),
            entry_price: 100.0,
            exit_price: 100.0 * (1.0 + pnl / 100.0),
            amount: 1.0,
            entry_time: exit_time - chrono::Duration::hours(2),
            exit_time,
            exit_reason: "TAKE_PROFIT_1".into(),
            pnl_percent: pnl,
            pnl_amount: pnl,
            fees: 0.1,
        }
    }

    #[test]
    fn trades_roll_into_daily_stats() {
        let dir = tempfile::tempdir().unwrap();
        let c = clock();
        let journal = TradeJournal::open(dir.path().join("state.json"), c.clone());

        let now = c.now_utc();
        journal.record_trade(record("t1", 2.0, now));
        journal.record_trade(record("t2", -1.0, now));

        let stats = journal.daily_stats_for("2024-05-10");
        assert_eq!(stats.trades, 2);
        assert_eq!(stats.wins, 1);
        assert_eq!(stats.losses, 1);
        assert!((stats.pnl - 1.0).abs() < 1e-10);
        assert_eq!(journal.trade_count(), 2);
    }

    #[test]
    fn journal_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let c = clock();

        {
            let journal = TradeJournal::open(&path, c.clone());
            journal.record_trade(record("t1", 2.0, c.now_utc()));
            journal.log_error("fetch failed");
            journal.update_last_run();
        }

        let reloaded = TradeJournal::open(&path, c.clone());
        assert_eq!(reloaded.trade_count(), 1);
        assert_eq!(reloaded.recent_trades(5)[0].trade_id, "t1");
        let state = reloaded.bot_state();
        assert_eq!(state.total_trades, 1);
        assert_eq!(state.errors.len(), 1);
        assert!(state.last_run.is_some());
    }

    #[test]
    fn error_ring_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let journal = TradeJournal::open(dir.path().join("state.json"), clock());
        for i in 0..130 {
            journal.log_error(&format!("error {i}"));
        }
        let errors = journal.bot_state().errors;
        assert_eq!(errors.len(), 100);
        assert_eq!(errors.last().unwrap().error, "error 129");
        assert_eq!(errors.first().unwrap().error, "error 30");
    }

    #[test]
    fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let journal = TradeJournal::open(&path, clock());
        assert_eq!(journal.trade_count(), 0);
    }

    #[test]
    fn aggregates() {
        let dir = tempfile::tempdir().unwrap();
        let c = clock();
        let journal = TradeJournal::open(dir.path().join("state.json"), c.clone());
        journal.record_trade(record("t1", 2.0, c.now_utc()));
        journal.record_trade(record("t2", -1.0, c.now_utc()));
        journal.record_trade(record("t3", 3.0, c.now_utc()));

        assert!((journal.total_pnl_percent() - 4.0).abs() < 1e-10);
        assert!((journal.win_rate() - 2.0 / 3.0).abs() < 1e-10);
    }
}
