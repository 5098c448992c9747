use serde_json::Value;
use std::time::{Duration, Instant};

/// A single block emitted by the upstream P&L module
///
/// Scalar fields are kept as raw JSON values. They are only ever displayed,
/// so the decoder passes them through without asserting a type.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockEvent {
    pub block_number: Value,
    pub block_timestamp: Value,
    /// Detected arbitrage opportunities, in upstream order
    pub opportunities: Vec<ArbitrageOpportunity>,
    /// Per-user P&L records, in upstream order
    pub user_records: Vec<UserPnL>,
    /// Global statistics (first entry of the upstream collection, if any)
    pub global_stats: Option<GlobalStats>,
}

impl BlockEvent {
    /// An event with no nested records
    pub fn empty(block_number: Value, block_timestamp: Value) -> Self {
        Self {
            block_number,
            block_timestamp,
            opportunities: Vec::new(),
            user_records: Vec::new(),
            global_stats: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.opportunities.is_empty() && self.user_records.is_empty() && self.global_stats.is_none()
    }
}

/// A set of NO positions whose guaranteed payout exceeds their total cost
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageOpportunity {
    pub market_id: Value,
    /// Total cost of buying every NO outcome
    pub total_cost: Value,
    pub guaranteed_payout: Value,
    pub profit: Value,
    pub profit_percentage: Value,
    /// Outcome labels making up the position
    pub no_outcomes: Vec<Value>,
    pub block_number: Value,
}

impl ArbitrageOpportunity {
    pub fn no_outcome_count(&self) -> usize {
        self.no_outcomes.len()
    }
}

/// Aggregated trading statistics for one address
#[derive(Debug, Clone, PartialEq)]
pub struct UserPnL {
    pub user_address: Value,
    pub total_trades: Value,
    pub total_volume: Value,
    pub total_pnl: Value,
    pub total_arbitrage_profit: Value,
    pub risk_score: Value,
}

impl UserPnL {
    /// True when the arbitrage profit is the literal zero (`"0"` or `0`)
    pub fn has_zero_arbitrage_profit(&self) -> bool {
        match &self.total_arbitrage_profit {
            Value::String(s) => s == "0",
            Value::Number(n) => n.as_u64() == Some(0) || n.as_i64() == Some(0),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalStats {
    pub active_users: Value,
    pub total_trades: Value,
}

/// Running counters for one monitor run
///
/// Owned by the consumption loop. Only [`crate::logic::aggregator::apply_block`]
/// produces new values, and every counter is non-decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorState {
    pub total_opportunities: u64,
    pub total_users: u64,
    pub blocks_processed: u64,
    pub start_time: Instant,
}

impl MonitorState {
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    pub fn started_at(start_time: Instant) -> Self {
        Self {
            total_opportunities: 0,
            total_users: 0,
            blocks_processed: 0,
            start_time,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}
