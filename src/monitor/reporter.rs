use crate::data_sync::SubscriptionRequest;
use crate::logic::types::{ArbitrageOpportunity, BlockEvent, MonitorState};
use serde_json::Value;
use std::io::{self, Write};
use std::time::Duration;

/// Number of leading address characters shown in profit lines
pub const ADDRESS_PREFIX_LEN: usize = 8;

const BLOCK_RULE_WIDTH: usize = 80;
const SUMMARY_RULE_WIDTH: usize = 50;

/// Line-oriented text report of the block stream
///
/// Reads monitor state but never mutates it.
pub struct Reporter<W: Write> {
    out: W,
    package: String,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, package: impl Into<String>) -> Self {
        Self {
            out,
            package: package.into(),
        }
    }

    pub fn render_banner(&mut self, request: &SubscriptionRequest) -> io::Result<()> {
        let mut lines = vec![
            "🚀 Starting Polymarket P&L Arbitrage Monitor...".to_string(),
            format!("📦 Package: {}", request.package),
            format!("📊 Module: {}", request.module),
            format!("🔢 Start Block: {}", request.start_block),
        ];
        if let Some(stop_block) = request.stop_block {
            lines.push(format!("🏁 Stop Block: {}", stop_block));
        }
        lines.push(rule(BLOCK_RULE_WIDTH));
        self.write_lines(&lines)
    }

    pub fn render_block(&mut self, event: &BlockEvent) -> io::Result<()> {
        self.write_lines(&block_lines(event))
    }

    pub fn render_stream_end(&mut self) -> io::Result<()> {
        self.write_lines(&["✅ Stream ended".to_string()])
    }

    pub fn render_shutdown_notice(&mut self) -> io::Result<()> {
        self.write_lines(&["👋 Shutting down gracefully...".to_string()])
    }

    pub fn render_summary(&mut self, state: &MonitorState) -> io::Result<()> {
        let lines = summary_lines(state, state.elapsed(), &self.package);
        self.write_lines(&lines)
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_lines(&mut self, lines: &[String]) -> io::Result<()> {
        for line in lines {
            writeln!(self.out, "{}", line)?;
        }
        self.out.flush()
    }
}

/// Text lines for one block
pub fn block_lines(event: &BlockEvent) -> Vec<String> {
    let mut lines = vec![
        String::new(),
        format!("📦 Block #{}", display_value(&event.block_number)),
        format!("⏰ Time: {}", display_value(&event.block_timestamp)),
    ];

    if !event.opportunities.is_empty() {
        lines.push(format!("🎯 Found {} arbitrage opportunities!", event.opportunities.len()));
        for (index, opportunity) in event.opportunities.iter().enumerate() {
            lines.extend(opportunity_lines(index + 1, opportunity));
        }
    }

    if !event.user_records.is_empty() {
        lines.push(format!("👥 Processing {} users", event.user_records.len()));
        for user in event.user_records.iter().filter(|user| !user.has_zero_arbitrage_profit()) {
            let address = display_value(&user.user_address);
            lines.push(format!(
                "  🎯 User {}... - Arbitrage Profit: ${}",
                short_address(&address),
                display_value(&user.total_arbitrage_profit)
            ));
        }
    }

    if let Some(global) = &event.global_stats {
        lines.push(format!(
            "📊 Global Stats: {} users, {} trades",
            display_value(&global.active_users),
            display_value(&global.total_trades)
        ));
    }

    lines.push(rule(BLOCK_RULE_WIDTH));
    lines
}

fn opportunity_lines(number: usize, opportunity: &ArbitrageOpportunity) -> Vec<String> {
    let outcomes: Vec<String> = opportunity.no_outcomes.iter().map(display_value).collect();
    vec![
        format!("  💰 Opportunity #{}:", number),
        format!("     Market: {}", display_value(&opportunity.market_id)),
        format!(
            "     Cost: ${} → Payout: ${}",
            display_value(&opportunity.total_cost),
            display_value(&opportunity.guaranteed_payout)
        ),
        format!(
            "     Profit: ${} ({})",
            display_value(&opportunity.profit),
            display_value(&opportunity.profit_percentage)
        ),
        format!("     NO Outcomes ({}): {}", opportunity.no_outcome_count(), outcomes.join(", ")),
        format!("     Block: {}", display_value(&opportunity.block_number)),
    ]
}

/// Text lines for the end-of-run summary
pub fn summary_lines(state: &MonitorState, elapsed: Duration, package: &str) -> Vec<String> {
    vec![
        String::new(),
        "📈 STREAMING SUMMARY".to_string(),
        rule(SUMMARY_RULE_WIDTH),
        format!("⏱️  Duration: {:.2} seconds", elapsed.as_secs_f64()),
        format!("🧱 Blocks Processed: {}", state.blocks_processed),
        format!("🎯 Arbitrage Opportunities: {}", state.total_opportunities),
        format!("👥 Total Users Processed: {}", state.total_users),
        format!("📦 Package: {}", package),
        rule(SUMMARY_RULE_WIDTH),
    ]
}

/// First [`ADDRESS_PREFIX_LEN`] characters; shorter input is returned unchanged
pub fn short_address(address: &str) -> &str {
    match address.char_indices().nth(ADDRESS_PREFIX_LEN) {
        Some((end, _)) => &address[..end],
        None => address,
    }
}

/// Render an untyped upstream value for display
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

fn rule(width: usize) -> String {
    "─".repeat(width)
}
