use crate::logic::types::{ArbitrageOpportunity, BlockEvent, GlobalStats, UserPnL};
use serde_json::{Map, Value};

const BLOCK_NUMBER: &str = "blockNumber";
const BLOCK_TIMESTAMP: &str = "blockTimestamp";
const OPPORTUNITIES: &str = "arbitrageOpportunities";
const USER_PNLS: &str = "userPnls";
const GLOBAL_PNLS: &str = "globalPnls";

/// Decode an untyped upstream record into a [`BlockEvent`]
///
/// Never fails. A nested collection that is missing or is not an array
/// decodes as empty, and array elements that are not objects are dropped.
/// A record that is not an object at all yields an empty event.
pub fn decode_block(record: &Value) -> BlockEvent {
    let Some(fields) = record.as_object() else {
        return BlockEvent::empty(Value::Null, Value::Null);
    };

    let opportunities = objects(fields, OPPORTUNITIES).map(decode_opportunity).collect();
    let user_records = objects(fields, USER_PNLS).map(decode_user).collect();
    let global_stats = fields
        .get(GLOBAL_PNLS)
        .and_then(Value::as_array)
        .and_then(|globals| globals.first())
        .and_then(Value::as_object)
        .map(decode_global);

    BlockEvent {
        block_number: scalar(fields, BLOCK_NUMBER),
        block_timestamp: scalar(fields, BLOCK_TIMESTAMP),
        opportunities,
        user_records,
        global_stats,
    }
}

fn objects<'a>(fields: &'a Map<String, Value>, key: &str) -> impl Iterator<Item = &'a Map<String, Value>> {
    fields
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn scalar(fields: &Map<String, Value>, key: &str) -> Value {
    fields.get(key).cloned().unwrap_or(Value::Null)
}

fn decode_opportunity(fields: &Map<String, Value>) -> ArbitrageOpportunity {
    let no_outcomes = match fields.get("noOutcomes") {
        Some(Value::Array(outcomes)) => outcomes.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(single) => vec![single.clone()],
    };

    ArbitrageOpportunity {
        market_id: scalar(fields, "marketId"),
        total_cost: scalar(fields, "totalNoCost"),
        guaranteed_payout: scalar(fields, "guaranteedPayout"),
        profit: scalar(fields, "profit"),
        profit_percentage: scalar(fields, "profitPercentage"),
        no_outcomes,
        block_number: scalar(fields, BLOCK_NUMBER),
    }
}

fn decode_user(fields: &Map<String, Value>) -> UserPnL {
    UserPnL {
        user_address: scalar(fields, "userAddress"),
        total_trades: scalar(fields, "totalTrades"),
        total_volume: scalar(fields, "totalVolume"),
        total_pnl: scalar(fields, "totalPnl"),
        total_arbitrage_profit: scalar(fields, "totalArbitrageProfit"),
        risk_score: scalar(fields, "riskScore"),
    }
}

fn decode_global(fields: &Map<String, Value>) -> GlobalStats {
    GlobalStats {
        active_users: scalar(fields, "activeUsers"),
        total_trades: scalar(fields, "totalTrades"),
    }
}
