//! Strategy record ingestion
//!
//! A record arrives either as JSON (API body, CLI file) or as a
//! `discovery_backtests` row. Statistics may be numbers or decimal strings;
//! anything unparseable reads as zero, the way the knowledge base itself
//! treats missing metrics.

use std::str::FromStr;

use persistence::repository::DiscoveryBacktestRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RecordError;
use crate::params::{self, ParamSet};
use crate::types::SizingMode;

/// Backtest statistics attached to a record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestStats {
    pub net_pnl: Decimal,
    pub gross_pnl: Decimal,
    pub total_fees: Decimal,
    pub win_rate: Decimal,
    pub total_trades: u32,
    pub sharpe_ratio: Decimal,
    pub sortino_ratio: Decimal,
    pub max_drawdown_pct: Decimal,
    pub profit_factor: Decimal,
    pub avg_trade_pnl: Decimal,
    pub annualized_return_pct: Decimal,
    pub annualized_sharpe: Decimal,
    pub strategy_confidence: Decimal,
    pub max_consecutive_losses: u32,
    pub avg_win_pnl: Decimal,
    pub avg_loss_pnl: Decimal,
    pub total_volume: Decimal,
    pub composite_score: Decimal,
    /// Arbitrage only: traded windows / total windows (%)
    pub hit_rate: Option<Decimal>,
    /// Arbitrage only
    pub avg_locked_profit: Option<Decimal>,
}

impl BacktestStats {
    fn from_fields(fields: &Map<String, Value>) -> Self {
        let d = |key: &str| fields.get(key).and_then(decimal_value).unwrap_or_default();
        let n = |key: &str| fields.get(key).and_then(count_value).unwrap_or_default();
        Self {
            net_pnl: d("net_pnl"),
            gross_pnl: d("gross_pnl"),
            total_fees: d("total_fees"),
            win_rate: d("win_rate"),
            total_trades: n("total_trades"),
            sharpe_ratio: d("sharpe_ratio"),
            sortino_ratio: d("sortino_ratio"),
            max_drawdown_pct: d("max_drawdown_pct"),
            profit_factor: d("profit_factor"),
            avg_trade_pnl: d("avg_trade_pnl"),
            annualized_return_pct: d("annualized_return_pct"),
            annualized_sharpe: d("annualized_sharpe"),
            strategy_confidence: d("strategy_confidence"),
            max_consecutive_losses: n("max_consecutive_losses"),
            avg_win_pnl: d("avg_win_pnl"),
            avg_loss_pnl: d("avg_loss_pnl"),
            total_volume: d("total_volume"),
            composite_score: d("composite_score"),
            hit_rate: fields.get("hit_rate").and_then(decimal_value),
            avg_locked_profit: fields.get("avg_locked_profit").and_then(decimal_value),
        }
    }
}

/// A persisted strategy as the compiler sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawStrategyRecord")]
pub struct StrategyRecord {
    pub id: Option<i64>,
    pub strategy_name: String,
    pub strategy_type: String,
    pub strategy_params: ParamSet,
    /// `strategy_params` was present but could not be parsed
    pub malformed_params: bool,
    pub symbol: String,
    pub days: u32,
    pub sizing_mode: SizingMode,
    #[serde(flatten)]
    pub stats: BacktestStats,
}

impl StrategyRecord {
    pub fn from_json(text: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Wire shape: every field optional, statistics collected loosely
#[derive(Deserialize)]
struct RawStrategyRecord {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    strategy_name: Option<String>,
    #[serde(default)]
    strategy_type: Option<String>,
    #[serde(default)]
    strategy_params: Value,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    sizing_mode: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl From<RawStrategyRecord> for StrategyRecord {
    fn from(raw: RawStrategyRecord) -> Self {
        let (strategy_params, malformed_params) = match params::try_normalize(&raw.strategy_params) {
            Ok(set) => (set, false),
            Err(_) => (ParamSet::default(), true),
        };
        let strategy_type = raw
            .strategy_type
            .filter(|t| !t.trim().is_empty())
            .or_else(|| embedded_type(&raw.strategy_params))
            .unwrap_or_default();

        Self {
            id: raw.id,
            strategy_name: raw.strategy_name.unwrap_or_else(|| strategy_type.clone()),
            strategy_type,
            strategy_params,
            malformed_params,
            symbol: raw.symbol.unwrap_or_default(),
            days: raw.rest.get("days").and_then(count_value).unwrap_or_default(),
            sizing_mode: raw
                .sizing_mode
                .as_deref()
                .map(SizingMode::parse)
                .unwrap_or_default(),
            stats: BacktestStats::from_fields(&raw.rest),
        }
    }
}

impl From<DiscoveryBacktestRecord> for StrategyRecord {
    fn from(row: DiscoveryBacktestRecord) -> Self {
        let raw_params = Value::String(row.strategy_params);
        let (strategy_params, malformed_params) = match raw_params.as_str().map(str::trim) {
            Some("") => (ParamSet::default(), false),
            _ => match params::try_normalize(&raw_params) {
                Ok(set) => (set, false),
                Err(_) => (ParamSet::default(), true),
            },
        };

        let stats = BacktestStats {
            net_pnl: parse_dec(&row.net_pnl),
            gross_pnl: parse_dec(&row.gross_pnl),
            total_fees: parse_dec(&row.total_fees),
            win_rate: parse_dec(&row.win_rate),
            total_trades: u32::try_from(row.total_trades).unwrap_or_default(),
            sharpe_ratio: parse_dec(&row.sharpe_ratio),
            sortino_ratio: parse_opt(row.sortino_ratio.as_deref()).unwrap_or_default(),
            max_drawdown_pct: parse_dec(&row.max_drawdown_pct),
            profit_factor: parse_dec(&row.profit_factor),
            avg_trade_pnl: parse_dec(&row.avg_trade_pnl),
            annualized_return_pct: parse_opt(row.annualized_return_pct.as_deref())
                .unwrap_or_default(),
            annualized_sharpe: parse_opt(row.annualized_sharpe.as_deref()).unwrap_or_default(),
            strategy_confidence: parse_opt(row.strategy_confidence.as_deref()).unwrap_or_default(),
            max_consecutive_losses: row
                .max_consecutive_losses
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or_default(),
            avg_win_pnl: parse_opt(row.avg_win_pnl.as_deref()).unwrap_or_default(),
            avg_loss_pnl: parse_opt(row.avg_loss_pnl.as_deref()).unwrap_or_default(),
            total_volume: parse_opt(row.total_volume.as_deref()).unwrap_or_default(),
            composite_score: parse_dec(&row.composite_score),
            hit_rate: parse_opt(row.hit_rate.as_deref()),
            avg_locked_profit: parse_opt(row.avg_locked_profit.as_deref()),
        };

        Self {
            id: row.id,
            strategy_name: row.strategy_name,
            strategy_type: row.strategy_type,
            strategy_params,
            malformed_params,
            symbol: row.symbol,
            days: u32::try_from(row.days).unwrap_or_default(),
            sizing_mode: SizingMode::parse(&row.sizing_mode),
            stats,
        }
    }
}

// ============================================================================
// Lenient scalar parsing
// ============================================================================

fn parse_opt(s: Option<&str>) -> Option<Decimal> {
    let s = s?.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

fn parse_dec(s: &str) -> Decimal {
    parse_opt(Some(s)).unwrap_or_default()
}

fn decimal_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_opt(Some(&n.to_string())),
        Value::String(s) => parse_opt(Some(s)),
        _ => None,
    }
}

fn count_value(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// The `type` tag of an internally tagged `strategy_params` payload
fn embedded_type(params: &Value) -> Option<String> {
    match params {
        Value::Object(map) => map.get("type").and_then(Value::as_str).map(str::to_string),
        Value::String(text) => serde_json::from_str::<Value>(text)
            .ok()
            .and_then(|inner| embedded_type(&inner)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_json_numbers_and_strings() {
        let record = StrategyRecord::from_json(
            r#"{
                "strategy_name": "RSI+Bollinger",
                "strategy_type": "rsi_bollinger",
                "strategy_params": {"rsi_period": 14, "bb_mult": "2.0"},
                "symbol": "BTCUSDT",
                "days": 90,
                "sizing_mode": "Kelly",
                "net_pnl": "123.45",
                "win_rate": 61.2,
                "total_trades": 48,
                "max_drawdown_pct": "8.5",
                "max_consecutive_losses": 4
            }"#,
        )
        .unwrap();

        assert_eq!(record.strategy_type, "rsi_bollinger");
        assert_eq!(record.strategy_params.get("bb_mult"), Some(2.0));
        assert!(!record.malformed_params);
        assert_eq!(record.days, 90);
        assert_eq!(record.sizing_mode, SizingMode::Kelly);
        assert_eq!(record.stats.net_pnl, dec!(123.45));
        assert_eq!(record.stats.win_rate, dec!(61.2));
        assert_eq!(record.stats.total_trades, 48);
        assert_eq!(record.stats.max_drawdown_pct, dec!(8.5));
        assert_eq!(record.stats.max_consecutive_losses, 4);
        assert_eq!(record.stats.strategy_confidence, Decimal::ZERO);
        assert_eq!(record.stats.hit_rate, None);
    }

    #[test]
    fn test_malformed_params_flagged() {
        let record = StrategyRecord::from_json(
            r#"{"strategy_type": "macd", "strategy_params": "{not json"}"#,
        )
        .unwrap();
        assert!(record.malformed_params);
        assert!(record.strategy_params.is_empty());
        assert_eq!(record.sizing_mode, SizingMode::Fixed);
    }

    #[test]
    fn test_type_taken_from_tagged_params() {
        let record = StrategyRecord::from_json(
            r#"{"strategy_params": "{\"type\":\"gabagool\",\"max_pair_cost\":\"0.98\"}"}"#,
        )
        .unwrap();
        assert_eq!(record.strategy_type, "gabagool");
        assert_eq!(record.strategy_params.get("max_pair_cost"), Some(0.98));
    }

    #[test]
    fn test_serialize_round_trip_keeps_record() {
        let record = StrategyRecord::from_json(
            r#"{"strategy_type": "rsi", "strategy_params": {"period": 14}, "net_pnl": 10, "hit_rate": "55.5"}"#,
        )
        .unwrap();
        let value = serde_json::to_value(&record).unwrap();
        let again = StrategyRecord::from_value(value).unwrap();
        assert_eq!(record, again);
    }

    #[test]
    fn test_from_db_row() {
        let row = DiscoveryBacktestRecord {
            id: Some(7),
            params_hash: "abc".into(),
            strategy_type: "gabagool".into(),
            strategy_name: "Gabagool".into(),
            strategy_params: r#"{"type":"gabagool","max_pair_cost":"0.98","bid_offset":"0.01","spread_multiplier":"3"}"#.into(),
            symbol: "BTCUSDT".into(),
            days: 30,
            sizing_mode: "Fixed".into(),
            composite_score: "72.5".into(),
            net_pnl: "15.2".into(),
            gross_pnl: "15.2".into(),
            total_fees: "0".into(),
            win_rate: "100".into(),
            total_trades: 812,
            sharpe_ratio: "garbage".into(),
            max_drawdown_pct: "0".into(),
            profit_factor: "0".into(),
            avg_trade_pnl: "0.018".into(),
            hit_rate: Some("94.0".into()),
            avg_locked_profit: Some("0.0187".into()),
            discovery_run_id: None,
            phase: None,
            sortino_ratio: None,
            max_consecutive_losses: Some(0),
            avg_win_pnl: None,
            avg_loss_pnl: None,
            total_volume: None,
            annualized_return_pct: None,
            annualized_sharpe: None,
            strategy_confidence: None,
        };

        let record = StrategyRecord::from(row);
        assert_eq!(record.id, Some(7));
        assert_eq!(record.strategy_params.len(), 3);
        assert_eq!(record.stats.sharpe_ratio, Decimal::ZERO);
        assert_eq!(record.stats.hit_rate, Some(dec!(94.0)));
        assert_eq!(record.stats.composite_score, dec!(72.5));
        assert_eq!(record.days, 30);
    }

    #[test]
    fn test_scientific_notation_accepted() {
        assert_eq!(parse_dec("1e-4"), dec!(0.0001));
        assert_eq!(parse_dec(""), Decimal::ZERO);
    }
}
