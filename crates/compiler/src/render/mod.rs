//! Specification renderer
//!
//! Turns a [`StrategyRecord`] into either a compact parameter table or a
//! step-by-step bot implementation document. Both are pure functions of
//! the record and the renderer's configuration; rendering never fails.

mod document;
mod table;

pub use table::{format_table, SpecRow, SpecTable};

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Diagnostic, UnknownVariant};
use crate::fees::FeeModel;
use crate::formulas::{describe, IndicatorDescription};
use crate::params::ParamSet;
use crate::record::StrategyRecord;
use crate::registry::{self, CanonicalParams, VariantDescriptor};
use crate::risk::{PositionSizing, RiskPolicy, RiskThresholds};

const MIN_CANDLE_BUFFER: usize = 50;
const CANDLE_BUFFER_MARGIN: usize = 10;
/// Parameters at or above this are not periods (e.g. capital amounts)
const MAX_PERIOD_LIKE: f64 = 1000.0;

/// Output mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Table,
    Document,
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "table" | "rows" => Ok(Self::Table),
            "document" | "doc" | "text" => Ok(Self::Document),
            other => Err(format!("unknown render mode `{other}` (expected table or document)")),
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "table",
            Self::Document => "document",
        })
    }
}

/// Knobs of the execution environment the rendered document targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Candle interval the strategy was discovered on
    pub interval: String,
    /// Where the bot fetches candles from
    pub data_source: String,
    /// Capital the sizing examples assume (USDC)
    pub initial_capital: Decimal,
    /// Base position size, % of capital
    pub base_position_pct: Decimal,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            interval: "15m".to_string(),
            data_source: "Binance".to_string(),
            initial_capital: dec!(10000),
            base_position_pct: dec!(10),
        }
    }
}

/// Rendered output in either mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Rendered {
    Table(SpecTable),
    Document { text: String },
}

/// Everything the two render modes share, computed once per record
pub(crate) struct SpecContext<'a> {
    pub record: &'a StrategyRecord,
    pub config: &'a RenderConfig,
    pub fees: &'a FeeModel,
    pub variant: Result<VariantDescriptor, UnknownVariant>,
    pub canonical: Option<CanonicalParams>,
    pub descriptions: Vec<IndicatorDescription>,
    pub thresholds: RiskThresholds,
    pub sizing: PositionSizing,
    pub candle_buffer: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl SpecContext<'_> {
    /// "BTC" for "BTCUSDT"
    pub fn asset(&self) -> &str {
        let symbol = self.record.symbol.as_str();
        ["USDT", "USDC", "BUSD", "USD"]
            .iter()
            .find_map(|quote| symbol.strip_suffix(quote))
            .filter(|base| !base.is_empty())
            .unwrap_or(symbol)
    }

    pub fn market(&self) -> String {
        format!(
            "Polymarket {} Up or Down, {} window",
            self.asset(),
            self.config.interval
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpecRenderer {
    pub config: RenderConfig,
    pub fees: FeeModel,
    pub risk: RiskPolicy,
}

impl SpecRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub(crate) fn compile<'a>(&'a self, record: &'a StrategyRecord) -> SpecContext<'a> {
        let variant = registry::resolve(&record.strategy_type);
        let canonical = variant
            .as_ref()
            .ok()
            .map(|v| v.canonicalize(&record.strategy_params));

        let descriptions = match (&variant, &canonical) {
            (Ok(v), Some(c)) => v
                .components()
                .iter()
                .zip(&c.components)
                .map(|(component, local)| describe(component.indicator, local))
                .collect(),
            _ => Vec::new(),
        };

        let diagnostics = diagnostics_for(record, &variant, canonical.as_ref());
        if !diagnostics.is_empty() {
            debug!(
                strategy = %record.strategy_name,
                count = diagnostics.len(),
                "rendering with diagnostics"
            );
        }

        SpecContext {
            record,
            config: &self.config,
            fees: &self.fees,
            thresholds: self.risk.derive(&record.stats),
            sizing: PositionSizing::for_mode(record.sizing_mode, self.config.base_position_pct),
            candle_buffer: candle_buffer_size(&record.strategy_params),
            variant,
            canonical,
            descriptions,
            diagnostics,
        }
    }

    pub fn render(&self, record: &StrategyRecord, mode: RenderMode) -> Rendered {
        match mode {
            RenderMode::Table => Rendered::Table(self.render_table(record)),
            RenderMode::Document => Rendered::Document {
                text: self.render_document(record),
            },
        }
    }

    pub fn render_table(&self, record: &StrategyRecord) -> SpecTable {
        table::build(&self.compile(record))
    }

    pub fn render_document(&self, record: &StrategyRecord) -> String {
        document::build(&self.compile(record))
    }

    /// Recoverable issues found in a record
    pub fn diagnostics(&self, record: &StrategyRecord) -> Vec<Diagnostic> {
        let variant = registry::resolve(&record.strategy_type);
        let canonical = variant
            .as_ref()
            .ok()
            .map(|v| v.canonicalize(&record.strategy_params));
        diagnostics_for(record, &variant, canonical.as_ref())
    }

    /// SHA-256 hex digest of rendered text
    pub fn fingerprint(text: &str) -> String {
        format!("{:x}", Sha256::digest(text.as_bytes()))
    }
}

fn diagnostics_for(
    record: &StrategyRecord,
    variant: &Result<VariantDescriptor, UnknownVariant>,
    canonical: Option<&CanonicalParams>,
) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    if record.malformed_params {
        out.push(Diagnostic::MalformedInput);
    }
    if let Err(unknown) = variant {
        out.push(Diagnostic::UnknownVariant {
            tag: unknown.tag.clone(),
        });
    }
    if let Some(canonical) = canonical {
        out.extend(
            canonical
                .missing()
                .into_iter()
                .map(|name| Diagnostic::MissingParameter { name }),
        );
    }
    out
}

/// Candles the bot must keep: the longest period-like parameter (values in
/// (0, 1000)), at least 50, plus a margin of 10.
pub fn candle_buffer_size(params: &ParamSet) -> usize {
    let longest = params
        .iter()
        .map(|(_, v)| v)
        .filter(|v| *v > 0.0 && *v < MAX_PERIOD_LIKE)
        .fold(0.0_f64, f64::max)
        .ceil() as usize;
    longest.max(MIN_CANDLE_BUFFER) + CANDLE_BUFFER_MARGIN
}

/// Decimal for display: at most 4 places, no trailing zeros
pub(crate) fn fmt_dec(value: Decimal) -> String {
    value.round_dp(4).normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formulas::UNDEFINED_MARKER;

    fn record(json: &str) -> StrategyRecord {
        StrategyRecord::from_json(json).unwrap()
    }

    fn rsi_bollinger() -> StrategyRecord {
        record(
            r#"{
                "strategy_name": "RSI+Bollinger",
                "strategy_type": "rsi_bollinger",
                "strategy_params": {"rsi_period": 14, "rsi_ob": 70, "rsi_os": 30, "bb_period": 20, "bb_mult": 2.0},
                "symbol": "BTCUSDT",
                "days": 90,
                "sizing_mode": "fixed",
                "net_pnl": "412.5",
                "win_rate": "58.3",
                "total_trades": 120,
                "max_drawdown_pct": "9.2",
                "max_consecutive_losses": 6
            }"#,
        )
    }

    #[test]
    fn test_candle_buffer_size() {
        let params: ParamSet = [("period", 14.0)].into_iter().collect();
        assert_eq!(candle_buffer_size(&params), 60);
        let params: ParamSet = [("slow", 200.0), ("capital", 5000.0)].into_iter().collect();
        assert_eq!(candle_buffer_size(&params), 210);
        let params: ParamSet = [("multiplier", 2.5), ("period", 55.5)].into_iter().collect();
        assert_eq!(candle_buffer_size(&params), 66);
        assert_eq!(candle_buffer_size(&ParamSet::new()), 60);
    }

    #[test]
    fn test_render_mode_parse() {
        assert_eq!("Document".parse::<RenderMode>(), Ok(RenderMode::Document));
        assert_eq!("table".parse::<RenderMode>(), Ok(RenderMode::Table));
        assert!("pdf".parse::<RenderMode>().is_err());
    }

    #[test]
    fn test_document_rendering_is_idempotent() {
        let renderer = SpecRenderer::default();
        let record = rsi_bollinger();
        let first = renderer.render_document(&record);
        let second = renderer.render_document(&record);
        assert_eq!(first, second);
        assert_eq!(
            SpecRenderer::fingerprint(&first),
            SpecRenderer::fingerprint(&second)
        );
        assert_eq!(SpecRenderer::fingerprint(&first).len(), 64);
    }

    #[test]
    fn test_document_sections_in_order() {
        let text = SpecRenderer::default().render_document(&rsi_bollinger());
        let headings = [
            "## 1. Strategy identity",
            "## 2. Data source",
            "## 3. Indicator computation",
            "## 4. Signal logic",
            "## 5. Market execution",
            "## 6. Fees",
            "## 7. Risk management",
            "## 8. Control loop",
            "## 9. Backtest statistics",
        ];
        let mut last = 0;
        for heading in headings {
            let at = text.find(heading).unwrap_or_else(|| panic!("missing {heading}"));
            assert!(at >= last, "{heading} out of order");
            last = at;
        }
        assert!(text.contains("13.8%"));
        assert!(text.contains("at least 80 closed candles"));
    }

    #[test]
    fn test_unknown_variant_renders_placeholder_and_stats() {
        let record = record(
            r#"{"strategy_name": "Mystery", "strategy_type": "dynamic_combo",
                "strategy_params": {"period": 10}, "net_pnl": "77.7", "total_trades": 12}"#,
        );
        let renderer = SpecRenderer::default();
        let text = renderer.render_document(&record);
        assert!(text.contains("Unknown strategy type"));
        assert!(text.contains("77.7"));
        assert!(!text.contains("Wilder"));

        let table = renderer.render_table(&record);
        assert!(table
            .diagnostics
            .contains(&Diagnostic::UnknownVariant { tag: "dynamic_combo".into() }));
        assert!(table.rows.iter().any(|r| r.value == "dynamic_combo"));
    }

    #[test]
    fn test_missing_parameter_is_undefined_not_defaulted() {
        let record = record(
            r#"{"strategy_type": "macd", "strategy_params": {"fast": 12, "slow": 26}}"#,
        );
        let renderer = SpecRenderer::default();
        let table = renderer.render_table(&record);
        let row = table.rows.iter().find(|r| r.parameter == "signal").unwrap();
        assert_eq!(row.value, UNDEFINED_MARKER);
        assert_eq!(
            renderer.diagnostics(&record),
            vec![Diagnostic::MissingParameter { name: "signal" }]
        );
    }

    #[test]
    fn test_malformed_params_still_render() {
        let record = record(r#"{"strategy_type": "rsi", "strategy_params": "{{{"}"#);
        let renderer = SpecRenderer::default();
        let text = renderer.render_document(&record);
        assert!(text.contains("period = undefined"));
        assert!(renderer.diagnostics(&record).contains(&Diagnostic::MalformedInput));
    }

    #[test]
    fn test_table_rows_in_canonical_order() {
        let table = SpecRenderer::default().render_table(&rsi_bollinger());
        let names: Vec<&str> = table.rows.iter().map(|r| r.parameter.as_str()).collect();
        let position = |name: &str| names.iter().position(|n| *n == name).unwrap();
        assert!(position("Market") < position("Timeframe"));
        assert!(position("rsi_period") < position("rsi_overbought"));
        assert!(position("rsi_oversold") < position("bb_period"));
        assert!(position("bb_multiplier") < position("BUY"));
        assert!(table.diagnostics.is_empty());
    }

    #[test]
    fn test_every_variant_renders() {
        let renderer = SpecRenderer::default();
        for desc in registry::all_variants() {
            let record = record(&format!(r#"{{"strategy_type": "{}"}}"#, desc.tag.as_str()));
            let text = renderer.render_document(&record);
            assert!(!text.contains("Unknown strategy type"), "{}", desc.name);
            for spec in desc.schema() {
                assert!(text.contains(spec.name), "{}: {}", desc.name, spec.name);
            }
        }
    }

    #[test]
    fn test_gabagool_document_describes_both_legs() {
        let record = record(
            r#"{"strategy_type": "gabagool", "symbol": "ETHUSDT",
                "strategy_params": {"type": "gabagool", "max_pair_cost": "0.98", "bid_offset": "0.01", "spread_multiplier": "3"},
                "hit_rate": "91.5", "avg_locked_profit": "0.021"}"#,
        );
        let text = SpecRenderer::default().render_document(&record);
        assert!(text.contains("YES and NO"));
        assert!(text.contains("Polymarket ETH Up or Down"));
        assert!(text.contains("Hit rate: 91.5%"));
    }

    #[test]
    fn test_huge_drawdown_still_renders() {
        let record = record(
            r#"{"strategy_type": "rsi", "max_drawdown_pct": "60000000000000000000000000000"}"#,
        );
        let renderer = SpecRenderer::default();
        let text = renderer.render_document(&record);
        assert!(text.contains(&format!("exceeds {}%", Decimal::MAX)));
        let table = renderer.render_table(&record);
        assert!(table.rows.iter().any(|r| r.value == format!("{}%", Decimal::MAX)));
    }

    #[test]
    fn test_confidence_weighted_document_defines_confidence() {
        let record = record(
            r#"{"strategy_type": "rsi_bollinger", "sizing_mode": "ConfidenceWeighted",
                "strategy_params": {"rsi_period": 14, "rsi_ob": 70, "rsi_os": 30, "bb_period": 20, "bb_mult": 2.0}}"#,
        );
        let text = SpecRenderer::default().render_document(&record);
        assert!(text.contains("RSI confidence:"));
        assert!(text.contains("BUY: (rsi_oversold - RSI) / rsi_oversold."));
        assert!(text.contains("(lower - close) / (upper - lower)"));
        assert!(text.contains("Confidence: the mean confidence of all components."));

        let fixed = SpecRenderer::default().render_document(&rsi_bollinger());
        assert!(!fixed.contains("RSI confidence:"));
    }
}
