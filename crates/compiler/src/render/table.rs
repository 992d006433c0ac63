//! Compact parameter table

use rust_decimal_macros::dec;
use serde::Serialize;

use super::{fmt_dec, SpecContext};
use crate::error::Diagnostic;
use crate::formulas::{fmt_value, UNDEFINED_MARKER};
use crate::gabagool::{PairDecision, LOCKED_PROFIT_RULE};
use crate::registry::VariantDescriptor;
use crate::risk::arbitrage_size_per_side;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecRow {
    pub parameter: String,
    pub value: String,
    pub description: String,
}

impl SpecRow {
    fn new(
        parameter: impl Into<String>,
        value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            parameter: parameter.into(),
            value: value.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecTable {
    pub strategy_name: String,
    pub rows: Vec<SpecRow>,
    pub diagnostics: Vec<Diagnostic>,
}

pub(super) fn build(ctx: &SpecContext<'_>) -> SpecTable {
    let record = ctx.record;
    let mut rows = vec![
        SpecRow::new("Strategy", &record.strategy_name, "Name in the discovery knowledge base"),
        SpecRow::new("Strategy type", &record.strategy_type, type_description(ctx)),
        SpecRow::new("Market", ctx.market(), "Binary prediction market the bot trades"),
        SpecRow::new("Symbol", &record.symbol, "Underlying whose candles drive the signal"),
        SpecRow::new("Timeframe", &ctx.config.interval, "Candle interval and decision cadence"),
        SpecRow::new(
            "Data source",
            format!("{} {} klines", ctx.config.data_source, record.symbol),
            "OHLCV candles, closed candles only",
        ),
        SpecRow::new(
            "Candle buffer",
            ctx.candle_buffer.to_string(),
            "Closed candles to keep in memory before evaluating",
        ),
        SpecRow::new("Sizing", ctx.sizing.mode.as_str(), ctx.sizing.summary.clone()),
    ];

    if let Ok(variant) = &ctx.variant {
        if let Some(mode) = variant.mode() {
            rows.push(SpecRow::new(
                "Composition",
                mode.display_name(),
                component_list(variant),
            ));
        }
    }

    // Indicator parameters, canonical order
    match &ctx.canonical {
        Some(canonical) => rows.extend(canonical.iter().map(|p| {
            SpecRow::new(
                p.spec.name,
                p.value
                    .map(fmt_value)
                    .unwrap_or_else(|| UNDEFINED_MARKER.to_string()),
                p.spec.description,
            )
        })),
        None => rows.extend(record.strategy_params.iter().map(|(key, value)| {
            SpecRow::new(key, fmt_value(value), "Not in the registry; shown as stored")
        })),
    }

    rows.extend(action_rows(ctx));

    rows.push(SpecRow::new(
        "Fee rate",
        fmt_dec(ctx.fees.fee_rate),
        format!(
            "Taker fee = shares x rate x (p x (1 - p))^{}",
            ctx.fees.exponent
        ),
    ));
    rows.push(SpecRow::new(
        "Max fee / 100 shares",
        fmt_dec(ctx.fees.max_fee(dec!(100))),
        "Reached at p = 0.50",
    ));
    rows.push(SpecRow::new(
        "Breaker drawdown",
        format!("{}%", fmt_dec(ctx.thresholds.breaker_drawdown_pct)),
        "Halt when drawdown from peak exceeds this",
    ));
    rows.push(SpecRow::new(
        "Breaker loss streak",
        ctx.thresholds.breaker_consecutive_losses.to_string(),
        "Halt after this many consecutive losing trades",
    ));

    SpecTable {
        strategy_name: record.strategy_name.clone(),
        rows,
        diagnostics: ctx.diagnostics.clone(),
    }
}

fn type_description(ctx: &SpecContext<'_>) -> String {
    match &ctx.variant {
        Ok(variant) if variant.mode().is_some() => format!("Composite: {}", variant.name),
        Ok(variant) if variant.is_arbitrage() => "Atomic, non-directional arbitrage".to_string(),
        Ok(variant) => format!("Atomic: {}", variant.name),
        Err(_) => "Unknown strategy type: no formula available".to_string(),
    }
}

fn component_list(variant: &VariantDescriptor) -> String {
    variant
        .components()
        .iter()
        .map(|c| c.indicator.short_name())
        .collect::<Vec<_>>()
        .join(" + ")
}

fn action_rows(ctx: &SpecContext<'_>) -> Vec<SpecRow> {
    match &ctx.variant {
        Ok(variant) if variant.is_arbitrage() => {
            let per_side =
                arbitrage_size_per_side(ctx.config.initial_capital, ctx.config.base_position_pct);
            vec![
                SpecRow::new(
                    PairDecision::Trade.label(),
                    "Buy YES and NO",
                    format!("Maker bids on both legs, {} USDC per side", fmt_dec(per_side)),
                ),
                SpecRow::new(PairDecision::Skip.label(), "No order", "Pair cost at or above the ceiling"),
                SpecRow::new("Settlement", "1.00 per pair", LOCKED_PROFIT_RULE),
            ]
        }
        Ok(_) => vec![
            SpecRow::new("BUY", "Buy UP shares", "Open a long position when flat"),
            SpecRow::new("SELL", "Sell UP shares", "Close the open position"),
            SpecRow::new("HOLD", "No order", "Keep the current state"),
        ],
        Err(_) => vec![SpecRow::new(
            "Actions",
            UNDEFINED_MARKER,
            "Unknown strategy type: no action mapping",
        )],
    }
}

/// Plain-text rendering of a table for terminals
pub fn format_table(table: &SpecTable) -> String {
    let pw = column_width(&table.rows, "Parameter", |r| r.parameter.as_str());
    let vw = column_width(&table.rows, "Value", |r| r.value.as_str());

    let mut out = format!("{:<pw$}  {:<vw$}  Description\n", "Parameter", "Value");
    out.push_str(&format!("{}  {}  {}\n", "-".repeat(pw), "-".repeat(vw), "-".repeat(11)));
    for row in &table.rows {
        out.push_str(&format!(
            "{:<pw$}  {:<vw$}  {}\n",
            row.parameter, row.value, row.description
        ));
    }
    for diagnostic in &table.diagnostics {
        out.push_str(&format!("warning: {diagnostic}\n"));
    }
    out
}

fn column_width(rows: &[SpecRow], header: &str, cell: impl Fn(&SpecRow) -> &str) -> usize {
    rows.iter()
        .map(|r| cell(r).chars().count())
        .chain(std::iter::once(header.chars().count()))
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_table_aligns_columns() {
        let table = SpecTable {
            strategy_name: "RSI".into(),
            rows: vec![
                SpecRow::new("period", "14", "RSI window"),
                SpecRow::new("overbought", "70", "Sell level"),
            ],
            diagnostics: vec![Diagnostic::MissingParameter { name: "oversold" }],
        };
        let text = format_table(&table);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Parameter   Value  Description");
        assert_eq!(lines[2], "period      14     RSI window");
        assert_eq!(lines[4], "warning: parameter `oversold` is missing");
    }
}
