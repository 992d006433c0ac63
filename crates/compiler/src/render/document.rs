//! Step-by-step implementation document

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{fmt_dec, SpecContext};
use crate::composer::describe_rule;
use crate::fees::estimate_settlement_probability;
use crate::formulas::{fmt_value, IndicatorDescription};
use crate::gabagool::{quote, GabagoolParams, PairDecision, LOCKED_PROFIT_RULE};
use crate::registry::IndicatorKind;
use crate::risk::arbitrage_size_per_side;
use crate::types::{Kline, SizingMode};

/// Markdown-ish text builder
#[derive(Default)]
struct Doc {
    out: String,
}

impl Doc {
    fn line(&mut self, text: impl AsRef<str>) {
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn blank(&mut self) {
        self.out.push('\n');
    }

    fn section(&mut self, number: usize, title: &str) {
        self.blank();
        self.line(format!("## {number}. {title}"));
        self.blank();
    }

    fn bullets<I, S>(&mut self, items: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for item in items {
            self.line(format!("- {}", item.as_ref()));
        }
    }

    fn steps<I, S>(&mut self, items: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for (i, item) in items.into_iter().enumerate() {
            self.line(format!("{}. {}", i + 1, item.as_ref()));
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

pub(super) fn build(ctx: &SpecContext<'_>) -> String {
    let mut doc = Doc::default();
    doc.line(format!("# Bot specification: {}", ctx.record.strategy_name));

    if !ctx.diagnostics.is_empty() {
        doc.blank();
        for diagnostic in &ctx.diagnostics {
            doc.line(format!("> warning: {diagnostic}"));
        }
    }

    identity(&mut doc, ctx);
    data_source(&mut doc, ctx);
    computation(&mut doc, ctx);
    signal_logic(&mut doc, ctx);
    execution(&mut doc, ctx);
    fees(&mut doc, ctx);
    risk(&mut doc, ctx);
    control_loop(&mut doc, ctx);
    statistics(&mut doc, ctx);

    doc.finish()
}

fn identity(doc: &mut Doc, ctx: &SpecContext<'_>) {
    let record = ctx.record;
    doc.section(1, "Strategy identity");
    doc.bullets([
        format!("Name: {}", record.strategy_name),
        format!("Type tag: {}", record.strategy_type),
    ]);
    match &ctx.variant {
        Ok(variant) => {
            doc.line(format!("- Variant: {}", variant.name));
            match variant.mode() {
                Some(mode) => doc.line(format!(
                    "- Composite ({}) of {}",
                    mode.display_name(),
                    variant
                        .components()
                        .iter()
                        .map(|c| c.indicator.display_name())
                        .collect::<Vec<_>>()
                        .join(", ")
                )),
                None if variant.is_arbitrage() => {
                    doc.line("- Atomic, non-directional: buys both outcomes of a binary market")
                }
                None => doc.line("- Atomic, directional"),
            }
        }
        Err(unknown) => doc.line(format!(
            "- Unknown strategy type `{}`: no registered formula, the sections below list what is known",
            unknown.tag
        )),
    }
    doc.bullets([
        format!("Market: {}", ctx.market()),
        format!("Underlying: {}", record.symbol),
        format!("Position sizing: {}", ctx.sizing.summary),
    ]);
}

fn data_source(doc: &mut Doc, ctx: &SpecContext<'_>) {
    doc.section(2, "Data source");
    doc.bullets([
        format!(
            "Fetch {} {} klines from {}: open time, open, high, low, close, volume, close time.",
            ctx.record.symbol, ctx.config.interval, ctx.config.data_source
        ),
        "Use closed candles only; drop the candle that is still forming.".to_string(),
        format!(
            "Keep a rolling buffer of at least {} closed candles, oldest first.",
            ctx.candle_buffer
        ),
        "Warm up by replaying the buffer through the indicators before the first decision."
            .to_string(),
    ]);
}

fn computation(doc: &mut Doc, ctx: &SpecContext<'_>) {
    doc.section(3, "Indicator computation");
    if ctx.variant.is_err() {
        doc.line("Unknown strategy type: no indicator formula is available.");
        if ctx.record.strategy_params.is_empty() {
            doc.line("No parameters were stored with the record.");
        } else {
            doc.line("Stored parameters, as recorded:");
            doc.bullets(
                ctx.record
                    .strategy_params
                    .iter()
                    .map(|(key, value)| format!("`{key}` = {}", fmt_value(value))),
            );
        }
        return;
    }

    for (i, description) in ctx.descriptions.iter().enumerate() {
        if i > 0 {
            doc.blank();
        }
        component(doc, i + 1, description);
    }
}

fn component(doc: &mut Doc, index: usize, description: &IndicatorDescription) {
    doc.line(format!("### 3.{index} {}", description.title));
    doc.blank();
    doc.line(&description.setup);
    doc.blank();
    doc.bullets(
        description
            .parameters
            .iter()
            .map(|p| format!("`{}` = {}: {}", p.name, p.value, p.description)),
    );
    doc.blank();
    doc.steps(&description.computation);
}

fn signal_logic(doc: &mut Doc, ctx: &SpecContext<'_>) {
    doc.section(4, "Signal logic");
    let variant = match &ctx.variant {
        Ok(variant) => variant,
        Err(_) => {
            doc.line("Unknown strategy type: no vote rule is available. The bot must not trade it.");
            return;
        }
    };

    for description in &ctx.descriptions {
        doc.line(format!("{}:", description.indicator.short_name()));
        doc.bullets(&description.signal_rule);
        if ctx.sizing.mode == SizingMode::ConfidenceWeighted {
            doc.line(format!("{} confidence:", description.indicator.short_name()));
            doc.bullets(&description.confidence);
        }
    }

    if let Some(mode) = variant.mode() {
        let kinds: Vec<IndicatorKind> = variant.components().iter().map(|c| c.indicator).collect();
        doc.blank();
        doc.line("Combined action:");
        doc.bullets(describe_rule(mode, &kinds));
    }
}

fn execution(doc: &mut Doc, ctx: &SpecContext<'_>) {
    doc.section(5, "Market execution");
    match &ctx.variant {
        Ok(variant) if variant.is_arbitrage() => arbitrage_execution(doc, ctx),
        Ok(_) => directional_execution(doc, ctx),
        Err(_) => doc.line("Unknown strategy type: no action mapping is defined."),
    }
}

fn directional_execution(doc: &mut Doc, ctx: &SpecContext<'_>) {
    let position = ctx.config.initial_capital * ctx.config.base_position_pct / dec!(100);
    doc.line(format!("Trade the UP share of {}. Long only.", ctx.market()));
    doc.bullets([
        "BUY while flat: buy UP shares with a taker order.".to_string(),
        "SELL while holding: sell the whole UP position with a taker order.".to_string(),
        "BUY while holding, SELL while flat, HOLD: no order.".to_string(),
        "UP share price p = 0.5 + underlying change% since entry x 0.05, clamped to [0.05, 0.95]."
            .to_string(),
    ]);

    // Worked example on a 1% move
    let p = estimate_settlement_probability(dec!(100), dec!(101));
    let shares = (position / p).round_dp(2);
    doc.line(format!(
        "Example: with {} USDC capital and {}% base size, a +1% move gives p = {}, so {} USDC buys {} shares and pays a taker fee of {} USDC.",
        fmt_dec(ctx.config.initial_capital),
        fmt_dec(ctx.config.base_position_pct),
        fmt_dec(p),
        fmt_dec(position),
        fmt_dec(shares),
        fmt_dec(ctx.fees.taker_fee(shares, p)),
    ));
}

fn arbitrage_execution(doc: &mut Doc, ctx: &SpecContext<'_>) {
    let per_side =
        arbitrage_size_per_side(ctx.config.initial_capital, ctx.config.base_position_pct);
    doc.line(format!(
        "Each {} window, buy both YES and NO shares of {} with maker bids.",
        ctx.config.interval,
        ctx.market()
    ));
    doc.bullets([
        format!(
            "{}: pair cost below the ceiling, place both bids at {} USDC per side.",
            PairDecision::Trade.label(),
            fmt_dec(per_side)
        ),
        format!(
            "{}: pair cost at or above the ceiling, place nothing.",
            PairDecision::Skip.label()
        ),
        "If only one leg fills, cancel the other and close the filled leg at market.".to_string(),
        format!("{LOCKED_PROFIT_RULE}."),
    ]);

    let params = ctx
        .canonical
        .as_ref()
        .and_then(|c| c.component(0))
        .map(GabagoolParams::from_params);
    if let Some(Ok(params)) = params {
        let flat = Kline {
            open_time: 0,
            open: dec!(100),
            high: dec!(100),
            low: dec!(100),
            close: dec!(100),
            volume: Decimal::ONE,
            close_time: 0,
        };
        let q = quote(&flat, &params);
        doc.line(format!(
            "Example: on a flat candle YES fills at {}, NO at {}, pair cost {} -> {}, locked profit {} per pair.",
            fmt_dec(q.yes_fill),
            fmt_dec(q.no_fill),
            fmt_dec(q.pair_cost),
            q.decision.label(),
            fmt_dec(q.locked_profit),
        ));
    }
}

fn fees(doc: &mut Doc, ctx: &SpecContext<'_>) {
    doc.section(6, "Fees");
    doc.bullets(ctx.fees.describe());
}

fn risk(doc: &mut Doc, ctx: &SpecContext<'_>) {
    doc.section(7, "Risk management");
    doc.bullets(ctx.thresholds.describe());
    doc.blank();
    doc.line(format!("Position sizing ({}):", ctx.sizing.mode.as_str()));
    doc.bullets(&ctx.sizing.rules);
}

fn control_loop(doc: &mut Doc, ctx: &SpecContext<'_>) {
    doc.section(8, "Control loop");
    let decide = match &ctx.variant {
        Ok(variant) if variant.is_arbitrage() => {
            "Quote the new candle and decide TRADE or SKIP (section 5)."
        }
        Ok(_) => "Feed the new candle to every indicator and compute the action (section 4).",
        Err(_) => "No evaluation is possible for an unknown strategy type; stay flat.",
    };
    doc.steps([
        format!(
            "Wait for the current {} candle to close, then fetch it.",
            ctx.config.interval
        ),
        format!(
            "Append it to the buffer and drop the oldest so at least {} closed candles remain.",
            ctx.candle_buffer
        ),
        decide.to_string(),
        "Check both circuit breakers (section 7); if either tripped, do not place orders."
            .to_string(),
        "Size and place orders (sections 5 and 7), then record fills, fees and PnL.".to_string(),
        "Update equity peak, drawdown and the losing streak, then wait for the next candle."
            .to_string(),
    ]);
}

fn statistics(doc: &mut Doc, ctx: &SpecContext<'_>) {
    let record = ctx.record;
    let stats = &record.stats;
    doc.section(9, "Backtest statistics");
    doc.line(format!(
        "Backtest over {} days, sizing {}.",
        record.days,
        record.sizing_mode.as_str()
    ));
    doc.bullets([
        format!("Net PnL: {} USDC", fmt_dec(stats.net_pnl)),
        format!("Gross PnL: {} USDC", fmt_dec(stats.gross_pnl)),
        format!("Fees paid: {} USDC", fmt_dec(stats.total_fees)),
        format!("Trades: {}", stats.total_trades),
        format!("Win rate: {}%", fmt_dec(stats.win_rate)),
        format!("Sharpe: {}", fmt_dec(stats.sharpe_ratio)),
        format!("Sortino: {}", fmt_dec(stats.sortino_ratio)),
        format!("Max drawdown: {}%", fmt_dec(stats.max_drawdown_pct)),
        format!("Profit factor: {}", fmt_dec(stats.profit_factor)),
        format!("Average trade: {} USDC", fmt_dec(stats.avg_trade_pnl)),
        format!(
            "Average win / loss: {} / {} USDC",
            fmt_dec(stats.avg_win_pnl),
            fmt_dec(stats.avg_loss_pnl)
        ),
        format!("Max consecutive losses: {}", stats.max_consecutive_losses),
        format!("Annualized return: {}%", fmt_dec(stats.annualized_return_pct)),
        format!("Annualized Sharpe: {}", fmt_dec(stats.annualized_sharpe)),
        format!("Volume: {} USDC", fmt_dec(stats.total_volume)),
        format!("Confidence: {}", fmt_dec(stats.strategy_confidence)),
        format!("Composite score: {}", fmt_dec(stats.composite_score)),
    ]);
    if let Some(hit_rate) = stats.hit_rate {
        doc.line(format!("- Hit rate: {}%", fmt_dec(hit_rate)));
    }
    if let Some(locked) = stats.avg_locked_profit {
        doc.line(format!("- Average locked profit: {} per pair", fmt_dec(locked)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_builder_numbers_steps() {
        let mut doc = Doc::default();
        doc.section(2, "Data source");
        doc.steps(["fetch", "evaluate"]);
        let text = doc.finish();
        assert!(text.contains("## 2. Data source\n\n1. fetch\n2. evaluate\n"));
    }
}
