//! Gabagool binary arbitrage quote
//!
//! Each candle becomes a synthetic "up or down?" binary market. YES/NO mids
//! are derived from the candle's move, a volatility-scaled spread is taken
//! off both sides, and the pair is bought only when YES fill + NO fill is
//! below the configured ceiling. Settlement pays 1.00 per pair either way.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::error::FormulaError;
use crate::registry::{LocalParams, ParamRole};
use crate::types::Kline;

const HALF: Decimal = dec!(0.50);
const MOVE_SCALE: Decimal = dec!(5);
const MOVE_CLAMP: Decimal = dec!(0.40);
const SPREAD_FLOOR: Decimal = dec!(0.02);
const SPREAD_CEIL: Decimal = dec!(0.10);
const FILL_FLOOR: Decimal = dec!(0.05);
const FILL_CEIL: Decimal = dec!(0.95);

pub const LOCKED_PROFIT_RULE: &str =
    "Locked profit per share pair = 1.00 - pair_cost, whatever the outcome";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GabagoolParams {
    /// Trade only when pair cost is strictly below this (e.g. 0.98)
    pub max_pair_cost: Decimal,
    /// Bid offset below mid price for maker orders
    pub bid_offset: Decimal,
    /// spread = volatility * multiplier
    pub spread_multiplier: Decimal,
}

impl GabagoolParams {
    pub fn from_params(params: &LocalParams) -> Result<Self, FormulaError> {
        Ok(Self {
            max_pair_cost: decimal(params, ParamRole::MaxPairCost)?,
            bid_offset: decimal(params, ParamRole::BidOffset)?,
            spread_multiplier: decimal(params, ParamRole::SpreadMultiplier)?,
        })
    }
}

fn decimal(params: &LocalParams, role: ParamRole) -> Result<Decimal, FormulaError> {
    let name = params.name(role);
    let value = params.get(role).ok_or(FormulaError::MissingParameter(name))?;
    // Through the shortest decimal spelling so 0.98 stays 0.98
    Decimal::from_str(&value.to_string()).map_err(|_| FormulaError::InvalidParameter {
        name,
        value,
        reason: "not representable as a decimal",
    })
}

/// Whether a pair is bought at a given cost
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PairDecision {
    Trade,
    Skip,
}

impl PairDecision {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Trade => "TRADE",
            Self::Skip => "SKIP",
        }
    }
}

/// Strict: a pair cost equal to the ceiling is skipped
pub fn decide(pair_cost: Decimal, max_pair_cost: Decimal) -> PairDecision {
    if pair_cost < max_pair_cost {
        PairDecision::Trade
    } else {
        PairDecision::Skip
    }
}

/// Synthetic quote for one candle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GabagoolQuote {
    pub yes_mid: Decimal,
    pub no_mid: Decimal,
    pub spread: Decimal,
    pub yes_fill: Decimal,
    pub no_fill: Decimal,
    pub pair_cost: Decimal,
    pub decision: PairDecision,
    /// 1.00 - pair_cost per share pair when traded, else 0
    pub locked_profit: Decimal,
}

pub fn quote(candle: &Kline, params: &GabagoolParams) -> GabagoolQuote {
    let (price_move, volatility) = if candle.open > Decimal::ZERO {
        (
            (candle.close - candle.open) / candle.open,
            (candle.high - candle.low) / candle.open,
        )
    } else {
        (Decimal::ZERO, Decimal::ZERO)
    };

    let deviation = (price_move * MOVE_SCALE).clamp(-MOVE_CLAMP, MOVE_CLAMP);
    let yes_mid = HALF + deviation;
    let no_mid = Decimal::ONE - yes_mid;

    let spread = (volatility * params.spread_multiplier).clamp(SPREAD_FLOOR, SPREAD_CEIL);
    let half_spread = spread / dec!(2);

    let yes_fill = (yes_mid - half_spread - params.bid_offset).clamp(FILL_FLOOR, FILL_CEIL);
    let no_fill = (no_mid - half_spread - params.bid_offset).clamp(FILL_FLOOR, FILL_CEIL);
    let pair_cost = yes_fill + no_fill;

    let decision = decide(pair_cost, params.max_pair_cost);
    let locked_profit = match decision {
        PairDecision::Trade => Decimal::ONE - pair_cost,
        PairDecision::Skip => Decimal::ZERO,
    };

    GabagoolQuote {
        yes_mid,
        no_mid,
        spread,
        yes_fill,
        no_fill,
        pair_cost,
        decision,
        locked_profit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_kline(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Kline {
        Kline {
            open_time: 0,
            open,
            high,
            low,
            close,
            volume: dec!(100),
            close_time: 899_999,
        }
    }

    fn params(max_pair_cost: Decimal, bid_offset: Decimal) -> GabagoolParams {
        GabagoolParams {
            max_pair_cost,
            bid_offset,
            spread_multiplier: dec!(3),
        }
    }

    #[test]
    fn test_decide_is_strict() {
        assert_eq!(decide(dec!(0.97), dec!(0.97)), PairDecision::Skip);
        assert_eq!(decide(dec!(0.9699), dec!(0.97)), PairDecision::Trade);
        assert_eq!(decide(dec!(0.98), dec!(0.97)), PairDecision::Skip);
    }

    #[test]
    fn test_flat_candle_pair_cost() {
        let k = make_kline(dec!(100), dec!(100), dec!(100), dec!(100));
        let q = quote(&k, &params(dec!(0.98), dec!(0.005)));
        assert_eq!(q.spread, dec!(0.02));
        assert_eq!(q.yes_fill, dec!(0.485));
        assert_eq!(q.no_fill, dec!(0.485));
        assert_eq!(q.pair_cost, dec!(0.97));
        assert_eq!(q.decision, PairDecision::Trade);
        assert_eq!(q.locked_profit, dec!(0.03));
    }

    #[test]
    fn test_boundary_candle_skipped() {
        let k = make_kline(dec!(100), dec!(100), dec!(100), dec!(100));
        let q = quote(&k, &params(dec!(0.97), dec!(0.005)));
        assert_eq!(q.decision, PairDecision::Skip);
        assert_eq!(q.locked_profit, Decimal::ZERO);
    }

    #[test]
    fn test_large_move_clamps_mid_and_spread() {
        // +20% move, 30% range: deviation clamps at 0.40, spread at 0.10
        let k = make_kline(dec!(100), dec!(130), dec!(100), dec!(120));
        let q = quote(&k, &params(dec!(0.98), dec!(0.01)));
        assert_eq!(q.yes_mid, dec!(0.90));
        assert_eq!(q.no_mid, dec!(0.10));
        assert_eq!(q.spread, dec!(0.10));
        assert_eq!(q.yes_fill, dec!(0.84));
        // 0.10 - 0.05 - 0.01 = 0.04, floored at 0.05
        assert_eq!(q.no_fill, dec!(0.05));
        assert_eq!(q.pair_cost, dec!(0.89));
    }

    #[test]
    fn test_zero_open_is_neutral() {
        let k = make_kline(Decimal::ZERO, dec!(1), Decimal::ZERO, dec!(1));
        let q = quote(&k, &params(dec!(0.98), dec!(0.01)));
        assert_eq!(q.yes_mid, HALF);
        assert_eq!(q.spread, SPREAD_FLOOR);
    }
}
