//! Risk thresholds and position sizing guidance
//!
//! Thresholds come from the record's own backtest statistics. They are
//! descriptive: the execution bot is the one that enforces them.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::record::BacktestStats;
use crate::types::SizingMode;

/// How circuit breakers are derived from historical statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskPolicy {
    /// Breaker drawdown = factor x historical max drawdown
    pub drawdown_factor: Decimal,
    /// Added to the historical worst losing streak
    pub loss_streak_margin: u32,
    /// Floor for the consecutive-loss breaker
    pub min_loss_streak: u32,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            drawdown_factor: dec!(1.5),
            loss_streak_margin: 3,
            min_loss_streak: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskThresholds {
    pub historical_max_drawdown_pct: Decimal,
    pub breaker_drawdown_pct: Decimal,
    pub historical_max_consecutive_losses: u32,
    pub breaker_consecutive_losses: u32,
}

impl RiskPolicy {
    pub fn derive(&self, stats: &BacktestStats) -> RiskThresholds {
        let drawdown = stats.max_drawdown_pct.abs();
        // Saturate: stored statistics are unbounded text
        let breaker = drawdown
            .checked_mul(self.drawdown_factor)
            .unwrap_or(Decimal::MAX);
        RiskThresholds {
            historical_max_drawdown_pct: drawdown,
            breaker_drawdown_pct: breaker.normalize(),
            historical_max_consecutive_losses: stats.max_consecutive_losses,
            breaker_consecutive_losses: stats
                .max_consecutive_losses
                .saturating_add(self.loss_streak_margin)
                .max(self.min_loss_streak),
        }
    }
}

impl RiskThresholds {
    pub fn describe(&self) -> Vec<String> {
        vec![
            format!(
                "Drawdown circuit breaker: halt trading when equity drawdown from peak exceeds {}% (historical max drawdown {}%).",
                self.breaker_drawdown_pct, self.historical_max_drawdown_pct
            ),
            format!(
                "Loss-streak circuit breaker: halt trading after {} consecutive losing trades (historical worst streak {}).",
                self.breaker_consecutive_losses, self.historical_max_consecutive_losses
            ),
            "When a breaker trips, stop opening new positions until an operator resets the bot.".to_string(),
        ]
    }
}

// ============================================================================
// Position sizing
// ============================================================================

pub const KELLY_WARMUP_TRADES: u32 = 10;
pub const KELLY_CAP_PCT: Decimal = dec!(25);

/// Sizing guidance for one sizing mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionSizing {
    pub mode: SizingMode,
    pub base_position_pct: Decimal,
    pub summary: String,
    pub rules: Vec<String>,
}

impl PositionSizing {
    pub fn for_mode(mode: SizingMode, base_position_pct: Decimal) -> Self {
        let (summary, rules) = match mode {
            SizingMode::Fixed => (
                format!("Fixed {base_position_pct}% of current capital per trade"),
                vec![format!(
                    "Position size = capital x {base_position_pct}% on every entry."
                )],
            ),
            SizingMode::Kelly => (
                format!("Kelly criterion, capped at {KELLY_CAP_PCT}%"),
                vec![
                    format!(
                        "Until {KELLY_WARMUP_TRADES} trades have closed, size at the base {base_position_pct}% of capital."
                    ),
                    "Then p = recent win rate, b = average win / average loss, q = 1 - p.".to_string(),
                    format!(
                        "Position % = clamp((p x b - q) / b x 100, 0, {KELLY_CAP_PCT}); if b <= 0 use 0."
                    ),
                ],
            ),
            SizingMode::ConfidenceWeighted => (
                format!("{base_position_pct}% of capital scaled by signal confidence"),
                vec![
                    format!("Position size = capital x {base_position_pct}% x confidence."),
                    "Confidence is the vote's strength in [0.3, 1.0], computed per indicator as listed under Signal logic; HOLD has confidence 0.".to_string(),
                ],
            ),
        };
        Self {
            mode,
            base_position_pct,
            summary,
            rules,
        }
    }
}

/// Kelly position percentage from a trailing trade window.
///
/// Falls back to `base_pct` during warmup or when no loss has been seen.
pub fn kelly_position_pct(
    wins: u32,
    total: u32,
    avg_win: Decimal,
    avg_loss: Decimal,
    base_pct: Decimal,
) -> Decimal {
    if total < KELLY_WARMUP_TRADES || avg_loss <= Decimal::ZERO {
        return base_pct;
    }
    let p = Decimal::from(wins) / Decimal::from(total);
    let q = Decimal::ONE - p;
    let b = avg_win / avg_loss;
    if b <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    ((p * b - q) / b * dec!(100)).clamp(Decimal::ZERO, KELLY_CAP_PCT)
}

/// Per-side size for the arbitrage variant: the position budget is split
/// evenly between the YES and NO legs.
pub fn arbitrage_size_per_side(capital: Decimal, base_position_pct: Decimal) -> Decimal {
    (capital * base_position_pct / dec!(100) / dec!(2)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(drawdown: Decimal, streak: u32) -> BacktestStats {
        BacktestStats {
            max_drawdown_pct: drawdown,
            max_consecutive_losses: streak,
            ..Default::default()
        }
    }

    #[test]
    fn test_breakers_from_stats() {
        let t = RiskPolicy::default().derive(&stats(dec!(12.4), 9));
        assert_eq!(t.breaker_drawdown_pct, dec!(18.6));
        assert_eq!(t.breaker_consecutive_losses, 12);
    }

    #[test]
    fn test_loss_streak_floor() {
        let t = RiskPolicy::default().derive(&stats(dec!(0), 0));
        assert_eq!(t.breaker_consecutive_losses, 10);
        assert_eq!(t.breaker_drawdown_pct, Decimal::ZERO);
    }

    #[test]
    fn test_negative_drawdown_is_magnitude() {
        let t = RiskPolicy::default().derive(&stats(dec!(-10), 7));
        assert_eq!(t.breaker_drawdown_pct, dec!(15));
        assert_eq!(t.breaker_consecutive_losses, 10);
    }

    #[test]
    fn test_huge_drawdown_saturates() {
        let huge = Decimal::from_str_exact("60000000000000000000000000000").unwrap();
        let t = RiskPolicy::default().derive(&stats(huge, 3));
        assert_eq!(t.historical_max_drawdown_pct, huge);
        assert_eq!(t.breaker_drawdown_pct, Decimal::MAX);
        assert_eq!(t.describe().len(), 3);
    }

    #[test]
    fn test_kelly_warmup_and_cap() {
        let base = dec!(10);
        assert_eq!(kelly_position_pct(5, 9, dec!(2), dec!(1), base), base);
        // p = 0.6, b = 1: (0.6 - 0.4) / 1 = 20%
        assert_eq!(kelly_position_pct(6, 10, dec!(1), dec!(1), base), dec!(20));
        // p = 0.9, b = 3: capped
        assert_eq!(kelly_position_pct(9, 10, dec!(3), dec!(1), base), KELLY_CAP_PCT);
        // losing edge floors at 0
        assert_eq!(kelly_position_pct(2, 10, dec!(1), dec!(1), base), Decimal::ZERO);
    }

    #[test]
    fn test_sizing_summaries() {
        let s = PositionSizing::for_mode(SizingMode::Kelly, dec!(10));
        assert!(s.summary.contains("25%"));
        assert_eq!(s.rules.len(), 3);
        let s = PositionSizing::for_mode(SizingMode::Fixed, dec!(10));
        assert!(s.summary.contains("10%"));
    }

    #[test]
    fn test_arbitrage_split() {
        assert_eq!(arbitrage_size_per_side(dec!(10000), dec!(10)), dec!(500));
    }
}
