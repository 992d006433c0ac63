//! Polymarket taker fee model
//!
//! Formula: fee = C × feeRate × (p × (1 - p))^exponent
//! Where C = shares, p = price, feeRate = 0.25, exponent = 2

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

const FEE_PRECISION: u32 = 4;

/// Taker fee parameters of the target market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeModel {
    /// Fee rate (default 0.25)
    pub fee_rate: Decimal,
    /// Exponent for the price factor (default 2)
    pub exponent: u32,
}

impl Default for FeeModel {
    fn default() -> Self {
        Self {
            fee_rate: dec!(0.25),
            exponent: 2,
        }
    }
}

impl FeeModel {
    /// Taker fee for `shares` at price `p`.
    ///
    /// - Rounded down to 4 decimal places
    /// - Returns 0 below 0.0001 USDC, and for p outside (0, 1)
    pub fn taker_fee(&self, shares: Decimal, price: Decimal) -> Decimal {
        if shares <= Decimal::ZERO || price <= Decimal::ZERO || price >= Decimal::ONE {
            return Decimal::ZERO;
        }

        let base = price * (Decimal::ONE - price);
        let factor = (0..self.exponent).fold(Decimal::ONE, |acc, _| acc * base);
        let raw_fee = shares * self.fee_rate * factor;

        let rounded = raw_fee.round_dp_with_strategy(
            FEE_PRECISION,
            rust_decimal::RoundingStrategy::ToZero,
        );
        if rounded < dec!(0.0001) {
            Decimal::ZERO
        } else {
            rounded
        }
    }

    /// Fee at p = 0.5, where p × (1 - p) peaks
    pub fn max_fee(&self, shares: Decimal) -> Decimal {
        self.taker_fee(shares, dec!(0.5))
    }

    /// Lines describing the fee model, with worked examples for 100 shares
    pub fn describe(&self) -> Vec<String> {
        let shares = dec!(100);
        let mut lines = vec![
            format!(
                "Taker fee per order: fee = shares x {} x (p x (1 - p))^{}, p = execution price of the outcome share.",
                self.fee_rate, self.exponent
            ),
            "Round the fee down to 4 decimals; fees below 0.0001 USDC are 0.".to_string(),
            "No fee when p <= 0, p >= 1 or shares <= 0.".to_string(),
            "Maker orders (resting bids) pay no taker fee.".to_string(),
        ];
        for p in [dec!(0.50), dec!(0.70), dec!(0.90)] {
            lines.push(format!(
                "Example: {shares} shares at p = {p} -> fee {}",
                self.taker_fee(shares, p)
            ));
        }
        lines
    }
}

/// Map an underlying price move to the probability the UP share trades at:
/// 0.5 + change% x 0.05, clamped to [0.05, 0.95].
pub fn estimate_settlement_probability(entry_price: Decimal, current_price: Decimal) -> Decimal {
    if entry_price <= Decimal::ZERO {
        return dec!(0.50);
    }
    let change_pct = (current_price - entry_price) / entry_price * dec!(100);
    (dec!(0.5) + change_pct * dec!(0.05))
        .clamp(dec!(0.05), dec!(0.95))
        .round_dp(FEE_PRECISION)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_at_50_50() {
        let fees = FeeModel::default();
        // 100 * 0.25 * (0.50 * 0.50)^2 = 1.5625
        assert_eq!(fees.taker_fee(dec!(100), dec!(0.50)), dec!(1.5625));
        assert_eq!(fees.max_fee(dec!(100)), dec!(1.5625));
    }

    #[test]
    fn test_fee_at_extreme_low() {
        let fees = FeeModel::default();
        // 100 * 0.25 * (0.05 * 0.95)^2 = 0.05640625 -> 0.0564
        assert_eq!(fees.taker_fee(dec!(100), dec!(0.05)), dec!(0.0564));
    }

    #[test]
    fn test_fee_symmetry() {
        let fees = FeeModel::default();
        assert_eq!(
            fees.taker_fee(dec!(100), dec!(0.30)),
            fees.taker_fee(dec!(100), dec!(0.70))
        );
    }

    #[test]
    fn test_fee_edge_prices() {
        let fees = FeeModel::default();
        assert_eq!(fees.taker_fee(dec!(100), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(fees.taker_fee(dec!(100), Decimal::ONE), Decimal::ZERO);
        assert_eq!(fees.taker_fee(Decimal::ZERO, dec!(0.5)), Decimal::ZERO);
    }

    #[test]
    fn test_fee_rounds_down() {
        let fees = FeeModel::default();
        // 1 * 0.25 * 0.0625 = 0.015625 -> 0.0156
        assert_eq!(fees.taker_fee(Decimal::ONE, dec!(0.50)), dec!(0.0156));
        // 0.001 * 0.25 * 0.0625 is below 0.0001
        assert_eq!(fees.taker_fee(dec!(0.001), dec!(0.50)), Decimal::ZERO);
    }

    #[test]
    fn test_max_fee_truncates_to_four_places() {
        let fees = FeeModel::default();
        // Exact value 0.015625 is cut, not rounded half-up to 0.0157
        assert_eq!(fees.max_fee(Decimal::ONE), dec!(0.0156));
        // 3 * 0.015625 = 0.046875
        assert_eq!(fees.max_fee(dec!(3)), dec!(0.0468));
        assert_eq!(fees.max_fee(dec!(100)), dec!(1.5625));
    }

    #[test]
    fn test_fee_peaks_at_half() {
        let fees = FeeModel::default();
        let peak = fees.max_fee(dec!(100));
        for p in [dec!(0.1), dec!(0.3), dec!(0.49), dec!(0.51), dec!(0.9)] {
            assert!(fees.taker_fee(dec!(100), p) < peak);
        }
    }

    #[test]
    fn test_describe_includes_examples() {
        let lines = FeeModel::default().describe();
        assert!(lines.iter().any(|l| l.contains("fee 1.5625")));
    }

    #[test]
    fn test_settlement_probability() {
        assert_eq!(estimate_settlement_probability(dec!(100), dec!(100)), dec!(0.5));
        // +1% -> 0.55
        assert_eq!(estimate_settlement_probability(dec!(100), dec!(101)), dec!(0.55));
        // +20% clamps
        assert_eq!(estimate_settlement_probability(dec!(100), dec!(120)), dec!(0.95));
        assert_eq!(estimate_settlement_probability(dec!(100), dec!(50)), dec!(0.05));
        assert_eq!(estimate_settlement_probability(Decimal::ZERO, dec!(1)), dec!(0.50));
    }
}
