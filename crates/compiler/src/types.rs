//! Shared value types for the specification compiler

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single candlestick (OHLCV)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
}

/// Atomic trading action emitted by an indicator or a composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    /// The action that vetoes this one in a primary/confirmer composition
    pub fn opposite(&self) -> Signal {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
            Self::Hold => Self::Hold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Hold => "HOLD",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position sizing mode used by the backtest that produced a record
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMode {
    #[default]
    Fixed,
    Kelly,
    ConfidenceWeighted,
}

impl SizingMode {
    /// Lenient parse: accepts snake_case, the Debug spelling stored by the
    /// discovery service (`ConfidenceWeighted`) and the CLI shorthand
    /// `confidence`. Anything else falls back to `Fixed`.
    pub fn parse(s: &str) -> SizingMode {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match key.as_str() {
            "kelly" => Self::Kelly,
            "confidence" | "confidenceweighted" => Self::ConfidenceWeighted,
            _ => Self::Fixed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Kelly => "kelly",
            Self::ConfidenceWeighted => "confidence_weighted",
        }
    }
}

/// f64 view of a candle, used by the numeric indicator code
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Bar {
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<&Kline> for Bar {
    fn from(kline: &Kline) -> Self {
        let close = kline.close.to_f64().unwrap_or(0.0);
        Self {
            high: kline.high.to_f64().unwrap_or(close),
            low: kline.low.to_f64().unwrap_or(close),
            close,
            volume: kline.volume.to_f64().unwrap_or(0.0),
        }
    }
}

impl ta::High for Bar {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Bar {
    fn low(&self) -> f64 {
        self.low
    }
}

impl ta::Close for Bar {
    fn close(&self) -> f64 {
        self.close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizing_mode_parse_variants() {
        assert_eq!(SizingMode::parse("kelly"), SizingMode::Kelly);
        assert_eq!(SizingMode::parse("Kelly"), SizingMode::Kelly);
        assert_eq!(
            SizingMode::parse("ConfidenceWeighted"),
            SizingMode::ConfidenceWeighted
        );
        assert_eq!(
            SizingMode::parse("confidence_weighted"),
            SizingMode::ConfidenceWeighted
        );
        assert_eq!(SizingMode::parse("confidence"), SizingMode::ConfidenceWeighted);
        assert_eq!(SizingMode::parse("Fixed"), SizingMode::Fixed);
        assert_eq!(SizingMode::parse("???"), SizingMode::Fixed);
    }

    #[test]
    fn test_signal_opposite() {
        assert_eq!(Signal::Buy.opposite(), Signal::Sell);
        assert_eq!(Signal::Sell.opposite(), Signal::Buy);
        assert_eq!(Signal::Hold.opposite(), Signal::Hold);
        assert_eq!(Signal::Buy.to_string(), "BUY");
    }
}
