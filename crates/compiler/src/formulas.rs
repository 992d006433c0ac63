//! Textual formula library
//!
//! For each indicator kind: a setup sentence, a parameter table, the ordered
//! computation steps and the vote rule, all written against the canonical
//! parameter names of the component being described.

use serde::Serialize;

use crate::gabagool::LOCKED_PROFIT_RULE;
use crate::registry::{IndicatorKind, LocalParams, ParamRole};

/// Placeholder rendered in place of a missing parameter value
pub const UNDEFINED_MARKER: &str = "undefined";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamRow {
    pub name: &'static str,
    pub value: String,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicatorDescription {
    pub indicator: IndicatorKind,
    pub title: &'static str,
    pub setup: String,
    pub parameters: Vec<ParamRow>,
    pub computation: Vec<String>,
    pub signal_rule: Vec<String>,
    /// How strong a BUY/SELL vote is, for confidence-weighted sizing
    pub confidence: Vec<String>,
}

/// Format a parameter value: integral values without decimals, others in
/// their shortest round-trip form.
pub fn fmt_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(fmt_value).unwrap_or_else(|| UNDEFINED_MARKER.to_string())
}

/// Describe one component. Never fails; missing values show as
/// [`UNDEFINED_MARKER`].
pub fn describe(kind: IndicatorKind, params: &LocalParams) -> IndicatorDescription {
    use ParamRole::*;

    // `k(role)` is the canonical key, `v(role)` the formatted value
    let k = |role: ParamRole| params.name(role);
    let v = |role: ParamRole| fmt_opt(params.get(role));
    let kv = |role: ParamRole| format!("{} = {}", k(role), v(role));

    let (setup, computation, signal_rule): (String, Vec<String>, Vec<String>) = match kind {
        IndicatorKind::Rsi => (
            format!(
                "Compute RSI over {} closes and compare it to the {} / {} levels.",
                kv(Period),
                kv(Overbought),
                kv(Oversold)
            ),
            vec![
                "For each closed candle compute change = close - previous close.".into(),
                "gain = max(change, 0); loss = max(-change, 0).".into(),
                format!(
                    "Seed avg_gain and avg_loss with the simple mean of the first {} gains and losses.",
                    k(Period)
                ),
                format!(
                    "Then smooth (Wilder): avg = (avg_prev x ({n} - 1) + current) / {n}.",
                    n = k(Period)
                ),
                "RSI = 100 - 100 / (1 + avg_gain / avg_loss); when avg_loss = 0, RSI = 100.".into(),
            ],
            vec![
                format!("BUY when RSI < {} ({}).", k(Oversold), v(Oversold)),
                format!("SELL when RSI > {} ({}).", k(Overbought), v(Overbought)),
                "HOLD otherwise, and until the first RSI value exists.".into(),
            ],
        ),

        IndicatorKind::BollingerBands => (
            format!(
                "Compute Bollinger Bands with {} and {}.",
                kv(Period),
                kv(Multiplier)
            ),
            vec![
                format!("middle = SMA(close, {}).", k(Period)),
                format!(
                    "sigma = population standard deviation of the last {} closes (divide by N, not N - 1).",
                    k(Period)
                ),
                format!("upper = middle + {m} x sigma; lower = middle - {m} x sigma.", m = k(Multiplier)),
            ],
            vec![
                "BUY when close < lower.".into(),
                "SELL when close > upper.".into(),
                "HOLD when lower <= close <= upper.".into(),
            ],
        ),

        IndicatorKind::Macd => (
            format!(
                "Compute MACD with {}, {} and {}.",
                kv(Fast),
                kv(Slow),
                kv(SignalPeriod)
            ),
            vec![
                format!("macd_line = EMA(close, {}) - EMA(close, {}).", k(Fast), k(Slow)),
                format!("signal_line = EMA(macd_line, {}).", k(SignalPeriod)),
                "histogram = macd_line - signal_line.".into(),
                format!(
                    "Ignore crossovers until more than {} candles have been processed.",
                    k(Slow)
                ),
            ],
            vec![
                "BUY when the histogram crosses up through zero (previous <= 0, current > 0).".into(),
                "SELL when the histogram crosses down through zero (previous >= 0, current < 0).".into(),
                "HOLD otherwise.".into(),
            ],
        ),

        IndicatorKind::EmaCrossover => (
            format!("Track two EMAs of close: {} and {}.", kv(Fast), kv(Slow)),
            vec![
                format!("fast = EMA(close, {}); slow = EMA(close, {}).", k(Fast), k(Slow)),
                "EMA uses alpha = 2 / (period + 1), seeded with the first close.".into(),
                format!("Ignore crosses until more than {} candles have been processed.", k(Slow)),
            ],
            vec![
                "BUY on a golden cross: previous fast <= previous slow and fast > slow.".into(),
                "SELL on a death cross: previous fast >= previous slow and fast < slow.".into(),
                "HOLD otherwise.".into(),
            ],
        ),

        IndicatorKind::Stochastic => (
            format!(
                "Compute the stochastic oscillator over {} with {} / {} zones.",
                kv(Period),
                kv(Overbought),
                kv(Oversold)
            ),
            vec![
                format!("HH = highest high, LL = lowest low over the last {} candles.", k(Period)),
                "%K = 100 x (close - LL) / (HH - LL).".into(),
                "%D = SMA(%K, 3) over the last 3 consecutive defined %K values; HOLD until 3 exist.".into(),
                "If HH = LL, %K is undefined, the vote is HOLD and %D restarts from the next defined %K.".into(),
            ],
            vec![
                format!(
                    "BUY when %K crosses above %D while %K < {} ({}).",
                    k(Oversold),
                    v(Oversold)
                ),
                format!(
                    "SELL when %K crosses below %D while %K > {} ({}).",
                    k(Overbought),
                    v(Overbought)
                ),
                "HOLD otherwise.".into(),
            ],
        ),

        IndicatorKind::AtrMeanReversion => (
            format!(
                "Build ATR bands around a moving average with {}, {} and {}.",
                kv(AtrPeriod),
                kv(SmaPeriod),
                kv(Multiplier)
            ),
            vec![
                "TR = max(high - low, |high - previous close|, |low - previous close|).".into(),
                format!("ATR = SMA(TR, {}).", k(AtrPeriod)),
                format!("mean = SMA(close, {}).", k(SmaPeriod)),
                format!("upper = mean + {m} x ATR; lower = mean - {m} x ATR.", m = k(Multiplier)),
            ],
            vec![
                "BUY when close < lower (stretched below the mean).".into(),
                "SELL when close > upper (stretched above the mean).".into(),
                "HOLD inside the bands.".into(),
            ],
        ),

        IndicatorKind::Vwap => (
            format!("Compute a rolling VWAP over {} candles.", kv(Period)),
            vec![
                "typical price tp = (high + low + close) / 3.".into(),
                format!("VWAP = sum(tp x volume) / sum(volume) over the last {} candles.", k(Period)),
                "If the summed volume is zero, the vote is HOLD.".into(),
            ],
            vec![
                "BUY when close < VWAP.".into(),
                "SELL when close > VWAP.".into(),
                "HOLD when close = VWAP.".into(),
            ],
        ),

        IndicatorKind::Obv => (
            format!("Accumulate on-balance volume and smooth it with {}.", kv(SmaPeriod)),
            vec![
                "OBV starts at 0.".into(),
                "close > previous close: OBV += volume; close < previous close: OBV -= volume; otherwise unchanged.".into(),
                format!("obv_sma = SMA(OBV, {}).", k(SmaPeriod)),
            ],
            vec![
                "BUY when OBV > obv_sma.".into(),
                "SELL when OBV < obv_sma.".into(),
                "HOLD when they are equal.".into(),
            ],
        ),

        IndicatorKind::WilliamsR => (
            format!(
                "Compute Williams %R over {} with {} / {} levels.",
                kv(Period),
                kv(Overbought),
                kv(Oversold)
            ),
            vec![
                format!("HH = highest high, LL = lowest low over the last {} candles.", k(Period)),
                "%R = -100 x (HH - close) / (HH - LL), in [-100, 0].".into(),
                "If HH = LL, %R is undefined and the vote is HOLD.".into(),
            ],
            vec![
                format!("BUY when %R < {} ({}).", k(Oversold), v(Oversold)),
                format!("SELL when %R > {} ({}).", k(Overbought), v(Overbought)),
                "HOLD otherwise.".into(),
            ],
        ),

        IndicatorKind::Adx => (
            format!(
                "Measure trend strength with ADX over {}, traded only above {}.",
                kv(Period),
                kv(AdxThreshold)
            ),
            vec![
                "+DM = high - previous high if it exceeds previous low - low and is positive, else 0.".into(),
                "-DM = previous low - low if it exceeds high - previous high and is positive, else 0.".into(),
                "TR as for ATR.".into(),
                format!(
                    "Smooth +DM, -DM and TR with alpha = 1 / {}: s = s_prev + alpha x (x - s_prev).",
                    k(Period)
                ),
                "+DI = 100 x smoothed +DM / smoothed TR; -DI = 100 x smoothed -DM / smoothed TR.".into(),
                "DX = 100 x |+DI - -DI| / (+DI + -DI).".into(),
                format!("ADX = DX smoothed the same way with alpha = 1 / {}.", k(Period)),
            ],
            vec![
                format!("Vote only when ADX > {} ({}); otherwise HOLD.", k(AdxThreshold), v(AdxThreshold)),
                "BUY when +DI > -DI.".into(),
                "SELL when -DI > +DI.".into(),
            ],
        ),

        IndicatorKind::Gabagool => (
            format!(
                "Synthesize a YES/NO binary market from each candle and buy both sides when {}, using {} and {}.",
                kv(MaxPairCost),
                kv(BidOffset),
                kv(SpreadMultiplier)
            ),
            vec![
                "price_change = (close - open) / open.".into(),
                "yes_mid = 0.5 + clamp(price_change x 5, -0.40, 0.40); no_mid = 1 - yes_mid.".into(),
                "volatility = (high - low) / open.".into(),
                format!("spread = clamp(volatility x {}, 0.02, 0.10).", k(SpreadMultiplier)),
                format!(
                    "yes_fill = clamp(yes_mid - spread / 2 - {b}, 0.05, 0.95); no_fill = clamp(no_mid - spread / 2 - {b}, 0.05, 0.95).",
                    b = k(BidOffset)
                ),
                "pair_cost = yes_fill + no_fill.".into(),
            ],
            vec![
                format!(
                    "TRADE (buy YES and NO) when pair_cost < {} ({}), strictly.",
                    k(MaxPairCost),
                    v(MaxPairCost)
                ),
                "SKIP otherwise.".into(),
                format!("{LOCKED_PROFIT_RULE}."),
            ],
        ),
    };

    let parameters = params
        .values
        .iter()
        .map(|p| ParamRow {
            name: p.spec.name,
            value: fmt_opt(p.value),
            description: p.spec.description,
        })
        .collect();

    IndicatorDescription {
        indicator: kind,
        title: kind.display_name(),
        setup,
        parameters,
        computation,
        signal_rule,
        confidence: confidence_rule(kind, params),
    }
}

/// Lower and upper bound of a directional vote's confidence
pub const CONFIDENCE_RANGE: (f64, f64) = (0.3, 1.0);

fn confidence_rule(kind: IndicatorKind, params: &LocalParams) -> Vec<String> {
    use ParamRole::*;

    let k = |role: ParamRole| params.name(role);
    let mut lines: Vec<String> = match kind {
        IndicatorKind::Rsi => vec![
            format!("BUY: ({os} - RSI) / {os}.", os = k(Oversold)),
            format!("SELL: (RSI - {ob}) / (100 - {ob}).", ob = k(Overbought)),
        ],
        IndicatorKind::BollingerBands => vec![
            "BUY: (lower - close) / (upper - lower).".into(),
            "SELL: (close - upper) / (upper - lower).".into(),
        ],
        IndicatorKind::Macd => vec!["|histogram| / close x 1000.".into()],
        IndicatorKind::EmaCrossover => vec!["|fast - slow| / slow x 100.".into()],
        IndicatorKind::Stochastic => vec![
            format!("BUY: ({os} - %K) / {os}.", os = k(Oversold)),
            format!("SELL: (%K - {ob}) / (100 - {ob}).", ob = k(Overbought)),
        ],
        IndicatorKind::AtrMeanReversion => {
            vec![format!("|close - mean| / ({} x ATR).", k(Multiplier))]
        }
        IndicatorKind::Vwap => vec!["|close - VWAP| / VWAP x 10.".into()],
        IndicatorKind::Obv => vec![
            "slope = (OBV - OBV two candles earlier) / 2.".into(),
            "|slope| / max(volume of the current candle, 1), capped at 1.".into(),
        ],
        IndicatorKind::WilliamsR => vec![
            format!("BUY: ({os} - %R) / (100 + {os}).", os = k(Oversold)),
            format!("SELL: (%R - {ob}) / -{ob}.", ob = k(Overbought)),
        ],
        IndicatorKind::Adx => vec!["min(ADX / 100, 1).".into()],
        IndicatorKind::Gabagool => {
            return vec!["Not used: both legs are sized from the base position.".into()]
        }
    };
    let (low, high) = CONFIDENCE_RANGE;
    lines.push(format!(
        "Clamp to [{}, {}]; a HOLD vote has confidence 0.",
        fmt_value(low),
        fmt_value(high)
    ));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamSet;
    use crate::registry::all_variants;

    #[test]
    fn test_setup_mentions_every_canonical_key() {
        for desc in all_variants() {
            let canonical = desc.canonicalize(&ParamSet::new());
            for (component, local) in desc.components().iter().zip(&canonical.components) {
                let text = describe(component.indicator, local);
                for spec in component.params {
                    assert!(
                        text.setup.contains(spec.name),
                        "{}: setup for {:?} misses `{}`",
                        desc.name,
                        component.indicator,
                        spec.name
                    );
                }
            }
        }
    }

    #[test]
    fn test_missing_values_render_undefined() {
        let desc = crate::registry::resolve("rsi").unwrap();
        let params: ParamSet = [("period", 14.0)].into_iter().collect();
        let canonical = desc.canonicalize(&params);
        let text = describe(IndicatorKind::Rsi, &canonical.components[0]);

        assert_eq!(text.parameters[0].value, "14");
        assert_eq!(text.parameters[1].value, UNDEFINED_MARKER);
        assert!(text.setup.contains("overbought = undefined"));
    }

    #[test]
    fn test_composite_uses_prefixed_names() {
        let desc = crate::registry::resolve("stoch_rsi").unwrap();
        let params: ParamSet = [("stoch_ob", 80.0), ("rsi_os", 30.0)].into_iter().collect();
        let canonical = desc.canonicalize(&params);
        let stoch = describe(IndicatorKind::Stochastic, &canonical.components[0]);
        assert!(stoch.signal_rule[1].contains("stoch_overbought (80)"));
        let rsi = describe(IndicatorKind::Rsi, &canonical.components[1]);
        assert!(rsi.signal_rule[0].contains("rsi_oversold (30)"));
    }

    #[test]
    fn test_confidence_uses_component_names() {
        let desc = crate::registry::resolve("stoch_rsi").unwrap();
        let canonical = desc.canonicalize(&ParamSet::new());
        let stoch = describe(IndicatorKind::Stochastic, &canonical.components[0]);
        assert!(stoch.confidence[0].contains("stoch_oversold - %K"));
        assert_eq!(
            stoch.confidence.last().map(String::as_str),
            Some("Clamp to [0.3, 1]; a HOLD vote has confidence 0.")
        );

        let gabagool = crate::registry::resolve("gabagool").unwrap();
        let canonical = gabagool.canonicalize(&ParamSet::new());
        let text = describe(IndicatorKind::Gabagool, &canonical.components[0]);
        assert_eq!(text.confidence.len(), 1);
    }

    #[test]
    fn test_fmt_value() {
        assert_eq!(fmt_value(14.0), "14");
        assert_eq!(fmt_value(2.5), "2.5");
        assert_eq!(fmt_value(0.98), "0.98");
        assert_eq!(fmt_value(-20.0), "-20");
    }
}
