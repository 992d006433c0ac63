//! Numeric reference computation
//!
//! A bar-by-bar `SignalGenerator` per indicator kind, mirroring the formulas
//! in [`crate::formulas`]. Used to evaluate a strategy's vote on the latest
//! closed candle and to pin the documented formulas down with tests.

use std::collections::VecDeque;

use serde::Serialize;
use ta::indicators::{
    BollingerBands, ExponentialMovingAverage, Maximum, Minimum, MovingAverageConvergenceDivergence,
    SimpleMovingAverage, TrueRange,
};
use ta::{Next, Reset};

use crate::composer::{compose, Composition};
use crate::error::FormulaError;
use crate::gabagool::{self, GabagoolParams, GabagoolQuote};
use crate::registry::{
    CanonicalParams, CompositionMode, IndicatorKind, LocalParams, ParamRole, VariantDescriptor,
};
use crate::types::{Bar, Kline, Signal};

// ============================================================================
// Core trait
// ============================================================================

/// Trait for bar-by-bar signal generation
pub trait SignalGenerator: Send {
    fn name(&self) -> &str;
    fn on_bar(&mut self, kline: &Kline) -> Signal;
    /// Latest indicator reading, once warmed up
    fn value(&self) -> Option<f64>;
    fn reset(&mut self);
}

// ============================================================================
// Parameter validation
// ============================================================================

const MAX_PERIOD: f64 = 10_000.0;

fn period(params: &LocalParams, role: ParamRole) -> Result<usize, FormulaError> {
    let name = params.name(role);
    let value = params.get(role).ok_or(FormulaError::MissingParameter(name))?;
    let reason = if value < 1.0 {
        Some("period must be at least 1")
    } else if value.fract() != 0.0 {
        Some("period must be a whole number")
    } else if value > MAX_PERIOD {
        Some("period is unreasonably large")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(FormulaError::InvalidParameter {
            name,
            value,
            reason,
        }),
        None => Ok(value as usize),
    }
}

fn level(params: &LocalParams, role: ParamRole) -> Result<f64, FormulaError> {
    params
        .get(role)
        .ok_or(FormulaError::MissingParameter(params.name(role)))
}

fn positive(params: &LocalParams, role: ParamRole) -> Result<f64, FormulaError> {
    let value = level(params, role)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(FormulaError::InvalidParameter {
            name: params.name(role),
            value,
            reason: "must be positive",
        })
    }
}

// ============================================================================
// 1. RSI (Wilder smoothing)
// ============================================================================

pub struct RsiSignalGenerator {
    period: usize,
    overbought: f64,
    oversold: f64,
    prev_close: Option<f64>,
    changes_seen: usize,
    avg_gain: f64,
    avg_loss: f64,
    rsi: Option<f64>,
}

impl RsiSignalGenerator {
    pub fn new(period: usize, overbought: f64, oversold: f64) -> Self {
        Self {
            period,
            overbought,
            oversold,
            prev_close: None,
            changes_seen: 0,
            avg_gain: 0.0,
            avg_loss: 0.0,
            rsi: None,
        }
    }

    fn index(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        }
    }
}

impl SignalGenerator for RsiSignalGenerator {
    fn name(&self) -> &str {
        "RSI"
    }

    fn on_bar(&mut self, kline: &Kline) -> Signal {
        let close = Bar::from(kline).close;
        let Some(prev) = self.prev_close.replace(close) else {
            return Signal::Hold;
        };

        let change = close - prev;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        let n = self.period as f64;
        self.changes_seen += 1;

        if self.changes_seen <= self.period {
            // Seed with the simple mean of the first `period` changes
            self.avg_gain += gain / n;
            self.avg_loss += loss / n;
            if self.changes_seen < self.period {
                return Signal::Hold;
            }
        } else {
            self.avg_gain = (self.avg_gain * (n - 1.0) + gain) / n;
            self.avg_loss = (self.avg_loss * (n - 1.0) + loss) / n;
        }

        let rsi = Self::index(self.avg_gain, self.avg_loss);
        self.rsi = Some(rsi);

        if rsi < self.oversold {
            Signal::Buy
        } else if rsi > self.overbought {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }

    fn value(&self) -> Option<f64> {
        self.rsi
    }

    fn reset(&mut self) {
        *self = Self::new(self.period, self.overbought, self.oversold);
    }
}

// ============================================================================
// 2. Bollinger Bands
// ============================================================================

pub struct BollingerSignalGenerator {
    bb: BollingerBands,
    period: usize,
    bars_seen: usize,
    last_middle: Option<f64>,
}

impl BollingerSignalGenerator {
    pub fn new(period: usize, multiplier: f64) -> Result<Self, FormulaError> {
        Ok(Self {
            // ta's standard deviation divides by N (population)
            bb: BollingerBands::new(period, multiplier)?,
            period,
            bars_seen: 0,
            last_middle: None,
        })
    }
}

impl SignalGenerator for BollingerSignalGenerator {
    fn name(&self) -> &str {
        "BollingerBands"
    }

    fn on_bar(&mut self, kline: &Kline) -> Signal {
        let close = Bar::from(kline).close;
        let out = self.bb.next(close);
        self.bars_seen += 1;

        if self.bars_seen < self.period {
            return Signal::Hold;
        }
        self.last_middle = Some(out.average);

        if close < out.lower {
            Signal::Buy
        } else if close > out.upper {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }

    fn value(&self) -> Option<f64> {
        self.last_middle
    }

    fn reset(&mut self) {
        self.bb.reset();
        self.bars_seen = 0;
        self.last_middle = None;
    }
}

// ============================================================================
// 3. MACD
// ============================================================================

pub struct MacdSignalGenerator {
    macd: MovingAverageConvergenceDivergence,
    slow: usize,
    prev_histogram: f64,
    histogram: Option<f64>,
    bars_seen: usize,
}

impl MacdSignalGenerator {
    pub fn new(fast: usize, slow: usize, signal_period: usize) -> Result<Self, FormulaError> {
        Ok(Self {
            macd: MovingAverageConvergenceDivergence::new(fast, slow, signal_period)?,
            slow,
            prev_histogram: 0.0,
            histogram: None,
            bars_seen: 0,
        })
    }
}

impl SignalGenerator for MacdSignalGenerator {
    fn name(&self) -> &str {
        "MACD"
    }

    fn on_bar(&mut self, kline: &Kline) -> Signal {
        let close = Bar::from(kline).close;
        let histogram = self.macd.next(close).histogram;
        self.bars_seen += 1;

        let warmed_up = self.bars_seen > self.slow;
        let signal = if warmed_up && self.prev_histogram <= 0.0 && histogram > 0.0 {
            Signal::Buy
        } else if warmed_up && self.prev_histogram >= 0.0 && histogram < 0.0 {
            Signal::Sell
        } else {
            Signal::Hold
        };

        self.prev_histogram = histogram;
        if warmed_up {
            self.histogram = Some(histogram);
        }
        signal
    }

    fn value(&self) -> Option<f64> {
        self.histogram
    }

    fn reset(&mut self) {
        self.macd.reset();
        self.prev_histogram = 0.0;
        self.histogram = None;
        self.bars_seen = 0;
    }
}

// ============================================================================
// 4. EMA Crossover
// ============================================================================

pub struct EmaCrossoverSignalGenerator {
    ema_fast: ExponentialMovingAverage,
    ema_slow: ExponentialMovingAverage,
    slow_period: usize,
    prev_fast: f64,
    prev_slow: f64,
    bars_seen: usize,
}

impl EmaCrossoverSignalGenerator {
    pub fn new(fast_period: usize, slow_period: usize) -> Result<Self, FormulaError> {
        Ok(Self {
            ema_fast: ExponentialMovingAverage::new(fast_period)?,
            ema_slow: ExponentialMovingAverage::new(slow_period)?,
            slow_period,
            prev_fast: 0.0,
            prev_slow: 0.0,
            bars_seen: 0,
        })
    }
}

impl SignalGenerator for EmaCrossoverSignalGenerator {
    fn name(&self) -> &str {
        "EMACrossover"
    }

    fn on_bar(&mut self, kline: &Kline) -> Signal {
        let close = Bar::from(kline).close;
        let fast = self.ema_fast.next(close);
        let slow = self.ema_slow.next(close);
        self.bars_seen += 1;

        let signal = if self.bars_seen <= self.slow_period {
            Signal::Hold
        } else if self.prev_fast <= self.prev_slow && fast > slow {
            // Golden cross
            Signal::Buy
        } else if self.prev_fast >= self.prev_slow && fast < slow {
            // Death cross
            Signal::Sell
        } else {
            Signal::Hold
        };

        self.prev_fast = fast;
        self.prev_slow = slow;
        signal
    }

    fn value(&self) -> Option<f64> {
        (self.bars_seen > self.slow_period).then(|| self.prev_fast - self.prev_slow)
    }

    fn reset(&mut self) {
        self.ema_fast.reset();
        self.ema_slow.reset();
        self.prev_fast = 0.0;
        self.prev_slow = 0.0;
        self.bars_seen = 0;
    }
}

// ============================================================================
// 5. Stochastic Oscillator
// ============================================================================

pub struct StochasticSignalGenerator {
    highest: Maximum,
    lowest: Minimum,
    period: usize,
    overbought: f64,
    oversold: f64,
    /// Consecutive defined %K values, at most 3
    k_window: VecDeque<f64>,
    k: Option<f64>,
    /// (%K, %D) of the previous bar, when both were defined
    prev: Option<(f64, f64)>,
    bars_seen: usize,
}

impl StochasticSignalGenerator {
    pub fn new(period: usize, overbought: f64, oversold: f64) -> Result<Self, FormulaError> {
        Ok(Self {
            highest: Maximum::new(period)?,
            lowest: Minimum::new(period)?,
            period,
            overbought,
            oversold,
            k_window: VecDeque::with_capacity(3),
            k: None,
            prev: None,
            bars_seen: 0,
        })
    }
}

impl SignalGenerator for StochasticSignalGenerator {
    fn name(&self) -> &str {
        "Stochastic"
    }

    fn on_bar(&mut self, kline: &Kline) -> Signal {
        let bar = Bar::from(kline);
        let hh = self.highest.next(bar.high);
        let ll = self.lowest.next(bar.low);
        self.bars_seen += 1;

        if self.bars_seen < self.period || hh == ll {
            // %K undefined: %D restarts from the next defined %K
            self.k = None;
            self.k_window.clear();
            self.prev = None;
            return Signal::Hold;
        }

        let k = 100.0 * (bar.close - ll) / (hh - ll);
        self.k = Some(k);
        self.k_window.push_back(k);
        if self.k_window.len() > 3 {
            self.k_window.pop_front();
        }
        if self.k_window.len() < 3 {
            self.prev = None;
            return Signal::Hold;
        }
        let d = self.k_window.iter().sum::<f64>() / 3.0;

        let signal = match self.prev {
            Some((prev_k, prev_d)) if prev_k < prev_d && k > d && k < self.oversold => Signal::Buy,
            Some((prev_k, prev_d)) if prev_k > prev_d && k < d && k > self.overbought => {
                Signal::Sell
            }
            _ => Signal::Hold,
        };

        self.prev = Some((k, d));
        signal
    }

    fn value(&self) -> Option<f64> {
        self.k
    }

    fn reset(&mut self) {
        self.highest.reset();
        self.lowest.reset();
        self.k_window.clear();
        self.k = None;
        self.prev = None;
        self.bars_seen = 0;
    }
}

// ============================================================================
// 6. ATR Mean Reversion
// ============================================================================

pub struct AtrMeanReversionSignalGenerator {
    true_range: TrueRange,
    atr: SimpleMovingAverage,
    sma: SimpleMovingAverage,
    warmup: usize,
    multiplier: f64,
    last_atr: Option<f64>,
    bars_seen: usize,
}

impl AtrMeanReversionSignalGenerator {
    pub fn new(atr_period: usize, sma_period: usize, multiplier: f64) -> Result<Self, FormulaError> {
        Ok(Self {
            true_range: TrueRange::new(),
            atr: SimpleMovingAverage::new(atr_period)?,
            sma: SimpleMovingAverage::new(sma_period)?,
            warmup: atr_period.max(sma_period),
            multiplier,
            last_atr: None,
            bars_seen: 0,
        })
    }
}

impl SignalGenerator for AtrMeanReversionSignalGenerator {
    fn name(&self) -> &str {
        "ATRMeanReversion"
    }

    fn on_bar(&mut self, kline: &Kline) -> Signal {
        let bar = Bar::from(kline);
        let tr = self.true_range.next(&bar);
        let atr = self.atr.next(tr);
        let mean = self.sma.next(bar.close);
        self.bars_seen += 1;

        if self.bars_seen < self.warmup {
            return Signal::Hold;
        }
        self.last_atr = Some(atr);

        let upper = mean + self.multiplier * atr;
        let lower = mean - self.multiplier * atr;
        if bar.close < lower {
            Signal::Buy
        } else if bar.close > upper {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }

    fn value(&self) -> Option<f64> {
        self.last_atr
    }

    fn reset(&mut self) {
        self.true_range.reset();
        self.atr.reset();
        self.sma.reset();
        self.last_atr = None;
        self.bars_seen = 0;
    }
}

// ============================================================================
// 7. VWAP (rolling)
// ============================================================================

pub struct VwapSignalGenerator {
    period: usize,
    /// (typical price x volume, volume) per bar
    window: VecDeque<(f64, f64)>,
    vwap: Option<f64>,
}

impl VwapSignalGenerator {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            window: VecDeque::with_capacity(period),
            vwap: None,
        }
    }
}

impl SignalGenerator for VwapSignalGenerator {
    fn name(&self) -> &str {
        "VWAP"
    }

    fn on_bar(&mut self, kline: &Kline) -> Signal {
        let bar = Bar::from(kline);
        let typical = (bar.high + bar.low + bar.close) / 3.0;
        self.window.push_back((typical * bar.volume, bar.volume));
        if self.window.len() > self.period {
            self.window.pop_front();
        }
        if self.window.len() < self.period {
            return Signal::Hold;
        }

        let (pv, v) = self
            .window
            .iter()
            .fold((0.0, 0.0), |(pv, v), (x, y)| (pv + x, v + y));
        if v <= 0.0 {
            self.vwap = None;
            return Signal::Hold;
        }

        let vwap = pv / v;
        self.vwap = Some(vwap);
        if bar.close < vwap {
            Signal::Buy
        } else if bar.close > vwap {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }

    fn value(&self) -> Option<f64> {
        self.vwap
    }

    fn reset(&mut self) {
        self.window.clear();
        self.vwap = None;
    }
}

// ============================================================================
// 8. OBV (On-Balance Volume)
// ============================================================================

pub struct ObvSignalGenerator {
    sma: SimpleMovingAverage,
    sma_period: usize,
    obv: f64,
    prev_close: Option<f64>,
    bars_seen: usize,
}

impl ObvSignalGenerator {
    pub fn new(sma_period: usize) -> Result<Self, FormulaError> {
        Ok(Self {
            sma: SimpleMovingAverage::new(sma_period)?,
            sma_period,
            obv: 0.0,
            prev_close: None,
            bars_seen: 0,
        })
    }
}

impl SignalGenerator for ObvSignalGenerator {
    fn name(&self) -> &str {
        "OBV"
    }

    fn on_bar(&mut self, kline: &Kline) -> Signal {
        let bar = Bar::from(kline);
        if let Some(prev) = self.prev_close.replace(bar.close) {
            if bar.close > prev {
                self.obv += bar.volume;
            } else if bar.close < prev {
                self.obv -= bar.volume;
            }
        }
        let smoothed = self.sma.next(self.obv);
        self.bars_seen += 1;

        if self.bars_seen < self.sma_period {
            return Signal::Hold;
        }
        if self.obv > smoothed {
            Signal::Buy
        } else if self.obv < smoothed {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }

    fn value(&self) -> Option<f64> {
        (self.bars_seen > 0).then_some(self.obv)
    }

    fn reset(&mut self) {
        self.sma.reset();
        self.obv = 0.0;
        self.prev_close = None;
        self.bars_seen = 0;
    }
}

// ============================================================================
// 9. Williams %R
// ============================================================================

pub struct WilliamsRSignalGenerator {
    highest: Maximum,
    lowest: Minimum,
    period: usize,
    overbought: f64,
    oversold: f64,
    wr: Option<f64>,
    bars_seen: usize,
}

impl WilliamsRSignalGenerator {
    pub fn new(period: usize, overbought: f64, oversold: f64) -> Result<Self, FormulaError> {
        Ok(Self {
            highest: Maximum::new(period)?,
            lowest: Minimum::new(period)?,
            period,
            overbought,
            oversold,
            wr: None,
            bars_seen: 0,
        })
    }
}

impl SignalGenerator for WilliamsRSignalGenerator {
    fn name(&self) -> &str {
        "WilliamsR"
    }

    fn on_bar(&mut self, kline: &Kline) -> Signal {
        let bar = Bar::from(kline);
        let hh = self.highest.next(bar.high);
        let ll = self.lowest.next(bar.low);
        self.bars_seen += 1;

        if self.bars_seen < self.period || hh == ll {
            self.wr = None;
            return Signal::Hold;
        }

        let wr = -100.0 * (hh - bar.close) / (hh - ll);
        self.wr = Some(wr);
        if wr < self.oversold {
            Signal::Buy
        } else if wr > self.overbought {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }

    fn value(&self) -> Option<f64> {
        self.wr
    }

    fn reset(&mut self) {
        self.highest.reset();
        self.lowest.reset();
        self.wr = None;
        self.bars_seen = 0;
    }
}

// ============================================================================
// 10. ADX (Average Directional Index)
// ============================================================================

pub struct AdxSignalGenerator {
    period: usize,
    adx_threshold: f64,
    prev: Option<Bar>,
    plus_dm_avg: f64,
    minus_dm_avg: f64,
    tr_avg: f64,
    adx: Option<f64>,
    bars_seen: usize,
}

impl AdxSignalGenerator {
    pub fn new(period: usize, adx_threshold: f64) -> Self {
        Self {
            period,
            adx_threshold,
            prev: None,
            plus_dm_avg: 0.0,
            minus_dm_avg: 0.0,
            tr_avg: 0.0,
            adx: None,
            bars_seen: 0,
        }
    }
}

impl SignalGenerator for AdxSignalGenerator {
    fn name(&self) -> &str {
        "ADX"
    }

    fn on_bar(&mut self, kline: &Kline) -> Signal {
        let bar = Bar::from(kline);
        self.bars_seen += 1;
        let Some(prev) = self.prev.replace(bar) else {
            return Signal::Hold;
        };

        let tr = (bar.high - bar.low)
            .max((bar.high - prev.close).abs())
            .max((bar.low - prev.close).abs());
        let up_move = bar.high - prev.high;
        let down_move = prev.low - bar.low;
        let plus_dm = if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        };
        let minus_dm = if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        };

        let alpha = 1.0 / self.period as f64;
        if self.bars_seen == 2 {
            self.tr_avg = tr;
            self.plus_dm_avg = plus_dm;
            self.minus_dm_avg = minus_dm;
        } else {
            self.tr_avg += alpha * (tr - self.tr_avg);
            self.plus_dm_avg += alpha * (plus_dm - self.plus_dm_avg);
            self.minus_dm_avg += alpha * (minus_dm - self.minus_dm_avg);
        }

        if self.tr_avg <= 0.0 {
            return Signal::Hold;
        }
        let plus_di = 100.0 * self.plus_dm_avg / self.tr_avg;
        let minus_di = 100.0 * self.minus_dm_avg / self.tr_avg;
        let di_sum = plus_di + minus_di;
        let dx = if di_sum > 0.0 {
            100.0 * (plus_di - minus_di).abs() / di_sum
        } else {
            0.0
        };
        let adx = match self.adx {
            Some(prev_adx) => prev_adx + alpha * (dx - prev_adx),
            None => dx,
        };
        self.adx = Some(adx);

        if self.bars_seen < self.period * 2 || adx <= self.adx_threshold {
            // Warming up or weak trend
            return Signal::Hold;
        }
        if plus_di > minus_di {
            Signal::Buy
        } else if minus_di > plus_di {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }

    fn value(&self) -> Option<f64> {
        self.adx
    }

    fn reset(&mut self) {
        *self = Self::new(self.period, self.adx_threshold);
    }
}

// ============================================================================
// Combo Signal Generator
// ============================================================================

/// Runs every component on each bar and merges the votes with
/// [`compose`]. The first generator is the primary.
pub struct ComboSignalGenerator {
    name: String,
    generators: Vec<Box<dyn SignalGenerator>>,
    mode: CompositionMode,
    last: Option<Composition>,
}

impl ComboSignalGenerator {
    pub fn new(
        name: String,
        generators: Vec<Box<dyn SignalGenerator>>,
        mode: CompositionMode,
    ) -> Result<Self, FormulaError> {
        // Reject arities the composer would refuse on every bar
        let holds = vec![Signal::Hold; generators.len()];
        compose(&holds, mode)?;
        Ok(Self {
            name,
            generators,
            mode,
            last: None,
        })
    }

    /// Composition of the most recent bar
    pub fn last_composition(&self) -> Option<&Composition> {
        self.last.as_ref()
    }
}

impl SignalGenerator for ComboSignalGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_bar(&mut self, kline: &Kline) -> Signal {
        let votes: Vec<Signal> = self.generators.iter_mut().map(|g| g.on_bar(kline)).collect();
        // Arity was validated in `new`
        match compose(&votes, self.mode) {
            Ok(composition) => {
                let action = composition.action;
                self.last = Some(composition);
                action
            }
            Err(_) => Signal::Hold,
        }
    }

    fn value(&self) -> Option<f64> {
        self.generators.first().and_then(|g| g.value())
    }

    fn reset(&mut self) {
        for g in &mut self.generators {
            g.reset();
        }
        self.last = None;
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Build the generator for one component from its canonical parameters
pub fn build_signal_generator(
    kind: IndicatorKind,
    params: &LocalParams,
) -> Result<Box<dyn SignalGenerator>, FormulaError> {
    use ParamRole::*;

    Ok(match kind {
        IndicatorKind::Rsi => Box::new(RsiSignalGenerator::new(
            period(params, Period)?,
            level(params, Overbought)?,
            level(params, Oversold)?,
        )),
        IndicatorKind::BollingerBands => Box::new(BollingerSignalGenerator::new(
            period(params, Period)?,
            positive(params, Multiplier)?,
        )?),
        IndicatorKind::Macd => Box::new(MacdSignalGenerator::new(
            period(params, Fast)?,
            period(params, Slow)?,
            period(params, SignalPeriod)?,
        )?),
        IndicatorKind::EmaCrossover => Box::new(EmaCrossoverSignalGenerator::new(
            period(params, Fast)?,
            period(params, Slow)?,
        )?),
        IndicatorKind::Stochastic => Box::new(StochasticSignalGenerator::new(
            period(params, Period)?,
            level(params, Overbought)?,
            level(params, Oversold)?,
        )?),
        IndicatorKind::AtrMeanReversion => Box::new(AtrMeanReversionSignalGenerator::new(
            period(params, AtrPeriod)?,
            period(params, SmaPeriod)?,
            positive(params, Multiplier)?,
        )?),
        IndicatorKind::Vwap => Box::new(VwapSignalGenerator::new(period(params, Period)?)),
        IndicatorKind::Obv => Box::new(ObvSignalGenerator::new(period(params, SmaPeriod)?)?),
        IndicatorKind::WilliamsR => Box::new(WilliamsRSignalGenerator::new(
            period(params, Period)?,
            level(params, Overbought)?,
            level(params, Oversold)?,
        )?),
        IndicatorKind::Adx => Box::new(AdxSignalGenerator::new(
            period(params, Period)?,
            level(params, AdxThreshold)?,
        )),
        IndicatorKind::Gabagool => return Err(FormulaError::NotDirectional("Gabagool")),
    })
}

// ============================================================================
// Latest-candle evaluation
// ============================================================================

/// One component's reading on the last candle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentVote {
    pub indicator: IndicatorKind,
    pub vote: Signal,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evaluation {
    Directional {
        votes: Vec<ComponentVote>,
        /// `None` for atomic variants
        composition: Option<Composition>,
        action: Signal,
    },
    Arbitrage {
        quote: GabagoolQuote,
    },
}

/// Run every component of a variant over `candles` and report the vote on
/// the last one.
pub fn evaluate_latest(
    descriptor: &VariantDescriptor,
    params: &CanonicalParams,
    candles: &[Kline],
) -> Result<Evaluation, FormulaError> {
    if descriptor.is_arbitrage() {
        let local = params
            .component(0)
            .ok_or(FormulaError::NotDirectional("Gabagool"))?;
        let gabagool_params = GabagoolParams::from_params(local)?;
        let last = candles
            .last()
            .ok_or_else(|| FormulaError::Indicator("no candles".to_string()))?;
        return Ok(Evaluation::Arbitrage {
            quote: gabagool::quote(last, &gabagool_params),
        });
    }

    let mut generators = descriptor
        .components()
        .iter()
        .zip(&params.components)
        .map(|(component, local)| build_signal_generator(component.indicator, local))
        .collect::<Result<Vec<_>, _>>()?;

    let mut votes: Vec<Signal> = vec![Signal::Hold; generators.len()];
    for candle in candles {
        for (vote, generator) in votes.iter_mut().zip(generators.iter_mut()) {
            *vote = generator.on_bar(candle);
        }
    }

    let component_votes: Vec<ComponentVote> = descriptor
        .components()
        .iter()
        .zip(&generators)
        .zip(&votes)
        .map(|((component, generator), vote)| ComponentVote {
            indicator: component.indicator,
            vote: *vote,
            value: generator.value(),
        })
        .collect();

    let (composition, action) = match descriptor.mode() {
        Some(mode) => {
            let composition = compose(&votes, mode)?;
            let action = composition.action;
            (Some(composition), action)
        }
        None => (None, votes.first().copied().unwrap_or(Signal::Hold)),
    };

    Ok(Evaluation::Directional {
        votes: component_votes,
        composition,
        action,
    })
}

/// Build the whole variant as one generator (composites wrapped in a
/// [`ComboSignalGenerator`])
pub fn build_variant_generator(
    descriptor: &VariantDescriptor,
    params: &CanonicalParams,
) -> Result<Box<dyn SignalGenerator>, FormulaError> {
    let mut generators = descriptor
        .components()
        .iter()
        .zip(&params.components)
        .map(|(component, local)| build_signal_generator(component.indicator, local))
        .collect::<Result<Vec<_>, _>>()?;

    match descriptor.mode() {
        Some(mode) => Ok(Box::new(ComboSignalGenerator::new(
            descriptor.name.to_string(),
            generators,
            mode,
        )?)),
        None => generators
            .pop()
            .ok_or(FormulaError::NotDirectional("empty variant")),
    }
}
