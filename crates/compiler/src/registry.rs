//! Variant registry - the closed table of strategy types
//!
//! Maps every strategy type tag the discovery service emits to a
//! [`VariantDescriptor`]: atomic indicator or composite, composition mode,
//! and the canonical parameter schema. Parameter aliases (`rsi_ob` vs
//! `rsi_overbought`, `period` vs `rsi_period`) are resolved here and only
//! here, by [`VariantDescriptor::canonicalize`].

use serde::Serialize;
use tracing::debug;

use crate::error::UnknownVariant;
use crate::params::ParamSet;

// ============================================================================
// Indicator kinds and parameter roles
// ============================================================================

/// The atomic signal sources. Gabagool is the non-directional arbitrage
/// generator; the other ten are directional technical indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    Rsi,
    BollingerBands,
    Macd,
    EmaCrossover,
    Stochastic,
    AtrMeanReversion,
    Vwap,
    Obv,
    WilliamsR,
    Adx,
    Gabagool,
}

impl IndicatorKind {
    pub fn all() -> &'static [IndicatorKind] {
        &[
            Self::Rsi,
            Self::BollingerBands,
            Self::Macd,
            Self::EmaCrossover,
            Self::Stochastic,
            Self::AtrMeanReversion,
            Self::Vwap,
            Self::Obv,
            Self::WilliamsR,
            Self::Adx,
            Self::Gabagool,
        ]
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Rsi => "RSI",
            Self::BollingerBands => "BB",
            Self::Macd => "MACD",
            Self::EmaCrossover => "EMA",
            Self::Stochastic => "Stoch",
            Self::AtrMeanReversion => "ATR",
            Self::Vwap => "VWAP",
            Self::Obv => "OBV",
            Self::WilliamsR => "WR",
            Self::Adx => "ADX",
            Self::Gabagool => "Gabagool",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Rsi => "Relative Strength Index",
            Self::BollingerBands => "Bollinger Bands",
            Self::Macd => "MACD",
            Self::EmaCrossover => "EMA Crossover",
            Self::Stochastic => "Stochastic Oscillator",
            Self::AtrMeanReversion => "ATR Mean Reversion",
            Self::Vwap => "VWAP",
            Self::Obv => "On-Balance Volume",
            Self::WilliamsR => "Williams %R",
            Self::Adx => "Average Directional Index",
            Self::Gabagool => "Gabagool pair arbitrage",
        }
    }

    /// Parameter roles the formula for this kind consumes, in formula order
    pub fn roles(&self) -> &'static [ParamRole] {
        use ParamRole::*;
        match self {
            Self::Rsi | Self::Stochastic | Self::WilliamsR => &[Period, Overbought, Oversold],
            Self::BollingerBands => &[Period, Multiplier],
            Self::Macd => &[Fast, Slow, SignalPeriod],
            Self::EmaCrossover => &[Fast, Slow],
            Self::AtrMeanReversion => &[AtrPeriod, SmaPeriod, Multiplier],
            Self::Vwap => &[Period],
            Self::Obv => &[SmaPeriod],
            Self::Adx => &[Period, AdxThreshold],
            Self::Gabagool => &[MaxPairCost, BidOffset, SpreadMultiplier],
        }
    }

    pub fn is_arbitrage(&self) -> bool {
        matches!(self, Self::Gabagool)
    }
}

/// What a parameter means to the formula that consumes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamRole {
    Period,
    Overbought,
    Oversold,
    Multiplier,
    Fast,
    Slow,
    SignalPeriod,
    AtrPeriod,
    SmaPeriod,
    AdxThreshold,
    MaxPairCost,
    BidOffset,
    SpreadMultiplier,
}

/// One entry of a canonical parameter schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    /// Canonical key; the only spelling downstream code reads
    pub name: &'static str,
    pub role: ParamRole,
    /// Other spellings observed in stored records, tried in order
    pub aliases: &'static [&'static str],
    pub description: &'static str,
}

impl ParamSpec {
    const fn new(
        name: &'static str,
        role: ParamRole,
        aliases: &'static [&'static str],
        description: &'static str,
    ) -> Self {
        Self {
            name,
            role,
            aliases,
            description,
        }
    }

    /// Canonical key first, then aliases
    pub fn keys(&self) -> impl Iterator<Item = &'static str> {
        std::iter::once(self.name).chain(self.aliases.iter().copied())
    }
}

// ============================================================================
// Parameter schemas
// ============================================================================

use ParamRole as R;

const RSI_PERIOD_DESC: &str = "Number of close-to-close changes in the Wilder-smoothed gain/loss averages";
const RSI_OB_DESC: &str = "RSI level above which the market is overbought (SELL)";
const RSI_OS_DESC: &str = "RSI level below which the market is oversold (BUY)";
const BB_PERIOD_DESC: &str = "Window for the middle SMA and the population standard deviation";
const BB_MULT_DESC: &str = "Band width in standard deviations";
const MACD_FAST_DESC: &str = "Fast EMA period";
const MACD_SLOW_DESC: &str = "Slow EMA period";
const MACD_SIGNAL_DESC: &str = "EMA period of the signal line over the MACD line";
const EMA_FAST_DESC: &str = "Fast EMA period";
const EMA_SLOW_DESC: &str = "Slow EMA period";
const STOCH_PERIOD_DESC: &str = "High/low lookback window for %K";
const STOCH_OB_DESC: &str = "%K level above which a bearish cross sells";
const STOCH_OS_DESC: &str = "%K level below which a bullish cross buys";
const VWAP_PERIOD_DESC: &str = "Rolling window of candles in the volume-weighted average";
const OBV_SMA_DESC: &str = "SMA period used to smooth the OBV line";
const WR_PERIOD_DESC: &str = "High/low lookback window";
const WR_OB_DESC: &str = "%R level (negative) above which the market is overbought";
const WR_OS_DESC: &str = "%R level (negative) below which the market is oversold";
const ADX_PERIOD_DESC: &str = "Smoothing period for directional movement, true range and ADX";
const ADX_THRESHOLD_DESC: &str = "Minimum ADX for a trend to be traded";

const RSI_SOLO: &[ParamSpec] = &[
    ParamSpec::new("period", R::Period, &["rsi_period"], RSI_PERIOD_DESC),
    ParamSpec::new("overbought", R::Overbought, &["rsi_overbought", "rsi_ob"], RSI_OB_DESC),
    ParamSpec::new("oversold", R::Oversold, &["rsi_oversold", "rsi_os"], RSI_OS_DESC),
];

const BB_SOLO: &[ParamSpec] = &[
    ParamSpec::new("period", R::Period, &["bb_period"], BB_PERIOD_DESC),
    ParamSpec::new("multiplier", R::Multiplier, &["bb_multiplier", "bb_mult", "std_dev"], BB_MULT_DESC),
];

const MACD_SOLO: &[ParamSpec] = &[
    ParamSpec::new("fast", R::Fast, &["macd_fast", "fast_period"], MACD_FAST_DESC),
    ParamSpec::new("slow", R::Slow, &["macd_slow", "slow_period"], MACD_SLOW_DESC),
    ParamSpec::new("signal", R::SignalPeriod, &["macd_signal", "signal_period"], MACD_SIGNAL_DESC),
];

const EMA_SOLO: &[ParamSpec] = &[
    ParamSpec::new("fast_period", R::Fast, &["ema_fast", "fast"], EMA_FAST_DESC),
    ParamSpec::new("slow_period", R::Slow, &["ema_slow", "slow"], EMA_SLOW_DESC),
];

const STOCH_SOLO: &[ParamSpec] = &[
    ParamSpec::new("period", R::Period, &["stoch_period", "k_period"], STOCH_PERIOD_DESC),
    ParamSpec::new("overbought", R::Overbought, &["stoch_overbought", "stoch_ob"], STOCH_OB_DESC),
    ParamSpec::new("oversold", R::Oversold, &["stoch_oversold", "stoch_os"], STOCH_OS_DESC),
];

const ATR_SOLO: &[ParamSpec] = &[
    ParamSpec::new("atr_period", R::AtrPeriod, &["period"], "Window of the true-range SMA (ATR)"),
    ParamSpec::new("sma_period", R::SmaPeriod, &["mean_period"], "Window of the close SMA the bands are centred on"),
    ParamSpec::new("multiplier", R::Multiplier, &["atr_multiplier", "atr_mult"], "Band half-width in ATRs"),
];

const VWAP_SOLO: &[ParamSpec] = &[ParamSpec::new("period", R::Period, &["vwap_period"], VWAP_PERIOD_DESC)];

const OBV_SOLO: &[ParamSpec] = &[ParamSpec::new("sma_period", R::SmaPeriod, &["obv_sma_period", "period"], OBV_SMA_DESC)];

const WR_SOLO: &[ParamSpec] = &[
    ParamSpec::new("period", R::Period, &["wr_period"], WR_PERIOD_DESC),
    ParamSpec::new("overbought", R::Overbought, &["wr_overbought", "wr_ob"], WR_OB_DESC),
    ParamSpec::new("oversold", R::Oversold, &["wr_oversold", "wr_os"], WR_OS_DESC),
];

const ADX_SOLO: &[ParamSpec] = &[
    ParamSpec::new("period", R::Period, &["adx_period"], ADX_PERIOD_DESC),
    ParamSpec::new("adx_threshold", R::AdxThreshold, &["threshold"], ADX_THRESHOLD_DESC),
];

const GABAGOOL: &[ParamSpec] = &[
    ParamSpec::new("max_pair_cost", R::MaxPairCost, &["pair_cost_max"], "Trade only when YES fill + NO fill is strictly below this"),
    ParamSpec::new("bid_offset", R::BidOffset, &["offset"], "How far below (mid - spread/2) the maker bids sit"),
    ParamSpec::new("spread_multiplier", R::SpreadMultiplier, &["spread_mult"], "Synthetic spread = candle volatility x this, clamped to [0.02, 0.10]"),
];

// Inside composites the bare names (`period`, `overbought`) would collide,
// so every key carries its indicator prefix.

const RSI_COMBO: &[ParamSpec] = &[
    ParamSpec::new("rsi_period", R::Period, &[], RSI_PERIOD_DESC),
    ParamSpec::new("rsi_overbought", R::Overbought, &["rsi_ob"], RSI_OB_DESC),
    ParamSpec::new("rsi_oversold", R::Oversold, &["rsi_os"], RSI_OS_DESC),
];

const BB_COMBO: &[ParamSpec] = &[
    ParamSpec::new("bb_period", R::Period, &[], BB_PERIOD_DESC),
    ParamSpec::new("bb_multiplier", R::Multiplier, &["bb_mult"], BB_MULT_DESC),
];

const MACD_COMBO: &[ParamSpec] = &[
    ParamSpec::new("macd_fast", R::Fast, &[], MACD_FAST_DESC),
    ParamSpec::new("macd_slow", R::Slow, &[], MACD_SLOW_DESC),
    ParamSpec::new("macd_signal", R::SignalPeriod, &[], MACD_SIGNAL_DESC),
];

const EMA_COMBO: &[ParamSpec] = &[
    ParamSpec::new("ema_fast", R::Fast, &["ema_fast_period"], EMA_FAST_DESC),
    ParamSpec::new("ema_slow", R::Slow, &["ema_slow_period"], EMA_SLOW_DESC),
];

const STOCH_COMBO: &[ParamSpec] = &[
    ParamSpec::new("stoch_period", R::Period, &[], STOCH_PERIOD_DESC),
    ParamSpec::new("stoch_overbought", R::Overbought, &["stoch_ob"], STOCH_OB_DESC),
    ParamSpec::new("stoch_oversold", R::Oversold, &["stoch_os"], STOCH_OS_DESC),
];

const VWAP_COMBO: &[ParamSpec] = &[ParamSpec::new("vwap_period", R::Period, &[], VWAP_PERIOD_DESC)];

const OBV_COMBO: &[ParamSpec] = &[ParamSpec::new("obv_sma_period", R::SmaPeriod, &["obv_period"], OBV_SMA_DESC)];

const WR_COMBO: &[ParamSpec] = &[
    ParamSpec::new("wr_period", R::Period, &[], WR_PERIOD_DESC),
    ParamSpec::new("wr_overbought", R::Overbought, &["wr_ob"], WR_OB_DESC),
    ParamSpec::new("wr_oversold", R::Oversold, &["wr_os"], WR_OS_DESC),
];

const ADX_COMBO: &[ParamSpec] = &[
    ParamSpec::new("adx_period", R::Period, &[], ADX_PERIOD_DESC),
    ParamSpec::new("adx_threshold", R::AdxThreshold, &[], ADX_THRESHOLD_DESC),
];

// ============================================================================
// Variant tags and descriptors
// ============================================================================

/// How component votes of a composite merge into one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionMode {
    /// Every component must agree
    Unanimous,
    /// Component 0 originates the action, the others can only veto it
    PrimaryConfirmer,
    /// 2-of-3
    Majority,
}

impl CompositionMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Unanimous => "Unanimous",
            Self::PrimaryConfirmer => "Primary + confirmer",
            Self::Majority => "Majority (2 of 3)",
        }
    }
}

/// Every strategy type the discovery service can persist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantTag {
    // === Atomic (11) ===
    Rsi,
    BollingerBands,
    Macd,
    EmaCrossover,
    Stochastic,
    AtrMeanReversion,
    Vwap,
    Obv,
    WilliamsR,
    Adx,
    Gabagool,
    // === Composite (11) ===
    RsiBollinger,
    MacdRsi,
    EmaRsi,
    StochRsi,
    MacdBollinger,
    TripleRsiMacdBb,
    TripleEmaRsiStoch,
    VwapRsi,
    ObvMacd,
    AdxEma,
    WilliamsRStoch,
}

impl VariantTag {
    pub fn all() -> &'static [VariantTag] {
        &[
            Self::Rsi,
            Self::BollingerBands,
            Self::Macd,
            Self::EmaCrossover,
            Self::Stochastic,
            Self::AtrMeanReversion,
            Self::Vwap,
            Self::Obv,
            Self::WilliamsR,
            Self::Adx,
            Self::Gabagool,
            Self::RsiBollinger,
            Self::MacdRsi,
            Self::EmaRsi,
            Self::StochRsi,
            Self::MacdBollinger,
            Self::TripleRsiMacdBb,
            Self::TripleEmaRsiStoch,
            Self::VwapRsi,
            Self::ObvMacd,
            Self::AdxEma,
            Self::WilliamsRStoch,
        ]
    }

    /// The snake_case tag stored in the knowledge base
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rsi => "rsi",
            Self::BollingerBands => "bollinger_bands",
            Self::Macd => "macd",
            Self::EmaCrossover => "ema_crossover",
            Self::Stochastic => "stochastic",
            Self::AtrMeanReversion => "atr_mean_reversion",
            Self::Vwap => "vwap",
            Self::Obv => "obv",
            Self::WilliamsR => "williams_r",
            Self::Adx => "adx",
            Self::Gabagool => "gabagool",
            Self::RsiBollinger => "rsi_bollinger",
            Self::MacdRsi => "macd_rsi",
            Self::EmaRsi => "ema_rsi",
            Self::StochRsi => "stoch_rsi",
            Self::MacdBollinger => "macd_bollinger",
            Self::TripleRsiMacdBb => "triple_rsi_macd_bb",
            Self::TripleEmaRsiStoch => "triple_ema_rsi_stoch",
            Self::VwapRsi => "vwap_rsi",
            Self::ObvMacd => "obv_macd",
            Self::AdxEma => "adx_ema",
            Self::WilliamsRStoch => "williams_r_stoch",
        }
    }

    /// Name shown in the discovery UI and stored as `strategy_name`
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Rsi => "RSI",
            Self::BollingerBands => "Bollinger Bands",
            Self::Macd => "MACD",
            Self::EmaCrossover => "EMA Crossover",
            Self::Stochastic => "Stochastic",
            Self::AtrMeanReversion => "ATR Mean Reversion",
            Self::Vwap => "VWAP",
            Self::Obv => "OBV",
            Self::WilliamsR => "Williams %R",
            Self::Adx => "ADX",
            Self::Gabagool => "Gabagool",
            Self::RsiBollinger => "RSI+Bollinger",
            Self::MacdRsi => "MACD+RSI",
            Self::EmaRsi => "EMA+RSI",
            Self::StochRsi => "Stoch+RSI",
            Self::MacdBollinger => "MACD+Bollinger",
            Self::TripleRsiMacdBb => "Triple:RSI+MACD+BB",
            Self::TripleEmaRsiStoch => "Triple:EMA+RSI+Stoch",
            Self::VwapRsi => "VWAP+RSI",
            Self::ObvMacd => "OBV+MACD",
            Self::AdxEma => "ADX+EMA",
            Self::WilliamsRStoch => "Williams%R+Stoch",
        }
    }

    /// Match a tag case- and punctuation-insensitively against both the
    /// stored tag and the display name, so `triple_rsi_macd_bb`,
    /// `TripleRsiMacdBb` and `Triple:RSI+MACD+BB` all resolve.
    pub fn parse(tag: &str) -> Option<VariantTag> {
        let wanted = fold(tag);
        if wanted.is_empty() {
            return None;
        }
        Self::all()
            .iter()
            .copied()
            .find(|v| fold(v.as_str()) == wanted || fold(v.display_name()) == wanted)
    }

    pub fn descriptor(self) -> VariantDescriptor {
        use CompositionMode::*;
        use IndicatorKind as K;

        let kind = match self {
            Self::Rsi => atomic(K::Rsi, RSI_SOLO),
            Self::BollingerBands => atomic(K::BollingerBands, BB_SOLO),
            Self::Macd => atomic(K::Macd, MACD_SOLO),
            Self::EmaCrossover => atomic(K::EmaCrossover, EMA_SOLO),
            Self::Stochastic => atomic(K::Stochastic, STOCH_SOLO),
            Self::AtrMeanReversion => atomic(K::AtrMeanReversion, ATR_SOLO),
            Self::Vwap => atomic(K::Vwap, VWAP_SOLO),
            Self::Obv => atomic(K::Obv, OBV_SOLO),
            Self::WilliamsR => atomic(K::WilliamsR, WR_SOLO),
            Self::Adx => atomic(K::Adx, ADX_SOLO),
            Self::Gabagool => atomic(K::Gabagool, GABAGOOL),

            Self::RsiBollinger => composite(
                &[(K::Rsi, RSI_COMBO), (K::BollingerBands, BB_COMBO)],
                Unanimous,
            ),
            Self::MacdRsi => composite(
                &[(K::Macd, MACD_COMBO), (K::Rsi, RSI_COMBO)],
                PrimaryConfirmer,
            ),
            Self::EmaRsi => composite(
                &[(K::EmaCrossover, EMA_COMBO), (K::Rsi, RSI_COMBO)],
                PrimaryConfirmer,
            ),
            Self::StochRsi => composite(
                &[(K::Stochastic, STOCH_COMBO), (K::Rsi, RSI_COMBO)],
                Unanimous,
            ),
            Self::MacdBollinger => composite(
                &[(K::Macd, MACD_COMBO), (K::BollingerBands, BB_COMBO)],
                PrimaryConfirmer,
            ),
            Self::TripleRsiMacdBb => composite(
                &[
                    (K::Rsi, RSI_COMBO),
                    (K::Macd, MACD_COMBO),
                    (K::BollingerBands, BB_COMBO),
                ],
                Majority,
            ),
            Self::TripleEmaRsiStoch => composite(
                &[
                    (K::EmaCrossover, EMA_COMBO),
                    (K::Rsi, RSI_COMBO),
                    (K::Stochastic, STOCH_COMBO),
                ],
                Majority,
            ),
            Self::VwapRsi => composite(
                &[(K::Vwap, VWAP_COMBO), (K::Rsi, RSI_COMBO)],
                PrimaryConfirmer,
            ),
            Self::ObvMacd => composite(
                &[(K::Macd, MACD_COMBO), (K::Obv, OBV_COMBO)],
                PrimaryConfirmer,
            ),
            Self::AdxEma => composite(
                &[(K::EmaCrossover, EMA_COMBO), (K::Adx, ADX_COMBO)],
                PrimaryConfirmer,
            ),
            Self::WilliamsRStoch => composite(
                &[(K::WilliamsR, WR_COMBO), (K::Stochastic, STOCH_COMBO)],
                Unanimous,
            ),
        };

        VariantDescriptor {
            tag: self,
            name: self.display_name(),
            kind,
        }
    }
}

fn fold(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn atomic(indicator: IndicatorKind, params: &'static [ParamSpec]) -> VariantKind {
    VariantKind::Atomic {
        component: Component { indicator, params },
    }
}

fn composite(
    parts: &[(IndicatorKind, &'static [ParamSpec])],
    mode: CompositionMode,
) -> VariantKind {
    VariantKind::Composite {
        components: parts
            .iter()
            .map(|&(indicator, params)| Component { indicator, params })
            .collect(),
        mode,
    }
}

/// One indicator inside a variant, with the schema entries bound to it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Component {
    pub indicator: IndicatorKind,
    pub params: &'static [ParamSpec],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariantKind {
    Atomic {
        component: Component,
    },
    Composite {
        components: Vec<Component>,
        mode: CompositionMode,
    },
}

/// Registry entry: how a strategy type is computed and composed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantDescriptor {
    pub tag: VariantTag,
    pub name: &'static str,
    #[serde(flatten)]
    pub kind: VariantKind,
}

impl VariantDescriptor {
    /// Components in evaluation order; the primary is first
    pub fn components(&self) -> &[Component] {
        match &self.kind {
            VariantKind::Atomic { component } => std::slice::from_ref(component),
            VariantKind::Composite { components, .. } => components,
        }
    }

    pub fn mode(&self) -> Option<CompositionMode> {
        match &self.kind {
            VariantKind::Atomic { .. } => None,
            VariantKind::Composite { mode, .. } => Some(*mode),
        }
    }

    pub fn is_arbitrage(&self) -> bool {
        self.components().iter().any(|c| c.indicator.is_arbitrage())
    }

    /// Ordered union of the component schemas
    pub fn schema(&self) -> impl Iterator<Item = &'static ParamSpec> + '_ {
        self.components().iter().flat_map(|c| c.params.iter())
    }

    /// Resolve raw parameter keys into canonical names. The canonical key
    /// wins over aliases; aliases are tried in declared order.
    pub fn canonicalize(&self, params: &ParamSet) -> CanonicalParams {
        let components = self
            .components()
            .iter()
            .map(|component| LocalParams {
                indicator: component.indicator,
                values: component
                    .params
                    .iter()
                    .map(|spec| ParamValue {
                        spec,
                        value: spec.keys().find_map(|key| params.get(key)),
                    })
                    .collect(),
            })
            .collect();
        CanonicalParams { components }
    }
}

/// Look up a strategy type tag
pub fn resolve(type_tag: &str) -> Result<VariantDescriptor, UnknownVariant> {
    match VariantTag::parse(type_tag) {
        Some(tag) => Ok(tag.descriptor()),
        None => {
            debug!(tag = type_tag, "strategy type not in registry");
            Err(UnknownVariant {
                tag: type_tag.to_string(),
            })
        }
    }
}

/// Every registered variant, atomic first
pub fn all_variants() -> Vec<VariantDescriptor> {
    VariantTag::all().iter().map(|t| t.descriptor()).collect()
}

// ============================================================================
// Canonicalized parameters
// ============================================================================

/// A schema entry with its resolved value (`None` when absent)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamValue {
    pub spec: &'static ParamSpec,
    pub value: Option<f64>,
}

/// The parameters of one component, addressable by role
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalParams {
    pub indicator: IndicatorKind,
    pub values: Vec<ParamValue>,
}

impl LocalParams {
    pub fn entry(&self, role: ParamRole) -> Option<&ParamValue> {
        self.values.iter().find(|v| v.spec.role == role)
    }

    pub fn get(&self, role: ParamRole) -> Option<f64> {
        self.entry(role).and_then(|v| v.value)
    }

    /// Canonical key bound to `role`
    pub fn name(&self, role: ParamRole) -> &'static str {
        self.entry(role).map(|v| v.spec.name).unwrap_or("?")
    }
}

/// Parameters of a whole variant after alias resolution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalParams {
    pub components: Vec<LocalParams>,
}

impl CanonicalParams {
    pub fn component(&self, index: usize) -> Option<&LocalParams> {
        self.components.get(index)
    }

    /// All entries in canonical schema order
    pub fn iter(&self) -> impl Iterator<Item = &ParamValue> {
        self.components.iter().flat_map(|c| c.values.iter())
    }

    /// Canonical names with no value in the record
    pub fn missing(&self) -> Vec<&'static str> {
        self.iter()
            .filter(|v| v.value.is_none())
            .map(|v| v.spec.name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_has_22_variants() {
        let all = all_variants();
        assert_eq!(all.len(), 22);
        let atomic = all
            .iter()
            .filter(|d| matches!(d.kind, VariantKind::Atomic { .. }))
            .count();
        assert_eq!(atomic, 11);
    }

    #[test]
    fn test_every_tag_round_trips() {
        for tag in VariantTag::all() {
            assert_eq!(VariantTag::parse(tag.as_str()), Some(*tag), "{}", tag.as_str());
            assert_eq!(VariantTag::parse(tag.display_name()), Some(*tag));
            let resolved = resolve(tag.as_str()).unwrap();
            assert_eq!(resolved.tag, *tag);
        }
    }

    #[test]
    fn test_display_and_camel_spellings_resolve() {
        assert_eq!(VariantTag::parse("Triple:RSI+MACD+BB"), Some(VariantTag::TripleRsiMacdBb));
        assert_eq!(VariantTag::parse("TripleRsiMacdBb"), Some(VariantTag::TripleRsiMacdBb));
        assert_eq!(VariantTag::parse("Williams %R"), Some(VariantTag::WilliamsR));
        assert_eq!(VariantTag::parse("WILLIAMS_R_STOCH"), Some(VariantTag::WilliamsRStoch));
    }

    #[test]
    fn test_unknown_tag_is_recoverable() {
        let err = resolve("dynamic_combo").unwrap_err();
        assert_eq!(err.tag, "dynamic_combo");
        assert!(resolve("").is_err());
        assert!(resolve("+++").is_err());
    }

    #[test]
    fn test_component_schemas_cover_every_role_once() {
        for desc in all_variants() {
            for component in desc.components() {
                let roles: Vec<ParamRole> = component.params.iter().map(|p| p.role).collect();
                assert_eq!(
                    roles,
                    component.indicator.roles(),
                    "{} / {:?}",
                    desc.name,
                    component.indicator
                );
            }
        }
    }

    #[test]
    fn test_canonical_names_unique_within_variant() {
        for desc in all_variants() {
            let names: Vec<&str> = desc.schema().map(|p| p.name).collect();
            let unique: HashSet<&str> = names.iter().copied().collect();
            assert_eq!(names.len(), unique.len(), "{}", desc.name);
        }
    }

    #[test]
    fn test_composite_arity_and_modes() {
        for desc in all_variants() {
            match &desc.kind {
                VariantKind::Atomic { .. } => assert!(desc.mode().is_none()),
                VariantKind::Composite { components, mode } => {
                    assert!((2..=3).contains(&components.len()), "{}", desc.name);
                    if *mode == CompositionMode::Majority {
                        assert_eq!(components.len(), 3, "{}", desc.name);
                    }
                    assert!(!desc.is_arbitrage());
                }
            }
        }
    }

    #[test]
    fn test_canonicalize_resolves_aliases() {
        let desc = resolve("rsi_bollinger").unwrap();
        let params: ParamSet = [
            ("rsi_period", 14.0),
            ("rsi_ob", 70.0),
            ("rsi_os", 30.0),
            ("bb_period", 20.0),
            ("bb_mult", 2.0),
        ]
        .into_iter()
        .collect();

        let canonical = desc.canonicalize(&params);
        assert!(canonical.missing().is_empty());
        let rsi = canonical.component(0).unwrap();
        assert_eq!(rsi.get(ParamRole::Overbought), Some(70.0));
        assert_eq!(rsi.name(ParamRole::Overbought), "rsi_overbought");
        let bb = canonical.component(1).unwrap();
        assert_eq!(bb.get(ParamRole::Multiplier), Some(2.0));
    }

    #[test]
    fn test_canonical_key_beats_alias() {
        let desc = resolve("rsi").unwrap();
        let params: ParamSet = [("period", 14.0), ("rsi_period", 21.0)].into_iter().collect();
        let canonical = desc.canonicalize(&params);
        assert_eq!(canonical.component(0).unwrap().get(ParamRole::Period), Some(14.0));
    }

    #[test]
    fn test_missing_parameters_reported() {
        let desc = resolve("macd").unwrap();
        let params: ParamSet = [("fast", 12.0)].into_iter().collect();
        let canonical = desc.canonicalize(&params);
        assert_eq!(canonical.missing(), vec!["slow", "signal"]);
    }

    #[test]
    fn test_primary_first_in_obv_macd() {
        let desc = resolve("obv_macd").unwrap();
        assert_eq!(desc.components()[0].indicator, IndicatorKind::Macd);
        assert_eq!(desc.mode(), Some(CompositionMode::PrimaryConfirmer));
    }
}
