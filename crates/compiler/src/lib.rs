//! Poly Spec compiler: strategy records in, bot specifications out
//!
//! Takes a discovered strategy (its type tag, parameters and backtest
//! statistics) and renders the implementation spec a trading bot needs:
//! - Variant registry with canonical parameter schemas
//! - Formula library for every indicator, plus numeric reference generators
//! - Signal composition for composite strategies
//! - Polymarket fee model and risk thresholds derived from backtest stats
//! - Table and document renderers

pub mod composer;
pub mod error;
pub mod fees;
pub mod formulas;
pub mod gabagool;
pub mod indicators;
pub mod params;
pub mod record;
pub mod registry;
pub mod render;
pub mod risk;
pub mod types;

// Re-exports for convenience
pub use composer::{compose, describe_rule, Composition};
pub use error::{ComposeError, Diagnostic, FormulaError, RecordError, UnknownVariant};
pub use fees::{estimate_settlement_probability, FeeModel};
pub use formulas::{describe, IndicatorDescription, ParamRow, UNDEFINED_MARKER};
pub use gabagool::{GabagoolParams, GabagoolQuote, PairDecision};
pub use indicators::{
    build_signal_generator, build_variant_generator, evaluate_latest, ComboSignalGenerator,
    ComponentVote, Evaluation, SignalGenerator,
};
pub use params::{normalize, ParamSet};
pub use record::{BacktestStats, StrategyRecord};
pub use registry::{
    all_variants, resolve, CompositionMode, IndicatorKind, ParamSpec, VariantDescriptor,
    VariantTag,
};
pub use render::{
    candle_buffer_size, format_table, RenderConfig, RenderMode, Rendered, SpecRenderer, SpecRow,
    SpecTable,
};
pub use risk::{PositionSizing, RiskPolicy, RiskThresholds};
pub use types::{Kline, Signal, SizingMode};
