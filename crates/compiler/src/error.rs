//! Error and diagnostic types
//!
//! None of these abort a render. `UnknownVariant`, malformed parameters and
//! missing parameters surface as inline [`Diagnostic`] markers; the
//! `FormulaError`/`ComposeError` types only come out of the numeric
//! reference computation.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// A strategy type tag with no registry entry
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("unknown strategy type: {tag}")]
pub struct UnknownVariant {
    pub tag: String,
}

/// Errors from the numeric indicator computation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("missing parameter `{0}`")]
    MissingParameter(&'static str),

    #[error("invalid value {value} for parameter `{name}`: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("{0} is not a directional indicator")]
    NotDirectional(&'static str),

    #[error("indicator library rejected parameters: {0}")]
    Indicator(String),

    #[error(transparent)]
    Compose(#[from] ComposeError),
}

impl From<ta::errors::TaError> for FormulaError {
    fn from(e: ta::errors::TaError) -> Self {
        Self::Indicator(format!("{e:?}"))
    }
}

/// Errors from vote composition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("no votes to compose")]
    Empty,

    #[error("majority composition needs exactly 3 votes, got {0}")]
    MajorityArity(usize),

    #[error("primary/confirmer composition needs at least 2 votes, got {0}")]
    MissingConfirmer(usize),
}

/// Errors ingesting a strategy record as a whole
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("strategy record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A recoverable issue found while compiling a record. Rendered inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// `strategy_params` could not be parsed; treated as an empty set
    MalformedInput,
    UnknownVariant { tag: String },
    MissingParameter { name: &'static str },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedInput => {
                f.write_str("strategy_params could not be parsed, treated as empty")
            }
            Self::UnknownVariant { tag } => write!(f, "unknown strategy type `{tag}`"),
            Self::MissingParameter { name } => write!(f, "parameter `{name}` is missing"),
        }
    }
}
