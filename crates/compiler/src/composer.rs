//! Vote composition for composite strategies
//!
//! One rule set shared by every composite; the only inputs are the
//! composition mode and the number of components.

use serde::Serialize;

use crate::error::ComposeError;
use crate::registry::{CompositionMode, IndicatorKind};
use crate::types::Signal;

/// Final action of a composite plus a one-line explanation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Composition {
    pub action: Signal,
    pub rationale: String,
}

impl Composition {
    fn new(action: Signal, rationale: impl Into<String>) -> Self {
        Self {
            action,
            rationale: rationale.into(),
        }
    }
}

/// Merge one vote per component. `votes[0]` is the primary.
pub fn compose(votes: &[Signal], mode: CompositionMode) -> Result<Composition, ComposeError> {
    if votes.is_empty() {
        return Err(ComposeError::Empty);
    }

    match mode {
        CompositionMode::Unanimous => {
            let first = votes[0];
            if first != Signal::Hold && votes.iter().all(|v| *v == first) {
                Ok(Composition::new(
                    first,
                    format!("all {} components vote {first}", votes.len()),
                ))
            } else {
                Ok(Composition::new(
                    Signal::Hold,
                    format!("components disagree ({}), no unanimous action", list(votes)),
                ))
            }
        }

        CompositionMode::PrimaryConfirmer => {
            if votes.len() < 2 {
                return Err(ComposeError::MissingConfirmer(votes.len()));
            }
            let primary = votes[0];
            if primary == Signal::Hold {
                return Ok(Composition::new(Signal::Hold, "primary holds"));
            }
            let veto = votes[1..]
                .iter()
                .position(|v| *v == primary.opposite())
                .map(|i| i + 1);
            match veto {
                Some(index) => Ok(Composition::new(
                    Signal::Hold,
                    format!(
                        "primary votes {primary}, vetoed by confirmer {index} voting {}",
                        primary.opposite()
                    ),
                )),
                None => Ok(Composition::new(
                    primary,
                    format!("primary votes {primary}, no confirmer vetoes"),
                )),
            }
        }

        CompositionMode::Majority => {
            if votes.len() != 3 {
                return Err(ComposeError::MajorityArity(votes.len()));
            }
            let buys = votes.iter().filter(|v| **v == Signal::Buy).count();
            let sells = votes.iter().filter(|v| **v == Signal::Sell).count();
            if buys >= 2 {
                Ok(Composition::new(Signal::Buy, format!("{buys} of 3 vote BUY")))
            } else if sells >= 2 {
                Ok(Composition::new(Signal::Sell, format!("{sells} of 3 vote SELL")))
            } else {
                Ok(Composition::new(
                    Signal::Hold,
                    format!("no 2-of-3 majority ({})", list(votes)),
                ))
            }
        }
    }
}

fn list(votes: &[Signal]) -> String {
    votes
        .iter()
        .map(Signal::as_str)
        .collect::<Vec<_>>()
        .join("/")
}

/// Human-readable composition rule for a composite's components
pub fn describe_rule(mode: CompositionMode, components: &[IndicatorKind]) -> Vec<String> {
    let names: Vec<&str> = components.iter().map(IndicatorKind::short_name).collect();
    let joined = names.join(" and ");

    match mode {
        CompositionMode::Unanimous => vec![
            format!("Mode: unanimous over {joined}."),
            "BUY only when every component votes BUY on the same closed candle.".into(),
            "SELL only when every component votes SELL on the same closed candle.".into(),
            "Any disagreement or any HOLD vote gives HOLD.".into(),
            "Confidence: the mean confidence of all components.".into(),
        ],
        CompositionMode::PrimaryConfirmer => {
            let primary = names.first().copied().unwrap_or("?");
            let confirmers = names.get(1..).map(|c| c.join(", ")).unwrap_or_default();
            vec![
                format!("Mode: primary {primary}, confirmed by {confirmers}."),
                format!("When {primary} votes HOLD the result is HOLD, whatever the confirmers say."),
                format!(
                    "When {primary} votes BUY the result is BUY unless a confirmer votes SELL (veto -> HOLD)."
                ),
                format!(
                    "When {primary} votes SELL the result is SELL unless a confirmer votes BUY (veto -> HOLD)."
                ),
                "A confirmer voting HOLD never vetoes.".into(),
                format!("Confidence: the confidence of {primary}."),
            ]
        }
        CompositionMode::Majority => vec![
            format!("Mode: majority over {joined}."),
            "BUY when at least 2 of the 3 components vote BUY.".into(),
            "SELL when at least 2 of the 3 components vote SELL.".into(),
            "Otherwise HOLD.".into(),
            "Confidence: the mean confidence of the components voting with the majority.".into(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Signal::*;

    fn action(votes: &[Signal], mode: CompositionMode) -> Signal {
        compose(votes, mode).unwrap().action
    }

    #[test]
    fn test_majority_truth_table() {
        let m = CompositionMode::Majority;
        assert_eq!(action(&[Buy, Buy, Sell], m), Buy);
        assert_eq!(action(&[Sell, Sell, Hold], m), Sell);
        assert_eq!(action(&[Buy, Sell, Hold], m), Hold);
        assert_eq!(action(&[Hold, Hold, Buy], m), Hold);
        assert_eq!(action(&[Buy, Buy, Buy], m), Buy);
    }

    #[test]
    fn test_majority_requires_three() {
        assert_eq!(
            compose(&[Buy, Buy], CompositionMode::Majority),
            Err(ComposeError::MajorityArity(2))
        );
        assert_eq!(
            compose(&[Buy, Buy, Buy, Sell], CompositionMode::Majority),
            Err(ComposeError::MajorityArity(4))
        );
    }

    #[test]
    fn test_primary_confirmer_veto() {
        let m = CompositionMode::PrimaryConfirmer;
        assert_eq!(action(&[Buy, Sell], m), Hold);
        assert_eq!(action(&[Buy, Hold], m), Buy);
        assert_eq!(action(&[Buy, Buy], m), Buy);
        assert_eq!(action(&[Sell, Buy], m), Hold);
        assert_eq!(action(&[Sell, Hold], m), Sell);
        assert_eq!(action(&[Hold, Buy], m), Hold);
        assert_eq!(action(&[Hold, Sell], m), Hold);
    }

    #[test]
    fn test_primary_confirmer_rationale_names_vetoer() {
        let c = compose(&[Buy, Hold, Sell], CompositionMode::PrimaryConfirmer).unwrap();
        assert_eq!(c.action, Hold);
        assert!(c.rationale.contains("confirmer 2"));
    }

    #[test]
    fn test_primary_confirmer_needs_confirmer() {
        assert_eq!(
            compose(&[Buy], CompositionMode::PrimaryConfirmer),
            Err(ComposeError::MissingConfirmer(1))
        );
    }

    #[test]
    fn test_unanimous() {
        let m = CompositionMode::Unanimous;
        assert_eq!(action(&[Buy, Buy], m), Buy);
        assert_eq!(action(&[Sell, Sell], m), Sell);
        assert_eq!(action(&[Buy, Hold], m), Hold);
        assert_eq!(action(&[Hold, Hold], m), Hold);
        assert_eq!(action(&[Buy, Sell], m), Hold);
    }

    #[test]
    fn test_empty_votes() {
        assert_eq!(
            compose(&[], CompositionMode::Unanimous),
            Err(ComposeError::Empty)
        );
    }

    #[test]
    fn test_describe_rule_names_primary() {
        let lines = describe_rule(
            CompositionMode::PrimaryConfirmer,
            &[IndicatorKind::Macd, IndicatorKind::Obv],
        );
        assert!(lines[0].contains("primary MACD"));
        assert!(lines[0].contains("OBV"));
        assert_eq!(
            lines.last().map(String::as_str),
            Some("Confidence: the confidence of MACD.")
        );
    }
}
