//! Image/text alignment matcher.
//!
//! Decides whether the labels the classifier extracted from a photo are
//! topically consistent with the text the citizen wrote. A mismatch alone
//! never flags content; it only withholds auto-approval.

use std::collections::HashSet;

use super::lexicon::{tokenize, LEXICON};
use super::{Likelihood, SafetyLikelihoods, SemanticLabel};

/// Labels below this confidence carry no evidential weight.
const CONFIDENCE_FLOOR: f32 = 0.4;

/// Alignment threshold when the image is entirely benign (all safety
/// likelihoods at most "unlikely"). A stricter bar: with nothing suspicious
/// in the image we need stronger evidence to call the pairing a mismatch.
const ALIGNMENT_THRESHOLD_BENIGN: f32 = 0.15;
/// Alignment threshold otherwise.
const ALIGNMENT_THRESHOLD_DEFAULT: f32 = 0.2;

/// Result of the raw context check.
#[derive(Debug, Clone)]
pub struct MismatchCheck {
    pub mismatch: bool,
    /// Descriptions of the labels that matched the text or the lexicon.
    pub matched: Vec<String>,
}

/// Labels that are confident enough to count as evidence. When no label
/// carries a numeric score at all, every label qualifies (the classifier
/// gave us descriptions without confidences; we take them at face value).
fn confident_labels(labels: &[SemanticLabel]) -> Vec<&SemanticLabel> {
    if labels.iter().any(|l| l.score.is_some()) {
        labels
            .iter()
            .filter(|l| l.score.unwrap_or(0.0) >= CONFIDENCE_FLOOR)
            .collect()
    } else {
        labels.iter().collect()
    }
}

/// True if any token of the label's description intersects the text tokens
/// or the civic lexicon.
fn label_matches(label: &SemanticLabel, text_tokens: &HashSet<String>) -> bool {
    tokenize(&label.description)
        .iter()
        .any(|t| text_tokens.contains(t) || LEXICON.contains(t.as_str()))
}

/// Raw context check: mismatch is true only when confident labels exist and
/// none of them intersects the text or the lexicon. No confident labels, or
/// empty text, is insufficient evidence and never a mismatch.
pub fn context_mismatch(labels: &[SemanticLabel], text: &str) -> MismatchCheck {
    if text.trim().is_empty() {
        return MismatchCheck {
            mismatch: false,
            matched: Vec::new(),
        };
    }

    let confident = confident_labels(labels);
    if confident.is_empty() {
        return MismatchCheck {
            mismatch: false,
            matched: Vec::new(),
        };
    }

    let text_tokens = tokenize(text);
    let matched: Vec<String> = confident
        .iter()
        .filter(|l| label_matches(l, &text_tokens))
        .map(|l| l.description.clone())
        .collect();

    MismatchCheck {
        mismatch: matched.is_empty(),
        matched,
    }
}

/// Confidence-weighted fraction of qualifying (score ≥ 0.4) label terms whose
/// tokens intersect the text tokens or the lexicon. 0 when no label qualifies.
pub fn label_text_alignment(labels: &[SemanticLabel], text: &str) -> f32 {
    let qualifying: Vec<&SemanticLabel> = labels
        .iter()
        .filter(|l| l.score.unwrap_or(0.0) >= CONFIDENCE_FLOOR)
        .collect();
    if qualifying.is_empty() {
        return 0.0;
    }

    let text_tokens = tokenize(text);
    let total: f32 = qualifying.iter().map(|l| l.score.unwrap_or(0.0)).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let matched: f32 = qualifying
        .iter()
        .filter(|l| label_matches(l, &text_tokens))
        .map(|l| l.score.unwrap_or(0.0))
        .sum();
    matched / total
}

/// Two-stage mismatch decision: the raw check must report a mismatch AND at
/// least one numerically-qualifying label must exist AND the alignment score
/// must fall below the threshold for the image's safety profile.
pub fn final_mismatch(
    labels: &[SemanticLabel],
    text: &str,
    safety: &SafetyLikelihoods,
) -> MismatchCheck {
    let check = context_mismatch(labels, text);
    if !check.mismatch {
        return check;
    }

    let has_qualifying = labels
        .iter()
        .any(|l| l.score.unwrap_or(0.0) >= CONFIDENCE_FLOOR);
    let threshold = if safety.all_at_most(Likelihood::Unlikely) {
        ALIGNMENT_THRESHOLD_BENIGN
    } else {
        ALIGNMENT_THRESHOLD_DEFAULT
    };
    let low_alignment = label_text_alignment(labels, text) < threshold;

    MismatchCheck {
        mismatch: has_qualifying && low_alignment,
        matched: check.matched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(description: &str, score: f32) -> SemanticLabel {
        SemanticLabel {
            description: description.to_owned(),
            score: Some(score),
        }
    }

    #[test]
    fn no_labels_is_never_a_mismatch() {
        let check = context_mismatch(&[], "anything at all");
        assert!(!check.mismatch);
    }

    #[test]
    fn empty_text_is_never_a_mismatch() {
        let labels = vec![label("flower", 0.9)];
        assert!(!context_mismatch(&labels, "").mismatch);
        assert!(!context_mismatch(&labels, "   ").mismatch);
    }

    #[test]
    fn lexicon_overlap_defeats_mismatch() {
        // "pothole" is in the lexicon even though the text is Spanish.
        let labels = vec![label("pothole", 0.9)];
        let check = context_mismatch(&labels, "hay un bache en la calle");
        assert!(!check.mismatch);
        assert_eq!(check.matched, vec!["pothole".to_owned()]);
    }

    #[test]
    fn text_overlap_defeats_mismatch() {
        let labels = vec![label("flooded street", 0.8)];
        let check = context_mismatch(&labels, "street completely flooded");
        assert!(!check.mismatch);
    }

    #[test]
    fn low_confidence_labels_are_ignored() {
        let labels = vec![label("banana", 0.2)];
        // Below the floor: no confident evidence, so no mismatch.
        assert!(!context_mismatch(&labels, "bache en la via").mismatch);
    }

    #[test]
    fn unscored_labels_all_qualify_for_raw_check_only() {
        let labels = vec![SemanticLabel {
            description: "flower".to_owned(),
            score: None,
        }];
        assert!(context_mismatch(&labels, "protesta en el centro").mismatch);
        // But with no numeric score, the final decision withholds judgment.
        let safety = SafetyLikelihoods::default();
        assert!(!final_mismatch(&labels, "protesta en el centro", &safety).mismatch);
    }

    #[test]
    fn unrelated_confident_label_is_a_final_mismatch() {
        // Label "flower" shares no tokens with the text and is not a civic term.
        let labels = vec![label("flower", 0.9)];
        let safety = SafetyLikelihoods::default();
        let check = final_mismatch(&labels, "bonito jardín", &safety);
        assert!(check.mismatch);
        assert!(check.matched.is_empty());
    }

    #[test]
    fn alignment_is_weighted_by_confidence() {
        let labels = vec![label("pothole", 0.9), label("flower", 0.45)];
        let score = label_text_alignment(&labels, "reporto un bache");
        // pothole matches via lexicon; flower does not: 0.9 / 1.35
        assert!((score - 0.9 / 1.35).abs() < 1e-6);
    }

    #[test]
    fn alignment_is_zero_without_qualifying_labels() {
        assert_eq!(label_text_alignment(&[], "texto"), 0.0);
        let labels = vec![label("car", 0.1)];
        assert_eq!(label_text_alignment(&labels, "texto"), 0.0);
    }
}
