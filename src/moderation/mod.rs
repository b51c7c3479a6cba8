//! Automated content moderation for citizen reports.
//!
//! Fuses three signals into one verdict: image safety likelihoods, topical
//! alignment between image labels and the report text, and toxicity scoring
//! (remote plus a local regex fallback). The verdict always resolves; every
//! upstream failure is neutralized to "no signal" before it gets here.

mod alignment;
mod insults;
mod lexicon;
mod toxicity;
mod vision;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::AppConfig;
use crate::metrics::{MODERATION_APPROVED, MODERATION_FLAGGED, MODERATION_MISMATCH};

pub use vision::Annotation;

use toxicity::ToxicityClient;
use vision::VisionClient;

/// Ordinal safety likelihood reported by the image classifier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Likelihood {
    #[default]
    #[serde(alias = "UNKNOWN")]
    VeryUnlikely,
    Unlikely,
    Possible,
    Likely,
    VeryLikely,
}

/// Per-category safety likelihoods. Defaults to all very-unlikely, which is
/// also what text-only moderation uses.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SafetyLikelihoods {
    #[serde(default)]
    pub adult: Likelihood,
    #[serde(default)]
    pub violence: Likelihood,
    #[serde(default)]
    pub racy: Likelihood,
    #[serde(default)]
    pub medical: Likelihood,
    #[serde(default)]
    pub spoof: Likelihood,
}

impl SafetyLikelihoods {
    /// True if every category is at or below the given level.
    pub fn all_at_most(&self, level: Likelihood) -> bool {
        self.adult <= level
            && self.violence <= level
            && self.racy <= level
            && self.medical <= level
            && self.spoof <= level
    }
}

/// One label the classifier assigned to detected image content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticLabel {
    pub description: String,
    pub score: Option<f32>,
}

/// Toxicity attribute scores, 0..1 each; absent attributes are 0.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ToxicityScores {
    pub toxicity: f32,
    pub insult: f32,
    pub threat: f32,
    pub sexually_explicit: f32,
    pub identity_attack: f32,
    pub profanity: f32,
}

impl ToxicityScores {
    pub fn max_attribute(&self) -> f32 {
        [
            self.toxicity,
            self.insult,
            self.threat,
            self.sexually_explicit,
            self.identity_attack,
            self.profanity,
        ]
        .into_iter()
        .fold(0.0, f32::max)
    }
}

/// The moderation verdict. Immutable once produced; callers attach it to the
/// report record.
#[derive(Debug, Clone, Serialize)]
pub struct ModerationVerdict {
    pub flagged: bool,
    pub mismatch: bool,
    pub auto_approve: bool,
    pub summary: String,
    pub safety: SafetyLikelihoods,
    pub toxicity: ToxicityScores,
    /// Top labels (at most 10), classifier order.
    pub labels: Vec<SemanticLabel>,
    pub checked_at: DateTime<Utc>,
}

/// The moderation engine. Stateless between calls; owns the two remote
/// clients.
pub struct ModerationEngine {
    vision: VisionClient,
    toxicity: ToxicityClient,
}

impl ModerationEngine {
    pub fn new(client: reqwest::Client, config: &AppConfig) -> Self {
        Self {
            vision: VisionClient::new(
                client.clone(),
                config.vision.clone(),
                config.storage.clone(),
            ),
            toxicity: ToxicityClient::new(client, config.toxicity.clone()),
        }
    }

    /// Moderate a submission. Image classification and toxicity scoring run
    /// concurrently; the verdict waits for both. Never fails: every remote
    /// problem is downgraded to a missing signal.
    #[tracing::instrument(skip_all)]
    pub async fn moderate(&self, photo_reference: Option<&str>, text: &str) -> ModerationVerdict {
        let image = async {
            match photo_reference {
                Some(reference) => self.vision.classify_reference(reference).await,
                None => Annotation::default(),
            }
        };
        let (annotation, scores) = tokio::join!(image, self.toxicity.score(text));

        let verdict = decide(&annotation.safety, annotation.labels, &scores, text);

        if verdict.flagged {
            metrics::counter!(MODERATION_FLAGGED).increment(1);
        }
        if verdict.mismatch {
            metrics::counter!(MODERATION_MISMATCH).increment(1);
        }
        if verdict.auto_approve {
            metrics::counter!(MODERATION_APPROVED).increment(1);
        }
        info!(
            flagged = verdict.flagged,
            mismatch = verdict.mismatch,
            auto_approve = verdict.auto_approve,
            "moderation verdict"
        );

        verdict
    }
}

/// Pure verdict fusion over already-gathered signals.
pub fn decide(
    safety: &SafetyLikelihoods,
    mut labels: Vec<SemanticLabel>,
    scores: &ToxicityScores,
    text: &str,
) -> ModerationVerdict {
    let image_unsafe = safety.adult >= Likelihood::Likely
        || safety.violence >= Likelihood::Likely
        || safety.racy >= Likelihood::Likely;

    let text_toxic = insults::contains_insults(text)
        || scores.toxicity >= 0.65
        || scores.insult >= 0.6
        || scores.profanity >= 0.6
        || scores.threat >= 0.5
        || scores.max_attribute() >= 0.7;

    let mismatch = alignment::final_mismatch(&labels, text, safety).mismatch;

    let flagged = image_unsafe || text_toxic;
    let auto_approve = !flagged && !mismatch;

    labels.truncate(10);
    let summary = summarize(image_unsafe, text_toxic, mismatch, scores, &labels);

    ModerationVerdict {
        flagged,
        mismatch,
        auto_approve,
        summary,
        safety: *safety,
        toxicity: *scores,
        labels,
        checked_at: Utc::now(),
    }
}

/// Fixed phrase templates, one per signal.
fn summarize(
    image_unsafe: bool,
    text_toxic: bool,
    mismatch: bool,
    scores: &ToxicityScores,
    labels: &[SemanticLabel],
) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(4);

    parts.push(
        if image_unsafe {
            "Imagen con posible contenido sensible."
        } else {
            "Imagen sin contenido sensible."
        }
        .to_owned(),
    );

    parts.push(
        match (mismatch, image_unsafe) {
            (true, false) => "Imagen segura pero su contenido no coincide con la descripción.",
            (true, true) => "El contenido de la imagen no coincide con la descripción.",
            (false, _) => "El contenido de la imagen coincide con la descripción.",
        }
        .to_owned(),
    );

    if text_toxic {
        parts.push(format!(
            "Texto con lenguaje ofensivo (toxicidad {:.2}, insulto {:.2}, amenaza {:.2}).",
            scores.toxicity, scores.insult, scores.threat
        ));
    } else {
        parts.push("Texto sin lenguaje ofensivo.".to_owned());
    }

    if !labels.is_empty() {
        let preview: Vec<&str> = labels
            .iter()
            .take(5)
            .map(|l| l.description.as_str())
            .collect();
        parts.push(format!("Etiquetas: {}.", preview.join(", ")));
    }

    parts.join(" ")
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
    fn toxic_threat_is_flagged_without_an_image() {
        let verdict = decide(
            &SafetyLikelihoods::default(),
            Vec::new(),
            &ToxicityScores::default(),
            "te voy a matar hijo de puta",
        );
        assert!(verdict.flagged);
        assert!(!verdict.auto_approve);
        assert!(verdict.summary.contains("lenguaje ofensivo"));
    }

    #[test]
    fn clean_report_auto_approves() {
        let verdict = decide(
            &SafetyLikelihoods::default(),
            vec![label("pothole", 0.9)],
            &ToxicityScores::default(),
            "hay un bache enorme en la calle 45",
        );
        assert!(!verdict.flagged);
        assert!(!verdict.mismatch);
        assert!(verdict.auto_approve);
    }

    #[test]
    fn unsafe_image_is_flagged() {
        let safety = SafetyLikelihoods {
            violence: Likelihood::Likely,
            ..Default::default()
        };
        let verdict = decide(&safety, Vec::new(), &ToxicityScores::default(), "reporte");
        assert!(verdict.flagged);
        assert!(!verdict.auto_approve);
        assert!(verdict.summary.contains("posible contenido sensible"));
    }

    #[test]
    fn possible_likelihoods_do_not_flag() {
        let safety = SafetyLikelihoods {
            adult: Likelihood::Possible,
            violence: Likelihood::Possible,
            racy: Likelihood::Possible,
            medical: Likelihood::VeryLikely,
            spoof: Likelihood::VeryLikely,
        };
        let verdict = decide(&safety, Vec::new(), &ToxicityScores::default(), "reporte");
        assert!(!verdict.flagged);
    }

    #[test]
    fn remote_scores_flag_above_thresholds() {
        let cases = [
            ToxicityScores {
                toxicity: 0.65,
                ..Default::default()
            },
            ToxicityScores {
                insult: 0.6,
                ..Default::default()
            },
            ToxicityScores {
                profanity: 0.6,
                ..Default::default()
            },
            ToxicityScores {
                threat: 0.5,
                ..Default::default()
            },
            ToxicityScores {
                identity_attack: 0.7,
                ..Default::default()
            },
        ];
        for scores in cases {
            let verdict = decide(
                &SafetyLikelihoods::default(),
                Vec::new(),
                &scores,
                "texto neutral",
            );
            assert!(verdict.flagged, "expected flag for {scores:?}");
        }
    }

    #[test]
    fn scores_below_thresholds_do_not_flag() {
        let scores = ToxicityScores {
            toxicity: 0.64,
            insult: 0.59,
            profanity: 0.59,
            threat: 0.49,
            sexually_explicit: 0.69,
            identity_attack: 0.69,
        };
        let verdict = decide(
            &SafetyLikelihoods::default(),
            Vec::new(),
            &scores,
            "el semaforo de la esquina no funciona",
        );
        assert!(!verdict.flagged);
    }

    #[test]
    fn mismatch_suppresses_auto_approval_without_flagging() {
        let verdict = decide(
            &SafetyLikelihoods::default(),
            vec![label("flower", 0.9)],
            &ToxicityScores::default(),
            "bonito jardín",
        );
        assert!(!verdict.flagged);
        assert!(verdict.mismatch);
        assert!(!verdict.auto_approve);
        assert!(verdict.summary.contains("Imagen segura pero"));
    }

    #[test]
    fn auto_approve_invariant_holds() {
        let grids = [
            (SafetyLikelihoods::default(), "hay un bache en la via"),
            (
                SafetyLikelihoods {
                    adult: Likelihood::VeryLikely,
                    ..Default::default()
                },
                "eres un idiota",
            ),
        ];
        for (safety, text) in grids {
            let verdict = decide(&safety, Vec::new(), &ToxicityScores::default(), text);
            assert_eq!(
                verdict.auto_approve,
                !verdict.flagged && !verdict.mismatch
            );
        }
    }

    #[test]
    fn summary_previews_at_most_five_labels() {
        let labels: Vec<SemanticLabel> = (0..12).map(|i| label(&format!("l{i}"), 0.9)).collect();
        let verdict = decide(
            &SafetyLikelihoods::default(),
            labels,
            &ToxicityScores::default(),
            "l0 l1 l2 l3 l4 l5 l6 l7 l8 l9 l10 l11",
        );
        assert_eq!(verdict.labels.len(), 10);
        assert!(verdict.summary.contains("l4"));
        assert!(!verdict.summary.contains("l5,"));
        assert!(!verdict.summary.ends_with("l5."));
    }
}
