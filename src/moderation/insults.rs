//! Local profanity/insult detection.
//!
//! This is the offline gate of the toxicity check: it must keep working when
//! the remote scorer is unreachable, so it is a plain ordered regex scan over
//! normalized text. Patterns cover common Spanish vulgarities with their
//! gendered/plural inflections plus a smaller English set.

use std::sync::LazyLock;

use regex::Regex;

use super::lexicon::normalize;

/// Word-boundary insult patterns, matched against normalized (lowercase,
/// de-accented, punctuation-free) text.
const INSULT_PATTERNS: &[&str] = &[
    // Spanish: direct insults, inflected
    r"\bidiota?s?\b",
    r"\bestupid[oa]s?\b",
    r"\bimbecil(es)?\b",
    r"\btarad[oa]s?\b",
    r"\bcretin[oa]s?\b",
    r"\btont[oa]s?\b",
    r"\bbob[oa]s?\b",
    r"\bburr[oa]s?\b",
    r"\binutil(es)?\b",
    r"\bpendej[oa]s?\b",
    r"\bcabron(es)?\b",
    r"\bcabronas?\b",
    r"\bput[oa]s?\b",
    r"\bhijos? de puta\b",
    r"\bhijueputas?\b",
    r"\bjueputas?\b",
    r"\bmalparid[oa]s?\b",
    r"\bgonorreas?\b",
    r"\bmaricas?\b",
    r"\bmaricon(es)?\b",
    r"\bmierdas?\b",
    r"\bcarajo\b",
    r"\bjoder\b",
    r"\bjodid[oa]s?\b",
    r"\bching[oa]s?\b",
    r"\bchingad[oa]s?\b",
    r"\bzorras?\b",
    r"\bbastard[oa]s?\b",
    r"\bdesgraciad[oa]s?\b",
    r"\bmaldit[oa]s?\b",
    r"\bmalnacid[oa]s?\b",
    r"\bsinverguenzas?\b",
    r"\bdescarad[oa]s?\b",
    r"\basqueros[oa]s?\b",
    r"\bcochin[oa]s?\b",
    r"\bmugros[oa]s?\b",
    r"\bhuevon(es)?\b",
    r"\bguevon(es)?\b",
    r"\bpelotud[oa]s?\b",
    r"\bbolud[oa]s?\b",
    r"\bmamaguevos?\b",
    r"\bverga\b",
    // no pattern for "coño": diacritic folding collapses it into "cono",
    // which is a legitimate word ("cono de tráfico")
    r"\bculer[oa]s?\b",
    r"\bculicagad[oa]s?\b",
    r"\bpirobos?\b",
    r"\bcareverga\b",
    r"\blamb[oe]n(es)?\b",
    // Spanish: explicit threats
    r"\bte voy a matar\b",
    r"\bvoy a matarte\b",
    r"\blos voy a matar\b",
    r"\bte voy a romper\b",
    // English
    r"\bidiots?\b",
    r"\bstupid\b",
    r"\bdumbass(es)?\b",
    r"\bmorons?\b",
    r"\bassholes?\b",
    r"\bbitch(es)?\b",
    r"\bbastards?\b",
    r"\bfuck(er|ers|ing)?\b",
    r"\bshit(ty)?\b",
    r"\bwhores?\b",
    r"\bsluts?\b",
    r"\bscum\b",
    r"\blosers?\b",
    r"\bjerks?\b",
];

static INSULT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    INSULT_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("valid insult pattern"))
        .collect()
});

/// True if the text contains any known insult or vulgarity. Pure boolean
/// gate: first match wins, no scoring.
pub fn contains_insults(text: &str) -> bool {
    let normalized = normalize(text);
    INSULT_RES.iter().any(|re| re.is_match(&normalized))
}
