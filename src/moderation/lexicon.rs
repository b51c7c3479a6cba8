//! Shared civic-incident lexicon and text normalization.
//!
//! The lexicon is the single source of truth for "terms a citizen report is
//! likely to be about" (roads, water, vehicles, fire, institutions, damage).
//! It is loaded once at process start and shared by the alignment matcher and
//! the verdict aggregator.

use std::collections::HashSet;
use std::sync::LazyLock;

/// Bilingual (Spanish/English) civic-incident vocabulary. Terms are stored
/// pre-normalized: lowercase, no diacritics, singular where it matters.
const LEXICON_TERMS: &[&str] = &[
    // Roads and surfaces
    "bache", "hueco", "calle", "via", "carretera", "pavimento", "asfalto",
    "acera", "anden", "vereda", "puente", "tunel", "interseccion",
    "pothole", "road", "street", "highway", "asphalt", "sidewalk", "bridge",
    // Water and weather
    "inundacion", "agua", "lluvia", "tormenta", "rio", "quebrada",
    "alcantarilla", "alcantarillado", "desague", "charco",
    "flood", "water", "rain", "storm", "river", "drain", "sewer", "puddle",
    // Landslides and terrain
    "derrumbe", "deslizamiento", "grieta", "hundimiento",
    "landslide", "crack", "sinkhole",
    // Vehicles and traffic
    "accidente", "choque", "colision", "carro", "auto", "vehiculo", "moto",
    "motocicleta", "bus", "buseta", "camion", "bicicleta", "trafico",
    "accident", "crash", "car", "vehicle", "truck", "motorcycle", "bicycle",
    "traffic",
    // People
    "persona", "gente", "peaton", "conductor", "ciclista",
    "person", "people", "pedestrian",
    // Street furniture and utilities
    "poste", "cable", "luz", "luminaria", "alumbrado", "semaforo", "senal",
    "arbol", "pole", "wire", "light", "lamp", "sign", "tree",
    // Waste
    "basura", "escombro", "desecho", "residuo",
    "garbage", "trash", "debris", "waste",
    // Fire and weapons
    "incendio", "fuego", "humo", "quema", "arma", "pistola", "cuchillo",
    "fire", "smoke", "weapon", "gun", "knife",
    // Crime and violence
    "robo", "asalto", "violencia", "pelea", "vandalismo",
    "robbery", "assault", "violence", "fight", "vandalism",
    // Buildings and public places
    "edificio", "casa", "muro", "pared", "parque", "plaza", "mercado",
    "escuela", "colegio", "hospital", "estadio", "cancha",
    "building", "house", "wall", "park", "market", "school",
    // Institutions
    "policia", "bombero", "ambulancia", "municipio", "alcaldia",
    "police", "firefighter", "ambulance",
    // Construction
    "obra", "construccion", "maquinaria", "excavacion", "zanja",
    "construction", "machinery", "excavation",
    // Damage and risk
    "dano", "peligro", "riesgo", "emergencia", "falla", "deterioro",
    "damage", "hazard", "danger", "risk", "emergency",
];

/// Lexicon as a set, built once.
pub static LEXICON: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| LEXICON_TERMS.iter().copied().collect());

/// Lowercase a string and fold Spanish diacritics to their ASCII base letter.
fn fold_diacritics(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' => 'a',
        'é' | 'è' | 'ë' | 'ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' => 'u',
        'ñ' => 'n',
        _ => c,
    }
}

/// Normalize free text: lowercase, fold diacritics, and replace every
/// non-alphanumeric character with a space. The result only contains
/// `[a-z0-9 ]` plus whatever multi-byte alphanumerics survive lowercasing;
/// those are dropped by the ASCII filter.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        let c = fold_diacritics(c);
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else {
            out.push(' ');
        }
    }
    out
}

/// Tokenize free text into the union of its normalized words and their naive
/// singular variants (trailing "es" and "s" stripped). Empty input yields an
/// empty set.
pub fn tokenize(text: &str) -> HashSet<String> {
    let mut tokens = HashSet::new();
    for word in normalize(text).split_whitespace() {
        tokens.insert(word.to_owned());
        if let Some(stem) = word.strip_suffix("es") {
            if !stem.is_empty() {
                tokens.insert(stem.to_owned());
            }
        }
        if let Some(stem) = word.strip_suffix('s') {
            if !stem.is_empty() {
                tokens.insert(stem.to_owned());
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_only_emits_ascii_alphanumerics_and_spaces() {
        let n = normalize("¡Hay un BACHE enorme en la Año-2024 calle 5ª!");
        assert!(n.chars().all(|c| c.is_ascii_alphanumeric() || c == ' '));
        assert!(n.contains("bache"));
        assert!(n.contains("ano 2024"));
    }

    #[test]
    fn tokenize_is_idempotent_under_renormalization() {
        let first = tokenize("Árboles caídos en la Calle 10, ¡peligro!");
        let rejoined = first.iter().cloned().collect::<Vec<_>>().join(" ");
        let second = tokenize(&rejoined);
        assert!(first.is_subset(&second));
    }

    #[test]
    fn tokenize_adds_singular_variants() {
        let tokens = tokenize("calles inundadas");
        assert!(tokens.contains("calles"));
        assert!(tokens.contains("calle"));
        assert!(tokens.contains("inundada"));
    }

    #[test]
    fn tokenize_strips_diacritics() {
        let tokens = tokenize("inundación según el río");
        assert!(tokens.contains("inundacion"));
        assert!(tokens.contains("rio"));
    }

    #[test]
    fn empty_text_yields_empty_set() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   ¡¿!?  ").is_empty());
    }

    #[test]
    fn lexicon_contains_core_civic_terms() {
        let tokens = tokenize("hay un bache en la via");
        assert!(tokens.iter().any(|t| LEXICON.contains(t.as_str())));
        let tokens = tokenize("me gusta la musica electronica");
        assert!(!tokens.iter().any(|t| LEXICON.contains(t.as_str())));
    }
}
