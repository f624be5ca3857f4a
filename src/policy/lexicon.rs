//! Lexical predicates shared by the decision procedures
//!
//! Similarity is approximated from words only; there are no embeddings here.

/// Catch-all names (singular; the plural `+s` form also matches)
const GENERIC_NAMES: &[&str] = &[
    "other",
    "miscellaneous",
    "misc",
    "general",
    "generic",
    "uncategorized",
    "n/a",
    "unknown",
    "default",
];

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "that", "this", "are", "was", "were", "not", "but", "its",
    "into", "about", "when", "what", "how", "all", "can", "has", "have", "our", "out", "your",
    "you", "they", "their", "them", "been", "than", "then", "there", "these", "those", "via",
    "per",
];

/// Terms that signal two names describe different kinds of feedback
const INCOMPATIBLE_TERMS: &[(&str, &str)] = &[
    ("calendar", "permission"),
    ("mobile", "desktop"),
    ("audio", "video"),
    ("error", "confusion"),
    ("technical", "usability"),
    ("connection", "permission"),
    ("android", "ios"),
    ("billing", "performance"),
    ("login", "notification"),
    ("crash", "pricing"),
];

/// Terms that signal two parent themes cover neighbouring ground
const RELATED_TERMS: &[(&str, &str)] = &[
    ("error", "issue"),
    ("bug", "issue"),
    ("bug", "error"),
    ("crash", "error"),
    ("request", "improvement"),
    ("request", "feature"),
    ("ui", "interface"),
    ("ui", "design"),
    ("login", "auth"),
    ("sync", "connection"),
    ("performance", "speed"),
    ("payment", "billing"),
    ("notification", "alert"),
];

fn raw_tokens(name: &str) -> Vec<String> {
    name.split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// Lowercased tokens longer than two characters that are not stop words,
/// deduplicated in first-seen order
pub fn significant_tokens(name: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in raw_tokens(name) {
        if token.chars().count() > 2 && !STOP_WORDS.contains(&token.as_str()) && !out.contains(&token)
        {
            out.push(token);
        }
    }
    out
}

/// Significant tokens present in both names
pub fn shared_tokens(a: &str, b: &str) -> Vec<String> {
    let right = significant_tokens(b);
    significant_tokens(a)
        .into_iter()
        .filter(|t| right.contains(t))
        .collect()
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn is_generic_name(name: &str) -> bool {
    let n = normalize(name);
    GENERIC_NAMES
        .iter()
        .any(|g| n == *g || n == format!("{}s", g))
}

/// Sibling equal to `name` ignoring case and surrounding whitespace
pub fn find_exact_duplicate<'a>(name: &str, siblings: &'a [String]) -> Option<&'a str> {
    let n = normalize(name);
    if n.is_empty() {
        return None;
    }
    siblings
        .iter()
        .find(|s| normalize(s) == n)
        .map(|s| s.as_str())
}

/// First sibling sharing at least `min_shared` significant tokens with `name`
pub fn find_word_overlap<'a>(
    name: &str,
    siblings: &'a [String],
    min_shared: usize,
) -> Option<&'a str> {
    siblings
        .iter()
        .find(|s| shared_tokens(name, s).len() >= min_shared)
        .map(|s| s.as_str())
}

/// Some but not substantial overlap: exactly one shared token, and both names
/// keep at least two significant tokens
pub fn is_moderate_similarity(a: &str, b: &str) -> bool {
    shared_tokens(a, b).len() == 1
        && significant_tokens(a).len() >= 2
        && significant_tokens(b).len() >= 2
}

fn contains_term(tokens: &[String], term: &str) -> bool {
    tokens
        .iter()
        .any(|t| t == term || (term.len() > 3 && t.starts_with(term)))
}

fn pair_matches(
    a: &str,
    b: &str,
    pairs: &'static [(&'static str, &'static str)],
) -> Option<(&'static str, &'static str)> {
    let (ta, tb) = (raw_tokens(a), raw_tokens(b));
    pairs.iter().copied().find(|(x, y)| {
        let forward = contains_term(&ta, x) && contains_term(&tb, y);
        let backward = contains_term(&ta, y) && contains_term(&tb, x);
        forward || backward
    })
}

/// Incompatible term pair found across the two names, if any
pub fn incompatible_pair(a: &str, b: &str) -> Option<(&'static str, &'static str)> {
    pair_matches(a, b, INCOMPATIBLE_TERMS)
}

pub fn is_low_similarity(a: &str, b: &str) -> bool {
    incompatible_pair(a, b).is_some()
}

pub fn are_parents_related(p1: &str, p2: &str) -> bool {
    let (t1, t2) = (raw_tokens(p1), raw_tokens(p2));
    if t1.iter().any(|t| t.chars().count() > 3 && t2.contains(t)) {
        return true;
    }
    pair_matches(p1, p2, RELATED_TERMS).is_some()
}
