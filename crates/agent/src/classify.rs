//! Deterministic message classification: sentiment, intent detection, and
//! action ranking. Both intent engines share this module so that which
//! actions get suggested never depends on which engine produced the reply
//! text.

use std::collections::BTreeSet;

use careline_core::Action;

pub const GENERAL_INQUIRY: &str = "general_inquiry";

const POSITIVE_WORDS: [&str; 5] = ["happy", "great", "thanks", "good", "excellent"];
const NEGATIVE_WORDS: [&str; 5] = ["angry", "bad", "terrible", "upset", "frustrated"];

const INTENT_KEYWORDS: [(&str, &[&str]); 4] = [
    ("order_status", &["order", "tracking", "shipment", "delivery"]),
    ("technical_support", &["error", "problem", "not working", "broken"]),
    ("account_help", &["password", "login", "account", "profile"]),
    ("billing", &["payment", "charge", "bill", "invoice"]),
];

/// Which action-id prefix each intent maps to when ranking the catalog.
const INTENT_PREFIXES: [(&str, &str); 3] =
    [("order_status", "order_"), ("account_help", "account_"), ("billing", "payment_")];

/// Lexicon sentiment normalized into `[0, 1]`; `0.5` is neutral. Each
/// positive hit adds and each negative hit subtracts a fixed step before
/// normalization.
pub fn sentiment_score(message: &str) -> f64 {
    let lowered = message.to_lowercase();
    let mut raw: f64 = 0.0;
    for word in POSITIVE_WORDS {
        if lowered.contains(word) {
            raw += 0.3;
        }
    }
    for word in NEGATIVE_WORDS {
        if lowered.contains(word) {
            raw -= 0.3;
        }
    }
    ((raw.clamp(-1.0, 1.0) + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Substring keyword match over the lowercased message. Falls back to
/// `general_inquiry` when nothing matches, so the set is never empty.
pub fn detect_intents(message: &str) -> BTreeSet<String> {
    let lowered = message.to_lowercase();
    let mut intents = BTreeSet::new();
    for (intent, keywords) in INTENT_KEYWORDS {
        if keywords.iter().any(|keyword| lowered.contains(keyword)) {
            intents.insert(intent.to_owned());
        }
    }
    if intents.is_empty() {
        intents.insert(GENERAL_INQUIRY.to_owned());
    }
    intents
}

/// Rank the catalog against the detected intents: actions whose id prefix
/// matches a detected intent come first, then by priority. The sort is
/// stable, so catalog order breaks ties.
pub fn rank_actions(catalog: &[Action], intents: &BTreeSet<String>) -> Vec<Action> {
    let prefixes: Vec<&str> = INTENT_PREFIXES
        .iter()
        .filter(|(intent, _)| intents.contains(*intent))
        .map(|(_, prefix)| *prefix)
        .collect();

    let mut relevant: Vec<Action> = catalog
        .iter()
        .filter(|action| prefixes.iter().any(|prefix| action.id.starts_with(prefix)))
        .cloned()
        .collect();
    relevant.sort_by_key(|action| action.priority);
    relevant
}

/// True when the detected set carries anything beyond the fallback intent.
pub fn has_specific_intent(intents: &BTreeSet<String>) -> bool {
    intents.iter().any(|intent| intent != GENERAL_INQUIRY)
}
