//! Keyword and digit-scan lead extraction.
//!
//! This is the model-free path: the mock chat loop uses it end to end, and
//! the optional phone gate reuses [`looks_like_phone`] at commit time. It is
//! deliberately crude; the model owns the real conversation.

use leadline_core::lead::LeadDraft;

/// First run of 9 to 15 digits, keeping a directly adjoining `+`.
pub fn extract_phone(text: &str) -> Option<String> {
    let bytes = text.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        if !bytes[index].is_ascii_digit() {
            index += 1;
            continue;
        }

        let start = index;
        while index < bytes.len() && bytes[index].is_ascii_digit() {
            index += 1;
        }

        let run = index - start;
        if (9..=15).contains(&run) {
            let prefixed = start > 0 && bytes[start - 1] == b'+';
            let digits = &text[start..index];
            return Some(if prefixed { format!("+{digits}") } else { digits.to_string() });
        }
    }

    None
}

/// Whether `raw` plausibly carries a reachable phone number once common
/// separators are stripped.
pub fn looks_like_phone(raw: &str) -> bool {
    let digits = raw.chars().filter(char::is_ascii_digit).count();
    let valid_chars = raw
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '+' | '-' | ' ' | '(' | ')'));
    valid_chars && (9..=15).contains(&digits)
}

pub fn classify_intent(text: &str) -> &'static str {
    let lowered = text.to_ascii_lowercase();
    if lowered.contains("buy") || lowered.contains("purchase") {
        "Buy"
    } else if lowered.contains("rent") || lowered.contains("lease") {
        "Rent"
    } else if lowered.contains("sell") || lowered.contains("listing my property") {
        "Sell"
    } else {
        "General Inquiry"
    }
}

/// Looks for "my name is X", "I am X", "I'm X", or "Name: X" and returns
/// the following word, capitalized.
pub fn extract_name(text: &str) -> Option<String> {
    let lowered = text.to_ascii_lowercase();
    let markers = ["name is", "i am", "i'm", "name:"];

    for marker in markers {
        let Some(position) = lowered.find(marker) else {
            continue;
        };
        let after = &text[position + marker.len()..];
        let word: String =
            after.split_whitespace().next()?.chars().filter(|ch| ch.is_alphabetic()).collect();
        if word.is_empty() {
            continue;
        }

        let mut chars = word.chars();
        let first = chars.next()?.to_uppercase().to_string();
        return Some(format!("{first}{}", chars.as_str().to_lowercase()));
    }

    None
}

/// Single-shot classification of one utterance into a draft, with the
/// original text preserved verbatim.
pub fn draft_from_text(text: &str) -> LeadDraft {
    LeadDraft {
        name: extract_name(text),
        phone: extract_phone(text),
        intent: Some(classify_intent(text).to_string()),
        original_text: Some(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{classify_intent, draft_from_text, extract_name, extract_phone, looks_like_phone};

    #[test]
    fn phone_extraction_finds_digit_runs() {
        assert_eq!(extract_phone("call me on 0501234567 please"), Some("0501234567".to_string()));
        assert_eq!(extract_phone("+971501234567"), Some("+971501234567".to_string()));
        assert_eq!(extract_phone("room 42 on floor 3"), None);
        assert_eq!(extract_phone("no digits here"), None);
    }

    #[test]
    fn phone_plausibility_check_tolerates_separators() {
        assert!(looks_like_phone("050 123 4567"));
        assert!(looks_like_phone("+971-50-123-4567"));
        assert!(!looks_like_phone("12345"));
        assert!(!looks_like_phone("call me maybe"));
    }

    #[test]
    fn intent_keywords_classify_into_tags() {
        assert_eq!(classify_intent("I want to buy a villa"), "Buy");
        assert_eq!(classify_intent("Looking to RENT a studio"), "Rent");
        assert_eq!(classify_intent("I am selling, listing my property"), "Sell");
        assert_eq!(classify_intent("what are your office hours?"), "General Inquiry");
    }

    #[test]
    fn name_markers_yield_capitalized_names() {
        assert_eq!(extract_name("Hi, my name is ali"), Some("Ali".to_string()));
        assert_eq!(extract_name("I am Omar (0501234567)"), Some("Omar".to_string()));
        assert_eq!(extract_name("Name: sara"), Some("Sara".to_string()));
        assert_eq!(extract_name("hello there"), None);
    }

    #[test]
    fn single_utterance_classifies_into_a_full_draft() {
        let draft = draft_from_text("Hi, I am Ali (0501234567). Looking to buy a villa.");
        assert_eq!(draft.name.as_deref(), Some("Ali"));
        assert_eq!(draft.phone.as_deref(), Some("0501234567"));
        assert_eq!(draft.intent.as_deref(), Some("Buy"));
        assert_eq!(
            draft.original_text.as_deref(),
            Some("Hi, I am Ali (0501234567). Looking to buy a villa.")
        );
    }
}
