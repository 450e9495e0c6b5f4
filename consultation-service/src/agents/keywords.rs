//! Keyword lexicon for the rule-based completeness checks. Matching is plain
//! lowercase substring search over the concatenated patient messages.

/// What the patient experiences
pub const SYMPTOM_KEYWORDS: &[&str] = &[
    "pain", "ache", "hurt", "sore", "tender", "discomfort", "fever", "hot", "chills", "shiver",
    "sick", "ill", "unwell", "cough", "cold", "congestion", "stuffy", "runny", "shortness",
    "breath", "breathless", "wheezing", "throat", "hoarse", "nausea", "vomit", "diarrhea",
    "constipation", "stomach", "belly", "abdomen", "cramp", "headache", "dizzy", "dizziness",
    "vertigo", "faint", "fatigue", "tired", "weakness", "weak", "rash", "itch", "itching", "burn",
    "burning", "swell", "swelling", "bleed", "bleeding", "symptom", "issue", "problem", "trouble",
];

/// How long the symptoms have been present
pub const DURATION_KEYWORDS: &[&str] = &[
    "day", "week", "month", "year", "hour", "minute", "second", "yesterday", "today", "tonight",
    "morning", "afternoon", "evening", "night", "ago", "started", "began", "since", "when",
    "ongoing", "continuous", "chronic", "acute", "recently", "just", "now",
];

/// Intensity of the symptoms
pub const SEVERITY_KEYWORDS: &[&str] = &[
    "severe", "mild", "moderate", "intense", "bad", "worse", "worsening", "better", "improving",
    "scale", "level", "sharp", "dull", "throbbing", "aching", "terrible", "extreme", "slight",
    "minimal", "unbearable", "manageable", "tolerable", "out of", "/10",
];

/// Affected body region
pub const LOCATION_KEYWORDS: &[&str] = &[
    "chest", "head", "back", "leg", "arm", "stomach", "throat", "left", "right", "upper", "lower",
    "side", "neck", "shoulder", "abdomen", "belly", "hip", "knee", "foot", "hand", "jaw", "ear",
    "eye", "face", "joint", "front", "rear", "middle", "center", "top", "bottom", "inner", "outer",
];

/// Prior conditions, medications, allergies
pub const HISTORY_KEYWORDS: &[&str] = &[
    "history", "condition", "disease", "before", "previous", "past", "had", "medication",
    "medicine", "drug", "allergy", "allergic", "surgery", "operation", "removed", "diagnosed",
    "treatment", "treat", "treated", "chronic", "diabetes", "hypertension", "blood pressure",
    "asthma", "cancer", "heart", "migraine", "arthritis", "took", "take", "taking",
    "prescription", "hospitalized", "hospital", "emergency", "admitted",
];

pub fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

/// Presence flags for each information category in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryPresence {
    pub symptoms: bool,
    pub duration: bool,
    pub severity: bool,
    pub location: bool,
    pub history: bool,
}

/// Scan the lowercased conversation text for each keyword set
pub fn analyze(text: &str) -> CategoryPresence {
    CategoryPresence {
        symptoms: contains_any(text, SYMPTOM_KEYWORDS),
        duration: contains_any(text, DURATION_KEYWORDS),
        severity: contains_any(text, SEVERITY_KEYWORDS),
        location: contains_any(text, LOCATION_KEYWORDS),
        history: contains_any(text, HISTORY_KEYWORDS),
    }
}

/// Pain complaints get stricter severity/location requirements
pub fn mentions_pain(text: &str) -> bool {
    text.contains("pain") || text.contains("ache")
}

/// Join patient messages into the lowercase haystack the matchers scan
pub fn combined_text(messages: &[String]) -> String {
    messages.join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_categories_in_plain_language() {
        let text = combined_text(&[
            "I have a headache".to_string(),
            "it started 3 days ago".to_string(),
            "it is severe, 8 out of 10".to_string(),
        ]);
        let found = analyze(&text);
        assert!(found.symptoms);
        assert!(found.duration);
        assert!(found.severity);
        // "headache" also carries the body region
        assert!(found.location);
        assert!(!found.history);
    }

    #[test]
    fn headache_counts_as_pain() {
        assert!(mentions_pain("a dull headache"));
        assert!(mentions_pain("chest pain"));
        assert!(!mentions_pain("a runny nose"));
    }

    #[test]
    fn no_false_positives_on_greeting() {
        let found = analyze(&combined_text(&["hello there".to_string()]));
        assert!(!found.symptoms);
        assert!(!found.duration);
        assert!(!found.severity);
        assert!(!found.history);
    }
}
