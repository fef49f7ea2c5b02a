/// Hedging phrases that mark an answer as a non-answer. Matching is
/// case-sensitive and by plain substring.
pub const DENYLIST: [&str; 10] = [
    "Apologies",
    "provided information does not specify",
    "document does not provide",
    "not detailed in the available content",
    " not explicitly provided",
    "not explicitly mentioned",
    "not elaborated",
    "not have the information",
    "lack of data",
    "not available",
];

/// Shown in place of an answer that failed the relevance check.
pub const FALLBACK_TEXT: &str =
    "Please contact the live agent for your query at customerservice@tttech-auto.com";

/// First denylisted phrase contained in `answer`, if any.
pub fn matched_phrase(answer: &str) -> Option<&'static str> {
    DENYLIST.iter().copied().find(|phrase| answer.contains(phrase))
}

/// An answer is relevant when it contains none of the denylisted phrases.
/// The empty string is relevant.
pub fn is_relevant(answer: &str) -> bool {
    matched_phrase(answer).is_none()
}
