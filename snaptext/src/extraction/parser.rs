use std::sync::OnceLock;

use regex::Regex;

use crate::config::ScoringConfig;

/// Structured fields recovered from a free-form model reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExtraction {
    pub text: String,
    pub language: String,
    pub confidence: f32,
}

fn language_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^[ \t]*LANGUAGE:[ \t]*([a-z]{2,3})[ \t]*$").expect("valid regex")
    })
}

fn confidence_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?mi)^[ \t]*CONFIDENCE:[ \t]*([0-9]+(?:\.[0-9]+)?)[ \t]*%?[ \t]*$")
            .expect("valid regex")
    })
}

/// Parse a raw model reply into text, language and confidence.
///
/// The prompt asks the model to append `LANGUAGE:` and `CONFIDENCE:` marker
/// lines, but that is a convention, not a contract: when either marker is
/// missing the parser falls back to heuristics (script detection for
/// language, weighted scoring for confidence). Marker lines are stripped
/// from the returned text so they never reach the user.
pub fn parse(raw: &str, scoring: &ScoringConfig) -> ParsedExtraction {
    let language = language_marker()
        .captures(raw)
        .map(|caps| caps[1].to_lowercase());

    let confidence = confidence_marker()
        .captures(raw)
        .and_then(|caps| caps[1].parse::<f32>().ok())
        .map(|value| value.clamp(0.0, 100.0));

    let without_language = language_marker().replace_all(raw, "");
    let text = confidence_marker()
        .replace_all(&without_language, "")
        .trim()
        .to_string();

    let language = language.unwrap_or_else(|| detect_language(&text).to_string());
    let confidence = confidence.unwrap_or_else(|| estimate_confidence(&text, scoring));

    ParsedExtraction {
        text,
        language,
        confidence,
    }
}

/// Script ranges checked in fixed precedence order; the first script with
/// any matching character wins.
const SCRIPTS: &[(&str, &[(u32, u32)])] = &[
    ("zh", &[(0x4E00, 0x9FFF), (0x3400, 0x4DBF)]),
    ("ja", &[(0x3040, 0x309F), (0x30A0, 0x30FF)]),
    ("ko", &[(0xAC00, 0xD7AF), (0x1100, 0x11FF)]),
    ("ar", &[(0x0600, 0x06FF)]),
    ("ru", &[(0x0400, 0x04FF)]),
    ("th", &[(0x0E00, 0x0E7F)]),
    ("he", &[(0x0590, 0x05FF)]),
];

/// Best-effort script detection. Defaults to `"en"` when no listed script
/// is present; Latin-alphabet languages are indistinguishable here.
pub fn detect_language(text: &str) -> &'static str {
    for (code, ranges) in SCRIPTS {
        if text.chars().any(|c| in_ranges(c, ranges)) {
            return code;
        }
    }
    "en"
}

fn in_ranges(c: char, ranges: &[(u32, u32)]) -> bool {
    let cp = c as u32;
    ranges.iter().any(|(start, end)| cp >= *start && cp <= *end)
}

const COMMON_PUNCTUATION: &str = ".,!?;:'\"()[]{}<>-/\\@#$%&*+=|_^~`";
const SHORT_TEXT_THRESHOLD: usize = 20;

/// Estimate confidence when the model did not report one.
///
/// Starts from the configured base score, rewards length and the presence
/// of letters, digits and punctuation, and penalizes short text containing
/// characters outside the plausible-text class (a proxy for garbled
/// output). Clamped to `[0, 100]`; empty text is exactly 0.
pub fn estimate_confidence(text: &str, scoring: &ScoringConfig) -> f32 {
    if text.is_empty() {
        return 0.0;
    }

    let mut score = scoring.base_score;
    let length = text.chars().count();

    for threshold in [10, 50, 100] {
        if length > threshold {
            score += scoring.length_bonus;
        }
    }

    if text.chars().any(char::is_alphabetic) && text.chars().any(char::is_whitespace) {
        score += scoring.letters_bonus;
    }
    if text.chars().any(|c| c.is_ascii_digit()) {
        score += scoring.digits_bonus;
    }
    if text.chars().any(|c| COMMON_PUNCTUATION.contains(c)) {
        score += scoring.punctuation_bonus;
    }

    if length < SHORT_TEXT_THRESHOLD && text.chars().any(|c| !is_plausible_char(c)) {
        score -= scoring.garbled_penalty;
    }

    score.clamp(0.0, 100.0)
}

/// Characters a legible extraction is expected to consist of. Alphanumeric
/// covers the non-Latin scripts listed in [`SCRIPTS`].
fn is_plausible_char(c: char) -> bool {
    c.is_alphanumeric() || c.is_whitespace() || COMMON_PUNCTUATION.contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scoring() -> ScoringConfig {
        ScoringConfig::default()
    }

    #[test]
    fn test_both_markers_extracted_and_stripped() {
        let raw = "INVOICE #1023\nLANGUAGE: en\nCONFIDENCE: 97";
        let parsed = parse(raw, &scoring());

        assert_eq!(parsed.text, "INVOICE #1023");
        assert_eq!(parsed.language, "en");
        assert_eq!(parsed.confidence, 97.0);
    }

    #[test]
    fn test_markers_case_insensitive() {
        let raw = "Hello world\nlanguage: FR\nConfidence: 88.5";
        let parsed = parse(raw, &scoring());

        assert_eq!(parsed.text, "Hello world");
        assert_eq!(parsed.language, "fr");
        assert_eq!(parsed.confidence, 88.5);
    }

    #[test]
    fn test_clean_text_round_trips_verbatim() {
        let raw = "Quarterly report\nRevenue up 12%\nNo markers here";
        let parsed = parse(raw, &scoring());

        assert_eq!(parsed.text, raw);
        assert_eq!(parsed.language, "en");
    }

    #[test]
    fn test_parse_is_idempotent_on_clean_text() {
        let raw = "Some already-clean text with digits 42.";
        let first = parse(raw, &scoring());
        let second = parse(&first.text, &scoring());
        assert_eq!(first.text, second.text);
    }

    #[test]
    fn test_marker_confidence_clamped_to_range() {
        let parsed = parse("text\nCONFIDENCE: 250", &scoring());
        assert_eq!(parsed.confidence, 100.0);
    }

    #[test]
    fn test_inline_mention_is_not_a_marker() {
        let raw = "The form asks for LANGUAGE: preference before CONFIDENCE: rating";
        let parsed = parse(raw, &scoring());
        assert_eq!(parsed.text, raw, "Mid-line labels must not be stripped");
    }

    #[test]
    fn test_cjk_precedes_cyrillic() {
        assert_eq!(detect_language("Привет 世界"), "zh");
        assert_eq!(detect_language("мир"), "ru");
    }

    #[test]
    fn test_script_detection_order() {
        assert_eq!(detect_language("こんにちは"), "ja");
        assert_eq!(detect_language("안녕하세요"), "ko");
        assert_eq!(detect_language("مرحبا"), "ar");
        assert_eq!(detect_language("สวัสดี"), "th");
        assert_eq!(detect_language("שלום"), "he");
        assert_eq!(detect_language("hello"), "en");
        assert_eq!(detect_language(""), "en");
    }

    #[test]
    fn test_empty_text_confidence_is_zero() {
        assert_eq!(estimate_confidence("", &scoring()), 0.0);

        let parsed = parse("LANGUAGE: en", &scoring());
        assert_eq!(parsed.text, "");
        assert_eq!(parsed.confidence, 0.0);
    }

    #[test]
    fn test_confidence_always_within_bounds() {
        let samples = [
            "",
            "x",
            "short",
            "a longer sentence with more than fifty characters inside it, plus digits 123!",
            &"word ".repeat(50),
            "\u{FFFD}\u{FFFD}\u{FFFD}",
            "正常な日本語のテキスト",
        ];
        for sample in samples {
            let score = estimate_confidence(sample, &scoring());
            assert!(
                (0.0..=100.0).contains(&score),
                "score {score} out of range for {sample:?}"
            );
        }
    }

    #[test]
    fn test_length_and_content_bonuses() {
        // >10 chars, letters + whitespace, digits, punctuation:
        // 80 + 5 + 5 + 2 + 3 = 95
        let score = estimate_confidence("Total: 42 items", &scoring());
        assert_eq!(score, 95.0);
    }

    #[test]
    fn test_short_garbled_text_penalized() {
        // Short, no letters/digits/whitespace/punctuation: 80 - 10 = 70
        let score = estimate_confidence("\u{FFFD}\u{FFFD}\u{FFFD}", &scoring());
        assert_eq!(score, 70.0);
    }

    #[test]
    fn test_custom_weights_respected() {
        let custom = ScoringConfig {
            base_score: 50.0,
            length_bonus: 0.0,
            letters_bonus: 0.0,
            digits_bonus: 0.0,
            punctuation_bonus: 0.0,
            garbled_penalty: 0.0,
        };
        assert_eq!(estimate_confidence("anything at all here", &custom), 50.0);
    }

    #[test]
    fn test_marker_language_preferred_over_detection() {
        let raw = "Привет мир\nLANGUAGE: uk\nCONFIDENCE: 90";
        let parsed = parse(raw, &scoring());
        assert_eq!(parsed.language, "uk");
        assert_eq!(parsed.text, "Привет мир");
    }
}
