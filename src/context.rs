//! Context analyzer: a pure function over `(text, byte_position)` that
//! samples a bounded window and extracts document-structure and marker
//! features used by the confidence scorer.
//!
//! Grounded on the teacher's `privacy::sanitized_logger::sanitize_error_message`
//! (regex-classified text spans) and the entropy primitive from
//! `other_examples`'s secret-redaction helpers, generalized into the
//! spec's full feature set.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Scan window cap: keeps cost bounded on large inputs (spec §5).
const WINDOW_BYTES: usize = 2048;
/// Marker proximity search radius in characters.
const MARKER_WINDOW: usize = 80;
/// Entropy/repetition proximity search radius in characters.
const ENTROPY_WINDOW: usize = 40;
const REPETITION_WINDOW: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerLanguage {
    En,
    Ja,
    Mixed,
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructureFeatures {
    pub json_like: bool,
    pub xml_like: bool,
    pub csv_like: bool,
    pub markdown_like: bool,
    pub code_block: bool,
    pub header_row: bool,
    pub template_section: bool,
    pub log_like: bool,
}

#[derive(Debug, Clone)]
pub struct MarkerFeatures {
    pub example_nearby: bool,
    pub test_nearby: bool,
    pub sample_nearby: bool,
    pub dummy_nearby: bool,
    pub placeholder_nearby: bool,
    /// Distance in characters to the nearest marker of any category;
    /// `-1` if none was found in the search window.
    pub distance_to_nearest_marker: i64,
    pub marker_language: MarkerLanguage,
    pub date_placeholder_nearby: bool,
    pub currency_placeholder_nearby: bool,
    pub address_placeholder_nearby: bool,
    pub phone_placeholder_nearby: bool,
    pub name_placeholder_nearby: bool,
}

impl Default for MarkerFeatures {
    fn default() -> Self {
        Self {
            example_nearby: false,
            test_nearby: false,
            sample_nearby: false,
            dummy_nearby: false,
            placeholder_nearby: false,
            distance_to_nearest_marker: -1,
            marker_language: MarkerLanguage::Unknown,
            date_placeholder_nearby: false,
            currency_placeholder_nearby: false,
            address_placeholder_nearby: false,
            phone_placeholder_nearby: false,
            name_placeholder_nearby: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContextFeatures {
    pub structure: StructureFeatures,
    pub markers: MarkerFeatures,
    pub language: MarkerLanguage,
    pub high_entropy_nearby: bool,
    pub repetition_detected: bool,
}

struct MarkerVocab {
    en: &'static [&'static str],
    ja: &'static [&'static str],
}

const EXAMPLE_MARKERS: MarkerVocab = MarkerVocab {
    en: &["example", "e.g.", "eg.", "for instance"],
    ja: &["例えば", "例:", "例："],
};
const TEST_MARKERS: MarkerVocab = MarkerVocab {
    en: &["test", "testing", "test case"],
    ja: &["テスト", "検証用"],
};
const SAMPLE_MARKERS: MarkerVocab = MarkerVocab {
    en: &["sample", "sample data"],
    ja: &["サンプル"],
};
const DUMMY_MARKERS: MarkerVocab = MarkerVocab {
    en: &["dummy", "fake", "mock"],
    ja: &["ダミー", "偽"],
};
const PLACEHOLDER_MARKERS: MarkerVocab = MarkerVocab {
    en: &["placeholder", "xxx", "tbd", "todo", "<redacted>"],
    ja: &["プレースホルダー", "仮"],
};
const DATE_PLACEHOLDER_MARKERS: MarkerVocab = MarkerVocab {
    en: &["yyyy-mm-dd", "dd/mm/yyyy", "mm/dd/yyyy", "date_here"],
    ja: &["年月日"],
};
const CURRENCY_PLACEHOLDER_MARKERS: MarkerVocab = MarkerVocab {
    en: &["$0.00", "amount_here", "xx.xx"],
    ja: &["円額"],
};
const ADDRESS_PLACEHOLDER_MARKERS: MarkerVocab = MarkerVocab {
    en: &["123 main st", "address_here"],
    ja: &["住所ここ"],
};
const PHONE_PLACEHOLDER_MARKERS: MarkerVocab = MarkerVocab {
    en: &["555-0100", "phone_here", "xxx-xxx-xxxx"],
    ja: &["電話ここ"],
};
const NAME_PLACEHOLDER_MARKERS: MarkerVocab = MarkerVocab {
    en: &["john doe", "jane doe", "name_here"],
    ja: &["山田太郎"],
};

static HIGH_ENTROPY_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9+/=_\-]{20,}").unwrap());
static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```").unwrap());
static TEMPLATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{[^{}]*\}\}|\$\{[^{}]*\}|\{[A-Za-z0-9_.]+\}").unwrap());
static LOG_TIMESTAMP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}").unwrap()
});
static LOG_LEVEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(DEBUG|INFO|WARN|ERROR|TRACE|FATAL)\b").unwrap());
static MARKDOWN_HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s").unwrap());
static MARKDOWN_BULLET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[-*]\s").unwrap());

/// Widens `idx` outward until it lands on a UTF-8 char boundary.
fn floor_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}

fn window<'a>(text: &'a str, byte_pos: usize, radius: usize) -> &'a str {
    let start = floor_boundary(text, byte_pos.saturating_sub(radius));
    let end = ceil_boundary(text, (byte_pos + radius).min(text.len()));
    &text[start..end]
}

fn current_line(text: &str, byte_pos: usize) -> &str {
    let pos = byte_pos.min(text.len());
    let start = text[..pos]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = text[pos..]
        .find('\n')
        .map(|i| pos + i)
        .unwrap_or(text.len());
    &text[start..end]
}

fn classify_language(s: &str) -> MarkerLanguage {
    let mut has_ja = false;
    let mut has_ascii_letter = false;
    for c in s.chars() {
        let cp = c as u32;
        // Hiragana, Katakana, CJK Unified Ideographs (commonly used for Japanese).
        if (0x3040..=0x30FF).contains(&cp) || (0x4E00..=0x9FFF).contains(&cp) {
            has_ja = true;
        } else if c.is_ascii_alphabetic() {
            has_ascii_letter = true;
        }
    }
    match (has_ja, has_ascii_letter) {
        (true, true) => MarkerLanguage::Mixed,
        (true, false) => MarkerLanguage::Ja,
        (false, true) => MarkerLanguage::En,
        (false, false) => MarkerLanguage::Unknown,
    }
}

/// Finds the nearest occurrence (by character distance from `center`) of
/// any vocab entry within `haystack`, searching the same line first
/// (distance 0 priority) and then the wider window.
fn nearest_marker_distance(haystack: &str, vocab: &MarkerVocab, same_line: &str) -> Option<i64> {
    let lower_same_line = same_line.to_lowercase();
    for term in vocab.en.iter().chain(vocab.ja.iter()) {
        if lower_same_line.contains(&term.to_lowercase()) {
            return Some(0);
        }
    }

    let lower = haystack.to_lowercase();
    let center = lower.chars().count() / 2;
    let mut best: Option<i64> = None;
    for term in vocab.en.iter().chain(vocab.ja.iter()) {
        let needle = term.to_lowercase();
        if needle.is_empty() {
            continue;
        }
        let mut search_from = 0usize;
        while let Some(byte_idx) = lower[search_from..].find(&needle) {
            let abs_byte = search_from + byte_idx;
            let char_idx = lower[..abs_byte].chars().count();
            let distance = (char_idx as i64 - center as i64).abs();
            best = Some(best.map_or(distance, |b: i64| b.min(distance)));
            search_from = abs_byte + needle.len().max(1);
            if search_from >= lower.len() {
                break;
            }
        }
    }
    best
}

fn marker_present(haystack: &str, vocab: &MarkerVocab) -> bool {
    let lower = haystack.to_lowercase();
    vocab
        .en
        .iter()
        .chain(vocab.ja.iter())
        .any(|term| lower.contains(&term.to_lowercase()))
}

fn detect_structure(window_text: &str, whole_text: &str, byte_pos: usize) -> StructureFeatures {
    let brace_count = window_text.matches('{').count() + window_text.matches('}').count();
    let colon_count = window_text.matches(':').count();
    let quoted_key = Regex::new(r#""[A-Za-z0-9_]+"\s*:"#).unwrap().is_match(window_text);
    let json_like = brace_count >= 2 && colon_count >= 1 && quoted_key;

    let open_tags = Regex::new(r"<[A-Za-z][A-Za-z0-9_-]*[^>]*>").unwrap().find_iter(window_text).count();
    let close_tags = Regex::new(r"</[A-Za-z][A-Za-z0-9_-]*>").unwrap().find_iter(window_text).count();
    let xml_like = open_tags > 0 && close_tags > 0 && !json_like;

    let csv_like = detect_csv_like(whole_text, byte_pos) && !json_like && !xml_like;

    let markdown_like =
        MARKDOWN_HEADING_RE.is_match(window_text) || MARKDOWN_BULLET_RE.is_match(window_text);
    let code_block = CODE_FENCE_RE.is_match(window_text);
    let header_row = detect_header_row(whole_text, byte_pos);
    let template_section = TEMPLATE_RE.is_match(window_text);
    let log_like = LOG_TIMESTAMP_RE.is_match(window_text) && LOG_LEVEL_RE.is_match(window_text);

    StructureFeatures {
        json_like,
        xml_like,
        csv_like,
        markdown_like,
        code_block,
        header_row,
        template_section,
        log_like,
    }
}

/// Looks at up to the first 5 lines around `byte_pos` for a consistent
/// delimiter (`,`, `\t`, `;`, `|`) with bounded variance in column count.
fn detect_csv_like(text: &str, byte_pos: usize) -> bool {
    let pos = byte_pos.min(text.len());
    let start = text[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let lines: Vec<&str> = text[start..].lines().take(5).collect();
    if lines.len() < 2 {
        return false;
    }
    for delim in [',', '\t', ';', '|'] {
        let counts: Vec<usize> = lines.iter().map(|l| l.matches(delim).count()).collect();
        if counts.iter().all(|&c| c > 0) {
            let min = *counts.iter().min().unwrap();
            let max = *counts.iter().max().unwrap();
            if max - min <= 1 {
                return true;
            }
        }
    }
    false
}

/// Heuristic: the line immediately above the current line looks like a
/// header row (no digits, comma/tab separated, title-cased-ish words).
fn detect_header_row(text: &str, byte_pos: usize) -> bool {
    let pos = byte_pos.min(text.len());
    let start_of_current = text[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    if start_of_current == 0 {
        return false;
    }
    let before = &text[..start_of_current.saturating_sub(1)];
    let prev_line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let prev_line = &before[prev_line_start..];
    if prev_line.trim().is_empty() {
        return false;
    }
    let has_delim = prev_line.contains(',') || prev_line.contains('\t');
    let has_digit = prev_line.chars().any(|c| c.is_ascii_digit());
    has_delim && !has_digit
}

fn shannon_charset_ratio(token: &str) -> f64 {
    if token.is_empty() {
        return 0.0;
    }
    let unique: std::collections::HashSet<char> = token.chars().collect();
    unique.len() as f64 / token.chars().count() as f64
}

fn looks_hex_or_base64(token: &str) -> bool {
    let is_hex = token.len() >= 20 && token.chars().all(|c| c.is_ascii_hexdigit());
    let is_b64ish = token.len() >= 20
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=' || c == '_' || c == '-');
    is_hex || is_b64ish
}

fn detect_high_entropy_nearby(text: &str, byte_pos: usize) -> bool {
    let w = window(text, byte_pos, ENTROPY_WINDOW);
    HIGH_ENTROPY_TOKEN_RE.find_iter(w).any(|m| {
        let token = m.as_str();
        shannon_charset_ratio(token) > 0.7 || looks_hex_or_base64(token)
    })
}

fn detect_repetition(text: &str, byte_pos: usize) -> bool {
    let w = window(text, byte_pos, REPETITION_WINDOW);
    let tokens: Vec<&str> = w.split_whitespace().collect();
    if tokens.len() < 3 {
        return false;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for t in &tokens {
        *counts.entry(*t).or_insert(0) += 1;
    }
    let max_count = counts.values().copied().max().unwrap_or(0);
    (max_count as f64) / (tokens.len() as f64) > 0.4
}

/// Analyzes the text surrounding `byte_pos` (a byte offset into `text`)
/// and returns the full feature set used by the confidence scorer.
pub fn analyze(text: &str, byte_pos: usize) -> ContextFeatures {
    let w = window(text, byte_pos, WINDOW_BYTES / 2);
    let same_line = current_line(text, byte_pos);
    let marker_w = window(text, byte_pos, MARKER_WINDOW);

    let structure = detect_structure(w, text, byte_pos);

    let dist_example = nearest_marker_distance(marker_w, &EXAMPLE_MARKERS, same_line);
    let dist_test = nearest_marker_distance(marker_w, &TEST_MARKERS, same_line);
    let dist_sample = nearest_marker_distance(marker_w, &SAMPLE_MARKERS, same_line);
    let dist_dummy = nearest_marker_distance(marker_w, &DUMMY_MARKERS, same_line);
    let dist_placeholder = nearest_marker_distance(marker_w, &PLACEHOLDER_MARKERS, same_line);

    let distance_to_nearest_marker = [dist_example, dist_test, dist_sample, dist_dummy, dist_placeholder]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(-1);

    let marker_language = classify_language(marker_w);

    let markers = MarkerFeatures {
        example_nearby: dist_example.is_some(),
        test_nearby: dist_test.is_some(),
        sample_nearby: dist_sample.is_some(),
        dummy_nearby: dist_dummy.is_some(),
        placeholder_nearby: dist_placeholder.is_some(),
        distance_to_nearest_marker,
        marker_language,
        date_placeholder_nearby: marker_present(marker_w, &DATE_PLACEHOLDER_MARKERS),
        currency_placeholder_nearby: marker_present(marker_w, &CURRENCY_PLACEHOLDER_MARKERS),
        address_placeholder_nearby: marker_present(marker_w, &ADDRESS_PLACEHOLDER_MARKERS),
        phone_placeholder_nearby: marker_present(marker_w, &PHONE_PLACEHOLDER_MARKERS),
        name_placeholder_nearby: marker_present(marker_w, &NAME_PLACEHOLDER_MARKERS),
    };

    ContextFeatures {
        structure,
        markers,
        language: classify_language(w),
        high_entropy_nearby: detect_high_entropy_nearby(text, byte_pos),
        repetition_detected: detect_repetition(text, byte_pos),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_example_marker_same_line() {
        let text = "email (example): test@example.com is not real";
        let features = analyze(text, text.find("test@").unwrap());
        assert!(features.markers.example_nearby);
        assert_eq!(features.markers.distance_to_nearest_marker, 0);
    }

    #[test]
    fn detects_japanese_marker() {
        let text = "例えば test@example.com はダミーです";
        let features = analyze(text, text.find("test@").unwrap());
        assert!(features.markers.example_nearby);
    }

    #[test]
    fn detects_json_like_structure() {
        let text = r#"{"user": {"email": "a@b.com"}}"#;
        let features = analyze(text, text.find("a@b.com").unwrap());
        assert!(features.structure.json_like);
    }

    #[test]
    fn detects_code_block() {
        let text = "```\nemail: a@b.com\n```";
        let features = analyze(text, text.find("a@b.com").unwrap());
        assert!(features.structure.code_block);
    }

    #[test]
    fn no_markers_in_plain_prose() {
        let text = "Please reach out to a@b.com about the contract renewal.";
        let features = analyze(text, text.find("a@b.com").unwrap());
        assert!(!features.markers.example_nearby);
        assert_eq!(features.markers.distance_to_nearest_marker, -1);
    }

    #[test]
    fn detects_high_entropy_nearby() {
        let text = "token=aB3cD4eF5gH6iJ7kL8mN9oP0qRsTuVwXyZ1234567890abcdef end";
        let features = analyze(text, 0);
        assert!(features.high_entropy_nearby);
    }

    #[test]
    fn detects_repetition() {
        let text = "spam spam spam spam spam spam real content here";
        let features = analyze(text, 0);
        assert!(features.repetition_detected);
    }
}
