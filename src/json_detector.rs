//! JSON/NDJSON-aware detection: walks a parsed document's string leaves
//! through the same detector runtime used for plain text, attaching a
//! `$.a.b.[0].c`-style JSON path and the enclosing object key to each
//! hit, and independently flagging values held under a PII-labeled key
//! even when the value itself fails text detection.
//!
//! New relative to the teacher, which only ever saw flat chat text;
//! grounded in spec.md §4.I and, for the recursion-depth guard, the
//! same bounded-window discipline the context analyzer uses.

use serde_json::Value;

use crate::config::RegistryConfig;
use crate::detectors::DetectorRuntime;
use crate::types::{CancelSignal, Hit, HitFeatures, PiiType, RiskLevel, Span};

/// Recursion depth cap: protects against pathological or adversarial
/// JSON nesting.
pub const MAX_JSON_DEPTH: usize = 10;

/// Priority assigned to any hit found under a PII-labeled key — lower
/// than every built-in detector's own priority, so a key match always
/// wins overlap resolution against a same-span content match.
const JSON_KEY_MATCH_PRIORITY: i32 = -5;

/// Confidence assigned to a hit synthesized purely from a key-name
/// match, independent of whatever (if anything) text detection found.
const JSON_KEY_MATCH_CONFIDENCE: f64 = 0.9;

struct JsonLeaf {
    path: String,
    key_name: Option<String>,
    value: String,
}

/// Maps a PII-sounding object key (case-insensitive substring match) to
/// the `PiiType` it labels. Anchors the English vocabulary spec.md §4.I
/// names explicitly (`email`, `phone`/`mobile`, `card_number`, `ssn`,
/// `address`) plus the corresponding Japanese terms, and extends it with
/// `mynumber`/`my_number` since that is one of this crate's own baseline
/// detector types.
const KEY_LABEL_MAP_EN: &[(&str, &str)] = &[
    ("email", crate::types::pii_type::EMAIL),
    ("mail", crate::types::pii_type::EMAIL),
    ("telephone", crate::types::pii_type::PHONE_E164),
    ("phone", crate::types::pii_type::PHONE_E164),
    ("mobile", crate::types::pii_type::PHONE_E164),
    ("tel", crate::types::pii_type::PHONE_E164),
    ("card_number", crate::types::pii_type::CREDIT_CARD),
    ("creditcard", crate::types::pii_type::CREDIT_CARD),
    ("credit_card", crate::types::pii_type::CREDIT_CARD),
    ("mynumber", crate::types::pii_type::MYNUMBER_JP),
    ("my_number", crate::types::pii_type::MYNUMBER_JP),
    ("ssn", "ssn"),
    ("address", "address"),
];
const KEY_LABEL_MAP_JA: &[(&str, &str)] = &[
    ("メール", crate::types::pii_type::EMAIL),
    ("電話", crate::types::pii_type::PHONE_E164),
    ("住所", "address"),
];

/// Returns the `PiiType` a key name labels, if any.
fn key_label_pii_type(key: &str) -> Option<&'static str> {
    let lower = key.to_lowercase();
    for (needle, pii_type) in KEY_LABEL_MAP_EN {
        if lower.contains(needle) {
            return Some(pii_type);
        }
    }
    for (needle, pii_type) in KEY_LABEL_MAP_JA {
        if key.contains(needle) {
            return Some(pii_type);
        }
    }
    None
}

fn collect_leaves(value: &Value, path: &str, key_name: Option<&str>, depth: usize, out: &mut Vec<JsonLeaf>) {
    if depth > MAX_JSON_DEPTH {
        return;
    }
    match value {
        Value::String(s) => out.push(JsonLeaf {
            path: path.to_string(),
            key_name: key_name.map(|k| k.to_string()),
            value: s.clone(),
        }),
        Value::Object(map) => {
            for (k, v) in map {
                let child_path = format!("{path}.{k}");
                collect_leaves(v, &child_path, Some(k), depth + 1, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                let child_path = format!("{path}.[{i}]");
                collect_leaves(v, &child_path, key_name, depth + 1, out);
            }
        }
        _ => {}
    }
}

/// Cheap heuristic used to decide whether to attempt JSON parsing at
/// all before falling back to plain-text detection: trimmed text
/// starts with `{` or `[`.
pub fn looks_like_json(text: &str) -> bool {
    matches!(text.trim_start().as_bytes().first(), Some(b'{') | Some(b'['))
}

/// Splits NDJSON (one JSON value per line) into its constituent lines,
/// skipping blank lines. Does not itself parse each line — callers
/// parse and recover per-line to avoid one malformed line failing the
/// whole stream.
pub fn split_ndjson_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().filter(|l| !l.trim().is_empty())
}

fn key_match_hit(leaf: &JsonLeaf, pii_type: &'static str) -> Option<Hit> {
    let len = leaf.value.chars().count();
    if len == 0 {
        return None;
    }
    Some(Hit {
        pii_type: PiiType::from(pii_type),
        span: Span::new(0, len),
        value: leaf.value.clone(),
        risk: RiskLevel::Medium,
        priority: JSON_KEY_MATCH_PRIORITY,
        confidence: Some(JSON_KEY_MATCH_CONFIDENCE),
        reasons: vec!["json_key_match".to_string()],
        features: HitFeatures {
            json_path: Some(leaf.path.clone()),
            key_name: leaf.key_name.clone(),
            is_json_detection: true,
            ..HitFeatures::default()
        },
    })
}

/// Walks `root`'s string leaves through `runtime`, annotating each hit
/// with its JSON path, enclosing key, and the `is_json_detection` flag.
///
/// Two independent emission paths run per leaf (spec.md §4.I step 3):
/// if the leaf's key matches a known PII label, a standalone hit of the
/// mapped type is synthesized for the whole value (reason
/// `json_key_match`, confidence ≥ 0.9) even if the value itself fails
/// every text detector; separately, the value is always run through
/// plain-text detection (reason `json_content_match`), and any such hit
/// under a labeled key is also pinned to the key-match priority so it
/// outranks hits found outside JSON. Both hits may survive into the raw
/// result; overlap resolution downstream collapses duplicates that
/// cover the same span.
pub async fn detect_json(
    root: &Value,
    runtime: &DetectorRuntime,
    config: &RegistryConfig,
    cancel: &dyn CancelSignal,
) -> Vec<Hit> {
    let mut leaves = Vec::new();
    collect_leaves(root, "$", None, 0, &mut leaves);

    let mut hits = Vec::new();
    for leaf in leaves {
        if cancel.is_cancelled() {
            break;
        }
        if hits.len() >= config.max_matches_per_call {
            break;
        }

        let mapped_type = leaf.key_name.as_deref().and_then(key_label_pii_type);

        if let Some(pii_type) = mapped_type {
            if let Some(hit) = key_match_hit(&leaf, pii_type) {
                hits.push(hit);
                if hits.len() >= config.max_matches_per_call {
                    continue;
                }
            }
        }

        let mut leaf_hits = runtime.run(&leaf.value, config, cancel).await;
        for hit in &mut leaf_hits {
            hit.features.json_path = Some(leaf.path.clone());
            hit.features.key_name = leaf.key_name.clone();
            hit.features.is_json_detection = true;
            hit.push_reason("json_content_match");
            if mapped_type.is_some() {
                hit.priority = JSON_KEY_MATCH_PRIORITY;
                hit.push_reason("json_key_match");
            }
        }
        hits.extend(leaf_hits);
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::patterns::default_detectors;
    use crate::types::NeverCancel;

    #[tokio::test]
    async fn finds_email_nested_under_key() {
        let doc: Value = serde_json::from_str(r#"{"user":{"contact_email":"a@b.com"}}"#).unwrap();
        let runtime = DetectorRuntime::new(default_detectors());
        let config = RegistryConfig::default();
        let hits = detect_json(&doc, &runtime, &config, &NeverCancel).await;
        // one independent key-match hit plus one content-match hit,
        // both for the same leaf; overlap resolution (at the registry
        // layer) is what collapses these into one.
        assert_eq!(hits.len(), 2);
        assert!(hits
            .iter()
            .all(|h| h.features.json_path.as_deref() == Some("$.user.contact_email")));
        assert!(hits.iter().all(|h| h.features.key_name.as_deref() == Some("contact_email")));
        assert!(hits.iter().all(|h| h.features.is_json_detection));
        assert!(hits.iter().any(|h| h.reasons.iter().any(|r| r == "json_key_match")));
        assert!(hits.iter().any(|h| h.reasons.iter().any(|r| r == "json_content_match")));
        assert!(hits.iter().all(|h| h.priority == JSON_KEY_MATCH_PRIORITY));
    }

    #[tokio::test]
    async fn key_match_fires_even_when_the_value_fails_text_detection() {
        // "555-123-4567" is not valid E.164 (no leading '+'), so no text
        // detector matches it; the key-match path must still fire.
        let doc: Value = serde_json::from_str(r#"{"phone":"555-123-4567"}"#).unwrap();
        let runtime = DetectorRuntime::new(default_detectors());
        let config = RegistryConfig::default();
        let hits = detect_json(&doc, &runtime, &config, &NeverCancel).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].pii_type, PiiType::from(crate::types::pii_type::PHONE_E164));
        assert_eq!(hits[0].priority, JSON_KEY_MATCH_PRIORITY);
        assert!(hits[0].reasons.iter().any(|r| r == "json_key_match"));
        assert_eq!(hits[0].confidence, Some(JSON_KEY_MATCH_CONFIDENCE));
    }

    #[tokio::test]
    async fn walks_arrays_with_indexed_path() {
        let doc: Value = serde_json::from_str(r#"{"emails":["a@b.com","c@d.com"]}"#).unwrap();
        let runtime = DetectorRuntime::new(default_detectors());
        let config = RegistryConfig::default();
        let hits = detect_json(&doc, &runtime, &config, &NeverCancel).await;
        // each of the 2 array leaves produces an independent key-match
        // hit (key "emails" labels email) plus a content-match hit.
        assert_eq!(hits.len(), 4);
        assert!(hits.iter().any(|h| h.features.json_path.as_deref() == Some("$.emails.[0]")));
        assert!(hits.iter().any(|h| h.features.json_path.as_deref() == Some("$.emails.[1]")));
    }

    #[test]
    fn looks_like_json_detects_braces_and_brackets() {
        assert!(looks_like_json("  {\"a\":1}"));
        assert!(looks_like_json("[1,2,3]"));
        assert!(!looks_like_json("plain text"));
    }

    #[test]
    fn split_ndjson_skips_blank_lines() {
        let text = "{\"a\":1}\n\n{\"b\":2}\n";
        let lines: Vec<&str> = split_ndjson_lines(text).collect();
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}"]);
    }
}
