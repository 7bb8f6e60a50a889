//! Core data model: spans, PII types, hits, and the code-point/byte-offset
//! conversion helper. Positions on [`Hit`] are Unicode code-point indices;
//! detectors internally work in byte offsets (what `regex` gives back) and
//! convert once via [`CodepointIndex`] before a hit leaves the runtime.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Baseline PII type identifiers. `PiiType` itself is an opaque string so
/// plugins can introduce new ones; these constants name the types this
/// crate's built-in detectors and validators know about.
pub mod pii_type {
    pub const EMAIL: &str = "email";
    pub const CREDIT_CARD: &str = "credit_card";
    pub const IPV4: &str = "ipv4";
    pub const PHONE_E164: &str = "phone_e164";
    pub const MYNUMBER_JP: &str = "mynumber_jp";
    pub const JWT: &str = "sec_jwt_token";
    pub const HIGH_ENTROPY_TOKEN: &str = "high_entropy_token";
}

/// An opaque PII type identifier. Core defines a baseline set (see
/// [`pii_type`]); plugins may introduce their own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PiiType(pub String);

impl PiiType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PiiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PiiType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PiiType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Advisory-only risk classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Half-open `[start, end)` character range over the input string.
/// Positions are Unicode code-point indices, not byte offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Whether this span shares any character with `other`.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Coarse phone-number subtype, set by the `phone_e164` validator when it
/// can infer one from the number's structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhoneSubtype {
    Mobile,
    Landline,
    Unknown,
}

/// Card brand inferred from a credit card's prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardBrand {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Other(String),
}

/// Typed auxiliary data attached to a [`Hit`]. Modeled as a struct with
/// known fields per PII domain rather than an untyped map, plus a small
/// `extra` bag for plugin-specific data (design note: avoid untyped
/// reflection in validators/scorer).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HitFeatures {
    /// `$.user.email`-style JSON path, set by the JSON detector.
    pub json_path: Option<String>,
    /// The JSON object key the value was found under.
    pub key_name: Option<String>,
    /// True for any hit produced by walking a parsed JSON document.
    #[serde(default)]
    pub is_json_detection: bool,
    pub phone_subtype: Option<PhoneSubtype>,
    /// Normalized form of the value (e.g. digits-only for a card number).
    pub normalized: Option<String>,
    pub card_brand: Option<CardBrand>,
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A candidate PII span produced by a detector, possibly refined by
/// validators, the confidence scorer, and the allow/deny filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub pii_type: PiiType,
    pub span: Span,
    /// Original substring `input[start..end]` (in code-point terms).
    pub value: String,
    pub risk: RiskLevel,
    /// Lower priority is processed earlier during overlap resolution.
    pub priority: i32,
    /// `None` until the confidence scorer runs.
    pub confidence: Option<f64>,
    /// Ordered list of short string tags explaining how this hit was
    /// produced, validated, and scored.
    pub reasons: Vec<String>,
    pub features: HitFeatures,
}

impl Hit {
    pub fn overlaps(&self, other: &Hit) -> bool {
        self.span.overlaps(&other.span)
    }

    pub fn push_reason(&mut self, reason: impl Into<String>) {
        self.reasons.push(reason.into());
    }
}

/// Result of a `detect` call: the original input plus the final,
/// non-overlapping, `start`-ordered list of hits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub src: String,
    pub hits: Vec<Hit>,
}

/// A cooperative cancellation signal checked between detector invocations
/// and, in the streaming transform, between lines. The core starts no
/// timers itself; callers own the clock.
pub trait CancelSignal: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// Default "never cancelled" signal, used when a caller doesn't need one.
pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Maps byte offsets (what `regex` and `serde_json` report) to Unicode
/// code-point offsets (what this crate's public `Span`s use), built once
/// per `detect`/`redact` call.
///
/// Stores one entry per character's byte offset and looks positions up
/// with binary search, rather than materializing a byte-indexed table,
/// to keep memory proportional to character count rather than byte count.
pub struct CodepointIndex {
    /// Byte offset at which each code point starts; `boundaries[i]` is the
    /// byte offset of the i-th code point. Has one extra trailing entry
    /// equal to the input's byte length so `end` offsets resolve cleanly.
    boundaries: Vec<usize>,
}

impl CodepointIndex {
    pub fn new(s: &str) -> Self {
        let mut boundaries: Vec<usize> = s.char_indices().map(|(i, _)| i).collect();
        boundaries.push(s.len());
        Self { boundaries }
    }

    /// Converts a byte offset into the code-point offset of the character
    /// that starts there (or, for the input's length, the code-point
    /// length of the whole string).
    pub fn to_codepoint(&self, byte_offset: usize) -> usize {
        match self.boundaries.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx,
        }
    }

    /// Total number of code points in the indexed string.
    pub fn len(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_overlap() {
        let a = Span::new(0, 5);
        let b = Span::new(4, 10);
        let c = Span::new(5, 10);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn codepoint_index_ascii() {
        let idx = CodepointIndex::new("hello world");
        assert_eq!(idx.to_codepoint(0), 0);
        assert_eq!(idx.to_codepoint(6), 6);
        assert_eq!(idx.len(), 11);
    }

    #[test]
    fn codepoint_index_multibyte() {
        // "e" + combining accent style multi-byte char mid-string.
        let s = "a\u{e9} b"; // 'é' is 2 bytes in UTF-8 but 1 code point
        let idx = CodepointIndex::new(s);
        assert_eq!(idx.to_codepoint(0), 0); // 'a'
        assert_eq!(idx.to_codepoint(1), 1); // 'é'
        assert_eq!(idx.to_codepoint(3), 2); // ' '
        assert_eq!(idx.to_codepoint(4), 3); // 'b'
        assert_eq!(idx.len(), 4);
    }

    #[test]
    fn pii_type_display() {
        let t = PiiType::from("email");
        assert_eq!(t.to_string(), "email");
        assert_eq!(t.as_str(), "email");
    }
}
