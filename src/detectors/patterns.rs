//! Built-in pattern detectors: email, credit card, IPv4, E.164 phone,
//! Japanese My Number, JWT, and the opt-in high-entropy-token detector.
//!
//! Each detector's regex is deliberately permissive (a cheap first
//! pass); the corresponding validator in [`crate::validators`] does the
//! real structural check before a match becomes a [`Hit`].

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{CodepointIndex, Hit, HitFeatures, PiiType, RiskLevel, Span};
use crate::validators;

use super::{Detector, DetectorContext};

static EMAIL_FIND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+")
        .expect("static regex")
});
static CREDIT_CARD_FIND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d[ -]?){12,18}\d\b").expect("static regex"));
static IPV4_FIND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").expect("static regex"));
static PHONE_E164_FIND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\+[1-9]\d{7,14}\b").expect("static regex"));
static MYNUMBER_JP_FIND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{4}-?\d{4}-?\d{4}\b").expect("static regex"));
static JWT_FIND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}\.[A-Za-z0-9_-]{10,}\b")
        .expect("static regex")
});
static HIGH_ENTROPY_FIND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9+/=_-]{20,}").expect("static regex"));

fn hit_from_match(
    pii_type: &str,
    text: &str,
    idx: &CodepointIndex,
    byte_start: usize,
    byte_end: usize,
    risk: RiskLevel,
    hit_priority: i32,
    detector_id: &str,
    base_confidence: f64,
    features: HitFeatures,
) -> Hit {
    let span = Span::new(idx.to_codepoint(byte_start), idx.to_codepoint(byte_end));
    Hit {
        pii_type: PiiType::from(pii_type),
        span,
        value: text[byte_start..byte_end].to_string(),
        risk,
        priority: hit_priority,
        confidence: Some(base_confidence),
        reasons: vec![format!("pattern_match:{detector_id}")],
        features,
    }
}

macro_rules! simple_detector {
    ($name:ident, $id:literal, $pii_type:expr, $priority:expr, $risk:expr, $find_re:expr, $validate:expr) => {
        pub struct $name;

        #[async_trait]
        impl Detector for $name {
            fn id(&self) -> &'static str {
                $id
            }
            fn pii_type(&self) -> PiiType {
                PiiType::from($pii_type)
            }
            fn priority(&self) -> i32 {
                $priority
            }
            async fn detect(&self, ctx: &DetectorContext<'_>) -> Vec<Hit> {
                let idx = CodepointIndex::new(ctx.text);
                $find_re
                    .find_iter(ctx.text)
                    .filter_map(|m| {
                        let candidate = m.as_str();
                        let outcome = $validate(candidate, ctx.config.validation_strictness);
                        // spec.md §4.F step 4: a rejected candidate is
                        // dropped at every strictness except `fast`,
                        // which keeps it (at a penalized confidence) so
                        // callers who opted into the cheap pass still
                        // see it.
                        if !outcome.valid
                            && ctx.config.validation_strictness != crate::config::ValidationStrictness::Fast
                        {
                            return None;
                        }
                        let valid = outcome.valid;
                        let reason = outcome.reason;
                        // An unvalidated `fast`-mode candidate carries no
                        // validator-asserted confidence; fall back to a
                        // conservative default rather than the
                        // zero-confidence `ValidationOutcome::invalid` stub.
                        let base_confidence = if valid { outcome.base_confidence } else { 0.3 };
                        let mut hit = hit_from_match(
                            $pii_type,
                            ctx.text,
                            &idx,
                            m.start(),
                            m.end(),
                            $risk,
                            $priority,
                            $id,
                            base_confidence,
                            outcome.features,
                        );
                        if !valid {
                            hit.push_reason(format!("validation_failed:{reason}"));
                        }
                        Some(hit)
                    })
                    .collect()
            }
        }
    };
}

simple_detector!(
    EmailDetector,
    "email",
    crate::types::pii_type::EMAIL,
    10,
    RiskLevel::Medium,
    EMAIL_FIND_RE,
    validators::validate_email
);
simple_detector!(
    CreditCardDetector,
    "credit_card",
    crate::types::pii_type::CREDIT_CARD,
    5,
    RiskLevel::High,
    CREDIT_CARD_FIND_RE,
    validators::validate_credit_card
);
simple_detector!(
    Ipv4Detector,
    "ipv4",
    crate::types::pii_type::IPV4,
    30,
    RiskLevel::Low,
    IPV4_FIND_RE,
    validators::validate_ipv4
);
simple_detector!(
    PhoneE164Detector,
    "phone_e164",
    crate::types::pii_type::PHONE_E164,
    15,
    RiskLevel::Medium,
    PHONE_E164_FIND_RE,
    validators::validate_phone_e164
);
simple_detector!(
    MyNumberJpDetector,
    "mynumber_jp",
    crate::types::pii_type::MYNUMBER_JP,
    6,
    RiskLevel::High,
    MYNUMBER_JP_FIND_RE,
    validators::validate_mynumber_jp
);
simple_detector!(
    JwtDetector,
    "jwt",
    crate::types::pii_type::JWT,
    7,
    RiskLevel::High,
    JWT_FIND_RE,
    validators::validate_jwt
);

/// Opt-in: flags any sufficiently long, sufficiently random-looking
/// token (API keys, session ids, secrets dropped into logs) that none
/// of the typed detectors recognize. Not registered by default —
/// embedding applications that want it add it explicitly via
/// `RegistryConfig`/plugin registration, since it has a much higher
/// false-positive rate than the typed detectors.
pub struct HighEntropyTokenDetector;

fn shannon_entropy(token: &str) -> f64 {
    let len = token.chars().count() as f64;
    if len == 0.0 {
        return 0.0;
    }
    let mut counts = std::collections::HashMap::new();
    for c in token.chars() {
        *counts.entry(c).or_insert(0u32) += 1;
    }
    counts
        .values()
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Minimum bits-per-character to qualify as "high entropy"; random
/// base64/hex tokens land well above this, natural-language words well
/// below it.
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

#[async_trait]
impl Detector for HighEntropyTokenDetector {
    fn id(&self) -> &'static str {
        "high_entropy_token"
    }
    fn pii_type(&self) -> PiiType {
        PiiType::from(crate::types::pii_type::HIGH_ENTROPY_TOKEN)
    }
    fn priority(&self) -> i32 {
        50
    }
    async fn detect(&self, ctx: &DetectorContext<'_>) -> Vec<Hit> {
        let idx = CodepointIndex::new(ctx.text);
        HIGH_ENTROPY_FIND_RE
            .find_iter(ctx.text)
            .filter_map(|m| {
                let token = m.as_str();
                if token.len() > validators::MAX_CANDIDATE_LEN {
                    return None;
                }
                let entropy = shannon_entropy(token);
                let bits_per_char = entropy;
                if bits_per_char < MIN_ENTROPY_BITS_PER_CHAR {
                    return None;
                }
                let mut features = HitFeatures::default();
                features.extra.insert(
                    "entropy_bits_per_char".into(),
                    serde_json::json!(bits_per_char),
                );
                Some(hit_from_match(
                    crate::types::pii_type::HIGH_ENTROPY_TOKEN,
                    ctx.text,
                    &idx,
                    m.start(),
                    m.end(),
                    RiskLevel::Medium,
                    50,
                    "high_entropy_token",
                    0.6,
                    features,
                ))
            })
            .collect()
    }
}

/// Returns every built-in detector except the opt-in
/// `HighEntropyTokenDetector`.
pub fn default_detectors() -> Vec<std::sync::Arc<dyn Detector>> {
    use std::sync::Arc;
    vec![
        Arc::new(EmailDetector),
        Arc::new(CreditCardDetector),
        Arc::new(Ipv4Detector),
        Arc::new(PhoneE164Detector),
        Arc::new(MyNumberJpDetector),
        Arc::new(JwtDetector),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;

    fn ctx(text: &str, config: &RegistryConfig) -> DetectorContext<'_> {
        DetectorContext { text, config }
    }

    #[tokio::test]
    async fn email_detector_finds_match() {
        let config = RegistryConfig::default();
        let hits = EmailDetector.detect(&ctx("reach alice@example.com today", &config)).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, "alice@example.com");
    }

    #[tokio::test]
    async fn credit_card_detector_validates_luhn() {
        let config = RegistryConfig::default();
        let hits = CreditCardDetector
            .detect(&ctx("card 4242424242424241 is invalid", &config))
            .await;
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn fast_strictness_keeps_failed_luhn_candidate() {
        let mut config = RegistryConfig::default();
        config.validation_strictness = crate::config::ValidationStrictness::Fast;
        let hits = CreditCardDetector
            .detect(&ctx("card 4242424242424241 is invalid", &config))
            .await;
        assert_eq!(hits.len(), 1);
        assert!(hits[0].reasons.iter().any(|r| r.starts_with("validation_failed:")));
    }

    #[tokio::test]
    async fn ipv4_detector_finds_match() {
        let config = RegistryConfig::default();
        let hits = Ipv4Detector.detect(&ctx("server at 203.0.113.5 responded", &config)).await;
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn high_entropy_detector_flags_random_token() {
        let config = RegistryConfig::default();
        let hits = HighEntropyTokenDetector
            .detect(&ctx("key=aB3cD4eF5gH6iJ7kL8mN9oP0qRsTuVwXyZ1234", &config))
            .await;
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn high_entropy_detector_ignores_low_entropy_word() {
        let config = RegistryConfig::default();
        let hits = HighEntropyTokenDetector
            .detect(&ctx("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", &config))
            .await;
        assert!(hits.is_empty());
    }
}
