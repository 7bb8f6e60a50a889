use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ValidationStrictness;
use crate::types::HitFeatures;

use super::reject_shared_edge_cases;
use super::ValidationOutcome;

/// Deliberately loose on the local part (RFC 5321 is a minefield of
/// edge cases real mail doesn't use); strict on the domain, which is
/// where garbage matches come from.
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@([a-z0-9]([a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}$")
        .expect("static regex")
});

/// Two-letter/common gTLD allow-list used to reject domain-shaped
/// garbage (`user@localhost`, `user@internal`) that the regex alone
/// would accept.
const KNOWN_TLDS: &[&str] = &[
    "com", "org", "net", "edu", "gov", "mil", "io", "co", "info", "biz", "dev", "app", "ai", "jp",
    "uk", "us", "de", "fr", "cn", "ca", "au", "nl", "br", "in", "eu", "me", "tv", "xyz", "online",
];

/// Domains conventionally reserved for documentation/testing (RFC 2606),
/// plus a handful this crate's own examples and tests use.
const TEST_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "test.com",
    "localhost",
];

pub fn validate_email(candidate: &str, strictness: ValidationStrictness) -> ValidationOutcome {
    if let Some(out) = reject_shared_edge_cases(candidate) {
        return out;
    }

    if !EMAIL_RE.is_match(candidate) {
        return ValidationOutcome::invalid("malformed_email");
    }

    let domain = match candidate.rsplit_once('@') {
        Some((_, d)) => d,
        None => return ValidationOutcome::invalid("malformed_email"),
    };
    let tld = domain.rsplit('.').next().unwrap_or("").to_lowercase();

    if matches!(strictness, ValidationStrictness::Strict) && !KNOWN_TLDS.contains(&tld.as_str()) {
        return ValidationOutcome::invalid("unknown_tld");
    }

    let is_test_domain = TEST_DOMAINS.iter().any(|d| domain.eq_ignore_ascii_case(d));
    let mut features = HitFeatures {
        normalized: Some(candidate.to_lowercase()),
        ..Default::default()
    };
    if is_test_domain {
        features
            .extra
            .insert("test_domain".into(), serde_json::Value::Bool(true));
    }

    // A known test-domain address is still structurally a real email and
    // must clear the default confidence threshold on its own; it's the
    // environment-aware allow/deny layer, not this validator, that
    // decides whether to drop it in non-production environments.
    let base_confidence = if is_test_domain { 0.75 } else { 0.85 };
    ValidationOutcome::ok(base_confidence, features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_address() {
        let out = validate_email("alice@example.com", ValidationStrictness::Balanced);
        assert!(out.valid);
    }

    #[test]
    fn rejects_missing_at() {
        assert!(!validate_email("alice.example.com", ValidationStrictness::Balanced).valid);
    }

    #[test]
    fn rejects_missing_tld() {
        assert!(!validate_email("alice@localhost", ValidationStrictness::Balanced).valid);
    }

    #[test]
    fn strict_rejects_unknown_tld() {
        let out = validate_email("alice@example.qqzz", ValidationStrictness::Strict);
        assert!(!out.valid);
        assert_eq!(out.reason, "unknown_tld");
    }

    #[test]
    fn balanced_accepts_unusual_tld() {
        let out = validate_email("alice@example.qqzz", ValidationStrictness::Balanced);
        assert!(out.valid);
    }

    #[test]
    fn flags_known_test_domain() {
        let out = validate_email("alice@example.com", ValidationStrictness::Balanced);
        assert!(out.features.extra.contains_key("test_domain"));
    }
}
