//! Custom and built-in allow/deny filtering. Runs after confidence
//! scoring and before the threshold cut, so a deny match can force a
//! hit through even if its confidence would otherwise pass, and an
//! allow match can drop a hit regardless of how confident the scorer
//! was.
//!
//! Grounded in the teacher's `commands_privacy::get_allowlist`-style
//! per-workspace exception lists; generalized here into a per-type
//! pattern table plus the two built-in toggles spec.md §3 names.

use crate::config::{Environment, RegistryConfig};
use crate::types::Hit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Keep,
    Drop(&'static str),
}

/// Env-conventional domains/values treated as "known test data" when
/// `allow_test_patterns` is in effect — this is distinct from (and
/// additive with) a caller's own custom allow-list.
const BUILTIN_TEST_EMAIL_DOMAINS: &[&str] = &[
    "example.com",
    "example.org",
    "example.net",
    "test.com",
];

fn matches_any(value: &str, normalized: Option<&str>, patterns: &std::collections::HashSet<String>) -> bool {
    patterns.iter().any(|p| {
        p.eq_ignore_ascii_case(value) || normalized.is_some_and(|n| p.eq_ignore_ascii_case(n))
    })
}

/// Whether `allow_test_patterns` is in effect: explicit config flag, or
/// implied by running in a non-production environment (spec.md §3:
/// "built-in environment-aware allow-lists").
fn effective_allow_test_patterns(config: &RegistryConfig) -> bool {
    config.allow_deny_config.allow_test_patterns || config.environment != Environment::Production
}

/// Decides whether `hit` survives the allow/deny filter.
pub fn decide(config: &RegistryConfig, hit: &Hit) -> FilterDecision {
    let normalized = hit.features.normalized.as_deref();

    if let Some(deny) = config.allow_deny_config.deny.get(&hit.pii_type) {
        if matches_any(&hit.value, normalized, deny) {
            return FilterDecision::Keep;
        }
    }

    if let Some(allow) = config.allow_deny_config.allow.get(&hit.pii_type) {
        if matches_any(&hit.value, normalized, allow) {
            return FilterDecision::Drop("custom_allow_list");
        }
    }

    // Documentation/unspecified ranges (RFC 5737 TEST-NET-*, 0.0.0.0) can
    // never denote a real address, so they're dropped unconditionally.
    if hit.features.extra.get("documentation_range") == Some(&serde_json::Value::Bool(true)) {
        return FilterDecision::Drop("documentation_ip_range");
    }

    if (config.allow_deny_config.allow_private_ips || config.environment != Environment::Production)
        && hit.features.extra.get("private_or_reserved") == Some(&serde_json::Value::Bool(true))
    {
        return FilterDecision::Drop("private_ip_allowed");
    }

    if effective_allow_test_patterns(config) {
        if hit.features.extra.get("known_test_card") == Some(&serde_json::Value::Bool(true)) {
            return FilterDecision::Drop("builtin_test_pattern");
        }
        if hit.features.extra.get("test_domain") == Some(&serde_json::Value::Bool(true)) {
            return FilterDecision::Drop("builtin_test_pattern");
        }
        if let Some((_, domain)) = hit.value.rsplit_once('@') {
            if BUILTIN_TEST_EMAIL_DOMAINS.iter().any(|d| domain.eq_ignore_ascii_case(d)) {
                return FilterDecision::Drop("builtin_test_pattern");
            }
        }
    }

    FilterDecision::Keep
}
