use crate::config::ValidationStrictness;
use crate::types::HitFeatures;

use super::{reject_shared_edge_cases, ValidationOutcome};

fn parse_octets(candidate: &str) -> Option<[u8; 4]> {
    let parts: Vec<&str> = candidate.split('.').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut out = [0u8; 4];
    for (i, part) in parts.iter().enumerate() {
        // Reject leading zeros ("01") which are ambiguous between
        // decimal and octal in some parsers.
        if part.len() > 1 && part.starts_with('0') {
            return None;
        }
        out[i] = part.parse().ok()?;
    }
    Some(out)
}

/// Private/loopback/link-local ranges: gated by `allow_private_ips`
/// (or by running in a non-production environment), not reportable
/// unconditionally.
fn is_private_or_reserved(o: &[u8; 4]) -> bool {
    matches!(o[0], 10)
        || (o[0] == 172 && (16..=31).contains(&o[1]))
        || (o[0] == 192 && o[1] == 168)
        || o[0] == 127 // loopback
        || (o[0] == 169 && o[1] == 254) // link-local
        || o[0] >= 224 // multicast/reserved
}

/// Documentation/unspecified ranges (RFC 5737 TEST-NET-1/2/3, and
/// `0.0.0.0`): always allowed, regardless of environment or config —
/// these values can never denote a real address.
fn is_always_allowed_documentation_range(o: &[u8; 4]) -> bool {
    (o[0] == 192 && o[1] == 0 && o[2] == 2) // TEST-NET-1
        || (o[0] == 198 && o[1] == 51 && o[2] == 100) // TEST-NET-2
        || (o[0] == 203 && o[1] == 0 && o[2] == 113) // TEST-NET-3
        || o[0] == 0
}

/// Validates a candidate IPv4 literal: four dot-separated octets, each
/// `0..=255`, no leading zeros. Private/loopback/link-local ranges are
/// flagged in `features.extra` rather than rejected outright — the
/// allow/deny layer (`allow_private_ips`, or a non-production
/// environment) decides whether they're reportable. Documentation/
/// unspecified ranges are flagged separately and are always allowed.
pub fn validate_ipv4(candidate: &str, _strictness: ValidationStrictness) -> ValidationOutcome {
    if let Some(out) = reject_shared_edge_cases(candidate) {
        return out;
    }

    let octets = match parse_octets(candidate) {
        Some(o) => o,
        None => return ValidationOutcome::invalid("malformed_ipv4"),
    };

    let reserved = is_private_or_reserved(&octets);
    let documentation = is_always_allowed_documentation_range(&octets);
    let mut features = HitFeatures {
        normalized: Some(
            octets
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join("."),
        ),
        ..Default::default()
    };
    if reserved {
        features
            .extra
            .insert("private_or_reserved".into(), serde_json::Value::Bool(true));
    }
    if documentation {
        features
            .extra
            .insert("documentation_range".into(), serde_json::Value::Bool(true));
    }

    // A flagged-but-structurally-valid address still needs to clear the
    // default confidence threshold; it's the allow/deny layer that
    // decides per-environment whether it's actually reportable.
    let base_confidence = if reserved || documentation { 0.72 } else { 0.75 };
    ValidationOutcome::ok(base_confidence, features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_public_address() {
        let out = validate_ipv4("8.8.8.8", ValidationStrictness::Balanced);
        assert!(out.valid);
        assert!(!out.features.extra.contains_key("private_or_reserved"));
    }

    #[test]
    fn flags_private_range() {
        let out = validate_ipv4("192.168.1.1", ValidationStrictness::Balanced);
        assert!(out.valid);
        assert!(out.features.extra.contains_key("private_or_reserved"));
    }

    #[test]
    fn rejects_out_of_range_octet() {
        assert!(!validate_ipv4("256.1.1.1", ValidationStrictness::Balanced).valid);
    }

    #[test]
    fn rejects_leading_zero() {
        assert!(!validate_ipv4("192.168.01.1", ValidationStrictness::Balanced).valid);
    }

    #[test]
    fn rejects_too_few_octets() {
        assert!(!validate_ipv4("192.168.1", ValidationStrictness::Balanced).valid);
    }

    #[test]
    fn flags_loopback() {
        let out = validate_ipv4("127.0.0.1", ValidationStrictness::Balanced);
        assert!(out.features.extra.contains_key("private_or_reserved"));
    }

    #[test]
    fn flags_documentation_range_separately() {
        let out = validate_ipv4("192.0.2.1", ValidationStrictness::Balanced);
        assert!(out.valid);
        assert!(out.features.extra.contains_key("documentation_range"));
        assert!(!out.features.extra.contains_key("private_or_reserved"));
    }

    #[test]
    fn flagged_confidence_still_clears_default_threshold() {
        let out = validate_ipv4("192.168.1.1", ValidationStrictness::Balanced);
        assert!(out.base_confidence >= 0.70);
    }
}
