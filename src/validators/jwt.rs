use crate::codec::base64url_decode;
use crate::config::ValidationStrictness;
use crate::types::HitFeatures;

use super::{reject_shared_edge_cases, ValidationOutcome};

/// Validates a candidate compact-serialization JWT: three dot-separated
/// base64url segments, where the first decodes to JSON containing an
/// `alg` field. Signature segment is checked for base64url validity
/// only — this crate never verifies signatures, it detects tokens.
pub fn validate_jwt(candidate: &str, _strictness: ValidationStrictness) -> ValidationOutcome {
    if let Some(out) = reject_shared_edge_cases(candidate) {
        return out;
    }

    let parts: Vec<&str> = candidate.split('.').collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return ValidationOutcome::invalid("malformed_jwt");
    }

    let header_bytes = match base64url_decode(parts[0]) {
        Ok(b) => b,
        Err(_) => return ValidationOutcome::invalid("bad_header_encoding"),
    };
    let header: serde_json::Value = match serde_json::from_slice(&header_bytes) {
        Ok(v) => v,
        Err(_) => return ValidationOutcome::invalid("bad_header_json"),
    };
    let alg = match header.get("alg").and_then(|v| v.as_str()) {
        Some(a) => a,
        None => return ValidationOutcome::invalid("missing_alg"),
    };

    if base64url_decode(parts[1]).is_err() {
        return ValidationOutcome::invalid("bad_payload_encoding");
    }
    if base64url_decode(parts[2]).is_err() && alg != "none" {
        return ValidationOutcome::invalid("bad_signature_encoding");
    }

    let mut features = HitFeatures::default();
    features
        .extra
        .insert("alg".into(), serde_json::Value::String(alg.to_string()));

    ValidationOutcome::ok(0.8, features)
}
