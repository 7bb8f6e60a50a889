//! Per-type validators. Each validator takes a raw candidate string (the
//! detector's regex match) and decides whether it is structurally
//! plausible PII, independent of surrounding context — context is the
//! scorer's job (see [`crate::scoring`]).
//!
//! Grounded in the teacher's `privacy::redaction` module, which inlined
//! Luhn checking and ad hoc email/phone regexes directly into its
//! detector closures; here each type gets its own validator with a
//! uniform [`ValidationOutcome`] contract, per spec.md §4.C.

mod credit_card;
mod email;
mod ipv4;
mod jwt;
mod mynumber_jp;
mod phone;

pub use credit_card::validate_credit_card;
pub use email::validate_email;
pub use ipv4::validate_ipv4;
pub use jwt::validate_jwt;
pub use mynumber_jp::validate_mynumber_jp;
pub use phone::validate_phone_e164;

use crate::config::ValidationStrictness;
use crate::types::HitFeatures;

/// Maximum candidate length any validator will examine; longer spans are
/// rejected outright with [`ValidationOutcome::invalid`] (spec.md §4.C).
pub const MAX_CANDIDATE_LEN: usize = 1000;

/// Outcome of validating a single candidate string.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub valid: bool,
    /// Short machine-readable reason, always set (e.g. `"luhn_failed"`,
    /// `"ok"`, `"candidate_too_long"`).
    pub reason: &'static str,
    /// Validator-proposed confidence contribution; the scorer may ignore
    /// or combine this with contextual signals.
    pub base_confidence: f64,
    /// Structural features the validator inferred (brand, subtype, the
    /// normalized digits-only form, ...).
    pub features: HitFeatures,
}

impl ValidationOutcome {
    pub fn ok(base_confidence: f64, features: HitFeatures) -> Self {
        Self {
            valid: true,
            reason: "ok",
            base_confidence,
            features,
        }
    }

    pub fn invalid(reason: &'static str) -> Self {
        Self {
            valid: false,
            reason,
            base_confidence: 0.0,
            features: HitFeatures::default(),
        }
    }
}

/// Rejects the shared empty/over-length edge cases spec.md §4.C requires
/// of every validator, before any type-specific parsing.
pub(crate) fn reject_shared_edge_cases(candidate: &str) -> Option<ValidationOutcome> {
    if candidate.trim().is_empty() {
        return Some(ValidationOutcome::invalid("invalid_input"));
    }
    if candidate.len() > MAX_CANDIDATE_LEN {
        return Some(ValidationOutcome::invalid("candidate_too_long"));
    }
    None
}

/// Deny-listed, publicly documented test card numbers (Visa/Mastercard/
/// Amex test ranges from payment processor docs) that are *not* already
/// caught by [`credit_card::has_repeated_or_sequential_pattern`] (a bare
/// run of one repeated digit, like `4111111111111111`, is rejected
/// unconditionally before this list is even consulted). These pass Luhn
/// but are never real PII; `ValidationStrictness::Strict` rejects them
/// outright, `Balanced`/`Fast` accept them with a flag in `extra` so the
/// allow/deny layer and scorer can still special-case them.
pub const KNOWN_TEST_CARD_NUMBERS: &[&str] = &[
    "4242424242424242",
    "4000000000000002",
    "5555555555554444",
    "5105105105105100",
    "378282246310005",
    "371449635398431",
    "6011111111111117",
];

pub(crate) fn strictness_allows_test_values(strictness: ValidationStrictness) -> bool {
    !matches!(strictness, ValidationStrictness::Strict)
}
