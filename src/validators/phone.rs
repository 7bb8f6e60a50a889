use crate::config::ValidationStrictness;
use crate::types::{HitFeatures, PhoneSubtype};

use super::{reject_shared_edge_cases, ValidationOutcome};

/// Validates a candidate E.164 phone number: leading `+`, country code,
/// 8-15 total digits. Subtype inference is coarse (mobile vs. landline)
/// and only attempted for a handful of country codes where the leading
/// national digit is a reliable signal; everything else is `Unknown`.
pub fn validate_phone_e164(candidate: &str, _strictness: ValidationStrictness) -> ValidationOutcome {
    if let Some(out) = reject_shared_edge_cases(candidate) {
        return out;
    }

    if !candidate.starts_with('+') {
        return ValidationOutcome::invalid("missing_country_code");
    }

    let digits: String = candidate[1..].chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != candidate.len() - 1 {
        return ValidationOutcome::invalid("malformed_phone");
    }
    if !(8..=15).contains(&digits.len()) {
        return ValidationOutcome::invalid("bad_length");
    }
    if digits.starts_with('0') {
        return ValidationOutcome::invalid("leading_zero_after_plus");
    }

    let subtype = infer_subtype(&digits);

    let features = HitFeatures {
        normalized: Some(format!("+{digits}")),
        phone_subtype: Some(subtype),
        ..Default::default()
    };

    ValidationOutcome::ok(0.7, features)
}

fn infer_subtype(digits: &str) -> PhoneSubtype {
    if let Some(rest) = digits.strip_prefix('1') {
        // NANP: can't reliably distinguish mobile/landline from the
        // number alone.
        let _ = rest;
        return PhoneSubtype::Unknown;
    }
    if let Some(rest) = digits.strip_prefix("81") {
        // Japan: mobile numbers are 070/080/090 (leading '0' dropped in
        // E.164), i.e. national significant number starts with 70/80/90.
        return if rest.starts_with('7') || rest.starts_with('8') || rest.starts_with('9') {
            PhoneSubtype::Mobile
        } else {
            PhoneSubtype::Landline
        };
    }
    if let Some(rest) = digits.strip_prefix("44") {
        // UK: mobile numbers start with 7 after the country code.
        return if rest.starts_with('7') {
            PhoneSubtype::Mobile
        } else {
            PhoneSubtype::Landline
        };
    }
    PhoneSubtype::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_e164() {
        let out = validate_phone_e164("+14155552671", ValidationStrictness::Balanced);
        assert!(out.valid);
    }

    #[test]
    fn rejects_missing_plus() {
        assert!(!validate_phone_e164("14155552671", ValidationStrictness::Balanced).valid);
    }

    #[test]
    fn rejects_too_short() {
        assert!(!validate_phone_e164("+123", ValidationStrictness::Balanced).valid);
    }

    #[test]
    fn rejects_leading_zero_after_plus() {
        let out = validate_phone_e164("+014155552671", ValidationStrictness::Balanced);
        assert!(!out.valid);
        assert_eq!(out.reason, "leading_zero_after_plus");
    }

    #[test]
    fn infers_japanese_mobile() {
        let out = validate_phone_e164("+819012345678", ValidationStrictness::Balanced);
        assert_eq!(out.features.phone_subtype, Some(PhoneSubtype::Mobile));
    }

    #[test]
    fn infers_uk_landline() {
        let out = validate_phone_e164("+442071234567", ValidationStrictness::Balanced);
        assert_eq!(out.features.phone_subtype, Some(PhoneSubtype::Landline));
    }
}
