use crate::config::ValidationStrictness;
use crate::types::HitFeatures;

use super::{reject_shared_edge_cases, ValidationOutcome};

/// Computes the check digit for the first 11 digits of a Japanese
/// Individual Number ("My Number"), per the weighting scheme published
/// by the Japanese government's digital agency: digit `i` (1-indexed
/// from the left) is weighted `i + 1` for `i <= 6` and `i - 5` otherwise.
fn check_digit(first_eleven: &[u32; 11]) -> u32 {
    let sum: u32 = first_eleven
        .iter()
        .enumerate()
        .map(|(idx, &digit)| {
            let i = idx as u32 + 1;
            let weight = if i <= 6 { i + 1 } else { i - 5 };
            digit * weight
        })
        .sum();
    let remainder = sum % 11;
    if remainder <= 1 {
        0
    } else {
        11 - remainder
    }
}

/// Validates a candidate Japanese My Number: exactly 12 digits (after
/// stripping conventional hyphen separators), trailing digit matching
/// the computed check digit.
pub fn validate_mynumber_jp(candidate: &str, _strictness: ValidationStrictness) -> ValidationOutcome {
    if let Some(out) = reject_shared_edge_cases(candidate) {
        return out;
    }

    if !candidate.chars().all(|c| c.is_ascii_digit() || c == '-') {
        return ValidationOutcome::invalid("invalid_input");
    }
    let digits: String = candidate.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 12 {
        return ValidationOutcome::invalid("bad_length");
    }

    let mut nums = [0u32; 12];
    for (i, c) in digits.chars().enumerate() {
        nums[i] = c.to_digit(10).expect("already filtered to ascii digits");
    }
    let first_eleven: [u32; 11] = nums[..11].try_into().expect("length checked above");
    let expected = check_digit(&first_eleven);

    if nums[11] != expected {
        return ValidationOutcome::invalid("check_digit_mismatch");
    }

    let features = HitFeatures {
        normalized: Some(digits),
        ..Default::default()
    };
    ValidationOutcome::ok(0.9, features)
}
