//! The redaction applier: turns a non-overlapping, start-ordered hit
//! list into rewritten text.
//!
//! Grounded in the teacher's `privacy::redaction::PiiRedactor::redact_text`
//! (collect matches, drop overlaps, replace from the end so earlier
//! indices stay valid), generalized from a single bracket-placeholder
//! style into a per-type masker dispatch table with mask/remove/tokenize
//! actions (spec.md §4.F).

use std::collections::HashMap;

use crate::codec::tokenize;
use crate::config::{Action, RegistryConfig};
use crate::error::Result;
use crate::types::{Hit, PiiType};

/// Produces the replacement string for one hit. Implementations must be
/// pure functions of `(hit, config)` — no randomness, no clock reads —
/// so that `tokenize` stays deterministic and `redact_text` stays
/// reproducible in tests.
pub trait Masker: Send + Sync {
    fn mask(&self, hit: &Hit, config: &RegistryConfig) -> Result<String>;
}

/// `[REDACTED:<type>]`, the bracket convention carried over from the
/// teacher's placeholder style, generalized to any PII type.
pub struct GenericMasker;

impl Masker for GenericMasker {
    fn mask(&self, hit: &Hit, _config: &RegistryConfig) -> Result<String> {
        Ok(format!("[REDACTED:{}]", hit.pii_type.as_str()))
    }
}

pub struct RemoveMasker;

impl Masker for RemoveMasker {
    fn mask(&self, _hit: &Hit, _config: &RegistryConfig) -> Result<String> {
        Ok(String::new())
    }
}

pub struct TokenizeMasker;

impl Masker for TokenizeMasker {
    fn mask(&self, hit: &Hit, config: &RegistryConfig) -> Result<String> {
        let key = config
            .hmac_key
            .as_deref()
            .ok_or_else(|| crate::error::Error::TokenizeMissingKey(hit.pii_type.to_string()))?;
        tokenize(key, hit.pii_type.as_str(), &hit.value)
    }
}

/// Credit card masker: preserves the brand-appropriate last 4 digits,
/// masks the rest with asterisks grouped in fours (`**** **** **** 4242`).
pub struct CreditCardMasker;

impl Masker for CreditCardMasker {
    fn mask(&self, hit: &Hit, _config: &RegistryConfig) -> Result<String> {
        let digits = hit
            .features
            .normalized
            .clone()
            .unwrap_or_else(|| hit.value.chars().filter(|c| c.is_ascii_digit()).collect());
        if digits.len() < 4 {
            return Ok(format!("[REDACTED:{}]", PiiType::from(crate::types::pii_type::CREDIT_CARD).as_str()));
        }
        let last4 = &digits[digits.len() - 4..];
        let masked_len = digits.len() - 4;
        let mut groups = Vec::new();
        let mut remaining = masked_len;
        while remaining > 0 {
            let take = remaining.min(4);
            groups.push("*".repeat(take));
            remaining -= take;
        }
        groups.push(last4.to_string());
        Ok(groups.join(" "))
    }
}

/// Phone masker: replaces every digit with `•`, preserving the original
/// separators (spaces, hyphens, parens) and the leading `+` verbatim.
pub struct PhoneMasker;

impl Masker for PhoneMasker {
    fn mask(&self, hit: &Hit, _config: &RegistryConfig) -> Result<String> {
        Ok(hit
            .value
            .chars()
            .map(|c| if c.is_ascii_digit() { '\u{2022}' } else { c })
            .collect())
    }
}

/// My Number masker: emits the fixed literal `•••-••••` regardless of
/// the actual digits — a 12-digit My Number carries no brand/subtype
/// information worth preserving in the output.
pub struct MyNumberJpMasker;

impl Masker for MyNumberJpMasker {
    fn mask(&self, _hit: &Hit, _config: &RegistryConfig) -> Result<String> {
        Ok("\u{2022}\u{2022}\u{2022}-\u{2022}\u{2022}\u{2022}\u{2022}".to_string())
    }
}

/// Resolves the masker to use for `pii_type` given `action`: a plugin's
/// or the embedding application's override takes precedence, then the
/// built-in per-type specialization, then the generic fallback.
///
/// `preserve_last4` gates `CreditCardMasker`: it's an opt-in rule flag,
/// not the default mask behavior for credit cards — absent it, masking
/// falls back to the generic `[REDACTED:credit_card]` form.
pub fn resolve_masker<'a>(
    action: Action,
    pii_type: &PiiType,
    preserve_last4: bool,
    overrides: &'a HashMap<PiiType, std::sync::Arc<dyn Masker>>,
) -> std::sync::Arc<dyn Masker> {
    if let Some(m) = overrides.get(pii_type) {
        return m.clone();
    }
    match action {
        Action::Remove => std::sync::Arc::new(RemoveMasker),
        Action::Tokenize => std::sync::Arc::new(TokenizeMasker),
        Action::Mask => match pii_type.as_str() {
            crate::types::pii_type::CREDIT_CARD if preserve_last4 => std::sync::Arc::new(CreditCardMasker),
            crate::types::pii_type::PHONE_E164 => std::sync::Arc::new(PhoneMasker),
            crate::types::pii_type::MYNUMBER_JP => std::sync::Arc::new(MyNumberJpMasker),
            _ => std::sync::Arc::new(GenericMasker),
        },
    }
}

/// Rewrites `src` by replacing each hit's span with its masker's output,
/// working from the last hit to the first so earlier byte offsets stay
/// valid. `hits` must already be non-overlapping and sorted by
/// `span.start` — the registry guarantees this before calling in.
pub fn redact_text(
    src: &str,
    hits: &[Hit],
    config: &RegistryConfig,
    overrides: &HashMap<PiiType, std::sync::Arc<dyn Masker>>,
) -> Result<String> {
    let byte_offsets: Vec<usize> = src.char_indices().map(|(i, _)| i).chain(std::iter::once(src.len())).collect();

    let mut out = src.to_string();
    for hit in hits.iter().rev() {
        let action = config.effective_action(&hit.pii_type);
        let preserve_last4 = config.effective_preserve_last4(&hit.pii_type);
        let masker = resolve_masker(action, &hit.pii_type, preserve_last4, overrides);
        let replacement = masker.mask(hit, config)?;

        let byte_start = byte_offsets
            .get(hit.span.start)
            .copied()
            .unwrap_or(out.len());
        let byte_end = byte_offsets.get(hit.span.end).copied().unwrap_or(out.len());
        out.replace_range(byte_start..byte_end, &replacement);
    }
    Ok(out)
}
