//! Two-stage confidence scoring: a cheap base score derived from the
//! validator's own judgment (stage 1, always on), and an optional
//! contextual rule engine that adjusts it using the surrounding
//! document's structure and markers (stage 2, opt-in via
//! `enable_contextual_confidence`).
//!
//! Grounded in the teacher's `privacy::redaction` module, which only
//! ever produced a fixed per-type confidence; the rule engine here is
//! new, modeled as declarative data (a `const` table of rules) rather
//! than a chain of `if` statements, per the design note in spec.md §9
//! favoring data-driven dispatch over class hierarchies.

mod rules;

pub use rules::{ContextualRuleEngine, RuleCategory, CONTEXTUAL_RULES};

use crate::config::RegistryConfig;
use crate::context::ContextFeatures;
use crate::metrics::MetricsSink;
use crate::types::Hit;

/// Clamps the validator-reported base confidence into `[0, 1]` and
/// records which stage produced the final number.
pub fn base_score(validator_confidence: f64, hit: &mut Hit) {
    let clamped = validator_confidence.clamp(0.0, 1.0);
    hit.confidence = Some(clamped);
    hit.push_reason("base_confidence");
}

/// Runs the contextual rule engine over `hit` if contextual scoring is
/// enabled in `config`, using `features` sampled from the hit's own
/// location in the source text. No-op (besides stage-1 base score)
/// otherwise.
pub fn apply_contextual(
    config: &RegistryConfig,
    features: &ContextFeatures,
    hit: &mut Hit,
    metrics: &dyn MetricsSink,
) {
    if !config.enable_contextual_confidence {
        return;
    }
    let engine = ContextualRuleEngine::new(
        config.contextual_suppression_enabled,
        config.contextual_boost_enabled,
    );
    engine.apply(features, hit, metrics);
}
