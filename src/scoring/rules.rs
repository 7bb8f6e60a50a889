//! The contextual confidence rule catalog and its deterministic
//! conflict-resolution engine.
//!
//! Each rule carries a `(priority, multiplier, offset, category, kind)`
//! tuple plus a predicate over the sampled [`ContextFeatures`]. Rules are
//! grouped by [`RuleCategory`] — spec.md §4.D's `format-specific >
//! locale-specific > marker-based > structural` ordering — and at most
//! one rule PER CATEGORY is applied: the highest-priority match within
//! that category, ties broken first by suppression-over-boost and
//! multiplier strength, then by rule id in lexicographic order so the
//! outcome never depends on table declaration order. Unlike categories,
//! winners ACROSS categories all apply: their multipliers compound and
//! their offsets sum.

use crate::context::ContextFeatures;
use crate::metrics::{names, MetricsSink};
use crate::types::Hit;

/// The four confidence-adjustment families from spec.md §4.D, in
/// descending precedence. Precedence only matters when the engine needs
/// a human-readable ordering (diagnostics); conflict resolution itself
/// is scoped per category, not across them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleCategory {
    FormatSpecific,
    LocaleSpecific,
    MarkerBased,
    Structural,
}

/// Whether a rule's multiplier pulls confidence down or up; used only to
/// gate a rule behind `contextual_suppression_enabled` /
/// `contextual_boost_enabled` without needing a second category axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Suppress,
    Boost,
}

pub struct ContextualRule {
    pub id: &'static str,
    pub priority: u32,
    pub multiplier: f64,
    pub offset: f64,
    pub category: RuleCategory,
    pub kind: RuleKind,
    pub predicate: fn(&ContextFeatures) -> bool,
}

fn example_marker_strong(f: &ContextFeatures) -> bool {
    f.markers.example_nearby && f.markers.distance_to_nearest_marker >= 0 && f.markers.distance_to_nearest_marker <= 16
}
fn example_marker_weak(f: &ContextFeatures) -> bool {
    f.markers.example_nearby && f.markers.distance_to_nearest_marker > 16
}
fn placeholder_marker(f: &ContextFeatures) -> bool {
    f.markers.placeholder_nearby
}
fn dummy_marker(f: &ContextFeatures) -> bool {
    f.markers.dummy_nearby
}
fn test_marker(f: &ContextFeatures) -> bool {
    f.markers.test_nearby
}
fn sample_marker(f: &ContextFeatures) -> bool {
    f.markers.sample_nearby
}
fn template_section(f: &ContextFeatures) -> bool {
    f.structure.template_section
}
fn code_block(f: &ContextFeatures) -> bool {
    f.structure.code_block
}
fn header_row(f: &ContextFeatures) -> bool {
    f.structure.header_row
}
fn repetition(f: &ContextFeatures) -> bool {
    f.repetition_detected
}
fn high_entropy_boost(f: &ContextFeatures) -> bool {
    f.high_entropy_nearby
}
fn log_like_boost(f: &ContextFeatures) -> bool {
    f.structure.log_like
}
fn json_like_boost(f: &ContextFeatures) -> bool {
    f.structure.json_like
}

/// The rule catalog, ordered by declaration only for readability — the
/// engine never relies on this order. Priority and multiplier values
/// are load-bearing: highest priority wins a same-category conflict,
/// and every category's winning multiplier is applied to the hit's
/// confidence.
///
/// `LocaleSpecific` currently has no entries: nothing in the catalog
/// yet keys off `MarkerFeatures::marker_language` on its own (language
/// is already folded into the marker-based rules above). The category
/// stays in the enum so a locale rule can be added without widening the
/// conflict-resolution engine.
pub const CONTEXTUAL_RULES: &[ContextualRule] = &[
    ContextualRule {
        id: "example-marker-strong",
        priority: 100,
        multiplier: 0.4,
        offset: 0.0,
        category: RuleCategory::MarkerBased,
        kind: RuleKind::Suppress,
        predicate: example_marker_strong,
    },
    ContextualRule {
        id: "example-marker-weak",
        priority: 40,
        multiplier: 0.75,
        offset: 0.0,
        category: RuleCategory::MarkerBased,
        kind: RuleKind::Suppress,
        predicate: example_marker_weak,
    },
    ContextualRule {
        id: "placeholder-marker",
        priority: 96,
        multiplier: 0.3,
        offset: 0.0,
        category: RuleCategory::MarkerBased,
        kind: RuleKind::Suppress,
        predicate: placeholder_marker,
    },
    ContextualRule {
        id: "dummy-marker",
        priority: 92,
        multiplier: 0.45,
        offset: 0.0,
        category: RuleCategory::MarkerBased,
        kind: RuleKind::Suppress,
        predicate: dummy_marker,
    },
    ContextualRule {
        id: "test-marker",
        priority: 90,
        multiplier: 0.5,
        offset: 0.0,
        category: RuleCategory::MarkerBased,
        kind: RuleKind::Suppress,
        predicate: test_marker,
    },
    ContextualRule {
        id: "sample-marker",
        priority: 88,
        multiplier: 0.55,
        offset: 0.0,
        category: RuleCategory::MarkerBased,
        kind: RuleKind::Suppress,
        predicate: sample_marker,
    },
    ContextualRule {
        id: "template-section",
        priority: 85,
        multiplier: 0.6,
        offset: 0.0,
        category: RuleCategory::FormatSpecific,
        kind: RuleKind::Suppress,
        predicate: template_section,
    },
    ContextualRule {
        id: "code-block",
        priority: 80,
        multiplier: 0.7,
        offset: 0.0,
        category: RuleCategory::FormatSpecific,
        kind: RuleKind::Suppress,
        predicate: code_block,
    },
    ContextualRule {
        id: "format-json",
        priority: 72,
        multiplier: 0.3,
        offset: 0.0,
        category: RuleCategory::FormatSpecific,
        kind: RuleKind::Suppress,
        predicate: json_like_boost,
    },
    ContextualRule {
        id: "json-format-boost",
        priority: 70,
        multiplier: 1.1,
        offset: 0.0,
        category: RuleCategory::FormatSpecific,
        kind: RuleKind::Boost,
        predicate: json_like_boost,
    },
    ContextualRule {
        id: "header-row",
        priority: 60,
        multiplier: 0.75,
        offset: 0.0,
        category: RuleCategory::FormatSpecific,
        kind: RuleKind::Suppress,
        predicate: header_row,
    },
    ContextualRule {
        id: "log-like-boost",
        priority: 65,
        multiplier: 1.15,
        offset: 0.0,
        category: RuleCategory::FormatSpecific,
        kind: RuleKind::Boost,
        predicate: log_like_boost,
    },
    ContextualRule {
        id: "repetition-detected",
        priority: 55,
        multiplier: 0.65,
        offset: 0.0,
        category: RuleCategory::Structural,
        kind: RuleKind::Suppress,
        predicate: repetition,
    },
    ContextualRule {
        id: "high-entropy-boost",
        priority: 50,
        multiplier: 1.2,
        offset: 0.0,
        category: RuleCategory::Structural,
        kind: RuleKind::Boost,
        predicate: high_entropy_boost,
    },
];

/// True if `a` should be preferred over `b` under spec.md §4.D's
/// tiebreakers when both match at the same priority: suppression beats
/// boost outright, then the stronger adjustment (lower multiplier for
/// suppression, higher for boost) wins.
fn is_stronger(a: &ContextualRule, b: &ContextualRule) -> bool {
    match (a.kind, b.kind) {
        (RuleKind::Suppress, RuleKind::Boost) => true,
        (RuleKind::Boost, RuleKind::Suppress) => false,
        (RuleKind::Suppress, RuleKind::Suppress) => a.multiplier < b.multiplier,
        (RuleKind::Boost, RuleKind::Boost) => a.multiplier > b.multiplier,
    }
}

/// Picks the winning rule among `matches` (already filtered to a single
/// category and to kinds the caller has enabled): highest `priority`;
/// ties broken by [`is_stronger`]; remaining ties broken by `id`
/// ascending so the result is stable regardless of catalog declaration
/// order.
fn pick_winner<'a>(
    matches: impl Iterator<Item = &'a ContextualRule>,
) -> Option<&'a ContextualRule> {
    matches.fold(None, |best, candidate| match best {
        None => Some(candidate),
        Some(current) => {
            let better = match candidate.priority.cmp(&current.priority) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Less => false,
                std::cmp::Ordering::Equal => {
                    if is_stronger(candidate, current) {
                        true
                    } else if is_stronger(current, candidate) {
                        false
                    } else {
                        candidate.id < current.id
                    }
                }
            };
            if better {
                Some(candidate)
            } else {
                Some(current)
            }
        }
    })
}

const CATEGORIES: [RuleCategory; 4] = [
    RuleCategory::FormatSpecific,
    RuleCategory::LocaleSpecific,
    RuleCategory::MarkerBased,
    RuleCategory::Structural,
];

pub struct ContextualRuleEngine {
    suppression_enabled: bool,
    boost_enabled: bool,
}

impl ContextualRuleEngine {
    pub fn new(suppression_enabled: bool, boost_enabled: bool) -> Self {
        Self {
            suppression_enabled,
            boost_enabled,
        }
    }

    fn kind_enabled(&self, kind: RuleKind) -> bool {
        match kind {
            RuleKind::Suppress => self.suppression_enabled,
            RuleKind::Boost => self.boost_enabled,
        }
    }

    /// Evaluates the full catalog against `features`, picks at most one
    /// winning rule per [`RuleCategory`] (up to four total), and applies
    /// every winner's multiplier and offset to `hit.confidence` as
    /// `new = base * Π(multiplier) + Σ(offset)`. The result is clamped to
    /// `[max(0.01, base * 0.5), 0.98]` — contextual rules can cut
    /// confidence in half at most, or raise it to just under certainty,
    /// but never erase it entirely or saturate it to 1.0.
    ///
    /// Records a reason tag per applied rule, plus
    /// `contextual.rules_evaluated`, `contextual.rules_applied`, and a
    /// per-rule-id `contextual.rule_hits` through `metrics` (spec.md §6).
    pub fn apply(&self, features: &ContextFeatures, hit: &mut Hit, metrics: &dyn MetricsSink) {
        let base = hit.confidence.unwrap_or(0.0);
        let mut confidence = base;
        metrics.record(names::CONTEXTUAL_RULES_EVALUATED, CONTEXTUAL_RULES.len() as f64, None);
        let mut applied = 0u32;

        for category in CATEGORIES {
            let matches = CONTEXTUAL_RULES.iter().filter(|r| {
                r.category == category && self.kind_enabled(r.kind) && (r.predicate)(features)
            });
            if let Some(rule) = pick_winner(matches) {
                confidence = confidence * rule.multiplier + rule.offset;
                hit.push_reason(format!("contextual:{}", rule.id));
                applied += 1;
                record_rule_hit(metrics, rule.id);
            }
        }

        if applied > 0 {
            metrics.record(names::CONTEXTUAL_RULES_APPLIED, applied as f64, None);
        }

        let floor = f64::max(0.01, base * 0.5);
        hit.confidence = Some(confidence.clamp(floor, 0.98));
    }
}

fn record_rule_hit(metrics: &dyn MetricsSink, rule_id: &str) {
    let mut labels = crate::metrics::Labels::new();
    labels.insert("rule_id".to_string(), rule_id.to_string());
    metrics.record(names::CONTEXTUAL_RULE_HIT, 1.0, Some(&labels));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HitFeatures, PiiType, RiskLevel, Span};

    fn dummy_hit(confidence: f64) -> Hit {
        Hit {
            pii_type: PiiType::from("email"),
            span: Span::new(0, 5),
            value: "a@b.com".into(),
            risk: RiskLevel::Medium,
            priority: 0,
            confidence: Some(confidence),
            reasons: Vec::new(),
            features: HitFeatures::default(),
        }
    }

    #[test]
    fn example_marker_suppresses_confidence_down_to_the_floor() {
        // base 0.9 * 0.4 = 0.36, which is below the 0.45 floor
        // (max(0.01, 0.9 * 0.5)); the floor wins.
        let text = "example: a@b.com";
        let features = crate::context::analyze(text, text.find("a@b.com").unwrap());
        let mut hit = dummy_hit(0.9);
        ContextualRuleEngine::new(true, true).apply(&features, &mut hit, &crate::metrics::NoopMetricsSink);
        assert!((hit.confidence.unwrap() - 0.45).abs() < 1e-9);
        assert!(hit.reasons.contains(&"contextual:example-marker-strong".to_string()));
    }

    #[test]
    fn high_entropy_boosts_confidence() {
        let text = "token=aB3cD4eF5gH6iJ7kL8mN9oP0qRsTuVwXyZ1234567890abcdef";
        let features = crate::context::analyze(text, 0);
        let mut hit = dummy_hit(0.5);
        ContextualRuleEngine::new(true, true).apply(&features, &mut hit, &crate::metrics::NoopMetricsSink);
        assert!((hit.confidence.unwrap() - 0.6).abs() < 1e-9);
    }

    #[test]
    fn suppression_disabled_leaves_confidence_untouched() {
        let text = "example: a@b.com";
        let features = crate::context::analyze(text, text.find("a@b.com").unwrap());
        let mut hit = dummy_hit(0.9);
        ContextualRuleEngine::new(false, true).apply(&features, &mut hit, &crate::metrics::NoopMetricsSink);
        assert!((hit.confidence.unwrap() - 0.9).abs() < 1e-9);
    }

    #[test]
    fn marker_based_and_format_specific_winners_both_apply() {
        // code-block (format-specific, priority 80) and example-marker-strong
        // (marker-based, priority 100) are in different categories, so both
        // win their category and both multipliers compound: 1.0 * 0.7 * 0.4
        // = 0.28, floored to max(0.01, 1.0 * 0.5) = 0.5.
        let text = "```\nexample: a@b.com\n```";
        let features = crate::context::analyze(text, text.find("a@b.com").unwrap());
        let mut hit = dummy_hit(1.0);
        ContextualRuleEngine::new(true, true).apply(&features, &mut hit, &crate::metrics::NoopMetricsSink);
        assert!((hit.confidence.unwrap() - 0.5).abs() < 1e-9);
        assert!(hit.reasons.contains(&"contextual:example-marker-strong".to_string()));
        assert!(hit.reasons.contains(&"contextual:code-block".to_string()));
    }

    #[test]
    fn format_specific_category_picks_one_winner_among_its_own_rules() {
        // format-json (priority 72, suppress) and json-format-boost
        // (priority 70, boost) are both format-specific and share a
        // predicate; only the higher-priority one (format-json) wins.
        let text = r#"{"user": {"email": "a@b.com"}}"#;
        let features = crate::context::analyze(text, text.find("a@b.com").unwrap());
        let mut hit = dummy_hit(0.8);
        ContextualRuleEngine::new(true, true).apply(&features, &mut hit, &crate::metrics::NoopMetricsSink);
        assert!(hit.reasons.contains(&"contextual:format-json".to_string()));
        assert!(!hit.reasons.contains(&"contextual:json-format-boost".to_string()));
    }
}
