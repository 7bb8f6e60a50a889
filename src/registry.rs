//! The `Registry`: the crate's one stateful entry point. Owns a
//! detector set, masker overrides, resolved configuration, and a
//! metrics sink; exposes `detect`, `redact_text`, `detect_json`, and
//! `redact_json`.
//!
//! `set_policy` and `use_plugin` both return a new `Registry` rather
//! than mutating in place (spec.md Open Question, resolved in
//! DESIGN.md): a `Registry` handed to concurrent callers never changes
//! under them mid-flight.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::allow_deny::{self, FilterDecision};
use crate::config::RegistryConfig;
use crate::context;
use crate::detectors::patterns::default_detectors;
use crate::detectors::{Detector, DetectorRuntime};
use crate::error::{Error, Result};
use crate::json_detector;
use crate::metrics::{self, MetricsSink, NoopMetricsSink};
use crate::plugin::Plugin;
use crate::redaction::{self, Masker};
use crate::types::{CancelSignal, DetectionResult, Hit, NeverCancel, PiiType};

pub struct Registry {
    config: RegistryConfig,
    detectors: HashMap<&'static str, Arc<dyn Detector>>,
    masker_overrides: HashMap<PiiType, Arc<dyn Masker>>,
    metrics: Arc<dyn MetricsSink>,
}

impl Registry {
    /// Builds a registry with the built-in detector set (everything
    /// except the opt-in high-entropy-token detector) and no masker
    /// overrides. Validates `config` (spec.md §4.G).
    pub fn new(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        let detectors = default_detectors()
            .into_iter()
            .map(|d| (d.id(), d))
            .collect();
        Ok(Self {
            config,
            detectors,
            masker_overrides: HashMap::new(),
            metrics: Arc::new(NoopMetricsSink),
        })
    }

    /// Attaches a metrics sink; returns a new registry (same
    /// copy-on-write discipline as `set_policy`).
    pub fn with_metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = sink;
        self
    }

    /// Registers a plugin's detectors and masker overrides. Detector id
    /// collisions (including with a built-in) are last-registration-
    /// wins; each collision is recorded via
    /// `metrics::names::PLUGIN_REGISTRATION_CONFLICT`.
    pub fn use_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        for detector in plugin.detectors() {
            if self.detectors.contains_key(detector.id()) {
                warn!(plugin = plugin.id(), detector = detector.id(), "detector id collision, last registration wins");
                self.metrics.record(
                    metrics::names::PLUGIN_REGISTRATION_CONFLICT,
                    1.0,
                    None,
                );
            }
            self.detectors.insert(detector.id(), detector);
        }
        for (pii_type, masker) in plugin.maskers() {
            self.masker_overrides.insert(pii_type, masker);
        }
        self
    }

    /// Returns a new registry with `config` in place of the current
    /// one. Detectors and masker overrides carry over unchanged.
    pub fn set_policy(&self, config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            detectors: self.detectors.clone(),
            masker_overrides: self.masker_overrides.clone(),
            metrics: self.metrics.clone(),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn metrics_sink(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }

    fn runtime(&self) -> DetectorRuntime {
        DetectorRuntime::new(self.detectors.values().cloned().collect())
    }

    fn check_input_size(&self, text: &str) -> Result<()> {
        if text.len() > self.config.max_input_bytes {
            return Err(Error::InputTooLarge {
                limit: self.config.max_input_bytes,
                actual: text.len(),
            });
        }
        Ok(())
    }

    /// Runs detection over `text` using a no-op cancellation signal.
    pub async fn detect(&self, text: &str) -> Result<DetectionResult> {
        self.detect_cancellable(text, &NeverCancel).await
    }

    pub async fn detect_cancellable(
        &self,
        text: &str,
        cancel: &dyn CancelSignal,
    ) -> Result<DetectionResult> {
        self.check_input_size(text)?;
        let started = std::time::Instant::now();
        let runtime = self.runtime();
        let raw_hits = runtime.run(text, &self.config, cancel).await;
        let hits = self.score_filter_and_resolve(text, raw_hits);
        self.metrics.record(metrics::names::HITS_DETECTED, hits.len() as f64, None);
        self.metrics
            .record(metrics::names::DETECT_DURATION_MS, started.elapsed().as_secs_f64() * 1000.0, None);
        Ok(DetectionResult {
            src: text.to_string(),
            hits,
        })
    }

    /// Runs detection over a parsed JSON document's string leaves.
    /// Returns an error reason via `Error::InputInvalid` only for
    /// malformed top-level input; per-leaf detection failures never
    /// abort the call.
    pub async fn detect_json(&self, text: &str) -> Result<DetectionResult> {
        self.check_input_size(text)?;
        let started = std::time::Instant::now();
        let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            self.metrics.record(metrics::names::JSON_PARSE_FAILED, 1.0, None);
            Error::InputInvalid(format!("invalid JSON: {e}"))
        })?;
        let runtime = self.runtime();
        let raw_hits = json_detector::detect_json(&value, &runtime, &self.config, &NeverCancel).await;
        let hits = self.score_filter_and_resolve(text, raw_hits);
        self.metrics.record(metrics::names::HITS_DETECTED, hits.len() as f64, None);
        self.metrics
            .record(metrics::names::DETECT_DURATION_MS, started.elapsed().as_secs_f64() * 1000.0, None);
        Ok(DetectionResult {
            src: text.to_string(),
            hits,
        })
    }

    /// Runs `detect`, then rewrites `text` with each surviving hit's
    /// masker output.
    pub async fn redact_text(&self, text: &str) -> Result<(String, DetectionResult)> {
        let result = self.detect(text).await?;
        let redacted = redaction::redact_text(text, &result.hits, &self.config, &self.masker_overrides)?;
        Ok((redacted, result))
    }

    /// Runs `detect_json` on each leaf, then rewrites those same leaf
    /// values in place (the surrounding JSON structure is untouched).
    pub async fn redact_json(&self, text: &str) -> Result<(String, DetectionResult)> {
        let mut value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| Error::InputInvalid(format!("invalid JSON: {e}")))?;
        let result = self.detect_json(text).await?;

        let mut by_path: HashMap<String, Vec<&Hit>> = HashMap::new();
        for hit in &result.hits {
            if let Some(path) = &hit.features.json_path {
                by_path.entry(path.clone()).or_default().push(hit);
            }
        }
        for (path, leaf_hits) in &by_path {
            if let Some(leaf_value) = lookup_json_path_mut(&mut value, path) {
                if let serde_json::Value::String(s) = leaf_value {
                    let local_hits: Vec<Hit> = leaf_hits
                        .iter()
                        .map(|h| {
                            let mut clone = (*h).clone();
                            clone.span = crate::types::Span::new(0, s.chars().count());
                            clone
                        })
                        .collect();
                    // Each JSON leaf is redacted as a whole value rather
                    // than a character span within it: a structured
                    // field (an email, a phone number) reads best
                    // replaced wholesale rather than partially masked.
                    if !local_hits.is_empty() {
                        let masked = redaction::redact_text(s, &[local_hits[0].clone()], &self.config, &self.masker_overrides)?;
                        *s = masked;
                    }
                }
            }
        }
        Ok((value.to_string(), result))
    }

    fn score_filter_and_resolve(&self, text: &str, mut hits: Vec<Hit>) -> Vec<Hit> {
        for hit in &mut hits {
            if self.config.enable_confidence_scoring {
                let base = hit.confidence.unwrap_or(0.5);
                crate::scoring::base_score(base, hit);
            }
            if self.config.enable_contextual_confidence {
                let byte_pos = text
                    .char_indices()
                    .nth(hit.span.start)
                    .map(|(b, _)| b)
                    .unwrap_or(text.len());
                let features = context::analyze(text, byte_pos);
                crate::scoring::apply_contextual(&self.config, &features, hit, self.metrics.as_ref());
            }
        }

        let threshold = self.config.effective_threshold();
        let mut survivors: Vec<Hit> = hits
            .into_iter()
            .filter(|h| !self.config.enable_confidence_scoring || h.confidence.unwrap_or(0.0) >= threshold)
            .filter(|h| allow_deny::decide(&self.config, h) == FilterDecision::Keep)
            .collect();

        resolve_overlaps(&mut survivors);
        survivors
    }
}

/// Looks up a `$.a.b.[0].c`-style path produced by [`json_detector`]
/// inside an already-parsed document.
fn lookup_json_path_mut<'a>(value: &'a mut serde_json::Value, path: &str) -> Option<&'a mut serde_json::Value> {
    let mut current = value;
    for segment in path.split('.').skip(1) {
        if let Some(idx_str) = segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            let idx: usize = idx_str.parse().ok()?;
            current = current.get_mut(idx)?;
        } else {
            current = current.get_mut(segment)?;
        }
    }
    Some(current)
}

/// Deterministically resolves overlapping hits: sorts candidates by
/// ascending `priority` (lower wins), then ascending `span.start`, then
/// descending span length (the longer match wins a tie at the same
/// start), then `pii_type` lexicographic order as the final tiebreak for
/// identical `(priority, start, end)` triples (the Open Question
/// resolution recorded in DESIGN.md), then greedily keeps a hit only if
/// it does not overlap an already-kept one. Final output is sorted by
/// `span.start`.
fn resolve_overlaps(hits: &mut Vec<Hit>) {
    let mut candidates: Vec<Hit> = std::mem::take(hits);
    candidates.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.span.start.cmp(&b.span.start))
            .then_with(|| b.span.len().cmp(&a.span.len()))
            .then_with(|| a.pii_type.cmp(&b.pii_type))
    });

    let mut kept: Vec<Hit> = Vec::new();
    for candidate in candidates {
        if kept.iter().any(|k| k.overlaps(&candidate)) {
            continue;
        }
        kept.push(candidate);
    }
    kept.sort_by_key(|h| h.span.start);
    *hits = kept;
}
