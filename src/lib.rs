//! PII detection and redaction engine: pattern detectors, validators, a
//! two-stage confidence scorer, an allow/deny filter, and mask/remove/
//! tokenize redaction over plain text, parsed JSON, and line-delimited
//! JSON-RPC streams.
//!
//! `Registry` is the one stateful entry point; everything else in this
//! crate is either a pure function over its input or a trait an
//! embedding application can implement to extend it.

pub mod allow_deny;
pub mod codec;
pub mod config;
pub mod context;
pub mod detectors;
pub mod error;
pub mod json_detector;
pub mod metrics;
pub mod plugin;
pub mod redaction;
pub mod registry;
pub mod scoring;
pub mod stream;
pub mod types;
pub mod validators;

pub use config::{Action, Environment, RegistryConfig, Sensitivity, ValidationStrictness};
pub use error::{Error, Result};
pub use metrics::MetricsSink;
pub use plugin::Plugin;
pub use registry::Registry;
pub use types::{CancelSignal, DetectionResult, Hit, HitFeatures, PiiType, RiskLevel, Span};
