//! Detector runtime: the `Detector` trait, built-in pattern detectors,
//! and the dispatcher that runs them in priority order with a shared
//! push budget and cooperative cancellation.
//!
//! The trait shape mirrors the teacher's `providers::adapter_trait`
//! (`#[async_trait]` + a single dispatch method per implementor); here
//! the seam is a PII pattern instead of an LLM provider.

pub mod patterns;
pub mod runtime;

pub use runtime::{DetectorContext, DetectorRuntime};

use async_trait::async_trait;

use crate::types::{Hit, PiiType};

/// A single PII pattern. Implementations should be cheap to construct
/// (built-ins are zero-sized) and must not block; any IO or heavy
/// computation belongs in an embedding application's own plugin, not
/// in `detect` itself.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Stable identifier, used in `Hit::reasons` and plugin registration
    /// conflict detection.
    fn id(&self) -> &'static str;
    fn pii_type(&self) -> PiiType;
    /// Lower runs earlier; only affects iteration order, not output
    /// (the registry sorts all hits by span afterward).
    fn priority(&self) -> i32;
    async fn detect(&self, ctx: &DetectorContext<'_>) -> Vec<Hit>;
}
