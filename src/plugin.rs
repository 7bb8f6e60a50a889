//! Plugin contract: a bundle of detectors and masker overrides an
//! embedding application registers with a [`crate::registry::Registry`]
//! in one call.
//!
//! Mirrors the teacher's `providers::adapter_trait` registration style
//! (one trait object per integration, dispatched by id), generalized
//! from "one LLM provider" to "one PII extension."

use std::sync::Arc;

use crate::detectors::Detector;
use crate::redaction::Masker;
use crate::types::PiiType;

/// An extension bundle. Detector ids and masker type keys collide
/// last-registration-wins — registering a plugin with the same
/// detector id as a previously registered one replaces it, and the
/// registry records a `plugin.registration_conflict` metric when that
/// happens (spec.md §4.I).
pub trait Plugin: Send + Sync {
    fn id(&self) -> &'static str;

    fn detectors(&self) -> Vec<Arc<dyn Detector>> {
        Vec::new()
    }

    fn maskers(&self) -> Vec<(PiiType, Arc<dyn Masker>)> {
        Vec::new()
    }
}
