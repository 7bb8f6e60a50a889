//! Registry configuration: the enumerated options from spec.md §3,
//! plus construction-time validation (spec.md §7's `ConfigInvalid`).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::codec::validate_hmac_key;
use crate::error::{Error, Result};
use crate::types::PiiType;

/// Default input size cap: 16 MiB.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 16 * 1024 * 1024;
/// Default pattern-match cap per `detect` call.
pub const DEFAULT_MAX_MATCHES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Mask,
    Remove,
    Tokenize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Development,
    Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStrictness {
    Fast,
    Balanced,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Strict,
    Balanced,
    Relaxed,
}

impl Sensitivity {
    /// Maps a named sensitivity preset to its confidence threshold.
    pub fn threshold(&self) -> f64 {
        match self {
            Sensitivity::Strict => 0.50,
            Sensitivity::Balanced => 0.70,
            Sensitivity::Relaxed => 0.85,
        }
    }
}

/// Per-type rule override (`rules: type -> {action, preserve_last4?}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleOverride {
    pub action: Action,
    #[serde(default)]
    pub preserve_last4: bool,
}

/// `{ allow: type -> set<pattern>, deny: type -> set<pattern> }` plus the
/// two boolean knobs from spec.md §3.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllowDenyConfig {
    #[serde(default)]
    pub allow: HashMap<PiiType, HashSet<String>>,
    #[serde(default)]
    pub deny: HashMap<PiiType, HashSet<String>>,
    #[serde(default)]
    pub allow_private_ips: bool,
    #[serde(default)]
    pub allow_test_patterns: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub default_action: Action,
    #[serde(default)]
    pub rules: HashMap<PiiType, RuleOverride>,
    /// Required whenever any effective action is `tokenize`. Stored as
    /// raw bytes; never logged or serialized back out in debug form.
    #[serde(default, with = "hmac_key_serde")]
    pub hmac_key: Option<Vec<u8>>,
    pub environment: Environment,
    #[serde(default)]
    pub context_hints: HashSet<String>,
    #[serde(default = "default_validation_strictness")]
    pub validation_strictness: ValidationStrictness,
    #[serde(default = "default_sensitivity")]
    pub sensitivity: Sensitivity,
    #[serde(default)]
    pub confidence_threshold: Option<f64>,
    #[serde(default = "default_true")]
    pub enable_confidence_scoring: bool,
    #[serde(default)]
    pub enable_contextual_confidence: bool,
    #[serde(default = "default_true")]
    pub contextual_suppression_enabled: bool,
    #[serde(default = "default_true")]
    pub contextual_boost_enabled: bool,
    #[serde(default)]
    pub enable_json_detection: bool,
    #[serde(default)]
    pub allow_deny_config: AllowDenyConfig,
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: usize,
    #[serde(default = "default_max_matches")]
    pub max_matches_per_call: usize,
}

fn default_validation_strictness() -> ValidationStrictness {
    ValidationStrictness::Balanced
}
fn default_sensitivity() -> Sensitivity {
    Sensitivity::Balanced
}
fn default_true() -> bool {
    true
}
fn default_max_input_bytes() -> usize {
    DEFAULT_MAX_INPUT_BYTES
}
fn default_max_matches() -> usize {
    DEFAULT_MAX_MATCHES
}

mod hmac_key_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(_key: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        // Never round-trip the raw key through serialization.
        s.serialize_none()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let opt: Option<String> = Option::deserialize(d)?;
        Ok(opt.map(|s| s.into_bytes()))
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_action: Action::Mask,
            rules: HashMap::new(),
            hmac_key: None,
            environment: Environment::Production,
            context_hints: HashSet::new(),
            validation_strictness: ValidationStrictness::Balanced,
            sensitivity: Sensitivity::Balanced,
            confidence_threshold: None,
            enable_confidence_scoring: true,
            enable_contextual_confidence: false,
            contextual_suppression_enabled: true,
            contextual_boost_enabled: true,
            enable_json_detection: false,
            allow_deny_config: AllowDenyConfig::default(),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            max_matches_per_call: DEFAULT_MAX_MATCHES,
        }
    }
}

impl RegistryConfig {
    /// Resolves the effective confidence threshold: the explicit override
    /// if set, otherwise the sensitivity preset's threshold.
    pub fn effective_threshold(&self) -> f64 {
        self.confidence_threshold
            .unwrap_or_else(|| self.sensitivity.threshold())
    }

    /// Resolves the effective action for a given PII type.
    pub fn effective_action(&self, pii_type: &PiiType) -> Action {
        self.rules
            .get(pii_type)
            .map(|r| r.action)
            .unwrap_or(self.default_action)
    }

    /// Whether `pii_type` has opted into last-4-preserving masking via an
    /// explicit rule override. Unset (or no rule at all) means no, even
    /// for types that have a specialized preserving masker available.
    pub fn effective_preserve_last4(&self, pii_type: &PiiType) -> bool {
        self.rules.get(pii_type).map(|r| r.preserve_last4).unwrap_or(false)
    }

    /// Validates the configuration, mirroring spec.md §4.G's construction
    /// checks. Called by `Registry::new`.
    pub fn validate(&self) -> Result<()> {
        let any_tokenize = self.default_action == Action::Tokenize
            || self.rules.values().any(|r| r.action == Action::Tokenize);

        match &self.hmac_key {
            Some(key) if any_tokenize => validate_hmac_key(key)?,
            Some(key) => validate_hmac_key(key)?,
            None if any_tokenize => {
                return Err(Error::ConfigInvalid(
                    "hmac_key is required whenever any effective action is tokenize".into(),
                ));
            }
            None => {}
        }

        for hint in &self.context_hints {
            if hint.trim().is_empty() {
                return Err(Error::ConfigInvalid(
                    "context_hints entries must be non-empty strings".into(),
                ));
            }
        }

        if let Some(threshold) = self.confidence_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(Error::ConfigInvalid(format!(
                    "confidence_threshold must be in [0, 1], got {threshold}"
                )));
            }
        }

        if self.max_input_bytes == 0 {
            return Err(Error::ConfigInvalid("max_input_bytes must be > 0".into()));
        }

        Ok(())
    }

    /// Loads a `RegistryConfig` from a TOML document. Ambient convenience
    /// for embedding applications that keep policy in a file; performs no
    /// environment-variable defaulting of its own (spec.md §6: "no
    /// environment-variable fallbacks in the core").
    pub fn from_toml(src: &str) -> Result<Self> {
        toml::from_str(src).map_err(|e| Error::ConfigInvalid(format!("invalid TOML config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(RegistryConfig::default().validate().is_ok());
    }

    #[test]
    fn tokenize_without_key_is_invalid() {
        let mut cfg = RegistryConfig::default();
        cfg.default_action = Action::Tokenize;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn short_hmac_key_is_invalid() {
        let mut cfg = RegistryConfig::default();
        cfg.default_action = Action::Tokenize;
        cfg.hmac_key = Some(b"short".to_vec());
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn long_hmac_key_is_valid_for_tokenize() {
        let mut cfg = RegistryConfig::default();
        cfg.default_action = Action::Tokenize;
        cfg.hmac_key = Some(b"thisisalongersecretkey123456789012".to_vec());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn sensitivity_thresholds_match_spec() {
        assert_eq!(Sensitivity::Strict.threshold(), 0.50);
        assert_eq!(Sensitivity::Balanced.threshold(), 0.70);
        assert_eq!(Sensitivity::Relaxed.threshold(), 0.85);
    }
}
