use std::collections::HashMap;

use pii_core::config::{Action, RuleOverride};
use pii_core::{PiiType, Registry, RegistryConfig};

fn registry(config: RegistryConfig) -> Registry {
    Registry::new(config).expect("valid config")
}

#[tokio::test]
async fn credit_card_is_masked_generically_by_default() {
    let reg = registry(RegistryConfig::default());
    let (redacted, result) = reg
        .redact_text("charge 4242424242424242 to the card on file")
        .await
        .unwrap();

    assert_eq!(result.hits.len(), 1);
    assert_eq!(result.hits[0].pii_type, PiiType::from("credit_card"));
    assert!(redacted.contains("[REDACTED:credit_card]"));
    assert!(!redacted.contains("4242424242424242"));
}

#[tokio::test]
async fn credit_card_preserves_last_four_with_explicit_rule() {
    let mut config = RegistryConfig::default();
    let mut rules = HashMap::new();
    rules.insert(
        PiiType::from("credit_card"),
        RuleOverride {
            action: Action::Mask,
            preserve_last4: true,
        },
    );
    config.rules = rules;
    let reg = registry(config);

    let (redacted, _) = reg
        .redact_text("charge 4242424242424242 to the card on file")
        .await
        .unwrap();
    assert!(redacted.contains("**** **** **** 4242"));
    assert!(!redacted.contains("4242424242424242"));
}

#[tokio::test]
async fn repeated_digit_card_number_is_not_a_hit() {
    let reg = registry(RegistryConfig::default());
    let (redacted, result) = reg
        .redact_text("charge 4111111111111111 to the card on file")
        .await
        .unwrap();
    assert!(result.hits.is_empty());
    assert!(redacted.contains("4111111111111111"));
}

#[tokio::test]
async fn explicit_remove_action_drops_email_entirely() {
    let mut config = RegistryConfig::default();
    let mut rules = HashMap::new();
    rules.insert(
        PiiType::from("email"),
        RuleOverride {
            action: Action::Remove,
            preserve_last4: false,
        },
    );
    config.rules = rules;
    let reg = registry(config);

    let (redacted, _) = reg.redact_text("reach me at alice@example.com").await.unwrap();
    assert!(!redacted.contains("alice@example.com"));
    assert!(!redacted.contains('['));
}

#[tokio::test]
async fn tokenize_action_is_deterministic_across_calls() {
    let mut config = RegistryConfig::default();
    config.default_action = Action::Tokenize;
    config.hmac_key = Some(b"thisisalongersecretkey123456789012".to_vec());
    let reg = registry(config);

    let (first, _) = reg.redact_text("card 4242424242424242").await.unwrap();
    let (second, _) = reg.redact_text("card 4242424242424242").await.unwrap();
    assert_eq!(first, second);
    assert!(first.contains("TKN_CREDIT_CARD_"));
}

#[tokio::test]
async fn known_test_card_is_dropped_in_test_environment() {
    use pii_core::config::Environment;
    let mut config = RegistryConfig::default();
    config.environment = Environment::Test;
    let reg = registry(config);

    let result = reg.detect("use 4242424242424242 for integration tests").await.unwrap();
    assert!(result.hits.is_empty(), "known test card should be filtered out in a test environment");
}

#[tokio::test]
async fn json_detection_reports_json_path_for_nested_email() {
    let reg = registry(RegistryConfig::default());
    let result = reg
        .detect_json(r#"{"user":{"profile":{"contact_email":"bob@example.com"}}}"#)
        .await
        .unwrap();

    assert_eq!(result.hits.len(), 1);
    assert_eq!(
        result.hits[0].features.json_path.as_deref(),
        Some("$.user.profile.contact_email")
    );
    assert_eq!(result.hits[0].features.key_name.as_deref(), Some("contact_email"));
}

#[tokio::test]
async fn ndjson_lines_each_redact_independently() {
    let reg = registry(RegistryConfig::default());
    let ndjson = "{\"email\":\"a@b.com\"}\n{\"email\":\"c@d.com\"}\n";

    let mut redacted_lines = Vec::new();
    for line in pii_core::json_detector::split_ndjson_lines(ndjson) {
        let (redacted, _) = reg.redact_json(line).await.unwrap();
        redacted_lines.push(redacted);
    }

    assert_eq!(redacted_lines.len(), 2);
    for line in &redacted_lines {
        assert!(!line.contains("@b.com") && !line.contains("@d.com"));
    }
}

#[tokio::test]
async fn contextual_example_marker_suppresses_a_hit_below_threshold() {
    let mut config = RegistryConfig::default();
    config.enable_contextual_confidence = true;
    config.confidence_threshold = Some(0.5);
    let reg = registry(config);

    let result = reg
        .detect("example: alice@example.com is a placeholder address")
        .await
        .unwrap();
    assert!(result.hits.is_empty(), "example-marked address should fall below threshold");
}

#[tokio::test]
async fn redacting_an_already_redacted_string_is_idempotent() {
    let reg = registry(RegistryConfig::default());
    let (once, _) = reg
        .redact_text("charge 4242424242424242, email alice@example.com")
        .await
        .unwrap();
    let (twice, second_pass) = reg.redact_text(&once).await.unwrap();
    assert_eq!(once, twice);
    assert!(second_pass.hits.is_empty(), "no detector should match its own mask string");
}

#[tokio::test]
async fn custom_allow_list_suppresses_a_specific_value() {
    use pii_core::config::AllowDenyConfig;
    let mut config = RegistryConfig::default();
    let mut allow = HashMap::new();
    allow.insert(
        PiiType::from("email"),
        std::collections::HashSet::from(["support@ourcompany.com".to_string()]),
    );
    config.allow_deny_config = AllowDenyConfig {
        allow,
        ..Default::default()
    };
    let reg = registry(config);

    let result = reg
        .detect("contact support@ourcompany.com or dana@other.com")
        .await
        .unwrap();
    assert_eq!(result.hits.len(), 1);
    assert_eq!(result.hits[0].value, "dana@other.com");
}
