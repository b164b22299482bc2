//! Tainted value tests.

use trustflow::taint::TaintedValue;

#[test]
fn explicit_constructors_set_trust() {
    assert!(TaintedValue::trusted("a").is_trusted());
    assert!(!TaintedValue::untrusted("a").is_trusted());
    assert!(TaintedValue::new("a", true).is_trusted());
}

#[test]
fn trust_is_never_inferred_from_content() {
    let value = TaintedValue::untrusted("");
    assert!(!value.is_trusted());
    assert_ne!(value, TaintedValue::empty());
}

#[test]
fn to_untrusted_then_to_trusted_round_trips_content() {
    let value = TaintedValue::trusted("body").to_untrusted();
    assert_eq!(value, TaintedValue::untrusted("body"));
    assert_eq!(value.to_trusted(), TaintedValue::trusted("body"));
}

#[test]
fn with_trust_keeps_content() {
    let value = TaintedValue::trusted("x").with_trust(false);
    assert_eq!(value.content(), "x");
    assert!(!value.is_trusted());
}

#[test]
fn serializes_content_and_trust() {
    let json = serde_json::to_value(TaintedValue::untrusted("hi")).expect("serializes");
    assert_eq!(json, serde_json::json!({"content": "hi", "trusted": false}));
}
