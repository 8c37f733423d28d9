//! Integration tests for error handling

use conduit_core::error::{ConduitError, Result, ResultExt};

#[test]
fn test_error_context_chaining() {
    let base_error = ConduitError::negotiation("clamp", 0, "offered audio format, accepts video");
    let with_context = base_error.with_context("Renegotiating after restart");

    let msg = format!("{}", with_context);
    assert!(msg.contains("Renegotiating after restart"));
    assert!(msg.contains("clamp"));
    assert!(msg.contains("accepts video"));
}

#[test]
fn test_error_context_preserves_hint() {
    let base_error = ConduitError::IdleTimeout { polls: 100 };
    let hint_before = base_error.user_hint();

    let with_context = base_error.with_context("Driving pipeline");
    let hint_after = with_context.user_hint();

    assert!(hint_before.is_some());
    assert_eq!(hint_before, hint_after);
}

#[test]
fn test_result_ext_context() {
    let result: Result<()> = Err(ConduitError::connection("no stage #4"));
    let with_context = result.context("Building pipeline");

    let err = with_context.unwrap_err();
    assert!(err.to_string().starts_with("Building pipeline"));
    assert!(matches!(err, ConduitError::WithContext { .. }));
}

#[test]
fn test_io_error_conversion() {
    fn open() -> Result<Vec<u8>> {
        Ok(std::fs::read("/nonexistent/conduit/input.ts")?)
    }

    let err = open().unwrap_err();
    assert!(matches!(err, ConduitError::Io(_)));
    assert!(err.user_hint().is_none());
}

#[test]
fn test_parameter_errors_have_hints() {
    let unknown = ConduitError::unknown_parameter("gain", "volume");
    assert!(unknown.to_string().contains("volume"));
    assert!(unknown.user_hint().is_some());

    let invalid = ConduitError::invalid_parameter("gain_db", "-120 outside [-60, 24]");
    assert!(invalid.user_hint().unwrap().contains("conduit nodes"));
}

#[test]
fn test_negotiation_detection() {
    assert!(ConduitError::negotiation("gain", 0, "no audio").is_negotiation());
    assert!(!ConduitError::stream("upstream failed").is_negotiation());
}
