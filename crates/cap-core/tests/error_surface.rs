use cap_core::errors::{CapError, ErrorInfo};
use cap_core::Status;

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("task", "Run/Analyzer")
        .with_context("reason", "example")
}

#[test]
fn config_error_surface() {
    let err = CapError::Config(sample_info("CFG001", "duplicate parameter"));
    assert_eq!(err.info().code, "CFG001");
    assert!(err.info().context.contains_key("task"));
    assert_eq!(err.status(), Status::Error);
}

#[test]
fn fatal_error_maps_to_fatal_status() {
    let err = CapError::Fatal(sample_info("F001", "missing accumulator group"));
    assert!(err.is_fatal());
    assert_eq!(err.status(), Status::Fatal);
}

#[test]
fn display_includes_context_and_hint() {
    let err = CapError::Store(
        sample_info("S001", "cannot open").with_hint("check histoOutputPath"),
    );
    let rendered = err.to_string();
    assert!(rendered.starts_with("store error: cannot open (code: S001)"));
    assert!(rendered.contains("task=Run/Analyzer"));
    assert!(rendered.contains("hint: check histoOutputPath"));
}

#[test]
fn errors_roundtrip_through_json() {
    let err = CapError::Subsample(sample_info("SUB001", "layout mismatch"));
    let json = serde_json::to_string(&err).unwrap();
    assert!(json.contains("\"family\":\"Subsample\""));
    let back: CapError = serde_json::from_str(&json).unwrap();
    assert_eq!(err, back);
}
