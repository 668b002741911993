//! Shared fixtures for docbridge tests.

use docbridge_config::Config;
use docbridge_core::{
    BridgeSettings, MemoryDocument, OperationRequest, OperationResult, Session, StyleDef,
};
use serde_json::Value;

/// Paragraph style used by precedence tests: 24pt text.
pub const BIG_HEADING: &str = "Big Heading";

pub const REPORT_TEXT: &str = "Annual report 2024\n\
Revenue grew in 2024 across all regions.\n\
The 2024 outlook remains positive.\n\
Contact the finance team for details.";

/// Returns a baseline configuration for tests.
pub fn test_config() -> Config {
    Config::default()
}

pub fn test_settings() -> BridgeSettings {
    test_config().bridge_settings()
}

/// A four-paragraph report with the [`BIG_HEADING`] style registered.
pub fn report_document() -> MemoryDocument {
    let mut document = MemoryDocument::from_text(REPORT_TEXT);
    document.add_style(StyleDef::paragraph(BIG_HEADING).with_font_size(24.0));
    document
}

pub fn session(document: MemoryDocument) -> Session<MemoryDocument> {
    Session::new(document).with_settings(test_settings())
}

pub fn request(opcode: &str, args: Value) -> OperationRequest {
    OperationRequest::new(opcode, args)
}

/// Returns `data` of a successful result, panicking with the diagnostics otherwise.
pub fn expect_ok(result: &OperationResult) -> Value {
    assert!(
        result.ok,
        "operation failed: {:?} {:?}",
        result.code, result.diagnostics
    );
    result.data.clone().unwrap_or(Value::Null)
}
