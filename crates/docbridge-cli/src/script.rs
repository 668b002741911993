use docbridge_core::{BridgeError, OperationRequest};

/// One non-empty line of an operation script.
#[derive(Debug)]
pub struct ScriptLine {
    pub number: usize,
    pub request: Result<OperationRequest, BridgeError>,
}

/// Parses newline-delimited JSON requests. Blank lines and `#` comments are
/// skipped; a line that is not a request is kept as an error so the caller
/// can report it in sequence.
pub fn parse(text: &str) -> Vec<ScriptLine> {
    text.lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            let number = index + 1;
            let request = serde_json::from_str::<OperationRequest>(trimmed).map_err(|err| {
                BridgeError::invalid(format!("script line {number} is not a request: {err}"))
            });
            Some(ScriptLine { number, request })
        })
        .collect()
}
