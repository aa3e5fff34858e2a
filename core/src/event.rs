use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One structured unit of engine output.
///
/// The vocabulary of `type` values is owned by the engine and open-ended:
/// `start`, `progress`, `result`, `error`, `debug` are known today, but
/// anything else must pass through unmodified. Hence a tagged-but-open shape
/// rather than a closed enum: the discriminator plus a flattened bag of
/// whatever payload fields the engine attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

pub const KIND_RESULT: &str = "result";
pub const KIND_ERROR: &str = "error";
pub const KIND_DEBUG: &str = "debug";

impl EngineEvent {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Wrap a raw line that was not a well-formed event, so no byte of
    /// engine output is ever silently discarded.
    pub fn debug_raw(line: &str) -> Self {
        let mut ev = Self::new(KIND_DEBUG);
        ev.fields.insert("raw".into(), Value::String(line.into()));
        ev
    }

    pub fn error(message: impl Into<String>) -> Self {
        let mut ev = Self::new(KIND_ERROR);
        ev.fields
            .insert("error".into(), Value::String(message.into()));
        ev
    }

    pub fn error_with_code(message: impl Into<String>, returncode: i32) -> Self {
        let mut ev = Self::error(message);
        ev.fields
            .insert("returncode".into(), Value::from(returncode));
        ev
    }

    /// Attach the originating user id, never overwriting an engine-supplied
    /// field of the same name.
    pub fn ensure_user_id(&mut self, user_id: &str) {
        self.fields
            .entry("user_id")
            .or_insert_with(|| Value::String(user_id.into()));
    }

    pub fn is_error(&self) -> bool {
        self.kind == KIND_ERROR
    }

    pub fn text(&self) -> Option<&str> {
        self.fields.get("text").and_then(Value::as_str)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.fields.get("error").and_then(Value::as_str)
    }

    pub fn returncode(&self) -> Option<i64> {
        self.fields.get("returncode").and_then(Value::as_i64)
    }

    /// Serialize as one NDJSON line (without the trailing newline).
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Classify one line of engine stdout.
///
/// Empty lines produce no event. A JSON object carrying a `type` field passes
/// through as-is; everything else (malformed JSON, valid non-object JSON, an
/// object without a discriminator) is downgraded to a `debug` wrapper around
/// the raw text. No validation beyond that happens here.
pub fn parse_line(line: &str) -> Option<EngineEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<EngineEvent>(trimmed) {
        Ok(ev) => Some(ev),
        Err(_) => Some(EngineEvent::debug_raw(line)),
    }
}
