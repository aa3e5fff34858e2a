use serde::Deserialize;

pub const ANONYMOUS_USER: &str = "api-anonymous";

/// Hard ceiling on any per-request deadline. An absurd client value must not
/// overflow the deadline arithmetic in the relay.
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Validated input to one relay invocation.
///
/// Built once from the HTTP request body, immutable afterwards. `timeout`
/// falls back to the process-wide default when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub prompt: String,

    #[serde(default = "default_user_id")]
    pub user_id: String,

    #[serde(default)]
    pub provider: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub timeout: Option<u64>,
}

fn default_user_id() -> String {
    ANONYMOUS_USER.to_string()
}

impl QueryRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            user_id: default_user_id(),
            provider: None,
            model: None,
            api_key: None,
            verbose: false,
            timeout: None,
        }
    }

    /// Rejected before any process is spawned.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.prompt.trim().is_empty() {
            return Err("prompt is required");
        }
        Ok(())
    }

    /// Effective timeout: the request's own value when positive, otherwise
    /// the configured default, capped at [`MAX_TIMEOUT_SECS`] either way.
    pub fn timeout_secs(&self, default_secs: u64) -> u64 {
        let secs = match self.timeout {
            Some(t) if t > 0 => t,
            _ => default_secs,
        };
        secs.min(MAX_TIMEOUT_SECS)
    }
}
