use serde::{Deserialize, Serialize};

/// Process-wide configuration, established once at startup and shared
/// immutably across request tasks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// How to invoke the external engine CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interpreter or binary, e.g. `node`.
    #[serde(default = "default_bin")]
    pub bin: String,

    /// First argument handed to `bin`, e.g. the bundle entry point.
    #[serde(default = "default_entry")]
    pub entry: String,

    /// Per-request timeout applied when the request does not carry its own.
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_bin() -> String {
    "node".to_string()
}

fn default_entry() -> String {
    "/app/dist/index.js".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bin: default_bin(),
            entry: default_entry(),
            default_timeout_secs: default_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.http.host, "0.0.0.0");
        assert_eq!(cfg.http.port, 8080);
        assert_eq!(cfg.engine.bin, "node");
        assert_eq!(cfg.engine.entry, "/app/dist/index.js");
        assert_eq!(cfg.engine.default_timeout_secs, 120);
    }

    #[test]
    fn partial_toml_keeps_defaults_for_the_rest() {
        let cfg: RelayConfig = toml::from_str(
            r#"
            [engine]
            bin = "python3"
            entry = "/srv/engine/main.py"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.engine.bin, "python3");
        assert_eq!(cfg.engine.entry, "/srv/engine/main.py");
        assert_eq!(cfg.engine.default_timeout_secs, 120);
        assert_eq!(cfg.http.port, 8080);
    }
}
