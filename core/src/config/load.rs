use std::path::Path;

use super::types::RelayConfig;

/// Load `config.toml` from the working directory if present, then apply
/// environment overrides. Reads happen once at startup; the result is
/// shared read-only afterwards.
pub fn load_default() -> anyhow::Result<RelayConfig> {
    load_from(Path::new("config.toml"))
}

pub fn load_from(path: &Path) -> anyhow::Result<RelayConfig> {
    let mut cfg: RelayConfig = if path.exists() {
        let s = std::fs::read_to_string(path)?;
        toml::from_str::<RelayConfig>(&s)?
    } else {
        RelayConfig::default()
    };

    if let Ok(v) = std::env::var("PROCRELAY_HOST") {
        if !v.trim().is_empty() {
            cfg.http.host = v;
        }
    }
    if let Ok(v) = std::env::var("PROCRELAY_PORT") {
        if let Ok(port) = v.trim().parse::<u16>() {
            cfg.http.port = port;
        }
    }
    if let Ok(v) = std::env::var("PROCRELAY_ENGINE_BIN") {
        if !v.trim().is_empty() {
            cfg.engine.bin = v;
        }
    }
    if let Ok(v) = std::env::var("PROCRELAY_ENGINE_ENTRY") {
        if !v.trim().is_empty() {
            cfg.engine.entry = v;
        }
    }
    if let Ok(v) = std::env::var("PROCRELAY_TIMEOUT") {
        if let Ok(secs) = v.trim().parse::<u64>() {
            if secs > 0 {
                cfg.engine.default_timeout_secs = secs;
            }
        }
    }

    Ok(cfg)
}
