use std::process::Stdio;

use tokio::process::{Child, Command};

use crate::config::EngineConfig;
use crate::error::RelayError;
use crate::request::QueryRequest;

/// Flag that puts the engine into machine-readable one-JSON-object-per-line
/// output mode.
pub const PIPE_FLAG: &str = "--pipe";
pub const VERBOSE_FLAG: &str = "--verbose";
/// Entry subcommand that prints installed capabilities, one `- name` per line.
pub const LIST_ARG: &str = "list";

/// Fixed table mapping provider name to the credential variable the engine
/// reads. Unknown providers fall back to the default entry.
const API_KEY_VARS: &[(&str, &str)] = &[
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("openai", "OPENAI_API_KEY"),
    ("google", "GOOGLE_GENERATIVE_AI_API_KEY"),
];
const DEFAULT_API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

pub const PROVIDER_VAR: &str = "ENGINE_PROVIDER";
pub const MODEL_VAR: &str = "ENGINE_MODEL";

/// Ordered argument list for one query invocation: entry, pipe mode,
/// optional flags, and the prompt as the last positional argument.
pub fn build_args(cfg: &EngineConfig, req: &QueryRequest) -> Vec<String> {
    let mut args = vec![cfg.entry.clone(), PIPE_FLAG.to_string()];
    if req.verbose {
        args.push(VERBOSE_FLAG.to_string());
    }
    args.push(req.prompt.clone());
    args
}

/// Request-scoped environment overrides.
///
/// Copy-on-write: these are handed to `Command::env`, which layers them over
/// the inherited environment for the child only. The ambient process
/// environment is never mutated.
pub fn build_env_overrides(req: &QueryRequest) -> Vec<(String, String)> {
    let mut overrides = Vec::new();

    if let Some(provider) = req.provider.as_deref() {
        overrides.push((PROVIDER_VAR.to_string(), provider.to_string()));
    }
    if let Some(model) = req.model.as_deref() {
        overrides.push((MODEL_VAR.to_string(), model.to_string()));
    }
    if let Some(api_key) = req.api_key.as_deref() {
        let var = req
            .provider
            .as_deref()
            .and_then(|p| {
                API_KEY_VARS
                    .iter()
                    .find(|(name, _)| *name == p)
                    .map(|(_, var)| *var)
            })
            .unwrap_or(DEFAULT_API_KEY_VAR);
        overrides.push((var.to_string(), api_key.to_string()));
    }

    overrides
}

/// Spawn one engine process for a query, stdout/stderr captured as pipes.
///
/// `kill_on_drop` is a backstop only; the relay owns termination explicitly
/// on timeout and disconnect.
pub fn spawn_query(cfg: &EngineConfig, req: &QueryRequest) -> Result<Child, RelayError> {
    let mut cmd = Command::new(&cfg.bin);
    cmd.args(build_args(cfg, req))
        .envs(build_env_overrides(req))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    cmd.spawn().map_err(|source| RelayError::Spawn {
        program: cfg.bin.clone(),
        source,
    })
}

/// Spawn the engine's `list` invocation used by health and skills lookups.
///
/// Stderr is discarded rather than piped: nothing drains it here, and a
/// captured pipe filling up would stall the child before stdout EOF.
pub fn spawn_list(cfg: &EngineConfig) -> Result<Child, RelayError> {
    let mut cmd = Command::new(&cfg.bin);
    cmd.arg(&cfg.entry)
        .arg(LIST_ARG)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    cmd.spawn().map_err(|source| RelayError::Spawn {
        program: cfg.bin.clone(),
        source,
    })
}
