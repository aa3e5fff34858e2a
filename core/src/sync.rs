use std::time::Instant;

use crate::config::EngineConfig;
use crate::error::RelayError;
use crate::event::EngineEvent;
use crate::relay::{relay_query, BufferSink};
use crate::request::QueryRequest;

/// Terminal result of a buffered query, HTTP-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncReply {
    Success {
        text: String,
    },
    Failure {
        error: String,
        returncode: Option<i64>,
        /// Partial stdout, only populated by the no-events non-zero-exit
        /// fallback.
        stdout: Option<String>,
    },
    Timeout {
        secs: u64,
    },
}

#[derive(Debug)]
pub struct SyncReport {
    pub user_id: String,
    pub elapsed_ms: u64,
    pub reply: SyncReply,
}

/// Run the relay against an accumulator sink and reduce the complete event
/// sequence to one terminal reply.
///
/// On a timeout fault any partial events are discarded; a sync caller only
/// ever sees a timeout or a complete sequence.
pub async fn run_sync_query(
    cfg: &EngineConfig,
    req: &QueryRequest,
) -> Result<SyncReport, RelayError> {
    let started = Instant::now();
    let mut sink = BufferSink::new();

    let reply = match relay_query(cfg, req, &mut sink).await {
        Ok(outcome) => reduce(sink.into_events(), &outcome),
        Err(RelayError::Timeout { secs }) => SyncReply::Timeout { secs },
        Err(e) => return Err(e),
    };

    Ok(SyncReport {
        user_id: req.user_id.clone(),
        elapsed_ms: started.elapsed().as_millis() as u64,
        reply,
    })
}

/// Scan the ordered sequence: the last `result` event supplies the answer,
/// the last `error` event the failure, and error wins when both exist.
/// With neither present the exit status decides, reporting raw stdout on
/// success and the stderr tail (or a generic exit-code message) otherwise.
fn reduce(events: Vec<EngineEvent>, outcome: &crate::relay::RelayOutcome) -> SyncReply {
    let last_result = events.iter().rev().find(|e| e.kind == crate::event::KIND_RESULT);
    let last_error = events.iter().rev().find(|e| e.is_error());

    if let Some(err_ev) = last_error {
        let error = err_ev
            .error_message()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Exit code {}", outcome.exit_code));
        let returncode = err_ev.returncode().or_else(|| {
            (outcome.exit_code != 0).then_some(outcome.exit_code as i64)
        });
        return SyncReply::Failure {
            error,
            returncode,
            stdout: None,
        };
    }

    if let Some(res_ev) = last_result {
        return SyncReply::Success {
            text: res_ev.text().unwrap_or_default().to_string(),
        };
    }

    if outcome.exit_code == 0 {
        SyncReply::Success {
            text: outcome.stdout_raw.clone(),
        }
    } else {
        let error = if outcome.stderr_tail.trim().is_empty() {
            format!("Exit code {}", outcome.exit_code)
        } else {
            outcome.stderr_tail.trim().to_string()
        };
        SyncReply::Failure {
            error,
            returncode: Some(outcome.exit_code as i64),
            stdout: Some(outcome.stdout_raw.clone()),
        }
    }
}
