use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

use crate::config::EngineConfig;
use crate::error::RelayError;
use crate::event::{self, EngineEvent};
use crate::launcher;
use crate::request::QueryRequest;

/// Upper bound on retained stderr; older bytes are discarded first.
const STDERR_TAIL_LIMIT: usize = 64 * 1024;

/// Destination for relayed events: either the live HTTP stream or an
/// in-memory accumulator. `emit` returns `false` once the consumer is gone.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&mut self, event: EngineEvent) -> bool;

    /// Resolves when the consumer disappears. The default never resolves,
    /// which is correct for in-memory sinks.
    async fn closed(&self) {
        std::future::pending::<()>().await
    }
}

/// Forwards events into an unbounded channel feeding the NDJSON response
/// body. The receiver side dropping means the HTTP client went away.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&mut self, event: EngineEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Ordered accumulator used by the buffered (sync) path.
#[derive(Debug, Default)]
pub struct BufferSink {
    events: Vec<EngineEvent>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_events(self) -> Vec<EngineEvent> {
        self.events
    }
}

#[async_trait]
impl EventSink for BufferSink {
    async fn emit(&mut self, event: EngineEvent) -> bool {
        self.events.push(event);
        true
    }
}

/// What the relay learned about the finished child, for the sync fallback
/// paths. Only meaningful when the drain ran to stdout end-of-file.
#[derive(Debug)]
pub struct RelayOutcome {
    pub exit_code: i32,
    /// Concatenated raw stdout lines, newline-joined.
    pub stdout_raw: String,
    pub stderr_tail: String,
    /// Whether any `error`-typed event reached the sink (engine-emitted or
    /// synthesized).
    pub error_event_seen: bool,
}

/// Drain one engine invocation into `sink`.
///
/// The whole operation (every line read, the exit wait, the stderr join)
/// shares one absolute deadline derived from the request timeout. On
/// deadline or consumer disconnect the child is killed (best effort, no
/// shutdown handshake) and the corresponding error is returned; the caller
/// decides what, if anything, to tell the client.
///
/// Events are forwarded in exactly the order the child produced them. After
/// a clean end-of-file with a non-zero exit and no engine-emitted `error`
/// event, one terminal error event is synthesized so both delivery modes
/// share a single event vocabulary.
pub async fn relay_query(
    cfg: &EngineConfig,
    req: &QueryRequest,
    sink: &mut (dyn EventSink + '_),
) -> Result<RelayOutcome, RelayError> {
    let timeout_secs = req.timeout_secs(cfg.default_timeout_secs);
    let deadline = Instant::now() + Duration::from_secs(timeout_secs);

    let mut child = launcher::spawn_query(cfg, req)?;
    let stdout = take_pipe(child.stdout.take(), "stdout")?;
    let stderr = take_pipe(child.stderr.take(), "stderr")?;

    // Pump stderr concurrently so a chatty child cannot deadlock on a full
    // pipe while we are still draining stdout.
    let stderr_task = tokio::spawn(read_stderr_tail(stderr));

    let mut lines = BufReader::new(stdout).lines();
    let mut stdout_raw = String::new();
    let mut error_event_seen = false;

    loop {
        let next = tokio::select! {
            res = timeout_at(deadline, lines.next_line()) => match res {
                Ok(io_res) => io_res.map_err(|source| {
                    stderr_task.abort();
                    RelayError::StreamIo {
                        stream: "stdout",
                        source,
                    }
                })?,
                Err(_) => {
                    kill_quiet(&mut child).await;
                    stderr_task.abort();
                    return Err(RelayError::Timeout { secs: timeout_secs });
                }
            },
            _ = sink.closed() => {
                kill_quiet(&mut child).await;
                stderr_task.abort();
                return Err(RelayError::Disconnected);
            }
        };

        let Some(line) = next else {
            break; // stdout end-of-file
        };

        if !stdout_raw.is_empty() {
            stdout_raw.push('\n');
        }
        stdout_raw.push_str(&line);

        let Some(mut ev) = event::parse_line(&line) else {
            continue;
        };
        ev.ensure_user_id(&req.user_id);
        if ev.is_error() {
            error_event_seen = true;
        }
        if !sink.emit(ev).await {
            kill_quiet(&mut child).await;
            stderr_task.abort();
            return Err(RelayError::Disconnected);
        }
    }

    let status = match timeout_at(deadline, child.wait()).await {
        Ok(res) => res.map_err(|source| RelayError::StreamIo {
            stream: "wait",
            source,
        })?,
        Err(_) => {
            kill_quiet(&mut child).await;
            stderr_task.abort();
            return Err(RelayError::Timeout { secs: timeout_secs });
        }
    };
    let exit_code = normalize_exit(status);

    let stderr_tail = match timeout_at(deadline, stderr_task).await {
        Ok(Ok(tail)) => tail,
        _ => String::new(),
    };

    if exit_code != 0 && !error_event_seen {
        let message = if stderr_tail.trim().is_empty() {
            format!("Exit code {exit_code}")
        } else {
            stderr_tail.trim().to_string()
        };
        let mut ev = EngineEvent::error_with_code(message, exit_code);
        ev.ensure_user_id(&req.user_id);
        error_event_seen = true;
        if !sink.emit(ev).await {
            return Err(RelayError::Disconnected);
        }
    }

    Ok(RelayOutcome {
        exit_code,
        stdout_raw,
        stderr_tail,
        error_event_seen,
    })
}

fn take_pipe<T>(pipe: Option<T>, stream: &'static str) -> Result<T, RelayError> {
    pipe.ok_or_else(|| RelayError::StreamIo {
        stream,
        source: std::io::Error::other("pipe not captured"),
    })
}

async fn kill_quiet(child: &mut Child) {
    // Best-effort kill; the child gets no shutdown handshake.
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "failed to kill engine process");
    }
}

async fn read_stderr_tail(stderr: ChildStderr) -> String {
    let mut reader = BufReader::new(stderr);
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > STDERR_TAIL_LIMIT {
                    let excess = buf.len() - STDERR_TAIL_LIMIT;
                    buf.drain(..excess);
                }
            }
            Err(_) => break,
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Map an exit status to a numeric code; signal deaths become `128 + signal`.
pub fn normalize_exit(status: std::process::ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(code) = status.code() {
            code
        } else if let Some(sig) = status.signal() {
            128 + sig
        } else {
            1
        }
    }
    #[cfg(windows)]
    {
        status.code().unwrap_or(1)
    }
}
