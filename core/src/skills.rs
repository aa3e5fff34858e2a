use std::time::Duration;

use tokio::io::AsyncReadExt;

use crate::config::EngineConfig;
use crate::error::RelayError;
use crate::launcher;

/// The `list` invocation is cheap; bound it independently of query timeouts.
const LIST_TIMEOUT: Duration = Duration::from_secs(10);

/// Ask the engine for its installed capabilities.
///
/// Runs `<bin> <entry> list` and returns the names from stdout lines
/// beginning with `- `. Anything else on stdout is ignored.
pub async fn list_skills(cfg: &EngineConfig) -> Result<Vec<String>, RelayError> {
    let mut child = launcher::spawn_list(cfg)?;
    let mut stdout = child.stdout.take().ok_or_else(|| RelayError::StreamIo {
        stream: "stdout",
        source: std::io::Error::other("pipe not captured"),
    })?;

    let gather = async {
        let mut buf = String::new();
        stdout
            .read_to_string(&mut buf)
            .await
            .map_err(|source| RelayError::StreamIo {
                stream: "stdout",
                source,
            })?;
        child.wait().await.map_err(|source| RelayError::StreamIo {
            stream: "wait",
            source,
        })?;
        Ok::<String, RelayError>(buf)
    };

    let output = match tokio::time::timeout(LIST_TIMEOUT, gather).await {
        Ok(res) => res?,
        Err(_) => {
            let _ = child.kill().await;
            return Err(RelayError::Timeout {
                secs: LIST_TIMEOUT.as_secs(),
            });
        }
    };

    Ok(parse_skill_lines(&output))
}

/// Installed-skill count for the health endpoint; `-1` on any failure.
pub async fn skills_count(cfg: &EngineConfig) -> i64 {
    match list_skills(cfg).await {
        Ok(skills) => skills.len() as i64,
        Err(e) => {
            tracing::warn!(error = %e, "skills listing failed");
            -1
        }
    }
}

fn parse_skill_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|l| {
            let trimmed = l.trim();
            trimmed
                .strip_prefix("- ")
                .map(|name| name.trim().to_string())
        })
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_dashed_lines_only() {
        let out = "Installed skills:\n- nfl\n- nba\n  - mlb  \nnot a skill\n";
        assert_eq!(parse_skill_lines(out), vec!["nfl", "nba", "mlb"]);
    }

    #[test]
    fn empty_output_yields_no_skills() {
        assert!(parse_skill_lines("").is_empty());
        assert!(parse_skill_lines("- \n").is_empty());
    }

    #[tokio::test]
    async fn missing_binary_counts_as_negative_one() {
        let cfg = EngineConfig {
            bin: "/nonexistent/engine-bin".into(),
            entry: "index.js".into(),
            default_timeout_secs: 120,
        };
        assert_eq!(skills_count(&cfg).await, -1);
    }
}
