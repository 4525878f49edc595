use std::fs;
use std::path::Path;

use tracing::warn;

const STATUS_PATH: &str = "/proc/self/status";

/// Liveness echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pong {
    pub token: i64,
    pub pid: u32,
    /// Resident set size in KiB; 0 when it could not be sampled.
    pub memory_used_kb: u64,
}

impl Pong {
    pub(crate) fn answer(token: i64) -> Self {
        Self {
            token,
            pid: std::process::id(),
            memory_used_kb: resident_kb(Path::new(STATUS_PATH)).unwrap_or(0),
        }
    }
}

/// Reads `VmRSS` from a procfs status file.
fn resident_kb(status_path: &Path) -> Option<u64> {
    let text = match fs::read_to_string(status_path) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %status_path.display(), error = %e, "could not read process status");
            return None;
        }
    };
    let rss = text
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(parse_status_number);
    if rss.is_none() {
        warn!(path = %status_path.display(), "no VmRSS in process status");
    }
    rss
}

fn parse_status_number(input: &str) -> Option<u64> {
    input
        .split_whitespace()
        .next()
        .and_then(|token| token.parse::<u64>().ok())
}
