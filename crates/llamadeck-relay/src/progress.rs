//! Parsing of `ollama pull` progress lines
//!
//! The CLI redraws its progress bars with terminal escape sequences and
//! prints lines such as:
//!
//! ```text
//! pulling manifest
//! pulling 6a0746a1ec1a...  47% ▕████████        ▏ 412.3 MB/4.1 GB   31 MB/s  1m58s
//! verifying sha256 digest
//! ```
//!
//! A percentage is derived from either a `X MB / Y GB` ratio or a plain `N%`.
//! The ratio is preferred and computed as `X / (Y * 1024) * 100`, treating GB
//! as 1024 MB to match the CLI's own units.

use once_cell::sync::Lazy;
use regex::Regex;

static SIZE_RATIO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)\s*MB\s*/\s*(\d+(?:\.\d+)?)\s*GB").expect("valid size ratio regex")
});

static PERCENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)%").expect("valid percent regex"));

// CSI sequences (ESC[?2026h, ESC[?25l, ESC[A, ESC[1G, ESC[K ...) plus the
// same sequences with the ESC byte already lost.
static CONTROL_SEQUENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\[\?[0-9;]*[hl]|\[[0-9]+[A-Za-z]|\x1b")
        .expect("valid control sequence regex")
});

/// Parsed progress line
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Cleaned, human-readable text
    pub text: String,
    /// Completion percentage when the line carries one
    pub percent: Option<f64>,
}

/// Parse one progress line; `None` when nothing readable is left after
/// stripping control sequences.
pub fn parse_progress(line: &str) -> Option<ProgressUpdate> {
    let cleaned = strip_control_sequences(line);
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    Some(ProgressUpdate {
        text: describe(cleaned),
        percent: extract_percent(cleaned),
    })
}

/// Remove terminal cursor-movement noise from a line
pub fn strip_control_sequences(line: &str) -> String {
    CONTROL_SEQUENCE.replace_all(line, "").into_owned()
}

/// Completion percentage encoded in a line, if any
pub fn extract_percent(line: &str) -> Option<f64> {
    if let Some(caps) = SIZE_RATIO.captures(line) {
        let downloaded: f64 = caps[1].parse().ok()?;
        let total_gb: f64 = caps[2].parse().ok()?;
        if total_gb > 0.0 {
            return Some(downloaded / (total_gb * 1024.0) * 100.0);
        }
    }

    PERCENT
        .captures(line)
        .and_then(|caps| caps[1].parse::<f64>().ok())
}

fn describe(cleaned: &str) -> String {
    if cleaned.contains("pulling manifest") {
        "Pulling manifest...".to_string()
    } else if cleaned.contains("verifying") {
        "Verifying download...".to_string()
    } else {
        cleaned.to_string()
    }
}
