//! Log sanitization for patient identifiers and credentials.
//!
//! Study payloads and backend records can carry data that must never reach a
//! log file:
//! - patient DNI numbers (`dni: 12345678`, `12.345.678`)
//! - study access codes (`MLP_XXXXX`)
//! - emails and phone numbers of patients and staff
//! - bearer tokens (JWT) and other credentials
//! - record UUIDs and raw key material
//!
//! The primary protection is to never pass those values to a logging macro.
//! `SanitizingMakeWriter` applies `sanitize()` to every formatted line as a
//! fallback.
//!
//! Input is capped per call: 16 KiB for `sanitize()`, or the limit given to
//! `SanitizingMakeWriter::with_max_bytes` (see `LogConfig::sanitize_max_bytes`).

use std::sync::OnceLock;

use regex::{Regex, RegexSet};
use tracing_subscriber::fmt::MakeWriter;

use crate::config::DEFAULT_SANITIZE_MAX_BYTES;

/// Substitution rules, applied in order.
const RULES: [(&str, &str); 10] = [
    (
        r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}",
        "[REDACTED-UUID]",
    ),
    (r"\bMLP_[A-Za-z0-9]{3,}\b", "[REDACTED-ACCESS-CODE]"),
    (
        r"(?i)\bdni\b[\x22']?\s*[:=#]?\s*[\x22']?\d{1,2}\.?\d{3}\.?\d{3}\b",
        "[REDACTED-DNI]",
    ),
    (r"\b\d{1,2}\.\d{3}\.\d{3}\b", "[REDACTED-DNI]"),
    (
        r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
        "[REDACTED-EMAIL]",
    ),
    (
        r"\+\d{1,3}[\s.-]?\(?\d{1,4}\)?[\s.-]?\d{3,4}[\s.-]?\d{4}\b",
        "[REDACTED-PHONE]",
    ),
    (
        r"\beyJ[a-zA-Z0-9_-]{10,}\.[a-zA-Z0-9_-]{10,}\.[a-zA-Z0-9_-]{10,}\b",
        "[REDACTED-JWT]",
    ),
    (r"(?i)\bbearer\s+[A-Za-z0-9._~+/-]{16,}=*", "[REDACTED-TOKEN]"),
    (
        r"(?i)\b(?:api[_-]?key|access[_-]?token|refresh[_-]?token|secret|password|passwd|token)\b\s*[:=]\s*[A-Za-z0-9+/_-]{16,}={0,2}",
        "[REDACTED-SECRET]",
    ),
    (r"\b[0-9a-fA-F]{32,}\b", "[REDACTED-KEY]"),
];

struct Rule {
    regex: Regex,
    replacement: &'static str,
}

struct Rules {
    set: RegexSet,
    rules: Vec<Rule>,
}

static RULE_SET: OnceLock<Rules> = OnceLock::new();

fn rules() -> &'static Rules {
    RULE_SET.get_or_init(|| {
        let rules: Vec<Rule> = RULES
            .iter()
            .filter_map(|&(pattern, replacement)| match Regex::new(pattern) {
                Ok(regex) => Some(Rule { regex, replacement }),
                Err(e) => {
                    eprintln!("Skipping invalid sanitizer pattern {replacement}: {e}");
                    None
                }
            })
            .collect();
        let set = RegexSet::new(rules.iter().map(|r| r.regex.as_str())).unwrap_or_else(|_| RegexSet::empty());
        Rules { set, rules }
    })
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

/// Redact identifiers and credentials from a string.
#[must_use]
pub fn sanitize(input: &str) -> String {
    sanitize_with_limit(input, DEFAULT_SANITIZE_MAX_BYTES)
}

/// `sanitize()` with an explicit input cap in bytes.
#[must_use]
pub fn sanitize_with_limit(input: &str, max_bytes: usize) -> String {
    let rules = rules();
    let (prefix, truncated) = truncate_to_char_boundary(input, max_bytes);

    let mut result = prefix.to_string();
    // Rules run in table order; the set only tells which ones can match.
    for idx in &rules.set.matches(prefix) {
        let rule = &rules.rules[idx];
        result = rule.regex.replace_all(&result, rule.replacement).into_owned();
    }

    if truncated {
        result.push_str(" [TRUNCATED]");
    }
    result
}

/// Whether a string contains anything `sanitize()` would redact.
#[must_use]
pub fn contains_sensitive(input: &str) -> bool {
    let (prefix, _) = truncate_to_char_boundary(input, DEFAULT_SANITIZE_MAX_BYTES);
    rules().set.is_match(prefix)
}

/// A `tracing_subscriber` writer factory that sanitizes formatted log lines
/// before handing them to the inner writer.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
    max_bytes: usize,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            max_bytes: DEFAULT_SANITIZE_MAX_BYTES,
        }
    }

    /// Cap each sanitized line at `max_bytes` (zero keeps the current cap).
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        if max_bytes > 0 {
            self.max_bytes = max_bytes;
        }
        self
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter {
            inner: self.inner.make_writer(),
            buffer: Vec::new(),
            max_bytes: self.max_bytes,
        }
    }
}

/// Line-buffering writer produced by `SanitizingMakeWriter`.
pub struct SanitizingWriter<W: std::io::Write> {
    inner: W,
    buffer: Vec<u8>,
    max_bytes: usize,
}

impl<W: std::io::Write> SanitizingWriter<W> {
    fn write_sanitized(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let text = String::from_utf8_lossy(bytes);
        self.inner
            .write_all(sanitize_with_limit(&text, self.max_bytes).as_bytes())
    }

    fn flush_lines(&mut self) -> std::io::Result<()> {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.write_sanitized(&line)?;
        }
        Ok(())
    }
}

impl<W: std::io::Write> std::io::Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        // A single line longer than twice the cap is written out truncated.
        let hard_cap = self.max_bytes.saturating_mul(2);
        if self.buffer.len() > hard_cap {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
            self.inner.write_all(b"\n")?;
            return Ok(buf.len());
        }

        self.flush_lines()?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_lines()?;
        if !self.buffer.is_empty() {
            let pending = std::mem::take(&mut self.buffer);
            self.write_sanitized(&pending)?;
        }
        self.inner.flush()
    }
}

impl<W: std::io::Write> Drop for SanitizingWriter<W> {
    fn drop(&mut self) {
        let _ = std::io::Write::flush(self);
    }
}
