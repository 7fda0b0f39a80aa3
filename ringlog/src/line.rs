//! Log line values, text encoding and export rendering.
//!
//! A slot's text buffer holds `"[TAG] message"` as UTF-8, terminated by a
//! NUL byte. Input that does not fit is cut at the last character boundary
//! that leaves room for the terminator, so the buffer always decodes and
//! never overflows.
//!
//! Rendered lines look like:
//!
//! ```text
//! 2024-03-01 14:02:11.480213: [net] [wg0] Handshake did not complete
//! ```
//!
//! where the optional `[net]` label names the source store in merged exports.

use std::fmt;

use chrono::{DateTime, Local, TimeZone};

/// Size of a slot's text buffer in bytes, terminator included.
pub const LINE_CAPACITY: usize = 512;

/// Longest text a slot can hold.
pub const MAX_TEXT_LEN: usize = LINE_CAPACITY - 1;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// `strftime` pattern for the timestamp column: fixed width, microseconds.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// One decoded log line.
///
/// The tag is part of `text` as a bracketed prefix, exactly as it was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    timestamp_ns: u64,
    text: String,
}

impl LogLine {
    /// Creates a line from a timestamp (nanoseconds since the Unix epoch)
    /// and its stored text.
    pub fn new(timestamp_ns: u64, text: impl Into<String>) -> Self {
        Self {
            timestamp_ns,
            text: text.into(),
        }
    }

    /// Returns the timestamp in nanoseconds since the Unix epoch.
    pub fn timestamp_ns(&self) -> u64 {
        self.timestamp_ns
    }

    /// Returns the stored text, tag prefix included.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Renders the line in the local time zone.
    ///
    /// `label` is prefixed as `[label]` when present.
    pub fn render(&self, label: Option<&str>) -> String {
        self.render_in(label, &Local)
    }

    /// Renders the line in an explicit time zone.
    pub fn render_in<Tz>(&self, label: Option<&str>, tz: &Tz) -> String
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let timestamp = format_timestamp(self.timestamp_ns, tz);
        match label {
            Some(label) => format!("{timestamp}: [{label}] {}", self.text),
            None => format!("{timestamp}: {}", self.text),
        }
    }
}

/// Formats a nanosecond Unix timestamp as `YYYY-MM-DD HH:MM:SS.mmmmmm`.
///
/// Sub-microsecond digits are truncated, not rounded.
pub fn format_timestamp<Tz>(timestamp_ns: u64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let secs = timestamp_ns / NANOS_PER_SEC;
    #[allow(clippy::cast_possible_truncation)] // Remainder is below 1e9
    let nanos = (timestamp_ns % NANOS_PER_SEC) as u32;

    match i64::try_from(secs)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, nanos))
    {
        Some(utc) => utc
            .with_timezone(tz)
            .format(TIMESTAMP_FORMAT)
            .to_string(),
        None => format!("{secs}.{:06}", nanos / 1_000),
    }
}

/// Encodes `"[tag] message"` into a slot text buffer.
///
/// The buffer is fully overwritten: encoded bytes first, zeros after. Returns
/// the number of text bytes written, at most [`MAX_TEXT_LEN`].
pub(crate) fn encode_text(tag: &str, message: &str, buf: &mut [u8; LINE_CAPACITY]) -> usize {
    let mut len = 0;
    for part in ["[", tag, "] ", message] {
        let room = MAX_TEXT_LEN - len;
        let take = floor_char_boundary(part, room);
        buf[len..len + take].copy_from_slice(&part.as_bytes()[..take]);
        len += take;
        if take < part.len() {
            break;
        }
    }
    buf[len..].fill(0);
    len
}

/// Decodes a slot text buffer up to its first NUL byte.
///
/// Torn or foreign bytes are replaced rather than rejected.
pub(crate) fn decode_text(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// Largest `n <= max` such that `s[..n]` ends on a character boundary.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut n = max;
    while !s.is_char_boundary(n) {
        n -= 1;
    }
    n
}
