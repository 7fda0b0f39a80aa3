//! Export module for dumping one or more logs as text.
//!
//! Each source store is snapshotted first, then the snapshots are merged by
//! timestamp and rendered one line per entry:
//!
//! ```text
//! YYYY-MM-DD HH:MM:SS.mmmmmm: [label] [TAG] message
//! ```
//!
//! The `[label]` column appears only when more than one source is exported.
//!
//! # Merge Order
//!
//! Every snapshot contributes its live window oldest-first. At each step the
//! head with the smallest timestamp is taken; on a tie the source listed
//! earlier wins. Heads are compared, never re-sorted, so lines that are
//! slightly out of order within one store keep their slot order.
//!
//! # Example
//!
//! ```rust,no_run
//! use ringlog::Store;
//! use ringlog::export;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let app = Store::open("/tmp/app.log")?;
//! let tunnel = Store::open("/tmp/tunnel.log")?;
//!
//! let written = export::export_to_path(&[(&app, "APP"), (&tunnel, "NET")], "/tmp/support.txt")?;
//! println!("exported {written} lines");
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::iter::Peekable;
use std::path::Path;

use chrono::{Local, TimeZone};
use tracing::debug;

use crate::error::{ExportError, Result};
use crate::line::LogLine;
use crate::ring::{RingIter, Snapshot};
use crate::store::Store;

/// Exports `sources` to the file at `path`, replacing its contents.
///
/// Lines are buffered and flushed once at the end. Returns the number of
/// lines written.
///
/// # Errors
///
/// Returns [`ExportError::Create`] if the destination cannot be created and
/// [`ExportError::Write`] if writing or the final flush fails. A failed
/// export may leave a partial file behind.
pub fn export_to_path<P: AsRef<Path>>(sources: &[(&Store, &str)], path: P) -> Result<usize> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| ExportError::Create {
        path: path.to_path_buf(),
        source: e,
    })?;

    let written = export_to_writer(sources, BufWriter::new(file))?;
    debug!(path = %path.display(), lines = written, sources = sources.len(), "exported log");
    Ok(written)
}

/// Exports `sources` to any writer in local time, flushing once at the end.
///
/// Returns the number of lines written.
///
/// # Errors
///
/// Returns [`ExportError::Write`] if writing or flushing fails.
pub fn export_to_writer<W: Write>(sources: &[(&Store, &str)], writer: W) -> Result<usize> {
    export_to_writer_in(sources, writer, &Local)
}

/// Exports `sources` to any writer, rendering timestamps in `tz`.
///
/// # Errors
///
/// Returns [`ExportError::Write`] if writing or flushing fails.
pub fn export_to_writer_in<W, Tz>(
    sources: &[(&Store, &str)],
    mut writer: W,
    tz: &Tz,
) -> Result<usize>
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let snapshots = capture(sources);
    write_merged(&snapshots, &mut writer, tz).map_err(|e| ExportError::Write { source: e }.into())
}

/// Renders `sources` as lines in local time, without trailing newlines.
pub fn render_lines(sources: &[(&Store, &str)]) -> Vec<String> {
    render_lines_in(sources, &Local)
}

/// Renders `sources` as lines with timestamps in `tz`.
pub fn render_lines_in<Tz>(sources: &[(&Store, &str)], tz: &Tz) -> Vec<String>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let snapshots = capture(sources);
    let labelled = snapshots.len() > 1;
    Merge::new(&snapshots)
        .map(|(source, line)| line.render_in(labelled.then_some(snapshots[source].1), tz))
        .collect()
}

/// Merges snapshots by timestamp, yielding `(source index, line)`.
///
/// Ties go to the lower source index.
pub fn merge<'a>(
    snapshots: &'a [(Snapshot, &'a str)],
) -> impl Iterator<Item = (usize, LogLine)> + 'a {
    Merge::new(snapshots)
}

/// Snapshots every source before any of them is read.
fn capture<'a>(sources: &[(&Store, &'a str)]) -> Vec<(Snapshot, &'a str)> {
    sources
        .iter()
        .map(|&(store, label)| (store.snapshot(), label))
        .collect()
}

fn write_merged<W, Tz>(snapshots: &[(Snapshot, &str)], writer: &mut W, tz: &Tz) -> io::Result<usize>
where
    W: Write,
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let labelled = snapshots.len() > 1;
    let mut written = 0;
    for (source, line) in Merge::new(snapshots) {
        let label = labelled.then_some(snapshots[source].1);
        writeln!(writer, "{}", line.render_in(label, tz))?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

/// Stable k-way merge over snapshot iterators.
struct Merge<'a> {
    heads: Vec<Peekable<RingIter<'a>>>,
}

impl<'a> Merge<'a> {
    fn new(snapshots: &'a [(Snapshot, &'a str)]) -> Self {
        Self {
            heads: snapshots
                .iter()
                .map(|(snapshot, _)| snapshot.iter().peekable())
                .collect(),
        }
    }
}

impl Iterator for Merge<'_> {
    type Item = (usize, LogLine);

    fn next(&mut self) -> Option<Self::Item> {
        let mut best: Option<(usize, u64)> = None;
        for (source, head) in self.heads.iter_mut().enumerate() {
            if let Some(line) = head.peek() {
                let timestamp = line.timestamp_ns();
                if best.is_none_or(|(_, best_ts)| timestamp < best_ts) {
                    best = Some((source, timestamp));
                }
            }
        }

        let (source, _) = best?;
        self.heads[source].next().map(|line| (source, line))
    }
}
