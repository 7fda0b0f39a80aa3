//! Follow module for live-tailing a log.
//!
//! A follower polls a store with a [`Cursor`] and gets back only the lines
//! appended since the previous poll. Each call copies the ring, scans at most
//! one lap and returns immediately; the polling cadence belongs to the
//! caller.
//!
//! # Design
//!
//! The cursor is the absolute append index of the next line to deliver. The
//! first poll uses [`Cursor::Tail`], which attaches at the live edge and
//! delivers nothing: history is the exporter's job.
//!
//! A follower that falls more than one ring behind cannot recover the lines
//! in between. It jumps to the current tail and reports how many it skipped
//! in [`FollowBatch::skipped`]. A cursor that is ahead of the store (someone
//! reset the file) is moved to the tail the same way, with nothing counted
//! as skipped.
//!
//! Cursors serialize with `serde`, so a tailer can save its position and
//! resume after a restart:
//!
//! ```rust,no_run
//! use ringlog::{Cursor, Store, follow};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::open("/tmp/tunnel.log")?;
//! let mut cursor = Cursor::load_or_tail("/tmp/tunnel.cursor.json")?;
//!
//! let batch = follow(&store, cursor);
//! for line in &batch.entries {
//!     println!("{}", line.render(None));
//! }
//! cursor = batch.cursor;
//! cursor.save("/tmp/tunnel.cursor.json")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CursorError, Result};
use crate::line::LogLine;
use crate::ring::Snapshot;
use crate::slab::CAPACITY;
use crate::store::Store;

/// Position of a follower in a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Cursor {
    /// Not attached yet; the next poll attaches at the live edge.
    #[default]
    Tail,
    /// Absolute append index of the next line to deliver.
    At(u64),
}

impl Cursor {
    /// Loads a cursor from a JSON file, or returns [`Cursor::Tail`] if the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_tail<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::Tail);
        }

        let data = std::fs::read_to_string(path).map_err(|e| CursorError::Load {
            path: path.to_path_buf(),
            source: e,
        })?;
        let cursor = serde_json::from_str(&data).map_err(|e| CursorError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(cursor)
    }

    /// Saves the cursor to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let data =
            serde_json::to_string_pretty(self).map_err(|e| CursorError::Serialize { source: e })?;
        std::fs::write(path, data).map_err(|e| CursorError::Save {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}

/// Result of one follow poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowBatch {
    /// Newly visible lines in append order.
    pub entries: Vec<LogLine>,
    /// Cursor to pass to the next poll.
    pub cursor: Cursor,
    /// Lines lost because the follower was lapped.
    pub skipped: u64,
}

impl FollowBatch {
    fn caught_up(tail: u64, skipped: u64) -> Self {
        Self {
            entries: Vec::new(),
            cursor: Cursor::At(tail),
            skipped,
        }
    }

    /// Returns whether this poll jumped over lost lines.
    pub fn lapped(&self) -> bool {
        self.skipped > 0
    }
}

/// Polls `store` for lines appended since `cursor`.
pub fn follow(store: &Store, cursor: Cursor) -> FollowBatch {
    follow_snapshot(&store.snapshot(), cursor)
}

/// Polls an existing snapshot for lines appended since `cursor`.
///
/// Scanning stops at the snapshot's settled index, or early at a slot that
/// is still being written; the returned cursor points at that slot so the
/// next poll retries it. Lines claimed while the snapshot was copied are
/// left for the next poll.
pub fn follow_snapshot(snapshot: &Snapshot, cursor: Cursor) -> FollowBatch {
    let tail = snapshot.settled_index();
    let claimed = snapshot.next_index();

    let position = match cursor {
        Cursor::Tail => return FollowBatch::caught_up(tail, 0),
        Cursor::At(position) => position,
    };

    if position > claimed {
        debug!(position, tail, "follow cursor is ahead of the log, log was reset");
        return FollowBatch::caught_up(tail, 0);
    }

    // Slots below this index may already hold a later lap.
    if claimed - position > CAPACITY as u64 {
        let skipped = tail.saturating_sub(position);
        debug!(position, tail, skipped, "follower lapped, jumping to tail");
        return FollowBatch::caught_up(tail, skipped);
    }

    let mut entries = Vec::new();
    let mut next = position;
    while next < tail {
        let Some(line) = snapshot.line_at(next) else {
            break;
        };
        entries.push(line);
        next += 1;
    }

    FollowBatch {
        entries,
        cursor: Cursor::At(next),
        skipped: 0,
    }
}
