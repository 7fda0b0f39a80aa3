//! Store module for the ringlog shared ring-buffer log.
//!
//! This module provides the top-level handle that ties the mapped file and
//! the ring together. A [`Store`] is what `open` returns and what every other
//! operation takes; there is no ambient global log.
//!
//! # Design
//!
//! - [`Store::open`] creates or opens the file, maps it and heals a foreign
//!   or corrupt header by resetting the store to empty
//! - [`Store::append`] claims the next index with one atomic add and writes
//!   the slot; it takes `&self`, so a store can be shared between threads
//!   (wrap it in an `Arc`) as well as between processes (open the same path)
//! - [`Store::snapshot`] copies the ring for readers
//! - [`Store::close`] unmaps; the file stays on disk
//!
//! # Operating Limits
//!
//! Ordering across concurrent writers is best effort: the timestamp is taken
//! before the index is claimed, and slot completion order can differ from
//! claim order. More than [`CAPACITY`](crate::CAPACITY) writers in flight at
//! once can be handed the same slot in the same lap and garble each other's
//! text. Neither case is detected.
//!
//! Two processes opening a missing path at the same moment can both
//! initialize it. Create the file once before starting concurrent writers.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use ringlog::Store;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::open("/tmp/tunnel.log")?;
//! store.append("NET", "Interface up");
//!
//! for line in &store.snapshot() {
//!     println!("{}", line.render(None));
//! }
//!
//! store.close();
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::ring::{Snapshot, slot_for};
use crate::slab::Slab;

/// Handle to one mapped log.
///
/// # Thread Safety
///
/// `Store` is `Send + Sync`. Appends from any number of threads are
/// lock-free; readers copy the ring through [`Store::snapshot`].
#[derive(Debug)]
pub struct Store {
    /// The mapped backing file.
    slab: Slab,
}

impl Store {
    /// Opens the log at `path`, creating it if it does not exist.
    ///
    /// Every process that opens the same path shares one logical log. A file
    /// with a foreign header or the wrong size is reset to an empty log
    /// rather than reported as an error.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Io`](crate::error::StoreError::Io) if the file cannot
    ///   be opened, created or resized
    /// - [`StoreError::MemoryMap`](crate::error::StoreError::MemoryMap) if
    ///   the mapping cannot be established
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let slab = Slab::open(path)?;
        Ok(Self { slab })
    }

    /// Opens the log at `path` only if it already is a valid log.
    ///
    /// Unlike [`Store::open`], a missing path is an error and a foreign or
    /// differently sized file is refused and left as it is. Readers that must
    /// not create or reset files (export, follow, inspection tools) use this.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Io`](crate::error::StoreError::Io) if the file does
    ///   not exist or cannot be opened
    /// - [`StoreError::NotALog`](crate::error::StoreError::NotALog) if the
    ///   file is not a log of this schema
    /// - [`StoreError::MemoryMap`](crate::error::StoreError::MemoryMap) if
    ///   the mapping cannot be established
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self> {
        let slab = Slab::open_existing(path)?;
        Ok(Self { slab })
    }

    /// Unmaps the log. The file and its contents persist.
    pub fn close(self) {
        drop(self);
    }

    /// Appends one line stamped with the current wall-clock time.
    ///
    /// The text is stored as `"[tag] message"`, truncated to fit a slot.
    pub fn append(&self, tag: &str, message: &str) {
        self.append_at(tag, message, now_ns());
    }

    /// Appends one line with a caller-supplied timestamp in nanoseconds
    /// since the Unix epoch.
    ///
    /// A timestamp of 0 is stored as 1 so it cannot be mistaken for an empty
    /// slot. Once the ring is full the oldest line is overwritten. This never
    /// fails: flushing to disk is only requested, never awaited.
    pub fn append_at(&self, tag: &str, message: &str, timestamp_ns: u64) {
        let timestamp_ns = timestamp_ns.max(1);
        let index = self.slab.claim_index();
        let slot = slot_for(index);

        self.slab.write_slot(slot, tag, message, timestamp_ns);
        self.slab.flush_slot_async(slot);
    }

    /// Copies the current contents of the ring.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.slab)
    }

    /// Returns the number of appends since the log was initialized.
    pub fn next_index(&self) -> u64 {
        self.slab.next_index()
    }

    /// Returns the path this log was opened from.
    pub fn path(&self) -> &Path {
        self.slab.path()
    }

    /// Returns whether opening found no valid log and started a fresh one.
    pub fn was_reinitialized(&self) -> bool {
        self.slab.was_reinitialized()
    }

    #[cfg(test)]
    pub(crate) fn slab(&self) -> &Slab {
        &self.slab
    }
}

/// Current wall-clock time in nanoseconds since the Unix epoch.
///
/// Clocks before the epoch read as 1, past `u64::MAX` nanoseconds (year
/// 2554) as `u64::MAX`.
pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(1, |elapsed| u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
}
