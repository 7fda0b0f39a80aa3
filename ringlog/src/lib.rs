//! # ringlog
//!
//! Crash-tolerant, multi-writer ring-buffer log over a shared memory-mapped
//! file.
//!
//! ringlog keeps the last [`CAPACITY`] timestamped, tagged text lines in a
//! fixed-size file. Any number of processes and threads can append to the
//! same file at once without a daemon or a lock: slot allocation is one
//! atomic add on a counter stored in the file. Because the data lives in a
//! shared mapping, it survives the crash of any writer and can be tailed
//! live or exported after the fact.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Bounded storage: the file size is fixed, the oldest line is overwritten
//! - Lock-free, allocation-free append path
//! - A foreign or corrupt file is reset to an empty log on open
//! - Chronological export merged across several logs
//! - Cursor-based follower for live tailing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ringlog::{Cursor, Store, export, follow};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Open or create a log
//! let store = Store::open("/tmp/tunnel.log")?;
//!
//! // Append (lock-free hot path)
//! store.append("NET", "Handshake completed");
//!
//! // Dump everything still in the ring
//! export::export_to_writer(&[(&store, "NET")], std::io::stdout())?;
//!
//! // Tail new lines
//! let mut cursor = follow(&store, Cursor::Tail).cursor;
//! store.append("NET", "Keepalive sent");
//! let batch = follow(&store, cursor);
//! cursor = batch.cursor;
//! # let _ = cursor;
//! # Ok(())
//! # }
//! ```
//!
//! ## Operating Limits
//!
//! - Ordering across concurrent writers is best effort
//! - More than [`CAPACITY`] writers in flight at once can garble lines
//! - Nothing is fsynced; lines are visible to other mappers immediately and
//!   reach disk when the OS writes the pages back
//!
//! ## Modules
//!
//! - [`store`]: Open/close and append
//! - [`export`]: Merge and render one or more logs as text
//! - [`follow`]: Cursor-based live tailing
//! - [`logger`]: Tagged writer bound to a store
//! - [`ring`]: Snapshots and live-window iteration
//! - [`slab`]: Raw memory-mapped file format
//! - [`line`]: Line values, encoding and rendering
//! - [`error`]: Error types

pub mod error;
pub mod export;
pub mod follow;
pub mod line;
pub mod logger;
pub mod ring;
pub mod slab;
pub mod store;

// Re-export primary API types at crate root for convenience.
pub use error::{Result, RingLogError};
pub use follow::{Cursor, FollowBatch, follow};
pub use line::{LINE_CAPACITY, LogLine};
pub use logger::Logger;
pub use ring::Snapshot;
pub use slab::{CAPACITY, SCHEMA_VERSION};
pub use store::Store;
