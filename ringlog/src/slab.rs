//! Memory-mapped file format for ringlog stores.
//!
//! A slab is the fixed-size backing file of one log. Every process that opens
//! the same path maps the same bytes with `MAP_SHARED`, so writers in
//! different processes coordinate purely through atomic fields in the file.
//!
//! # File Format
//!
//! ```text
//! [0..4)      Magic bytes b"RLOG"
//! [4..8)      Schema version (u32, little-endian)
//! [8..16)     next_index (atomic u64): total appends since initialization
//! [16..64)    Reserved, zero
//! [64..)      CAPACITY slots of SLOT_SIZE bytes each:
//!               [0..8)    time_ns (atomic u64), 0 = empty or being written
//!               [8..520)  text, NUL-terminated UTF-8
//! ```
//!
//! The layout is defined by these offsets, not by any Rust struct, so the
//! on-disk contract does not depend on compiler layout decisions. Changing
//! slot size, capacity or field order requires bumping [`SCHEMA_VERSION`].
//!
//! # Slot Protocol
//!
//! A writer clears the slot timestamp, issues a release fence, stores the
//! text, then stores the final timestamp with release ordering. A reader
//! loads the timestamp with acquire ordering, copies the text, issues an
//! acquire fence and reloads the timestamp. A zero or changed timestamp
//! means the copy may be torn, and the slot is reported as empty.
//!
//! Text is moved as 64-bit words through atomic loads and stores so that
//! racing readers and writers never perform a non-atomic data race.
//!
//! # Safety
//!
//! This module hands out `&AtomicU64` references into the mapping. Every
//! offset is derived from the constants below, is a multiple of eight and is
//! checked against the mapping length when the slab is opened.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering, fence};

use memmap2::MmapMut;
use tracing::{debug, trace, warn};

use crate::error::{Result, StoreError};
use crate::line::{self, LINE_CAPACITY, LogLine};

/// Number of slots in every store.
pub const CAPACITY: usize = 2048;

/// Magic bytes identifying a ringlog file.
const SLAB_MAGIC: [u8; 4] = *b"RLOG";

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Size of the header in bytes.
const HEADER_SIZE: usize = 64;

/// Offset of the schema version inside the header.
const VERSION_OFFSET: usize = 4;

/// Offset of the `next_index` counter inside the header.
const NEXT_INDEX_OFFSET: usize = 8;

/// Size of a slot's timestamp field in bytes.
const TIMESTAMP_SIZE: usize = 8;

/// Size of one slot record in bytes.
pub const SLOT_SIZE: usize = TIMESTAMP_SIZE + LINE_CAPACITY;

/// Number of 64-bit words in a slot's text field.
const TEXT_WORDS: usize = LINE_CAPACITY / 8;

/// Total size of a store file in bytes.
pub const FILE_SIZE: usize = HEADER_SIZE + CAPACITY * SLOT_SIZE;

const _: () = assert!(HEADER_SIZE % 8 == 0 && SLOT_SIZE % 8 == 0 && LINE_CAPACITY % 8 == 0);

/// One slot copied out of the mapping.
#[derive(Clone)]
pub(crate) struct RawSlot {
    /// Timestamp in nanoseconds, 0 when empty or torn.
    pub(crate) timestamp_ns: u64,
    /// Raw text buffer.
    pub(crate) text: [u8; LINE_CAPACITY],
}

impl RawSlot {
    /// A slot that has never been written.
    pub(crate) const EMPTY: Self = Self {
        timestamp_ns: 0,
        text: [0; LINE_CAPACITY],
    };

    /// Decodes the slot, or `None` for the sentinel timestamp.
    pub(crate) fn to_line(&self) -> Option<LogLine> {
        if self.timestamp_ns == 0 {
            return None;
        }
        Some(LogLine::new(self.timestamp_ns, line::decode_text(&self.text)))
    }
}

impl std::fmt::Debug for RawSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawSlot")
            .field("timestamp_ns", &self.timestamp_ns)
            .field("text", &line::decode_text(&self.text))
            .finish()
    }
}

/// Memory-mapped backing file of one log.
///
/// # Thread Safety
///
/// Every mutable location is accessed through atomics, so a slab may be
/// shared freely between threads. Writers racing for the same slot (more
/// concurrent writers than [`CAPACITY`]) can interleave their text; that is
/// an accepted operating limit, not undefined behavior.
#[derive(Debug)]
pub struct Slab {
    /// Memory mapping of the file. Kept alive for `base`.
    mmap: MmapMut,
    /// Start of the mapping.
    base: *mut u8,
    /// Path to the file (for error reporting).
    path: PathBuf,
    /// Whether open found no valid store and reset the region.
    reinitialized: bool,
}

// SAFETY: `base` points into `mmap`, which is owned by the slab and lives as
// long as it does. The pointer itself carries no thread affinity.
unsafe impl Send for Slab {}

// SAFETY: All shared mutation goes through `AtomicU64` views of the mapping;
// no `&mut` to mapped memory is created after `open` returns.
unsafe impl Sync for Slab {}

impl Slab {
    /// Opens the store file at `path`, creating it if absent.
    ///
    /// The file is resized to [`FILE_SIZE`] and mapped shared read/write. If
    /// the magic or version does not match, or the file had a different
    /// size, the region is zeroed and stamped as an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be opened or resized,
    /// and [`StoreError::MemoryMap`] if it cannot be mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = open_file(&path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;

        let existing_len = file
            .metadata()
            .map_err(|e| StoreError::Io {
                path: path.clone(),
                source: e,
            })?
            .len();

        if existing_len != FILE_SIZE as u64 {
            file.set_len(FILE_SIZE as u64).map_err(|e| StoreError::Io {
                path: path.clone(),
                source: e,
            })?;
        }

        let mut mmap = map_file(&file, &path)?;

        let size_drift = existing_len != 0 && existing_len != FILE_SIZE as u64;
        let reinitialized = size_drift || !has_valid_header(&mmap);
        if reinitialized {
            if existing_len == 0 {
                debug!(path = %path.display(), "creating new log store");
            } else {
                warn!(
                    path = %path.display(),
                    existing_len,
                    "log store has foreign or corrupt header, reinitializing"
                );
            }
            initialize(&mut mmap);
            if let Err(e) = mmap.flush_async() {
                trace!(path = %path.display(), error = %e, "async flush after init failed");
            }
        } else {
            debug!(path = %path.display(), "opened existing log store");
        }

        let base = mmap.as_mut_ptr();

        Ok(Self {
            mmap,
            base,
            path,
            reinitialized,
        })
    }

    /// Opens an existing store file for reading and appending without ever
    /// creating, resizing or reinitializing it.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Io`] if the file does not exist or cannot be opened
    ///   read/write
    /// - [`StoreError::NotALog`] if its size or header does not match this
    ///   schema; the file is left untouched
    /// - [`StoreError::MemoryMap`] if it cannot be mapped
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| StoreError::Io {
                path: path.clone(),
                source: e,
            })?;

        let len = file
            .metadata()
            .map_err(|e| StoreError::Io {
                path: path.clone(),
                source: e,
            })?
            .len();
        if len != FILE_SIZE as u64 {
            return Err(StoreError::NotALog {
                path,
                reason: format!("size is {len} bytes, expected {FILE_SIZE}"),
            }
            .into());
        }

        let mut mmap = map_file(&file, &path)?;
        if !has_valid_header(&mmap) {
            return Err(StoreError::NotALog {
                path,
                reason: "magic or schema version mismatch".to_string(),
            }
            .into());
        }
        debug!(path = %path.display(), "opened existing log store");

        let base = mmap.as_mut_ptr();

        Ok(Self {
            mmap,
            base,
            path,
            reinitialized: false,
        })
    }

    /// Returns the path to this store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns whether [`Slab::open`] reset the region.
    pub fn was_reinitialized(&self) -> bool {
        self.reinitialized
    }

    /// Returns a view of the 8-byte word at `offset`.
    #[inline]
    fn word(&self, offset: usize) -> &AtomicU64 {
        debug_assert!(offset % 8 == 0 && offset + 8 <= FILE_SIZE);
        // SAFETY: `offset` is 8-aligned and in bounds (layout constants,
        // checked at open); the mapping is page-aligned, so the address is
        // aligned for AtomicU64, which has the same layout as u64. The
        // reference borrows `self`, which keeps the mapping alive.
        unsafe { &*self.base.add(offset).cast::<AtomicU64>() }
    }

    /// Byte offset of a slot record.
    #[inline]
    fn slot_offset(slot: usize) -> usize {
        debug_assert!(slot < CAPACITY);
        HEADER_SIZE + slot * SLOT_SIZE
    }

    /// Returns the current value of the append counter.
    pub fn next_index(&self) -> u64 {
        self.word(NEXT_INDEX_OFFSET).load(Ordering::Acquire)
    }

    /// Atomically claims the next logical index.
    pub fn claim_index(&self) -> u64 {
        self.word(NEXT_INDEX_OFFSET).fetch_add(1, Ordering::AcqRel)
    }

    /// Writes one line into `slot` following the slot protocol.
    ///
    /// `timestamp_ns` must be non-zero.
    pub fn write_slot(&self, slot: usize, tag: &str, message: &str, timestamp_ns: u64) {
        debug_assert!(timestamp_ns != 0);

        let mut text = [0u8; LINE_CAPACITY];
        line::encode_text(tag, message, &mut text);

        let offset = Self::slot_offset(slot);
        let stamp = self.word(offset);

        stamp.store(0, Ordering::Relaxed);
        fence(Ordering::Release);

        let text_offset = offset + TIMESTAMP_SIZE;
        for (i, chunk) in text.chunks_exact(8).enumerate() {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(chunk);
            self.word(text_offset + i * 8)
                .store(u64::from_ne_bytes(bytes), Ordering::Relaxed);
        }

        stamp.store(timestamp_ns, Ordering::Release);
    }

    /// Copies one slot out of the mapping.
    ///
    /// A slot being written during the copy comes back as [`RawSlot::EMPTY`].
    ///
    /// The check compares timestamp values only. A complete overwrite that
    /// finishes during the copy and stores the same timestamp as the line it
    /// replaced passes the check, so the text can mix bytes of both lines.
    /// Wall-clock appends make this unlikely; callers of
    /// [`Store::append_at`](crate::Store::append_at) that reuse timestamps
    /// across a full lap can hit it.
    pub(crate) fn read_slot(&self, slot: usize) -> RawSlot {
        let offset = Self::slot_offset(slot);
        let stamp = self.word(offset);

        let timestamp_ns = stamp.load(Ordering::Acquire);
        if timestamp_ns == 0 {
            return RawSlot::EMPTY;
        }

        let mut text = [0u8; LINE_CAPACITY];
        let text_offset = offset + TIMESTAMP_SIZE;
        for i in 0..TEXT_WORDS {
            let word = self.word(text_offset + i * 8).load(Ordering::Relaxed);
            text[i * 8..i * 8 + 8].copy_from_slice(&word.to_ne_bytes());
        }

        fence(Ordering::Acquire);
        if stamp.load(Ordering::Relaxed) != timestamp_ns {
            return RawSlot::EMPTY;
        }

        RawSlot { timestamp_ns, text }
    }

    /// Asks the OS to start writing a slot and the counter back to the
    /// file. Never blocks and never fails the caller.
    pub fn flush_slot_async(&self, slot: usize) {
        self.flush_range_async(NEXT_INDEX_OFFSET, 8);
        self.flush_range_async(Self::slot_offset(slot), SLOT_SIZE);
    }

    fn flush_range_async(&self, offset: usize, len: usize) {
        if let Err(e) = self.mmap.flush_async_range(offset, len) {
            trace!(path = %self.path.display(), offset, len, error = %e, "async flush hint failed");
        }
    }
}

/// Opens or creates the backing file with owner-only permissions.
fn open_file(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.read(true).write(true).create(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// Maps a file already sized to [`FILE_SIZE`].
fn map_file(file: &File, path: &Path) -> Result<MmapMut> {
    // SAFETY: The file is open read/write and sized to FILE_SIZE. Other
    // mappers only touch it through the atomic protocol in this module.
    let mmap = unsafe { MmapMut::map_mut(file) }.map_err(|e| StoreError::MemoryMap {
        path: path.to_path_buf(),
        source: e,
    })?;

    if mmap.len() != FILE_SIZE {
        return Err(StoreError::MemoryMap {
            path: path.to_path_buf(),
            source: std::io::Error::other(format!(
                "mapped {} bytes, expected {FILE_SIZE}",
                mmap.len()
            )),
        }
        .into());
    }
    Ok(mmap)
}

/// Checks the magic bytes and schema version of a mapped region.
fn has_valid_header(region: &[u8]) -> bool {
    region[..4] == SLAB_MAGIC
        && region[VERSION_OFFSET..VERSION_OFFSET + 4] == SCHEMA_VERSION.to_le_bytes()
}

/// Zeroes the region and stamps it as an empty store. The magic goes last so
/// a concurrent opener never sees a valid header over stale slots.
fn initialize(region: &mut [u8]) {
    region.fill(0);
    region[VERSION_OFFSET..VERSION_OFFSET + 4].copy_from_slice(&SCHEMA_VERSION.to_le_bytes());
    region[..4].copy_from_slice(&SLAB_MAGIC);
}
