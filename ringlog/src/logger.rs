//! Tagged logger bound to one store.
//!
//! Embedding code usually logs under a single tag per process (`APP` for the
//! UI, `NET` for a network extension, ...). A [`Logger`] carries that tag so
//! call sites only pass the message.

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::export;
use crate::store::Store;

/// A store plus the tag every line is written under.
#[derive(Debug, Clone)]
pub struct Logger {
    store: Arc<Store>,
    tag: String,
}

impl Logger {
    /// Opens the store at `path` and binds `tag` to it.
    ///
    /// # Errors
    ///
    /// Returns the store's open error.
    pub fn open<P: AsRef<Path>>(path: P, tag: impl Into<String>) -> Result<Self> {
        Ok(Self::new(Arc::new(Store::open(path)?), tag))
    }

    /// Binds `tag` to an already opened store.
    pub fn new(store: Arc<Store>, tag: impl Into<String>) -> Self {
        Self {
            store,
            tag: tag.into(),
        }
    }

    /// Appends `message` under this logger's tag.
    ///
    /// Leading and trailing line breaks are dropped; a log line is one line.
    pub fn log(&self, message: &str) {
        self.store
            .append(&self.tag, message.trim_matches(['\n', '\r']));
    }

    /// Returns the tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Writes this logger's store to `path`, replacing its contents.
    ///
    /// # Errors
    ///
    /// Returns an export error if the file cannot be created or written.
    pub fn export_to_path<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        export::export_to_path(&[(self.store.as_ref(), self.tag.as_str())], path)
    }

    /// Merges this logger's store with `other` by timestamp and writes the
    /// result to `path`, replacing its contents.
    ///
    /// Lines from this store are labelled with the logger's tag, lines from
    /// `other` with `other_label`. On equal timestamps this store's line
    /// comes first.
    ///
    /// # Errors
    ///
    /// Returns an export error if the file cannot be created or written.
    pub fn export_merged_to_path<P: AsRef<Path>>(
        &self,
        other: &Store,
        other_label: &str,
        path: P,
    ) -> Result<usize> {
        let sources = [(self.store.as_ref(), self.tag.as_str()), (other, other_label)];
        export::export_to_path(&sources, path)
    }
}
