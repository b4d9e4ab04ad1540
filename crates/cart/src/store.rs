//! Local persistent store for the guest cart.
//!
//! The guest cart lives in a single JSON file (the "slot"). Only the cart
//! manager writes to it. Writes go to a sibling `.tmp` file first and are
//! renamed over the slot so a crash never leaves a half-written cart.
//!
//! # Format
//!
//! ```json
//! { "version": 1, "savedAt": "2026-01-01T00:00:00Z", "items": [ ... ] }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_cart_core::{CartLineItem, CartLines};
use thiserror::Error;
use tracing::{debug, instrument};

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

/// Errors reading or writing the guest cart slot.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path that was being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The slot does not contain a valid cart document.
    #[error("corrupt guest cart {path}: {source}")]
    Json {
        /// Path of the slot.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The slot was written by an unknown format version.
    #[error("unsupported guest cart format version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GuestCartDocumentRef<'a> {
    version: u32,
    saved_at: DateTime<Utc>,
    items: &'a [CartLineItem],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuestCartDocument {
    version: u32,
    #[serde(default)]
    items: CartLines,
}

/// File-backed slot holding the guest cart.
#[derive(Debug, Clone)]
pub struct GuestCartStore {
    path: PathBuf,
}

impl GuestCartStore {
    /// Create a store for the slot at `path`. Nothing is touched on disk
    /// until the first read or write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the slot.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the guest cart. A missing slot is an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the slot cannot be read, is not a valid cart
    /// document, or contains duplicate lines.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn load(&self) -> Result<CartLines, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No guest cart slot, starting empty");
                return Ok(CartLines::new());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let document: GuestCartDocument =
            serde_json::from_str(&raw).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;

        if document.version != FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion(document.version));
        }

        debug!(lines = document.items.len(), "Loaded guest cart");
        Ok(document.items)
    }

    /// Persist the full guest cart, replacing the slot atomically.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the parent directory cannot be created or the
    /// slot cannot be written.
    #[instrument(skip(self, lines), fields(path = %self.path.display(), lines = lines.len()))]
    pub fn save(&self, lines: &CartLines) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let document = GuestCartDocumentRef {
            version: FORMAT_VERSION,
            saved_at: Utc::now(),
            items: lines.as_slice(),
        };
        let encoded = serde_json::to_vec_pretty(&document).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, encoded).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!("Saved guest cart");
        Ok(())
    }

    /// Erase the slot. An already-missing slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the file exists but cannot be removed.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn clear(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Erased guest cart slot");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}
