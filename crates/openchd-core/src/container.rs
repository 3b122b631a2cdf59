//! The container seam consumed by image handles
//!
//! A [`HunkContainer`] is an already-decoded view of a compressed hunk file:
//! hunk decompression, checksums and metadata storage all live behind this
//! trait. Image handles address the container by absolute byte offset and
//! query its text metadata by tag.

use crate::error::{Error, Result};

/// Access mode requested when opening an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// Well-known container metadata tags
pub mod tags {
    /// CD-ROM track metadata, version 2 ("CHT2")
    pub const CD_TRACK_V2: u32 = u32::from_be_bytes(*b"CHT2");
    /// CD-ROM track metadata, version 1 ("CHTR")
    pub const CD_TRACK: u32 = u32::from_be_bytes(*b"CHTR");
    /// GD-ROM track metadata ("CHGD")
    pub const GD_TRACK: u32 = u32::from_be_bytes(*b"CHGD");
    /// Legacy GD-ROM track metadata with little-endian audio ("CHGT")
    pub const GD_TRACK_OLD: u32 = u32::from_be_bytes(*b"CHGT");
    /// Hard-disk geometry metadata ("GDDD")
    pub const HARD_DISK: u32 = u32::from_be_bytes(*b"GDDD");
}

/// An open compressed-hunk container.
///
/// Reads take `&mut self` because decompression maintains a hunk cache.
/// Implementations are `Send` so distinct handles can live on distinct
/// threads; a single handle is never shared.
pub trait HunkContainer: Send {
    /// Container format version
    fn version(&self) -> u32;

    /// Size of one decompressed hunk in bytes
    fn hunk_bytes(&self) -> u32;

    /// Total decompressed size in bytes
    fn logical_bytes(&self) -> u64;

    /// Whether [`write_bytes`](Self::write_bytes) is supported
    fn is_writable(&self) -> bool {
        false
    }

    /// All text metadata entries stored under `tag`, in stored order
    fn metadata(&mut self, tag: u32) -> Result<Vec<String>>;

    /// Read `buf.len()` decompressed bytes starting at `offset`.
    ///
    /// Fails with `OutOfRange` if the range extends past the logical size;
    /// on failure `buf` contents are unspecified but nothing is leaked.
    fn read_bytes(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` at `offset`. Whole-range validation happens before any
    /// byte is stored, so a failed write leaves the container unmodified.
    fn write_bytes(&mut self, _offset: u64, _buf: &[u8]) -> Result<()> {
        Err(Error::unsupported("container does not support writes"))
    }
}
