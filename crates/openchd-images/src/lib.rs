//! Disc and hard-disk image handles over hunk containers.
//!
//! Two image kinds are exposed. [`CdImage`] presents a CD-ROM or GD-ROM as a
//! table of contents plus per-sector data and subcode reads, with on-the-fly
//! conversion between sector formats; it opens compressed containers and
//! falls back to raw sector dumps. [`HardDiskImage`] presents a fixed-geometry
//! sector array with read and, on writable containers, write access.
//!
//! The [`open_cd`] and [`open_hard_disk`] functions are the usual entry
//! points; the `from_container` constructors accept any [`HunkContainer`]
//! the caller already holds.

pub mod cdrom;
pub mod harddisk;
pub mod legacy;
pub mod toc;

use std::path::Path;

use openchd_core::{AccessMode, HunkContainer, Result};

pub use cdrom::CdImage;
pub use harddisk::{Geometry, HardDiskImage};
pub use legacy::LegacyDisc;
pub use toc::{
    Addressing, DataFormat, SubType, Toc, Track, TrackType, FRAMES_PER_HUNK, FRAME_SIZE,
    MAX_SECTOR_DATA, MAX_SUBCODE_DATA, MAX_TRACKS, TRACK_PADDING,
};

/// Open a CD-ROM image, trying a compressed container first and falling
/// back to a raw sector dump.
pub fn open_cd(path: &Path) -> Result<CdImage> {
    CdImage::open(path)
}

/// Open a hard-disk image in the requested access mode.
pub fn open_hard_disk(path: &Path, mode: AccessMode) -> Result<HardDiskImage> {
    HardDiskImage::open(path, mode)
}

/// Build a CD-ROM image over an already-open container. The container is
/// handed back by [`CdImage::close`].
pub fn cd_from_container(container: Box<dyn HunkContainer>) -> Result<CdImage> {
    CdImage::from_container(container)
}

/// Build a hard-disk image over an already-open container. The container is
/// handed back by [`HardDiskImage::close`].
pub fn hard_disk_from_container(
    container: Box<dyn HunkContainer>,
    mode: AccessMode,
) -> Result<HardDiskImage> {
    HardDiskImage::from_container(container, mode)
}
