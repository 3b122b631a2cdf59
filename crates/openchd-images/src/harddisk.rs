//! Hard-disk image handle
//!
//! A flat sector array over a container, described by a fixed CHS geometry
//! read from the `GDDD` metadata entry. Unlike CD-ROM images there is no
//! raw-image fallback: the format requires the container.

use std::path::Path;

use openchd_core::{tags, AccessMode, Error, HunkContainer, Result};
use openchd_containers::ChdContainer;

/// Fixed disk geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub cylinders: u32,
    pub heads: u32,
    pub sectors: u32,
    pub sector_bytes: u32,
}

impl Geometry {
    /// Total addressable sectors: cylinders × heads × sectors per track
    pub fn total_sectors(&self) -> u64 {
        self.cylinders as u64 * self.heads as u64 * self.sectors as u64
    }

    /// Parse a `CYLS:c,HEADS:h,SECS:s,BPS:b` metadata entry
    pub fn from_metadata(text: &str) -> Result<Self> {
        let mut cylinders = None;
        let mut heads = None;
        let mut sectors = None;
        let mut sector_bytes = None;

        for field in text.split(',') {
            let Some((key, value)) = field.trim().split_once(':') else {
                continue;
            };
            let parsed = value.parse::<u32>().ok();
            match key {
                "CYLS" => cylinders = parsed,
                "HEADS" => heads = parsed,
                "SECS" => sectors = parsed,
                "BPS" => sector_bytes = parsed,
                _ => {}
            }
        }

        let geometry = Self {
            cylinders: cylinders
                .ok_or_else(|| Error::metadata(format!("geometry without CYLS: '{}'", text)))?,
            heads: heads
                .ok_or_else(|| Error::metadata(format!("geometry without HEADS: '{}'", text)))?,
            sectors: sectors
                .ok_or_else(|| Error::metadata(format!("geometry without SECS: '{}'", text)))?,
            sector_bytes: sector_bytes
                .ok_or_else(|| Error::metadata(format!("geometry without BPS: '{}'", text)))?,
        };
        if geometry.cylinders == 0
            || geometry.heads == 0
            || geometry.sectors == 0
            || geometry.sector_bytes == 0
        {
            return Err(Error::metadata(format!(
                "geometry fields must all be positive: '{}'",
                text
            )));
        }
        Ok(geometry)
    }
}

/// An open hard-disk image
pub struct HardDiskImage {
    container: Option<(Box<dyn HunkContainer>, bool)>,
    geometry: Geometry,
    read_only: bool,
}

impl HardDiskImage {
    /// Open a hard-disk image from a path in the requested mode.
    ///
    /// Compressed containers are never writable, so a `ReadWrite` request
    /// against one fails at open; writable images come from writable
    /// container implementations via [`from_container`](Self::from_container).
    pub fn open(path: &Path, mode: AccessMode) -> Result<Self> {
        let container = ChdContainer::open(path, mode)?;
        Self::build(Box::new(container), mode, true)
    }

    /// Build a hard-disk image over an already-open container.
    ///
    /// The container is borrowed: [`close`](Self::close) hands it back. On
    /// construction failure it is consumed and released.
    pub fn from_container(container: Box<dyn HunkContainer>, mode: AccessMode) -> Result<Self> {
        Self::build(container, mode, false)
    }

    fn build(mut container: Box<dyn HunkContainer>, mode: AccessMode, owned: bool) -> Result<Self> {
        // Errors below drop the container box: no leak on a failed open
        if mode == AccessMode::ReadWrite && !container.is_writable() {
            return Err(Error::unsupported("container is not writable"));
        }

        let entries = container.metadata(tags::HARD_DISK)?;
        let text = entries
            .first()
            .ok_or_else(|| Error::metadata("container has no hard-disk geometry metadata"))?;
        let geometry = Geometry::from_metadata(text)?;

        let needed = geometry.total_sectors() * geometry.sector_bytes as u64;
        if needed > container.logical_bytes() {
            tracing::warn!(
                needed,
                available = container.logical_bytes(),
                "geometry describes more data than the container stores"
            );
        }
        tracing::debug!(?geometry, read_only = mode == AccessMode::ReadOnly, "opened hard disk");

        Ok(Self {
            container: Some((container, owned)),
            geometry,
            read_only: mode == AccessMode::ReadOnly,
        })
    }

    /// The disk geometry, fixed for the life of the image
    pub fn geometry(&self) -> Result<&Geometry> {
        if self.container.is_none() {
            return Err(Error::NotOpen);
        }
        Ok(&self.geometry)
    }

    /// Read one sector into `buf`
    pub fn read(&mut self, lba: u64, buf: &mut [u8]) -> Result<()> {
        if self.container.is_none() {
            return Err(Error::NotOpen);
        }
        let bytes = self.geometry.sector_bytes as usize;
        let offset = self.sector_offset(lba, buf.len())?;
        let (container, _) = self.container.as_mut().ok_or(Error::NotOpen)?;
        container.read_bytes(offset, &mut buf[..bytes])
    }

    /// Write one sector from `buf`.
    ///
    /// All validation happens before the transfer is delegated, so a failed
    /// write leaves the backing store unmodified.
    pub fn write(&mut self, lba: u64, buf: &[u8]) -> Result<()> {
        if self.container.is_none() {
            return Err(Error::NotOpen);
        }
        if self.read_only {
            return Err(Error::WriteDenied);
        }
        let bytes = self.geometry.sector_bytes as usize;
        let offset = self.sector_offset(lba, buf.len())?;
        let (container, _) = self.container.as_mut().ok_or(Error::NotOpen)?;
        container.write_bytes(offset, &buf[..bytes])
    }

    /// Close the image, releasing an owned container and returning a
    /// borrowed one. Idempotent.
    pub fn close(&mut self) -> Option<Box<dyn HunkContainer>> {
        match self.container.take() {
            Some((container, false)) => Some(container),
            _ => None,
        }
    }

    fn sector_offset(&self, lba: u64, buf_len: usize) -> Result<u64> {
        let total = self.geometry.total_sectors();
        if lba >= total {
            return Err(Error::out_of_range(format!(
                "sector {} beyond disk end {}",
                lba, total
            )));
        }
        let bytes = self.geometry.sector_bytes as usize;
        if buf_len < bytes {
            return Err(Error::unsupported(format!(
                "buffer holds {} bytes, sector needs {}",
                buf_len, bytes
            )));
        }
        Ok(lba * bytes as u64)
    }
}
