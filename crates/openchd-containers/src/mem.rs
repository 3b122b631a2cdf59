//! In-memory hunk container
//!
//! The uncompressed counterpart to [`ChdContainer`](crate::ChdContainer):
//! a flat byte buffer presented through the container trait, with text
//! metadata attached at construction time. This is the writable container
//! used by read-write hard-disk images, and the fixture container used by
//! the image tests, which can attach a drop probe to observe release.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use openchd_core::{Error, HunkContainer, Result};

/// An uncompressed, memory-backed container
pub struct MemContainer {
    data: Vec<u8>,
    hunk_bytes: u32,
    version: u32,
    writable: bool,
    metadata: Vec<(u32, String)>,
    drop_probe: Option<Arc<AtomicBool>>,
}

impl MemContainer {
    /// Create a read-only container over `data`, addressed in hunks of
    /// `hunk_bytes`
    pub fn new(hunk_bytes: u32, data: Vec<u8>) -> Self {
        Self {
            data,
            hunk_bytes,
            version: 5,
            writable: false,
            metadata: Vec::new(),
            drop_probe: None,
        }
    }

    /// Create a writable container of `size` zeroed bytes
    pub fn blank(hunk_bytes: u32, size: usize) -> Self {
        let mut container = Self::new(hunk_bytes, vec![0u8; size]);
        container.writable = true;
        container
    }

    /// Attach a text metadata entry under `tag`
    pub fn with_metadata(mut self, tag: u32, text: impl Into<String>) -> Self {
        self.metadata.push((tag, text.into()));
        self
    }

    /// Mark the container writable
    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    /// Override the reported container version
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Attach a flag that is raised when this container is dropped
    pub fn with_drop_probe(mut self, probe: Arc<AtomicBool>) -> Self {
        self.drop_probe = Some(probe);
        self
    }

    /// Direct view of the backing bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn check_range(&self, offset: u64, len: usize) -> Result<()> {
        let end = offset
            .checked_add(len as u64)
            .ok_or_else(|| Error::out_of_range("byte offset overflow"))?;
        if end > self.data.len() as u64 {
            return Err(Error::out_of_range(format!(
                "access {}..{} beyond container end {}",
                offset,
                end,
                self.data.len()
            )));
        }
        Ok(())
    }
}

impl HunkContainer for MemContainer {
    fn version(&self) -> u32 {
        self.version
    }

    fn hunk_bytes(&self) -> u32 {
        self.hunk_bytes
    }

    fn logical_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn metadata(&mut self, tag: u32) -> Result<Vec<String>> {
        Ok(self
            .metadata
            .iter()
            .filter(|(t, _)| *t == tag)
            .map(|(_, text)| text.clone())
            .collect())
    }

    fn read_bytes(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.check_range(offset, buf.len())?;
        let start = offset as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn write_bytes(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(Error::WriteDenied);
        }
        self.check_range(offset, buf.len())?;
        let start = offset as usize;
        self.data[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }
}

impl Drop for MemContainer {
    fn drop(&mut self) {
        if let Some(probe) = &self.drop_probe {
            probe.store(true, Ordering::SeqCst);
        }
    }
}
