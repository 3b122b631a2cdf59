//! Compressed-hunk container backed by the `chd` codec crate
//!
//! Decompression is hunk-at-a-time with a one-hunk cache; byte-range reads
//! are assembled from as many hunks as the range spans. The codec crate only
//! decodes, so this container is always read-only — writable containers are
//! uncompressed and come from a different [`HunkContainer`] implementation.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use chd::metadata::MetadataTag;
use chd::Chd;
use openchd_core::{AccessMode, Error, HunkContainer, Result};

/// An open compressed container file
pub struct ChdContainer {
    chd: Chd<BufReader<File>>,
    hunk_bytes: u32,
    logical_bytes: u64,
    version: u32,
    /// Decompressed contents of `cached_hunk`, always exactly one hunk long
    hunk_buf: Vec<u8>,
    cmp_buf: Vec<u8>,
    cached_hunk: Option<u32>,
}

impl ChdContainer {
    /// Open a compressed container from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Open` if the path cannot be opened or is not a valid
    /// container, and `Unsupported` for `ReadWrite` requests: compressed
    /// containers are never writable.
    pub fn open(path: &Path, mode: AccessMode) -> Result<Self> {
        if mode == AccessMode::ReadWrite {
            return Err(Error::unsupported(format!(
                "{}: compressed containers are read-only",
                path.display()
            )));
        }

        let file = File::open(path)
            .map_err(|e| Error::open(format!("{}: {}", path.display(), e)))?;
        let chd = Chd::open(BufReader::new(file), None)
            .map_err(|e| Error::open(format!("{}: not a valid container: {}", path.display(), e)))?;

        let header = chd.header();
        let hunk_bytes = header.hunk_size();
        let logical_bytes = header.logical_bytes();
        let version = header.version() as u32;
        let hunk_buf = chd.get_hunksized_buffer();

        tracing::debug!(
            path = %path.display(),
            version,
            hunk_bytes,
            logical_bytes,
            "opened compressed container"
        );

        Ok(Self {
            chd,
            hunk_bytes,
            logical_bytes,
            version,
            hunk_buf,
            cmp_buf: Vec::new(),
            cached_hunk: None,
        })
    }

    /// Decompress `index` into `hunk_buf`, reusing the cache when possible
    fn load_hunk(&mut self, index: u32) -> Result<()> {
        if self.cached_hunk == Some(index) {
            return Ok(());
        }
        self.cached_hunk = None;
        self.chd
            .hunk(index)
            .map_err(|e| chd_io_error(index, &e))?
            .read_hunk_in(&mut self.cmp_buf, &mut self.hunk_buf)
            .map_err(|e| chd_io_error(index, &e))?;
        self.cached_hunk = Some(index);
        Ok(())
    }
}

fn chd_io_error(hunk: u32, err: &chd::Error) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::Other,
        format!("hunk {} read failed: {}", hunk, err),
    ))
}

impl HunkContainer for ChdContainer {
    fn version(&self) -> u32 {
        self.version
    }

    fn hunk_bytes(&self) -> u32 {
        self.hunk_bytes
    }

    fn logical_bytes(&self) -> u64 {
        self.logical_bytes
    }

    fn metadata(&mut self, tag: u32) -> Result<Vec<String>> {
        // Collect the refs first, then read their contents through the raw
        // stream; reading while iterating trips the borrow checker.
        let refs: Vec<_> = self
            .chd
            .metadata_refs()
            .filter(|meta| meta.metatag() == tag)
            .collect();

        let mut entries = Vec::new();
        for meta in refs {
            match meta.read(self.chd.inner()) {
                Ok(data) => match String::from_utf8(data.value) {
                    Ok(text) => entries.push(text.trim_end_matches('\0').trim().to_string()),
                    Err(_) => {
                        tracing::warn!(tag, "ignoring non-text metadata entry");
                    }
                },
                Err(e) => {
                    tracing::warn!(tag, error = %e, "failed to read metadata entry");
                }
            }
        }
        Ok(entries)
    }

    fn read_bytes(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or_else(|| Error::out_of_range("byte offset overflow"))?;
        if end > self.logical_bytes {
            return Err(Error::out_of_range(format!(
                "read {}..{} beyond container end {}",
                offset, end, self.logical_bytes
            )));
        }

        let hunk_bytes = self.hunk_bytes as u64;
        let mut pos = offset;
        let mut done = 0;
        while done < buf.len() {
            let hunk = (pos / hunk_bytes) as u32;
            let in_hunk = (pos % hunk_bytes) as usize;
            let take = (hunk_bytes as usize - in_hunk).min(buf.len() - done);
            self.load_hunk(hunk)?;
            buf[done..done + take].copy_from_slice(&self.hunk_buf[in_hunk..in_hunk + take]);
            done += take;
            pos += take as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_missing_path_fails() {
        let err = ChdContainer::open(Path::new("/nonexistent/disc.chd"), AccessMode::ReadOnly)
            .err()
            .expect("open must fail");
        assert!(matches!(err, Error::Open(_)));
    }

    #[test]
    fn test_open_garbage_file_fails() {
        let mut temp = NamedTempFile::with_suffix(".chd").unwrap();
        temp.write_all(b"this is not a hunk container").unwrap();
        temp.flush().unwrap();

        let err = ChdContainer::open(temp.path(), AccessMode::ReadOnly)
            .err()
            .expect("open must fail");
        assert!(matches!(err, Error::Open(_)));
    }

    #[test]
    fn test_read_write_mode_rejected() {
        let temp = NamedTempFile::with_suffix(".chd").unwrap();
        let err = ChdContainer::open(temp.path(), AccessMode::ReadWrite)
            .err()
            .expect("writable open must fail");
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
