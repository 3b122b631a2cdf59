//! Legacy raw disc images
//!
//! Fallback backing for CD images that are not wrapped in a compressed
//! container: a plain sector dump on disk. The layout is inferred from the
//! file's structure alone, so a raw image always presents a single track.
//! Division by 2048 is tried first (cooked data), then 2352 (raw sectors),
//! then 2448 (raw sectors with subchannel data); raw candidates are told
//! apart from audio by the 12-byte sync pattern of the first sector.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use openchd_core::{Error, Result};

use crate::toc::{SubType, Toc, Track, TrackType};

/// Sync pattern opening every raw data sector
const SYNC_PATTERN: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

/// A raw disc image opened without a container
pub struct LegacyDisc {
    file: File,
    frame_bytes: u32,
}

impl LegacyDisc {
    /// Open a raw image and infer its single-track table of contents
    pub fn open(path: &Path) -> Result<(Self, Toc)> {
        let mut file =
            File::open(path).map_err(|e| Error::open(format!("{}: {}", path.display(), e)))?;
        let len = file.metadata()?.len();
        if len == 0 {
            return Err(Error::open(format!("{}: file is empty", path.display())));
        }

        let (track_type, sub_type) = infer_layout(&mut file, len)?;
        let frame_bytes = track_type.data_size() + sub_type.sub_size();
        let frames = (len / frame_bytes as u64) as u32;

        tracing::debug!(
            path = %path.display(),
            track_type = track_type.as_str(),
            sub_type = sub_type.as_str(),
            frames,
            "opened raw disc image"
        );

        let toc = Toc::from_tracks(vec![Track::new(track_type, sub_type, frames)], 0)?;
        Ok((Self { file, frame_bytes }, toc))
    }

    /// Read `buf.len()` bytes from `offset` bytes into stored frame `frame`
    pub fn read(&mut self, frame: u32, offset: usize, buf: &mut [u8]) -> Result<()> {
        let pos = frame as u64 * self.frame_bytes as u64 + offset as u64;
        self.file.seek(SeekFrom::Start(pos))?;
        self.file.read_exact(buf)?;
        Ok(())
    }
}

fn infer_layout(file: &mut File, len: u64) -> Result<(TrackType, SubType)> {
    if len % 2048 == 0 {
        return Ok((TrackType::Mode1, SubType::None));
    }

    for (frame_bytes, sub_type) in [(2352u64, SubType::None), (2448, SubType::Raw)] {
        if len % frame_bytes != 0 {
            continue;
        }
        let mut head = [0u8; 16];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut head)?;
        if head[..12] != SYNC_PATTERN {
            return Ok((TrackType::Audio, sub_type));
        }
        return match head[15] {
            1 => Ok((TrackType::Mode1Raw, sub_type)),
            2 => Ok((TrackType::Mode2Raw, sub_type)),
            mode => Err(Error::open(format!("unsupported sector mode {}", mode))),
        };
    }

    Err(Error::open(format!(
        "file length {} does not match any known sector layout",
        len
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn raw_sector(mode: u8) -> Vec<u8> {
        let mut sector = vec![0u8; 2352];
        sector[..12].copy_from_slice(&SYNC_PATTERN);
        sector[15] = mode;
        sector
    }

    #[test]
    fn test_infer_cooked_mode1_from_size() {
        let mut temp = NamedTempFile::with_suffix(".iso").unwrap();
        temp.write_all(&vec![0u8; 2048 * 4]).unwrap();
        temp.flush().unwrap();

        let (_, toc) = LegacyDisc::open(temp.path()).unwrap();
        assert_eq!(toc.track_count(), 1);
        let track = &toc.tracks()[0];
        assert_eq!(track.track_type, TrackType::Mode1);
        assert_eq!(track.sub_type, SubType::None);
        assert_eq!(track.frames, 4);
    }

    #[test]
    fn test_infer_raw_mode1_from_sync_pattern() {
        let mut temp = NamedTempFile::with_suffix(".bin").unwrap();
        for _ in 0..3 {
            temp.write_all(&raw_sector(1)).unwrap();
        }
        temp.flush().unwrap();

        let (_, toc) = LegacyDisc::open(temp.path()).unwrap();
        assert_eq!(toc.tracks()[0].track_type, TrackType::Mode1Raw);
        assert_eq!(toc.tracks()[0].frames, 3);
    }

    #[test]
    fn test_infer_raw_mode2_from_mode_byte() {
        let mut temp = NamedTempFile::with_suffix(".bin").unwrap();
        temp.write_all(&raw_sector(2)).unwrap();
        temp.flush().unwrap();

        let (_, toc) = LegacyDisc::open(temp.path()).unwrap();
        assert_eq!(toc.tracks()[0].track_type, TrackType::Mode2Raw);
    }

    #[test]
    fn test_infer_audio_without_sync_pattern() {
        let mut temp = NamedTempFile::with_suffix(".bin").unwrap();
        temp.write_all(&vec![0x55u8; 2352 * 2]).unwrap();
        temp.flush().unwrap();

        let (_, toc) = LegacyDisc::open(temp.path()).unwrap();
        assert_eq!(toc.tracks()[0].track_type, TrackType::Audio);
        assert_eq!(toc.tracks()[0].sub_type, SubType::None);
    }

    #[test]
    fn test_infer_subchannel_from_2448_frames() {
        let mut temp = NamedTempFile::with_suffix(".raw").unwrap();
        let mut frame = raw_sector(1);
        frame.extend_from_slice(&[0u8; 96]);
        temp.write_all(&frame).unwrap();
        temp.flush().unwrap();

        let (_, toc) = LegacyDisc::open(temp.path()).unwrap();
        assert_eq!(toc.tracks()[0].track_type, TrackType::Mode1Raw);
        assert_eq!(toc.tracks()[0].sub_type, SubType::Raw);
        assert_eq!(toc.tracks()[0].sub_size, 96);
    }

    #[test]
    fn test_unrecognized_length_rejected() {
        let mut temp = NamedTempFile::with_suffix(".bin").unwrap();
        temp.write_all(&[0u8; 1000]).unwrap();
        temp.flush().unwrap();

        let err = LegacyDisc::open(temp.path()).err().expect("open must fail");
        assert!(matches!(err, Error::Open(_)));
    }

    #[test]
    fn test_empty_file_rejected() {
        let temp = NamedTempFile::with_suffix(".bin").unwrap();
        let err = LegacyDisc::open(temp.path()).err().expect("open must fail");
        assert!(matches!(err, Error::Open(_)));
    }
}
