//! CD-ROM image handle
//!
//! Binds a container (or a legacy raw image) to a parsed table of contents
//! and serves sector-data and subcode reads. Opening tries the compressed
//! container first and falls back to direct raw-image access; both backings
//! sit behind the same read surface.

use std::path::Path;

use openchd_core::{tags, AccessMode, Error, HunkContainer, Result};
use openchd_containers::ChdContainer;

use crate::legacy::LegacyDisc;
use crate::toc::{Addressing, DataFormat, Toc, Track, TrackType, FRAME_SIZE};

/// Sync pattern prefixed to synthesized raw sectors
const SYNC_PATTERN: [u8; 12] = [
    0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x00,
];

enum Backing {
    Container {
        container: Box<dyn HunkContainer>,
        owned: bool,
    },
    Legacy(LegacyDisc),
}

/// An open CD-ROM image
pub struct CdImage {
    backing: Option<Backing>,
    toc: Toc,
}

impl CdImage {
    /// Open a CD-ROM image from a path.
    ///
    /// The path is first opened as a compressed container; if that fails it
    /// is reopened as a legacy raw disc image. The error reports both
    /// rejections when neither works. A container opened here is owned by
    /// the image and released on close.
    pub fn open(path: &Path) -> Result<Self> {
        match ChdContainer::open(path, AccessMode::ReadOnly) {
            Ok(container) => Self::build(Box::new(container), true),
            Err(container_err) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %container_err,
                    "container open failed, falling back to raw image"
                );
                let (disc, toc) = LegacyDisc::open(path).map_err(|raw_err| {
                    Error::open(format!(
                        "{}: not a container ({}); not a raw disc image ({})",
                        path.display(),
                        container_err,
                        raw_err
                    ))
                })?;
                Ok(Self {
                    backing: Some(Backing::Legacy(disc)),
                    toc,
                })
            }
        }
    }

    /// Build a CD-ROM image over an already-open container.
    ///
    /// The container is borrowed: [`close`](Self::close) hands it back to
    /// the caller instead of dropping it. If construction fails the
    /// container is consumed and released.
    pub fn from_container(container: Box<dyn HunkContainer>) -> Result<Self> {
        Self::build(container, false)
    }

    fn build(mut container: Box<dyn HunkContainer>, owned: bool) -> Result<Self> {
        // On any error below the container box is dropped right here, so a
        // failed construction never leaks an open container.
        let toc = parse_toc(container.as_mut())?;
        tracing::debug!(
            tracks = toc.track_count(),
            gdrom = toc.is_gdrom(),
            "parsed table of contents"
        );
        Ok(Self {
            backing: Some(Backing::Container { container, owned }),
            toc,
        })
    }

    /// The table of contents, valid while the image is open
    pub fn toc(&self) -> Result<&Toc> {
        if self.backing.is_none() {
            return Err(Error::NotOpen);
        }
        Ok(&self.toc)
    }

    /// Container format version, or `None` for legacy images and closed
    /// handles
    pub fn version(&self) -> Option<u32> {
        match &self.backing {
            Some(Backing::Container { container, .. }) => Some(container.version()),
            _ => None,
        }
    }

    /// Read one sector's data into `buf`, converting between the track's
    /// stored encoding and the requested format where possible.
    ///
    /// `buf` must hold the full converted size. Raw sectors synthesized
    /// from cooked Mode 1 data carry a valid sync and BCD MSF header; the
    /// ECC area is zeroed, not regenerated.
    pub fn read_data(
        &mut self,
        lba: u32,
        buf: &mut [u8],
        format: DataFormat,
        addressing: Addressing,
    ) -> Result<()> {
        let (track, chd_frame) = self.locate(lba, addressing)?;
        let stored = track.track_type;

        // Native read: the caller either asked for the stored encoding or
        // does not care.
        if format == DataFormat::RawDontCare || format == DataFormat::from(stored) {
            let len = track.data_size as usize;
            check_buffer(buf, len)?;
            self.read_frame(chd_frame, 0, &mut buf[..len])?;
            if stored == TrackType::Audio && self.toc.flags() & Toc::FLAG_GDROM_LE != 0 {
                // Legacy GD-ROM audio is stored little-endian; present it
                // big-endian like every other source.
                for pair in buf[..len].chunks_exact_mut(2) {
                    pair.swap(0, 1);
                }
            }
            return Ok(());
        }

        match (format, stored) {
            // 2048 bytes of Mode 1 out of a raw sector: skip sync + header
            (DataFormat::Mode1, TrackType::Mode1Raw) => {
                check_buffer(buf, 2048)?;
                self.read_frame(chd_frame, 16, &mut buf[..2048])
            }
            // Mode 2 form 1 already stores the 2048 user bytes
            (DataFormat::Mode1, TrackType::Mode2Form1) => {
                check_buffer(buf, 2048)?;
                self.read_frame(chd_frame, 0, &mut buf[..2048])
            }
            // Skip sync, header and subheader of a raw Mode 2 sector
            (DataFormat::Mode1, TrackType::Mode2Raw) => {
                check_buffer(buf, 2048)?;
                self.read_frame(chd_frame, 24, &mut buf[..2048])
            }
            // 2336-byte Mode 2 payload out of either raw encoding
            (DataFormat::Mode2, TrackType::Mode1Raw | TrackType::Mode2Raw) => {
                check_buffer(buf, 2336)?;
                self.read_frame(chd_frame, 16, &mut buf[..2336])
            }
            // Rebuild a raw sector around cooked Mode 1 data
            (DataFormat::Mode1Raw, TrackType::Mode1) => {
                check_buffer(buf, 2352)?;
                buf[..12].copy_from_slice(&SYNC_PATTERN);
                let msf = lba_to_msf(lba + 150);
                buf[12] = (msf >> 16) as u8;
                buf[13] = (msf >> 8) as u8;
                buf[14] = msf as u8;
                buf[15] = 1;
                self.read_frame(chd_frame, 0, &mut buf[16..2064])?;
                buf[2064..2352].fill(0);
                Ok(())
            }
            _ => Err(Error::unsupported_conversion(format!(
                "cannot produce {:?} from a {} track",
                format,
                stored.as_str()
            ))),
        }
    }

    /// Read one sector's subchannel data into `buf`.
    ///
    /// Tracks without stored subchannel data report [`Error::NoSubcode`];
    /// callers that want a blank pattern instead can fill on that error.
    pub fn read_subcode(&mut self, lba: u32, buf: &mut [u8], addressing: Addressing) -> Result<()> {
        let (track, chd_frame) = self.locate(lba, addressing)?;
        if track.sub_size == 0 {
            return Err(Error::NoSubcode);
        }
        let len = track.sub_size as usize;
        check_buffer(buf, len)?;
        self.read_frame(chd_frame, track.data_size as usize, &mut buf[..len])
    }

    /// Close the image, releasing an owned container and returning a
    /// borrowed one. Idempotent: later calls (and later reads) see a
    /// closed handle.
    pub fn close(&mut self) -> Option<Box<dyn HunkContainer>> {
        match self.backing.take() {
            Some(Backing::Container {
                container,
                owned: false,
            }) => Some(container),
            // Owned containers and legacy files are dropped here
            _ => None,
        }
    }

    fn locate(&self, lba: u32, addressing: Addressing) -> Result<(Track, u32)> {
        if self.backing.is_none() {
            return Err(Error::NotOpen);
        }
        let (index, chd_frame) = self.toc.resolve(lba, addressing).ok_or_else(|| {
            Error::out_of_range(format!("frame {} outside the table of contents", lba))
        })?;
        Ok((self.toc.tracks()[index], chd_frame))
    }

    /// Copy bytes from a stored frame. Container frames are laid out as
    /// fixed 2448-byte units; legacy frames are exactly data + subcode.
    fn read_frame(&mut self, chd_frame: u32, offset: usize, buf: &mut [u8]) -> Result<()> {
        match self.backing.as_mut().ok_or(Error::NotOpen)? {
            Backing::Container { container, .. } => {
                let pos = chd_frame as u64 * FRAME_SIZE as u64 + offset as u64;
                container.read_bytes(pos, buf)
            }
            Backing::Legacy(disc) => disc.read(chd_frame, offset, buf),
        }
    }
}

fn check_buffer(buf: &[u8], len: usize) -> Result<()> {
    if buf.len() < len {
        return Err(Error::unsupported(format!(
            "destination buffer holds {} bytes, sector needs {}",
            buf.len(),
            len
        )));
    }
    Ok(())
}

/// Pack an LBA into BCD minutes/seconds/frames
fn lba_to_msf(lba: u32) -> u32 {
    let m = lba / (60 * 75);
    let rem = lba % (60 * 75);
    let s = rem / 75;
    let f = rem % 75;
    ((m / 10) << 20)
        | ((m % 10) << 16)
        | ((s / 10) << 12)
        | ((s % 10) << 8)
        | ((f / 10) << 4)
        | (f % 10)
}

/// Parse the table of contents from container track metadata.
///
/// The metadata tags are tried newest-first; the GD-ROM tags set the disc
/// flags as a side effect of matching.
fn parse_toc(container: &mut dyn HunkContainer) -> Result<Toc> {
    let mut entries = container.metadata(tags::CD_TRACK_V2)?;
    let mut flags = 0;

    if entries.is_empty() {
        entries = container.metadata(tags::CD_TRACK)?;
    }
    if entries.is_empty() {
        entries = container.metadata(tags::GD_TRACK)?;
        if !entries.is_empty() {
            flags = Toc::FLAG_GDROM;
        }
    }
    if entries.is_empty() {
        entries = container.metadata(tags::GD_TRACK_OLD)?;
        if !entries.is_empty() {
            flags = Toc::FLAG_GDROM | Toc::FLAG_GDROM_LE;
        }
    }
    if entries.is_empty() {
        return Err(Error::metadata("container has no CD track metadata"));
    }

    Toc::from_metadata(&entries, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openchd_containers::MemContainer;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tempfile::NamedTempFile;

    const HUNK: u32 = FRAME_SIZE * 8;

    /// Two-track container: 8 frames of Mode 1 raw data, 4 frames of audio.
    /// Frame bytes encode (track, frame) so reads can be traced back.
    fn two_track_container() -> MemContainer {
        let mut data = Vec::new();
        for frame in 0..8u8 {
            let mut sector = vec![0u8; FRAME_SIZE as usize];
            sector[..12].copy_from_slice(&SYNC_PATTERN);
            sector[15] = 1;
            sector[16..2352].fill(0x10 + frame);
            sector[2352..].fill(0xA0 + frame); // subchannel bytes
            data.extend_from_slice(&sector);
        }
        for frame in 0..4u8 {
            let mut sector = vec![0u8; FRAME_SIZE as usize];
            sector[..2352].fill(0x50 + frame);
            data.extend_from_slice(&sector);
        }
        MemContainer::new(HUNK, data)
            .with_metadata(
                tags::CD_TRACK_V2,
                "TRACK:1 TYPE:MODE1_RAW SUBTYPE:RW FRAMES:8 PREGAP:0 PGTYPE:MODE1 PGSUB:NONE POSTGAP:0",
            )
            .with_metadata(
                tags::CD_TRACK_V2,
                "TRACK:2 TYPE:AUDIO SUBTYPE:NONE FRAMES:4 PREGAP:0 PGTYPE:AUDIO PGSUB:NONE POSTGAP:0",
            )
    }

    #[test]
    fn test_open_missing_path_is_open_error() {
        let err = CdImage::open(Path::new("/nonexistent/disc.chd"))
            .err()
            .expect("open must fail");
        assert!(matches!(err, Error::Open(_)));
    }

    #[test]
    fn test_two_tracks_with_raw_and_subcode() {
        let mut image = CdImage::from_container(Box::new(two_track_container())).unwrap();

        let toc = image.toc().unwrap();
        assert_eq!(toc.track_count(), 2);
        assert_eq!(toc.tracks()[0].sub_size, 96);
        assert_eq!(toc.tracks()[1].sub_size, 0);
        assert_eq!(toc.tracks()[1].log_frame_ofs, 8);

        // Track 1, frame 0: native raw sector
        let mut buf = [0u8; 2352];
        image
            .read_data(0, &mut buf, DataFormat::RawDontCare, Addressing::Logical)
            .unwrap();
        assert_eq!(buf[..12], SYNC_PATTERN);
        assert_eq!(buf[16], 0x10);

        // First frame of track 2: audio encoding
        image
            .read_data(8, &mut buf, DataFormat::RawDontCare, Addressing::Logical)
            .unwrap();
        assert!(buf[..2352].iter().all(|&b| b == 0x50));
    }

    #[test]
    fn test_two_tracks_with_different_sector_sizes() {
        // Cooked 2048-byte track followed by a 2352-byte audio track;
        // each native read returns its own track's sector size.
        let mut data = Vec::new();
        for frame in 0..4u8 {
            let mut sector = vec![0u8; FRAME_SIZE as usize];
            sector[..2048].fill(0x20 + frame);
            data.extend_from_slice(&sector);
        }
        for frame in 0..4u8 {
            let mut sector = vec![0u8; FRAME_SIZE as usize];
            sector[..2352].fill(0x60 + frame);
            data.extend_from_slice(&sector);
        }
        let container = MemContainer::new(HUNK, data)
            .with_metadata(tags::CD_TRACK_V2, "TRACK:1 TYPE:MODE1 SUBTYPE:NONE FRAMES:4")
            .with_metadata(tags::CD_TRACK_V2, "TRACK:2 TYPE:AUDIO SUBTYPE:NONE FRAMES:4");
        let mut image = CdImage::from_container(Box::new(container)).unwrap();

        let toc = image.toc().unwrap();
        assert_eq!(toc.tracks()[0].data_size, 2048);
        assert_eq!(toc.tracks()[1].data_size, 2352);

        let mut cooked = [0xFFu8; 2352];
        image
            .read_data(0, &mut cooked, DataFormat::RawDontCare, Addressing::Logical)
            .unwrap();
        assert!(cooked[..2048].iter().all(|&b| b == 0x20));
        // Only the track's own sector size is written
        assert!(cooked[2048..].iter().all(|&b| b == 0xFF));

        let mut audio = [0u8; 2352];
        image
            .read_data(4, &mut audio, DataFormat::RawDontCare, Addressing::Logical)
            .unwrap();
        assert!(audio.iter().all(|&b| b == 0x60));
    }

    #[test]
    fn test_cooked_read_from_raw_track() {
        let mut image = CdImage::from_container(Box::new(two_track_container())).unwrap();

        let mut buf = [0u8; 2048];
        image
            .read_data(2, &mut buf, DataFormat::Mode1, Addressing::Logical)
            .unwrap();
        // Sync and header were skipped
        assert!(buf.iter().all(|&b| b == 0x12));
    }

    #[test]
    fn test_unsupported_conversion_reported() {
        let mut image = CdImage::from_container(Box::new(two_track_container())).unwrap();

        let mut buf = [0u8; 2352];
        let err = image
            .read_data(8, &mut buf, DataFormat::Mode1, Addressing::Logical)
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedConversion(_)));
    }

    #[test]
    fn test_raw_sector_synthesized_from_cooked_track() {
        let mut data = vec![0u8; FRAME_SIZE as usize * 4];
        for frame in 0..4 {
            data[frame * FRAME_SIZE as usize..][..2048].fill(0x20 + frame as u8);
        }
        let container = MemContainer::new(HUNK, data).with_metadata(
            tags::CD_TRACK_V2,
            "TRACK:1 TYPE:MODE1 SUBTYPE:NONE FRAMES:4",
        );
        let mut image = CdImage::from_container(Box::new(container)).unwrap();

        let mut buf = [0u8; 2352];
        image
            .read_data(3, &mut buf, DataFormat::Mode1Raw, Addressing::Logical)
            .unwrap();
        assert_eq!(buf[..12], SYNC_PATTERN);
        // LBA 3 + the 150-frame offset = 00:02:03 in BCD
        assert_eq!(&buf[12..16], &[0x00, 0x02, 0x03, 0x01]);
        assert!(buf[16..2064].iter().all(|&b| b == 0x23));
        assert!(buf[2064..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_subcode_read_and_no_subcode() {
        let mut image = CdImage::from_container(Box::new(two_track_container())).unwrap();

        let mut sub = [0u8; 96];
        image
            .read_subcode(1, &mut sub, Addressing::Logical)
            .unwrap();
        assert!(sub.iter().all(|&b| b == 0xA1));

        // Track 2 stores no subchannel data: distinct error, not a fill
        let err = image
            .read_subcode(8, &mut sub, Addressing::Logical)
            .unwrap_err();
        assert!(matches!(err, Error::NoSubcode));
    }

    #[test]
    fn test_out_of_range_read_fails_cleanly() {
        let mut image = CdImage::from_container(Box::new(two_track_container())).unwrap();
        let mut buf = [0u8; 2352];
        let err = image
            .read_data(12, &mut buf, DataFormat::RawDontCare, Addressing::Logical)
            .unwrap_err();
        assert!(matches!(err, Error::OutOfRange(_)));
    }

    #[test]
    fn test_physical_addressing_matches_logical_without_gaps() {
        let mut image = CdImage::from_container(Box::new(two_track_container())).unwrap();
        let mut log = [0u8; 2352];
        let mut phys = [0u8; 2352];
        image
            .read_data(9, &mut log, DataFormat::RawDontCare, Addressing::Logical)
            .unwrap();
        image
            .read_data(9, &mut phys, DataFormat::RawDontCare, Addressing::Physical)
            .unwrap();
        assert_eq!(log, phys);
    }

    #[test]
    fn test_gdrom_legacy_audio_byteswapped() {
        let mut data = vec![0u8; FRAME_SIZE as usize];
        for pair in data[..2352].chunks_exact_mut(2) {
            pair[0] = 0x34;
            pair[1] = 0x12;
        }
        let container = MemContainer::new(HUNK, data).with_metadata(
            tags::GD_TRACK_OLD,
            "TRACK:1 TYPE:AUDIO SUBTYPE:NONE FRAMES:1 PAD:0",
        );
        let mut image = CdImage::from_container(Box::new(container)).unwrap();
        assert!(image.toc().unwrap().is_gdrom());

        let mut buf = [0u8; 2352];
        image
            .read_data(0, &mut buf, DataFormat::Audio, Addressing::Logical)
            .unwrap();
        assert_eq!(&buf[..2], &[0x12, 0x34]);
    }

    #[test]
    fn test_container_released_when_construction_fails() {
        let probe = Arc::new(AtomicBool::new(false));
        // No track metadata: TOC parsing must fail
        let container = MemContainer::new(HUNK, Vec::new()).with_drop_probe(Arc::clone(&probe));

        let err = CdImage::from_container(Box::new(container))
            .err()
            .expect("construction must fail");
        assert!(matches!(err, Error::Metadata(_)));
        assert!(probe.load(Ordering::SeqCst), "container must be released");
    }

    #[test]
    fn test_close_is_idempotent_and_invalidates_handle() {
        let probe = Arc::new(AtomicBool::new(false));
        let container = two_track_container().with_drop_probe(Arc::clone(&probe));
        let mut image = CdImage::from_container(Box::new(container)).unwrap();

        // Borrowed container comes back on the first close only
        let returned = image.close();
        assert!(returned.is_some());
        assert!(image.close().is_none());
        assert!(!probe.load(Ordering::SeqCst));

        assert!(matches!(image.toc().unwrap_err(), Error::NotOpen));
        let mut buf = [0u8; 2352];
        let err = image
            .read_data(0, &mut buf, DataFormat::RawDontCare, Addressing::Logical)
            .unwrap_err();
        assert!(matches!(err, Error::NotOpen));
        assert_eq!(image.version(), None);

        drop(returned);
        assert!(probe.load(Ordering::SeqCst));
    }

    #[test]
    fn test_legacy_image_version_is_none() {
        let mut temp = NamedTempFile::with_suffix(".iso").unwrap();
        temp.write_all(&vec![0xEEu8; 2048 * 2]).unwrap();
        temp.flush().unwrap();

        let mut image = CdImage::open(temp.path()).unwrap();
        assert_eq!(image.version(), None);

        let mut buf = [0u8; 2048];
        image
            .read_data(1, &mut buf, DataFormat::RawDontCare, Addressing::Logical)
            .unwrap();
        assert!(buf.iter().all(|&b| b == 0xEE));
    }

    #[test]
    fn test_container_version_reported() {
        let container = two_track_container().with_version(5);
        let image = CdImage::from_container(Box::new(container)).unwrap();
        assert_eq!(image.version(), Some(5));
    }

    #[test]
    fn test_lba_to_msf_packing() {
        assert_eq!(lba_to_msf(0), 0x000000);
        // 150 frames = 2 seconds
        assert_eq!(lba_to_msf(150), 0x000200);
        // 1 minute, 2 seconds, 3 frames
        assert_eq!(lba_to_msf(60 * 75 + 2 * 75 + 3), 0x010203);
    }
}
