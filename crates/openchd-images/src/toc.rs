//! Table-of-contents model and frame addressing
//!
//! A disc's layout is an ordered list of [`Track`]s. Each track knows its
//! sector encoding, subchannel format and frame counts; per-track byte sizes
//! are always derived from the `(TrackType, SubType)` pair, never stored
//! independently. Three frame-address spaces coexist:
//!
//! - **logical**: gap-adjusted addressing, as a drive presents it
//! - **physical**: stored frames in track order, no container padding
//! - **container**: stored frames including the per-track container padding
//!
//! The offset pass computes all three per track; [`Toc::resolve`] translates
//! a logical or physical address into `(track index, container frame)`.

use openchd_core::{Error, Result};

/// Hard maximum number of tracks on a disc
pub const MAX_TRACKS: usize = 99;
/// Largest sector data payload (raw 2352-byte sector)
pub const MAX_SECTOR_DATA: u32 = 2352;
/// Subchannel data per sector
pub const MAX_SUBCODE_DATA: u32 = 96;
/// One stored frame: sector data followed by subchannel data
pub const FRAME_SIZE: u32 = MAX_SECTOR_DATA + MAX_SUBCODE_DATA;
/// Frames per container hunk for CD layouts
pub const FRAMES_PER_HUNK: u32 = 8;
/// Tracks in a container are padded to a multiple of this many frames
pub const TRACK_PADDING: u32 = 4;

/// Sector encoding of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackType {
    /// Mode 1, 2048 bytes/sector
    Mode1,
    /// Mode 1 raw, 2352 bytes/sector
    Mode1Raw,
    /// Mode 2, 2336 bytes/sector
    Mode2,
    /// Mode 2 form 1, 2048 bytes/sector
    Mode2Form1,
    /// Mode 2 form 2, 2324 bytes/sector
    Mode2Form2,
    /// Mode 2 mixed forms, 2336 bytes/sector
    Mode2FormMix,
    /// Mode 2 raw, 2352 bytes/sector
    Mode2Raw,
    /// Redbook audio, 2352 bytes/sector (588 samples)
    Audio,
}

impl TrackType {
    /// Data bytes per sector for this encoding
    pub fn data_size(self) -> u32 {
        match self {
            TrackType::Mode1 => 2048,
            TrackType::Mode1Raw => 2352,
            TrackType::Mode2 => 2336,
            TrackType::Mode2Form1 => 2048,
            TrackType::Mode2Form2 => 2324,
            TrackType::Mode2FormMix => 2336,
            TrackType::Mode2Raw => 2352,
            TrackType::Audio => 2352,
        }
    }

    /// Parse a metadata type string; both the canonical and the slashed
    /// spellings are stored in the wild
    pub fn from_metadata(s: &str) -> Option<Self> {
        match s {
            "MODE1" | "MODE1/2048" => Some(TrackType::Mode1),
            "MODE1_RAW" | "MODE1/2352" => Some(TrackType::Mode1Raw),
            "MODE2" | "MODE2/2336" => Some(TrackType::Mode2),
            "MODE2_FORM1" | "MODE2/2048" => Some(TrackType::Mode2Form1),
            "MODE2_FORM2" | "MODE2/2324" => Some(TrackType::Mode2Form2),
            "MODE2_FORM_MIX" => Some(TrackType::Mode2FormMix),
            "MODE2_RAW" | "MODE2/2352" => Some(TrackType::Mode2Raw),
            "AUDIO" => Some(TrackType::Audio),
            _ => None,
        }
    }

    /// Canonical metadata spelling
    pub fn as_str(self) -> &'static str {
        match self {
            TrackType::Mode1 => "MODE1",
            TrackType::Mode1Raw => "MODE1_RAW",
            TrackType::Mode2 => "MODE2",
            TrackType::Mode2Form1 => "MODE2_FORM1",
            TrackType::Mode2Form2 => "MODE2_FORM2",
            TrackType::Mode2FormMix => "MODE2_FORM_MIX",
            TrackType::Mode2Raw => "MODE2_RAW",
            TrackType::Audio => "AUDIO",
        }
    }
}

/// Subchannel format of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubType {
    /// Cooked, 96 bytes per sector
    Normal,
    /// Raw uninterleaved, 96 bytes per sector
    Raw,
    /// No subchannel data stored
    None,
}

impl SubType {
    /// Subchannel bytes per sector for this format
    pub fn sub_size(self) -> u32 {
        match self {
            SubType::Normal | SubType::Raw => 96,
            SubType::None => 0,
        }
    }

    /// Parse a metadata subtype string; anything unrecognized means no
    /// subchannel data
    pub fn from_metadata(s: &str) -> Self {
        match s {
            "RW" => SubType::Normal,
            "RW_RAW" => SubType::Raw,
            _ => SubType::None,
        }
    }

    /// Canonical metadata spelling
    pub fn as_str(self) -> &'static str {
        match self {
            SubType::Normal => "RW",
            SubType::Raw => "RW_RAW",
            SubType::None => "NONE",
        }
    }
}

/// Which frame-address space a caller-supplied address lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// Gap-adjusted addressing, as a drive presents it
    Logical,
    /// Stored-frame addressing, relative to the container data
    Physical,
}

/// Requested interpretation for a sector data read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Mode1,
    Mode1Raw,
    Mode2,
    Mode2Form1,
    Mode2Form2,
    Mode2FormMix,
    Mode2Raw,
    Audio,
    /// Return the track's stored encoding unconverted
    RawDontCare,
}

impl From<TrackType> for DataFormat {
    fn from(t: TrackType) -> Self {
        match t {
            TrackType::Mode1 => DataFormat::Mode1,
            TrackType::Mode1Raw => DataFormat::Mode1Raw,
            TrackType::Mode2 => DataFormat::Mode2,
            TrackType::Mode2Form1 => DataFormat::Mode2Form1,
            TrackType::Mode2Form2 => DataFormat::Mode2Form2,
            TrackType::Mode2FormMix => DataFormat::Mode2FormMix,
            TrackType::Mode2Raw => DataFormat::Mode2Raw,
            TrackType::Audio => DataFormat::Audio,
        }
    }
}

/// One entry in the table of contents
#[derive(Debug, Clone, Copy)]
pub struct Track {
    /// Sector encoding
    pub track_type: TrackType,
    /// Subchannel format
    pub sub_type: SubType,
    /// Data bytes per sector, derived from `track_type`
    pub data_size: u32,
    /// Subchannel bytes per sector, derived from `sub_type`
    pub sub_size: u32,
    /// Frames of real data in this track
    pub frames: u32,
    /// Spillage frames padding the track to the container boundary
    pub extra_frames: u32,
    /// Pregap frames before the track data
    pub pregap: u32,
    /// Postgap frames after the track data
    pub postgap: u32,
    /// Sector encoding inside the pregap
    pub pregap_type: TrackType,
    /// Subchannel format inside the pregap
    pub pregap_sub: SubType,
    /// Data bytes per pregap sector; nonzero only when the pregap is
    /// physically stored
    pub pregap_data_size: u32,
    /// Subchannel bytes per pregap sector
    pub pregap_sub_size: u32,
    /// Authoring-time padding frames (GD-ROM), not part of addressing
    pub pad_frames: u32,
    /// First logical frame of the track data
    pub log_frame_ofs: u32,
    /// First physical frame of the track data
    pub phys_frame_ofs: u32,
    /// First container frame of the track data
    pub chd_frame_ofs: u32,
}

impl Track {
    /// Create a track of `frames` sectors; byte sizes follow from the types
    pub fn new(track_type: TrackType, sub_type: SubType, frames: u32) -> Self {
        Self {
            track_type,
            sub_type,
            data_size: track_type.data_size(),
            sub_size: sub_type.sub_size(),
            frames,
            extra_frames: 0,
            pregap: 0,
            postgap: 0,
            pregap_type: TrackType::Mode1,
            pregap_sub: SubType::None,
            pregap_data_size: 0,
            pregap_sub_size: 0,
            pad_frames: 0,
            log_frame_ofs: 0,
            phys_frame_ofs: 0,
            chd_frame_ofs: 0,
        }
    }
}

/// The table of contents: track list plus disc-level flags
#[derive(Debug, Clone)]
pub struct Toc {
    tracks: Vec<Track>,
    flags: u32,
    log_frames: u32,
    phys_frames: u32,
    chd_frames: u32,
}

impl Toc {
    /// Disc is a GD-ROM layout
    pub const FLAG_GDROM: u32 = 0x0000_0001;
    /// Legacy GD-ROM with little-endian audio data
    pub const FLAG_GDROM_LE: u32 = 0x0000_0002;

    /// Build a TOC from an already-populated track list.
    ///
    /// Used for raw images whose layout was inferred rather than read from
    /// container metadata; no container padding is applied.
    pub fn from_tracks(tracks: Vec<Track>, flags: u32) -> Result<Self> {
        if tracks.is_empty() {
            return Err(Error::metadata("table of contents has no tracks"));
        }
        if tracks.len() > MAX_TRACKS {
            return Err(Error::metadata(format!(
                "{} tracks exceeds the {} track limit",
                tracks.len(),
                MAX_TRACKS
            )));
        }
        let mut toc = Self {
            tracks,
            flags,
            log_frames: 0,
            phys_frames: 0,
            chd_frames: 0,
        };
        toc.assign_offsets();
        Ok(toc)
    }

    /// Build a TOC from container track-metadata entries.
    ///
    /// Entries may be stored in any order; they are sorted by track number
    /// once at population time and must then form a contiguous 1..=n run.
    /// Container tracks are padded to [`TRACK_PADDING`], recorded as
    /// `extra_frames`.
    pub fn from_metadata(entries: &[String], flags: u32) -> Result<Self> {
        let mut numbered = Vec::with_capacity(entries.len());
        for entry in entries {
            numbered.push(parse_track_entry(entry)?);
        }
        numbered.sort_by_key(|(number, _)| *number);

        let mut tracks = Vec::with_capacity(numbered.len());
        for (index, (number, mut track)) in numbered.into_iter().enumerate() {
            if number as usize != index + 1 {
                return Err(Error::metadata(format!(
                    "track numbers are not contiguous: expected {}, found {}",
                    index + 1,
                    number
                )));
            }
            let padded = track.frames.div_ceil(TRACK_PADDING) * TRACK_PADDING;
            track.extra_frames = padded - track.frames;
            tracks.push(track);
        }
        Self::from_tracks(tracks, flags)
    }

    /// Compute logical/physical/container frame offsets for every track.
    ///
    /// Logical offsets skip pregaps that are not physically stored; a stored
    /// pregap instead shifts the track's data start past its own frames.
    /// Container offsets additionally consume the per-track padding.
    fn assign_offsets(&mut self) {
        let mut log_ofs = 0u32;
        let mut phys_ofs = 0u32;
        let mut chd_ofs = 0u32;
        for track in &mut self.tracks {
            track.log_frame_ofs = if track.pregap_data_size == 0 {
                log_ofs += track.pregap;
                log_ofs
            } else {
                log_ofs + track.pregap
            };
            track.phys_frame_ofs = phys_ofs;
            track.chd_frame_ofs = chd_ofs;

            log_ofs += track.frames + track.postgap;
            phys_ofs += track.frames;
            chd_ofs += track.frames + track.extra_frames;
        }
        self.log_frames = log_ofs;
        self.phys_frames = phys_ofs;
        self.chd_frames = chd_ofs;
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn is_gdrom(&self) -> bool {
        self.flags & Self::FLAG_GDROM != 0
    }

    /// Total frames in the given address space
    pub fn total_frames(&self, addressing: Addressing) -> u32 {
        match addressing {
            Addressing::Logical => self.log_frames,
            Addressing::Physical => self.phys_frames,
        }
    }

    /// Resolve a frame address to `(track index, container frame)`.
    ///
    /// Logical addresses resolve only within a track's data span; addresses
    /// that fall in a pregap or postgap with no stored data return `None`,
    /// on whichever track the gap precedes or follows. Physically stored
    /// pregap frames are reachable through [`Addressing::Physical`].
    pub fn resolve(&self, lba: u32, addressing: Addressing) -> Option<(usize, u32)> {
        let last = self.tracks.len() - 1;
        match addressing {
            Addressing::Logical => {
                // Tracks are in ascending order, so an address below this
                // track's data start lies in a gap between tracks.
                for (i, track) in self.tracks.iter().enumerate() {
                    let in_track = match lba.checked_sub(track.log_frame_ofs) {
                        Some(n) => n,
                        None => return None,
                    };
                    if in_track < track.frames {
                        return Some((i, track.chd_frame_ofs + in_track));
                    }
                }
                None
            }
            Addressing::Physical => {
                for (i, track) in self.tracks.iter().enumerate() {
                    let boundary = if i == last {
                        self.phys_frames
                    } else {
                        self.tracks[i + 1].phys_frame_ofs
                    };
                    if lba < boundary {
                        return Some((i, track.chd_frame_ofs + (lba - track.phys_frame_ofs)));
                    }
                }
                None
            }
        }
    }
}

/// Parse one `KEY:value` track-metadata entry into `(track number, Track)`
fn parse_track_entry(text: &str) -> Result<(u32, Track)> {
    let mut number = None;
    let mut track_type = None;
    let mut sub_type = SubType::None;
    let mut frames = None;
    let mut pregap = 0u32;
    let mut postgap = 0u32;
    let mut pad_frames = 0u32;
    let mut pregap_type_str = None;
    let mut pregap_sub_str = None;

    for token in text.split_whitespace() {
        let Some((key, value)) = token.split_once(':') else {
            continue;
        };
        match key {
            "TRACK" => number = value.parse::<u32>().ok(),
            "TYPE" => {
                track_type = Some(TrackType::from_metadata(value).ok_or_else(|| {
                    Error::metadata(format!("unknown track type '{}'", value))
                })?);
            }
            "SUBTYPE" => sub_type = SubType::from_metadata(value),
            "FRAMES" => frames = value.parse::<u32>().ok(),
            "PREGAP" => pregap = value.parse().unwrap_or(0),
            "POSTGAP" => postgap = value.parse().unwrap_or(0),
            "PAD" => pad_frames = value.parse().unwrap_or(0),
            "PGTYPE" => pregap_type_str = Some(value.to_string()),
            "PGSUB" => pregap_sub_str = Some(value.to_string()),
            _ => {}
        }
    }

    let number = number.ok_or_else(|| Error::metadata(format!("entry without TRACK: '{}'", text)))?;
    let track_type =
        track_type.ok_or_else(|| Error::metadata(format!("track {} has no TYPE", number)))?;
    let frames =
        frames.ok_or_else(|| Error::metadata(format!("track {} has no FRAMES", number)))?;

    let mut track = Track::new(track_type, sub_type, frames);
    track.pregap = pregap;
    track.postgap = postgap;
    track.pad_frames = pad_frames;

    // A leading 'V' on the pregap type marks the pregap as physically stored
    if let Some(pg) = pregap_type_str {
        let (stored, name) = match pg.strip_prefix('V') {
            Some(rest) => (true, rest),
            None => (false, pg.as_str()),
        };
        if let Some(pg_type) = TrackType::from_metadata(name) {
            track.pregap_type = pg_type;
            if stored {
                track.pregap_data_size = pg_type.data_size();
            }
        }
        if let Some(pg_sub) = pregap_sub_str {
            let sub = SubType::from_metadata(&pg_sub);
            track.pregap_sub = sub;
            if stored {
                track.pregap_sub_size = sub.sub_size();
            }
        }
    }

    Ok((number, track))
}
