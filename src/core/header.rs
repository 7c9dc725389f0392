//! Compressed buffer headers.
//!
//! Every buffer produced by the codec starts with a raw buffer header
//! (`size`, `hash`) followed by a format tag. The tag selects one of two
//! layouts:
//!
//! ```text
//! word  legacy clip (0xac10ac10)              track list (0xac11ac11)
//! 0     buffer size                           buffer size
//! 1     hash                                  hash
//! 2     tag                                   tag
//! 3     version:u16 algorithm:u8 pad:u8       version:u16 algorithm:u8 track_type:u8
//! 4     num_tracks:u16 num_segments:u16       num_tracks:u32
//! 5     rot/trans/scale formats, clip rr      num_samples:u32
//! 6     segment rr, has_scale, default_scale  sample_rate:f32
//! 7     num_samples:u32
//! 8     sample_rate:f32
//! ```
//!
//! All words are little-endian. Parsing only reads host bytes.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use super::sample::SampleType;
use super::time_sampling::track_duration;
use crate::util::{Error, Result};

/// Tag of the legacy whole-clip format (transform tracks).
pub const LEGACY_CLIP_TAG: u32 = 0xac10_ac10;

/// Tag of the track-list format (scalar tracks).
pub const TRACK_LIST_TAG: u32 = 0xac11_ac11;

/// Offset of the format tag.
pub const TAG_OFFSET: usize = 8;

/// Size of the raw buffer header (`size` + `hash`), excluded from the hash.
pub const RAW_HEADER_SIZE: usize = 8;

/// Track type value for single-float tracks in the track-list format.
pub const TRACK_TYPE_FLOAT1F: u8 = 0;

/// Binary layout of a compressed buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferFormat {
    /// Whole-clip format produced for transform tracks.
    LegacyClip,
    /// Track-list format produced for scalar tracks.
    TrackList,
}

impl BufferFormat {
    pub const fn tag(self) -> u32 {
        match self {
            Self::LegacyClip => LEGACY_CLIP_TAG,
            Self::TrackList => TRACK_LIST_TAG,
        }
    }

    pub const fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            LEGACY_CLIP_TAG => Some(Self::LegacyClip),
            TRACK_LIST_TAG => Some(Self::TrackList),
            _ => None,
        }
    }

    /// Bytes occupied by the full header.
    pub const fn header_size(self) -> usize {
        match self {
            Self::LegacyClip => 36,
            Self::TrackList => 28,
        }
    }

    /// The format the encoder produces for a sample type.
    pub const fn for_sample_type(sample_type: SampleType) -> Self {
        match sample_type {
            SampleType::Transform => Self::LegacyClip,
            SampleType::Scalar => Self::TrackList,
        }
    }
}

/// Hash stored in word 1: xxh32 over everything after the raw buffer header.
pub fn buffer_hash(bytes: &[u8]) -> u32 {
    let body = bytes.get(RAW_HEADER_SIZE..).unwrap_or(&[]);
    xxhash_rust::xxh32::xxh32(body, 0)
}

/// Parsed header of a compressed buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompressedHeader {
    pub format: BufferFormat,
    /// Total buffer size declared by the codec.
    pub size: u32,
    pub hash: u32,
    pub version: u16,
    pub algorithm: u8,
    pub track_count: u32,
    /// Segment count (legacy format only, 0 otherwise).
    pub segment_count: u32,
    pub sample_count: u32,
    pub sample_rate: f32,
    /// Whether the clip stores scale (legacy format only).
    pub has_scale: bool,
    pub sample_type: SampleType,
}

impl CompressedHeader {
    /// Parse the header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < TAG_OFFSET + 4 {
            return Err(Error::UnrecognizedFormat);
        }

        let tag = LittleEndian::read_u32(&bytes[TAG_OFFSET..]);
        let format = BufferFormat::from_tag(tag).ok_or(Error::UnrecognizedFormat)?;

        let needed = format.header_size();
        if bytes.len() < needed {
            return Err(Error::TruncatedHeader { needed, actual: bytes.len() });
        }

        let word = |index: usize| LittleEndian::read_u32(&bytes[index * 4..]);
        let size = word(0);
        let hash = word(1);
        let version = LittleEndian::read_u16(&bytes[12..]);
        let algorithm = bytes[14];

        match format {
            BufferFormat::LegacyClip => Ok(Self {
                format,
                size,
                hash,
                version,
                algorithm,
                track_count: LittleEndian::read_u16(&bytes[16..]) as u32,
                segment_count: LittleEndian::read_u16(&bytes[18..]) as u32,
                sample_count: word(7),
                sample_rate: LittleEndian::read_f32(&bytes[32..]),
                has_scale: bytes[25] != 0,
                sample_type: SampleType::Transform,
            }),
            BufferFormat::TrackList => {
                let track_type = bytes[15];
                if track_type != TRACK_TYPE_FLOAT1F {
                    return Err(Error::UnsupportedTrackType(track_type));
                }
                Ok(Self {
                    format,
                    size,
                    hash,
                    version,
                    algorithm,
                    track_count: word(4),
                    segment_count: 0,
                    sample_count: word(5),
                    sample_rate: LittleEndian::read_f32(&bytes[24..]),
                    has_scale: false,
                    sample_type: SampleType::Scalar,
                })
            }
        }
    }

    /// Bytes written per decoded sample.
    #[inline]
    pub fn sample_size(&self) -> usize {
        self.sample_type.decoded_size()
    }

    /// Bytes needed to decode every track at once.
    #[inline]
    pub fn output_buffer_size(&self) -> usize {
        self.track_count as usize * self.sample_size()
    }

    /// Duration in seconds of the compressed tracks.
    pub fn duration(&self) -> f64 {
        track_duration(self.sample_count as usize, self.sample_rate as f64)
    }

    /// Check the declared size and hash against the buffer contents.
    pub fn verify(&self, bytes: &[u8]) -> bool {
        let size = self.size as usize;
        size >= self.format.header_size()
            && bytes.len() >= size
            && buffer_hash(&bytes[..size]) == self.hash
    }

    /// Serialize this header. `size` and `hash` are written as stored.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        // Writes into a Vec cannot fail.
        let _ = self.try_write_to(out);
    }

    fn try_write_to(&self, out: &mut Vec<u8>) -> std::io::Result<()> {
        out.write_u32::<LittleEndian>(self.size)?;
        out.write_u32::<LittleEndian>(self.hash)?;
        out.write_u32::<LittleEndian>(self.format.tag())?;
        out.write_u16::<LittleEndian>(self.version)?;
        out.write_u8(self.algorithm)?;
        match self.format {
            BufferFormat::LegacyClip => {
                out.write_u8(0)?;
                out.write_u16::<LittleEndian>(self.track_count as u16)?;
                out.write_u16::<LittleEndian>(self.segment_count as u16)?;
                // Formats and clip range reduction: full precision, none.
                out.write_u32::<LittleEndian>(0)?;
                out.write_u8(0)?;
                out.write_u8(self.has_scale as u8)?;
                out.write_u8(1)?;
                out.write_u8(0)?;
                out.write_u32::<LittleEndian>(self.sample_count)?;
                out.write_f32::<LittleEndian>(self.sample_rate)?;
            }
            BufferFormat::TrackList => {
                out.write_u8(TRACK_TYPE_FLOAT1F)?;
                out.write_u32::<LittleEndian>(self.track_count)?;
                out.write_u32::<LittleEndian>(self.sample_count)?;
                out.write_f32::<LittleEndian>(self.sample_rate)?;
            }
        }
        Ok(())
    }
}
