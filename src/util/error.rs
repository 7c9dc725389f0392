//! Error types for the codec bridge.

use thiserror::Error;

/// Reason reported by the native `compress` entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressFailure {
    /// The module does not support the sample type tag in the metadata header.
    UnsupportedSampleType,
    /// Metadata length does not match the size derived from its header.
    InvalidMetadataSize,
    /// Raw data region is smaller than the samples described by the metadata.
    InvalidRawDataSize,
    /// The codec rejected the input.
    CompressionFailed,
    /// The compressed result does not fit in the raw data region.
    BufferTooSmall,
    /// A code outside the documented set.
    Unknown(i32),
}

impl CompressFailure {
    /// Map a non-positive return value of `compress`.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::UnsupportedSampleType,
            -1 => Self::InvalidMetadataSize,
            -2 => Self::InvalidRawDataSize,
            -3 => Self::CompressionFailed,
            -4 => Self::BufferTooSmall,
            other => Self::Unknown(other),
        }
    }

    /// The wire value for this failure.
    pub fn code(self) -> i32 {
        match self {
            Self::UnsupportedSampleType => 0,
            Self::InvalidMetadataSize => -1,
            Self::InvalidRawDataSize => -2,
            Self::CompressionFailed => -3,
            Self::BufferTooSmall => -4,
            Self::Unknown(code) => code,
        }
    }
}

/// Reason reported by `decompress_tracks` / `decompress_track`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecompressFailure {
    InvalidBuffer,
    CorruptedData,
    OutputTooSmall,
    OutputMisaligned,
    InvalidTrackIndex,
    ContextInit,
    Unknown(i32),
}

impl DecompressFailure {
    /// Map a non-zero return value of a decompress entry point.
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::InvalidBuffer,
            -2 => Self::CorruptedData,
            -3 => Self::OutputTooSmall,
            -4 => Self::OutputMisaligned,
            -5 => Self::InvalidTrackIndex,
            -6 => Self::ContextInit,
            other => Self::Unknown(other),
        }
    }

    /// The wire value for this failure.
    pub fn code(self) -> i32 {
        match self {
            Self::InvalidBuffer => -1,
            Self::CorruptedData => -2,
            Self::OutputTooSmall => -3,
            Self::OutputMisaligned => -4,
            Self::InvalidTrackIndex => -5,
            Self::ContextInit => -6,
            Self::Unknown(code) => code,
        }
    }
}

/// Broad class of an [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input shape or range; never reaches the native boundary.
    Validation,
    /// The native module returned a failure code or trapped.
    Boundary,
    /// Arena misuse or an unreadable buffer; a caller bug.
    Memory,
    /// The native module has not finished loading.
    NotReady,
}

/// Main error type for codec bridge operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Track count {0} out of range [0, 2^24]")]
    InvalidTrackCount(usize),

    #[error("Sample count {0} out of range [0, 2^24]")]
    InvalidSampleCount(usize),

    #[error("Sample rate {0} out of range [0, 10000)")]
    InvalidSampleRate(f64),

    /// A track descriptor field is out of range or breaks a collection invariant.
    #[error("Invalid descriptor for track {track}: {reason}")]
    InvalidDescriptor { track: usize, reason: String },

    /// A sample is not finite or its rotation is not normalized.
    #[error("Invalid sample {sample} in track {track}")]
    InvalidSample { track: usize, sample: usize },

    /// Accessor used against the wrong sample variant.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: &'static str, actual: &'static str },

    #[error("Cannot sample a track with no samples")]
    EmptyTrack,

    #[error("Invalid sample time: {0}")]
    InvalidSampleTime(f64),

    #[error("Invalid rounding policy value: {0}")]
    InvalidRoundingPolicy(i32),

    #[error("Track index {index} out of bounds (count: {count})")]
    TrackOutOfBounds { index: usize, count: usize },

    #[error("Sample index {index} out of bounds (count: {count})")]
    SampleOutOfBounds { index: usize, count: usize },

    /// A caller-supplied buffer ends before the values a track addresses.
    #[error("Buffer too short: need {needed} values, have {actual}")]
    BufferTooShort { needed: usize, actual: usize },

    #[error("Compression failed: {0:?}")]
    Compress(CompressFailure),

    #[error("Decompression failed: {0:?}")]
    Decompress(DecompressFailure),

    /// The native module trapped or a call could not be dispatched.
    #[error("Native call trapped: {0}")]
    Trap(String),

    #[error("Failed to load native module: {0}")]
    WasmLoad(String),

    #[error("Out of memory: cannot allocate {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("Handle used after it was freed")]
    UseAfterFree,

    #[error("Handle freed twice")]
    DoubleFree,

    #[error("Handle belongs to a different arena")]
    ForeignHandle,

    /// A copy does not fit in the allocation it targets.
    #[error("Region overflow: {len} bytes do not fit in {capacity}")]
    RegionOverflow { len: usize, capacity: usize },

    #[error("Unrecognized compressed buffer format")]
    UnrecognizedFormat,

    #[error("Compressed buffer header truncated: need {needed} bytes, have {actual}")]
    TruncatedHeader { needed: usize, actual: usize },

    #[error("Unsupported track type: {0}")]
    UnsupportedTrackType(u8),

    #[error("Compressed buffer is already bound")]
    AlreadyBound,

    #[error("Compressed buffer is not bound")]
    NotBound,

    #[error("Compressed buffer was disposed")]
    Disposed,

    #[error("Native codec module is not loaded")]
    NotReady,

    #[cfg(feature = "serde")]
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid descriptor error.
    pub fn descriptor(track: usize, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor { track, reason: reason.into() }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTrackCount(_)
            | Self::InvalidSampleCount(_)
            | Self::InvalidSampleRate(_)
            | Self::InvalidDescriptor { .. }
            | Self::InvalidSample { .. }
            | Self::TypeMismatch { .. }
            | Self::EmptyTrack
            | Self::InvalidSampleTime(_)
            | Self::InvalidRoundingPolicy(_)
            | Self::TrackOutOfBounds { .. }
            | Self::SampleOutOfBounds { .. }
            | Self::BufferTooShort { .. } => ErrorKind::Validation,
            #[cfg(feature = "serde")]
            Self::Config(_) => ErrorKind::Validation,
            Self::Compress(_) | Self::Decompress(_) | Self::Trap(_) | Self::WasmLoad(_) => {
                ErrorKind::Boundary
            }
            Self::OutOfMemory { .. }
            | Self::UseAfterFree
            | Self::DoubleFree
            | Self::ForeignHandle
            | Self::RegionOverflow { .. }
            | Self::UnrecognizedFormat
            | Self::TruncatedHeader { .. }
            | Self::UnsupportedTrackType(_)
            | Self::AlreadyBound
            | Self::NotBound
            | Self::Disposed => ErrorKind::Memory,
            Self::NotReady => ErrorKind::NotReady,
        }
    }
}

/// Result type alias for codec bridge operations.
pub type Result<T> = std::result::Result<T, Error>;
