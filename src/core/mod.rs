//! Core layer - sampling and buffer-format primitives.
//!
//! This module provides:
//! - [`SampleType`] - The closed set of track value kinds
//! - [`RoundingPolicy`] / [`SampleInterp`] - Mapping a time to two samples and a blend factor
//! - [`find_samples`] / [`UniformSampling`] - The sampling engine
//! - [`CompressedHeader`] - Inspection of codec output without invoking the codec

mod time_sampling;
mod header;
mod sample;

pub use time_sampling::{clamp_sample_time, find_samples, track_duration, UniformSampling};
pub use header::{
    buffer_hash, BufferFormat, CompressedHeader,
    LEGACY_CLIP_TAG, TRACK_LIST_TAG, TRACK_TYPE_FLOAT1F, RAW_HEADER_SIZE,
};
pub use sample::{RoundingPolicy, SampleInterp, SampleType};
