//! Track data model.
//!
//! - [`TrackCollection`] - Owns the metadata and raw sample buffers
//! - [`Track`] - A window into both buffers
//! - [`SampleRef`] / [`Sample`] - Typed access to one sample
//! - [`TrackDescriptor`] - Per-track compression parameters

mod collection;
mod descriptor;
mod sample;
#[allow(clippy::module_inception)]
mod track;

pub use collection::{TrackCollection, METADATA_HEADER_LEN};
pub use descriptor::{
    ScalarDescriptor, TrackDescriptor, TransformDescriptor, MAX_PRECISION, MAX_SHELL_DISTANCE,
};
pub use sample::{Sample, SampleRef};
pub use track::{Track, MAX_COUNT, MAX_SAMPLE_RATE};
