//! The native codec boundary.

use crate::arena::{LinearMemory, Region};
use crate::util::Result;

/// A codec module computing inside its own linear memory.
///
/// Every argument is a region of that memory. The return values are the
/// module's raw status codes; `Err` means the call itself failed (a trap),
/// not that the codec rejected its input.
pub trait NativeModule: LinearMemory {
    /// Compress the tracks described by `metadata` and `raw`.
    ///
    /// On success returns the compressed size (> 0), with the compressed
    /// bytes written at `raw.offset`. Non-positive values are
    /// [`crate::util::CompressFailure`] codes.
    fn compress(&mut self, metadata: Region, raw: Region) -> Result<i32>;

    /// Decode every track at `sample_time` into `output`.
    ///
    /// Returns 0 or a [`crate::util::DecompressFailure`] code.
    fn decompress_tracks(
        &mut self,
        buffer: Region,
        sample_time: f32,
        policy: i32,
        output: Region,
    ) -> Result<i32>;

    /// Decode one track at `sample_time` into `output`.
    fn decompress_track(
        &mut self,
        buffer: Region,
        sample_time: f32,
        policy: i32,
        track_index: i32,
        output: Region,
    ) -> Result<i32>;
}
