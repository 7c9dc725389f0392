//! Marshalling between host structures and native calls.
//!
//! Every operation follows the same shape: allocate the regions it needs,
//! copy inputs in, make one native call, copy the result out, then queue the
//! temporary regions for free. When anything fails the temporaries are
//! always compacted away before the error is returned.

use tracing::{debug, warn};

use super::config::CodecConfig;
use super::native::NativeModule;
use crate::arena::{Arena, Handle};
use crate::core::{clamp_sample_time, find_samples, CompressedHeader, RoundingPolicy};
use crate::track::TrackCollection;
use crate::util::{CompressFailure, DecompressFailure, Error, Result};

/// Queue `handles` and compact if the call failed or the config asks for it.
fn finish<M: NativeModule, T>(
    arena: &mut Arena<M>,
    config: &CodecConfig,
    handles: &[Handle],
    result: Result<T>,
) -> Result<T> {
    for &handle in handles {
        if let Err(e) = arena.queue_free(handle) {
            warn!("driver: releasing temporary region failed: {}", e);
        }
    }
    if result.is_err() || config.compact_after_call {
        arena.compact()?;
    }
    result
}

/// Compress `collection`, returning the codec's output bytes.
///
/// The raw sample region is reused by the codec as its output region, so it
/// is never smaller than `config.min_output_reserve`.
#[tracing::instrument(skip_all, fields(tracks = collection.track_count(), samples = collection.sample_count()))]
pub(crate) fn encode<M: NativeModule>(
    arena: &mut Arena<M>,
    config: &CodecConfig,
    collection: &TrackCollection,
) -> Result<Vec<u8>> {
    let metadata = collection.metadata_bytes();
    let raw = collection.raw_bytes();

    let meta_handle = arena.allocate(metadata.len())?;
    let raw_handle = match arena.allocate(raw.len().max(config.min_output_reserve)) {
        Ok(handle) => handle,
        Err(e) => return finish(arena, config, &[meta_handle], Err(e)),
    };

    let result = compress_in(arena, meta_handle, raw_handle, &metadata, &raw);
    if let Err(e) = &result {
        debug!("encode failed: {}", e);
    }
    finish(arena, config, &[meta_handle, raw_handle], result)
}

fn compress_in<M: NativeModule>(
    arena: &mut Arena<M>,
    meta_handle: Handle,
    raw_handle: Handle,
    metadata: &[u8],
    raw: &[u8],
) -> Result<Vec<u8>> {
    arena.write(meta_handle, metadata)?;
    arena.write(raw_handle, raw)?;
    let meta_region = arena.region(meta_handle)?;
    let raw_region = arena.region(raw_handle)?;

    let code = arena.with_module(|module| module.compress(meta_region, raw_region))?;
    if code <= 0 {
        return Err(Error::Compress(CompressFailure::from_code(code)));
    }
    let size = code as usize;
    if size > raw_region.len as usize {
        return Err(Error::Compress(CompressFailure::BufferTooSmall));
    }
    debug!("compressed {} + {} bytes into {}", metadata.len(), raw.len(), size);
    arena.read(raw_handle, size)
}

/// Copy a compressed buffer into the arena. The caller owns the handle.
pub(crate) fn bind<M: NativeModule>(arena: &mut Arena<M>, config: &CodecConfig, bytes: &[u8]) -> Result<Handle> {
    let handle = arena.allocate(bytes.len())?;
    if let Err(e) = arena.write(handle, bytes) {
        return finish(arena, config, &[handle], Err(e));
    }
    Ok(handle)
}

/// Release a bound buffer.
pub(crate) fn unbind<M: NativeModule>(arena: &mut Arena<M>, config: &CodecConfig, handle: Handle) -> Result<()> {
    arena.queue_free(handle)?;
    if config.compact_after_call {
        arena.compact()?;
    }
    Ok(())
}

/// Validate a query time and clamp it to the buffer's duration.
///
/// Runs the sampling engine so empty tracks are rejected on the host.
fn query_time(header: &CompressedHeader, sample_time: f64, policy: RoundingPolicy) -> Result<f32> {
    if sample_time.is_nan() || sample_time < 0.0 {
        return Err(Error::InvalidSampleTime(sample_time));
    }
    let t = clamp_sample_time(sample_time, header.duration());
    find_samples(header.sample_count as usize, header.sample_rate as f64, t, policy)?;
    Ok(t as f32)
}

fn check_decompress(code: i32) -> Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(Error::Decompress(DecompressFailure::from_code(code)))
    }
}

/// Decode every track of a bound buffer at `sample_time`; returns the raw output bytes.
#[tracing::instrument(skip_all, fields(tracks = header.track_count, t = sample_time))]
pub(crate) fn decode_all<M: NativeModule>(
    arena: &mut Arena<M>,
    config: &CodecConfig,
    buffer: Handle,
    header: &CompressedHeader,
    sample_time: f64,
    policy: RoundingPolicy,
) -> Result<Vec<u8>> {
    let t = query_time(header, sample_time, policy)?;

    let len = header.output_buffer_size();
    let output = arena.allocate(len)?;
    let result = (|| -> Result<Vec<u8>> {
        let buffer_region = arena.region(buffer)?;
        let output_region = arena.region(output)?;
        let code = arena.with_module(|module| {
            module.decompress_tracks(buffer_region, t, policy.as_i32(), output_region)
        })?;
        check_decompress(code)?;
        arena.read(output, len)
    })();
    finish(arena, config, &[output], result)
}

/// Decode one track of a bound buffer at `sample_time`.
#[tracing::instrument(skip_all, fields(track = track_index, t = sample_time))]
pub(crate) fn decode_one<M: NativeModule>(
    arena: &mut Arena<M>,
    config: &CodecConfig,
    buffer: Handle,
    header: &CompressedHeader,
    track_index: usize,
    sample_time: f64,
    policy: RoundingPolicy,
) -> Result<Vec<u8>> {
    let count = header.track_count as usize;
    if track_index >= count {
        return Err(Error::TrackOutOfBounds { index: track_index, count });
    }
    let t = query_time(header, sample_time, policy)?;

    let len = header.sample_size();
    let output = arena.allocate(len)?;
    let result = (|| -> Result<Vec<u8>> {
        let buffer_region = arena.region(buffer)?;
        let output_region = arena.region(output)?;
        let code = arena.with_module(|module| {
            module.decompress_track(buffer_region, t, policy.as_i32(), track_index as i32, output_region)
        })?;
        check_decompress(code)?;
        arena.read(output, len)
    })();
    finish(arena, config, &[output], result)
}
