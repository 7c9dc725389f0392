//! # ACL bridge
//!
//! Host-side driver for the ACL animation codec running in an isolated
//! linear memory.
//!
//! The codec itself is opaque. This crate prepares its input, moves bytes in
//! and out of its memory and interprets its output.
//!
//! ## Modules
//!
//! - [`util`] - Errors and transform math
//! - [`core`] - Sample types, the sampling engine, compressed buffer headers
//! - [`track`] - Tracks and collections over shared flat buffers
//! - [`arena`] - Allocation, deferred free and compaction in linear memory
//! - [`codec`] - The native boundary: context, encode, decode
//!
//! ## Example
//!
//! ```ignore
//! use acl_bridge::prelude::*;
//!
//! let ctx = CodecContext::new(CodecConfig::default());
//! ctx.initialize(ReferenceCodec::load).await?;
//!
//! let mut tracks = TrackCollection::new(SampleType::Transform, 2, 3, 30.0)?;
//! tracks.write_sample(1, 2, Qvv::IDENTITY)?;
//!
//! let mut buffer = ctx.encode(&tracks)?;
//! buffer.bind(&ctx)?;
//! let pose = buffer.decode_all(&ctx, 1.0 / 30.0, RoundingPolicy::None)?;
//! buffer.dispose(&ctx)?;
//! ```

pub mod util;
pub mod core;
pub mod track;
pub mod arena;
pub mod codec;

// Re-export commonly used types
pub use util::{Error, ErrorKind, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Error, ErrorKind, Qvv, Qvvf, Result};
    pub use crate::core::{CompressedHeader, RoundingPolicy, SampleType};
    pub use crate::track::{
        Sample, ScalarDescriptor, Track, TrackCollection, TrackDescriptor, TransformDescriptor,
    };
    pub use crate::codec::{
        CodecConfig, CodecContext, CompressedBuffer, DecodedSample, DecodedTracks, NativeModule,
        ReferenceCodec,
    };
    #[cfg(feature = "wasm")]
    pub use crate::codec::WasmCodec;
}
