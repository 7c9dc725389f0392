//! Boundary driver for the native codec.
//!
//! - [`NativeModule`] - The three native entry points over a linear memory
//! - [`CodecContext`] - One-time module load, arena ownership, `encode`
//! - [`CompressedBuffer`] - Bind, decode and dispose codec output
//! - [`ReferenceCodec`] - Host-resident module with the same contract
//! - `WasmCodec` - The compiled module under wasmtime (feature `wasm`)

mod compressed;
mod config;
mod context;
mod driver;
mod native;
mod reference;
#[cfg(feature = "wasm")]
mod wasm;

pub use compressed::{CompressedBuffer, DecodedSample, DecodedTracks};
pub use config::{
    CodecConfig, DEFAULT_MAX_MEMORY_PAGES, DEFAULT_MIN_OUTPUT_RESERVE, DEFAULT_WASM_ARENA_PAGES,
};
pub use context::CodecContext;
pub use native::NativeModule;
pub use reference::{ReferenceCodec, REFERENCE_FORMAT_VERSION, REFERENCE_HEAP_BASE};
#[cfg(feature = "wasm")]
pub use wasm::WasmCodec;
