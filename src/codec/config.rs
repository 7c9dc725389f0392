//! Codec context configuration.

#[cfg(feature = "serde")]
use serde::Deserialize;

/// Default memory ceiling: 16384 pages of 64 KiB (1 GiB).
pub const DEFAULT_MAX_MEMORY_PAGES: u32 = 16384;

/// Default arena window reserved inside a wasm module: 256 pages (16 MiB).
pub const DEFAULT_WASM_ARENA_PAGES: u32 = 256;

/// Default minimum size of the region `compress` writes its output into.
pub const DEFAULT_MIN_OUTPUT_RESERVE: usize = 256;

/// Configuration for a [`super::CodecContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CodecConfig {
    /// Largest linear memory the module may grow to, in 64 KiB pages.
    pub max_memory_pages: u32,
    /// The raw sample region doubles as the compress output region and is
    /// never smaller than this many bytes.
    pub min_output_reserve: usize,
    /// Compact the arena after every encode, decode and dispose.
    pub compact_after_call: bool,
    /// Size of the window reserved with the module's own `malloc` when it
    /// exports one, in 64 KiB pages. The arena cannot grow past it.
    pub wasm_arena_pages: u32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_memory_pages: DEFAULT_MAX_MEMORY_PAGES,
            min_output_reserve: DEFAULT_MIN_OUTPUT_RESERVE,
            compact_after_call: true,
            wasm_arena_pages: DEFAULT_WASM_ARENA_PAGES,
        }
    }
}

impl CodecConfig {
    pub fn with_max_memory_pages(mut self, pages: u32) -> Self {
        self.max_memory_pages = pages;
        self
    }

    pub fn with_min_output_reserve(mut self, bytes: usize) -> Self {
        self.min_output_reserve = bytes;
        self
    }

    pub fn with_compact_after_call(mut self, enabled: bool) -> Self {
        self.compact_after_call = enabled;
        self
    }

    pub fn with_wasm_arena_pages(mut self, pages: u32) -> Self {
        self.wasm_arena_pages = pages;
        self
    }

    /// Parse from JSON. Missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> crate::util::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
