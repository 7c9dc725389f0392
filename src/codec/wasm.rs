//! WebAssembly codec module hosted by wasmtime.
//!
//! The module must export `memory`, `compress`, `decompress_tracks` and
//! `decompress_track`. Imports other than
//! `env.emscripten_notify_memory_growth` are defined as traps: the codec is
//! pure and never calls out.
//!
//! The module allocates inside the same memory. When it exports `malloc`, the
//! arena lives in a window reserved through it; otherwise the arena starts at
//! the memory size seen after instantiation and grows the memory itself.

use std::fmt;
use std::path::Path;

use tracing::debug;
use wasmtime::{Engine, Instance, Linker, Memory, Module, Store, TypedFunc, WasmParams, WasmResults};

use super::config::CodecConfig;
use super::native::NativeModule;
use crate::arena::{LinearMemory, Region, PAGE_SIZE};
use crate::util::{Error, Result};

type CompressFn = TypedFunc<(u32, u32, u32, u32), i32>;
type DecompressTracksFn = TypedFunc<(u32, u32, f32, i32, u32, u32), i32>;
type DecompressTrackFn = TypedFunc<(u32, u32, f32, i32, i32, u32, u32), i32>;

fn load_error(e: impl fmt::Display) -> Error {
    Error::WasmLoad(e.to_string())
}

fn trap(e: impl fmt::Display) -> Error {
    Error::Trap(e.to_string())
}

fn export<P: WasmParams, R: WasmResults>(
    instance: &Instance,
    store: &mut Store<()>,
    name: &str,
) -> Result<TypedFunc<P, R>> {
    instance
        .get_typed_func(store, name)
        .map_err(|e| Error::WasmLoad(format!("export '{}': {}", name, e)))
}

/// A compiled codec module and its store.
pub struct WasmCodec {
    store: Store<()>,
    memory: Memory,
    compress: CompressFn,
    decompress_tracks: DecompressTracksFn,
    decompress_track: DecompressTrackFn,
    heap_base: usize,
    /// Highest offset the arena may use.
    limit: usize,
}

impl WasmCodec {
    /// Read and instantiate a module file.
    pub async fn load(path: impl AsRef<Path>, config: CodecConfig) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::WasmLoad(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(&bytes, &config)
    }

    /// Compile and instantiate a module from its binary.
    pub fn from_bytes(bytes: &[u8], config: &CodecConfig) -> Result<Self> {
        let engine = Engine::default();
        let module = Module::new(&engine, bytes).map_err(load_error)?;

        let mut linker = Linker::new(&engine);
        linker
            .func_wrap("env", "emscripten_notify_memory_growth", |_: u32| {})
            .map_err(load_error)?;
        linker.define_unknown_imports_as_traps(&module).map_err(load_error)?;

        let mut store = Store::new(&engine, ());
        let instance = linker.instantiate(&mut store, &module).map_err(load_error)?;

        for ctor in ["_initialize", "__wasm_call_ctors"] {
            if let Ok(init) = instance.get_typed_func::<(), ()>(&mut store, ctor) {
                init.call(&mut store, ()).map_err(load_error)?;
                break;
            }
        }

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| Error::WasmLoad("module does not export 'memory'".to_string()))?;
        let compress = export(&instance, &mut store, "compress")?;
        let decompress_tracks = export(&instance, &mut store, "decompress_tracks")?;
        let decompress_track = export(&instance, &mut store, "decompress_track")?;

        let (heap_base, limit) = match instance.get_typed_func::<u32, u32>(&mut store, "malloc") {
            Ok(malloc) => {
                let window = config.wasm_arena_pages as usize * PAGE_SIZE;
                let base = malloc.call(&mut store, window as u32).map_err(load_error)?;
                if base == 0 {
                    return Err(Error::WasmLoad(format!("malloc could not reserve {} bytes", window)));
                }
                (base as usize, base as usize + window)
            }
            Err(_) => (
                memory.data_size(&store),
                config.max_memory_pages as usize * PAGE_SIZE,
            ),
        };

        debug!(
            "WasmCodec::from_bytes: memory={} heap_base={} limit={}",
            memory.data_size(&store),
            heap_base,
            limit
        );

        Ok(Self { store, memory, compress, decompress_tracks, decompress_track, heap_base, limit })
    }
}

impl fmt::Debug for WasmCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WasmCodec")
            .field("memory", &self.memory.data_size(&self.store))
            .field("heap_base", &self.heap_base)
            .field("limit", &self.limit)
            .finish()
    }
}

impl LinearMemory for WasmCodec {
    fn data(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    fn data_mut(&mut self) -> &mut [u8] {
        self.memory.data_mut(&mut self.store)
    }

    fn grow(&mut self, min_len: usize) -> Result<()> {
        if min_len > self.limit {
            return Err(Error::OutOfMemory { requested: min_len });
        }
        let current = self.memory.data_size(&self.store);
        if min_len <= current {
            return Ok(());
        }
        let delta = (min_len - current).div_ceil(PAGE_SIZE) as u64;
        self.memory
            .grow(&mut self.store, delta)
            .map_err(|_| Error::OutOfMemory { requested: min_len })?;
        debug!("WasmCodec::grow: +{} pages", delta);
        Ok(())
    }

    fn heap_base(&self) -> usize {
        self.heap_base
    }
}

impl NativeModule for WasmCodec {
    fn compress(&mut self, metadata: Region, raw: Region) -> Result<i32> {
        self.compress
            .call(&mut self.store, (metadata.offset, metadata.len, raw.offset, raw.len))
            .map_err(trap)
    }

    fn decompress_tracks(&mut self, buffer: Region, sample_time: f32, policy: i32, output: Region) -> Result<i32> {
        self.decompress_tracks
            .call(
                &mut self.store,
                (buffer.offset, buffer.len, sample_time, policy, output.offset, output.len),
            )
            .map_err(trap)
    }

    fn decompress_track(
        &mut self,
        buffer: Region,
        sample_time: f32,
        policy: i32,
        track_index: i32,
        output: Region,
    ) -> Result<i32> {
        self.decompress_track
            .call(
                &mut self.store,
                (buffer.offset, buffer.len, sample_time, policy, track_index, output.offset, output.len),
            )
            .map_err(trap)
    }
}
