//! Per-module codec state with one-time asynchronous loading.

use std::future::Future;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::OnceCell;
use tracing::debug;

use super::compressed::CompressedBuffer;
use super::config::CodecConfig;
use super::driver;
use super::native::NativeModule;
use crate::arena::Arena;
use crate::track::TrackCollection;
use crate::util::{Error, Result};

/// Owns the loaded codec module and the arena over its memory.
///
/// Operations before [`CodecContext::initialize`] completes fail with
/// [`Error::NotReady`]. Native calls and arena mutations are serialized by
/// one lock.
pub struct CodecContext<M: NativeModule> {
    config: CodecConfig,
    arena: OnceCell<Mutex<Arena<M>>>,
}

impl<M: NativeModule> CodecContext<M> {
    pub fn new(config: CodecConfig) -> Self {
        Self { config, arena: OnceCell::new() }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Load the module once. Later calls return immediately without running
    /// `load`; a failed load can be retried.
    pub async fn initialize<F, Fut>(&self, load: F) -> Result<()>
    where
        F: FnOnce(CodecConfig) -> Fut,
        Fut: Future<Output = Result<M>>,
    {
        let config = self.config.clone();
        self.arena
            .get_or_try_init(|| async move {
                let module = load(config).await?;
                let arena = Arena::new(module);
                debug!("CodecContext::initialize: arena {} ready", arena.id());
                Ok::<_, Error>(Mutex::new(arena))
            })
            .await?;
        Ok(())
    }

    /// Whether the module finished loading.
    pub fn is_ready(&self) -> bool {
        self.arena.initialized()
    }

    /// Lock the arena.
    pub fn arena(&self) -> Result<MutexGuard<'_, Arena<M>>> {
        self.arena.get().map(|arena| arena.lock()).ok_or(Error::NotReady)
    }

    /// Run `f` with the arena locked.
    pub fn with_arena<R>(&self, f: impl FnOnce(&mut Arena<M>) -> Result<R>) -> Result<R> {
        let mut arena = self.arena()?;
        f(&mut arena)
    }

    /// Compress a collection.
    ///
    /// Invalid collections are rejected before any native memory is touched.
    pub fn encode(&self, collection: &TrackCollection) -> Result<CompressedBuffer> {
        let bytes = self.with_arena(|arena| {
            collection.validate()?;
            driver::encode(arena, &self.config, collection)
        })?;
        CompressedBuffer::from_bytes(bytes)
    }
}

impl<M: NativeModule> std::fmt::Debug for CodecContext<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecContext")
            .field("config", &self.config)
            .field("ready", &self.is_ready())
            .finish()
    }
}
