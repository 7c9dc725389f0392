//! Shared helpers for integration tests.

use acl_bridge::codec::{CodecConfig, CodecContext, ReferenceCodec};
use tracing_subscriber::EnvFilter;

/// Route `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A ready context backed by the reference codec.
pub async fn reference_context(config: CodecConfig) -> CodecContext<ReferenceCodec> {
    init_tracing();
    let ctx = CodecContext::new(config);
    ctx.initialize(ReferenceCodec::load).await.unwrap();
    ctx
}
