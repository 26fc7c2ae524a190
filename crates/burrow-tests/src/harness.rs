//! Test harness wiring a complete engine over the in-memory blob store.

use std::sync::Arc;

use burrow_blob::MemoryBlobStore;
use burrow_crypto::{
    Aes256GcmEncryptor, ChaCha20Poly1305Encryptor, EncryptionKey, Encryptor, LayeredEncryptor,
};
use burrow_engine::{BlockManager, CompactionConfig, Compactor, EngineConfig, ManualClock};

/// A fully wired repository engine for tests: in-memory store, manual clock,
/// AES-256-GCM encryption by default.
pub struct TestRepo {
    /// The backing store, exposed for blob-level assertions.
    pub store: Arc<MemoryBlobStore>,
    /// Manually advanced clock driving timestamps and retention.
    pub clock: Arc<ManualClock>,
    /// The engine under test.
    pub manager: Arc<BlockManager>,
    /// Compactor over the same engine.
    pub compactor: Compactor,
}

/// Milliseconds in one day, for retention-window arithmetic.
pub const DAY_MS: u64 = 24 * 3600 * 1000;

/// Installs a fmt subscriber once so failing tests show engine tracing.
/// Honors `RUST_LOG`; defaults to warnings only.
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

fn master_key(seed: u8) -> EncryptionKey {
    EncryptionKey::from_bytes([seed; 32])
}

/// Single AES-256-GCM layer.
pub fn aes_encryptor() -> Arc<dyn Encryptor> {
    Arc::new(Aes256GcmEncryptor::new(master_key(11)))
}

/// Two-layer pipeline: AES-256-GCM inner, ChaCha20-Poly1305 outer.
pub fn layered_encryptor() -> Arc<dyn Encryptor> {
    Arc::new(LayeredEncryptor::new(
        Arc::new(Aes256GcmEncryptor::new(master_key(11))),
        Arc::new(ChaCha20Poly1305Encryptor::new(master_key(22))),
    ))
}

impl TestRepo {
    /// Builds a repository with the given encryptor and default configs.
    pub async fn with_encryptor(encryptor: Arc<dyn Encryptor>) -> Self {
        init_test_logging();
        let store = Arc::new(MemoryBlobStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let manager = Arc::new(
            BlockManager::open(
                store.clone(),
                encryptor,
                clock.clone(),
                EngineConfig::default(),
            )
            .await
            .expect("open empty repository"),
        );
        let compactor = Compactor::new(manager.clone(), CompactionConfig::default());
        Self {
            store,
            clock,
            manager,
            compactor,
        }
    }

    /// Builds a repository with the default AES-256-GCM layer.
    pub async fn new() -> Self {
        Self::with_encryptor(aes_encryptor()).await
    }
}
