//! Index consolidation and garbage collection behind a retention window.
//!
//! Compaction rewrites the active index generations into one consolidated
//! block holding only the winning entries, then retires the sources. Nothing
//! is deleted until a replacement is durably published and the retention
//! window has elapsed, so readers that started before a compaction pass can
//! finish against the old generation. Every blob moves through an explicit
//! lifecycle: `Active → Superseded → EligibleForDeletion → Deleted`, with the
//! compactor as the only transition driver.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use burrow_blob::BlobId;
use burrow_index::{IndexBuilder, PackBlockId, PhysicalBlockId};

use crate::error::EngineResult;
use crate::manager::{BlockManager, PendingWrite};
use crate::merge::merged_view_of_readers;

/// Configuration for the compactor.
///
/// The retention windows are policy decisions; set them from repository
/// policy rather than trusting the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionConfig {
    /// Seconds a superseded blob is kept before becoming eligible for
    /// deletion, to accommodate readers holding references to the old
    /// generation (default: 7 days).
    pub retention_secs: u64,
    /// Seconds a tombstone is kept before consolidation drops it entirely
    /// (default: 7 days).
    pub tombstone_retention_secs: u64,
    /// Minimum number of active index blocks before consolidation runs
    /// (default: 2; a single block is already consolidated).
    pub min_source_blocks: usize,
    /// Minimum percentage of dead bytes in a pack blob before its live
    /// subset is rewritten into a fresh pack (default: 30.0).
    pub pack_rewrite_dead_pct: f64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            retention_secs: 7 * 24 * 3600,
            tombstone_retention_secs: 7 * 24 * 3600,
            min_source_blocks: 2,
            pack_rewrite_dead_pct: 30.0,
        }
    }
}

/// Lifecycle state of a superseded blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockState {
    /// Part of the current repository view.
    Active,
    /// Replaced by a newer generation; retained for in-flight readers.
    Superseded {
        /// When the blob was superseded.
        superseded_at_ms: u64,
    },
    /// Retention window elapsed; safe to delete.
    EligibleForDeletion {
        /// When the blob was superseded.
        superseded_at_ms: u64,
    },
    /// Physically removed from the blob store.
    Deleted,
}

/// Statistics from one compaction pass.
#[derive(Debug, Clone, Default)]
pub struct CompactionStats {
    /// Index blocks consolidated.
    pub source_blocks: usize,
    /// Entries read across all sources.
    pub entries_merged: usize,
    /// Winning entries written to the consolidated block.
    pub entries_written: usize,
    /// Tombstones dropped for exceeding their retention.
    pub tombstones_dropped: usize,
    /// Pack blobs whose live subset was rewritten.
    pub packs_rewritten: usize,
    /// Pack blobs newly identified as fully garbage.
    pub packs_marked_garbage: usize,
    /// The consolidated block, when consolidation ran.
    pub consolidated_block: Option<PhysicalBlockId>,
}

/// Background compactor / garbage collector over one [`BlockManager`].
pub struct Compactor {
    manager: Arc<BlockManager>,
    config: CompactionConfig,
    states: Mutex<HashMap<BlobId, BlockState>>,
}

impl Compactor {
    /// Creates a compactor for the given manager.
    pub fn new(manager: Arc<BlockManager>, config: CompactionConfig) -> Self {
        Self {
            manager,
            config,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Lifecycle states of every blob the compactor has superseded, for
    /// inspection and tests.
    pub fn block_states(&self) -> Vec<(BlobId, BlockState)> {
        self.states
            .lock()
            .iter()
            .map(|(id, state)| (id.clone(), *state))
            .collect()
    }

    /// One compaction pass: consolidate index generations, rewrite
    /// partially-garbage packs, and mark fully-garbage packs.
    ///
    /// A failure at any point aborts without mutating the active set; the
    /// pre-compaction generation stays fully valid.
    pub async fn compact(&self) -> EngineResult<CompactionStats> {
        let mut stats = CompactionStats::default();

        self.manager.refresh_indexes().await?;
        let sources = self.manager.active_blocks();
        stats.source_blocks = sources.len();

        if sources.len() >= self.config.min_source_blocks {
            self.consolidate(&sources, &mut stats).await?;
        } else {
            debug!(
                blocks = sources.len(),
                min = self.config.min_source_blocks,
                "skipping consolidation"
            );
        }

        self.account_packs(&mut stats).await?;
        Ok(stats)
    }

    /// Merges the source blocks into one consolidated index block and retires
    /// the sources. The consolidated block is durably written before any
    /// source leaves the active set.
    async fn consolidate(
        &self,
        sources: &[crate::manager::ActiveBlock],
        stats: &mut CompactionStats,
    ) -> EngineResult<()> {
        let view = merged_view_of_readers(sources.iter().map(|b| b.reader.as_ref()))?;
        stats.entries_merged = sources.iter().map(|b| b.reader.len()).sum();

        let now = self.manager.now_ms();
        let tombstone_cutoff = now.saturating_sub(self.config.tombstone_retention_secs * 1000);

        let mut builder = IndexBuilder::new();
        for entry in view.values() {
            if entry.deleted && entry.timestamp_ms < tombstone_cutoff {
                stats.tombstones_dropped += 1;
                continue;
            }
            builder.add(*entry);
        }
        stats.entries_written = builder.len();

        let consolidated = self.manager.publish_index_block(&builder).await?;

        let source_ids: Vec<PhysicalBlockId> = sources.iter().map(|b| b.physical_id).collect();
        self.manager.retire_blocks(&source_ids);

        let mut states = self.states.lock();
        for id in &source_ids {
            states
                .entry(self.manager.config().index_blob_id(id))
                .or_insert(BlockState::Superseded {
                    superseded_at_ms: now,
                });
        }
        drop(states);

        info!(
            consolidated = %consolidated,
            sources = source_ids.len(),
            entries = stats.entries_written,
            dropped_tombstones = stats.tombstones_dropped,
            "consolidated index blocks"
        );
        stats.consolidated_block = Some(consolidated);
        Ok(())
    }

    /// Computes pack liveness from the current view, rewrites packs past the
    /// dead-bytes threshold, and marks unreferenced packs as superseded.
    async fn account_packs(&self, stats: &mut CompactionStats) -> EngineResult<()> {
        let active = self.manager.active_blocks();
        let view = merged_view_of_readers(active.iter().map(|b| b.reader.as_ref()))?;

        let mut live_bytes: HashMap<PackBlockId, u64> = HashMap::new();
        for entry in view.values().filter(|e| !e.deleted) {
            *live_bytes.entry(entry.pack_block_id).or_insert(0) += entry.length as u64;
        }

        let config = self.manager.config().clone();
        let listed = self
            .manager
            .store()
            .list_blobs(&config.pack_blob_prefix)
            .await
            .map_err(crate::error::EngineError::StoreUnavailable)?;
        let now = self.manager.now_ms();

        for blob_id in listed {
            let Some(pack_id) = config.parse_pack_blob_id(&blob_id) else {
                warn!(blob = %blob_id, "skipping unparseable pack blob key");
                continue;
            };

            match live_bytes.get(&pack_id) {
                None => {
                    // No live entry references this pack: either superseded
                    // content or an orphan from a cancelled flush. Retention
                    // gates the actual deletion.
                    let mut states = self.states.lock();
                    let newly = !states.contains_key(&blob_id);
                    states.entry(blob_id.clone()).or_insert(BlockState::Superseded {
                        superseded_at_ms: now,
                    });
                    drop(states);
                    if newly {
                        stats.packs_marked_garbage += 1;
                        debug!(pack = %pack_id, "marked fully-garbage pack");
                    }
                }
                Some(&live) => {
                    let pack = self.manager.store().get_blob(&blob_id).await?;
                    let total = pack.len() as u64;
                    let dead = total.saturating_sub(live);
                    let dead_pct = if total == 0 {
                        0.0
                    } else {
                        (dead as f64 / total as f64) * 100.0
                    };
                    if dead > 0 && dead_pct >= self.config.pack_rewrite_dead_pct {
                        self.rewrite_pack(pack_id, &pack, &view).await?;
                        stats.packs_rewritten += 1;
                    }
                }
            }
        }
        Ok(())
    }

    /// Rewrites the live subset of one pack into a fresh pack published
    /// through a normal index block. The fresh entries carry newer
    /// timestamps, so they supersede the old locations; the old pack becomes
    /// fully garbage once a later consolidation drops the stale entries.
    async fn rewrite_pack(
        &self,
        pack_id: PackBlockId,
        pack: &bytes::Bytes,
        view: &BTreeMap<burrow_index::ContentId, burrow_index::ContentEntry>,
    ) -> EngineResult<()> {
        let mut batch = BTreeMap::new();
        for entry in view
            .values()
            .filter(|e| !e.deleted && e.pack_block_id == pack_id)
        {
            let data = self.manager.decrypt_payload(pack, entry)?;
            batch.insert(
                entry.content_id,
                PendingWrite::Put {
                    data,
                    timestamp_ms: self.manager.now_ms(),
                },
            );
        }
        if batch.is_empty() {
            return Ok(());
        }

        let entries = batch.len();
        self.manager.write_batch(&batch).await?;
        info!(pack = %pack_id, entries, "rewrote live subset of pack");
        Ok(())
    }

    /// Deletes superseded blobs whose retention window has elapsed.
    ///
    /// Blobs referenced again by the current view (a pack rescued by a
    /// concurrent flush that published its index after we marked it) are
    /// unmarked instead of deleted. Returns the number of blobs removed.
    pub async fn reclaim(&self) -> EngineResult<usize> {
        let now = self.manager.now_ms();
        let retention_ms = self.config.retention_secs * 1000;

        let active = self.manager.active_blocks();
        let view = merged_view_of_readers(active.iter().map(|b| b.reader.as_ref()))?;
        let referenced: HashSet<BlobId> = view
            .values()
            .filter(|e| !e.deleted)
            .map(|e| self.manager.config().pack_blob_id(&e.pack_block_id))
            .collect();

        let to_delete: Vec<BlobId> = {
            let mut states = self.states.lock();
            states.retain(|blob_id, _| !referenced.contains(blob_id));
            for state in states.values_mut() {
                if let BlockState::Superseded { superseded_at_ms } = *state {
                    if now.saturating_sub(superseded_at_ms) >= retention_ms {
                        *state = BlockState::EligibleForDeletion { superseded_at_ms };
                    }
                }
            }
            states
                .iter()
                .filter(|(_, s)| matches!(s, BlockState::EligibleForDeletion { .. }))
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut deleted = 0;
        for blob_id in to_delete {
            self.manager.store().delete_blob(&blob_id).await.map_err(
                crate::error::EngineError::StoreUnavailable,
            )?;
            self.states.lock().insert(blob_id.clone(), BlockState::Deleted);
            deleted += 1;
            info!(blob = %blob_id, "reclaimed superseded blob");
        }
        Ok(deleted)
    }

    /// Runs a full cycle: compact, then reclaim whatever retention allows.
    pub async fn run_cycle(&self) -> EngineResult<(CompactionStats, usize)> {
        let stats = self.compact().await?;
        let reclaimed = self.reclaim().await?;
        Ok((stats, reclaimed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::EngineConfig;
    use crate::error::EngineError;
    use burrow_blob::{BlobStore, MemoryBlobStore};
    use burrow_crypto::NullEncryptor;
    use burrow_index::ContentId;
    use bytes::Bytes;

    const DAY_MS: u64 = 24 * 3600 * 1000;

    async fn setup() -> (Arc<MemoryBlobStore>, Arc<ManualClock>, Arc<BlockManager>, Compactor) {
        let store = Arc::new(MemoryBlobStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let manager = Arc::new(
            BlockManager::open(
                store.clone(),
                Arc::new(NullEncryptor),
                clock.clone(),
                EngineConfig::default(),
            )
            .await
            .unwrap(),
        );
        let compactor = Compactor::new(manager.clone(), CompactionConfig::default());
        (store, clock, manager, compactor)
    }

    #[tokio::test]
    async fn consolidation_keeps_only_winning_entries() {
        let (_, _, manager, compactor) = setup().await;
        let id = ContentId::from_bytes(b"h1");

        manager.put(id, Bytes::from_static(b"A")).unwrap();
        manager.flush().await.unwrap();
        manager.put(id, Bytes::from_static(b"B")).unwrap();
        manager.flush().await.unwrap();
        assert_eq!(manager.index_blocks().len(), 2);

        let stats = compactor.compact().await.unwrap();
        assert_eq!(stats.source_blocks, 2);
        assert_eq!(stats.entries_merged, 2);
        assert_eq!(stats.entries_written, 1);

        // One active block, still returning the latest value.
        assert_eq!(manager.index_blocks().len(), 1);
        assert_eq!(manager.get(&id).await.unwrap(), Bytes::from_static(b"B"));
    }

    #[tokio::test]
    async fn compaction_is_idempotent() {
        let (_, _, manager, compactor) = setup().await;
        for payload in [&b"one"[..], b"two", b"three"] {
            manager
                .put(ContentId::from_bytes(payload), Bytes::copy_from_slice(payload))
                .unwrap();
            manager.flush().await.unwrap();
        }

        compactor.compact().await.unwrap();
        let first = manager.index_blocks();
        let second_stats = compactor.compact().await.unwrap();
        let second = manager.index_blocks();

        // Second run with nothing to do: no new consolidated block.
        assert!(second_stats.consolidated_block.is_none());
        assert_eq!(
            first.iter().map(|m| m.physical_id).collect::<Vec<_>>(),
            second.iter().map(|m| m.physical_id).collect::<Vec<_>>()
        );
        for payload in [&b"one"[..], b"two", b"three"] {
            let got = manager.get(&ContentId::from_bytes(payload)).await.unwrap();
            assert_eq!(&got[..], payload);
        }
    }

    #[tokio::test]
    async fn reclaim_waits_for_retention_window() {
        let (store, clock, manager, compactor) = setup().await;
        let id = ContentId::from_bytes(b"h1");
        manager.put(id, Bytes::from_static(b"A")).unwrap();
        manager.flush().await.unwrap();
        manager.put(id, Bytes::from_static(b"B")).unwrap();
        manager.flush().await.unwrap();

        compactor.compact().await.unwrap();
        // Within the window nothing is deleted.
        assert_eq!(compactor.reclaim().await.unwrap(), 0);
        let before = store.blob_count();

        clock.advance_ms(8 * DAY_MS);
        let reclaimed = compactor.reclaim().await.unwrap();
        assert!(reclaimed > 0);
        assert!(store.blob_count() < before);
        assert_eq!(manager.get(&id).await.unwrap(), Bytes::from_static(b"B"));
    }

    #[tokio::test]
    async fn superseded_pack_is_eventually_deleted() {
        let (store, clock, manager, compactor) = setup().await;
        let id = ContentId::from_bytes(b"h1");
        manager.put(id, Bytes::from_static(b"A")).unwrap();
        manager.flush().await.unwrap();
        manager.put(id, Bytes::from_static(b"B")).unwrap();
        manager.flush().await.unwrap();
        assert_eq!(store.list_blobs("p").await.unwrap().len(), 2);

        // Consolidation drops the superseded entry; the pack holding "A"
        // becomes fully garbage and is reclaimed after the window.
        compactor.compact().await.unwrap();
        clock.advance_ms(8 * DAY_MS);
        compactor.reclaim().await.unwrap();

        assert_eq!(store.list_blobs("p").await.unwrap().len(), 1);
        assert_eq!(manager.get(&id).await.unwrap(), Bytes::from_static(b"B"));
    }

    #[tokio::test]
    async fn old_tombstones_are_dropped_after_retention() {
        let (_, clock, manager, compactor) = setup().await;
        let id = ContentId::from_bytes(b"h1");
        manager.put(id, Bytes::from_static(b"A")).unwrap();
        manager.flush().await.unwrap();
        manager.delete(id).unwrap();
        manager.flush().await.unwrap();

        // Young tombstone survives consolidation.
        let stats = compactor.compact().await.unwrap();
        assert_eq!(stats.tombstones_dropped, 0);
        assert!(matches!(
            manager.get(&id).await,
            Err(EngineError::NotFound { .. })
        ));

        // Aged past retention it is dropped entirely. A second index block
        // is flushed so consolidation runs again.
        manager.put(ContentId::from_bytes(b"other"), Bytes::from_static(b"x")).unwrap();
        manager.flush().await.unwrap();
        clock.advance_ms(8 * DAY_MS);
        let stats = compactor.compact().await.unwrap();
        assert_eq!(stats.tombstones_dropped, 1);
        assert!(matches!(
            manager.get(&id).await,
            Err(EngineError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn failed_consolidation_leaves_old_generation_intact() {
        let (store, _, manager, compactor) = setup().await;
        for payload in [&b"one"[..], b"two"] {
            manager
                .put(ContentId::from_bytes(payload), Bytes::copy_from_slice(payload))
                .unwrap();
            manager.flush().await.unwrap();
        }
        let before: Vec<_> = manager.index_blocks().iter().map(|m| m.physical_id).collect();

        store.set_fail_puts(true);
        assert!(compactor.compact().await.is_err());
        store.set_fail_puts(false);

        let after: Vec<_> = manager.index_blocks().iter().map(|m| m.physical_id).collect();
        assert_eq!(before, after);
        for payload in [&b"one"[..], b"two"] {
            let got = manager.get(&ContentId::from_bytes(payload)).await.unwrap();
            assert_eq!(&got[..], payload);
        }
    }

    #[tokio::test]
    async fn partially_garbage_pack_is_rewritten() {
        let (store, clock, manager, compactor) = setup().await;
        // Two entries in one pack; delete one so half the pack is dead.
        let keep = ContentId::from_bytes(b"keep");
        let drop_ = ContentId::from_bytes(b"drop");
        manager.put(keep, Bytes::from(vec![1u8; 512])).unwrap();
        manager.put(drop_, Bytes::from(vec![2u8; 512])).unwrap();
        manager.flush().await.unwrap();
        manager.delete(drop_).unwrap();
        manager.flush().await.unwrap();

        let stats = compactor.compact().await.unwrap();
        assert_eq!(stats.packs_rewritten, 1);

        // After another consolidation and the retention window, the original
        // pack is gone and the kept content still reads back.
        compactor.compact().await.unwrap();
        clock.advance_ms(8 * DAY_MS);
        compactor.reclaim().await.unwrap();

        assert_eq!(store.list_blobs("p").await.unwrap().len(), 1);
        assert_eq!(manager.get(&keep).await.unwrap(), Bytes::from(vec![1u8; 512]));
        assert!(matches!(
            manager.get(&drop_).await,
            Err(EngineError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn block_states_walk_the_lifecycle() {
        let (_, clock, manager, compactor) = setup().await;
        let id = ContentId::from_bytes(b"h1");
        manager.put(id, Bytes::from_static(b"A")).unwrap();
        manager.flush().await.unwrap();
        manager.put(id, Bytes::from_static(b"B")).unwrap();
        manager.flush().await.unwrap();

        compactor.compact().await.unwrap();
        assert!(compactor
            .block_states()
            .iter()
            .any(|(_, s)| matches!(s, BlockState::Superseded { .. })));

        clock.advance_ms(8 * DAY_MS);
        compactor.reclaim().await.unwrap();
        assert!(compactor
            .block_states()
            .iter()
            .any(|(_, s)| matches!(s, BlockState::Deleted)));
        assert!(!compactor
            .block_states()
            .iter()
            .any(|(_, s)| matches!(s, BlockState::Superseded { .. })));
    }
}
