//! The pack/block manager: the logical content get/put surface.
//!
//! Writes accumulate in a pending buffer private to this instance. A flush
//! seals them into encrypted pack blobs, publishes an index block describing
//! the batch, and adds it to the active set. Reads consult the pending buffer
//! first, then the merged view of all active index blocks.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use burrow_blob::BlobStore;
use burrow_crypto::Encryptor;
use burrow_index::{ContentEntry, ContentId, IndexBuilder, IndexReader, PackBlockId, PhysicalBlockId};

use crate::clock::{Clock, MonotonicClock};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::inspect::{IndexBlockMetadata, IndexEntryReport};
use crate::pack::PackAssembler;

/// A buffered write awaiting the next flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingWrite {
    /// Content to be stored.
    Put {
        /// Plaintext payload.
        data: Bytes,
        /// Timestamp assigned at `put` time.
        timestamp_ms: u64,
    },
    /// Deletion tombstone.
    Tombstone {
        /// Timestamp assigned at `delete` time.
        timestamp_ms: u64,
    },
}

/// One published index block in the active set.
#[derive(Clone)]
pub(crate) struct ActiveBlock {
    pub(crate) physical_id: PhysicalBlockId,
    pub(crate) reader: Arc<IndexReader>,
}

struct ManagerState {
    pending: BTreeMap<ContentId, PendingWrite>,
    active: Vec<ActiveBlock>,
    // Blocks this instance superseded via compaction. Still listed in the
    // store until the retention window elapses, but excluded from refresh.
    retired: std::collections::HashSet<PhysicalBlockId>,
}

/// Statistics from one flush.
#[derive(Debug, Clone, Default)]
pub struct FlushStats {
    /// Add entries written.
    pub entries: usize,
    /// Tombstone entries written.
    pub tombstones: usize,
    /// Pack blobs uploaded.
    pub pack_blobs: usize,
    /// Total encrypted pack bytes uploaded.
    pub pack_bytes: u64,
    /// Plaintext content bytes consumed.
    pub content_bytes: u64,
    /// The index block published for this batch, if the batch was non-empty.
    pub index_block: Option<PhysicalBlockId>,
}

/// The engine's public surface: `put`/`get`/`delete`/`flush` plus the index
/// inspection API.
pub struct BlockManager {
    store: Arc<dyn BlobStore>,
    encryptor: Arc<dyn Encryptor>,
    clock: MonotonicClock<Arc<dyn Clock>>,
    config: EngineConfig,
    state: Mutex<ManagerState>,
    // Serializes flush publication; never held across user-visible awaits in
    // get/put paths.
    flush_lock: tokio::sync::Mutex<()>,
    reader_cache: DashMap<PhysicalBlockId, Arc<IndexReader>>,
}

impl BlockManager {
    /// Opens a manager over the given store, discovering the active index set
    /// by prefix listing.
    pub async fn open(
        store: Arc<dyn BlobStore>,
        encryptor: Arc<dyn Encryptor>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> EngineResult<Self> {
        let manager = Self {
            store,
            encryptor,
            clock: MonotonicClock::new(clock),
            config,
            state: Mutex::new(ManagerState {
                pending: BTreeMap::new(),
                active: Vec::new(),
                retired: std::collections::HashSet::new(),
            }),
            flush_lock: tokio::sync::Mutex::new(()),
            reader_cache: DashMap::new(),
        };
        manager.refresh_indexes().await?;
        Ok(manager)
    }

    /// Buffers a content write under the given ID. Durable only after the
    /// next [`flush`](Self::flush). Re-putting an existing (even tombstoned)
    /// ID creates a newer entry that supersedes prior ones.
    pub fn put(&self, content_id: ContentId, data: Bytes) -> EngineResult<()> {
        let timestamp_ms = self.clock.now_ms();
        self.state.lock().pending.insert(
            content_id,
            PendingWrite::Put {
                data,
                timestamp_ms,
            },
        );
        debug!(content = %content_id, "buffered put");
        Ok(())
    }

    /// Buffers a deletion tombstone. Bytes are reclaimed only by compaction.
    pub fn delete(&self, content_id: ContentId) -> EngineResult<()> {
        let timestamp_ms = self.clock.now_ms();
        self.state
            .lock()
            .pending
            .insert(content_id, PendingWrite::Tombstone { timestamp_ms });
        debug!(content = %content_id, "buffered tombstone");
        Ok(())
    }

    /// Resolves a content ID against the merged repository view and returns
    /// the verified plaintext.
    ///
    /// Checks the pending buffer first, then every active index block keeping
    /// the entry with the winning timestamp. Absent or tombstoned IDs fail
    /// with [`EngineError::NotFound`].
    pub async fn get(&self, content_id: &ContentId) -> EngineResult<Bytes> {
        let (pending_hit, active) = {
            let state = self.state.lock();
            (state.pending.get(content_id).cloned(), state.active.clone())
        };

        match pending_hit {
            Some(PendingWrite::Put { data, .. }) => return Ok(data),
            Some(PendingWrite::Tombstone { .. }) => {
                return Err(EngineError::NotFound {
                    content_id: *content_id,
                })
            }
            None => {}
        }

        let mut best: Option<ContentEntry> = None;
        for block in &active {
            if let Some(entry) = block.reader.get(content_id) {
                best = match best {
                    Some(current) if !entry.supersedes(&current) => Some(current),
                    _ => Some(entry),
                };
            }
        }

        let entry = best.ok_or(EngineError::NotFound {
            content_id: *content_id,
        })?;
        if entry.deleted {
            return Err(EngineError::NotFound {
                content_id: *content_id,
            });
        }
        self.read_entry_payload(&entry).await
    }

    /// Fetches and decrypts the byte range an add entry points at.
    pub(crate) async fn read_entry_payload(&self, entry: &ContentEntry) -> EngineResult<Bytes> {
        let blob_id = self.config.pack_blob_id(&entry.pack_block_id);
        let pack = self.store.get_blob(&blob_id).await?;
        self.decrypt_payload(&pack, entry)
    }

    /// Slices an entry's range out of already-fetched pack bytes and decrypts
    /// it under the entry's content ID.
    pub(crate) fn decrypt_payload(&self, pack: &Bytes, entry: &ContentEntry) -> EngineResult<Bytes> {
        let start = entry.pack_offset as usize;
        let end = start + entry.length as usize;
        if end > pack.len() {
            return Err(EngineError::Corrupt {
                reason: format!(
                    "entry range {start}..{end} exceeds pack blob {} of {} bytes",
                    entry.pack_block_id,
                    pack.len()
                ),
            });
        }

        let mut plaintext = Vec::with_capacity(entry.length as usize);
        self.encryptor
            .decrypt(&pack[start..end], entry.content_id.as_bytes(), &mut plaintext)?;
        Ok(Bytes::from(plaintext))
    }

    /// Seals the pending batch into pack blobs, publishes an index block for
    /// it, and clears the flushed entries.
    ///
    /// Publication order is the atomicity contract: every pack blob is
    /// durably written before the index block referencing it, and the index
    /// block is durably written before it becomes visible to readers.
    /// Dropping the returned future part-way leaves at worst unreferenced
    /// pack blobs, which the garbage collector reclaims.
    pub async fn flush(&self) -> EngineResult<FlushStats> {
        let _guard = self.flush_lock.lock().await;

        let batch: BTreeMap<ContentId, PendingWrite> = self.state.lock().pending.clone();
        if batch.is_empty() {
            return Ok(FlushStats::default());
        }

        let stats = self.write_batch(&batch).await?;

        // The new index block is already visible, so entries can leave the
        // pending buffer. Writes superseded by a concurrent put/delete stay.
        let mut state = self.state.lock();
        for (content_id, written) in &batch {
            if state.pending.get(content_id) == Some(written) {
                state.pending.remove(content_id);
            }
        }
        Ok(stats)
    }

    /// Encrypts and uploads a batch as pack blobs plus one index block, then
    /// publishes the block into the active set. Shared by `flush` and the
    /// compactor's pack rewrite.
    pub(crate) async fn write_batch(
        &self,
        batch: &BTreeMap<ContentId, PendingWrite>,
    ) -> EngineResult<FlushStats> {
        let mut stats = FlushStats::default();
        let mut builder = IndexBuilder::new();
        let mut assembler = PackAssembler::new();
        let mut sealed: Vec<(PackBlockId, Bytes)> = Vec::new();

        for (content_id, write) in batch {
            match write {
                PendingWrite::Tombstone { timestamp_ms } => {
                    builder.add(ContentEntry::new_tombstone(*content_id, *timestamp_ms));
                    stats.tombstones += 1;
                }
                PendingWrite::Put { data, timestamp_ms } => {
                    let mut ciphertext = Vec::with_capacity(data.len());
                    self.encryptor
                        .encrypt(data, content_id.as_bytes(), &mut ciphertext)?;

                    if !assembler.is_empty()
                        && assembler.len() + ciphertext.len() > self.config.max_pack_size
                    {
                        let full = std::mem::take(&mut assembler);
                        sealed.push((full.id(), full.into_bytes()));
                    }

                    let (offset, length) = assembler.append(&ciphertext);
                    builder.add(ContentEntry::new_add(
                        *content_id,
                        *timestamp_ms,
                        assembler.id(),
                        offset,
                        length,
                    ));
                    stats.entries += 1;
                    stats.content_bytes += data.len() as u64;
                }
            }
        }
        if !assembler.is_empty() {
            sealed.push((assembler.id(), assembler.into_bytes()));
        }

        // Pack blobs first; an index block must never reference a pack that
        // is not durably written.
        for (pack_id, bytes) in &sealed {
            stats.pack_bytes += bytes.len() as u64;
            self.store
                .put_blob(&self.config.pack_blob_id(pack_id), bytes.clone())
                .await?;
            stats.pack_blobs += 1;
        }

        let physical_id = self.publish_index_block(&builder).await?;
        info!(
            index_block = %physical_id,
            entries = stats.entries,
            tombstones = stats.tombstones,
            packs = stats.pack_blobs,
            "flushed batch"
        );
        stats.index_block = Some(physical_id);
        Ok(stats)
    }

    /// Serializes, encrypts, uploads, and publishes one index block.
    pub(crate) async fn publish_index_block(
        &self,
        builder: &IndexBuilder,
    ) -> EngineResult<PhysicalBlockId> {
        let physical_id = PhysicalBlockId::generate();
        let plain = builder.build();

        let mut ciphertext = Vec::with_capacity(plain.len());
        self.encryptor
            .encrypt(&plain, physical_id.as_bytes(), &mut ciphertext)?;
        self.store
            .put_blob(
                &self.config.index_blob_id(&physical_id),
                Bytes::from(ciphertext),
            )
            .await?;

        let reader = Arc::new(IndexReader::open(plain)?);
        self.reader_cache.insert(physical_id, reader.clone());
        self.state.lock().active.push(ActiveBlock {
            physical_id,
            reader,
        });
        Ok(physical_id)
    }

    /// Re-reads the index namespace and adds any blocks published by other
    /// writers to the active set.
    ///
    /// Refresh only ever grows the set: a block leaves it solely through
    /// [`retire_blocks`](Self::retire_blocks), so a concurrent local flush
    /// can never lose its just-published block to a racing listing.
    pub async fn refresh_indexes(&self) -> EngineResult<()> {
        let listed = self
            .store
            .list_blobs(&self.config.index_blob_prefix)
            .await
            .map_err(EngineError::StoreUnavailable)?;

        let (known, retired) = {
            let state = self.state.lock();
            let known: std::collections::HashSet<PhysicalBlockId> =
                state.active.iter().map(|b| b.physical_id).collect();
            (known, state.retired.clone())
        };

        let mut discovered = Vec::new();
        for blob_id in listed {
            let Some(physical_id) = self.config.parse_index_blob_id(&blob_id) else {
                warn!(blob = %blob_id, "skipping unparseable index blob key");
                continue;
            };
            if known.contains(&physical_id) || retired.contains(&physical_id) {
                continue;
            }
            let reader = self.load_reader(physical_id).await?;
            discovered.push(ActiveBlock {
                physical_id,
                reader,
            });
        }

        if !discovered.is_empty() {
            let mut state = self.state.lock();
            for block in discovered {
                let duplicate = state
                    .active
                    .iter()
                    .any(|b| b.physical_id == block.physical_id);
                if !duplicate && !state.retired.contains(&block.physical_id) {
                    state.active.push(block);
                }
            }
            debug!(blocks = state.active.len(), "refreshed active index set");
        }
        Ok(())
    }

    /// Loads one index block through the decode cache.
    async fn load_reader(&self, physical_id: PhysicalBlockId) -> EngineResult<Arc<IndexReader>> {
        if let Some(reader) = self.reader_cache.get(&physical_id) {
            return Ok(reader.clone());
        }

        let blob_id = self.config.index_blob_id(&physical_id);
        let ciphertext = self.store.get_blob(&blob_id).await?;
        let mut plain = Vec::with_capacity(ciphertext.len());
        self.encryptor
            .decrypt(&ciphertext, physical_id.as_bytes(), &mut plain)?;
        let reader = Arc::new(IndexReader::open(Bytes::from(plain))?);
        self.reader_cache.insert(physical_id, reader.clone());
        Ok(reader)
    }

    /// Lists all active index blocks with identifiers and timestamps, for
    /// inspection and debugging tooling.
    pub fn index_blocks(&self) -> Vec<IndexBlockMetadata> {
        self.state
            .lock()
            .active
            .iter()
            .map(|block| IndexBlockMetadata {
                physical_id: block.physical_id,
                timestamp_ms: block.reader.latest_timestamp_ms(),
                entry_count: block.reader.len(),
                length_bytes: block.reader.as_bytes().len(),
            })
            .collect()
    }

    /// Fetches the decrypted serialized bytes of one index block.
    pub async fn index_block_bytes(&self, physical_id: PhysicalBlockId) -> EngineResult<Bytes> {
        Ok(self.load_reader(physical_id).await?.as_bytes())
    }

    /// Decodes one index block into inspection rows, in content-ID order.
    pub async fn index_block_entries(
        &self,
        physical_id: PhysicalBlockId,
    ) -> EngineResult<Vec<IndexEntryReport>> {
        let reader = self.load_reader(physical_id).await?;
        let mut rows = Vec::with_capacity(reader.len());
        for entry in reader.entries() {
            rows.push(IndexEntryReport::from(&entry?));
        }
        Ok(rows)
    }

    /// Number of writes waiting for the next flush.
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    // --- internals shared with the compactor ---

    pub(crate) fn active_blocks(&self) -> Vec<ActiveBlock> {
        self.state.lock().active.clone()
    }

    pub(crate) fn retire_blocks(&self, ids: &[PhysicalBlockId]) {
        let mut state = self.state.lock();
        state.active.retain(|block| !ids.contains(&block.physical_id));
        state.retired.extend(ids.iter().copied());
        drop(state);
        for id in ids {
            self.reader_cache.remove(id);
        }
    }

    pub(crate) fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}
