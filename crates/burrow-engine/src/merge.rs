//! Pure merge of index generations into a repository view.

use std::collections::BTreeMap;

use burrow_index::{ContentEntry, ContentId, IndexReader};

use crate::error::EngineResult;

/// Merges entries from any number of index blocks into the point-in-time
/// repository view: one winning entry per content ID.
///
/// Resolution is [`ContentEntry::supersedes`] — latest timestamp wins, with a
/// deterministic tie-break — so the result is a pure function of the entry
/// multiset and never depends on the order blocks are supplied. Tombstones
/// are kept in the view; callers decide whether to filter them.
pub fn merged_view<I>(sources: I) -> BTreeMap<ContentId, ContentEntry>
where
    I: IntoIterator,
    I::Item: IntoIterator<Item = ContentEntry>,
{
    let mut view = BTreeMap::new();
    for source in sources {
        for entry in source {
            merge_into(&mut view, entry);
        }
    }
    view
}

/// Folds one entry into a view under the merge rule.
pub fn merge_into(view: &mut BTreeMap<ContentId, ContentEntry>, entry: ContentEntry) {
    match view.get(&entry.content_id) {
        Some(existing) if !entry.supersedes(existing) => {}
        _ => {
            view.insert(entry.content_id, entry);
        }
    }
}

/// Merges the decoded contents of the given readers, surfacing decode errors.
pub fn merged_view_of_readers<'a, I>(readers: I) -> EngineResult<BTreeMap<ContentId, ContentEntry>>
where
    I: IntoIterator<Item = &'a IndexReader>,
{
    let mut view = BTreeMap::new();
    for reader in readers {
        for entry in reader.entries() {
            merge_into(&mut view, entry?);
        }
    }
    Ok(view)
}
