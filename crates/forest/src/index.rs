use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ForestError;
use crate::record::{Record, RecordId};

/// Index entry pointing at the live record plus its derived position.
/// 指向現存紀錄及其推導出的父節點與深度。
#[derive(Debug, Clone)]
pub struct IndexEntry {
    record: Arc<Record>,
    parent_id: Option<RecordId>,
    depth: usize,
}

impl IndexEntry {
    pub fn record(&self) -> &Arc<Record> {
        &self.record
    }

    /// Identifier of the record this one was reached from, `None` for roots.
    /// 父節點識別碼；根節點為 `None`。
    pub fn parent_id(&self) -> Option<RecordId> {
        self.parent_id
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Reverse index from record id to the record stored in one snapshot.
/// 由識別碼對應到快照內紀錄的反向索引。
///
/// The index is a cache derived from the roots; it is rebuilt wholesale after
/// every mutation and never patched in place.
#[derive(Debug, Clone, Default)]
pub struct ForestIndex {
    entries: HashMap<RecordId, IndexEntry>,
}

impl ForestIndex {
    /// Walks the forest depth-first, pre-order, and indexes every record.
    /// 以深度優先（前序）走訪整座森林並建立索引。
    ///
    /// A repeated id rejects the whole forest with [`ForestError::DuplicateId`].
    pub fn rebuild(roots: &[Arc<Record>]) -> Result<Self, ForestError> {
        let mut entries = HashMap::new();
        let mut stack: Vec<(&Arc<Record>, Option<RecordId>, usize)> =
            roots.iter().rev().map(|record| (record, None, 0)).collect();

        while let Some((record, parent_id, depth)) = stack.pop() {
            match entries.entry(record.id) {
                Entry::Occupied(_) => return Err(ForestError::DuplicateId(record.id)),
                Entry::Vacant(slot) => {
                    slot.insert(IndexEntry {
                        record: Arc::clone(record),
                        parent_id,
                        depth,
                    });
                }
            }
            if let Some(children) = record.children() {
                stack.extend(
                    children
                        .iter()
                        .rev()
                        .map(|child| (child, Some(record.id), depth + 1)),
                );
            }
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: RecordId) -> Option<&IndexEntry> {
        self.entries.get(&id)
    }

    pub fn record(&self, id: RecordId) -> Option<&Arc<Record>> {
        self.entries.get(&id).map(IndexEntry::record)
    }

    /// Returns the parent id; `None` for roots and for unknown ids.
    pub fn parent_of(&self, id: RecordId) -> Option<RecordId> {
        self.entries.get(&id).and_then(IndexEntry::parent_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.entries.keys().copied()
    }

    /// Iterates the ancestors of `id`, nearest first.
    /// 由近至遠列出祖先節點。
    pub fn ancestors(&self, id: RecordId) -> Ancestors<'_> {
        Ancestors {
            index: self,
            next: self.parent_of(id),
            remaining: self.entries.len(),
        }
    }

    /// Returns `true` when `ancestor` lies on the parent chain of `id`.
    pub fn is_ancestor(&self, ancestor: RecordId, id: RecordId) -> bool {
        self.ancestors(id).any(|candidate| candidate == ancestor)
    }
}

/// Iterator over a record's parent chain, see [`ForestIndex::ancestors`].
#[derive(Debug)]
pub struct Ancestors<'a> {
    index: &'a ForestIndex,
    next: Option<RecordId>,
    remaining: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = RecordId;

    fn next(&mut self) -> Option<Self::Item> {
        // The chain can never be longer than the number of indexed records.
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let current = self.next?;
        self.next = self.index.parent_of(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::siblings;

    fn sample() -> Vec<Arc<Record>> {
        siblings(vec![
            Record::new(1).with_children(vec![
                Record::new(2),
                Record::new(3).with_children(vec![Record::new(5)]),
            ]),
            Record::new(4),
        ])
        .to_vec()
    }

    #[test]
    fn rebuild_indexes_every_record_with_parent_and_depth() {
        let roots = sample();
        let index = ForestIndex::rebuild(&roots).unwrap();

        assert_eq!(index.len(), 5);
        assert_eq!(index.parent_of(RecordId::new(1)), None);
        assert_eq!(index.parent_of(RecordId::new(3)), Some(RecordId::new(1)));
        assert_eq!(index.parent_of(RecordId::new(5)), Some(RecordId::new(3)));
        assert_eq!(index.get(RecordId::new(5)).unwrap().depth(), 2);
        assert_eq!(index.get(RecordId::new(4)).unwrap().depth(), 0);
    }

    #[test]
    fn entries_point_at_the_live_records() {
        let roots = sample();
        let index = ForestIndex::rebuild(&roots).unwrap();
        assert!(Arc::ptr_eq(index.record(RecordId::new(4)).unwrap(), &roots[1]));
        let three = &roots[0].children().unwrap()[1];
        assert!(Arc::ptr_eq(index.record(RecordId::new(3)).unwrap(), three));
    }

    #[test]
    fn duplicate_ids_reject_the_forest() {
        let roots = siblings(vec![
            Record::new(1).with_children(vec![Record::new(2)]),
            Record::new(2),
        ]);
        let err = ForestIndex::rebuild(&roots).unwrap_err();
        assert_eq!(err, ForestError::DuplicateId(RecordId::new(2)));
    }

    #[test]
    fn ancestors_walk_to_the_root() {
        let roots = sample();
        let index = ForestIndex::rebuild(&roots).unwrap();
        let chain: Vec<_> = index.ancestors(RecordId::new(5)).collect();
        assert_eq!(chain, vec![RecordId::new(3), RecordId::new(1)]);
        assert!(index.is_ancestor(RecordId::new(1), RecordId::new(5)));
        assert!(!index.is_ancestor(RecordId::new(4), RecordId::new(5)));
        assert!(!index.is_ancestor(RecordId::new(5), RecordId::new(5)));
    }

    #[test]
    fn deep_chains_do_not_overflow() {
        let mut record = Record::new(0);
        for id in 1..1_000u64 {
            record = Record::new(id).with_children(vec![record]);
        }
        let roots = siblings(vec![record]);
        let index = ForestIndex::rebuild(&roots).unwrap();
        assert_eq!(index.len(), 1_000);
        assert_eq!(index.get(RecordId::new(0)).unwrap().depth(), 999);
    }
}
