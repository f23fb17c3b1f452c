use std::sync::Arc;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ForestError;
use crate::index::ForestIndex;
use crate::mutate;
use crate::path::{self, Descriptor};
use crate::record::{siblings, Record, RecordId, Siblings};

/// Immutable forest snapshot: root sequence, revision, and derived index.
/// 不可變的森林快照，包含根序列、版本號與推導出的索引。
///
/// Cloning is cheap; every clone shares the same records.
#[derive(Debug, Clone)]
pub struct Forest {
    revision: u64,
    roots: Siblings,
    index: Arc<ForestIndex>,
}

impl Forest {
    /// Builds revision 0 from owned root records.
    /// 以根紀錄建立版本 0 的森林。
    pub fn new(roots: Vec<Record>) -> Result<Self, ForestError> {
        Self::from_siblings(siblings(roots))
    }

    pub fn from_siblings(roots: Siblings) -> Result<Self, ForestError> {
        Self::with_revision(roots, 0)
    }

    pub fn empty() -> Self {
        Self {
            revision: 0,
            roots: Arc::from(Vec::new()),
            index: Arc::new(ForestIndex::default()),
        }
    }

    fn with_revision(roots: Siblings, revision: u64) -> Result<Self, ForestError> {
        let index = ForestIndex::rebuild(&roots)?;
        Ok(Self {
            revision,
            roots,
            index: Arc::new(index),
        })
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn roots(&self) -> &[Arc<Record>] {
        &self.roots
    }

    pub fn siblings(&self) -> &Siblings {
        &self.roots
    }

    pub fn index(&self) -> &ForestIndex {
        &self.index
    }

    /// Total number of records reachable from the roots.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.index.contains(id)
    }

    /// Finds a record by identifier in O(1).
    /// 以識別碼於 O(1) 時間內取得紀錄。
    pub fn lookup(&self, id: RecordId) -> Option<&Arc<Record>> {
        self.index.record(id)
    }

    pub fn parent_of(&self, id: RecordId) -> Option<RecordId> {
        self.index.parent_of(id)
    }

    pub fn depth_of(&self, id: RecordId) -> Option<usize> {
        self.index.get(id).map(|entry| entry.depth())
    }

    /// Resolves the path to `target` within this snapshot.
    /// 在此快照中解析通往 `target` 的路徑。
    pub fn resolve<F>(&self, target: RecordId, leaf: F) -> Result<Descriptor, ForestError>
    where
        F: FnOnce(usize, Option<&Arc<Record>>) -> Descriptor,
    {
        path::resolve(&self.roots, &self.index, target, leaf)
    }

    /// Applies `descriptor` and returns the next revision with a fresh index.
    /// 套用編輯並回傳重建索引後的下一個版本。
    pub fn apply(&self, descriptor: &Descriptor) -> Result<Self, ForestError> {
        let roots = mutate::apply(&self.roots, descriptor)?;
        Self::with_revision(roots, self.revision + 1)
    }

    pub(crate) fn renumbered(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Flattens the loaded part of the forest in display order.
    /// 依顯示順序攤平已載入的節點，供清單呈現使用。
    pub fn rows(&self) -> Vec<RowView> {
        let mut rows = Vec::with_capacity(self.index.len());
        let mut stack: Vec<(&Arc<Record>, Option<RecordId>, usize)> =
            self.roots.iter().rev().map(|record| (record, None, 0)).collect();
        while let Some((record, parent_id, depth)) = stack.pop() {
            rows.push(RowView {
                id: record.id,
                parent_id,
                depth,
                can_expand: record.children().map_or(true, |children| !children.is_empty()),
                expanded: record.is_loaded(),
            });
            if let Some(children) = record.children() {
                stack.extend(
                    children
                        .iter()
                        .rev()
                        .map(|child| (child, Some(record.id), depth + 1)),
                );
            }
        }
        rows
    }
}

impl Serialize for Forest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.roots.iter())
    }
}

impl<'de> Deserialize<'de> for Forest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let roots = Vec::<Record>::deserialize(deserializer)?;
        Forest::new(roots).map_err(DeError::custom)
    }
}

/// One visible row of the forest as a renderer consumes it.
/// 呈現層所需的單列資料。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowView {
    pub id: RecordId,
    pub parent_id: Option<RecordId>,
    pub depth: usize,
    /// `true` unless the children are loaded and empty.
    pub can_expand: bool,
    pub expanded: bool,
}
