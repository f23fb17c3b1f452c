use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier assigned to each record; unique across a forest.
/// 森林中每筆紀錄的唯一識別碼。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for RecordId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered child sequence shared between snapshots.
/// 於各快照間共享的有序子節點序列。
pub type Siblings = Arc<[Arc<Record>]>;

/// Collects owned records into a shareable sibling sequence.
/// 將紀錄轉為可共享的兄弟序列。
pub fn siblings(records: Vec<Record>) -> Siblings {
    records.into_iter().map(Arc::new).collect()
}

/// Immutable record stored inside the forest.
/// 森林內部的不可變紀錄節點。
///
/// `children` distinguishes "never loaded" (`None`) from "loaded, empty"
/// (`Some` of an empty sequence). The parent of a record is not stored here;
/// it is derived by [`ForestIndex`](crate::ForestIndex) on every rebuild.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Siblings>,
    #[serde(default, flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    /// Constructs a record with no payload and unloaded children.
    /// 建立無欄位、子節點尚未載入的紀錄。
    pub fn new(id: u64) -> Self {
        Self {
            id: RecordId::new(id),
            children: None,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Marks the children as loaded with the provided records.
    /// 以傳入的紀錄設定為已載入的子節點。
    pub fn with_children(mut self, children: Vec<Record>) -> Self {
        self.children = Some(siblings(children));
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns the loaded children, or `None` when they were never fetched.
    /// 取得已載入的子節點；若尚未載入則回傳 `None`。
    pub fn children(&self) -> Option<&[Arc<Record>]> {
        self.children.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.children.is_some()
    }

    pub fn child_count(&self) -> usize {
        self.children().map_or(0, <[Arc<Record>]>::len)
    }

    /// Copy of this record with a replaced child sequence. Grandchildren are
    /// shared with the sequence passed in, not copied.
    pub(crate) fn replace_children(&self, children: Siblings) -> Self {
        Self {
            id: self.id,
            children: Some(children),
            fields: self.fields.clone(),
        }
    }
}
