use thiserror::Error;

use crate::record::RecordId;

/// Errors raised while indexing, resolving, or editing a forest.
/// 建立索引、解析路徑或編輯森林時的錯誤類型。
///
/// Every variant leaves the last committed snapshot in place. The type is
/// `Clone` so that callers coalesced onto one expansion can share its outcome.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ForestError {
    #[error("record {0} not found")]
    UnknownId(RecordId),
    #[error("record {target} is inside the subtree of record {moved}")]
    CyclicMove { moved: RecordId, target: RecordId },
    #[error("record {0} has not loaded its children; expand it before dropping inside")]
    TargetNotExpanded(RecordId),
    #[error("record id {0} appears more than once in the forest")]
    DuplicateId(RecordId),
    #[error("loading children of record {id} failed: {reason}")]
    LoadFailure { id: RecordId, reason: String },
    #[error("slot {index} is out of range for a sequence of {len} records")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("index disagrees with the forest at record {0}")]
    CorruptIndex(RecordId),
}
