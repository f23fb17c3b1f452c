use std::sync::Arc;

use crate::error::ForestError;
use crate::index::ForestIndex;
use crate::record::{Record, RecordId, Siblings};

/// Nested edit addressed by slot positions, from the root sequence down.
/// 以各層位置描述的巢狀編輯指令，自根序列向下定位。
///
/// The outer levels are always [`Descriptor::Children`]; the innermost level
/// carries the actual leaf operation applied to one sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    /// Delete the record at `index`, shifting later siblings left.
    Remove { index: usize },
    /// Insert `record` at `index`, shifting later siblings right.
    Insert { index: usize, record: Arc<Record> },
    /// Replace the children of the record at `index`.
    SetChildren { index: usize, children: Siblings },
    /// Descend into the children of the record at `index`.
    Children { index: usize, inner: Box<Descriptor> },
}

impl Descriptor {
    pub fn index(&self) -> usize {
        match self {
            Self::Remove { index }
            | Self::Insert { index, .. }
            | Self::SetChildren { index, .. }
            | Self::Children { index, .. } => *index,
        }
    }

    /// Slot positions from the root sequence to the leaf operation.
    /// 自根序列至葉節點操作的各層位置。
    pub fn slots(&self) -> Vec<usize> {
        let mut slots = vec![self.index()];
        let mut current = self;
        while let Self::Children { inner, .. } = current {
            slots.push(inner.index());
            current = inner.as_ref();
        }
        slots
    }
}

/// Builds the descriptor that addresses `target` from the root sequence.
/// 由目標紀錄往上走訪祖先鏈，建立從根序列出發的路徑描述。
///
/// `leaf` runs once, for the innermost step, with the target's slot among its
/// siblings and its parent (`None` at the top level). Its result is wrapped in
/// one [`Descriptor::Children`] per ancestor.
pub fn resolve<F>(
    roots: &[Arc<Record>],
    index: &ForestIndex,
    target: RecordId,
    leaf: F,
) -> Result<Descriptor, ForestError>
where
    F: FnOnce(usize, Option<&Arc<Record>>) -> Descriptor,
{
    let (slot, parent) = locate(roots, index, target)?;
    let mut descriptor = leaf(slot, parent);
    let mut current = parent.map(|record| record.id);

    for _ in 0..index.len() {
        let Some(id) = current else {
            return Ok(descriptor);
        };
        let (slot, parent) = locate(roots, index, id)?;
        descriptor = Descriptor::Children {
            index: slot,
            inner: Box::new(descriptor),
        };
        current = parent.map(|record| record.id);
    }

    match current {
        None => Ok(descriptor),
        Some(_) => Err(ForestError::CorruptIndex(target)),
    }
}

fn locate<'a>(
    roots: &'a [Arc<Record>],
    index: &'a ForestIndex,
    id: RecordId,
) -> Result<(usize, Option<&'a Arc<Record>>), ForestError> {
    let entry = index.get(id).ok_or(ForestError::UnknownId(id))?;
    let parent = match entry.parent_id() {
        Some(parent_id) => Some(
            index
                .record(parent_id)
                .ok_or(ForestError::CorruptIndex(id))?,
        ),
        None => None,
    };
    let siblings = match parent {
        Some(record) => record.children().unwrap_or_default(),
        None => roots,
    };
    let slot = siblings
        .iter()
        .position(|record| record.id == id)
        .ok_or(ForestError::CorruptIndex(id))?;
    Ok((slot, parent))
}
