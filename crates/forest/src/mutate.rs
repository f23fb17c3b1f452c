use std::sync::Arc;

use crate::error::ForestError;
use crate::path::Descriptor;
use crate::record::{Record, Siblings};

/// Applies a descriptor to a sequence and returns the edited copy.
/// 將路徑描述套用至序列，回傳編輯後的新序列。
///
/// Only the sequences along the descriptor's path are rebuilt; every other
/// record is shared with `sequence` by pointer.
pub fn apply(sequence: &[Arc<Record>], descriptor: &Descriptor) -> Result<Siblings, ForestError> {
    match descriptor {
        Descriptor::Remove { index } => {
            let index = *index;
            check_slot(index, sequence.len())?;
            Ok(sequence[..index]
                .iter()
                .chain(&sequence[index + 1..])
                .cloned()
                .collect())
        }
        Descriptor::Insert { index, record } => {
            let index = *index;
            if index > sequence.len() {
                return Err(ForestError::IndexOutOfRange {
                    index,
                    len: sequence.len(),
                });
            }
            Ok(sequence[..index]
                .iter()
                .chain(std::iter::once(record))
                .chain(&sequence[index..])
                .cloned()
                .collect())
        }
        Descriptor::SetChildren { index, children } => {
            check_slot(*index, sequence.len())?;
            let updated = sequence[*index].replace_children(Arc::clone(children));
            Ok(replace_at(sequence, *index, updated))
        }
        Descriptor::Children { index, inner } => {
            check_slot(*index, sequence.len())?;
            let parent = &sequence[*index];
            // Absent children behave as an empty sequence.
            let children = apply(parent.children().unwrap_or_default(), inner)?;
            Ok(replace_at(sequence, *index, parent.replace_children(children)))
        }
    }
}

fn check_slot(index: usize, len: usize) -> Result<(), ForestError> {
    if index < len {
        Ok(())
    } else {
        Err(ForestError::IndexOutOfRange { index, len })
    }
}

fn replace_at(sequence: &[Arc<Record>], index: usize, record: Record) -> Siblings {
    let record = Arc::new(record);
    sequence
        .iter()
        .enumerate()
        .map(|(slot, existing)| {
            if slot == index {
                Arc::clone(&record)
            } else {
                Arc::clone(existing)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{siblings, RecordId};

    fn ids(sequence: &[Arc<Record>]) -> Vec<u64> {
        sequence.iter().map(|record| record.id.as_u64()).collect()
    }

    fn sample() -> Siblings {
        siblings(vec![
            Record::new(1).with_children(vec![
                Record::new(2),
                Record::new(3).with_children(vec![Record::new(5)]),
            ]),
            Record::new(4).with_children(vec![Record::new(6)]),
        ])
    }

    #[test]
    fn remove_and_insert_shift_siblings() {
        let roots = sample();
        let removed = apply(&roots, &Descriptor::Remove { index: 0 }).unwrap();
        assert_eq!(ids(&removed), vec![4]);

        let inserted = apply(
            &roots,
            &Descriptor::Insert {
                index: 2,
                record: Arc::new(Record::new(9)),
            },
        )
        .unwrap();
        assert_eq!(ids(&inserted), vec![1, 4, 9]);
        assert_eq!(ids(&roots), vec![1, 4]);
    }

    #[test]
    fn untouched_subtrees_are_shared() {
        let roots = sample();
        let descriptor = Descriptor::Children {
            index: 0,
            inner: Box::new(Descriptor::Remove { index: 0 }),
        };
        let edited = apply(&roots, &descriptor).unwrap();

        assert!(!Arc::ptr_eq(&edited[0], &roots[0]));
        assert!(Arc::ptr_eq(&edited[1], &roots[1]));
        let old_three = &roots[0].children().unwrap()[1];
        let new_three = &edited[0].children().unwrap()[0];
        assert!(Arc::ptr_eq(old_three, new_three));
        assert_eq!(edited[0].id, RecordId::new(1));
        assert_eq!(roots[0].child_count(), 2);
    }

    #[test]
    fn set_children_replaces_only_the_addressed_record() {
        let roots = sample();
        let loaded = siblings(vec![Record::new(7), Record::new(8)]);
        let descriptor = Descriptor::Children {
            index: 0,
            inner: Box::new(Descriptor::SetChildren {
                index: 0,
                children: Arc::clone(&loaded),
            }),
        };
        let edited = apply(&roots, &descriptor).unwrap();

        let two = &edited[0].children().unwrap()[0];
        assert_eq!(ids(two.children().unwrap()), vec![7, 8]);
        assert!(Arc::ptr_eq(two.children.as_ref().unwrap(), &loaded));
        assert!(!roots[0].children().unwrap()[0].is_loaded());
    }

    #[test]
    fn descending_into_unloaded_children_starts_from_empty() {
        let roots = siblings(vec![Record::new(1)]);
        let descriptor = Descriptor::Children {
            index: 0,
            inner: Box::new(Descriptor::Insert {
                index: 0,
                record: Arc::new(Record::new(2)),
            }),
        };
        let edited = apply(&roots, &descriptor).unwrap();
        assert_eq!(ids(edited[0].children().unwrap()), vec![2]);
    }

    #[test]
    fn out_of_range_slots_are_errors() {
        let roots = sample();
        assert_eq!(
            apply(&roots, &Descriptor::Remove { index: 2 }).unwrap_err(),
            ForestError::IndexOutOfRange { index: 2, len: 2 }
        );
        let insert = Descriptor::Insert {
            index: 3,
            record: Arc::new(Record::new(9)),
        };
        assert_eq!(
            apply(&roots, &insert).unwrap_err(),
            ForestError::IndexOutOfRange { index: 3, len: 2 }
        );
    }
}
