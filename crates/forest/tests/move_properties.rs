use std::sync::Arc;

use proptest::prelude::*;
use proptest::sample::Index;
use treegrid_forest::{
    Forest, ForestError, ForestStore, GeneratedChildLoader, Placement, RecordGenerator, RecordId,
};

fn placement(raw: u8) -> Placement {
    match raw % 3 {
        0 => Placement::Before,
        1 => Placement::After,
        _ => Placement::Inside,
    }
}

fn shape(forest: &Forest) -> Vec<(RecordId, usize)> {
    forest.rows().iter().map(|row| (row.id, row.depth)).collect()
}

fn sorted_ids(forest: &Forest) -> Vec<RecordId> {
    let mut ids: Vec<_> = forest.index().ids().collect();
    ids.sort();
    ids
}

/// Every reachable record is indexed with the parent and depth it is
/// actually found under.
fn assert_index_complete(forest: &Forest) {
    let rows = forest.rows();
    assert_eq!(rows.len(), forest.len());
    for row in rows {
        let entry = forest.index().get(row.id).expect("row missing from index");
        assert_eq!(entry.parent_id(), row.parent_id);
        assert_eq!(entry.depth(), row.depth);
        if let Some(parent) = row.parent_id {
            let children = forest.lookup(parent).and_then(|record| record.children());
            assert!(children
                .unwrap_or_default()
                .iter()
                .any(|child| child.id == row.id));
        }
    }
}

/// Move that puts `id` back where it sits in `forest`.
fn restoring_move(forest: &Forest, id: RecordId) -> Option<(RecordId, Placement)> {
    let parent = forest.parent_of(id);
    let siblings = match parent {
        Some(parent) => forest.lookup(parent)?.children()?,
        None => forest.roots(),
    };
    let slot = siblings.iter().position(|record| record.id == id)?;
    if let Some(next) = siblings.get(slot + 1) {
        Some((next.id, Placement::Before))
    } else if slot > 0 {
        Some((siblings[slot - 1].id, Placement::After))
    } else {
        parent.map(|parent| (parent, Placement::Inside))
    }
}

fn levels() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..4, 1..4)
}

proptest! {
    #[test]
    fn moves_and_expansions_preserve_records_and_index(
        seed in any::<u64>(),
        levels in levels(),
        steps in prop::collection::vec(
            (any::<Index>(), any::<Index>(), any::<u8>(), any::<bool>()),
            0..24,
        ),
    ) {
        let mut generator = RecordGenerator::new(seed);
        let forest = Forest::new(generator.generate(&levels)).unwrap();
        let mut expected = sorted_ids(&forest);
        let store = ForestStore::new(forest);
        let loader = GeneratedChildLoader::new(generator, 2);
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

        for (source, target, raw, expand) in steps {
            let before = store.snapshot();
            let ids = sorted_ids(&before);
            let source = *source.get(&ids);
            let target = *target.get(&ids);

            if expand {
                let collapsed = !before.lookup(target).unwrap().is_loaded();
                let after = runtime.block_on(store.expand(target, &loader)).unwrap();
                let grown = if collapsed { 2 } else { 0 };
                prop_assert_eq!(after.len(), expected.len() + grown);
                let kept = sorted_ids(&after);
                prop_assert!(expected.iter().all(|id| kept.binary_search(id).is_ok()));
                expected = kept;
                assert_index_complete(&after);
                continue;
            }

            let placement = placement(raw);
            let refusal = if before.index().is_ancestor(source, target) {
                Some(ForestError::CyclicMove { moved: source, target })
            } else if source != target
                && placement == Placement::Inside
                && !before.lookup(target).unwrap().is_loaded()
            {
                Some(ForestError::TargetNotExpanded(target))
            } else {
                None
            };

            match store.move_to(source, target, placement) {
                Ok(after) => {
                    prop_assert_eq!(refusal, None);
                    prop_assert_eq!(sorted_ids(&after), expected.clone());
                    assert_index_complete(&after);
                }
                Err(err) => {
                    prop_assert_eq!(Some(err), refusal);
                    prop_assert!(Arc::ptr_eq(&before, &store.snapshot()));
                }
            }
        }
    }

    #[test]
    fn moving_back_restores_shape(
        seed in any::<u64>(),
        levels in levels(),
        source in any::<Index>(),
        target in any::<Index>(),
        raw in any::<u8>(),
    ) {
        let forest = Forest::new(RecordGenerator::new(seed).generate(&levels)).unwrap();
        let ids = sorted_ids(&forest);
        let source = *source.get(&ids);
        let target = *target.get(&ids);
        let original = shape(&forest);
        let restore = restoring_move(&forest, source);
        let store = ForestStore::new(forest);

        prop_assume!(store.move_to(source, target, placement(raw)).is_ok());
        if let Some((neighbour, placement)) = restore {
            let restored = store.move_to(source, neighbour, placement).unwrap();
            prop_assert_eq!(shape(&restored), original);
        }
    }

    #[test]
    fn self_moves_never_publish(seed in any::<u64>(), levels in levels(), pick in any::<Index>()) {
        let forest = Forest::new(RecordGenerator::new(seed).generate(&levels)).unwrap();
        let id = *pick.get(&sorted_ids(&forest));
        let store = ForestStore::new(forest);
        let before = store.snapshot();
        for placement in [Placement::Before, Placement::After, Placement::Inside] {
            let after = store.move_to(id, id, placement).unwrap();
            prop_assert!(Arc::ptr_eq(&before, &after));
        }
    }
}

#[test]
fn root_cannot_move_under_its_child() {
    let store = ForestStore::new(
        serde_json::from_str::<Forest>(r#"[{ "id": 1, "children": [{ "id": 2 }] }]"#).unwrap(),
    );
    let before = store.snapshot();
    let err = store
        .move_record(RecordId::new(1), RecordId::new(2))
        .unwrap_err();
    assert_eq!(
        err,
        ForestError::CyclicMove {
            moved: RecordId::new(1),
            target: RecordId::new(2)
        }
    );
    assert!(Arc::ptr_eq(&before, &store.snapshot()));
}
