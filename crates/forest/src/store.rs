use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::config::StoreConfig;
use crate::error::ForestError;
use crate::forest::Forest;
use crate::path::Descriptor;
use crate::record::{Record, RecordId};

/// Where a moved record lands relative to the drop target.
/// 被移動紀錄相對於放置目標的落點。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Sibling directly before the target, sharing its parent.
    #[default]
    Before,
    /// Sibling directly after the target, sharing its parent.
    After,
    /// Last child of the target.
    Inside,
}

pub(crate) type ExpansionOutcome = Option<Result<(), ForestError>>;

/// Owner of the current forest snapshot and entry point for edits.
/// 持有目前森林快照並負責所有編輯操作的入口。
///
/// Readers load the snapshot without blocking. Writers serialize on an
/// internal commit lock, so every edit starts from the latest committed
/// snapshot and readers never observe a half-applied edit.
#[derive(Debug)]
pub struct ForestStore {
    current: ArcSwap<Forest>,
    commit_lock: Mutex<()>,
    pub(crate) loading: Mutex<HashMap<RecordId, watch::Receiver<ExpansionOutcome>>>,
    pub(crate) config: StoreConfig,
}

impl ForestStore {
    pub fn new(forest: Forest) -> Self {
        Self::with_config(forest, StoreConfig::default())
    }

    pub fn with_config(forest: Forest, config: StoreConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(forest),
            commit_lock: Mutex::new(()),
            loading: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the current snapshot.
    /// 取得目前的快照。
    pub fn snapshot(&self) -> Arc<Forest> {
        self.current.load_full()
    }

    /// Finds a record in the current snapshot.
    /// 於目前快照中尋找紀錄。
    pub fn lookup(&self, id: RecordId) -> Option<Arc<Record>> {
        self.current.load().lookup(id).cloned()
    }

    /// Replaces the whole forest, e.g. after the data source reloaded.
    /// 以新資料整體取代森林。
    pub fn reset(&self, forest: Forest) -> Arc<Forest> {
        let _guard = lock(&self.commit_lock);
        let base = self.current.load();
        let next = Arc::new(forest.renumbered(base.revision() + 1));
        self.current.store(Arc::clone(&next));
        debug!(revision = next.revision(), records = next.len(), "forest replaced");
        next
    }

    /// Answers the drag source's drop query: `true` when moving `source`
    /// next to `target` would be accepted.
    /// 回答拖放來源的查詢：將 `source` 移至 `target` 是否可被接受。
    pub fn can_accept_drop(&self, source: RecordId, target: RecordId) -> bool {
        self.can_accept_drop_at(source, target, Placement::Before)
    }

    /// Like [`can_accept_drop`](Self::can_accept_drop) for a given placement.
    /// Dropping inside a record whose children were never loaded is refused.
    pub fn can_accept_drop_at(&self, source: RecordId, target: RecordId, placement: Placement) -> bool {
        let forest = self.current.load();
        source != target
            && check_move(&forest, source, target).is_ok()
            && check_placement(&forest, target, placement).is_ok()
    }

    /// Moves `source` to sit directly before `target`, under `target`'s parent.
    /// 將 `source` 移到 `target` 之前，成為其兄弟節點。
    pub fn move_record(&self, source: RecordId, target: RecordId) -> Result<Arc<Forest>, ForestError> {
        self.move_to(source, target, Placement::Before)
    }

    /// Moves `source` relative to `target` according to `placement`.
    /// 依 `placement` 將 `source` 移動至 `target` 周圍或其內部。
    ///
    /// Moving a record onto itself returns the current snapshot unchanged.
    pub fn move_to(
        &self,
        source: RecordId,
        target: RecordId,
        placement: Placement,
    ) -> Result<Arc<Forest>, ForestError> {
        self.commit(|forest| plan_move(forest, source, target, placement))
    }

    /// Runs `edit` against the latest snapshot and publishes its result.
    /// `Ok(None)` keeps the current snapshot.
    pub(crate) fn commit<F>(&self, edit: F) -> Result<Arc<Forest>, ForestError>
    where
        F: FnOnce(&Forest) -> Result<Option<Forest>, ForestError>,
    {
        let _guard = lock(&self.commit_lock);
        let base = self.current.load_full();
        match edit(&base) {
            Ok(Some(next)) => {
                let next = Arc::new(next);
                self.current.store(Arc::clone(&next));
                Ok(next)
            }
            Ok(None) => Ok(base),
            Err(err) => {
                warn!(revision = base.revision(), error = %err, "forest edit rejected");
                Err(err)
            }
        }
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn check_move(forest: &Forest, source: RecordId, target: RecordId) -> Result<(), ForestError> {
    if !forest.contains(source) {
        return Err(ForestError::UnknownId(source));
    }
    if !forest.contains(target) {
        return Err(ForestError::UnknownId(target));
    }
    if forest.index().is_ancestor(source, target) {
        return Err(ForestError::CyclicMove {
            moved: source,
            target,
        });
    }
    Ok(())
}

fn check_placement(forest: &Forest, target: RecordId, placement: Placement) -> Result<(), ForestError> {
    if placement != Placement::Inside {
        return Ok(());
    }
    match forest.lookup(target) {
        Some(record) if record.is_loaded() => Ok(()),
        Some(_) => Err(ForestError::TargetNotExpanded(target)),
        None => Err(ForestError::UnknownId(target)),
    }
}

fn plan_move(
    forest: &Forest,
    source: RecordId,
    target: RecordId,
    placement: Placement,
) -> Result<Option<Forest>, ForestError> {
    check_move(forest, source, target)?;
    if source == target {
        trace!(record = %source, "move onto itself ignored");
        return Ok(None);
    }
    check_placement(forest, target, placement)?;
    let moved = forest
        .lookup(source)
        .cloned()
        .ok_or(ForestError::UnknownId(source))?;

    let removal = forest.resolve(source, |slot, _| Descriptor::Remove { index: slot })?;
    let detached = forest.apply(&removal)?;

    // The destination is resolved against the detached snapshot so that its
    // slot already accounts for the removal.
    let mut new_parent = None;
    let insertion = match placement {
        Placement::Before | Placement::After => {
            let offset = usize::from(placement == Placement::After);
            detached.resolve(target, |slot, parent| {
                new_parent = parent.map(|record| record.id);
                Descriptor::Insert {
                    index: slot + offset,
                    record: moved,
                }
            })?
        }
        Placement::Inside => {
            let tail = detached
                .lookup(target)
                .map_or(0, |record| record.child_count());
            new_parent = Some(target);
            detached.resolve(target, |slot, _| Descriptor::Children {
                index: slot,
                inner: Box::new(Descriptor::Insert {
                    index: tail,
                    record: moved,
                }),
            })?
        }
    };
    let placed = detached.apply(&insertion)?.renumbered(forest.revision() + 1);

    debug_assert_eq!(placed.parent_of(source), new_parent);
    debug!(
        record = %source,
        target = %target,
        ?placement,
        new_parent = ?new_parent,
        revision = placed.revision(),
        "record moved"
    );
    Ok(Some(placed))
}
