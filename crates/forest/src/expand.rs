use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::error::ForestError;
use crate::forest::Forest;
use crate::path::Descriptor;
use crate::record::{Record, RecordId, Siblings};
use crate::store::{lock, ExpansionOutcome, ForestStore};

/// Failure reported by a [`ChildLoader`].
/// 子節點載入器回報的錯誤。
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct LoadError(String);

impl LoadError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    pub fn reason(&self) -> &str {
        &self.0
    }
}

/// Asynchronous source of a record's children.
/// 非同步提供紀錄子節點的來源。
///
/// Closures `Fn(RecordId) -> impl Future<Output = Result<Vec<Record>, LoadError>>`
/// implement this trait directly.
pub trait ChildLoader: Sync {
    fn load(
        &self,
        parent: RecordId,
    ) -> impl Future<Output = Result<Vec<Record>, LoadError>> + Send;
}

impl<F, Fut> ChildLoader for F
where
    F: Fn(RecordId) -> Fut + Sync,
    Fut: Future<Output = Result<Vec<Record>, LoadError>> + Send,
{
    fn load(
        &self,
        parent: RecordId,
    ) -> impl Future<Output = Result<Vec<Record>, LoadError>> + Send {
        self(parent)
    }
}

/// Expansion state of one record.
/// 單一紀錄的展開狀態。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionState {
    /// Children were never loaded.
    Collapsed,
    /// A fetch is in flight.
    Loading,
    /// Children are present, possibly empty.
    Expanded,
}

/// Flags a renderer shows next to a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RowFlags {
    pub expanded: bool,
    pub loading: bool,
}

enum Begin<'a> {
    Started(ExpansionTicket<'a>),
    Waiting(watch::Receiver<ExpansionOutcome>),
    Expanded(Arc<Forest>),
}

/// Marks one record as loading for as long as it lives.
struct ExpansionTicket<'a> {
    store: &'a ForestStore,
    id: RecordId,
    sender: watch::Sender<ExpansionOutcome>,
}

impl ExpansionTicket<'_> {
    fn finish(self, outcome: Result<(), ForestError>) {
        self.sender.send_replace(Some(outcome));
    }
}

impl Drop for ExpansionTicket<'_> {
    fn drop(&mut self) {
        lock(&self.store.loading).remove(&self.id);
    }
}

impl ForestStore {
    /// Returns the expansion state of `id`, or `None` for unknown records.
    /// 取得紀錄的展開狀態；未知紀錄回傳 `None`。
    pub fn expansion_state(&self, id: RecordId) -> Option<ExpansionState> {
        let loaded = self.snapshot().lookup(id)?.is_loaded();
        if loaded {
            Some(ExpansionState::Expanded)
        } else if lock(&self.loading).contains_key(&id) {
            Some(ExpansionState::Loading)
        } else {
            Some(ExpansionState::Collapsed)
        }
    }

    pub fn row_flags(&self, id: RecordId) -> RowFlags {
        match self.expansion_state(id) {
            Some(ExpansionState::Expanded) => RowFlags {
                expanded: true,
                loading: false,
            },
            Some(ExpansionState::Loading) => RowFlags {
                expanded: false,
                loading: true,
            },
            _ => RowFlags::default(),
        }
    }

    /// Loads and attaches the children of `id`.
    /// 載入並掛上 `id` 的子節點。
    ///
    /// An already expanded record returns the current snapshot without
    /// calling `loader`. A second call for a record that is still loading
    /// waits for the first fetch and shares its outcome. On failure the
    /// record stays collapsed and the forest is unchanged.
    pub async fn expand<L>(&self, id: RecordId, loader: &L) -> Result<Arc<Forest>, ForestError>
    where
        L: ChildLoader + ?Sized,
    {
        let ticket = match self.begin_expansion(id)? {
            Begin::Started(ticket) => ticket,
            Begin::Waiting(receiver) => return self.join_expansion(id, receiver).await,
            Begin::Expanded(forest) => {
                trace!(record = %id, "already expanded");
                return Ok(forest);
            }
        };

        let outcome = self.load_children(id, loader).await;
        ticket.finish(outcome.as_ref().map(|_| ()).map_err(Clone::clone));
        outcome
    }

    fn begin_expansion(&self, id: RecordId) -> Result<Begin<'_>, ForestError> {
        let mut loading = lock(&self.loading);
        let forest = self.snapshot();
        let record = forest.lookup(id).ok_or(ForestError::UnknownId(id))?;
        if record.is_loaded() {
            return Ok(Begin::Expanded(forest));
        }
        if let Some(receiver) = loading.get(&id) {
            return Ok(Begin::Waiting(receiver.clone()));
        }
        let (sender, receiver) = watch::channel(None);
        loading.insert(id, receiver);
        Ok(Begin::Started(ExpansionTicket {
            store: self,
            id,
            sender,
        }))
    }

    async fn join_expansion(
        &self,
        id: RecordId,
        mut receiver: watch::Receiver<ExpansionOutcome>,
    ) -> Result<Arc<Forest>, ForestError> {
        trace!(record = %id, "joining in-flight expansion");
        let outcome = receiver
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| outcome.clone());
        match outcome {
            Some(Ok(())) => Ok(self.snapshot()),
            Some(Err(err)) => Err(err),
            None => Err(ForestError::LoadFailure {
                id,
                reason: "expansion was cancelled".to_owned(),
            }),
        }
    }

    async fn load_children<L>(&self, id: RecordId, loader: &L) -> Result<Arc<Forest>, ForestError>
    where
        L: ChildLoader + ?Sized,
    {
        debug!(record = %id, "loading children");
        let fetched = match self.config.load_timeout() {
            Some(limit) => tokio::time::timeout(limit, loader.load(id))
                .await
                .unwrap_or_else(|_| {
                    Err(LoadError::new(format!(
                        "timed out after {}ms",
                        limit.as_millis()
                    )))
                }),
            None => loader.load(id).await,
        };
        let children = fetched.map_err(|err| {
            warn!(record = %id, error = %err, "child load failed");
            ForestError::LoadFailure {
                id,
                reason: err.to_string(),
            }
        })?;
        let count = children.len();

        // Resolved against whatever snapshot is current now; moves may have
        // landed while the loader was running. Children that appeared in the
        // meantime are kept ahead of the loaded ones.
        let forest = self.commit(|forest| {
            let present = forest
                .lookup(id)
                .and_then(|record| record.children())
                .unwrap_or_default();
            let children: Siblings = present
                .iter()
                .cloned()
                .chain(children.into_iter().map(Arc::new))
                .collect();
            let descriptor =
                forest.resolve(id, |slot, _| Descriptor::SetChildren { index: slot, children })?;
            forest.apply(&descriptor).map(Some)
        })?;
        debug!(record = %id, count, revision = forest.revision(), "children attached");
        Ok(forest)
    }
}
