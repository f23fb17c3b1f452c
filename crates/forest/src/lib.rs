//! Hierarchical record forest with drag-and-drop reordering and lazy child loading.
//! 支援拖放重新排序與延遲載入子節點的階層式紀錄森林。

pub mod config;
pub mod error;
pub mod expand;
pub mod forest;
pub mod generator;
pub mod index;
pub mod mutate;
pub mod path;
pub mod record;
pub mod store;

pub use config::{ConfigError, EngineConfig, GeneratorConfig, StoreConfig};
pub use error::ForestError;
pub use expand::{ChildLoader, ExpansionState, LoadError, RowFlags};
pub use forest::{Forest, RowView};
pub use generator::{GeneratedChildLoader, RecordGenerator};
pub use index::{Ancestors, ForestIndex, IndexEntry};
pub use path::Descriptor;
pub use record::{siblings, Record, RecordId, Siblings};
pub use store::{ForestStore, Placement};
