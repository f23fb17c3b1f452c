use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::config::GeneratorConfig;
use crate::expand::{ChildLoader, LoadError};
use crate::record::{Record, RecordId};
use crate::store::lock;

const FIRST_NAMES: &[&str] = &[
    "ada", "grace", "alan", "edsger", "barbara", "ken", "dennis", "margaret", "linus", "radia",
    "frances", "john",
];
const LAST_NAMES: &[&str] = &[
    "lovelace", "hopper", "turing", "dijkstra", "liskov", "thompson", "ritchie", "hamilton",
    "torvalds", "perlman", "allen", "backus",
];

/// Deterministic source of sample person records.
/// 可重現的範例人員資料產生器。
///
/// Owns the id counter, so two generators built from the same seed and first
/// id produce identical forests.
#[derive(Debug, Clone)]
pub struct RecordGenerator {
    next_id: u64,
    seed: u64,
    rng: SmallRng,
}

impl RecordGenerator {
    pub fn new(seed: u64) -> Self {
        Self::starting_at(seed, 0)
    }

    pub fn starting_at(seed: u64, first_id: u64) -> Self {
        Self {
            next_id: first_id,
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::starting_at(config.seed, config.first_id)
    }

    /// Next id that will be handed out.
    pub fn next_id(&self) -> RecordId {
        RecordId::new(self.next_id)
    }

    /// Rewinds the counter and the random stream.
    /// 重設識別碼計數器與亂數序列。
    pub fn reset(&mut self, first_id: u64) {
        self.next_id = first_id;
        self.rng = SmallRng::seed_from_u64(self.seed);
    }

    /// One record with a random payload and children left unloaded.
    pub fn person(&mut self) -> Record {
        let id = self.next_id;
        self.next_id += 1;

        let roll: f64 = self.rng.random();
        let status = if roll > 0.66 {
            "relationship"
        } else if roll > 0.33 {
            "complicated"
        } else {
            "single"
        };

        Record::new(id)
            .with_field("firstName", self.pick(FIRST_NAMES))
            .with_field("lastName", self.pick(LAST_NAMES))
            .with_field("age", self.rng.random_range(0..30u32))
            .with_field("visits", self.rng.random_range(0..100u32))
            .with_field("progress", self.rng.random_range(0..100u32))
            .with_field("status", status)
            .with_field("hasChildren", true)
    }

    /// Builds `levels[0]` records, each holding `levels[1]` children, and so
    /// on. Records on the last level keep their children unloaded.
    /// 依各層數量建立巢狀紀錄；最內層的子節點維持未載入。
    ///
    /// Ids are assigned in pre-order: a parent always precedes its children.
    pub fn generate(&mut self, levels: &[usize]) -> Vec<Record> {
        let Some((&count, rest)) = levels.split_first() else {
            return Vec::new();
        };
        (0..count)
            .map(|_| {
                let record = self.person();
                if rest.is_empty() {
                    record
                } else {
                    let children = self.generate(rest);
                    record.with_children(children)
                }
            })
            .collect()
    }

    fn pick(&mut self, names: &[&str]) -> String {
        names[self.rng.random_range(0..names.len())].to_owned()
    }
}

/// [`ChildLoader`] serving freshly generated records.
/// 以產生器提供子節點的載入器。
#[derive(Debug)]
pub struct GeneratedChildLoader {
    generator: Mutex<RecordGenerator>,
    count: usize,
    delay: Option<Duration>,
}

impl GeneratedChildLoader {
    pub fn new(generator: RecordGenerator, count: usize) -> Self {
        Self {
            generator: Mutex::new(generator),
            count,
            delay: None,
        }
    }

    /// Loader continuing the id sequence of `generator`, sized and delayed
    /// as `config` says.
    pub fn from_config(generator: RecordGenerator, config: &GeneratorConfig) -> Self {
        let loader = Self::new(generator, config.children_per_load);
        match config.load_delay() {
            Duration::ZERO => loader,
            delay => loader.with_delay(delay),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl ChildLoader for GeneratedChildLoader {
    async fn load(&self, parent: RecordId) -> Result<Vec<Record>, LoadError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let children = lock(&self.generator).generate(&[self.count]);
        trace!(record = %parent, count = children.len(), "generated children");
        Ok(children)
    }
}
