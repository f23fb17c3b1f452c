use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing_subscriber::EnvFilter;
use treegrid_forest::{
    EngineConfig, Forest, ForestStore, GeneratedChildLoader, Placement, Record, RecordGenerator,
    RecordId, RowView,
};

#[derive(Parser)]
#[command(
    name = "treegrid-cli",
    about = "Build, reorder and expand hierarchical record forests",
    author,
    version
)]
struct Cli {
    /// 引擎設定檔（JSON）；不存在時使用預設值。 / Engine config file (JSON); defaults apply when missing.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 產生範例森林並以 JSON 輸出。 / Generate a sample forest and print it as JSON.
    Generate(GenerateArgs),
    /// 移動一筆紀錄並輸出結果森林。 / Move one record and print the resulting forest.
    Move(MoveArgs),
    /// 載入節點的子紀錄並輸出結果森林。 / Load a record's children and print the resulting forest.
    Expand(ExpandArgs),
    /// 以縮排列出可見的列。 / List visible rows, indented by depth.
    Rows(RowsArgs),
}

#[derive(Args)]
struct GenerateArgs {
    /// 每層的紀錄數量，由外而內。 / Records per level, outermost first.
    #[arg(long, value_name = "N", num_args = 1.., value_delimiter = ',')]
    levels: Option<Vec<usize>>,

    /// 亂數種子。 / Random seed.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct MoveArgs {
    /// 森林 JSON 檔案。 / Forest JSON file.
    #[arg(long, value_name = "FILE")]
    input: PathBuf,

    /// 被拖曳的紀錄。 / Record being dragged.
    #[arg(long, value_name = "ID")]
    source: u64,

    /// 放置目標紀錄。 / Record it is dropped on.
    #[arg(long, value_name = "ID")]
    target: u64,

    /// 相對於目標的落點。 / Where the record lands relative to the target.
    #[arg(long, value_enum, default_value_t = PlacementChoice::Before)]
    placement: PlacementChoice,
}

#[derive(Args)]
struct ExpandArgs {
    /// 森林 JSON 檔案。 / Forest JSON file.
    #[arg(long, value_name = "FILE")]
    input: PathBuf,

    /// 要展開的紀錄。 / Record to expand.
    #[arg(long, value_name = "ID")]
    node: u64,

    /// 產生的子紀錄數量；預設沿用設定檔。 / Children to generate; defaults to the config value.
    #[arg(long)]
    count: Option<usize>,
}

#[derive(Args)]
struct RowsArgs {
    /// 森林 JSON 檔案。 / Forest JSON file.
    #[arg(long, value_name = "FILE")]
    input: PathBuf,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum PlacementChoice {
    Before,
    After,
    Inside,
}

impl From<PlacementChoice> for Placement {
    fn from(choice: PlacementChoice) -> Self {
        match choice {
            PlacementChoice::Before => Placement::Before,
            PlacementChoice::After => Placement::After,
            PlacementChoice::Inside => Placement::Inside,
        }
    }
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run() -> Result<()> {
    let Cli { config, command } = Cli::parse();
    let config = match config {
        Some(path) => EngineConfig::load(&path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    match command {
        Commands::Generate(args) => execute_generate(args, &config),
        Commands::Move(args) => execute_move(args),
        Commands::Expand(args) => execute_expand(args, &config),
        Commands::Rows(args) => execute_rows(args),
    }
}

fn execute_generate(args: GenerateArgs, config: &EngineConfig) -> Result<()> {
    let levels = args.levels.unwrap_or_else(|| config.generator.levels.clone());
    if levels.contains(&0) {
        bail!("--levels entries must be greater than zero");
    }
    let seed = args.seed.unwrap_or(config.generator.seed);
    let mut generator = RecordGenerator::starting_at(seed, config.generator.first_id);
    let forest = Forest::new(generator.generate(&levels))
        .context("generated forest is inconsistent")?;
    print_forest(&forest)
}

fn execute_move(args: MoveArgs) -> Result<()> {
    let store = ForestStore::new(read_forest(&args.input)?);
    let forest = store
        .move_to(
            RecordId::new(args.source),
            RecordId::new(args.target),
            args.placement.into(),
        )
        .with_context(|| format!("cannot move record {} onto {}", args.source, args.target))?;
    print_forest(&forest)
}

fn execute_expand(args: ExpandArgs, config: &EngineConfig) -> Result<()> {
    let forest = read_forest(&args.input)?;
    let first_id = match forest.index().ids().max() {
        Some(last) => match last.as_u64().checked_add(1) {
            Some(next) => next,
            None => bail!("record id {last} leaves no room for generated children"),
        },
        None => config.generator.first_id,
    };
    let generator = RecordGenerator::starting_at(config.generator.seed, first_id);
    let mut generator_config = config.generator.clone();
    if let Some(count) = args.count {
        generator_config.children_per_load = count;
    }
    let loader = GeneratedChildLoader::from_config(generator, &generator_config);
    let store = ForestStore::with_config(forest, config.store.clone());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("failed to start async runtime")?;
    let node = RecordId::new(args.node);
    let forest = runtime
        .block_on(store.expand(node, &loader))
        .with_context(|| format!("cannot expand record {node}"))?;
    print_forest(&forest)
}

fn execute_rows(args: RowsArgs) -> Result<()> {
    let forest = read_forest(&args.input)?;
    if forest.is_empty() {
        println!("(empty forest)");
        return Ok(());
    }
    for row in forest.rows() {
        let record = forest
            .lookup(row.id)
            .ok_or_else(|| anyhow!("row {} has no record", row.id))?;
        println!("{}", format_row(&row, record));
    }
    Ok(())
}

fn format_row(row: &RowView, record: &Record) -> String {
    let marker = if row.expanded {
        '-'
    } else if row.can_expand {
        '+'
    } else {
        ' '
    };
    let name: Vec<&str> = ["firstName", "lastName"]
        .iter()
        .filter_map(|key| record.field(key).and_then(Value::as_str))
        .collect();
    let line = format!("{}{marker} {}", "  ".repeat(row.depth), row.id);
    if name.is_empty() {
        line
    } else {
        format!("{line} {}", name.join(" "))
    }
}

fn read_forest(path: &Path) -> Result<Forest> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a valid forest", path.display()))
}

fn print_forest(forest: &Forest) -> Result<()> {
    let json = serde_json::to_string_pretty(forest).context("failed to serialize forest")?;
    println!("{json}");
    Ok(())
}
