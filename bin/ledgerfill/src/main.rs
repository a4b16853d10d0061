//! Ledgerfill: parallel back-fill and gap-repair engine binary.
//!
//! Exposes the engine's three entry points as subcommands: `backfill` (the
//! default two-sweep pipeline), `find-missing-blocks` (direct Gap Finder
//! exposure), and `init-db` (schema reflection/bootstrap check).

use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use ledgerfill_engine::{
    AccountsSideband, BackfillConfig, GapFinder, NoopLiveTail, PipelineCoordinator,
    RpcBatchClient, SchemaRegistry,
};

#[derive(Debug, Parser)]
#[command(name = "ledgerfill", about = "Parallel back-fill and gap-repair engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Runs the full two-sweep back-fill pipeline over a block range.
    Backfill(BackfillConfig),
    /// Prints a JSON array of the block numbers missing from the store.
    FindMissingBlocks(FindMissingBlocksArgs),
    /// Reflects the store's schema and reports whether it's complete.
    InitDb(InitDbArgs),
}

#[derive(Debug, Args)]
struct FindMissingBlocksArgs {
    /// Store connection string.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
    /// First block height to check.
    #[arg(long, env = "START_BLOCK")]
    start_block: i64,
    /// Last block height to check.
    #[arg(long, env = "END_BLOCK")]
    end_block: i64,
}

#[derive(Debug, Args)]
struct InitDbArgs {
    /// Store connection string.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    let log_json = matches!(&cli.command, Command::Backfill(cfg) if cfg.log_json);
    init_tracing(log_json);

    match cli.command {
        Command::Backfill(config) => run_backfill(config).await,
        Command::FindMissingBlocks(args) => run_find_missing_blocks(args).await,
        Command::InitDb(args) => run_init_db(args).await,
    }
}

fn init_tracing(log_json: bool) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env());
    if log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

async fn run_backfill(config: BackfillConfig) -> eyre::Result<()> {
    config.validate()?;

    let pool = PgPoolOptions::new()
        .min_connections(config.writer_pool_size)
        .max_connections(config.writer_pool_size)
        .connect(&config.database_url)
        .await?;

    info!("reflecting schema");
    let registry = SchemaRegistry::reflect(&pool).await?;

    let end_block = match config.end_block {
        Some(end) => end as i64,
        None => last_irreversible_block_num(&config.upstream_url).await?,
    };

    let accounts = AccountsSideband::new(pool.clone());
    if let Some(path) = &config.accounts_file {
        let contents = tokio::fs::read_to_string(path).await?;
        let names: Vec<String> = serde_json::from_str(&contents)?;
        info!(count = names.len(), "preloading accounts file");
        accounts.preload(&names).await?;
    }

    let gap_finder = GapFinder::new(pool.clone());
    let rpc = RpcBatchClient::new(config.upstream_url.parse()?);
    let writer = ledgerfill_engine::BlockWriter::new(pool, registry);

    let coordinator = PipelineCoordinator::new(
        gap_finder,
        rpc,
        writer,
        accounts,
        config.jsonrpc_batch_size,
        config.concurrency,
    );

    let report = coordinator
        .run(config.start_block as i64, end_block)
        .await?;
    info!(
        written = report.written.len(),
        failed = report.failed.len(),
        "back-fill complete"
    );

    let tail = NoopLiveTail;
    ledgerfill_engine::LiveTail::resume_from(&tail, end_block).await?;

    Ok(())
}

async fn run_find_missing_blocks(args: FindMissingBlocksArgs) -> eyre::Result<()> {
    let pool = PgPoolOptions::new().connect(&args.database_url).await?;
    let gap_finder = GapFinder::new(pool);
    let missing = gap_finder
        .collect_missing(args.start_block, args.end_block)
        .await?;
    println!("{}", serde_json::to_string(&missing)?);
    Ok(())
}

async fn run_init_db(args: InitDbArgs) -> eyre::Result<()> {
    let pool = PgPoolOptions::new().connect(&args.database_url).await?;
    SchemaRegistry::reflect(&pool).await?;
    info!("schema reflected successfully, store is ready");
    Ok(())
}

async fn last_irreversible_block_num(upstream_url: &str) -> eyre::Result<i64> {
    let client = reqwest::Client::new();
    let body = serde_json::json!({
        "id": 1,
        "jsonrpc": "2.0",
        "method": "get_dynamic_global_properties",
        "params": [],
    });
    let resp: serde_json::Value = client
        .post(upstream_url)
        .json(&body)
        .send()
        .await?
        .json()
        .await?;
    resp.get("result")
        .and_then(|r| r.get("last_irreversible_block_num"))
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| eyre::eyre!("upstream did not return last_irreversible_block_num"))
}
