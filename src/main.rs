mod cli;

use clap::Parser;
use cli::{Cli, Commands, ConfigArgs, RunArgs, SeedArgs};
use imgpool::config::QueueBackend;
use imgpool::observability::init_tracing;
use imgpool::queue;
use imgpool::supervisor::{self, Supervisor};
use tokio::runtime::Runtime;
use tracing::info;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), AnyError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Seed(args) => seed(args),
        Commands::QueueLen(args) => queue_len(args),
    }
}

fn run(args: RunArgs) -> Result<(), AnyError> {
    let config = args.resolve()?;
    init_tracing(&config.logging)?;

    // Forks when daemonizing, so no runtime threads may exist yet
    supervisor::prepare_process(&config)?;

    let summary = runtime()?.block_on(Supervisor::builder().config(config).build().run())?;
    info!(
        saved = summary.totals.saved,
        already_present = summary.totals.already_present,
        failed = summary.totals.failed,
        aborted = summary.aborted,
        panicked = summary.panicked,
        "Supervisor finished"
    );
    Ok(())
}

fn seed(args: SeedArgs) -> Result<(), AnyError> {
    let config = args.config.load()?;
    init_tracing(&config.logging)?;

    if config.queue.backend == QueueBackend::Memory {
        return Err("seeding needs a shared queue backend (redis or fjall), not memory".into());
    }

    runtime()?.block_on(async {
        let queue = queue::connect(&config.queue).await?;
        let inserted = queue.add_members(&config.queue.key, &args.urls).await?;
        queue.flush().await?;
        info!(key = %config.queue.key, requested = args.urls.len(), inserted, "Seeded queue");
        Ok::<(), AnyError>(())
    })
}

fn queue_len(args: ConfigArgs) -> Result<(), AnyError> {
    let config = args.load()?;
    init_tracing(&config.logging)?;

    let len = runtime()?.block_on(async {
        let queue = queue::connect(&config.queue).await?;
        queue.len(&config.queue.key).await
    })?;
    println!("{len}");
    Ok(())
}

fn runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}
