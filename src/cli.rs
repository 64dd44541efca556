use clap::{Parser, Subcommand};
use imgpool::config::{Config, ConfigError};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "imgpool")]
#[command(about = "Crawl an image listing and download it with a worker pool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the supervisor with one extraction worker and N download workers
    Run(RunArgs),
    /// Add URLs to the configured work queue
    Seed(SeedArgs),
    /// Print the number of pending URLs in the work queue
    QueueLen(ConfigArgs),
}

#[derive(clap::Args, Debug)]
pub struct ConfigArgs {
    /// Configuration file (defaults to $IMGPOOL_CONFIG or config/imgpool.toml)
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<Config, ConfigError> {
        match &self.config {
            Some(path) => Config::load_from_path(path.clone()),
            None => Config::load(),
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Detach from the terminal before starting the pool
    #[arg(long)]
    pub daemonize: bool,

    /// Number of download workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Directory downloaded files are written to
    #[arg(long)]
    pub save_dir: Option<PathBuf>,
}

impl RunArgs {
    /// Load configuration, apply flag overrides, then validate the result
    pub fn resolve(&self) -> Result<Config, ConfigError> {
        let mut config = Config::load_unvalidated(self.config.config.clone())?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Apply flag overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if self.daemonize {
            config.pool.daemonize = true;
        }
        if let Some(workers) = self.workers {
            config.pool.worker_num = workers;
        }
        if let Some(save_dir) = &self.save_dir {
            config.storage.save_dir = save_dir.clone();
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct SeedArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// URLs to add
    #[arg(required = true)]
    pub urls: Vec<String>,
}
