use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use preflop_coach::progress::DEFAULT_FOCUS;
use preflop_coach::web;
use preflop_coach::{SkillLevel, Trainer, TrainerConfig};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "preflop-coach",
    version,
    about = "Pre-flop decision trainer",
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Number of rounds to play (defaults to 1)
    #[arg(long, default_value_t = 1)]
    rounds: u32,

    /// RNG seed (random if omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Skill level used to pick scenarios
    #[arg(long, default_value = "beginner")]
    level: LevelArg,

    /// Focus area used to pick scenarios
    #[arg(long, default_value = DEFAULT_FOCUS)]
    focus: String,

    /// Disable ANSI colors in CLI output
    #[arg(long = "no-color", default_value_t = false)]
    no_color: bool,

    /// Auto-play rounds using the recommended action (useful for smoke tests)
    #[arg(long, default_value_t = false)]
    auto: bool,

    /// Generate scenarios with the built-in mock coach
    #[arg(long = "mock-ai", default_value_t = false)]
    mock_ai: bool,

    /// Directory for the persistent scenario cache
    #[arg(long = "cache-dir")]
    cache_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the web server
    Serve {
        /// Address to bind (HOST:PORT)
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: String,
    },
}

#[derive(Debug, Clone, ValueEnum)]
enum LevelArg {
    Beginner,
    Intermediate,
    Advanced,
}

impl From<LevelArg> for SkillLevel {
    fn from(arg: LevelArg) -> Self {
        match arg {
            LevelArg::Beginner => SkillLevel::Beginner,
            LevelArg::Intermediate => SkillLevel::Intermediate,
            LevelArg::Advanced => SkillLevel::Advanced,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = color_eyre::install();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let config = TrainerConfig {
        rounds: cli.rounds,
        seed: cli.seed,
        level: cli.level.clone().into(),
        focus: cli.focus.clone(),
        no_color: cli.no_color,
        mock_ai: cli.mock_ai,
        cache_dir: cli.cache_dir.clone(),
        ..TrainerConfig::default()
    };

    match cli.command {
        Some(Commands::Serve { addr }) => run_server(addr, config).await?,
        None => run_cli(cli.auto, config).await?,
    }

    Ok(())
}

async fn run_cli(auto: bool, config: TrainerConfig) -> Result<()> {
    let mut trainer = Trainer::new(config).await?;
    if auto {
        let summary = trainer.autoplay_recommended().await?;
        trainer.print_summary(&summary);
    } else {
        trainer.run().await?;
    }
    Ok(())
}

async fn run_server(addr: String, config: TrainerConfig) -> Result<()> {
    let addr: SocketAddr = addr.parse()?;
    web::serve(addr, config).await
}
