use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pong_agent_core::corpus::{self, CorpusGrid};
use pong_agent_core::game::{NetworkPolicy, OptimalPolicy, Pong};
use pong_agent_core::{EpochSummary, Network, RunConfig};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pong-agent", about = "Train a feed-forward Pong paddle controller")]
struct Cli {
    /// JSON run configuration (`game` and `training` sections); defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Enumerate labeled states and write them as CSV.
    Generate {
        #[arg(long, default_value = "statesdata.csv")]
        out: PathBuf,
    },
    /// Train on a corpus and report per-epoch diagnostics.
    Train(TrainArgs),
    /// Train, then let the network drive a headless game.
    Play {
        #[command(flatten)]
        train: TrainArgs,
        #[arg(long, default_value_t = 10_000)]
        frames: usize,
    },
}

#[derive(Args)]
struct TrainArgs {
    /// CSV corpus; generated in memory when omitted.
    #[arg(long)]
    data: Option<PathBuf>,
    #[arg(long)]
    epochs: Option<usize>,
    #[arg(long)]
    learning_rate: Option<f64>,
    #[arg(long)]
    seed: Option<u64>,
    /// Write each epoch summary as a JSON line.
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<RunConfig> {
    match &cli.config {
        Some(path) => RunConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(RunConfig::default()),
    }
}

fn train(config: &mut RunConfig, args: &TrainArgs) -> Result<Network> {
    if let Some(epochs) = args.epochs {
        config.training.epochs = epochs;
    }
    if let Some(lr) = args.learning_rate {
        config.training.learning_rate = lr;
    }
    if let Some(seed) = args.seed {
        config.training.seed = seed;
    }
    config.validate().context("invalid training settings")?;

    let states = match &args.data {
        Some(path) => corpus::read_csv_file(path)
            .with_context(|| format!("reading corpus {}", path.display()))?,
        None => corpus::generate_states(&CorpusGrid::from_game(&config.game)),
    };
    tracing::info!(states = states.len(), "loaded corpus");
    let (samples, labels) = corpus::into_training_set(&states);

    let settings = &config.training;
    let mut network = Network::try_new(&settings.architecture, settings.seed)?;
    let mut summary_out = match &args.summary_out {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => None,
    };

    let start = Instant::now();
    let epochs = network.train(&samples, &labels, settings.learning_rate, settings.epochs)?;
    let total = epochs.len();
    for summary in epochs {
        report(&summary, total);
        if let Some(out) = summary_out.as_mut() {
            serde_json::to_writer(&mut *out, &summary)?;
            writeln!(out)?;
        }
    }
    if let Some(mut out) = summary_out {
        out.flush()?;
    }

    let accuracy = network.accuracy(&samples, &labels)?;
    tracing::info!(
        elapsed = ?start.elapsed(),
        accuracy_pct = accuracy * 100.0,
        "training complete"
    );
    Ok(network)
}

fn report(summary: &EpochSummary, total: usize) {
    tracing::info!(
        "Epoch {}/{} - Loss: {:.6} - Max Gradient: {:.6} - Min Gradient: {:.6}",
        summary.epoch,
        total,
        summary.mean_loss,
        summary.max_gradient,
        summary.min_gradient
    );
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match &cli.command {
        Command::Generate { out } => {
            config.game.validate()?;
            let states = corpus::generate_states(&CorpusGrid::from_game(&config.game));
            corpus::write_csv_file(&states, out)
                .with_context(|| format!("writing {}", out.display()))?;
            tracing::info!(states = states.len(), path = %out.display(), "generated corpus");
        }
        Command::Train(args) => {
            train(&mut config, args)?;
        }
        Command::Play { train: args, frames } => {
            let network = train(&mut config, args)?;
            let mut policy = NetworkPolicy::new(&network)?;
            let summary = Pong::new(config.game.clone())?.run(&mut policy, *frames);
            tracing::info!(?summary, "network-driven game");
            let baseline = Pong::new(config.game.clone())?.run(&mut OptimalPolicy, *frames);
            tracing::info!(?baseline, "rule-driven game");
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
