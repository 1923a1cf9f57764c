mod query;
mod to_fbin;

use std::{path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};
use diskann_bench::{
    config::ExperimentConfig,
    pipeline::Pipeline,
    tools::{ProcessTools, ToolPaths},
    Result,
};
use query::{query, QueryArgs};
use to_fbin::{to_fbin, ToFbinArgs};
use tracing::Level;

#[derive(Parser)]
#[command(version, about = "Driver of DiskANN disk index experiments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root of the DiskANN checkout. Tools are expected under <this>/build/tests.
    #[arg(long = "diskann_dir", env = "DISKANN_DIR", global = true)]
    diskann_dir: Option<PathBuf>,
    /// JSON experiment config. Unset fields use the default index parameters.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
pub struct DatasetArgs {
    /// Dataset name, the prefix of <this>_learn.fbin.
    #[arg(long)]
    dataset: String,
}

#[derive(Subcommand)]
enum Command {
    /// Generate input binaries from SIFT fvecs.
    #[command(name = "to_fbin")]
    ToFbin(ToFbinArgs),
    /// Build an on-disk index from the learn vectors.
    Build(DatasetArgs),
    /// Convert the disk index to zarr format tensors.
    Convert(DatasetArgs),
    /// Compare converted tensors against the disk index.
    Verify(DatasetArgs),
    /// Run a query sweep on the index using the selected backend.
    Query(QueryArgs),
}

fn run(cli: Cli) -> Result<()> {
    let config = match cli.config.as_deref() {
        Some(path) => ExperimentConfig::from_path(path)?,
        None => ExperimentConfig::default(),
    };
    let diskann_dir = cli
        .diskann_dir
        .or(config.diskann_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let tools = ProcessTools::new(ToolPaths::from_diskann_dir(&diskann_dir));
    let params = config.index;
    match cli.command {
        Command::ToFbin(args) => to_fbin(args, params, tools),
        Command::Build(args) => Pipeline::new(args.dataset, params, tools).build(),
        Command::Convert(args) => Pipeline::new(args.dataset, params, tools).convert(),
        Command::Verify(args) => Pipeline::new(args.dataset, params, tools).verify(),
        Command::Query(args) => query(args, params, tools),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(e.exit_code())
        }
    }
}
