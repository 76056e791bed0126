//! # iop
//!
//! Replication analysis of the IOp expert survey.
//!
//! ```text
//! iop run --data survey.csv --reference published.json --out results/
//! iop describe --data survey.csv --config iop.json
//! iop init-config --out iop.json
//! ```

use clap::{Args, Parser, Subcommand};
use iop::cli::{
    Inputs, cmd_check_config, cmd_clean, cmd_compare, cmd_describe, cmd_init_config, cmd_run,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(
    name = "iop",
    version,
    about = "Clean the IOp expert survey and compare it with published statistics"
)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable logging
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print machine-readable JSON instead of the text report
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct DataArgs {
    /// Survey export (CSV; `.tsv` files are read tab-separated)
    #[arg(long)]
    data: PathBuf,

    /// Analysis config (JSON); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Published reference statistics (JSON)
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Field delimiter, overriding the config
    #[arg(long)]
    delimiter: Option<char>,
}

impl From<&DataArgs> for Inputs {
    fn from(args: &DataArgs) -> Self {
        Inputs {
            data: args.data.clone(),
            config: args.config.clone(),
            reference: args.reference.clone(),
            delimiter: args.delimiter,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clean, describe and compare; export tables with --out
    Run {
        #[command(flatten)]
        input: DataArgs,
        /// Directory for exported tables
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Clean only and write the clean data and cleaning log
    Clean {
        #[command(flatten)]
        input: DataArgs,
        /// Directory for exported tables
        #[arg(long)]
        out: PathBuf,
    },
    /// Clean and print descriptive statistics
    Describe {
        #[command(flatten)]
        input: DataArgs,
    },
    /// Test the expert sample against the reference statistics
    Compare {
        #[command(flatten)]
        input: DataArgs,
    },
    /// Write the default config
    InitConfig {
        #[arg(long)]
        out: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Validate a config and summarize it
    CheckConfig {
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> iop::iop_core::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Commands::Run { input, out: dir } => {
            cmd_run(&mut out, &Inputs::from(input), dir.as_deref(), cli.json)?;
        }
        Commands::Clean { input, out: dir } => {
            cmd_clean(&mut out, &Inputs::from(input), dir, cli.json)?;
        }
        Commands::Describe { input } => cmd_describe(&mut out, &Inputs::from(input), cli.json)?,
        Commands::Compare { input } => cmd_compare(&mut out, &Inputs::from(input), cli.json)?,
        Commands::InitConfig { out: path, force } => cmd_init_config(path, *force)?,
        Commands::CheckConfig { config } => cmd_check_config(&mut out, config, cli.json)?,
    }
    out.flush()?;
    Ok(())
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,iop=info",
        1 => "info,iop=debug",
        2 => "debug,iop=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
