// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use clap::{Parser, Subcommand};
use pnor_cli::commands::{build, clear, fix_ecc, inspect, stats};
use pnor_cli::engine::{self, Session};
use pnor_cli::telemetry;
use pnor_rp::SectionId;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pnor")]
#[command(about = "PNOR flash image tool: build, inspect and maintain partitioned firmware images", long_about = None)]
struct Cli {
    /// JSON file overriding the flash configuration (geometry, side size, window)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Physical offset of the HBB section booted from; selects the boot side
    #[arg(long, global = true, value_parser = engine::parse_offset)]
    hbb: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build an image from a JSON layout
    Build {
        #[arg(long)]
        layout: PathBuf,

        #[arg(long, short)]
        out: PathBuf,
    },
    /// Show sides, TOCs and the section table of the active side
    Inspect {
        image: PathBuf,

        /// Print machine readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Erase a writable section of the active side
    Clear {
        image: PathBuf,
        section: SectionId,
    },
    /// Rewrite pages of a section that needed an ECC correction
    FixEcc {
        image: PathBuf,
        section: SectionId,
    },
    /// Read every mapped page and report per-page health
    Stats {
        image: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    telemetry::init_telemetry();
    let cli = Cli::parse();
    let config = engine::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Build { layout, out } => build::run(&layout, &out, config),
        Commands::Inspect { image, json } => {
            inspect::run(&Session::open(&image, config, cli.hbb)?, json)
        }
        Commands::Clear { image, section } => {
            clear::run(&Session::open(&image, config, cli.hbb)?, section)
        }
        Commands::FixEcc { image, section } => {
            fix_ecc::run(&Session::open(&image, config, cli.hbb)?, section).map(|_| ())
        }
        Commands::Stats { image, json } => {
            stats::run(&Session::open(&image, config, cli.hbb)?, json).map(|_| ())
        }
    }
}
