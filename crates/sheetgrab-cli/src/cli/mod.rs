//! CLI for sheetgrab.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sheetgrab_core::config;
use std::path::{Path, PathBuf};

use commands::{run_checksum, run_normalize, run_pipeline, run_resolve, RunOverrides};

/// Downloads the files linked from spreadsheet cells and rewrites the cells to local names.
#[derive(Debug, Parser)]
#[command(name = "sheetgrab", version)]
#[command(about = "Replace spreadsheet links with downloaded local files", long_about = None)]
pub struct Cli {
    /// Log to stderr instead of the log file under the XDG state dir.
    #[arg(long, global = true)]
    pub log_stderr: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Process every workbook of the input directory.
    Run {
        /// Directory with input workbooks (overrides `input_dir`).
        #[arg(long, value_name = "DIR")]
        input: Option<PathBuf>,
        /// Directory for rewritten workbooks and assets (overrides `output_dir`).
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,
        /// Also save each workbook after every N rewritten cells.
        #[arg(long, value_name = "N")]
        checkpoint_every: Option<usize>,
        /// Replace existing assets with the same name instead of keeping both.
        #[arg(long)]
        overwrite: bool,
    },

    /// Download the given URLs into the assets directory and print the stored names.
    Resolve {
        /// URLs as they would appear in a cell.
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Print the filesystem-safe form of a filename.
    Normalize {
        name: String,
    },

    /// Compute SHA-256 of a file (e.g. a downloaded asset).
    Checksum {
        /// Path to the file.
        path: String,
    },
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            CliCommand::Normalize { name } => run_normalize(&name),
            CliCommand::Checksum { path } => run_checksum(Path::new(&path)),
            CliCommand::Run {
                input,
                output,
                checkpoint_every,
                overwrite,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                let overrides = RunOverrides {
                    input,
                    output,
                    checkpoint_every,
                    overwrite,
                };
                run_pipeline(overrides.apply(cfg))
            }
            CliCommand::Resolve { urls } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_resolve(&cfg, &urls)
            }
        }
    }
}

#[cfg(test)]
mod tests;
