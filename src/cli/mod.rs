//! CLI Module
//!
//! Command-line interface for Speedcut.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Speedcut - rebuild the audio of a speed-edited recording
#[derive(Parser, Debug)]
#[command(name = "speedcut-cli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconstruct the edited audio and write it as WAV
    #[command(name = "render")]
    Render {
        /// Job file (JSON)
        #[arg(short, long)]
        job: PathBuf,

        /// Output WAV file, overrides the job's output
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Stretch chunks in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Print the timeline and schedule summary of a job
    #[command(name = "inspect")]
    Inspect {
        /// Job file (JSON)
        #[arg(short, long)]
        job: PathBuf,
    },
}
