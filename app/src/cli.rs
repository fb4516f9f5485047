use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gearsim")]
#[command(about = "Compile gear mechanism graphs into host driver expressions")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: per-user gearsim.toml)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a graph and print the emitted rules
    Compile {
        /// Mechanism graph in JSON
        graph: PathBuf,

        /// Entity that owns every gear of the graph
        #[arg(short, long, default_value = "rig")]
        entity: String,

        /// Frame the host is on when compiling
        #[arg(short, long, default_value_t = 0)]
        frame: i64,

        /// Print the rules as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile a graph and step the reference host frame by frame
    Simulate {
        /// Mechanism graph in JSON
        graph: PathBuf,

        #[arg(short, long, default_value = "rig")]
        entity: String,

        /// Number of frames to evaluate
        #[arg(short = 'n', long, default_value_t = 24)]
        frames: u32,

        /// First evaluated frame
        #[arg(short, long, default_value_t = 1)]
        start: i64,
    },
}
