//! In-process sequential engine.
//!
//! Runs a whole job on the calling thread, without a coordinator, and writes
//! exactly the files a distributed run over the same inputs would write.

use clap::Parser;

pub mod engine;

#[derive(Parser, Debug)]
#[command(version, about = "Run a MapReduce job sequentially", long_about = None)]
pub struct Args {
    /// Glob spec for the input files
    #[arg(short, long)]
    pub input: String,

    /// Name of the workload
    #[arg(short, long)]
    pub workload: String,

    /// Output directory
    #[arg(short, long)]
    pub output: String,

    /// Number of reduce buckets
    #[arg(short = 'r', long, default_value_t = 10)]
    pub n_reduce: u32,

    /// Auxiliary arguments to pass to the MapReduce application.
    #[clap(value_parser, last = true)]
    pub args: Vec<String>,
}
