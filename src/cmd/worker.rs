use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Run MapReduce tasks handed out by a coordinator", long_about = None)]
pub struct Args {
    /// Name of the workload to run
    #[clap(short, long)]
    pub workload: String,
    /// [OPT] Coordinator socket (default /var/tmp/minimr-<user>.sock)
    #[clap(short, long)]
    pub socket: Option<PathBuf>,
    /// Directory for intermediate and output files
    #[clap(short, long, default_value = ".")]
    pub dir: PathBuf,
    /// Milliseconds to wait before asking again when there is nothing to do
    #[clap(long, default_value_t = 1000)]
    pub wait_ms: u64,
    /// Auxiliary arguments to pass to the MapReduce application.
    #[clap(value_parser, last = true)]
    pub args: Vec<String>,
}
