use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Commands,
    /// [OPT] Coordinator socket (default /var/tmp/minimr-<user>.sock)
    #[clap(short, long)]
    pub socket: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Displays the progress of the running job: how many map and reduce
    /// tasks are done or in flight.
    Status {},
}
