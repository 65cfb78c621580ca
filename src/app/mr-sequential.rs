use std::path::Path;

use anyhow::Result;
use clap::Parser;
use minimr::standalone::{engine, Args};
use minimr::{utils, workload};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let engine_app = workload::named(&args.workload)?;
    let inputs = utils::expand_inputs(&[args.input])?;

    engine::run(&inputs, &engine_app, &args.args, args.n_reduce, Path::new(&args.output))?;
    Ok(())
}
