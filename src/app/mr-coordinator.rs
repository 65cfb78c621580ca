use anyhow::Result;
use clap::Parser;
use minimr::cmd::coordinator::Args;
use minimr::{coordinator, utils};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.config();
    let files = utils::expand_inputs(&args.files)?;

    coordinator::run(files, &config).await
}
