use anyhow::{Context, Result};
use clap::Parser;
use minimr::cmd::ctl::{Args, Commands};
use minimr::rpc::{self, proto};
use minimr::utils;
use tracing_subscriber::EnvFilter;

fn display_progress(progress: &proto::Progress) {
    println!("---------- JOB PROGRESS -----------");
    println!(
        "Map:\t{} / {} done, {} running",
        progress.map_done, progress.map_total, progress.map_running
    );
    println!(
        "Reduce:\t{} / {} done, {} running",
        progress.reduce_done, progress.reduce_total, progress.reduce_running
    );
    println!("-----------------------------------");
    if progress.done {
        println!("Job is done");
    } else if progress.map_done < progress.map_total {
        println!("Job is in the map phase");
    } else {
        println!("Job is in the reduce phase");
    }
    println!("-----------------------------------");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let socket = args.socket.unwrap_or_else(utils::coordinator_sock);
    let mut client = rpc::connect(&socket).await?;

    match args.command {
        Commands::Status {} => {
            let progress = client
                .get_progress(proto::Empty {})
                .await
                .context("GetProgress failed")?
                .into_inner();
            display_progress(&progress);
        }
    }

    Ok(())
}
