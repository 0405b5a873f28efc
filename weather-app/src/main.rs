//! Terminal host for the demo weather screens.
//!
//! Parses the CLI, picks the data source and drives the screen controllers
//! on a single-threaded cooperative task stream.

use clap::Parser;

mod cli;
mod config;
mod forecast;
mod home;
mod model;
mod repository;
mod surface;
mod usecase;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cmd = cli::Cli::parse();
    tokio::task::LocalSet::new().run_until(cmd.run()).await
}
