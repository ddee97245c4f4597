//! dist - binary release installer CLI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use distillery::cmd::{self, Cli};

fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if cli.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    // A panic is a plain failure to the shell, not a backtrace dump.
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("fatal: {info}");
        std::process::exit(1);
    }));

    cmd::execute(cli).await
}
