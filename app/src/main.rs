use clap::Parser;
use jobboard::Command;
use jobboard_core::{telemetry, AppState, ClientConfig, Services};
use tokio::runtime::Runtime;

#[derive(Parser, Debug)]
#[command(name = "jobboard", version, about = "Jobboard session and chat client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("warn")?;

    let cli = Cli::parse();
    let config = ClientConfig::load()?;
    tracing::debug!(api = %config.api_base_url, realtime = %config.realtime_url, "configuration loaded");

    let runtime = Runtime::new()?;
    runtime.block_on(async {
        let services = Services::connect(&config)?;
        let state = AppState::new(config, services);
        jobboard::run(&state, cli.command).await
    })
}
