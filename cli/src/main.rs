use clap::Parser;
mod commands;
mod http;
use commands::cli;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = cli::Args::parse();
    dispatch(args.command.unwrap_or_default()).await
}

async fn dispatch(cmd: cli::Commands) -> anyhow::Result<()> {
    match cmd {
        cli::Commands::Serve(serve_args) => commands::serve::handle_serve(serve_args).await,
        cli::Commands::Skills => commands::skills::handle_skills().await,
    }
}
