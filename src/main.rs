use clap::Parser;
use tracing_subscriber::EnvFilter;

use gh_eye::config::ServerArgs;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = ServerArgs::parse();

    if let Err(e) = gh_eye::run(args).await {
        log::error!("[gh-eye] {}", e);
        std::process::exit(1);
    }
}
