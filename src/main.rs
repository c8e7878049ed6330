use std::sync::Arc;

use tracing::error;
use tracing_subscriber::EnvFilter;

use redlite::config::Config;
use redlite::server::{self, ServerContext};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_args(std::env::args()) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "invalid command line arguments");
            std::process::exit(2);
        }
    };

    let ctx = Arc::new(ServerContext::new(config));

    if let Err(err) = server::run(ctx).await {
        error!(%err, "fatal server error");
        std::process::exit(1);
    }
}
