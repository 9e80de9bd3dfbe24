mod cli;

use std::{env, process, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use daybook::{config::Config, server, store::MemoryStore, views::Site};

fn setup_logging(json_logs: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() {
    let args = cli::parse(env::args().skip(1).collect());

    setup_logging(args.json_logs);

    let config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("{err}");
            process::exit(1);
        }
    };

    let site = match Site::from_config(&config, Arc::new(MemoryStore::new())) {
        Ok(site) => Arc::new(site),
        Err(err) => {
            tracing::error!("{err}");
            process::exit(1);
        }
    };

    let address = args.address.unwrap_or(config.server.address);
    tracing::info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    if let Err(err) = server::serve(site, address).await {
        tracing::error!("Server error: {err}");
        process::exit(1);
    }
}
