use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use sy_domain::config::Config;
use sy_gateway::cli::{Cli, Command, ConfigCommand};
use sy_gateway::{api, bootstrap, cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing();

    let (config, config_path) = cli::load_config(args.config.as_deref())?;

    match args.command {
        None | Some(Command::Serve) => run_server(Arc::new(config)).await,
        Some(Command::Config(ConfigCommand::Validate)) => {
            if !cli::validate(&config, config_path.as_deref()) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            cli::show(&config);
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    for warning in config.validate() {
        tracing::warn!(%warning, "config warning");
    }

    let state = bootstrap::build_state(config.clone()).context("building application state")?;
    let _sweep = bootstrap::spawn_eviction_sweep(&state);

    let router = api::build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "switchyard listening");

    axum::serve(listener, router)
        .await
        .context("serving HTTP")?;
    Ok(())
}
