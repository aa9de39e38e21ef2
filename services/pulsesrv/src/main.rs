//! pulsesrv entry point
//!
//! Wires the counter store, the serial link reader and the HTTP query
//! service together and runs until SIGINT/SIGTERM.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use common::service_bootstrap::print_startup_banner;
use common::shutdown::cancel_on_shutdown;
use pulsesrv::api::create_routes;
use pulsesrv::bootstrap::{self, Args};
use pulsesrv::store::{format_state, CounterStore};
use pulsesrv::{LinkReader, SerialLink};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = bootstrap::load_config(&args).context("failed to load configuration")?;
    if args.validate {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    let service_info = bootstrap::service_info();
    bootstrap::initialize_logging(&args, &config, &service_info)
        .context("failed to initialize logging")?;
    print_startup_banner(&service_info);
    info!("launching pulse counter service");

    // Load before the reader starts; nothing else touches the file yet
    let store = Arc::new(CounterStore::open(&config.state_file));
    info!("state file: {}", store.path().display());
    store.load();

    let cancel = CancellationToken::new();
    cancel_on_shutdown(cancel.clone());

    let reader = LinkReader::new(
        SerialLink::new(config.serial_config()),
        Arc::clone(&store),
        config.link_policy(),
    );
    let reader_task = tokio::spawn(reader.run(cancel.child_token()));

    let address = config.bind_address();
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            cancel.cancel();
            let _ = reader_task.await;
            return Err(e).with_context(|| format!("failed to bind {address}"));
        },
    };
    info!("serving at port {}", config.port);

    let served = axum::serve(listener, create_routes(Arc::clone(&store)))
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await;

    // Server done, either by signal or by failure; stop the reader either way
    cancel.cancel();
    match reader_task.await {
        Ok(stats) => info!(
            "link reader stopped after {} telegrams, {} faults",
            stats.telegrams, stats.faults
        ),
        Err(e) => error!("link reader task failed: {}", e),
    }

    served.context("HTTP server failed")?;
    info!("final counters: {}", format_state(&store.snapshot()));
    Ok(())
}
