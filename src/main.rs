use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use action_server::config::{AppState, Config};
use action_server::server::{self, SignalHandler};
use action_server::{actions, logger};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config".to_string());
    let cfg = Config::load_from(&config_path)?;
    logger::init(&cfg)?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error>> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_listener(addr)?;

    let resolver = Arc::new(cfg.build_resolver(actions::registry()));
    let loaded = resolver.preload();
    logger::log_server_start(&addr, &cfg, loaded);

    let state = Arc::new(AppState::new(cfg, Arc::clone(&resolver)));
    let signals = Arc::new(SignalHandler::new());
    server::start_signal_handler(Arc::clone(&signals));

    server::start_server_loop(
        listener,
        state,
        Arc::new(AtomicUsize::new(0)),
        Arc::clone(&signals.shutdown),
    )
    .await;

    if signals.shutdown_requested() {
        tracing::info!("Shutdown requested by signal");
    }
    logger::log_server_stop(&resolver.stats());
    Ok(())
}
