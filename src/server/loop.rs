// Server loop
// Accepts connections until shutdown is requested

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config::AppState;

/// Run the accept loop until `shutdown` is notified.
///
/// Each accepted stream goes through `accept_connection`, which applies the
/// connection limit and spawns the serving task. Accept errors are logged and
/// the loop continues. Connections already being served keep running on their
/// own tasks after the loop returns.
///
/// # Arguments
///
/// * `listener` - Bound listener from `create_listener`
/// * `state` - Shared application state
/// * `active_connections` - Active connection counter
/// * `shutdown` - Notified once to stop accepting
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<AppState>,
    active_connections: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
) {
    loop {
        tokio::select! {
            accept_result = listener.accept() => match accept_result {
                Ok((stream, peer_addr)) => {
                    accept_connection(stream, peer_addr, &state, &active_connections);
                }
                Err(e) => tracing::error!("Failed to accept connection: {e}"),
            },
            () = shutdown.notified() => {
                tracing::info!("Stopped accepting connections");
                break;
            }
        }
    }
}
