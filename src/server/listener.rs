// Listener setup
// Binds the TCP listener through socket2 so socket options are set before listen()

use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Pending connections queued by the kernel
const BACKLOG: i32 = 1024;

/// Create a non-blocking `TcpListener` with `SO_REUSEADDR` enabled.
///
/// This function:
/// 1. Creates an IPv4 or IPv6 TCP socket matching `addr`
/// 2. Sets `SO_REUSEADDR` so a restarted server can bind while old sockets sit in `TIME_WAIT`
/// 3. Disables Nagle's algorithm
/// 4. Binds and listens with a backlog of 1024
///
/// # Arguments
///
/// * `addr` - Address to bind; port 0 picks an ephemeral port
///
/// # Errors
///
/// Returns the underlying I/O error if any socket call fails.
pub fn create_listener(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_tcp_nodelay(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(BACKLOG)?;

    TcpListener::from_std(socket.into())
}
