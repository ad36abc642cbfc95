//! Socket setup for client connections.

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, TcpKeepalive, Type};

use hostbridge_config::Endpoint;

const KEEPALIVE_IDLE: Duration = Duration::from_secs(30);

/// Why a connection could not be opened.
#[derive(Debug)]
pub(crate) enum ConnectFailure {
    Resolve(io::Error),
    Connect(io::Error),
}

pub(crate) fn connect(endpoint: &Endpoint, timeout: Duration) -> Result<TcpStream, ConnectFailure> {
    let address = resolve(endpoint).map_err(ConnectFailure::Resolve)?;
    open(address, timeout).map_err(ConnectFailure::Connect)
}

fn resolve(endpoint: &Endpoint) -> io::Result<SocketAddr> {
    (endpoint.host.as_str(), endpoint.port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
}

fn open(address: SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
    let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_keepalive(true)?;
    socket.set_tcp_keepalive(&TcpKeepalive::new().with_time(KEEPALIVE_IDLE))?;
    socket.set_nodelay(true)?;
    socket.connect_timeout(&SockAddr::from(address), timeout)?;
    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn connects_with_nodelay() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let stream = connect(&Endpoint::loopback(port), Duration::from_secs(1)).expect("connect");
        assert!(stream.nodelay().expect("nodelay"));
    }

    #[test]
    fn unresolvable_host_is_a_resolve_failure() {
        let endpoint = Endpoint::new("host.invalid", 9876);
        let failure = connect(&endpoint, Duration::from_secs(1)).expect_err("should fail");
        assert!(matches!(failure, ConnectFailure::Resolve(_)));
    }
}
