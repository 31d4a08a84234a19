use std::io;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::info;

use super::{recv_elem, send_elem};
use crate::fields::RingElem;
use crate::Role;

/// Delay in milliseconds after which connection to a peer is retried.
const CONNECTION_RETRY_DELAY: u64 = 1000;

/// Dial `addr` until the remote side starts listening.
pub async fn connect_with_retry(addr: &str) -> TcpStream {
    loop {
        match TcpStream::connect(addr).await {
            Ok(socket) => break socket,
            _ => tokio::time::sleep(Duration::from_millis(CONNECTION_RETRY_DELAY)).await,
        }
    }
}

/// Connect to the dealer and announce our role as the first wire message.
pub async fn connect_to_dealer(addr: &str, role: Role) -> io::Result<TcpStream> {
    let mut socket = connect_with_retry(addr).await;
    send_elem(&mut socket, RingElem::new(role.index())).await?;
    Ok(socket)
}

/// Establish the compute-party link: P0 dials the peer, P1 accepts.
pub async fn connect_peers(role: Role, peer_addr: &str, listen_addr: &str) -> io::Result<TcpStream> {
    match role {
        Role::P0 => Ok(connect_with_retry(peer_addr).await),
        Role::P1 => {
            let listener = TcpListener::bind(listen_addr).await?;
            let (socket, addr) = listener.accept().await?;
            info!("peer connected from {}", addr);
            Ok(socket)
        }
    }
}

/// Accept both compute parties and order the sockets by announced role.
pub async fn accept_compute_parties(
    listener: &TcpListener,
) -> io::Result<(TcpStream, TcpStream)> {
    let (mut first, first_addr) = listener.accept().await?;
    let role_first = recv_elem(&mut first).await?.to_u64();
    info!("client {} announced role {}", first_addr, role_first);

    let (mut second, second_addr) = listener.accept().await?;
    let role_second = recv_elem(&mut second).await?.to_u64();
    info!("client {} announced role {}", second_addr, role_second);

    match (role_first, role_second) {
        (0, 1) => Ok((first, second)),
        (1, 0) => Ok((second, first)),
        _ => Err(io::Error::new(
            io::ErrorKind::Other,
            "invalid role handshake",
        )),
    }
}

#[cfg(test)]
mod tests {
    use futures::join;

    use super::*;

    #[tokio::test]
    async fn compute_parties_are_ordered_by_role() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        // P1 dials first, P0 second; the dealer must still hand back the
        // sockets in (P0, P1) order.
        let client = |role: Role, marker: u64| {
            let addr = addr.clone();
            async move {
                let mut socket = connect_to_dealer(&addr, role).await.unwrap();
                send_elem(&mut socket, RingElem::new(marker)).await.unwrap();
                socket
            }
        };

        let ((mut p0, mut p1), _keep1, _keep0) = join!(
            async { accept_compute_parties(&listener).await.unwrap() },
            client(Role::P1, 111),
            client(Role::P0, 222),
        );

        assert_eq!(recv_elem(&mut p0).await.unwrap(), RingElem::new(222));
        assert_eq!(recv_elem(&mut p1).await.unwrap(), RingElem::new(111));
    }
}
