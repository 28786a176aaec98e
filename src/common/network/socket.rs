//! Datagram socket construction with explicit buffer sizing.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Socket, Type};
use tokio::net::UdpSocket;

use crate::error::SetupError;

/// Bind a nonblocking datagram socket on `address`, with the OS receive
/// buffer sized to absorb fragment bursts while the process is busy.
pub fn bind_datagram_socket(
    address: SocketAddr,
    recv_buffer_bytes: usize,
) -> Result<UdpSocket, SetupError> {
    let socket = Socket::new(Domain::for_address(address), Type::DGRAM, None)?;
    socket.set_nonblocking(true)?;
    socket.set_recv_buffer_size(recv_buffer_bytes)?;
    socket
        .bind(&address.into())
        .map_err(|source| SetupError::Bind { address, source })?;

    Ok(UdpSocket::from_std(socket.into())?)
}

/// Open an ephemeral datagram socket connected to `destination`. The send
/// buffer is sized for bursts of fragments; once it fills, sends fail with
/// `WouldBlock` instead of blocking the caller.
pub async fn connect_datagram_socket(
    destination: SocketAddr,
    send_buffer_bytes: usize,
) -> Result<UdpSocket, SetupError> {
    let local_address: SocketAddr = match destination {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };

    let socket = Socket::new(Domain::for_address(destination), Type::DGRAM, None)?;
    socket.set_nonblocking(true)?;
    socket.set_send_buffer_size(send_buffer_bytes)?;
    socket
        .bind(&local_address.into())
        .map_err(|source| SetupError::Bind {
            address: local_address,
            source,
        })?;

    let socket = UdpSocket::from_std(socket.into())?;
    socket
        .connect(destination)
        .await
        .map_err(|source| SetupError::Connect {
            address: destination,
            source,
        })?;

    Ok(socket)
}
