//! UDP socket setup.

use std::net::SocketAddrV4;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::error::DispatchError;

/// Create a broadcast-capable socket bound to `bind_addr`, optionally pinned
/// to one network device so several interfaces can share a port.
pub fn create_socket(bind_addr: SocketAddrV4, device: Option<&str>) -> Result<UdpSocket, DispatchError> {
    let bind_failed = |source| DispatchError::Bind {
        addr: bind_addr.into(),
        source,
    };

    let socket =
        Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(bind_failed)?;

    socket.set_reuse_address(true).ok();
    socket.set_broadcast(true).map_err(bind_failed)?;

    if let Some(device) = device {
        bind_to_device(&socket, device).map_err(bind_failed)?;
    }

    socket.bind(&bind_addr.into()).map_err(bind_failed)?;
    socket.set_nonblocking(true).map_err(bind_failed)?;

    let std_socket: std::net::UdpSocket = socket.into();
    UdpSocket::from_std(std_socket).map_err(bind_failed)
}

#[cfg(target_os = "linux")]
fn bind_to_device(socket: &Socket, device: &str) -> std::io::Result<()> {
    use std::os::fd::AsRawFd;

    // SAFETY: the pointer and length describe `device`, which outlives the call.
    let ret = unsafe {
        libc::setsockopt(
            socket.as_raw_fd(),
            libc::SOL_SOCKET,
            libc::SO_BINDTODEVICE,
            device.as_ptr() as *const libc::c_void,
            device.len() as libc::socklen_t,
        )
    };
    if ret < 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn bind_to_device(_socket: &Socket, device: &str) -> std::io::Result<()> {
    tracing::warn!(device, "Device binding unsupported on this platform, listening on all interfaces");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_ephemeral_bind() {
        let socket = create_socket(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0), None).unwrap();
        let addr = socket.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_bind_error_carries_address() {
        // TEST-NET-3 is never assigned locally.
        let addr = SocketAddrV4::new(Ipv4Addr::new(203, 0, 113, 77), 0);
        match create_socket(addr, None) {
            Err(DispatchError::Bind { addr: reported, .. }) => assert_eq!(reported, addr.into()),
            other => panic!("expected bind failure, got {other:?}"),
        }
    }
}
