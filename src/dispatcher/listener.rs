//! Receive loop and per-datagram task dispatch.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument, Span};

use crate::config::InterfaceBinding;
use crate::error::DispatchError;
use crate::handler::Reply;

use super::socket::create_socket;
use super::tracker::TaskTracker;
use super::{Datagram, PacketHandler};

/// Large enough for any DHCP message on a standard MTU link.
const MAX_DATAGRAM: usize = 1500;

/// A bound socket not yet receiving.
pub struct Listener {
    socket: UdpSocket,
    interface: InterfaceBinding,
    span: Span,
}

impl Listener {
    /// Bind `0.0.0.0:port` on the binding's network device.
    pub fn bind(interface: InterfaceBinding, port: u16) -> Result<Self, DispatchError> {
        let addr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port);
        let socket = create_socket(addr, Some(&interface.name))?;
        Ok(Self::from_socket(socket, interface))
    }

    /// Wrap an already-bound socket.
    pub fn from_socket(socket: UdpSocket, interface: InterfaceBinding) -> Self {
        Self {
            socket,
            interface,
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DispatchError> {
        Ok(self.socket.local_addr()?)
    }

    /// Start the receive loop; each datagram runs on its own task.
    pub fn spawn<H>(self, handler: Arc<H>) -> Result<Dispatcher, DispatchError>
    where
        H: PacketHandler + ?Sized + 'static,
    {
        let local_addr = self.socket.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tracker = TaskTracker::new();

        let receive = ReceiveLoop {
            socket: Arc::new(self.socket),
            interface: self.interface,
            handler,
            tracker: tracker.clone(),
            span: self.span.clone(),
        };
        let recv_loop = tokio::spawn(receive.run(shutdown_rx).instrument(self.span));

        info!(addr = %local_addr, "Listener started");
        Ok(Dispatcher {
            local_addr,
            shutdown: shutdown_tx,
            tracker,
            recv_loop,
        })
    }
}

struct ReceiveLoop<H: ?Sized> {
    socket: Arc<UdpSocket>,
    interface: InterfaceBinding,
    handler: Arc<H>,
    tracker: TaskTracker,
    span: Span,
}

impl<H> ReceiveLoop<H>
where
    H: PacketHandler + ?Sized + 'static,
{
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut buf = [0u8; MAX_DATAGRAM];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, source)) => self.dispatch(Datagram {
                            payload: buf[..len].to_vec(),
                            source,
                            interface: self.interface.clone(),
                        }),
                        Err(e) => warn!(error = %e, "Error receiving datagram"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        debug!("Receive loop stopping");
                        break;
                    }
                }
            }
        }
    }

    fn dispatch(&self, datagram: Datagram) {
        let guard = self.tracker.track();
        let socket = self.socket.clone();
        let handler = self.handler.clone();

        tokio::spawn(
            async move {
                let _guard = guard;
                if let Some(reply) = handler.handle(datagram).await {
                    send(&socket, &reply).await;
                }
            }
            .instrument(self.span.clone()),
        );
    }
}

async fn send(socket: &UdpSocket, reply: &Reply) {
    let bytes = match reply.encode() {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to encode reply");
            return;
        }
    };
    if let Err(e) = socket.send_to(&bytes, reply.destination).await {
        warn!(error = %e, dest = %reply.destination, "Failed to send reply");
    }
}

/// Handle to a running listener.
#[derive(Debug)]
pub struct Dispatcher {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    tracker: TaskTracker,
    recv_loop: JoinHandle<()>,
}

impl Dispatcher {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.in_flight()
    }

    /// Stop receiving, then wait up to `deadline` for in-flight tasks.
    pub async fn shutdown(self, deadline: Duration) -> Result<(), DispatchError> {
        let Dispatcher {
            local_addr,
            shutdown,
            tracker,
            recv_loop,
        } = self;

        shutdown.send_replace(true);
        let drain = {
            let tracker = tracker.clone();
            async move {
                if let Err(e) = recv_loop.await {
                    warn!(error = %e, "Receive loop ended abnormally");
                }
                tracker.wait_idle().await;
            }
        };

        match tokio::time::timeout(deadline, drain).await {
            Ok(()) => {
                info!(addr = %local_addr, "Listener stopped");
                Ok(())
            }
            Err(_) => Err(DispatchError::ShutdownTimeout {
                deadline,
                in_flight: tracker.in_flight(),
            }),
        }
    }
}
