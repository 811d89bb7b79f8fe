//! Packet dispatch.
//!
//! One receive loop per socket hands every datagram to its own task and
//! goes straight back to receiving. There is no cap on in-flight tasks.

mod interfaces;
mod listener;
mod socket;
mod tracker;

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::config::InterfaceBinding;
use crate::handler::{DhcpHandler, PxeHandler, Reply};

pub use interfaces::{list_interfaces, resolve_interfaces};
pub use listener::{Dispatcher, Listener};
pub use socket::create_socket;
pub use tracker::{TaskGuard, TaskTracker};

/// One received datagram and the interface it arrived on.
#[derive(Debug, Clone)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub source: SocketAddr,
    pub interface: InterfaceBinding,
}

#[async_trait]
pub trait PacketHandler: Send + Sync {
    async fn handle(&self, datagram: Datagram) -> Option<Reply>;
}

#[async_trait]
impl PacketHandler for DhcpHandler {
    async fn handle(&self, datagram: Datagram) -> Option<Reply> {
        DhcpHandler::handle(self, &datagram.payload, datagram.interface.address)
            .await
            .into_reply()
    }
}

#[async_trait]
impl PacketHandler for PxeHandler {
    async fn handle(&self, datagram: Datagram) -> Option<Reply> {
        PxeHandler::handle(
            self,
            &datagram.payload,
            datagram.interface.address,
            datagram.source,
        )
        .await
        .into_reply()
    }
}
