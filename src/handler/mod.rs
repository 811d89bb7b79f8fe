//! Request handlers.
//!
//! Each handler turns one datagram into a [`Disposition`]; nothing a
//! single packet does can fail the listener that received it.

mod dhcp;
mod pxe;
pub mod reply;

use std::fmt;

use dhcproto::v4::MessageType;
use macaddr::MacAddr6;
use tracing::{debug, error, warn};

use crate::domain::FirmwareBuild;
use crate::error::ClassifyError;

pub use dhcp::DhcpHandler;
pub use pxe::PxeHandler;
pub use reply::{Reply, ReplyBuilder, DHCP_CLIENT_PORT, DHCP_SERVER_PORT, PXE_PORT};

/// Why a datagram got no reply.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    Malformed,
    NotBootRequest,
    UnknownClient,
    NoMatchingInterface,
    ProvisioningDisabled,
    MissingArchitecture,
    NotBootClient,
    Unclassified(ClassifyError),
    NoAsset(FirmwareBuild),
    ProxyOnly,
    Unsupported(MessageType),
    /// Boot negotiation failed where a reply cannot go out without it.
    Policy(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed packet"),
            Self::NotBootRequest => write!(f, "not a boot request"),
            Self::UnknownClient => write!(f, "unknown client"),
            Self::NoMatchingInterface => write!(f, "no interface matches client MAC"),
            Self::ProvisioningDisabled => write!(f, "provisioning disabled"),
            Self::MissingArchitecture => write!(f, "no client architecture"),
            Self::NotBootClient => write!(f, "not a network boot client"),
            Self::Unclassified(e) => write!(f, "firmware classification failed: {}", e),
            Self::NoAsset(build) => write!(f, "firmware build {} has no chainload asset", build),
            Self::ProxyOnly => write!(f, "address requests ignored in proxy-only mode"),
            Self::Unsupported(mt) => write!(f, "unsupported message type {:?}", mt),
            Self::Policy(e) => write!(f, "boot negotiation failed: {}", e),
        }
    }
}

impl DropReason {
    /// Log at the level the failure class calls for.
    pub fn log(&self, mac: Option<MacAddr6>) {
        let mac = mac.map(|m| m.to_string()).unwrap_or_default();
        match self {
            Self::Unclassified(_) | Self::NoAsset(_) => {
                warn!(mac = %mac, reason = %self, "Dropping request")
            }
            Self::Policy(_) => error!(mac = %mac, reason = %self, "Dropping request"),
            _ => debug!(mac = %mac, reason = %self, "Dropping request"),
        }
    }
}

/// Outcome of handling one datagram.
#[derive(Debug)]
pub enum Disposition {
    Reply(Reply),
    Drop(DropReason),
}

impl Disposition {
    pub fn into_reply(self) -> Option<Reply> {
        match self {
            Self::Reply(reply) => Some(reply),
            Self::Drop(_) => None,
        }
    }

    pub fn drop_reason(&self) -> Option<&DropReason> {
        match self {
            Self::Reply(_) => None,
            Self::Drop(reason) => Some(reason),
        }
    }
}
