//! Boot negotiation engine.
//!
//! Decides which options a reply carries. Nothing here touches sockets or
//! wire bytes; handlers turn the results into packets.

mod lease;
mod policy;
pub mod vendor;

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

pub use lease::LeaseResolver;
pub use policy::{BootPolicy, PolicyOutcome};

/// Dell SmartFabric ZTD provisioning URL.
pub const OPTION_DELL_ZTD: u8 = 240;
/// Proxmox automated installer answer-file URL.
pub const OPTION_PROXMOX: u8 = 250;

/// Boot instructions: options 43, 66 and 67 plus private-use URL options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootOptions {
    pub vendor_specific: Option<Vec<u8>>,
    pub tftp_server: Option<String>,
    pub bootfile: Option<String>,
    pub private: BTreeMap<u8, String>,
}

impl BootOptions {
    pub fn is_empty(&self) -> bool {
        self.vendor_specific.is_none()
            && self.tftp_server.is_none()
            && self.bootfile.is_none()
            && self.private.is_empty()
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merge(&mut self, other: BootOptions) {
        if other.vendor_specific.is_some() {
            self.vendor_specific = other.vendor_specific;
        }
        if other.tftp_server.is_some() {
            self.tftp_server = other.tftp_server;
        }
        if other.bootfile.is_some() {
            self.bootfile = other.bootfile;
        }
        self.private.extend(other.private);
    }
}

/// Address assignment for one client interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub address: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub lease_time: u32,
    pub mtu: Option<u16>,
    pub router: Option<Ipv4Addr>,
    pub dns: Vec<Ipv4Addr>,
    pub hostname: Option<String>,
    /// Option 119 payload, already label-encoded.
    pub domain_search: Option<Vec<u8>>,
}
