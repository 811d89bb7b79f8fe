//! Host records consumed from the datastore.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use macaddr::MacAddr6;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FirmwareBuild;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetInterface {
    pub mac: MacAddr6,
    /// Assigned address with the prefix of its subnet, e.g. `10.1.0.1/24`.
    pub ip: Ipv4Network,
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub vlan: Option<u16>,
    #[serde(default)]
    pub mtu: Option<u16>,
    #[serde(default)]
    pub gateway: Option<Ipv4Addr>,
    #[serde(default)]
    pub dns: Vec<Ipv4Addr>,
    #[serde(default)]
    pub bmc: bool,
}

impl NetInterface {
    /// Short hostname: the first label of the FQDN.
    pub fn hostname(&self) -> Option<&str> {
        self.fqdn
            .as_deref()
            .and_then(|fqdn| fqdn.split('.').next())
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub provision: bool,
    /// Overrides architecture-based classification when set.
    #[serde(default)]
    pub firmware: Option<FirmwareBuild>,
    #[serde(default)]
    pub interfaces: Vec<NetInterface>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Installer image name handed to ONIE switches.
    #[serde(default)]
    pub image: Option<String>,
}

impl Host {
    /// The interface whose MAC matches exactly.
    pub fn interface(&self, mac: MacAddr6) -> Option<&NetInterface> {
        self.interfaces.iter().find(|nic| nic.mac == mac)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Narrow read-only contract onto the host datastore.
#[async_trait]
pub trait HostLookup: Send + Sync {
    /// Point-in-time read; `None` means the MAC is not a known node.
    async fn find_by_mac(&self, mac: MacAddr6) -> Option<Host>;
}
