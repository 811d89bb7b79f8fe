//! Follow-on URLs handed to clients.

use std::net::Ipv4Addr;

/// Every URL a client may be pointed at for one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSet {
    pub ipxe_script: String,
    pub kickstart: String,
    /// Directory part of [`Self::kickstart`], with trailing slash.
    pub kickstart_dir: String,
    /// File name part of [`Self::kickstart`].
    pub kickstart_file: String,
    pub repo: String,
    /// Server-relative path scoped to BMC actions.
    pub bmc_path: String,
    pub proxmox: String,
}

/// Composes URLs from a fixed template set.
#[derive(Debug, Clone)]
pub struct EndpointBuilder {
    scheme: String,
    port: u16,
}

impl EndpointBuilder {
    pub fn new(scheme: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            port,
        }
    }

    pub fn base_url(&self, server: Ipv4Addr) -> String {
        let default_port = match self.scheme.as_str() {
            "https" => 443,
            _ => 80,
        };
        if self.port == default_port {
            format!("{}://{}", self.scheme, server)
        } else {
            format!("{}://{}:{}", self.scheme, server, self.port)
        }
    }

    pub fn build(&self, server: Ipv4Addr, token: &str) -> EndpointSet {
        let base = self.base_url(server);
        let kickstart_dir = format!("{}/boot/{}/", base, token);
        let kickstart_file = "kickstart".to_string();

        EndpointSet {
            ipxe_script: format!("{}ipxe", kickstart_dir),
            kickstart: format!("{}{}", kickstart_dir, kickstart_file),
            kickstart_dir,
            kickstart_file,
            repo: format!("{}/repo", base),
            bmc_path: format!("/bmc/{}", token),
            proxmox: format!("{}/boot/{}/proxmox", base, token),
        }
    }
}

impl Default for EndpointBuilder {
    fn default() -> Self {
        Self::new("http", 80)
    }
}
