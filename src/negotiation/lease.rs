//! Static address assignment and zero-touch provisioning options.

use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::config::ServerContext;
use crate::domain::{ClientRequest, Host, NetInterface};
use crate::token::{TokenCodec, TokenPurpose};

use super::vendor::{encode_domain_search, idrac_scp_location, onie_fields};
use super::{BootOptions, Lease, OPTION_DELL_ZTD, OPTION_PROXMOX};

const OPTION_DNS: u8 = 6;
const OPTION_MTU: u8 = 26;

/// Fills address fields from a host's matched interface.
#[derive(Debug, Clone)]
pub struct LeaseResolver {
    ctx: Arc<ServerContext>,
    tokens: TokenCodec,
}

impl LeaseResolver {
    pub fn new(ctx: Arc<ServerContext>, tokens: TokenCodec) -> Self {
        Self { ctx, tokens }
    }

    pub fn assign(&self, nic: &NetInterface, request: &ClientRequest) -> Lease {
        let mtu = request
            .requested(OPTION_MTU)
            .then(|| nic.mtu.unwrap_or(self.ctx.default_mtu));

        let dns = if !request.requested(OPTION_DNS) {
            Vec::new()
        } else if !nic.dns.is_empty() {
            nic.dns.clone()
        } else {
            self.ctx.dns_servers.clone()
        };

        let domain_search = Some(encode_domain_search(&self.ctx.domain_search))
            .filter(|encoded| !encoded.is_empty());

        Lease {
            address: nic.ip.ip(),
            subnet_mask: nic.ip.mask(),
            lease_time: self.ctx.lease_time,
            mtu,
            router: nic.gateway,
            dns,
            hostname: nic.hostname().map(String::from),
            domain_search,
        }
    }

    /// Vendor ZTP/ZTD options. Each rule is independent and additive.
    pub fn ztp(&self, host: &Host, server_ip: Ipv4Addr, request: &ClientRequest) -> BootOptions {
        let token = self.tokens.issue(&host.id.to_string(), TokenPurpose::Boot);
        let urls = self.ctx.endpoints.build(server_ip, &token);
        let mut opts = BootOptions::default();

        if host.has_tag("arista") {
            opts.bootfile = Some(urls.kickstart.clone());
        }
        if host.has_tag("dellztd") {
            opts.private.insert(OPTION_DELL_ZTD, urls.kickstart.clone());
        }
        if host.has_tag("proxmox") {
            opts.private.insert(OPTION_PROXMOX, urls.proxmox.clone());
        }
        if request.vendor_class_contains("NVIDIA") || request.vendor_class_contains("Mellanox") {
            opts.tftp_server = Some(onie_fields(&urls.repo, &urls.kickstart_dir));
            opts.bootfile = Some(onie_fields(
                host.image.as_deref().unwrap_or_default(),
                &urls.kickstart_file,
            ));
        }
        if request.user_class_contains("SONiC-ZTP") {
            opts.bootfile = Some(urls.kickstart.clone());
        }
        if request.vendor_class_contains("iDRAC") && host.provision {
            let bmc_token = self.tokens.issue(&host.id.to_string(), TokenPurpose::Bmc);
            let bmc = self.ctx.endpoints.build(server_ip, &bmc_token);
            opts.vendor_specific = Some(idrac_scp_location(server_ip, &bmc.bmc_path).into_bytes());
        }

        opts
    }

    /// Check a REQUEST/INFORM against this server and interface.
    ///
    /// The error is the diagnostic text carried in the NAK.
    pub fn confirm(
        &self,
        nic: &NetInterface,
        server_ip: Ipv4Addr,
        request: &ClientRequest,
    ) -> Result<(), String> {
        if let Some(server_id) = request.server_id {
            if server_id != server_ip {
                return Err(format!(
                    "server identifier {} does not match {}",
                    server_id, server_ip
                ));
            }
        }
        match request.confirming_ip() {
            Some(ip) if ip != nic.ip.ip() => Err(format!(
                "requested address {} is not assigned to {}",
                ip, request.mac
            )),
            _ => Ok(()),
        }
    }
}
