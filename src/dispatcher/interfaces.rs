//! Network interface discovery via pnet.

use std::net::{IpAddr, Ipv4Addr};

use pnet::datalink::{self, NetworkInterface};

use crate::config::{InterfaceBinding, InterfaceSpec};
use crate::error::DispatchError;

/// What resolution needs to know about a host interface.
#[derive(Debug, Clone)]
struct Candidate {
    name: String,
    usable: bool,
    addrs: Vec<Ipv4Addr>,
}

impl From<&NetworkInterface> for Candidate {
    fn from(iface: &NetworkInterface) -> Self {
        Self {
            name: iface.name.clone(),
            usable: iface.is_up() && !iface.is_loopback(),
            addrs: iface
                .ips
                .iter()
                .filter_map(|net| match net.ip() {
                    IpAddr::V4(ip) => Some(ip),
                    IpAddr::V6(_) => None,
                })
                .collect(),
        }
    }
}

/// Pair each configured interface with the address this server answers as.
///
/// An explicit address wins; otherwise the interface's first IPv4 address
/// is used. With nothing configured, the first up, non-loopback interface
/// with an IPv4 address is chosen.
pub fn resolve_interfaces(specs: &[InterfaceSpec]) -> Result<Vec<InterfaceBinding>, DispatchError> {
    let candidates: Vec<Candidate> = datalink::interfaces().iter().map(Candidate::from).collect();
    resolve(specs, &candidates)
}

fn resolve(specs: &[InterfaceSpec], candidates: &[Candidate]) -> Result<Vec<InterfaceBinding>, DispatchError> {
    if specs.is_empty() {
        let default = candidates
            .iter()
            .find(|c| c.usable && !c.addrs.is_empty())
            .ok_or_else(|| DispatchError::Interface("no suitable interface found".to_string()))?;
        return Ok(vec![InterfaceBinding {
            name: default.name.clone(),
            address: default.addrs[0],
        }]);
    }

    specs
        .iter()
        .map(|spec| {
            let candidate = candidates
                .iter()
                .find(|c| c.name == spec.name)
                .ok_or_else(|| DispatchError::Interface(spec.name.clone()))?;
            let address = spec
                .address
                .or_else(|| candidate.addrs.first().copied())
                .ok_or_else(|| DispatchError::Interface(spec.name.clone()))?;
            Ok(InterfaceBinding {
                name: spec.name.clone(),
                address,
            })
        })
        .collect()
}

/// One line per interface, for `--list-interfaces`.
pub fn list_interfaces() -> Vec<String> {
    datalink::interfaces()
        .into_iter()
        .map(|iface| {
            let status = if iface.is_up() { "UP" } else { "DOWN" };
            let ips: Vec<_> = iface.ips.iter().map(|ip| ip.to_string()).collect();
            format!(
                "{}: {} [{}]",
                iface.name,
                status,
                if ips.is_empty() {
                    "no IP".to_string()
                } else {
                    ips.join(", ")
                }
            )
        })
        .collect()
}
