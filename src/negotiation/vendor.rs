//! Byte and string formats dictated by vendor boot conventions.

use std::net::Ipv4Addr;

/// PXE vendor sub-option 6, discovery control.
const PXE_DISCOVERY_CONTROL: u8 = 6;
/// Skip boot server discovery and use the bootfile given.
const DISCOVERY_USE_BOOTFILE: u8 = 8;
const PXE_END: u8 = 0xff;

/// Option 43 payload telling a PXE ROM to skip boot server discovery.
pub fn pxe_discovery_control() -> Vec<u8> {
    vec![PXE_DISCOVERY_CONTROL, 1, DISCOVERY_USE_BOOTFILE, PXE_END]
}

/// ONIE two-value field: `first,second,`. Both commas are always present.
pub fn onie_fields(first: &str, second: &str) -> String {
    format!("{},{},", first, second)
}

/// iDRAC auto-config file location carried in option 43.
///
/// `-s 5` selects HTTP as share type, `-d 0` disables hash checking.
pub fn idrac_scp_location(server: Ipv4Addr, bmc_path: &str) -> String {
    format!(
        "-f scp.xml -i {} -n {} -s 5 -d 0",
        server,
        bmc_path.trim_start_matches('/')
    )
}

/// RFC 1035 label encoding of an option 119 search list, uncompressed.
///
/// Labels longer than 63 bytes are skipped.
pub fn encode_domain_search(domains: &[String]) -> Vec<u8> {
    let mut out = Vec::new();
    for domain in domains {
        let labels: Vec<&str> = domain
            .trim_end_matches('.')
            .split('.')
            .filter(|label| !label.is_empty())
            .collect();
        if labels.is_empty() || labels.iter().any(|label| label.len() > 63) {
            continue;
        }
        for label in labels {
            out.push(label.len() as u8);
            out.extend_from_slice(label.as_bytes());
        }
        out.push(0);
    }
    out
}
