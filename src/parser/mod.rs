//! DHCP packet parsing module.
//!
//! This module is responsible for parsing raw bytes into domain request types.

mod dhcp_parser;

pub use dhcp_parser::{validate_guid, DhcpParser};
