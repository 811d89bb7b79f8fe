//! Per-packet view of an inbound boot request.
//!
//! Built once by the parser and never persisted. Holds the decoded message
//! so replies can echo transaction fields and passthrough options.

use std::net::Ipv4Addr;

use dhcproto::v4::{DhcpOption, Message, MessageType, OptionCode};
use macaddr::MacAddr6;

/// Prefix of option 60 for PXE ROMs ("PXEClient:Arch:00000:UNDI:002001").
pub const PXE_CLIENT_CLASS: &str = "PXEClient";

#[derive(Debug, Clone)]
pub struct ClientRequest {
    pub message: Message,
    pub message_type: MessageType,
    pub mac: MacAddr6,
    pub xid: u32,
    /// Option 93 codes in the order presented.
    pub arch_codes: Vec<u16>,
    /// Option 77
    pub user_class: Option<String>,
    /// Option 60
    pub vendor_class: Option<String>,
    /// Option 55
    pub requested_options: Vec<u8>,
    pub giaddr: Ipv4Addr,
    pub ciaddr: Ipv4Addr,
    /// Option 50
    pub requested_ip: Option<Ipv4Addr>,
    /// Option 54
    pub server_id: Option<Ipv4Addr>,
    /// Option 97, already validated.
    pub guid: Option<Vec<u8>>,
}

impl ClientRequest {
    pub fn is_boot_request(&self) -> bool {
        self.message.opcode() == dhcproto::v4::Opcode::BootRequest
    }

    /// Whether the client listed `code` in its parameter request list.
    pub fn requested(&self, code: u8) -> bool {
        self.requested_options.contains(&code)
    }

    pub fn is_pxe_client(&self) -> bool {
        self.vendor_class
            .as_deref()
            .map(|vc| vc.starts_with(PXE_CLIENT_CLASS))
            .unwrap_or(false)
    }

    pub fn is_relayed(&self) -> bool {
        !self.giaddr.is_unspecified()
    }

    /// Option 82, echoed back verbatim in replies.
    pub fn relay_info(&self) -> Option<&DhcpOption> {
        self.message.opts().get(OptionCode::RelayAgentInformation)
    }

    /// The address the client wants confirmed: option 50, else ciaddr.
    pub fn confirming_ip(&self) -> Option<Ipv4Addr> {
        self.requested_ip
            .or_else(|| (!self.ciaddr.is_unspecified()).then_some(self.ciaddr))
    }

    pub fn user_class_is(&self, value: &str) -> bool {
        self.user_class.as_deref() == Some(value)
    }

    pub fn user_class_contains(&self, needle: &str) -> bool {
        self.user_class
            .as_deref()
            .map(|uc| uc.contains(needle))
            .unwrap_or(false)
    }

    pub fn vendor_class_contains(&self, needle: &str) -> bool {
        self.vendor_class
            .as_deref()
            .map(|vc| vc.contains(needle))
            .unwrap_or(false)
    }
}
