//! Reply packet construction and destination selection.

use std::net::{Ipv4Addr, SocketAddr};

use dhcproto::v4::{
    DhcpOption, Flags, Message, MessageType, Opcode, OptionCode, UnknownOption,
};
use dhcproto::Encodable;

use crate::domain::{ClientRequest, PXE_CLIENT_CLASS};
use crate::error::NegotiationError;
use crate::negotiation::{BootOptions, Lease};

pub const DHCP_SERVER_PORT: u16 = 67;
pub const DHCP_CLIENT_PORT: u16 = 68;
pub const PXE_PORT: u16 = 4011;

/// Room in the fixed `file` header field, including the terminating NUL.
const FILE_FIELD_LEN: usize = 128;

/// A reply ready to send.
#[derive(Debug, Clone)]
pub struct Reply {
    pub message_type: MessageType,
    pub message: Message,
    pub destination: SocketAddr,
}

impl Reply {
    pub fn encode(&self) -> Result<Vec<u8>, NegotiationError> {
        self.message
            .to_vec()
            .map_err(|e| NegotiationError::Encode(e.to_string()))
    }

    /// Send somewhere other than the standard DHCP destination.
    pub fn to(mut self, destination: SocketAddr) -> Self {
        self.destination = destination;
        self
    }

    pub fn is_broadcast(&self) -> bool {
        self.message.flags().broadcast()
    }
}

/// Builds a reply to one request, echoing its transaction fields.
pub struct ReplyBuilder<'a> {
    request: &'a ClientRequest,
    message_type: MessageType,
    message: Message,
}

impl<'a> ReplyBuilder<'a> {
    pub fn new(request: &'a ClientRequest, message_type: MessageType, server_ip: Ipv4Addr) -> Self {
        let mut message = Message::default();
        message
            .set_opcode(Opcode::BootReply)
            .set_htype(request.message.htype())
            .set_xid(request.xid)
            .set_chaddr(request.message.chaddr())
            .set_giaddr(request.giaddr);
        if message_type == MessageType::Ack {
            message.set_ciaddr(request.ciaddr);
        }

        message
            .opts_mut()
            .insert(DhcpOption::MessageType(message_type.clone()));
        message
            .opts_mut()
            .insert(DhcpOption::ServerIdentifier(server_ip));
        if let Some(relay) = request.relay_info() {
            message.opts_mut().insert(relay.clone());
        }

        Self {
            request,
            message_type,
            message,
        }
    }

    /// Option 60 `PXEClient` plus the client's option 97, if it sent one.
    pub fn pxe_identity(mut self) -> Self {
        self.message.opts_mut().insert(DhcpOption::ClassIdentifier(
            PXE_CLIENT_CLASS.as_bytes().to_vec(),
        ));
        if let Some(guid) = &self.request.guid {
            self.message
                .opts_mut()
                .insert(DhcpOption::ClientMachineIdentifier(guid.clone()));
        }
        self
    }

    /// Address assignment. INFORM acks carry configuration only.
    pub fn lease(mut self, lease: &Lease, inform: bool) -> Self {
        let opts = self.message.opts_mut();
        opts.insert(DhcpOption::SubnetMask(lease.subnet_mask));
        if let Some(router) = lease.router {
            opts.insert(DhcpOption::Router(vec![router]));
        }
        if !lease.dns.is_empty() {
            opts.insert(DhcpOption::DomainNameServer(lease.dns.clone()));
        }
        if let Some(mtu) = lease.mtu {
            opts.insert(DhcpOption::InterfaceMtu(mtu));
        }
        if let Some(hostname) = &lease.hostname {
            opts.insert(DhcpOption::Hostname(hostname.clone()));
        }
        if let Some(search) = &lease.domain_search {
            opts.insert(DhcpOption::Unknown(UnknownOption::new(
                OptionCode::DomainSearch,
                search.clone(),
            )));
        }
        if !inform {
            opts.insert(DhcpOption::AddressLeaseTime(lease.lease_time));
            self.message.set_yiaddr(lease.address);
        }
        self
    }

    pub fn boot(mut self, boot: &BootOptions, server_ip: Ipv4Addr) -> Self {
        if let Some(vendor) = &boot.vendor_specific {
            self.message
                .opts_mut()
                .insert(DhcpOption::VendorExtensions(vendor.clone()));
        }
        if let Some(tftp) = &boot.tftp_server {
            self.message.set_siaddr(server_ip);
            self.message
                .opts_mut()
                .insert(DhcpOption::TFTPServerName(tftp.as_bytes().to_vec()));
        }
        if let Some(bootfile) = &boot.bootfile {
            if bootfile.len() < FILE_FIELD_LEN {
                self.message.set_fname_str(bootfile);
            }
            self.message
                .opts_mut()
                .insert(DhcpOption::BootfileName(bootfile.as_bytes().to_vec()));
        }
        for (code, value) in &boot.private {
            self.message
                .opts_mut()
                .insert(DhcpOption::Unknown(UnknownOption::new(
                    OptionCode::from(*code),
                    value.as_bytes().to_vec(),
                )));
        }
        self
    }

    /// Option 56 diagnostic for NAKs.
    pub fn diagnostic(mut self, text: &str) -> Self {
        self.message
            .opts_mut()
            .insert(DhcpOption::Message(text.to_string()));
        self
    }

    /// Pick the destination and set the broadcast flag to match.
    ///
    /// Relayed → relay agent; NAK → broadcast; known client address →
    /// unicast; otherwise broadcast. A relayed NAK still carries the
    /// broadcast flag.
    pub fn build(mut self) -> Reply {
        let request = self.request;
        let broadcast = SocketAddr::new(Ipv4Addr::BROADCAST.into(), DHCP_CLIENT_PORT);

        let nak = self.message_type == MessageType::Nak;

        let (destination, flags) = if request.is_relayed() {
            // RFC 2131 4.3.2: the relay must broadcast a NAK to the client.
            let flags = if nak {
                Flags::default().set_broadcast()
            } else {
                request.message.flags()
            };
            (SocketAddr::new(request.giaddr.into(), DHCP_SERVER_PORT), flags)
        } else if nak {
            (broadcast, Flags::default().set_broadcast())
        } else if !request.ciaddr.is_unspecified() {
            (
                SocketAddr::new(request.ciaddr.into(), DHCP_CLIENT_PORT),
                Flags::default(),
            )
        } else {
            (broadcast, Flags::default().set_broadcast())
        };
        self.message.set_flags(flags);

        Reply {
            message_type: self.message_type,
            message: self.message,
            destination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::negotiation::{OPTION_DELL_ZTD, OPTION_PROXMOX};
    use crate::testutil::{self, RequestFixture, SERVER_IP};

    fn lease() -> Lease {
        Lease {
            address: Ipv4Addr::new(10, 1, 0, 1),
            subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            lease_time: 3600,
            mtu: Some(9000),
            router: Some(Ipv4Addr::new(10, 1, 0, 254)),
            dns: vec![Ipv4Addr::new(10, 1, 0, 53)],
            hostname: Some("node-01".to_string()),
            domain_search: None,
        }
    }

    mod destination_tests {
        use super::*;

        #[test]
        fn test_plain_broadcast() {
            let request = RequestFixture::discover().parsed();
            let reply = ReplyBuilder::new(&request, MessageType::Offer, SERVER_IP).build();
            assert_eq!(reply.destination, "255.255.255.255:68".parse().unwrap());
            assert!(reply.is_broadcast());
        }

        #[test]
        fn test_relayed_goes_to_relay() {
            let request = RequestFixture::discover()
                .giaddr(Ipv4Addr::new(10, 2, 0, 1))
                .ciaddr(Ipv4Addr::new(10, 2, 0, 50))
                .parsed();
            let reply = ReplyBuilder::new(&request, MessageType::Offer, SERVER_IP).build();
            assert_eq!(reply.destination, "10.2.0.1:67".parse().unwrap());
            assert_eq!(reply.message.giaddr(), Ipv4Addr::new(10, 2, 0, 1));
        }

        #[test]
        fn test_client_address_unicast() {
            let request = RequestFixture::request()
                .ciaddr(Ipv4Addr::new(10, 1, 0, 1))
                .parsed();
            let reply = ReplyBuilder::new(&request, MessageType::Ack, SERVER_IP).build();
            assert_eq!(reply.destination, "10.1.0.1:68".parse().unwrap());
            assert!(!reply.is_broadcast());
            assert_eq!(reply.message.ciaddr(), Ipv4Addr::new(10, 1, 0, 1));
        }

        #[test]
        fn test_nak_always_broadcast_unless_relayed() {
            let request = RequestFixture::request()
                .ciaddr(Ipv4Addr::new(10, 1, 0, 1))
                .parsed();
            let reply = ReplyBuilder::new(&request, MessageType::Nak, SERVER_IP).build();
            assert_eq!(reply.destination, "255.255.255.255:68".parse().unwrap());
            assert!(reply.is_broadcast());

            let relayed = RequestFixture::request()
                .giaddr(Ipv4Addr::new(10, 2, 0, 1))
                .parsed();
            let reply = ReplyBuilder::new(&relayed, MessageType::Nak, SERVER_IP).build();
            assert_eq!(reply.destination, "10.2.0.1:67".parse().unwrap());
        }

        #[test]
        fn test_relayed_nak_sets_broadcast_flag() {
            let relayed = RequestFixture::request()
                .giaddr(Ipv4Addr::new(10, 2, 0, 1))
                .parsed();
            assert!(!relayed.message.flags().broadcast());

            let nak = ReplyBuilder::new(&relayed, MessageType::Nak, SERVER_IP).build();
            assert!(nak.is_broadcast());

            let offer = ReplyBuilder::new(&relayed, MessageType::Offer, SERVER_IP).build();
            assert!(!offer.is_broadcast());
        }

        #[test]
        fn test_to_overrides_destination() {
            let request = RequestFixture::request().parsed();
            let source: SocketAddr = "10.1.0.9:4011".parse().unwrap();
            let reply = ReplyBuilder::new(&request, MessageType::Ack, SERVER_IP)
                .build()
                .to(source);
            assert_eq!(reply.destination, source);
        }
    }

    mod option_tests {
        use super::*;

        #[test]
        fn test_header_echoes_request() {
            let request = RequestFixture::discover().parsed();
            let reply = ReplyBuilder::new(&request, MessageType::Offer, SERVER_IP).build();
            assert_eq!(reply.message.opcode(), Opcode::BootReply);
            assert_eq!(reply.message.xid(), 0x1234_5678);
            assert_eq!(reply.message.chaddr(), &testutil::CLIENT_MAC.into_array()[..]);
            assert!(matches!(
                testutil::option(&reply.message, OptionCode::ServerIdentifier),
                Some(DhcpOption::ServerIdentifier(ip)) if *ip == SERVER_IP
            ));
        }

        #[test]
        fn test_lease_fields() {
            let request = RequestFixture::discover().parsed();
            let reply = ReplyBuilder::new(&request, MessageType::Offer, SERVER_IP)
                .lease(&lease(), false)
                .build();
            let msg = &reply.message;
            assert_eq!(msg.yiaddr(), Ipv4Addr::new(10, 1, 0, 1));
            assert!(matches!(
                testutil::option(msg, OptionCode::AddressLeaseTime),
                Some(DhcpOption::AddressLeaseTime(3600))
            ));
            assert!(matches!(
                testutil::option(msg, OptionCode::InterfaceMtu),
                Some(DhcpOption::InterfaceMtu(9000))
            ));
            assert!(matches!(
                testutil::option(msg, OptionCode::Hostname),
                Some(DhcpOption::Hostname(name)) if name == "node-01"
            ));
        }

        #[test]
        fn test_inform_ack_has_no_address_or_lease_time() {
            let request = RequestFixture::new(MessageType::Inform)
                .ciaddr(Ipv4Addr::new(10, 1, 0, 1))
                .parsed();
            let reply = ReplyBuilder::new(&request, MessageType::Ack, SERVER_IP)
                .lease(&lease(), true)
                .build();
            assert_eq!(reply.message.yiaddr(), Ipv4Addr::UNSPECIFIED);
            assert!(testutil::option(&reply.message, OptionCode::AddressLeaseTime).is_none());
            assert!(testutil::option(&reply.message, OptionCode::SubnetMask).is_some());
        }

        #[test]
        fn test_boot_options() {
            let request = RequestFixture::discover().parsed();
            let mut boot = BootOptions {
                vendor_specific: Some(vec![6, 1, 8, 255]),
                tftp_server: Some("10.1.0.254".to_string()),
                bootfile: Some("TOKEN".to_string()),
                ..Default::default()
            };
            boot.private.insert(OPTION_DELL_ZTD, "http://ztd".to_string());
            boot.private.insert(OPTION_PROXMOX, "http://answer".to_string());

            let reply = ReplyBuilder::new(&request, MessageType::Offer, SERVER_IP)
                .boot(&boot, SERVER_IP)
                .build();
            let msg = &reply.message;
            assert_eq!(msg.siaddr(), SERVER_IP);
            assert_eq!(testutil::bootfile(msg).as_deref(), Some("TOKEN"));
            assert_eq!(testutil::tftp_server(msg).as_deref(), Some("10.1.0.254"));
            assert!(matches!(
                testutil::option(msg, OptionCode::VendorExtensions),
                Some(DhcpOption::VendorExtensions(v)) if v == &[6, 1, 8, 255]
            ));
            assert!(testutil::option(msg, OptionCode::from(OPTION_DELL_ZTD)).is_some());
            assert!(testutil::option(msg, OptionCode::from(OPTION_PROXMOX)).is_some());
            assert!(reply.encode().is_ok());
        }

        #[test]
        fn test_long_bootfile_only_in_option() {
            let request = RequestFixture::discover().parsed();
            let long = format!("http://10.1.0.254/boot/{}/ipxe", "x".repeat(200));
            let boot = BootOptions {
                bootfile: Some(long.clone()),
                ..Default::default()
            };
            let reply = ReplyBuilder::new(&request, MessageType::Offer, SERVER_IP)
                .boot(&boot, SERVER_IP)
                .build();
            assert_eq!(testutil::bootfile(&reply.message), Some(long));
            assert!(reply.encode().is_ok());
        }

        #[test]
        fn test_pxe_identity_echoes_guid() {
            let mut guid = vec![0u8];
            guid.extend([7u8; 16]);
            let request = RequestFixture::discover().pxe().guid(&guid).parsed();
            let reply = ReplyBuilder::new(&request, MessageType::Offer, SERVER_IP)
                .pxe_identity()
                .build();
            assert!(matches!(
                testutil::option(&reply.message, OptionCode::ClassIdentifier),
                Some(DhcpOption::ClassIdentifier(c)) if c == b"PXEClient"
            ));
            assert!(matches!(
                testutil::option(&reply.message, OptionCode::ClientMachineIdentifier),
                Some(DhcpOption::ClientMachineIdentifier(g)) if *g == guid
            ));
        }

        #[test]
        fn test_nak_diagnostic() {
            let request = RequestFixture::request().parsed();
            let reply = ReplyBuilder::new(&request, MessageType::Nak, SERVER_IP)
                .diagnostic("wrong address")
                .build();
            assert!(matches!(
                testutil::option(&reply.message, OptionCode::Message),
                Some(DhcpOption::Message(m)) if m == "wrong address"
            ));
        }
    }
}
