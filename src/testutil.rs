//! Shared builders for test requests and hosts.

use std::collections::{BTreeSet, HashMap};
use std::net::Ipv4Addr;

use async_trait::async_trait;
use dhcproto::v4::{self, DhcpOption, Message, MessageType, Opcode, OptionCode};
use dhcproto::Encodable;
use macaddr::MacAddr6;
use uuid::Uuid;

use crate::domain::{ClientRequest, FirmwareBuild, Host, HostLookup, NetInterface};
use crate::parser::DhcpParser;

pub const CLIENT_MAC: MacAddr6 = MacAddr6::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff);
pub const SERVER_IP: Ipv4Addr = Ipv4Addr::new(10, 1, 0, 254);
pub const HOST_ID: &str = "6c1f0f7e-3f1b-4b4e-9d7a-0b8d3c2a1e55";

pub struct RequestFixture {
    msg: Message,
}

impl RequestFixture {
    pub fn new(message_type: MessageType) -> Self {
        let mut msg = Message::default();
        msg.set_opcode(Opcode::BootRequest)
            .set_htype(v4::HType::Eth)
            .set_xid(0x1234_5678)
            .set_chaddr(&CLIENT_MAC.into_array());
        msg.opts_mut().insert(DhcpOption::MessageType(message_type));
        Self { msg }
    }

    pub fn discover() -> Self {
        Self::new(MessageType::Discover)
    }

    pub fn request() -> Self {
        Self::new(MessageType::Request)
    }

    pub fn mac(mut self, mac: MacAddr6) -> Self {
        self.msg.set_chaddr(&mac.into_array());
        self
    }

    pub fn opcode(mut self, opcode: Opcode) -> Self {
        self.msg.set_opcode(opcode);
        self
    }

    pub fn arch(mut self, code: u16) -> Self {
        self.msg
            .opts_mut()
            .insert(DhcpOption::ClientSystemArchitecture(v4::Architecture::from(code)));
        self
    }

    pub fn user_class(mut self, data: &[u8]) -> Self {
        self.msg
            .opts_mut()
            .insert(DhcpOption::UserClass(data.to_vec()));
        self
    }

    pub fn vendor_class(mut self, class: &str) -> Self {
        self.msg
            .opts_mut()
            .insert(DhcpOption::ClassIdentifier(class.as_bytes().to_vec()));
        self
    }

    pub fn pxe(self) -> Self {
        self.vendor_class("PXEClient:Arch:00000:UNDI:002001")
    }

    pub fn requesting(mut self, codes: &[u8]) -> Self {
        self.msg.opts_mut().insert(DhcpOption::ParameterRequestList(
            codes.iter().map(|c| OptionCode::from(*c)).collect(),
        ));
        self
    }

    pub fn requested_ip(mut self, ip: Ipv4Addr) -> Self {
        self.msg
            .opts_mut()
            .insert(DhcpOption::RequestedIpAddress(ip));
        self
    }

    pub fn server_id(mut self, ip: Ipv4Addr) -> Self {
        self.msg.opts_mut().insert(DhcpOption::ServerIdentifier(ip));
        self
    }

    pub fn ciaddr(mut self, ip: Ipv4Addr) -> Self {
        self.msg.set_ciaddr(ip);
        self
    }

    pub fn giaddr(mut self, ip: Ipv4Addr) -> Self {
        self.msg.set_giaddr(ip);
        self
    }

    /// Option 82 with a single circuit-id sub-option.
    pub fn relay_circuit(mut self, circuit: &[u8]) -> Self {
        let mut info = v4::relay::RelayAgentInformation::default();
        info.insert(v4::relay::RelayInfo::AgentCircuitId(circuit.to_vec()));
        self.msg
            .opts_mut()
            .insert(DhcpOption::RelayAgentInformation(info));
        self
    }

    pub fn guid(mut self, data: &[u8]) -> Self {
        self.msg
            .opts_mut()
            .insert(DhcpOption::ClientMachineIdentifier(data.to_vec()));
        self
    }

    pub fn bytes(self) -> Vec<u8> {
        self.msg.to_vec().unwrap()
    }

    /// Encode then parse, so tests exercise the same path as the wire.
    pub fn parsed(self) -> ClientRequest {
        DhcpParser::new().parse(&self.bytes()).unwrap()
    }
}

pub fn interface(ip: &str) -> NetInterface {
    NetInterface {
        mac: CLIENT_MAC,
        ip: ip.parse().unwrap(),
        fqdn: Some("node-01.rack1.example.com".to_string()),
        vlan: None,
        mtu: None,
        gateway: None,
        dns: vec![],
        bmc: false,
    }
}

pub fn host() -> Host {
    Host {
        id: Uuid::parse_str(HOST_ID).unwrap(),
        name: "node-01".to_string(),
        provision: true,
        firmware: None,
        interfaces: vec![interface("10.1.0.1/24")],
        tags: BTreeSet::new(),
        image: None,
    }
}

pub fn host_with_firmware(build: FirmwareBuild) -> Host {
    Host {
        firmware: Some(build),
        ..host()
    }
}

pub fn host_with_tags(tags: &[&str]) -> Host {
    Host {
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..host()
    }
}

#[derive(Default)]
pub struct StaticHosts {
    hosts: HashMap<MacAddr6, Host>,
}

impl StaticHosts {
    pub fn with(host: Host) -> Self {
        let mut hosts = HashMap::new();
        for nic in &host.interfaces {
            hosts.insert(nic.mac, host.clone());
        }
        Self { hosts }
    }
}

#[async_trait]
impl HostLookup for StaticHosts {
    async fn find_by_mac(&self, mac: MacAddr6) -> Option<Host> {
        self.hosts.get(&mac).cloned()
    }
}

pub fn option<'a>(msg: &'a Message, code: OptionCode) -> Option<&'a DhcpOption> {
    msg.opts().get(code)
}

pub fn bootfile(msg: &Message) -> Option<String> {
    match msg.opts().get(OptionCode::BootfileName) {
        Some(DhcpOption::BootfileName(name)) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

pub fn tftp_server(msg: &Message) -> Option<String> {
    match msg.opts().get(OptionCode::TFTPServerName) {
        Some(DhcpOption::TFTPServerName(name)) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// Capture `tracing` output for the current thread.
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}

#[derive(Clone, Default)]
pub struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
