//! DHCP packet parser implementation.
//!
//! Decodes the UDP payload with dhcproto and lifts the options the
//! negotiation engine consumes into a [`ClientRequest`].

use dhcproto::v4::{DhcpOption, Message, OptionCode};
use dhcproto::Decodable;
use macaddr::MacAddr6;

use crate::domain::ClientRequest;
use crate::error::ParseError;

/// Length of a well-formed option 97: type byte plus a 16-byte UUID.
const GUID_LEN: usize = 17;

/// Parser for inbound DHCP packets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DhcpParser;

impl DhcpParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse a request from a UDP payload.
    pub fn parse(&self, data: &[u8]) -> Result<ClientRequest, ParseError> {
        let message = Message::from_bytes(data).map_err(|e| ParseError::Decode(e.to_string()))?;
        self.from_message(message)
    }

    pub fn from_message(&self, message: Message) -> Result<ClientRequest, ParseError> {
        let opts = message.opts();

        let message_type = match opts.get(OptionCode::MessageType) {
            Some(DhcpOption::MessageType(mt)) => mt.clone(),
            _ => return Err(ParseError::MissingMessageType),
        };

        let chaddr = message.chaddr();
        if chaddr.len() < 6 {
            return Err(ParseError::ShortHardwareAddress(chaddr.len()));
        }
        let mac = MacAddr6::new(chaddr[0], chaddr[1], chaddr[2], chaddr[3], chaddr[4], chaddr[5]);

        let arch_codes = match opts.get(OptionCode::ClientSystemArchitecture) {
            Some(DhcpOption::ClientSystemArchitecture(arch)) => vec![u16::from(*arch)],
            _ => Vec::new(),
        };

        let user_class = match opts.get(OptionCode::UserClass) {
            Some(DhcpOption::UserClass(data)) => Some(decode_user_class(data)),
            _ => None,
        };

        let vendor_class = match opts.get(OptionCode::ClassIdentifier) {
            Some(DhcpOption::ClassIdentifier(data)) => {
                Some(String::from_utf8_lossy(data).into_owned())
            }
            _ => None,
        };

        let requested_options = match opts.get(OptionCode::ParameterRequestList) {
            Some(DhcpOption::ParameterRequestList(codes)) => {
                codes.iter().map(|code| u8::from(*code)).collect()
            }
            _ => Vec::new(),
        };

        let requested_ip = match opts.get(OptionCode::RequestedIpAddress) {
            Some(DhcpOption::RequestedIpAddress(ip)) => Some(*ip),
            _ => None,
        };

        let server_id = match opts.get(OptionCode::ServerIdentifier) {
            Some(DhcpOption::ServerIdentifier(ip)) => Some(*ip),
            _ => None,
        };

        let guid = match opts.get(OptionCode::ClientMachineIdentifier) {
            Some(DhcpOption::ClientMachineIdentifier(data)) => Some(validate_guid(data)?),
            _ => None,
        };

        Ok(ClientRequest {
            message_type,
            mac,
            xid: message.xid(),
            arch_codes,
            user_class,
            vendor_class,
            requested_options,
            giaddr: message.giaddr(),
            ciaddr: message.ciaddr(),
            requested_ip,
            server_id,
            guid,
            message,
        })
    }
}

/// Option 97 rules: empty is tolerated, otherwise type 0 plus 16 bytes.
pub fn validate_guid(data: &[u8]) -> Result<Vec<u8>, ParseError> {
    match data.len() {
        0 => Ok(Vec::new()),
        GUID_LEN if data[0] != 0 => Err(ParseError::GuidType(data[0])),
        GUID_LEN => Ok(data.to_vec()),
        other => Err(ParseError::GuidLength(other)),
    }
}

/// Option 77 is RFC 3004 length-prefixed, but iPXE sends the bare string.
fn decode_user_class(data: &[u8]) -> String {
    let inner = match data.split_first() {
        Some((&len, rest)) if len as usize == rest.len() && !rest.is_empty() => rest,
        _ => data,
    };
    String::from_utf8_lossy(inner).into_owned()
}
