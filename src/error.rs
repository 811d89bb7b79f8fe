use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::domain::FirmwareBuild;

/// Errors raised while decoding an inbound datagram.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("undecodable DHCP message: {0}")]
    Decode(String),

    #[error("missing DHCP message type (option 53)")]
    MissingMessageType,

    #[error("client hardware address too short ({0} bytes)")]
    ShortHardwareAddress(usize),

    #[error("client machine identifier has invalid length {0}")]
    GuidLength(usize),

    #[error("client machine identifier has non-zero type byte {0:#04x}")]
    GuidType(u8),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("no client system architecture presented")]
    MissingArchitecture,

    #[error("unsupported client architecture {0}")]
    UnsupportedArchitecture(u16),
}

/// Token decoding fails closed: every variant means "no identity".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing secret must not be empty")]
    EmptySecret,

    #[error("token is not of the form payload.signature")]
    Malformed,

    #[error("token is not valid base64url")]
    Encoding,

    #[error("token signature mismatch")]
    Signature,

    #[error("unsupported token version {0}")]
    Version(u8),

    #[error("unknown token purpose {0}")]
    Purpose(u8),

    #[error("token subject is not valid UTF-8")]
    Subject,
}

#[derive(Error, Debug)]
pub enum NegotiationError {
    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("firmware build {0} has no chainload asset")]
    NoAsset(FirmwareBuild),

    #[error("failed to encode reply: {0}")]
    Encode(String),
}

#[derive(Error, Debug)]
pub enum AssetError {
    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("token does not carry a firmware purpose")]
    NotFirmware,

    #[error("firmware build {0} has no chainload asset")]
    NoAsset(FirmwareBuild),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("interface {0} not found or has no IPv4 address")]
    Interface(String),

    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error("shutdown deadline of {deadline:?} exceeded with {in_flight} task(s) in flight")]
    ShutdownTimeout { deadline: Duration, in_flight: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("hosts file error: {0}")]
    Hosts(#[from] serde_json::Error),
}
