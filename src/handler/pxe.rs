//! Second-stage PXE boot server on port 4011.
//!
//! Only clients the main handler deferred ever get here, so anything short
//! of a provisionable host with an architecture option is ignored.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use dhcproto::v4::MessageType;
use tracing::{debug, info, Instrument, Span};

use crate::detector::FirmwareDetector;
use crate::domain::{ClientRequest, HostLookup};
use crate::negotiation::vendor::pxe_discovery_control;
use crate::negotiation::BootOptions;
use crate::parser::DhcpParser;
use crate::token::TokenCodec;

use super::{Disposition, DropReason, ReplyBuilder};

pub struct PxeHandler {
    hosts: Arc<dyn HostLookup>,
    tokens: TokenCodec,
    parser: DhcpParser,
    detector: FirmwareDetector,
    span: Span,
}

impl PxeHandler {
    pub fn new(hosts: Arc<dyn HostLookup>, tokens: TokenCodec) -> Self {
        Self {
            hosts,
            tokens,
            parser: DhcpParser::new(),
            detector: FirmwareDetector::new(),
            span: Span::none(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Answer one datagram from `source`; replies go straight back to it.
    pub async fn handle(&self, payload: &[u8], server_ip: Ipv4Addr, source: SocketAddr) -> Disposition {
        async {
            let request = match self.parser.parse(payload) {
                Ok(request) => request,
                Err(e) => {
                    debug!(error = %e, source = %source, "Failed to parse PXE packet");
                    return Disposition::Drop(DropReason::Malformed);
                }
            };

            let disposition = self.process(&request, server_ip, source).await;
            match &disposition {
                Disposition::Reply(reply) => info!(
                    mac = %request.mac,
                    xid = request.xid,
                    dest = %reply.destination,
                    "Prepared PXE boot server reply"
                ),
                Disposition::Drop(reason) => reason.log(Some(request.mac)),
            }
            disposition
        }
        .instrument(self.span.clone())
        .await
    }

    async fn process(
        &self,
        request: &ClientRequest,
        server_ip: Ipv4Addr,
        source: SocketAddr,
    ) -> Disposition {
        if !request.is_boot_request() {
            return Disposition::Drop(DropReason::NotBootRequest);
        }
        match request.message_type {
            MessageType::Discover | MessageType::Request | MessageType::Inform => {}
            ref other => return Disposition::Drop(DropReason::Unsupported(other.clone())),
        }
        if request.arch_codes.is_empty() {
            return Disposition::Drop(DropReason::MissingArchitecture);
        }

        let Some(host) = self.hosts.find_by_mac(request.mac).await else {
            return Disposition::Drop(DropReason::UnknownClient);
        };
        if !host.provision {
            return Disposition::Drop(DropReason::ProvisioningDisabled);
        }

        let build = match self.detector.classify(
            &request.arch_codes,
            request.user_class.as_deref(),
            host.firmware,
        ) {
            Ok(build) => build,
            Err(e) => return Disposition::Drop(DropReason::Unclassified(e)),
        };
        if build.asset_name().is_none() {
            return Disposition::Drop(DropReason::NoAsset(build));
        }

        let options = BootOptions {
            vendor_specific: Some(pxe_discovery_control()),
            tftp_server: Some(server_ip.to_string()),
            bootfile: Some(self.tokens.firmware_token(request.mac, build)),
            ..Default::default()
        };
        debug!(mac = %request.mac, build = %build, "Answering deferred client");

        let reply = ReplyBuilder::new(request, MessageType::Ack, server_ip)
            .boot(&options, server_ip)
            .pxe_identity()
            .build();
        if source.ip().is_unspecified() {
            return Disposition::Reply(reply);
        }
        Disposition::Reply(reply.to(source))
    }
}
