//! Main DHCP handler: DISCOVER, REQUEST and INFORM on port 67.

use std::net::Ipv4Addr;
use std::sync::Arc;

use dhcproto::v4::MessageType;
use macaddr::MacAddr6;
use tracing::{debug, info, warn, Instrument, Span};

use crate::config::ServerContext;
use crate::domain::{ClientRequest, Host, HostLookup};
use crate::error::NegotiationError;
use crate::negotiation::{BootPolicy, LeaseResolver, PolicyOutcome};
use crate::parser::DhcpParser;
use crate::token::TokenCodec;

use super::{Disposition, DropReason, ReplyBuilder};

pub struct DhcpHandler {
    ctx: Arc<ServerContext>,
    hosts: Arc<dyn HostLookup>,
    parser: DhcpParser,
    policy: BootPolicy,
    leases: LeaseResolver,
    span: Span,
}

impl DhcpHandler {
    pub fn new(ctx: Arc<ServerContext>, hosts: Arc<dyn HostLookup>, tokens: TokenCodec) -> Self {
        Self {
            policy: BootPolicy::new(ctx.clone(), tokens.clone()),
            leases: LeaseResolver::new(ctx.clone(), tokens),
            parser: DhcpParser::new(),
            ctx,
            hosts,
            span: Span::none(),
        }
    }

    /// Run all handling inside `span`.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Handle one datagram received on the interface answering as `server_ip`.
    pub async fn handle(&self, payload: &[u8], server_ip: Ipv4Addr) -> Disposition {
        async {
            let (mac, disposition) = self.process(payload, server_ip).await;
            match &disposition {
                Disposition::Reply(reply) => info!(
                    mac = %mac.map(|m| m.to_string()).unwrap_or_default(),
                    msg_type = ?reply.message_type,
                    yiaddr = %reply.message.yiaddr(),
                    dest = %reply.destination,
                    "Prepared DHCP reply"
                ),
                Disposition::Drop(reason) => reason.log(mac),
            }
            disposition
        }
        .instrument(self.span.clone())
        .await
    }

    async fn process(&self, payload: &[u8], server_ip: Ipv4Addr) -> (Option<MacAddr6>, Disposition) {
        let request = match self.parser.parse(payload) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "Failed to parse DHCP packet");
                return (None, Disposition::Drop(DropReason::Malformed));
            }
        };
        if !request.is_boot_request() {
            return (Some(request.mac), Disposition::Drop(DropReason::NotBootRequest));
        }

        debug!(
            mac = %request.mac,
            xid = request.xid,
            msg_type = ?request.message_type,
            arch = ?request.arch_codes,
            user_class = ?request.user_class,
            "Received DHCP request"
        );

        let disposition = match request.message_type {
            MessageType::Discover => self.discover(&request, server_ip).await,
            MessageType::Request | MessageType::Inform => self.acknowledge(&request, server_ip).await,
            ref other => Disposition::Drop(DropReason::Unsupported(other.clone())),
        };
        (Some(request.mac), disposition)
    }

    async fn discover(&self, request: &ClientRequest, server_ip: Ipv4Addr) -> Disposition {
        let Some(host) = self.hosts.find_by_mac(request.mac).await else {
            return Disposition::Drop(DropReason::UnknownClient);
        };
        if self.ctx.proxy_only {
            return self.proxy_offer(request, &host, server_ip);
        }

        let Some(nic) = host.interface(request.mac) else {
            return Disposition::Drop(DropReason::NoMatchingInterface);
        };

        let boot = match self.policy.negotiate(request, &host, server_ip) {
            Ok(PolicyOutcome::Boot { build, options }) => {
                debug!(mac = %request.mac, build = %build, "Negotiated boot options");
                Some(options)
            }
            Ok(outcome) => {
                debug!(mac = %request.mac, outcome = ?outcome, "No boot options");
                None
            }
            Err(e) => return Disposition::Drop(DropReason::Policy(e.to_string())),
        };

        let lease = self.leases.assign(nic, request);
        let mut options = self.leases.ztp(&host, server_ip, request);
        if let Some(boot) = boot {
            options.merge(boot);
        }

        let mut builder = ReplyBuilder::new(request, MessageType::Offer, server_ip)
            .lease(&lease, false)
            .boot(&options, server_ip);
        if request.is_pxe_client() {
            builder = builder.pxe_identity();
        }
        Disposition::Reply(builder.build())
    }

    /// ProxyDHCP offer: boot options only, never an address.
    fn proxy_offer(&self, request: &ClientRequest, host: &Host, server_ip: Ipv4Addr) -> Disposition {
        let builder = ReplyBuilder::new(request, MessageType::Offer, server_ip).pxe_identity();
        match self.policy.negotiate(request, host, server_ip) {
            Ok(PolicyOutcome::Boot { options, .. }) => {
                Disposition::Reply(builder.boot(&options, server_ip).build())
            }
            // The ROM moves on to port 4011 when the offer has no bootfile.
            Ok(PolicyOutcome::Deferred) => Disposition::Reply(builder.build()),
            Ok(PolicyOutcome::Withheld) => Disposition::Drop(DropReason::ProvisioningDisabled),
            Ok(PolicyOutcome::NotBootClient) => Disposition::Drop(DropReason::NotBootClient),
            Err(NegotiationError::Classify(e)) => Disposition::Drop(DropReason::Unclassified(e)),
            Err(NegotiationError::NoAsset(build)) => Disposition::Drop(DropReason::NoAsset(build)),
            Err(e) => Disposition::Drop(DropReason::Policy(e.to_string())),
        }
    }

    async fn acknowledge(&self, request: &ClientRequest, server_ip: Ipv4Addr) -> Disposition {
        if self.ctx.proxy_only {
            return Disposition::Drop(DropReason::ProxyOnly);
        }
        let Some(host) = self.hosts.find_by_mac(request.mac).await else {
            return Disposition::Drop(DropReason::UnknownClient);
        };
        let Some(nic) = host.interface(request.mac) else {
            return Disposition::Drop(DropReason::NoMatchingInterface);
        };

        if let Err(message) = self.leases.confirm(nic, server_ip, request) {
            info!(mac = %request.mac, reason = %message, "Sending NAK");
            let reply = ReplyBuilder::new(request, MessageType::Nak, server_ip)
                .diagnostic(&message)
                .build();
            return Disposition::Reply(reply);
        }

        let inform = request.message_type == MessageType::Inform;
        let lease = self.leases.assign(nic, request);
        let mut options = self.leases.ztp(&host, server_ip, request);
        match self.policy.negotiate(request, &host, server_ip) {
            Ok(PolicyOutcome::Boot { options: boot, .. }) => options.merge(boot),
            Ok(_) => {}
            Err(e) => warn!(
                mac = %request.mac,
                error = %e,
                "Boot negotiation failed, acknowledging without boot options"
            ),
        }

        let mut builder = ReplyBuilder::new(request, MessageType::Ack, server_ip)
            .lease(&lease, inform)
            .boot(&options, server_ip);
        if request.is_pxe_client() {
            builder = builder.pxe_identity();
        }
        Disposition::Reply(builder.build())
    }
}
