//! Per-build boot decision table.

use std::net::Ipv4Addr;
use std::sync::Arc;

use crate::config::ServerContext;
use crate::detector::{FirmwareDetector, GRENDEL_USER_CLASS};
use crate::domain::{ClientRequest, FirmwareBuild, Host};
use crate::error::NegotiationError;
use crate::token::{TokenCodec, TokenPurpose};

use super::vendor::pxe_discovery_control;
use super::BootOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    Boot {
        build: FirmwareBuild,
        options: BootOptions,
    },
    /// UNDI client in combined mode; the port 4011 listener answers it.
    Deferred,
    /// Host exists but provisioning is disabled.
    Withheld,
    /// Request carries nothing that identifies a network-boot firmware.
    NotBootClient,
}

#[derive(Debug, Clone)]
pub struct BootPolicy {
    ctx: Arc<ServerContext>,
    tokens: TokenCodec,
    detector: FirmwareDetector,
}

impl BootPolicy {
    pub fn new(ctx: Arc<ServerContext>, tokens: TokenCodec) -> Self {
        Self {
            ctx,
            tokens,
            detector: FirmwareDetector::new(),
        }
    }

    pub fn negotiate(
        &self,
        request: &ClientRequest,
        host: &Host,
        server_ip: Ipv4Addr,
    ) -> Result<PolicyOutcome, NegotiationError> {
        if !host.provision {
            return Ok(PolicyOutcome::Withheld);
        }
        if request.arch_codes.is_empty()
            && host.firmware.is_none()
            && !request.user_class_is(GRENDEL_USER_CLASS)
        {
            return Ok(PolicyOutcome::NotBootClient);
        }

        let build = self.detector.classify(
            &request.arch_codes,
            request.user_class.as_deref(),
            host.firmware,
        )?;
        let tftp_server = Some(server_ip.to_string());

        let options = match build {
            FirmwareBuild::Undi if self.ctx.pxe_listener => return Ok(PolicyOutcome::Deferred),
            FirmwareBuild::Undi => BootOptions {
                vendor_specific: Some(pxe_discovery_control()),
                tftp_server,
                bootfile: Some(self.firmware_token(request, build)?),
                ..Default::default()
            },
            FirmwareBuild::Ipxe => {
                let token = self.firmware_token(request, build)?;
                BootOptions {
                    vendor_specific: Some(pxe_discovery_control()),
                    tftp_server,
                    bootfile: Some(self.ctx.endpoints.build(server_ip, &token).ipxe_script),
                    ..Default::default()
                }
            }
            FirmwareBuild::Efi386
            | FirmwareBuild::Efi64
            | FirmwareBuild::SnpOnlyX86_64
            | FirmwareBuild::SnpOnlyArm64 => BootOptions {
                tftp_server,
                bootfile: Some(self.firmware_token(request, build)?),
                ..Default::default()
            },
            FirmwareBuild::Grendel => {
                let token = self.tokens.issue(&host.id.to_string(), TokenPurpose::Boot);
                BootOptions {
                    bootfile: Some(self.ctx.endpoints.build(server_ip, &token).ipxe_script),
                    ..Default::default()
                }
            }
        };

        Ok(PolicyOutcome::Boot { build, options })
    }

    /// Generic chainload token; only builds with an asset get one.
    fn firmware_token(
        &self,
        request: &ClientRequest,
        build: FirmwareBuild,
    ) -> Result<String, NegotiationError> {
        build.asset_name().ok_or(NegotiationError::NoAsset(build))?;
        Ok(self.tokens.firmware_token(request.mac, build))
    }
}
