//! Firmware classification.

use crate::domain::{arch, FirmwareBuild};
use crate::error::ClassifyError;

/// User class sent by a ROM with iPXE built in.
pub const IPXE_USER_CLASS: &str = "iPXE";

/// User class sent by the provisioning iPXE script after chainloading.
pub const GRENDEL_USER_CLASS: &str = "grendel";

/// Classify a client from its architecture codes and user class.
///
/// Only the first architecture code is considered.
pub fn detect(arch_codes: &[u16], user_class: Option<&str>) -> Result<FirmwareBuild, ClassifyError> {
    if user_class == Some(GRENDEL_USER_CLASS) {
        return Ok(FirmwareBuild::Grendel);
    }

    let code = *arch_codes.first().ok_or(ClassifyError::MissingArchitecture)?;
    let build = match code {
        arch::X86_BIOS => FirmwareBuild::Undi,
        arch::EFI_IA32 => FirmwareBuild::Efi386,
        arch::EFI_BC | arch::EFI_X86_64 => FirmwareBuild::SnpOnlyX86_64,
        arch::EFI_ARM64 => FirmwareBuild::SnpOnlyArm64,
        other => return Err(ClassifyError::UnsupportedArchitecture(other)),
    };

    if build == FirmwareBuild::Undi && user_class == Some(IPXE_USER_CLASS) {
        return Ok(FirmwareBuild::Ipxe);
    }
    Ok(build)
}

/// Classifies requests, letting a host's firmware override win.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirmwareDetector;

impl FirmwareDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(
        &self,
        arch_codes: &[u16],
        user_class: Option<&str>,
        host_override: Option<FirmwareBuild>,
    ) -> Result<FirmwareBuild, ClassifyError> {
        match host_override {
            Some(build) => Ok(build),
            None => detect(arch_codes, user_class),
        }
    }
}
