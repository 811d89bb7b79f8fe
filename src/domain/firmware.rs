//! Firmware build domain model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Client system architecture codes (option 93) as defined in RFC 4578.
pub mod arch {
    pub const X86_BIOS: u16 = 0;
    pub const EFI_IA32: u16 = 6;
    pub const EFI_BC: u16 = 7;
    pub const EFI_X86_64: u16 = 9;
    pub const EFI_ARM64: u16 = 11;
}

/// The firmware a client is running, which decides how it chainloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirmwareBuild {
    /// Legacy BIOS PXE ROM, chainloads through UNDI.
    Undi,
    /// BIOS ROM with iPXE built in.
    Ipxe,
    Efi386,
    Efi64,
    #[serde(rename = "snponly-x86_64")]
    SnpOnlyX86_64,
    #[serde(rename = "snponly-arm64")]
    SnpOnlyArm64,
    /// iPXE that has already been chainloaded and identifies itself.
    Grendel,
}

/// Build → chainload binary. `Grendel` is deliberately absent.
const ASSETS: &[(FirmwareBuild, &str)] = &[
    (FirmwareBuild::Undi, "undionly.kpxe"),
    (FirmwareBuild::Ipxe, "ipxe.pxe"),
    (FirmwareBuild::Efi386, "ipxe-i386.efi"),
    (FirmwareBuild::Efi64, "ipxe-x86_64.efi"),
    (FirmwareBuild::SnpOnlyX86_64, "snponly-x86_64.efi"),
    (FirmwareBuild::SnpOnlyArm64, "snponly-arm64.efi"),
];

impl FirmwareBuild {
    pub const ALL: [FirmwareBuild; 7] = [
        Self::Undi,
        Self::Ipxe,
        Self::Efi386,
        Self::Efi64,
        Self::SnpOnlyX86_64,
        Self::SnpOnlyArm64,
        Self::Grendel,
    ];

    /// Stable wire tag used inside boot tokens.
    pub fn code(self) -> u8 {
        match self {
            Self::Undi => 1,
            Self::Ipxe => 2,
            Self::Efi386 => 3,
            Self::Efi64 => 4,
            Self::SnpOnlyX86_64 => 5,
            Self::SnpOnlyArm64 => 6,
            Self::Grendel => 7,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Undi => "undi",
            Self::Ipxe => "ipxe",
            Self::Efi386 => "efi386",
            Self::Efi64 => "efi64",
            Self::SnpOnlyX86_64 => "snponly-x86_64",
            Self::SnpOnlyArm64 => "snponly-arm64",
            Self::Grendel => "grendel",
        }
    }

    /// Name of the chainload binary served for this build, if it has one.
    pub fn asset_name(self) -> Option<&'static str> {
        ASSETS
            .iter()
            .find(|(build, _)| *build == self)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for FirmwareBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FirmwareBuild {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown firmware build '{}'", s))
    }
}
