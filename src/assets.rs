//! Chainload binaries, fetched by firmware token.
//!
//! The TFTP/HTTP front end lives elsewhere; this is the piece it calls to
//! turn a presented token into bytes.

use std::path::PathBuf;

use crate::domain::FirmwareBuild;
use crate::error::AssetError;
use crate::token::{TokenCodec, TokenPurpose};

/// Source of per-build chainload binaries.
pub trait AssetProvider: Send + Sync {
    fn get_asset(&self, build: FirmwareBuild) -> Result<Vec<u8>, AssetError>;
}

/// Binaries stored as files under one directory, named by
/// [`FirmwareBuild::asset_name`].
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetProvider for DirectoryAssets {
    fn get_asset(&self, build: FirmwareBuild) -> Result<Vec<u8>, AssetError> {
        let name = build.asset_name().ok_or(AssetError::NoAsset(build))?;
        Ok(std::fs::read(self.root.join(name))?)
    }
}

/// Verify `token` and return the binary it authorizes.
///
/// Only firmware tokens qualify; boot and BMC tokens are host-scoped and
/// never unlock a generic binary.
pub fn firmware_for_token(
    codec: &TokenCodec,
    provider: &dyn AssetProvider,
    token: &str,
) -> Result<(FirmwareBuild, Vec<u8>), AssetError> {
    let claims = codec.parse(token)?;
    let TokenPurpose::Firmware(build) = claims.purpose else {
        return Err(AssetError::NotFirmware);
    };
    let bytes = provider.get_asset(build)?;
    Ok((build, bytes))
}
