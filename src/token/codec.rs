//! Signed boot tokens.
//!
//! A token is `base64url(payload) "." base64url(hmac_sha256(payload))`,
//! unpadded, so it can be used as a TFTP filename or a URL path segment.
//! The payload is `[version, purpose, build, subject...]`.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use macaddr::MacAddr6;
use sha2::Sha256;

use crate::domain::FirmwareBuild;
use crate::error::TokenError;

type HmacSha256 = Hmac<Sha256>;

const VERSION: u8 = 1;
const HEADER_LEN: usize = 3;

const PURPOSE_FIRMWARE: u8 = 1;
const PURPOSE_BOOT: u8 = 2;
const PURPOSE_BMC: u8 = 3;

/// What a token authorizes its bearer to fetch next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    /// Generic chainload binary for a firmware build; subject is the client MAC.
    Firmware(FirmwareBuild),
    /// Host-specific provisioning script; subject is the host id.
    Boot,
    /// BMC-scoped action; subject is the host id.
    Bmc,
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Firmware(build) => write!(f, "firmware({})", build),
            Self::Boot => write!(f, "boot"),
            Self::Bmc => write!(f, "bmc"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootClaims {
    pub subject: String,
    pub purpose: TokenPurpose,
}

/// Issues and verifies tokens with a single process-wide secret.
#[derive(Clone)]
pub struct TokenCodec {
    mac: HmacSha256,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::EmptySecret)?;
        Ok(Self { mac })
    }

    pub fn issue(&self, subject: &str, purpose: TokenPurpose) -> String {
        let (tag, build) = match purpose {
            TokenPurpose::Firmware(build) => (PURPOSE_FIRMWARE, build.code()),
            TokenPurpose::Boot => (PURPOSE_BOOT, 0),
            TokenPurpose::Bmc => (PURPOSE_BMC, 0),
        };

        let mut payload = Vec::with_capacity(HEADER_LEN + subject.len());
        payload.extend_from_slice(&[VERSION, tag, build]);
        payload.extend_from_slice(subject.as_bytes());

        let mut mac = self.mac.clone();
        mac.update(&payload);
        let signature = mac.finalize().into_bytes();

        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&payload),
            URL_SAFE_NO_PAD.encode(signature)
        )
    }

    /// Token for the generic chainload binary of `build`, bound to `mac`.
    pub fn firmware_token(&self, mac: MacAddr6, build: FirmwareBuild) -> String {
        self.issue(&mac_subject(mac), TokenPurpose::Firmware(build))
    }

    /// Verify and decode. Any defect yields an error, never partial claims.
    pub fn parse(&self, token: &str) -> Result<BootClaims, TokenError> {
        let (payload, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| TokenError::Encoding)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| TokenError::Encoding)?;

        let mut mac = self.mac.clone();
        mac.update(&payload);
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::Signature)?;

        if payload.len() < HEADER_LEN {
            return Err(TokenError::Malformed);
        }
        if payload[0] != VERSION {
            return Err(TokenError::Version(payload[0]));
        }
        let purpose = match (payload[1], payload[2]) {
            (PURPOSE_FIRMWARE, code) => TokenPurpose::Firmware(
                FirmwareBuild::from_code(code).ok_or(TokenError::Purpose(payload[1]))?,
            ),
            (PURPOSE_BOOT, 0) => TokenPurpose::Boot,
            (PURPOSE_BMC, 0) => TokenPurpose::Bmc,
            (other, _) => return Err(TokenError::Purpose(other)),
        };
        let subject =
            String::from_utf8(payload[HEADER_LEN..].to_vec()).map_err(|_| TokenError::Subject)?;

        Ok(BootClaims { subject, purpose })
    }
}

/// Canonical subject for MAC-bound tokens: lowercase, colon separated.
pub fn mac_subject(mac: MacAddr6) -> String {
    mac.to_string().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"test-secret-do-not-use").unwrap()
    }

    mod issue_tests {
        use super::*;

        #[test]
        fn test_roundtrip_all_purposes() {
            let codec = codec();
            let mut purposes = vec![TokenPurpose::Boot, TokenPurpose::Bmc];
            purposes.extend(FirmwareBuild::ALL.into_iter().map(TokenPurpose::Firmware));

            for purpose in purposes {
                let token = codec.issue("node-01", purpose);
                let claims = codec.parse(&token).unwrap();
                assert_eq!(claims.subject, "node-01");
                assert_eq!(claims.purpose, purpose);
            }
        }

        #[test]
        fn test_roundtrip_awkward_subjects() {
            let codec = codec();
            let subjects = [
                "",
                "aa:bb:cc:dd:ee:ff",
                "a b/c?d=e&f#g%h",
                "../../etc/passwd",
                "quote\"back\\slash'",
                "~!@$^*()+[]{}|;,<>",
                "tab\tand\nnewline",
            ];
            for subject in subjects {
                let token = codec.issue(subject, TokenPurpose::Boot);
                assert_eq!(codec.parse(&token).unwrap().subject, subject);
            }
        }

        #[test]
        fn test_token_is_path_and_filename_safe() {
            let codec = codec();
            let token = codec.issue("a b/c?d=e&f#g%h", TokenPurpose::Boot);
            assert!(token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
        }

        #[test]
        fn test_firmware_token_binds_mac() {
            let codec = codec();
            let mac = MacAddr6::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff);
            let token = codec.firmware_token(mac, FirmwareBuild::SnpOnlyX86_64);
            let claims = codec.parse(&token).unwrap();
            assert_eq!(claims.subject, "aa:bb:cc:dd:ee:ff");
            assert_eq!(
                claims.purpose,
                TokenPurpose::Firmware(FirmwareBuild::SnpOnlyX86_64)
            );
        }

        #[test]
        fn test_empty_secret_rejected() {
            assert_eq!(TokenCodec::new(b"").unwrap_err(), TokenError::EmptySecret);
        }
    }

    mod tamper_tests {
        use super::*;

        #[test]
        fn test_every_single_character_flip_fails() {
            let codec = codec();
            let token = codec.issue("aa:bb:cc:dd:ee:ff", TokenPurpose::Firmware(FirmwareBuild::Undi));

            for i in 0..token.len() {
                let mut bytes = token.clone().into_bytes();
                bytes[i] = if bytes[i] == b'A' { b'B' } else { b'A' };
                let tampered = String::from_utf8(bytes).unwrap();
                assert!(codec.parse(&tampered).is_err(), "flip at {i} accepted");
            }
        }

        #[test]
        fn test_truncation_fails() {
            let codec = codec();
            let token = codec.issue("node-01", TokenPurpose::Boot);
            for len in 0..token.len() {
                assert!(codec.parse(&token[..len]).is_err(), "prefix {len} accepted");
            }
        }

        #[test]
        fn test_other_secret_fails() {
            let token = codec().issue("node-01", TokenPurpose::Boot);
            let other = TokenCodec::new(b"another-secret").unwrap();
            assert_eq!(other.parse(&token), Err(TokenError::Signature));
        }

        #[test]
        fn test_structural_errors() {
            let codec = codec();
            assert_eq!(codec.parse("no-separator"), Err(TokenError::Malformed));
            assert_eq!(codec.parse("!!!.???"), Err(TokenError::Encoding));
            assert_eq!(codec.parse("AAAA.AAAA"), Err(TokenError::Signature));
        }

        #[test]
        fn test_signed_but_unknown_purpose_fails() {
            let codec = codec();
            let payload = [VERSION, 9, 0, b'x'];
            let mut mac = codec.mac.clone();
            mac.update(&payload);
            let token = format!(
                "{}.{}",
                URL_SAFE_NO_PAD.encode(payload),
                URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes())
            );
            assert_eq!(codec.parse(&token), Err(TokenError::Purpose(9)));
        }
    }
}
