//! Boot token module.
//!
//! Stateless signed credentials carried across chainload stages.

mod codec;

pub use codec::{mac_subject, BootClaims, TokenCodec, TokenPurpose};
