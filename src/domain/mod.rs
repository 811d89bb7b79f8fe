//! Domain models for boot negotiation.
//!
//! This module contains the core domain types that are independent
//! of any infrastructure concerns.

mod firmware;
mod host;
mod request;

pub use firmware::{arch, FirmwareBuild};
pub use host::{Host, HostLookup, NetInterface};
pub use request::{ClientRequest, PXE_CLIENT_CLASS};
