//! pxeward - bare-metal network boot negotiator.
//!
//! Answers DHCP and PXE boot requests from cluster nodes, classifies each
//! client's firmware and hands it a signed, stateless token naming the
//! next chainload stage.

pub mod assets;
pub mod config;
pub mod detector;
pub mod dispatcher;
pub mod domain;
pub mod endpoints;
pub mod error;
pub mod handler;
pub mod logging;
pub mod negotiation;
pub mod parser;
pub mod store;
pub mod token;

#[cfg(test)]
mod testutil;
