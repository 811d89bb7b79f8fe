//! Host datastore.
//!
//! Handlers only see the [`HostLookup`](crate::domain::HostLookup) contract;
//! this is the file-backed implementation the daemon wires in.

mod memory;

pub use memory::HostStore;
