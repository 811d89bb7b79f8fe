//! Firmware detection module.
//!
//! Maps a request's architecture and user class onto a firmware build.

mod firmware_detector;

pub use firmware_detector::{detect, FirmwareDetector, GRENDEL_USER_CLASS, IPXE_USER_CLASS};
