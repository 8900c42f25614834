//! Data structures shared across the playback pipeline.
//!
//! Contains the TPM2 packet vocabulary, pixel colors, strip segments and the
//! playback requests and sessions the controller works on.

pub mod color;
pub mod packet;
pub mod segment;
pub mod session;
