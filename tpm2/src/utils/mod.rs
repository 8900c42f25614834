//! Utility functions and supporting infrastructure.
//!
//! Provides byte sources, storage backends, the frame ring buffer, error
//! types and timing helpers used by the playback pipeline.

pub mod byte_source;
pub mod errors;
pub mod frame_buffer;
pub mod storage;
pub mod timing;
