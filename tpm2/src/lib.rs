#![doc = include_str!("../README.md")]
//!
//! ## Technical Overview
//!
//! ### Pipeline
//!
//! 1. [`utils::storage::StorageChain`] resolves a recording on the first
//!    backend that has it and opens a [`utils::byte_source::ByteSource`].
//! 2. [`process::scan::PacketScanner`] splits the byte stream into packets,
//!    resynchronizing on start markers.
//! 3. [`process::decode::FrameDecoder`] writes data frame pixels into a
//!    window of the [`utils::frame_buffer::FrameBuffer`] ring.
//! 4. [`output::sink::PixelSink`] draws the oldest loaded window onto an
//!    [`output::Strip`] and flushes it.
//!
//! [`process::playback::PlaybackController`] drives all of the above from
//! its `tick` method.
//!
//! ### States
//!
//! `Idle → Loading ⇄ Playing → Draining → Idle`. Draining turns the session's
//! LEDs off, releases the realtime lock and closes the recording.

/// Scanning, decoding and playback of recordings.
///
/// 1. **Scanning** ([`process::scan`]): packet tokenization with resync.
/// 2. **Decoding** ([`process::decode`]): RGB payloads to RGBW windows.
/// 3. **Playback** ([`process::playback`]): the tick-driven controller.
pub mod process;

/// Data structures shared across the pipeline.
///
/// - **Colors** ([`structs::color`]): RGBW pixel values
/// - **Packets** ([`structs::packet`]): TPM2 markers and packet kinds
/// - **Segments** ([`structs::segment`]): LED ranges and matrix layouts
/// - **Sessions** ([`structs::session`]): requests and repeat modes
pub mod structs;

/// LED strip boundary, realtime lock and pixel rendering.
pub mod output;

/// Supporting infrastructure.
///
/// - **Byte Sources** ([`utils::byte_source`]): non-blocking stream access
/// - **Storage** ([`utils::storage`]): ranked storage backends
/// - **Frame Ring** ([`utils::frame_buffer`]): load/play window ring
/// - **Timing** ([`utils::timing`]): clocks and frame pacing
/// - **Error Handling** ([`utils::errors`]): error types
pub mod utils;
