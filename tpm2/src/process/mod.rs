/// Packet tokenization of TPM2 byte streams.
///
/// Provides the [`PacketScanner`](scan::PacketScanner), which resynchronizes on
/// start markers and yields one [`Packet`](crate::structs::packet::Packet) per call.
pub mod scan;

/// Data frame payload decoding.
///
/// Provides the [`FrameDecoder`](decode::FrameDecoder), which writes clamped
/// RGB payloads into RGBW frame windows.
pub mod decode;

/// Tick-driven playback.
///
/// Provides the [`PlaybackController`](playback::PlaybackController), which
/// loads frames ahead into a ring, renders them at a fixed pace and handles
/// end of stream, repeats and realtime overrides.
pub mod playback;

/// A short recording: one command packet followed by two 4-pixel frames.
pub const EXAMPLE_DATA: &[u8] = &[
    0xC9, 0xC0, 0x00, 0x01, 0x0A, 0x36, // command
    0xC9, 0xDA, 0x00, 0x0C, // frame 1
    0xFF, 0x00, 0x00, 0x00, 0xFF, 0x00, 0x00, 0x00, 0xFF, 0x10, 0x10, 0x10, //
    0x36, //
    0xC9, 0xDA, 0x00, 0x0C, // frame 2
    0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00, 0xFF, 0x00, 0x00, 0x20, 0x20, 0x20, //
    0x36,
];
