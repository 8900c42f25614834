//! TPM2 packet framing.
//!
//! ```text
//! 0xC9 | kind | [len_hi len_lo | payload ...] | 0x36
//! ```
//!
//! Only data frames carry a length and pixel payload. Command and response
//! packets are recognized and skipped.

use std::fmt::{Display, Formatter};

pub const TPM2_START: u8 = 0xC9;
pub const TPM2_END: u8 = 0x36;
pub const TPM2_DATA_FRAME: u8 = 0xDA;
pub const TPM2_COMMAND: u8 = 0xC0;
pub const TPM2_RESPONSE: u8 = 0xAA;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    DataFrame,
    Command,
    Response,
    Unknown(u8),
}

impl From<u8> for PacketKind {
    fn from(value: u8) -> Self {
        match value {
            TPM2_DATA_FRAME => PacketKind::DataFrame,
            TPM2_COMMAND => PacketKind::Command,
            TPM2_RESPONSE => PacketKind::Response,
            other => PacketKind::Unknown(other),
        }
    }
}

impl Display for PacketKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketKind::DataFrame => write!(f, "data frame"),
            PacketKind::Command => write!(f, "command"),
            PacketKind::Response => write!(f, "response"),
            PacketKind::Unknown(kind) => write!(f, "unknown ({kind:#04X})"),
        }
    }
}

/// A packet the scanner has fully consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    /// Stream offset of the start marker.
    pub offset: u64,
    /// Payload length from the header, data frames only.
    pub declared_len: u16,
    /// Pixels handed to the payload handler, data frames only.
    pub pixels: usize,
    /// Whether the end marker was found before the stream ran dry.
    pub terminated: bool,
}

impl Packet {
    pub fn is_frame(&self) -> bool {
        self.kind == PacketKind::DataFrame
    }
}

/// Container formats a recording may use, detected from the file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingFormat {
    Tpm2,
}

impl RecordingFormat {
    pub fn from_path(path: &str) -> Option<Self> {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with("tpm2") {
            return Some(RecordingFormat::Tpm2);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_byte() {
        assert_eq!(PacketKind::from(0xDA), PacketKind::DataFrame);
        assert_eq!(PacketKind::from(0xC0), PacketKind::Command);
        assert_eq!(PacketKind::from(0xAA), PacketKind::Response);
        assert_eq!(PacketKind::from(0x12), PacketKind::Unknown(0x12));
        assert_eq!(PacketKind::Unknown(0x12).to_string(), "unknown (0x12)");
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(
            RecordingFormat::from_path("/anim/fire.tpm2"),
            Some(RecordingFormat::Tpm2)
        );
        assert_eq!(
            RecordingFormat::from_path("/anim/FIRE.TPM2"),
            Some(RecordingFormat::Tpm2)
        );
        assert_eq!(RecordingFormat::from_path("/anim/fire.fseq"), None);
    }
}
