use log::{Level, debug};

use crate::log_or_err;
use crate::structs::packet::{Packet, PacketKind, TPM2_END, TPM2_START};
use crate::utils::byte_source::ByteSource;
use crate::utils::errors::ScanError;

/// Tokenizes a TPM2 byte stream into packets.
///
/// Every call to [`PacketScanner::next_packet`] starts by resynchronizing on
/// the next start marker, so garbage between packets, a recording that does
/// not begin on a packet boundary, or a packet with a missing end marker
/// cost at most the packet they damage.
///
/// # Example
///
/// ```rust
/// use tpm2::process::EXAMPLE_DATA;
/// use tpm2::process::decode::FrameDecoder;
/// use tpm2::process::scan::PacketScanner;
/// use tpm2::utils::byte_source::SliceSource;
///
/// let mut source = SliceSource::new(EXAMPLE_DATA);
/// let mut scanner = PacketScanner::default();
/// let decoder = FrameDecoder::default();
/// let mut window = [0u8; 4 * 4];
///
/// // the recording opens with a command packet
/// let packet = scanner
///     .next_packet(&mut source, |src, len| decoder.decode(src, len, 4, &mut window))
///     .unwrap();
/// assert!(!packet.is_frame());
///
/// let packet = scanner
///     .next_packet(&mut source, |src, len| decoder.decode(src, len, 4, &mut window))
///     .unwrap();
/// assert!(packet.is_frame());
/// assert_eq!(packet.pixels, 4);
/// ```
///
/// # Invariant
///
/// Each call either consumes at least one byte or reports
/// [`ScanError::Exhausted`] on an empty stream, so repeated scanning of any
/// input terminates.
#[derive(Debug)]
pub struct PacketScanner {
    fail_level: Level,
    stats: ScanStats,
}

impl Default for PacketScanner {
    fn default() -> Self {
        Self {
            fail_level: Level::Error,
            stats: ScanStats::default(),
        }
    }
}

/// Running counters over everything a scanner has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub frames: u64,
    pub commands: u64,
    pub responses: u64,
    pub unknown: u64,
    pub truncated: u64,
    pub unterminated: u64,
    /// Bytes dropped while searching for a start marker.
    pub resync_bytes: u64,
}

impl PacketScanner {
    /// Sets the failure level for malformed packets.
    ///
    /// - `log::Level::Error`: unknown packet kinds are logged and skipped (default)
    /// - `log::Level::Warn`: unknown packet kinds are returned as errors
    pub fn set_fail_level(&mut self, level: Level) {
        self.fail_level = level;
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ScanStats::default();
    }

    /// Reads the next complete packet.
    ///
    /// For data frames, `on_payload` is called with the source positioned at
    /// the first payload byte and the declared payload length. It returns the
    /// number of pixels it decoded and may stop short of the declared length.
    /// Whatever it leaves is discarded up to the next end marker, so a header
    /// that overstates its length cannot swallow the packets behind it.
    pub fn next_packet<S, F>(&mut self, source: &mut S, on_payload: F) -> Result<Packet, ScanError>
    where
        S: ByteSource + ?Sized,
        F: FnOnce(&mut S, u16) -> Result<usize, ScanError>,
    {
        let offset = self.resync(source)?;

        let Some(kind_byte) = source.read_byte() else {
            return self.truncated(source);
        };
        let kind = PacketKind::from(kind_byte);

        let mut packet = Packet {
            kind,
            offset,
            declared_len: 0,
            pixels: 0,
            terminated: false,
        };

        match kind {
            PacketKind::DataFrame => {
                let Some(declared_len) = Self::read_length(source) else {
                    return self.truncated(source);
                };

                let pixels = match on_payload(source, declared_len) {
                    Ok(pixels) => pixels,
                    Err(ScanError::Truncated(pos)) => {
                        self.stats.truncated += 1;
                        return Err(ScanError::Truncated(pos));
                    }
                    Err(e) => return Err(e),
                };

                packet.declared_len = declared_len;
                packet.pixels = pixels;
                packet.terminated = source.skip_until(TPM2_END);
                self.stats.frames += 1;
            }
            PacketKind::Command | PacketKind::Response => {
                debug!("Skipping {kind} packet at byte {offset}");
                packet.terminated = source.skip_until(TPM2_END);
                if kind == PacketKind::Command {
                    self.stats.commands += 1;
                } else {
                    self.stats.responses += 1;
                }
            }
            PacketKind::Unknown(byte) => {
                packet.terminated = source.skip_until(TPM2_END);
                self.stats.unknown += 1;
                log_or_err!(self, Level::Warn, ScanError::MalformedKind(byte));
            }
        }

        if !packet.terminated {
            self.stats.unterminated += 1;
            debug!("{kind} packet at byte {offset} has no end marker");
        }

        Ok(packet)
    }

    /// Consumes bytes up to and including the next start marker and returns
    /// its offset.
    fn resync<S: ByteSource + ?Sized>(&mut self, source: &mut S) -> Result<u64, ScanError> {
        let mut dropped = 0u64;

        let result = loop {
            let offset = source.position();
            match source.read_byte() {
                Some(TPM2_START) => break Ok(offset),
                Some(_) => dropped += 1,
                None => break Err(ScanError::Exhausted),
            }
        };

        if dropped > 0 {
            self.stats.resync_bytes += dropped;
            debug!("Resync dropped {dropped} bytes");
        }

        result
    }

    fn read_length<S: ByteSource + ?Sized>(source: &mut S) -> Option<u16> {
        let high = source.read_byte()?;
        let low = source.read_byte()?;
        Some(u16::from_be_bytes([high, low]))
    }

    fn truncated<S: ByteSource + ?Sized>(&mut self, source: &S) -> Result<Packet, ScanError> {
        self.stats.truncated += 1;
        Err(ScanError::Truncated(source.position()))
    }
}
