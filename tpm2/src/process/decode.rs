use log::debug;

use crate::structs::color::{CHANNELS_PER_PIXEL, CHANNELS_PER_SLOT, Rgbw};
use crate::utils::byte_source::ByteSource;
use crate::utils::errors::ScanError;

/// Converts a data frame payload into RGBW window slots.
///
/// The number of pixels decoded is the smaller of what the payload declares
/// and what the target can address. Pixels beyond that are left in the
/// stream for the scanner to discard. A trailing partial pixel is ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Decodes at most `addressable` pixels from a payload of `declared_len`
    /// bytes into `window`, which holds 4 bytes per pixel.
    ///
    /// Returns the number of pixels written, or [`ScanError::Truncated`] if
    /// the stream ends before the last of them is complete.
    pub fn decode<S: ByteSource + ?Sized>(
        &self,
        source: &mut S,
        declared_len: u16,
        addressable: usize,
        window: &mut [u8],
    ) -> Result<usize, ScanError> {
        let addressable = addressable.min(window.len() / CHANNELS_PER_SLOT);
        let declared = usize::from(declared_len) / CHANNELS_PER_PIXEL;
        let count = declared.min(addressable);

        if declared > addressable {
            debug!(
                "{}",
                ScanError::OverrunDeclaredLength {
                    declared: declared_len,
                    addressable,
                }
            );
        }

        for slot in window.chunks_exact_mut(CHANNELS_PER_SLOT).take(count) {
            let (Some(r), Some(g), Some(b)) =
                (source.read_byte(), source.read_byte(), source.read_byte())
            else {
                return Err(ScanError::Truncated(source.position()));
            };
            Rgbw::rgb(r, g, b).write_slot(slot);
        }

        Ok(count)
    }
}
