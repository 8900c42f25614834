use std::fmt::{Display, Formatter};

/// Bytes reserved per pixel in a frame window (R, G, B and a white slot).
pub const CHANNELS_PER_SLOT: usize = 4;

/// Bytes per pixel on the wire. RGBW recordings are not supported.
pub const CHANNELS_PER_PIXEL: usize = 3;

/// One pixel color. The white channel is reserved and always 0 when decoded
/// from a recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgbw {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub w: u8,
}

impl Rgbw {
    pub const OFF: Rgbw = Rgbw::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, w: u8) -> Self {
        Self { r, g, b, w }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 0)
    }

    /// Reads a 4-byte window slot. Shorter slices yield zeros for the
    /// missing channels.
    pub fn from_slot(slot: &[u8]) -> Self {
        let channel = |i: usize| slot.get(i).copied().unwrap_or(0);
        Self::new(channel(0), channel(1), channel(2), channel(3))
    }

    pub fn write_slot(&self, slot: &mut [u8]) {
        slot[..CHANNELS_PER_SLOT].copy_from_slice(&[self.r, self.g, self.b, self.w]);
    }

    pub fn is_off(&self) -> bool {
        *self == Self::OFF
    }
}

impl Display for Rgbw {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{},{})", self.r, self.g, self.b, self.w)
    }
}
