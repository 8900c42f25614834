use log::trace;

use crate::structs::color::{CHANNELS_PER_SLOT, Rgbw};
use crate::utils::errors::FrameBufferError;

/// A ring of fixed-size frame windows separating loading from playback.
///
/// One contiguous allocation holds `window_count` windows of
/// `window_pixels * 4` bytes each. The loader writes into the window under
/// the load cursor, the renderer reads the window under the play cursor.
/// A window is owned by exactly one side at a time: loads are refused while
/// every window is filled, plays are refused while none is.
#[derive(Debug)]
pub struct FrameBuffer {
    data: Vec<u8>,
    window_count: usize,
    window_pixels: usize,
    load_pos: usize,
    play_pos: usize,
    free: usize,
    loaded: Vec<usize>,
}

impl FrameBuffer {
    /// Creates a ring of `window_count` windows holding up to
    /// `window_pixels` pixels each.
    pub fn new(window_count: usize, window_pixels: usize) -> Result<Self, FrameBufferError> {
        if window_count < 2 {
            return Err(FrameBufferError::TooFewWindows(window_count));
        }

        Ok(Self {
            data: vec![0; window_count * window_pixels * CHANNELS_PER_SLOT],
            window_count,
            window_pixels,
            load_pos: 0,
            play_pos: 0,
            free: window_count,
            loaded: vec![0; window_count],
        })
    }

    pub fn window_count(&self) -> usize {
        self.window_count
    }

    pub fn window_pixels(&self) -> usize {
        self.window_pixels
    }

    /// Windows that are neither filled nor waiting to be played.
    pub fn windows_free_for_load(&self) -> usize {
        self.free
    }

    /// Windows holding a loaded frame that has not been played yet.
    pub fn windows_filled(&self) -> usize {
        self.window_count - self.free
    }

    pub fn load_cursor(&self) -> usize {
        self.load_pos
    }

    pub fn play_cursor(&self) -> usize {
        self.play_pos
    }

    /// Mutable bytes of the window under the load cursor, if one is free.
    pub fn load_window(&mut self) -> Option<&mut [u8]> {
        if self.free == 0 {
            return None;
        }
        let range = self.window_range(self.load_pos);
        Some(&mut self.data[range])
    }

    /// Marks the load window as filled with `pixels` pixels and moves on.
    pub fn on_load_complete(&mut self, pixels: usize) -> Result<(), FrameBufferError> {
        if self.free == 0 {
            return Err(FrameBufferError::Full(self.window_count));
        }
        if pixels > self.window_pixels {
            return Err(FrameBufferError::WindowOverflow {
                capacity: self.window_pixels,
                actual: pixels,
            });
        }

        self.loaded[self.load_pos] = pixels;
        self.free -= 1;
        self.load_pos = (self.load_pos + 1) % self.window_count;
        trace!("next load window {} ({} free)", self.load_pos, self.free);

        Ok(())
    }

    /// The oldest filled window, if any.
    pub fn play_window(&self) -> Option<Window<'_>> {
        if self.windows_filled() == 0 {
            return None;
        }
        let range = self.window_range(self.play_pos);
        let len = self.loaded[self.play_pos] * CHANNELS_PER_SLOT;

        Some(Window {
            index: self.play_pos,
            bytes: &self.data[range][..len],
        })
    }

    /// Releases the play window back to the free pool and moves on.
    pub fn on_play_complete(&mut self) -> Result<(), FrameBufferError> {
        if self.windows_filled() == 0 {
            return Err(FrameBufferError::Empty);
        }

        self.loaded[self.play_pos] = 0;
        self.free += 1;
        self.play_pos = (self.play_pos + 1) % self.window_count;
        trace!("next play window {} ({} free)", self.play_pos, self.free);

        Ok(())
    }

    /// Empties the ring: all windows free, both cursors at window 0.
    pub fn reset(&mut self) {
        self.data.fill(0);
        self.loaded.fill(0);
        self.free = self.window_count;
        self.load_pos = 0;
        self.play_pos = 0;
    }

    fn window_range(&self, index: usize) -> std::ops::Range<usize> {
        let size = self.window_pixels * CHANNELS_PER_SLOT;
        index * size..(index + 1) * size
    }
}

/// A filled window handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    pub index: usize,
    bytes: &'a [u8],
}

impl<'a> Window<'a> {
    pub fn pixel_count(&self) -> usize {
        self.bytes.len() / CHANNELS_PER_SLOT
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn pixels(&self) -> impl Iterator<Item = Rgbw> + 'a {
        self.bytes.chunks_exact(CHANNELS_PER_SLOT).map(Rgbw::from_slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(ring: &mut FrameBuffer, value: u8, pixels: usize) {
        let window = ring.load_window().unwrap();
        window[..pixels * CHANNELS_PER_SLOT].fill(value);
        ring.on_load_complete(pixels).unwrap();
    }

    #[test]
    fn rejects_single_window() {
        assert_eq!(
            FrameBuffer::new(1, 4).unwrap_err(),
            FrameBufferError::TooFewWindows(1)
        );
    }

    #[test]
    fn double_buffer_round_trip() {
        let mut ring = FrameBuffer::new(2, 3).unwrap();
        assert_eq!(ring.windows_free_for_load(), 2);
        assert!(ring.play_window().is_none());

        fill(&mut ring, 1, 2);
        fill(&mut ring, 2, 3);
        assert_eq!(ring.windows_free_for_load(), 0);
        assert!(ring.load_window().is_none());
        assert_eq!(ring.on_load_complete(1), Err(FrameBufferError::Full(2)));

        let window = ring.play_window().unwrap();
        assert_eq!(window.index, 0);
        assert_eq!(window.pixel_count(), 2);
        assert!(window.pixels().all(|p| p == Rgbw::new(1, 1, 1, 1)));
        ring.on_play_complete().unwrap();

        assert_eq!(ring.windows_free_for_load(), 1);
        assert_eq!(ring.load_cursor(), 0);
        assert_eq!(ring.play_cursor(), 1);
        assert_eq!(ring.play_window().unwrap().pixel_count(), 3);

        ring.on_play_complete().unwrap();
        assert_eq!(ring.on_play_complete(), Err(FrameBufferError::Empty));
    }

    #[test]
    fn overflowing_window_is_refused() {
        let mut ring = FrameBuffer::new(2, 3).unwrap();
        assert_eq!(
            ring.on_load_complete(4),
            Err(FrameBufferError::WindowOverflow {
                capacity: 3,
                actual: 4
            })
        );
        assert_eq!(ring.windows_free_for_load(), 2);
    }

    #[test]
    fn reset_drops_stale_frames() {
        let mut ring = FrameBuffer::new(3, 2).unwrap();
        fill(&mut ring, 9, 2);
        fill(&mut ring, 9, 2);
        ring.on_play_complete().unwrap();

        ring.reset();
        assert_eq!(ring.windows_free_for_load(), 3);
        assert_eq!((ring.load_cursor(), ring.play_cursor()), (0, 0));
        assert!(ring.play_window().is_none());
        assert!(ring.load_window().unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn cursors_never_collide_while_window_is_exposed() {
        let mut ring = FrameBuffer::new(3, 1).unwrap();

        // deterministic load/play interleaving
        let pattern = [true, true, false, true, true, false, false, true, false, false, true];
        for _ in 0..20 {
            for &load in &pattern {
                if load {
                    if ring.windows_free_for_load() > 0 {
                        fill(&mut ring, 1, 1);
                    }
                } else if ring.play_window().is_some() {
                    ring.on_play_complete().unwrap();
                }

                assert!(ring.windows_free_for_load() <= ring.window_count());
                if let Some(window) = ring.play_window() {
                    if ring.windows_free_for_load() > 0 {
                        assert_ne!(window.index, ring.load_cursor());
                    }
                }
            }
        }
    }
}
