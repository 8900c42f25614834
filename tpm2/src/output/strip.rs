use crate::output::Strip;
use crate::output::realtime::RealtimeState;
use crate::structs::color::Rgbw;
use crate::structs::segment::Segment;

/// LED strip kept in memory.
///
/// Stands in for the hardware driver: pixels are latched on [`Strip::show`]
/// into a displayed frame, and every flush is counted.
#[derive(Debug, Clone)]
pub struct LedStrip {
    pending: Vec<Rgbw>,
    shown: Vec<Rgbw>,
    show_count: u64,
    segments: Vec<Segment>,
    realtime: RealtimeState,
}

impl LedStrip {
    pub fn new(length: usize) -> Self {
        Self {
            pending: vec![Rgbw::OFF; length],
            shown: vec![Rgbw::OFF; length],
            show_count: 0,
            segments: Vec::new(),
            realtime: RealtimeState::default(),
        }
    }

    pub fn with_segments(mut self, segments: impl IntoIterator<Item = Segment>) -> Self {
        self.segments.extend(segments);
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Color of LED `index` as of the last flush.
    pub fn pixel(&self, index: usize) -> Option<Rgbw> {
        self.shown.get(index).copied()
    }

    /// Colors of all LEDs as of the last flush.
    pub fn pixels(&self) -> &[Rgbw] {
        &self.shown
    }

    pub fn show_count(&self) -> u64 {
        self.show_count
    }

    pub fn realtime(&self) -> &RealtimeState {
        &self.realtime
    }
}

impl Strip for LedStrip {
    fn length(&self) -> usize {
        self.pending.len()
    }

    fn set_pixel_color(&mut self, index: usize, color: Rgbw) {
        if let Some(pixel) = self.pending.get_mut(index) {
            *pixel = color;
        }
    }

    fn show(&mut self) {
        self.shown.copy_from_slice(&self.pending);
        self.show_count += 1;
    }

    fn segment(&self, id: usize) -> Option<Segment> {
        self.segments.iter().find(|s| s.id == id).copied()
    }

    fn realtime_mut(&mut self) -> &mut RealtimeState {
        &mut self.realtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixels_latch_on_show() {
        let mut strip = LedStrip::new(3);
        strip.set_pixel_color(1, Rgbw::rgb(1, 2, 3));
        strip.set_pixel_color(7, Rgbw::rgb(9, 9, 9));
        assert_eq!(strip.pixel(1), Some(Rgbw::OFF));

        strip.show();
        assert_eq!(strip.pixel(1), Some(Rgbw::rgb(1, 2, 3)));
        assert_eq!(strip.pixel(7), None);
        assert_eq!(strip.show_count(), 1);
    }
}
