//! Pixel output.
//!
//! [`Strip`] is the boundary to the LED driver. [`sink::PixelSink`] renders
//! frame windows through it and manages the realtime lock, and
//! [`strip::LedStrip`] is an in-memory strip for hosts without hardware.

use crate::structs::color::Rgbw;
use crate::structs::segment::Segment;

use realtime::RealtimeState;

pub mod realtime;
pub mod sink;
pub mod strip;

/// An addressable LED strip.
pub trait Strip {
    fn length(&self) -> usize;

    /// Stages a color; nothing is visible until [`Strip::show`].
    /// Out of range indices are ignored.
    fn set_pixel_color(&mut self, index: usize, color: Rgbw);

    fn show(&mut self);

    fn segment(&self, id: usize) -> Option<Segment>;

    fn realtime_mut(&mut self) -> &mut RealtimeState;
}
