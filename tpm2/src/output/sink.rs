use log::trace;

use crate::output::Strip;
use crate::structs::color::Rgbw;
use crate::structs::session::PlaybackSession;
use crate::utils::frame_buffer::Window;

/// Writes decoded frames onto a strip on behalf of one realtime owner.
#[derive(Debug, Clone)]
pub struct PixelSink {
    owner: String,
    timeout_ms: u32,
}

impl PixelSink {
    pub fn new(owner: impl Into<String>, timeout_ms: u32) -> Self {
        Self {
            owner: owner.into(),
            timeout_ms,
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Draws `window` into the session's LEDs, flushes once and refreshes
    /// the realtime lock. Returns the number of LEDs written.
    pub fn render(
        &self,
        strip: &mut dyn Strip,
        window: Window<'_>,
        session: &PlaybackSession,
        now_ms: u64,
    ) -> usize {
        let mut written = 0;
        for (i, color) in window.pixels().enumerate() {
            let Some(led) = session.led_index(i) else {
                break;
            };
            strip.set_pixel_color(led, color);
            written += 1;
        }

        strip.show();
        self.lock(strip, now_ms);
        trace!("rendered window {} ({written} LEDs)", window.index);

        written
    }

    /// Turns off every LED the session may have lit.
    pub fn clear(&self, strip: &mut dyn Strip, session: &PlaybackSession) {
        for led in session.leds() {
            strip.set_pixel_color(led, Rgbw::OFF);
        }
        strip.show();
    }

    pub fn lock(&self, strip: &mut dyn Strip, now_ms: u64) {
        strip
            .realtime_mut()
            .lock(&self.owner, self.timeout_ms, now_ms);
    }

    pub fn release(&self, strip: &mut dyn Strip) {
        strip.realtime_mut().release(&self.owner);
    }
}
