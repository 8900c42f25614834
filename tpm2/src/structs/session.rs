//! Playback requests and the sessions they create.

use std::fmt::{Display, Formatter};

use crate::structs::segment::{LedRange, SegmentLayout, led_index, pixel_capacity};

/// How often a recording plays once it reaches its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatMode {
    Forever,
    /// Replay this many more times after the current pass.
    Times(u32),
    #[default]
    Once,
}

impl RepeatMode {
    /// Interprets a repeat count where a negative value means looping
    /// forever and 0 means a single pass.
    pub fn from_count(count: i64) -> Self {
        match count {
            n if n < 0 => RepeatMode::Forever,
            0 => RepeatMode::Once,
            n => RepeatMode::Times(u32::try_from(n).unwrap_or(u32::MAX)),
        }
    }
}

impl Display for RepeatMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RepeatMode::Forever => write!(f, "loop"),
            RepeatMode::Times(n) => write!(f, "{n} more"),
            RepeatMode::Once => write!(f, "once"),
        }
    }
}

/// Converts a frame rate into the delay between frames, rounded to whole
/// milliseconds. Non-positive or non-finite rates yield `None`.
pub fn frame_delay_from_fps(fps: f64) -> Option<u32> {
    if !fps.is_finite() || fps <= 0.0 {
        return None;
    }
    Some((1000.0 / fps).round().max(0.0) as u32)
}

/// A request to start playing a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    pub path: String,
    /// Segment id to play on; `None` targets the whole strip.
    pub segment: Option<usize>,
    pub repeat: RepeatMode,
    /// Overrides the configured default frame delay.
    pub frame_delay_ms: Option<u32>,
}

impl PlaybackRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            segment: None,
            repeat: RepeatMode::Once,
            frame_delay_ms: None,
        }
    }

    pub fn with_segment(mut self, id: usize) -> Self {
        self.segment = Some(id);
        self
    }

    pub fn with_repeat(mut self, repeat: RepeatMode) -> Self {
        self.repeat = repeat;
        self
    }

    pub fn with_frame_delay(mut self, ms: u32) -> Self {
        self.frame_delay_ms = Some(ms);
        self
    }

    pub fn with_fps(mut self, fps: f64) -> Self {
        self.frame_delay_ms = frame_delay_from_fps(fps);
        self
    }
}

/// The state of an accepted playback request.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub path: String,
    pub range: LedRange,
    pub layout: SegmentLayout,
    /// Repeats still outstanding; decremented on each rewind.
    pub repeat: RepeatMode,
    pub frame_delay_ms: u32,
}

impl PlaybackSession {
    pub fn capacity(&self) -> usize {
        pixel_capacity(self.range, self.layout)
    }

    pub fn led_index(&self, pixel: usize) -> Option<usize> {
        led_index(self.range, self.layout, pixel)
    }

    /// Every LED this session may light, in pixel order.
    pub fn leds(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.capacity()).filter_map(|i| self.led_index(i))
    }
}
