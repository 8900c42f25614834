use std::fmt::{Display, Formatter};

/// Half-open LED index range `[start, stop)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedRange {
    pub start: usize,
    pub stop: usize,
}

impl LedRange {
    pub const fn new(start: usize, stop: usize) -> Self {
        Self { start, stop }
    }

    pub fn len(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.start..self.stop).contains(&index)
    }
}

impl Display for LedRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}

/// How frame pixels map onto strip LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentLayout {
    /// Pixel `i` goes to LED `start + i`.
    #[default]
    Linear,
    /// Rectangle inside a row-major matrix of `matrix_width` columns.
    /// Pixel `i` goes to column `x + i % width`, row `y + i / width`.
    Matrix {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        matrix_width: usize,
    },
}

/// A named, addressable sub-range of the strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub id: usize,
    pub range: LedRange,
    pub layout: SegmentLayout,
}

impl Segment {
    pub fn linear(id: usize, start: usize, stop: usize) -> Self {
        Self {
            id,
            range: LedRange::new(start, stop),
            layout: SegmentLayout::Linear,
        }
    }

    /// A rectangle of `width` x `height` LEDs at column `x`, row `y` of a
    /// matrix `matrix_width` columns wide.
    ///
    /// Returns `None` if the rectangle does not fit in one matrix row, since
    /// its pixels would wrap onto the next row.
    pub fn matrix(
        id: usize,
        (x, y): (usize, usize),
        (width, height): (usize, usize),
        matrix_width: usize,
    ) -> Option<Self> {
        if x.checked_add(width)? > matrix_width {
            return None;
        }

        let start = y * matrix_width + x;
        let stop = if width == 0 || height == 0 {
            start
        } else {
            (y + height - 1) * matrix_width + x + width
        };

        Some(Self {
            id,
            range: LedRange::new(start, stop),
            layout: SegmentLayout::Matrix {
                x,
                y,
                width,
                height,
                matrix_width,
            },
        })
    }

    pub fn is_2d(&self) -> bool {
        matches!(self.layout, SegmentLayout::Matrix { .. })
    }
}

/// Number of pixels a frame can address through `layout` over `range`.
pub fn pixel_capacity(range: LedRange, layout: SegmentLayout) -> usize {
    match layout {
        SegmentLayout::Linear => range.len(),
        SegmentLayout::Matrix { width, height, .. } => width * height,
    }
}

/// Strip LED index for frame pixel `i`, or `None` past the addressable area.
pub fn led_index(range: LedRange, layout: SegmentLayout, i: usize) -> Option<usize> {
    if i >= pixel_capacity(range, layout) {
        return None;
    }

    match layout {
        SegmentLayout::Linear => Some(range.start + i),
        SegmentLayout::Matrix {
            x,
            y,
            width,
            matrix_width,
            ..
        } => Some((y + i / width) * matrix_width + x + i % width),
    }
}
