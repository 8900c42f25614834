//! Time sources and frame pacing.

use std::cell::Cell;
use std::time::Instant;

/// Millisecond time source the tick loop reads once per tick.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Wall clock measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock advanced by hand, for deterministic tick sequences.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Cell::new(start_ms),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Gate enforcing a minimum delay between rendered frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct FramePacer {
    delay_ms: u32,
    last_frame: Option<u64>,
}

impl FramePacer {
    pub fn new(delay_ms: u32) -> Self {
        Self {
            delay_ms,
            last_frame: None,
        }
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    /// The first frame of a session is always due.
    pub fn is_due(&self, now_ms: u64) -> bool {
        match self.last_frame {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= u64::from(self.delay_ms),
        }
    }

    pub fn mark(&mut self, now_ms: u64) {
        self.last_frame = Some(now_ms);
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.last_frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pacer_gates_until_delay_elapsed() {
        let clock = ManualClock::new(1_000);
        let mut pacer = FramePacer::new(40);
        assert!(pacer.is_due(clock.now_ms()));

        pacer.mark(clock.now_ms());
        clock.advance(39);
        assert!(!pacer.is_due(clock.now_ms()));
        clock.advance(1);
        assert!(pacer.is_due(clock.now_ms()));
    }

    #[test]
    fn zero_delay_is_always_due() {
        let mut pacer = FramePacer::new(0);
        pacer.mark(5);
        assert!(pacer.is_due(5));
    }
}
