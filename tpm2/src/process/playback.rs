use std::fmt::{Display, Formatter};
use std::str::FromStr;

use anyhow::{Result, bail};
use log::{Level, debug, error, info, trace, warn};

use crate::output::Strip;
use crate::output::realtime::RealtimeOverride;
use crate::output::sink::PixelSink;
use crate::process::decode::FrameDecoder;
use crate::process::scan::{PacketScanner, ScanStats};
use crate::structs::packet::RecordingFormat;
use crate::structs::segment::{LedRange, SegmentLayout};
use crate::structs::session::{PlaybackRequest, PlaybackSession, RepeatMode};
use crate::utils::byte_source::ByteSource;
use crate::utils::errors::{PlaybackError, ScanError};
use crate::utils::frame_buffer::FrameBuffer;
use crate::utils::storage::StorageChain;
use crate::utils::timing::FramePacer;

/// Which LEDs bound the pixel count of a frame on a linear session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClampTarget {
    /// Frames stop at the end of the target segment.
    #[default]
    Segment,
    /// Frames may run on past the segment up to the end of the strip.
    Strip,
}

impl FromStr for ClampTarget {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "segment" => Ok(ClampTarget::Segment),
            "strip" => Ok(ClampTarget::Strip),
            other => bail!("unknown clamp target {other:?}, expected segment or strip"),
        }
    }
}

impl Display for ClampTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ClampTarget::Segment => write!(f, "segment"),
            ClampTarget::Strip => write!(f, "strip"),
        }
    }
}

/// Tunables of a [`PlaybackController`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Number of frame windows in the ring, at least 2.
    pub window_count: usize,
    /// Delay between frames when a request does not set one.
    pub default_frame_delay_ms: u32,
    /// Lifetime of the realtime lock after each rendered frame.
    pub realtime_timeout_ms: u32,
    pub clamp: ClampTarget,
    /// Tag the realtime lock is held under.
    pub owner: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            window_count: 2,
            default_frame_delay_ms: 40,
            realtime_timeout_ms: 2500,
            clamp: ClampTarget::Segment,
            owner: "tpm2-playback".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    /// A session is open and no loaded frame is waiting.
    Loading,
    /// At least one loaded frame is waiting to be rendered.
    Playing,
    /// Tearing a session down; never observable between ticks.
    Draining,
}

impl Display for PlaybackState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Draining => write!(f, "draining"),
        }
    }
}

/// Why the last session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The recording played out.
    Finished,
    /// A new `start_playback` replaced it.
    Superseded,
    /// A realtime override took the pixels back.
    Overridden,
    /// [`PlaybackController::stop`] was called.
    Stopped,
    /// The stream could not be read further.
    Failed,
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Finished => write!(f, "finished"),
            StopReason::Superseded => write!(f, "superseded"),
            StopReason::Overridden => write!(f, "overridden"),
            StopReason::Stopped => write!(f, "stopped"),
            StopReason::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub frames_loaded: u64,
    pub frames_rendered: u64,
    pub rewinds: u64,
    pub scan: ScanStats,
}

/// What a single [`PlaybackController::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tick {
    pub loaded: bool,
    pub rendered: bool,
}

/// Plays TPM2 recordings onto a strip, one cooperative step per tick.
///
/// The controller owns the open recording, the frame ring and the session
/// parameters. The strip and the current time are passed into every call,
/// so the host decides when ticks happen and several controllers can share
/// one strip on disjoint ranges.
///
/// ```rust
/// use tpm2::output::strip::LedStrip;
/// use tpm2::process::EXAMPLE_DATA;
/// use tpm2::process::playback::{PlaybackController, PlayerConfig};
/// use tpm2::structs::session::PlaybackRequest;
/// use tpm2::utils::storage::{MemoryStorage, StorageChain};
///
/// let mut flash = MemoryStorage::new("flash");
/// flash.insert("/demo.tpm2", EXAMPLE_DATA);
/// let storage = StorageChain::new().with_backend(flash);
///
/// let mut strip = LedStrip::new(4);
/// let mut player = PlaybackController::new(PlayerConfig::default())?;
/// player.start_playback(&PlaybackRequest::new("/demo.tpm2"), &storage, &mut strip, 0)?;
///
/// let mut now = 0;
/// while player.is_active() {
///     player.tick(&mut strip, now);
///     now += 10;
/// }
/// assert_eq!(player.stats().frames_rendered, 2);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct PlaybackController {
    config: PlayerConfig,
    state: PlaybackState,
    ring: FrameBuffer,
    scanner: PacketScanner,
    decoder: FrameDecoder,
    sink: PixelSink,
    pacer: FramePacer,
    source: Option<Box<dyn ByteSource>>,
    session: Option<PlaybackSession>,
    stats: PlaybackStats,
    frames_this_pass: u64,
    last_stop: Option<StopReason>,
}

impl PlaybackController {
    pub fn new(config: PlayerConfig) -> Result<Self> {
        let ring = FrameBuffer::new(config.window_count, 0)?;
        let sink = PixelSink::new(config.owner.clone(), config.realtime_timeout_ms);

        Ok(Self {
            pacer: FramePacer::new(config.default_frame_delay_ms),
            config,
            state: PlaybackState::Idle,
            ring,
            scanner: PacketScanner::default(),
            decoder: FrameDecoder,
            sink,
            source: None,
            session: None,
            stats: PlaybackStats::default(),
            frames_this_pass: 0,
            last_stop: None,
        })
    }

    /// Sets the failure level for stream validation.
    ///
    /// - `log::Level::Error`: malformed packets are logged and skipped (default)
    /// - `log::Level::Warn`: a malformed packet ends the session (strict mode)
    pub fn set_fail_level(&mut self, level: Level) {
        self.scanner.set_fail_level(level);
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != PlaybackState::Idle
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub fn stats(&self) -> PlaybackStats {
        PlaybackStats {
            scan: *self.scanner.stats(),
            ..self.stats
        }
    }

    pub fn last_stop(&self) -> Option<StopReason> {
        self.last_stop
    }

    /// Starts playing `request` on `strip`.
    ///
    /// An active session is always stopped first, even if the new request is
    /// then rejected. On error the controller is left idle.
    pub fn start_playback(
        &mut self,
        request: &PlaybackRequest,
        storage: &StorageChain,
        strip: &mut dyn Strip,
        now_ms: u64,
    ) -> Result<()> {
        if self.is_active() {
            self.drain(strip, StopReason::Superseded);
        }

        if RecordingFormat::from_path(&request.path).is_none() {
            bail!(PlaybackError::UnsupportedFormat(request.path.clone()));
        }

        let (mut range, layout) = match request.segment {
            Some(id) => {
                let segment = strip.segment(id).ok_or(PlaybackError::UnknownSegment(id))?;
                (segment.range, segment.layout)
            }
            None => (LedRange::new(0, strip.length()), SegmentLayout::Linear),
        };

        let length = strip.length();
        if range.start > range.stop || range.stop > length {
            bail!(PlaybackError::RangeOutOfBounds {
                start: range.start,
                stop: range.stop,
                length,
            });
        }

        if self.config.clamp == ClampTarget::Strip && layout == SegmentLayout::Linear {
            range.stop = length;
        }

        let source = storage.open(&request.path)?;

        let session = PlaybackSession {
            path: request.path.clone(),
            range,
            layout,
            repeat: request.repeat,
            frame_delay_ms: request
                .frame_delay_ms
                .unwrap_or(self.config.default_frame_delay_ms),
        };

        let capacity = session.capacity();
        if capacity > self.ring.window_pixels() {
            self.ring = FrameBuffer::new(self.config.window_count, capacity)?;
        } else {
            self.ring.reset();
        }

        self.pacer = FramePacer::new(session.frame_delay_ms);
        self.scanner.reset_stats();
        self.stats = PlaybackStats::default();
        self.frames_this_pass = 0;

        let realtime = strip.realtime_mut();
        if realtime.override_mode() == RealtimeOverride::Once {
            realtime.set_override(RealtimeOverride::None);
        }
        self.sink.lock(strip, now_ms);

        info!(
            "Playing {} on LEDs {} ({} pixels, {} ms/frame, repeat {})",
            session.path, session.range, capacity, session.frame_delay_ms, session.repeat
        );

        self.source = Some(source);
        self.session = Some(session);
        self.set_state(PlaybackState::Loading);

        Ok(())
    }

    /// Ends the active session, clearing its LEDs.
    pub fn stop(&mut self, strip: &mut dyn Strip) {
        if self.is_active() {
            self.drain(strip, StopReason::Stopped);
        }
    }

    /// Advances playback by one step: loads at most one frame and renders
    /// at most one frame.
    pub fn tick(&mut self, strip: &mut dyn Strip, now_ms: u64) -> Tick {
        let mut tick = Tick::default();
        if !self.is_active() {
            return tick;
        }

        if self.ring.windows_free_for_load() > 0 {
            match self.load_frame() {
                Ok(loaded) => tick.loaded = loaded,
                Err(ScanError::Exhausted) => {}
                Err(e @ ScanError::MalformedKind(_)) => {
                    error!("{e}");
                    self.drain(strip, StopReason::Failed);
                    return tick;
                }
                Err(e) => warn!("{e}"),
            }
        }

        if self.check_override(strip) {
            return tick;
        }

        if self.pacer.is_due(now_ms) {
            tick.rendered = self.play_frame(strip, now_ms);
        }

        if !self.source_available() && self.end_of_stream(strip, now_ms) {
            return tick;
        }

        let next = if self.ring.windows_filled() > 0 {
            PlaybackState::Playing
        } else {
            PlaybackState::Loading
        };
        self.set_state(next);

        tick
    }

    /// Scans packets until one data frame lands in the load window.
    fn load_frame(&mut self) -> Result<bool, ScanError> {
        let Self {
            ring,
            scanner,
            decoder,
            source,
            session,
            stats,
            frames_this_pass,
            ..
        } = self;

        let (Some(source), Some(session)) = (source.as_mut(), session.as_ref()) else {
            return Ok(false);
        };
        let addressable = session.capacity();

        loop {
            let Some(window) = ring.load_window() else {
                return Ok(false);
            };

            let packet = scanner.next_packet(&mut **source, |src, len| {
                decoder.decode(src, len, addressable, window)
            })?;

            if !packet.is_frame() {
                continue;
            }

            if let Err(e) = ring.on_load_complete(packet.pixels) {
                warn!("{e}");
                return Ok(false);
            }

            stats.frames_loaded += 1;
            *frames_this_pass += 1;
            trace!(
                "loaded frame at byte {} ({} pixels)",
                packet.offset, packet.pixels
            );

            return Ok(true);
        }
    }

    fn play_frame(&mut self, strip: &mut dyn Strip, now_ms: u64) -> bool {
        let (Some(session), Some(window)) = (self.session.as_ref(), self.ring.play_window()) else {
            return false;
        };

        self.sink.render(strip, window, session, now_ms);

        if let Err(e) = self.ring.on_play_complete() {
            warn!("{e}");
            return false;
        }

        self.pacer.mark(now_ms);
        self.stats.frames_rendered += 1;
        true
    }

    /// Returns true if the session was stopped.
    fn check_override(&mut self, strip: &mut dyn Strip) -> bool {
        let realtime = strip.realtime_mut();
        match realtime.override_mode() {
            RealtimeOverride::None => false,
            RealtimeOverride::Always => {
                realtime.set_override(RealtimeOverride::Once);
                false
            }
            RealtimeOverride::Once => {
                realtime.set_override(RealtimeOverride::None);
                info!("Realtime override, stopping playback");
                self.drain(strip, StopReason::Overridden);
                true
            }
        }
    }

    fn source_available(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.is_available())
    }

    /// Applies the repeat policy once the stream has run dry. Returns true
    /// if the session was stopped.
    ///
    /// A finished session is only torn down after its last frame has been
    /// on display for a full frame delay.
    fn end_of_stream(&mut self, strip: &mut dyn Strip, now_ms: u64) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };

        let next = match session.repeat {
            RepeatMode::Once | RepeatMode::Times(0) => {
                if self.ring.windows_filled() == 0 && self.pacer.is_due(now_ms) {
                    info!("Finished {}", session.path);
                    self.drain(strip, StopReason::Finished);
                    return true;
                }
                return false;
            }
            RepeatMode::Forever => RepeatMode::Forever,
            RepeatMode::Times(n) if n > 1 => RepeatMode::Times(n - 1),
            RepeatMode::Times(_) => RepeatMode::Once,
        };

        if self.frames_this_pass == 0 {
            warn!("{} holds no frames, not repeating it", session.path);
            session.repeat = RepeatMode::Once;
            return false;
        }

        let Some(source) = self.source.as_mut() else {
            return false;
        };
        if let Err(e) = source.seek_to_start() {
            warn!("Cannot rewind {}: {e:#}", session.path);
            self.drain(strip, StopReason::Failed);
            return true;
        }

        debug!("Rewound {} (repeat {} -> {next})", session.path, session.repeat);
        session.repeat = next;
        self.stats.rewinds += 1;
        self.frames_this_pass = 0;

        false
    }

    /// Tears the session down: LEDs off, lock released, stream closed.
    fn drain(&mut self, strip: &mut dyn Strip, reason: StopReason) {
        self.set_state(PlaybackState::Draining);

        if let Some(session) = self.session.take() {
            self.sink.clear(strip, &session);
            info!(
                "Playback of {} {reason} after {} frames",
                session.path, self.stats.frames_rendered
            );
        }
        self.sink.release(strip);

        if let Some(mut source) = self.source.take() {
            source.close();
        }

        self.ring.reset();
        self.last_stop = Some(reason);
        self.set_state(PlaybackState::Idle);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!("{} -> {}", self.state, state);
            self.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::strip::LedStrip;
    use crate::structs::color::Rgbw;
    use crate::structs::segment::Segment;
    use crate::utils::errors::StorageError;
    use crate::utils::storage::MemoryStorage;
    use crate::utils::timing::{Clock, ManualClock};

    const OWNER: &str = "tpm2-playback";

    fn frame(rgb: &[u8]) -> Vec<u8> {
        let len = rgb.len() as u16;
        let mut packet = vec![0xC9, 0xDA];
        packet.extend_from_slice(&len.to_be_bytes());
        packet.extend_from_slice(rgb);
        packet.push(0x36);
        packet
    }

    fn storage_with(path: &str, data: Vec<u8>) -> StorageChain {
        let mut flash = MemoryStorage::new("flash");
        flash.insert(path, data);
        StorageChain::new().with_backend(flash)
    }

    fn player() -> PlaybackController {
        PlaybackController::new(PlayerConfig::default()).unwrap()
    }

    /// Ticks every `step` ms until idle; returns the number of ticks.
    fn run(
        player: &mut PlaybackController,
        strip: &mut LedStrip,
        clock: &ManualClock,
        step: u64,
        limit: usize,
    ) -> usize {
        let mut ticks = 0;
        while player.is_active() && ticks < limit {
            player.tick(strip, clock.now_ms());
            clock.advance(step);
            ticks += 1;
        }
        ticks
    }

    #[test]
    fn single_frame_renders_and_flushes_once() -> Result<()> {
        let storage = storage_with("/a.tpm2", vec![0xC9, 0xDA, 0x00, 0x03, 0x10, 0x20, 0x30, 0x36]);
        let mut strip = LedStrip::new(1);
        let mut player = player();

        player.start_playback(&PlaybackRequest::new("/a.tpm2"), &storage, &mut strip, 0)?;
        assert_eq!(player.state(), PlaybackState::Loading);
        assert_eq!(strip.realtime().owner(0), Some(OWNER));

        // load only, checked before the window is rendered
        player.load_frame().map_err(anyhow::Error::from)?;
        let window = player.ring.play_window().unwrap();
        assert_eq!(window.pixels().collect::<Vec<_>>(), [Rgbw::new(16, 32, 48, 0)]);

        let shows = strip.show_count();
        player.play_frame(&mut strip, 0);
        assert_eq!(strip.pixel(0), Some(Rgbw::new(16, 32, 48, 0)));
        assert_eq!(strip.show_count(), shows + 1);
        Ok(())
    }

    #[test]
    fn command_packet_is_skipped() -> Result<()> {
        let storage = storage_with(
            "/a.tpm2",
            vec![0xC9, 0xC0, 0xFF, 0x36, 0xC9, 0xDA, 0x00, 0x03, 0x01, 0x02, 0x03, 0x36],
        );
        let mut strip = LedStrip::new(1);
        let mut player = player();

        player.start_playback(&PlaybackRequest::new("/a.tpm2"), &storage, &mut strip, 0)?;
        let tick = player.tick(&mut strip, 0);
        assert!(tick.loaded && tick.rendered);
        assert_eq!(strip.pixel(0), Some(Rgbw::new(1, 2, 3, 0)));
        assert_eq!(player.stats().scan.commands, 1);
        Ok(())
    }

    #[test]
    fn empty_recording_goes_idle_without_rendering() -> Result<()> {
        let storage = storage_with("/empty.tpm2", Vec::new());
        let mut strip = LedStrip::new(3);
        let mut player = player();

        player.start_playback(&PlaybackRequest::new("/empty.tpm2"), &storage, &mut strip, 0)?;
        let tick = player.tick(&mut strip, 0);

        assert!(!tick.loaded && !tick.rendered);
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(player.last_stop(), Some(StopReason::Finished));
        assert_eq!(player.stats().frames_rendered, 0);
        assert!(strip.pixels().iter().all(Rgbw::is_off));
        assert_eq!(strip.realtime().owner(0), None);
        Ok(())
    }

    #[test]
    fn repeat_twice_renders_three_times() -> Result<()> {
        let storage = storage_with("/a.tpm2", frame(&[9, 9, 9]));
        let mut strip = LedStrip::new(1);
        let clock = ManualClock::new(0);
        let mut player = player();

        let request = PlaybackRequest::new("/a.tpm2").with_repeat(RepeatMode::Times(2));
        player.start_playback(&request, &storage, &mut strip, clock.now_ms())?;
        run(&mut player, &mut strip, &clock, 40, 100);

        assert!(!player.is_active());
        assert_eq!(player.stats().frames_rendered, 3);
        assert_eq!(player.stats().rewinds, 2);
        assert_eq!(strip.pixel(0), Some(Rgbw::OFF));
        Ok(())
    }

    #[test]
    fn zero_repeats_play_a_single_pass() -> Result<()> {
        let storage = storage_with("/a.tpm2", frame(&[9, 9, 9]));
        let mut strip = LedStrip::new(1);
        let clock = ManualClock::new(0);
        let mut player = player();

        let request = PlaybackRequest::new("/a.tpm2").with_repeat(RepeatMode::Times(0));
        player.start_playback(&request, &storage, &mut strip, clock.now_ms())?;
        run(&mut player, &mut strip, &clock, 40, 100);

        assert!(!player.is_active());
        assert_eq!(player.stats().frames_rendered, 1);
        assert_eq!(player.stats().rewinds, 0);
        assert_eq!(player.last_stop(), Some(StopReason::Finished));
        Ok(())
    }

    #[test]
    fn overstated_frame_length_keeps_following_frames() -> Result<()> {
        let mut data = vec![0xC9, 0xDA, 0x00, 0x09, 0x01, 0x02, 0x03, 0x36];
        data.extend(frame(&[4, 5, 6]));
        let storage = storage_with("/a.tpm2", data);
        let mut strip = LedStrip::new(1);
        let clock = ManualClock::new(0);
        let mut player = player();

        player.start_playback(&PlaybackRequest::new("/a.tpm2"), &storage, &mut strip, 0)?;

        let mut shown = Vec::new();
        while player.is_active() && shown.len() < 10 {
            if player.tick(&mut strip, clock.now_ms()).rendered {
                shown.push(strip.pixel(0));
            }
            clock.advance(40);
        }

        assert_eq!(shown, [Some(Rgbw::rgb(1, 2, 3)), Some(Rgbw::rgb(4, 5, 6))]);
        assert_eq!(player.stats().scan.frames, 2);
        Ok(())
    }

    #[test]
    fn frames_respect_the_frame_delay() -> Result<()> {
        let mut data = frame(&[1, 1, 1]);
        data.extend(frame(&[2, 2, 2]));
        data.extend(frame(&[3, 3, 3]));
        let storage = storage_with("/a.tpm2", data);
        let mut strip = LedStrip::new(1);
        let clock = ManualClock::new(0);
        let mut player = player();

        let request = PlaybackRequest::new("/a.tpm2").with_frame_delay(100);
        player.start_playback(&request, &storage, &mut strip, 0)?;

        let mut render_times = Vec::new();
        while player.is_active() {
            if player.tick(&mut strip, clock.now_ms()).rendered {
                render_times.push(clock.now_ms());
            }
            clock.advance(10);
        }

        assert_eq!(render_times, [0, 100, 200]);
        Ok(())
    }

    #[test]
    fn loops_until_overridden() -> Result<()> {
        let storage = storage_with("/a.tpm2", frame(&[5, 5, 5]));
        let mut strip = LedStrip::new(1);
        let clock = ManualClock::new(0);
        let mut player = player();

        let request = PlaybackRequest::new("/a.tpm2").with_repeat(RepeatMode::Forever);
        player.start_playback(&request, &storage, &mut strip, 0)?;
        let ticks = run(&mut player, &mut strip, &clock, 40, 50);
        assert_eq!(ticks, 50);
        assert!(player.is_active());
        assert_eq!(player.stats().frames_rendered, 50);

        strip.realtime_mut().set_override(RealtimeOverride::Once);
        player.tick(&mut strip, clock.now_ms());

        assert!(!player.is_active());
        assert_eq!(player.last_stop(), Some(StopReason::Overridden));
        assert_eq!(strip.realtime().override_mode(), RealtimeOverride::None);
        assert_eq!(strip.pixel(0), Some(Rgbw::OFF));
        Ok(())
    }

    #[test]
    fn override_always_stops_on_the_following_check() -> Result<()> {
        let storage = storage_with("/a.tpm2", frame(&[5, 5, 5]));
        let mut strip = LedStrip::new(1);
        let mut player = player();

        let request = PlaybackRequest::new("/a.tpm2").with_repeat(RepeatMode::Forever);
        player.start_playback(&request, &storage, &mut strip, 0)?;
        strip.realtime_mut().set_override(RealtimeOverride::Always);

        player.tick(&mut strip, 0);
        assert!(player.is_active());
        assert_eq!(strip.realtime().override_mode(), RealtimeOverride::Once);

        player.tick(&mut strip, 40);
        assert!(!player.is_active());
        Ok(())
    }

    #[test]
    fn start_resets_a_pending_once_override() -> Result<()> {
        let storage = storage_with("/a.tpm2", frame(&[5, 5, 5]));
        let mut strip = LedStrip::new(1);
        strip.realtime_mut().set_override(RealtimeOverride::Once);
        let mut player = player();

        player.start_playback(&PlaybackRequest::new("/a.tpm2"), &storage, &mut strip, 0)?;
        assert!(player.tick(&mut strip, 0).rendered);
        Ok(())
    }

    #[test]
    fn new_request_supersedes_and_clears() -> Result<()> {
        let mut flash = MemoryStorage::new("flash");
        flash.insert("/a.tpm2", frame(&[7, 7, 7, 7, 7, 7]));
        flash.insert("/b.tpm2", frame(&[1, 1, 1]));
        let storage = StorageChain::new().with_backend(flash);
        let mut strip = LedStrip::new(4).with_segments([Segment::linear(3, 2, 3)]);
        let mut player = player();

        let request = PlaybackRequest::new("/a.tpm2").with_repeat(RepeatMode::Forever);
        player.start_playback(&request, &storage, &mut strip, 0)?;
        player.tick(&mut strip, 0);
        assert_eq!(strip.pixel(1), Some(Rgbw::rgb(7, 7, 7)));

        let request = PlaybackRequest::new("/b.tpm2").with_segment(3);
        player.start_playback(&request, &storage, &mut strip, 10)?;
        assert_eq!(player.last_stop(), Some(StopReason::Superseded));
        assert_eq!(strip.pixel(0), Some(Rgbw::OFF));
        assert_eq!(strip.pixel(1), Some(Rgbw::OFF));

        player.tick(&mut strip, 10);
        assert_eq!(strip.pixel(2), Some(Rgbw::rgb(1, 1, 1)));
        assert_eq!(player.session().map(|s| s.range), Some(LedRange::new(2, 3)));
        Ok(())
    }

    #[test]
    fn missing_file_leaves_controller_idle() {
        let storage = storage_with("/a.tpm2", frame(&[1, 1, 1]));
        let mut strip = LedStrip::new(1);
        let mut player = player();

        let err = player
            .start_playback(&PlaybackRequest::new("/nope.tpm2"), &storage, &mut strip, 0)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::NotFound { .. })
        ));
        assert_eq!(player.state(), PlaybackState::Idle);
        assert_eq!(strip.realtime().owner(0), None);
    }

    #[test]
    fn rejects_unknown_format_and_segment() {
        let storage = storage_with("/a.tpm2", frame(&[1, 1, 1]));
        let mut strip = LedStrip::new(1);
        let mut player = player();

        let err = player
            .start_playback(&PlaybackRequest::new("/a.gif"), &storage, &mut strip, 0)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlaybackError>(),
            Some(PlaybackError::UnsupportedFormat(_))
        ));

        let request = PlaybackRequest::new("/a.tpm2").with_segment(9);
        let err = player
            .start_playback(&request, &storage, &mut strip, 0)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PlaybackError>(),
            Some(&PlaybackError::UnknownSegment(9))
        );
    }

    #[test]
    fn segment_outside_strip_is_rejected() {
        let storage = storage_with("/a.tpm2", frame(&[1, 1, 1]));
        let mut strip = LedStrip::new(4).with_segments([Segment::linear(1, 2, 8)]);
        let mut player = player();

        let request = PlaybackRequest::new("/a.tpm2").with_segment(1);
        let err = player
            .start_playback(&request, &storage, &mut strip, 0)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PlaybackError>(),
            Some(PlaybackError::RangeOutOfBounds { .. })
        ));
    }

    #[test]
    fn frames_never_spill_past_the_segment() -> Result<()> {
        let storage = storage_with("/a.tpm2", frame(&[1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]));
        let mut strip = LedStrip::new(5).with_segments([Segment::linear(0, 1, 3)]);
        let mut player = player();

        let request = PlaybackRequest::new("/a.tpm2").with_segment(0);
        player.start_playback(&request, &storage, &mut strip, 0)?;
        player.tick(&mut strip, 0);

        assert_eq!(
            strip.pixels(),
            [
                Rgbw::OFF,
                Rgbw::rgb(1, 1, 1),
                Rgbw::rgb(2, 2, 2),
                Rgbw::OFF,
                Rgbw::OFF
            ]
        );
        Ok(())
    }

    #[test]
    fn strip_clamp_runs_to_the_end_of_the_strip() -> Result<()> {
        let storage = storage_with("/a.tpm2", frame(&[1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]));
        let mut strip = LedStrip::new(4).with_segments([Segment::linear(0, 1, 2)]);
        let mut player = PlaybackController::new(PlayerConfig {
            clamp: ClampTarget::Strip,
            ..PlayerConfig::default()
        })?;

        let request = PlaybackRequest::new("/a.tpm2").with_segment(0);
        player.start_playback(&request, &storage, &mut strip, 0)?;
        player.tick(&mut strip, 0);

        assert_eq!(
            strip.pixels(),
            [
                Rgbw::OFF,
                Rgbw::rgb(1, 1, 1),
                Rgbw::rgb(2, 2, 2),
                Rgbw::rgb(3, 3, 3)
            ]
        );
        Ok(())
    }

    #[test]
    fn matrix_segment_maps_rows() -> Result<()> {
        // 4x3 matrix, 2x2 rectangle at column 1, row 1
        let storage = storage_with("/a.tpm2", frame(&[1, 0, 0, 2, 0, 0, 3, 0, 0, 4, 0, 0]));
        let mut strip = LedStrip::new(12).with_segments([Segment::matrix(5, (1, 1), (2, 2), 4).unwrap()]);
        let mut player = player();

        let request = PlaybackRequest::new("/a.tpm2").with_segment(5);
        player.start_playback(&request, &storage, &mut strip, 0)?;
        player.tick(&mut strip, 0);

        let lit: Vec<(usize, u8)> = strip
            .pixels()
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_off())
            .map(|(i, p)| (i, p.r))
            .collect();
        assert_eq!(lit, [(5, 1), (6, 2), (9, 3), (10, 4)]);

        player.stop(&mut strip);
        assert!(strip.pixels().iter().all(Rgbw::is_off));
        assert_eq!(player.last_stop(), Some(StopReason::Stopped));
        Ok(())
    }

    #[test]
    fn truncated_tail_is_dropped() -> Result<()> {
        let mut data = frame(&[1, 1, 1]);
        data.extend([0xC9, 0xDA, 0x00, 0x03, 0x02]);
        let storage = storage_with("/a.tpm2", data);
        let mut strip = LedStrip::new(1);
        let clock = ManualClock::new(0);
        let mut player = player();

        player.start_playback(&PlaybackRequest::new("/a.tpm2"), &storage, &mut strip, 0)?;
        run(&mut player, &mut strip, &clock, 40, 20);

        let stats = player.stats();
        assert_eq!(stats.frames_rendered, 1);
        assert_eq!(stats.scan.truncated, 1);
        assert_eq!(player.last_stop(), Some(StopReason::Finished));
        Ok(())
    }

    #[test]
    fn strict_mode_stops_on_malformed_packet() -> Result<()> {
        let mut data = vec![0xC9, 0x42, 0x36];
        data.extend(frame(&[1, 1, 1]));
        let storage = storage_with("/a.tpm2", data);
        let mut strip = LedStrip::new(1);
        let mut player = player();
        player.set_fail_level(Level::Warn);

        player.start_playback(&PlaybackRequest::new("/a.tpm2"), &storage, &mut strip, 0)?;
        player.tick(&mut strip, 0);

        assert_eq!(player.last_stop(), Some(StopReason::Failed));
        assert_eq!(player.stats().frames_rendered, 0);
        Ok(())
    }

    #[test]
    fn looping_a_frameless_recording_gives_up() -> Result<()> {
        let storage = storage_with("/a.tpm2", vec![0xC9, 0xC0, 0x00, 0x36]);
        let mut strip = LedStrip::new(1);
        let clock = ManualClock::new(0);
        let mut player = player();

        let request = PlaybackRequest::new("/a.tpm2").with_repeat(RepeatMode::Forever);
        player.start_playback(&request, &storage, &mut strip, 0)?;
        let ticks = run(&mut player, &mut strip, &clock, 40, 20);

        assert!(ticks < 20);
        assert_eq!(player.last_stop(), Some(StopReason::Finished));
        Ok(())
    }
}
