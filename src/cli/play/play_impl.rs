use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Result, bail};
use indicatif::MultiProgress;

use super::preview::Preview;
use super::progress::{create_progress_bar, estimate_total_frames};
use crate::cli::command::{Cli, PlayArgs, SessionArgs};
use crate::config::Config;
use crate::timestamp::time_str;
use tpm2::process::playback::PlaybackController;
use tpm2::structs::session::{PlaybackRequest, RepeatMode, frame_delay_from_fps};
use tpm2::utils::storage::{DirStorage, StorageChain};
use tpm2::utils::timing::{Clock, SystemClock};

pub fn cmd_play(args: &PlayArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let mut request = PlaybackRequest::new(args.file.clone());

    if let Some(id) = args.seg {
        request = request.with_segment(id);
    }

    if args.looping {
        request = request.with_repeat(RepeatMode::Forever);
    } else if let Some(count) = args.repeat {
        request = request.with_repeat(RepeatMode::from_count(count));
    }

    if let Some(fps) = args.fps {
        let Some(delay) = frame_delay_from_fps(fps) else {
            bail!("--fps must be a positive number, got {fps}");
        };
        request = request.with_frame_delay(delay);
    }

    run_playback(request, &args.session, cli, multi)
}

/// Plays `request` to completion, or until `--max-seconds` runs out.
pub fn run_playback(
    mut request: PlaybackRequest,
    session: &SessionArgs,
    cli: &Cli,
    multi: Option<&MultiProgress>,
) -> Result<()> {
    macro_rules! pb_update {
        ($pb:expr, $method:ident($($args:expr),*)) => {
            if let Some(ref pb) = $pb {
                pb.$method($($args),*);
            }
        };
    }

    let config = Config::load(cli.config.as_deref())?;
    let mut strip = config.build_strip(session.leds)?;

    let storage = resolve_storage(&config, &mut request);
    log::debug!("Storage backends: {}", storage.describe());

    let mut player = PlaybackController::new(config.player_config())?;
    player.set_fail_level(cli.fail_level());

    let pb = match multi {
        Some(multi) => {
            let total = estimate_total_frames(&storage, &request.path, request.repeat)?;
            Some(create_progress_bar(multi, total)?)
        }
        None => None,
    };

    let mut preview = session
        .preview
        .then(|| Preview::new(config.strip.matrix_width));
    let deadline_ms = session.max_seconds.map(|s| (s.max(0.0) * 1000.0) as u64);
    let tick = Duration::from_millis(config.playback.tick_ms);

    let clock = SystemClock::default();
    player.start_playback(&request, &storage, &mut strip, clock.now_ms())?;
    pb_update!(pb, set_message(format!("playing {}", request.path)));

    while player.is_active() {
        let now = clock.now_ms();
        if deadline_ms.is_some_and(|deadline| now >= deadline) {
            log::info!("Time limit reached after {}", time_str(now));
            player.stop(&mut strip);
            break;
        }

        let step = player.tick(&mut strip, now);
        if step.rendered {
            pb_update!(pb, set_position(player.stats().frames_rendered));
            pb_update!(pb, set_message(format!("timestamp: {}", time_str(now))));

            if let Some(preview) = preview.as_mut() {
                preview.draw(strip.pixels(), pb.as_ref())?;
            }
        }

        thread::sleep(tick);
    }

    let stats = player.stats();
    let elapsed = time_str(clock.now_ms());
    let reason = player
        .last_stop()
        .map_or_else(|| "stopped".to_string(), |r| r.to_string());

    pb_update!(
        pb,
        finish_with_message(format!("{reason} | timestamp: {elapsed}"))
    );
    log::info!(
        "Playback {reason}: {} frames rendered, {} loaded, {} rewinds in {elapsed}",
        stats.frames_rendered,
        stats.frames_loaded,
        stats.rewinds
    );

    let scan = stats.scan;
    if scan.truncated + scan.unknown + scan.unterminated > 0 || scan.resync_bytes > 0 {
        log::warn!(
            "Recording damage: {} truncated, {} unknown, {} unterminated packets, {} bytes skipped",
            scan.truncated,
            scan.unknown,
            scan.unterminated,
            scan.resync_bytes
        );
    }

    Ok(())
}

/// Without configured storage, an absolute path is played from its own
/// directory; relative paths resolve against the working directory.
fn resolve_storage(config: &Config, request: &mut PlaybackRequest) -> StorageChain {
    if config.storage.is_empty() {
        let path = Path::new(&request.path);
        if path.is_absolute() {
            if let (Some(dir), Some(name)) = (path.parent(), path.file_name()) {
                let chain = StorageChain::new().with_backend(DirStorage::new("local", dir));
                let name = format!("/{}", name.to_string_lossy());
                request.path = name;
                return chain;
            }
        }
    }

    config.storage_chain()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_paths_use_their_directory() {
        let config = Config::default();

        let mut request = PlaybackRequest::new("/srv/shows/intro.tpm2");
        let chain = resolve_storage(&config, &mut request);
        assert_eq!(chain.describe(), "local");
        assert_eq!(request.path, "/intro.tpm2");

        let mut request = PlaybackRequest::new("intro.tpm2");
        let chain = resolve_storage(&config, &mut request);
        assert_eq!(chain.describe(), "cwd");
        assert_eq!(request.path, "intro.tpm2");
    }

    #[test]
    fn configured_storage_takes_recording_paths() -> Result<()> {
        let config = Config::parse("storage: [{ name: flash, root: ./data }]")?;

        let mut request = PlaybackRequest::new("/intro.tpm2");
        let chain = resolve_storage(&config, &mut request);
        assert_eq!(chain.describe(), "flash");
        assert_eq!(request.path, "/intro.tpm2");
        Ok(())
    }
}
