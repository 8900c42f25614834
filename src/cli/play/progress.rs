use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use tpm2::process::scan::PacketScanner;
use tpm2::structs::session::RepeatMode;
use tpm2::utils::byte_source::ByteSource;
use tpm2::utils::errors::ScanError;
use tpm2::utils::storage::StorageChain;

/// Counts the data frames in one pass over `source`.
pub fn count_frames(source: &mut dyn ByteSource) -> u64 {
    let mut scanner = PacketScanner::default();
    let mut frames = 0u64;

    loop {
        match scanner.next_packet(&mut *source, |_, _| Ok(0)) {
            Ok(packet) if packet.is_frame() => frames += 1,
            Ok(_) => {}
            Err(ScanError::Exhausted) | Err(ScanError::Truncated(_)) => break,
            Err(e) => log::debug!("{e}"),
        }
    }

    frames
}

/// Frames a session will render, or `None` when it loops forever.
pub fn estimate_total_frames(
    storage: &StorageChain,
    path: &str,
    repeat: RepeatMode,
) -> Result<Option<u64>> {
    let passes = match repeat {
        RepeatMode::Forever => return Ok(None),
        RepeatMode::Once => 1,
        RepeatMode::Times(n) => u64::from(n) + 1,
    };

    log::debug!("Counting frames for progress estimation");
    let mut source = storage.open(path)?;
    let frames = count_frames(source.as_mut());
    source.close();

    log::info!("Found {frames} frames in {path}");
    Ok(Some(frames * passes))
}

pub fn create_progress_bar(
    multi: &MultiProgress,
    total_frames: Option<u64>,
) -> Result<ProgressBar> {
    let pb = if let Some(total) = total_frames {
        let pb = multi.add(ProgressBar::new(total));
        pb.set_style(ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} frames ({percent}%)\n{msg} | elapsed: {elapsed_precise} | ETA: {eta_precise}",
        )?);
        pb
    } else {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template(
            "{spinner:.green} {pos} frames\n{msg} | elapsed: {elapsed_precise}",
        )?);
        pb
    };

    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb.set_message("loading");
    Ok(pb)
}
