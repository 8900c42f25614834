use std::ops::Range;

use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::Level;

use super::command::{Cli, InfoArgs};
use crate::config::Config;
use crate::input::InputReader;
use crate::timestamp::time_str;
use tpm2::process::decode::FrameDecoder;
use tpm2::process::scan::{PacketScanner, ScanStats};
use tpm2::structs::color::{CHANNELS_PER_PIXEL, CHANNELS_PER_SLOT};
use tpm2::structs::packet::PacketKind;
use tpm2::structs::session::frame_delay_from_fps;
use tpm2::utils::byte_source::{ByteSource, SliceSource};
use tpm2::utils::errors::ScanError;

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing TPM2 recording: {}", args.input.display());

    let frame_delay_ms = match args.fps {
        Some(fps) => frame_delay_from_fps(fps)
            .ok_or_else(|| anyhow::anyhow!("--fps must be a positive number, got {fps}"))?,
        None => Config::load(cli.config.as_deref())?.playback.frame_delay_ms,
    };

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
            pb.enable_steady_tick(std::time::Duration::from_millis(100));
            pb.set_message("Scanning packets...");
            Some(pb)
        }
        None => None,
    };

    let mut input = InputReader::new(&args.input)?;
    let data = input.read_all()?;
    let analysis = analyze(&data, cli.fail_level());

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let analysis = analysis?;

    if analysis.stats.frames == 0 {
        println!("No TPM2 data frames found in {}.", input.name());
        println!("This doesn't appear to be a TPM2 recording.");
    }

    if args.dump {
        dump_packets(&data, &analysis.spans);
    }

    display_summary(&analysis, frame_delay_ms);
    Ok(())
}

#[derive(Debug)]
struct PacketSpan {
    /// Bytes consumed by one scanner call, including skipped garbage.
    bytes: Range<usize>,
    kind: Option<PacketKind>,
}

#[derive(Debug, Default)]
struct Analysis {
    total_bytes: usize,
    stats: ScanStats,
    spans: Vec<PacketSpan>,
    min_pixels: Option<usize>,
    max_pixels: usize,
    total_pixels: u64,
    payload_mismatches: u64,
}

impl Analysis {
    fn add_frame(&mut self, pixels: usize, declared_len: u16) {
        self.min_pixels = Some(self.min_pixels.map_or(pixels, |min| min.min(pixels)));
        self.max_pixels = self.max_pixels.max(pixels);
        self.total_pixels += pixels as u64;
        if usize::from(declared_len) % CHANNELS_PER_PIXEL != 0 {
            self.payload_mismatches += 1;
        }
    }

    fn average_pixels(&self) -> f64 {
        if self.stats.frames == 0 {
            return 0.0;
        }
        self.total_pixels as f64 / self.stats.frames as f64
    }
}

fn analyze(data: &[u8], fail_level: Level) -> Result<Analysis> {
    let mut source = SliceSource::new(data);
    let mut scanner = PacketScanner::default();
    scanner.set_fail_level(fail_level);

    let decoder = FrameDecoder;
    let mut window = vec![0u8; (usize::from(u16::MAX) / CHANNELS_PER_PIXEL + 1) * CHANNELS_PER_SLOT];

    let mut analysis = Analysis {
        total_bytes: data.len(),
        ..Analysis::default()
    };

    loop {
        let start = source.position() as usize;
        let result = scanner.next_packet(&mut source, |src, len| {
            decoder.decode(src, len, usize::MAX, &mut window)
        });
        let bytes = start..source.position() as usize;

        let kind = match result {
            Ok(packet) => {
                if packet.is_frame() {
                    analysis.add_frame(packet.pixels, packet.declared_len);
                }
                Some(packet.kind)
            }
            Err(ScanError::Exhausted) => {
                if !bytes.is_empty() {
                    log::debug!("{} trailing bytes without a packet", bytes.len());
                    analysis.spans.push(PacketSpan { bytes, kind: None });
                }
                break;
            }
            Err(ScanError::Truncated(pos)) => {
                log::warn!("Recording ends inside a packet at byte {pos}");
                None
            }
            Err(e) => {
                log::error!("Malformed packet at byte {start}: {e}");
                return Err(e.into());
            }
        };

        analysis.spans.push(PacketSpan { bytes, kind });
    }

    analysis.stats = *scanner.stats();
    Ok(analysis)
}

fn dump_packets(data: &[u8], spans: &[PacketSpan]) {
    for span in spans {
        let label = span
            .kind
            .map_or_else(|| "incomplete".to_string(), |kind| kind.to_string());
        println!("{:08X} {:<14} {}", span.bytes.start, label, hex_line(&data[span.bytes.clone()]));
    }
}

fn hex_line(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn display_summary(analysis: &Analysis, frame_delay_ms: u32) {
    let stats = &analysis.stats;

    println!("Recording");
    println!("  Size: {} bytes", analysis.total_bytes);
    println!(
        "  Packets: {} data frames, {} commands, {} responses, {} unknown",
        stats.frames, stats.commands, stats.responses, stats.unknown
    );

    if stats.frames > 0 {
        println!(
            "  Pixels per frame: min {}, max {}, average {:.1}",
            analysis.min_pixels.unwrap_or(0),
            analysis.max_pixels,
            analysis.average_pixels()
        );

        let fps = if frame_delay_ms > 0 {
            format!("{:.2} fps", 1000.0 / f64::from(frame_delay_ms))
        } else {
            "unpaced".to_string()
        };
        println!(
            "  Nominal duration: {} ({frame_delay_ms} ms/frame, {fps})",
            time_str(stats.frames * u64::from(frame_delay_ms))
        );
    }

    if stats.truncated + stats.unterminated + stats.unknown + analysis.payload_mismatches > 0
        || stats.resync_bytes > 0
    {
        println!("Damage");
        println!("  Truncated packets: {}", stats.truncated);
        println!("  Missing end markers: {}", stats.unterminated);
        println!("  Unknown packet kinds: {}", stats.unknown);
        println!(
            "  Payloads not a multiple of {CHANNELS_PER_PIXEL} bytes: {}",
            analysis.payload_mismatches
        );
        println!("  Bytes skipped while resyncing: {}", stats.resync_bytes);
    }
}
