use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

use tpm2::output::strip::LedStrip;
use tpm2::process::playback::{ClampTarget, PlayerConfig};
use tpm2::structs::segment::Segment;
use tpm2::utils::storage::{DirStorage, StorageChain};

/// Runtime configuration, read from YAML.
///
/// Every field is optional. Without a file the strip has 60 LEDs, no
/// segments, and recordings are read from the working directory.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub strip: StripConfig,
    pub segments: Vec<SegmentConfig>,
    /// Storage backends in resolution order.
    pub storage: Vec<StorageConfig>,
    pub playback: PlaybackConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StripConfig {
    pub length: usize,
    /// Columns per row when the strip is wired as a matrix.
    pub matrix_width: Option<usize>,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            length: 60,
            matrix_width: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentConfig {
    pub id: usize,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub stop: usize,
    /// Rectangle of the matrix; `start` and `stop` are derived from it.
    #[serde(default)]
    pub matrix: Option<MatrixConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixConfig {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    pub name: String,
    pub root: PathBuf,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaybackConfig {
    pub frame_delay_ms: u32,
    pub windows: usize,
    pub realtime_timeout_ms: u32,
    pub clamp: ClampSetting,
    /// Sleep between controller ticks.
    pub tick_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        let player = PlayerConfig::default();
        Self {
            frame_delay_ms: player.default_frame_delay_ms,
            windows: player.window_count,
            realtime_timeout_ms: player.realtime_timeout_ms,
            clamp: ClampSetting::Segment,
            tick_ms: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClampSetting {
    Segment,
    Strip,
}

impl From<ClampSetting> for ClampTarget {
    fn from(setting: ClampSetting) -> Self {
        match setting {
            ClampSetting::Segment => ClampTarget::Segment,
            ClampSetting::Strip => ClampTarget::Strip,
        }
    }
}

impl Config {
    /// Loads `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            log::debug!("No config file, using defaults");
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::parse(&text)
            .with_context(|| format!("Invalid config {}", path.display()))?;

        log::info!("Loaded config {}", path.display());
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(text)?;
        if config.playback.windows < 2 {
            bail!("playback.windows must be at least 2, got {}", config.playback.windows);
        }
        Ok(config)
    }

    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            window_count: self.playback.windows,
            default_frame_delay_ms: self.playback.frame_delay_ms,
            realtime_timeout_ms: self.playback.realtime_timeout_ms,
            clamp: self.playback.clamp.into(),
            ..PlayerConfig::default()
        }
    }

    /// Builds the strip with its segments; `length` overrides the configured length.
    pub fn build_strip(&self, length: Option<usize>) -> Result<LedStrip> {
        let length = length.unwrap_or(self.strip.length);

        let segments = self
            .segments
            .iter()
            .map(|seg| match &seg.matrix {
                None => Ok(Segment::linear(seg.id, seg.start, seg.stop)),
                Some(m) => {
                    let Some(matrix_width) = self.strip.matrix_width else {
                        bail!("segment {} is a matrix but strip.matrix_width is not set", seg.id);
                    };
                    Segment::matrix(seg.id, (m.x, m.y), (m.width, m.height), matrix_width)
                        .ok_or_else(|| {
                            anyhow!(
                                "segment {}: columns {}..{} do not fit a matrix {matrix_width} wide",
                                seg.id,
                                m.x,
                                m.x.saturating_add(m.width)
                            )
                        })
                }
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(LedStrip::new(length).with_segments(segments))
    }

    /// Configured storage backends, or the working directory if none are.
    pub fn storage_chain(&self) -> StorageChain {
        if self.storage.is_empty() {
            return StorageChain::new().with_backend(DirStorage::new("cwd", "."));
        }

        self.storage
            .iter()
            .fold(StorageChain::new(), |chain, backend| {
                chain.with_backend(
                    DirStorage::new(backend.name.clone(), backend.root.clone())
                        .with_enabled(backend.enabled),
                )
            })
    }
}
