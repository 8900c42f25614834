mod play_impl;
pub mod preview;
pub mod progress;

pub use play_impl::{cmd_play, run_playback};
