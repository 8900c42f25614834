use anyhow::{Context, Result};
use indicatif::MultiProgress;

use super::command::{ApplyArgs, Cli};
use super::play::run_playback;
use crate::control::ControlMessage;
use crate::input::read_text_arg;

pub fn cmd_apply(args: &ApplyArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let text = read_text_arg(&args.message)?;
    let message = ControlMessage::parse(&text).context("Invalid control message")?;
    let request = message.playback_request()?;

    log::info!(
        "Control message: play {} (segment: {}, repeat: {})",
        request.path,
        request
            .segment
            .map_or_else(|| "whole strip".to_string(), |id| id.to_string()),
        request.repeat
    );

    run_playback(request, &args.session, cli, multi)
}
