//! JSON control messages.
//!
//! ```json
//! {"playback": {"file": "/a.tpm2", "seg": 2, "repeat": true, "fps": 25}}
//! ```
//!
//! `seg` is a segment id or `{"id": N}`; `repeat` is `true` to loop, `false`
//! for a single pass, or a count of extra passes (negative loops). Values of
//! the wrong type are logged and ignored, as are non-positive frame rates.

use anyhow::{Result, bail};
use serde::Deserialize;
use serde_json::Value;

use tpm2::structs::session::{PlaybackRequest, RepeatMode, frame_delay_from_fps};

#[derive(Debug, Deserialize)]
pub struct ControlMessage {
    #[serde(default)]
    pub playback: Option<PlaybackCommand>,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackCommand {
    pub file: String,
    #[serde(default)]
    pub seg: Option<SegmentRef>,
    #[serde(default)]
    pub repeat: Option<RepeatValue>,
    #[serde(default)]
    pub fps: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SegmentRef {
    Id(usize),
    Object {
        #[serde(default)]
        id: Option<usize>,
    },
    Invalid(Value),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RepeatValue {
    Flag(bool),
    Count(i64),
    Invalid(Value),
}

impl ControlMessage {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The playback request carried by this message.
    pub fn playback_request(&self) -> Result<PlaybackRequest> {
        let Some(command) = &self.playback else {
            bail!("control message has no \"playback\" entry");
        };
        Ok(command.to_request())
    }
}

impl PlaybackCommand {
    pub fn to_request(&self) -> PlaybackRequest {
        let mut request = PlaybackRequest::new(self.file.clone());

        match &self.seg {
            None | Some(SegmentRef::Object { id: None }) => {}
            Some(SegmentRef::Id(id)) | Some(SegmentRef::Object { id: Some(id) }) => {
                request = request.with_segment(*id);
            }
            Some(SegmentRef::Invalid(value)) => {
                log::warn!("Ignoring seg {value}: expected an integer or {{\"id\": integer}}");
            }
        }

        match &self.repeat {
            None => {}
            Some(RepeatValue::Flag(true)) => request = request.with_repeat(RepeatMode::Forever),
            Some(RepeatValue::Flag(false)) => request = request.with_repeat(RepeatMode::Once),
            Some(RepeatValue::Count(n)) => request = request.with_repeat(RepeatMode::from_count(*n)),
            Some(RepeatValue::Invalid(value)) => {
                log::warn!("Ignoring repeat {value}: expected true or an integer count");
            }
        }

        if let Some(value) = &self.fps {
            match value.as_f64().and_then(frame_delay_from_fps) {
                Some(delay) => request = request.with_frame_delay(delay),
                None => log::warn!("Ignoring fps {value}: expected a positive number"),
            }
        }

        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> PlaybackRequest {
        ControlMessage::parse(json)
            .and_then(|m| m.playback_request())
            .unwrap()
    }

    #[test]
    fn minimal_message_plays_once_on_the_whole_strip() {
        let r = request(r#"{"playback":{"file":"/a.tpm2"}}"#);
        assert_eq!(r, PlaybackRequest::new("/a.tpm2"));
    }

    #[test]
    fn segment_forms() {
        assert_eq!(request(r#"{"playback":{"file":"/a.tpm2","seg":2}}"#).segment, Some(2));
        assert_eq!(request(r#"{"playback":{"file":"/a.tpm2","seg":{"id":3}}}"#).segment, Some(3));
        assert_eq!(request(r#"{"playback":{"file":"/a.tpm2","seg":{}}}"#).segment, None);
        assert_eq!(request(r#"{"playback":{"file":"/a.tpm2","seg":"x"}}"#).segment, None);
    }

    #[test]
    fn repeat_forms() {
        let repeat = |v: &str| request(&format!(r#"{{"playback":{{"file":"/a.tpm2","repeat":{v}}}}}"#)).repeat;
        assert_eq!(repeat("true"), RepeatMode::Forever);
        assert_eq!(repeat("false"), RepeatMode::Once);
        assert_eq!(repeat("0"), RepeatMode::Once);
        assert_eq!(repeat("-1"), RepeatMode::Forever);
        assert_eq!(repeat("3"), RepeatMode::Times(3));
        assert_eq!(repeat("\"often\""), RepeatMode::Once);
    }

    #[test]
    fn fps_sets_the_frame_delay() {
        let delay = |v: &str| {
            request(&format!(r#"{{"playback":{{"file":"/a.tpm2","fps":{v}}}}}"#)).frame_delay_ms
        };
        assert_eq!(delay("25"), Some(40));
        assert_eq!(delay("30.0"), Some(33));
        assert_eq!(delay("0"), None);
        assert_eq!(delay("-10"), None);
        assert_eq!(delay("\"fast\""), None);
    }

    #[test]
    fn missing_file_or_entry_is_an_error() {
        assert!(ControlMessage::parse(r#"{"playback":{"seg":1}}"#).is_err());
        let message = ControlMessage::parse(r#"{"on":true}"#).unwrap();
        assert!(message.playback_request().is_err());
    }
}
