use std::fmt::{Display, Formatter};

/// Request from a higher-priority input to take the pixels back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RealtimeOverride {
    #[default]
    None,
    /// Stop the current realtime producer at its next check.
    Once,
    /// Keep stopping realtime producers. Degrades to `Once` when checked.
    Always,
}

impl Display for RealtimeOverride {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RealtimeOverride::None => write!(f, "none"),
            RealtimeOverride::Once => write!(f, "once"),
            RealtimeOverride::Always => write!(f, "always"),
        }
    }
}

/// Time-boxed ownership of the pixel output.
///
/// A producer refreshes its lock on every frame; if it stalls, the lock
/// lapses after the timeout and other producers may take over.
#[derive(Debug, Clone, Default)]
pub struct RealtimeState {
    owner: Option<String>,
    expires_at_ms: u64,
    override_mode: RealtimeOverride,
}

impl RealtimeState {
    pub fn lock(&mut self, owner: &str, timeout_ms: u32, now_ms: u64) {
        if self.owner.as_deref() != Some(owner) {
            self.owner = Some(owner.to_string());
        }
        self.expires_at_ms = now_ms + u64::from(timeout_ms);
    }

    /// Releases the lock if `owner` holds it.
    pub fn release(&mut self, owner: &str) {
        if self.owner.as_deref() == Some(owner) {
            self.owner = None;
            self.expires_at_ms = 0;
        }
    }

    /// Current owner, unless its lock has lapsed.
    pub fn owner(&self, now_ms: u64) -> Option<&str> {
        match &self.owner {
            Some(owner) if now_ms < self.expires_at_ms => Some(owner),
            _ => None,
        }
    }

    pub fn expires_at_ms(&self) -> u64 {
        self.expires_at_ms
    }

    pub fn override_mode(&self) -> RealtimeOverride {
        self.override_mode
    }

    pub fn set_override(&mut self, mode: RealtimeOverride) {
        self.override_mode = mode;
    }
}
