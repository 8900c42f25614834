#[macro_export]
macro_rules! log_or_err {
    ($state:expr, $level:expr, $err:expr $(,)?) => {{
        if $level <= $state.fail_level {
            return Err($err);
        } else {
            match $level {
                ::log::Level::Error => ::log::error!("{}", $err),
                ::log::Level::Warn => ::log::warn!("{}", $err),
                ::log::Level::Info => ::log::info!("{}", $err),
                ::log::Level::Debug => ::log::debug!("{}", $err),
                ::log::Level::Trace => ::log::trace!("{}", $err),
            }
        }
    }};
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    #[error("Stream exhausted before a packet start marker was found")]
    Exhausted,

    #[error("Stream ended inside a packet at byte {0}")]
    Truncated(u64),

    #[error("Unrecognized packet kind {0:#04X}, skipped to end of packet")]
    MalformedKind(u8),

    #[error("Declared payload of {declared} bytes exceeds the addressable {addressable} pixels")]
    OverrunDeclaredLength { declared: u16, addressable: usize },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameBufferError {
    #[error("No free window to load into ({0} windows all filled)")]
    Full(usize),

    #[error("No filled window to play")]
    Empty,

    #[error("A ring needs at least 2 windows, got {0}")]
    TooFewWindows(usize),

    #[error("Window holds at most {capacity} pixels, got {actual}")]
    WindowOverflow { capacity: usize, actual: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("Recording {path} not found on any storage backend ({backends})")]
    NotFound { path: String, backends: String },

    #[error("Storage backend {backend} failed to open {path}: {source}")]
    Open {
        backend: String,
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("Unsupported recording format: {0}")]
    UnsupportedFormat(String),

    #[error("Unknown segment id {0}")]
    UnknownSegment(usize),

    #[error("LED range [{start}, {stop}) does not fit a strip of {length} LEDs")]
    RangeOutOfBounds {
        start: usize,
        stop: usize,
        length: usize,
    },
}
