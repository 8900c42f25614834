//! Byte-level access to recordings.
//!
//! A [`ByteSource`] is the only way the scanner and decoder see a recording.
//! It never blocks: when no byte is ready it reports unavailability and the
//! caller retries on the next tick.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Result, bail};
use log::{debug, warn};

/// Seekable, readable byte stream over a file-like resource.
pub trait ByteSource {
    /// Number of bytes that can still be read before the end of the stream.
    fn available(&self) -> u64;

    /// Reads one byte, or `None` when the stream is exhausted or closed.
    fn read_byte(&mut self) -> Option<u8>;

    /// Rewinds to the first byte of the recording.
    fn seek_to_start(&mut self) -> Result<()>;

    /// Releases the underlying resource. Further reads return `None`.
    fn close(&mut self);

    /// Offset of the next byte to be read.
    fn position(&self) -> u64;

    fn is_available(&self) -> bool {
        self.available() > 0
    }

    /// Reads bytes until `marker` has been consumed or the stream runs dry.
    ///
    /// Returns `true` if the marker was found.
    fn skip_until(&mut self, marker: u8) -> bool {
        while let Some(byte) = self.read_byte() {
            if byte == marker {
                return true;
            }
        }
        false
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn available(&self) -> u64 {
        (**self).available()
    }

    fn read_byte(&mut self) -> Option<u8> {
        (**self).read_byte()
    }

    fn seek_to_start(&mut self) -> Result<()> {
        (**self).seek_to_start()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn position(&self) -> u64 {
        (**self).position()
    }
}

/// In-memory recording, shared cheaply between sources.
#[derive(Debug, Clone)]
pub struct SliceSource {
    data: Arc<[u8]>,
    pos: usize,
    closed: bool,
}

impl SliceSource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
            closed: false,
        }
    }
}

impl ByteSource for SliceSource {
    fn available(&self) -> u64 {
        if self.closed {
            return 0;
        }
        (self.data.len() - self.pos) as u64
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.closed {
            return None;
        }
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    fn seek_to_start(&mut self) -> Result<()> {
        if self.closed {
            bail!("cannot rewind a closed source");
        }
        self.pos = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn position(&self) -> u64 {
        self.pos as u64
    }
}

/// Buffered recording file on a local filesystem.
///
/// Read errors are logged and turn the source unavailable; they never
/// propagate into the tick loop.
#[derive(Debug)]
pub struct FileSource {
    reader: Option<BufReader<File>>,
    len: u64,
    pos: u64,
}

impl FileSource {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();
        debug!("Opened {} ({len} bytes)", path.as_ref().display());

        Ok(Self {
            reader: Some(BufReader::new(file)),
            len,
            pos: 0,
        })
    }
}

impl ByteSource for FileSource {
    fn available(&self) -> u64 {
        match self.reader {
            Some(_) => self.len.saturating_sub(self.pos),
            None => 0,
        }
    }

    fn read_byte(&mut self) -> Option<u8> {
        if self.pos >= self.len {
            return None;
        }
        let reader = self.reader.as_mut()?;

        let mut byte = [0u8; 1];
        match reader.read_exact(&mut byte) {
            Ok(()) => {
                self.pos += 1;
                Some(byte[0])
            }
            Err(e) => {
                warn!("Read failed at byte {}: {e}", self.pos);
                self.reader = None;
                None
            }
        }
    }

    fn seek_to_start(&mut self) -> Result<()> {
        let Some(reader) = self.reader.as_mut() else {
            bail!("cannot rewind a closed source");
        };
        reader.seek(SeekFrom::Start(0))?;
        self.pos = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.reader = None;
    }

    fn position(&self) -> u64 {
        self.pos
    }
}
