use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};

/// Reads a whole input from a file or, for "-", from stdin.
pub struct InputReader {
    reader: Box<dyn Read>,
    name: String,
}

impl InputReader {
    /// Create a new InputReader from a path
    /// Use "-" for stdin pipe input
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let path = input_path.as_ref();
        let is_pipe = path.to_string_lossy() == "-";

        let (reader, name): (Box<dyn Read>, String) = if is_pipe {
            (Box::new(io::stdin().lock()), "stdin".to_string())
        } else {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            (Box::new(BufReader::new(file)), path.display().to_string())
        };

        Ok(Self { reader, name })
    }

    /// Input name for log lines.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.reader
            .read_to_end(&mut data)
            .with_context(|| format!("Failed to read {}", self.name))?;
        Ok(data)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let data = self.read_all()?;
        String::from_utf8(data).with_context(|| format!("{} is not valid UTF-8", self.name))
    }
}

/// Resolves a command-line text argument: `@PATH` reads a file, `-` reads
/// stdin, anything else is taken literally.
pub fn read_text_arg(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => InputReader::new(path)?.read_string(),
        None if arg == "-" => InputReader::new(arg)?.read_string(),
        None => Ok(arg.to_string()),
    }
}
