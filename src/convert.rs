// Optional resizing before upload. The uploader only sees the `Resizer`
// trait; the default implementation pipes the image through ImageMagick.

use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::thread;

use crate::error::{Error, Result};

pub const DEFAULT_PROGRAM: &str = "convert";

pub trait Resizer {
    /// Returns `bytes` scaled to `percentage` percent of the original size.
    fn resize(&self, bytes: &[u8], percentage: u32) -> Result<Vec<u8>>;
}

/// Runs `<program> - -resize <N>% -`, image in on stdin, image out on stdout.
#[derive(Debug, Clone)]
pub struct ExternalResizer {
    program: String,
}

impl ExternalResizer {
    pub fn new(program: impl Into<String>) -> Self {
        ExternalResizer {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for ExternalResizer {
    fn default() -> Self {
        ExternalResizer::new(DEFAULT_PROGRAM)
    }
}

impl Resizer for ExternalResizer {
    fn resize(&self, bytes: &[u8], percentage: u32) -> Result<Vec<u8>> {
        let mut child = Command::new(&self.program)
            .arg("-")
            .arg("-resize")
            .arg(format!("{}%", percentage))
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Conversion(format!("cannot run {}: {}", self.program, e)))?;

        // Feed stdin from a separate thread so a full stdout pipe cannot
        // block the child while we are still writing.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Conversion("stdin not captured".into()))?;
        let input = bytes.to_vec();
        let writer = thread::spawn(move || stdin.write_all(&input));

        let output = child.wait_with_output()?;
        let written = writer
            .join()
            .map_err(|_| Error::Conversion("stdin writer panicked".into()))?;

        if !output.status.success() {
            return Err(Error::Conversion(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        // A tool may stop reading once it has what it needs.
        match written {
            Err(e) if e.kind() != ErrorKind::BrokenPipe => return Err(e.into()),
            _ => {}
        }

        tracing::debug!(
            program = %self.program,
            percentage,
            before = bytes.len(),
            after = output.stdout.len(),
            "image resized"
        );
        Ok(output.stdout)
    }
}
