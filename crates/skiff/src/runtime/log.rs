//! Container output sinks.
//!
//! A container's own stdout and stderr, plus the few lifecycle lines the
//! controller writes for it, go to caller-supplied writers. Writes never fail
//! a lifecycle operation: every helper reports success as a `bool`.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use skiff_common::EngineError;
use tokio_util::sync::CancellationToken;

use super::engine::{LogChunk, LogStream};

/// Shared handle to a writer receiving container output.
#[derive(Clone)]
pub struct OutputStream {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputStream {
    /// Wrap a writer.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// The process's stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// The process's stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }

    /// Write raw bytes.
    pub fn write_bytes(&self, bytes: &[u8]) -> bool {
        let mut writer = self.inner.lock();
        writer.write_all(bytes).and_then(|()| writer.flush()).is_ok()
    }

    /// Write one line.
    pub fn write_line(&self, line: impl fmt::Display) -> bool {
        let mut writer = self.inner.lock();
        writeln!(writer, "{line}").and_then(|()| writer.flush()).is_ok()
    }
}

impl fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputStream").finish_non_exhaustive()
    }
}

/// The pair of output streams of one container.
#[derive(Debug, Clone, Default)]
pub struct ContainerOutput {
    stdout: Option<OutputStream>,
    stderr: Option<OutputStream>,
}

impl ContainerOutput {
    /// Create a pair; either side may be absent.
    #[must_use]
    pub const fn new(stdout: Option<OutputStream>, stderr: Option<OutputStream>) -> Self {
        Self { stdout, stderr }
    }

    /// Write a line to the stdout stream. `false` if absent or failed.
    pub fn log_stdout(&self, line: impl fmt::Display) -> bool {
        self.stdout.as_ref().is_some_and(|s| s.write_line(line))
    }

    /// Write a line to the stderr stream. `false` if absent or failed.
    pub fn log_stderr(&self, line: impl fmt::Display) -> bool {
        self.stderr.as_ref().is_some_and(|s| s.write_line(line))
    }

    /// Write an error to the stderr stream behind a highlighted prefix.
    pub fn log_error(&self, err: &dyn std::error::Error, context: Option<&str>) -> bool {
        let prefix = console::style("ERROR:").red().bright();
        match context {
            Some(context) => self.log_stderr(format_args!("{prefix} {context}: {err}")),
            None => self.log_stderr(format_args!("{prefix} {err}")),
        }
    }

    fn write_chunk(&self, chunk: &LogChunk) {
        let (stream, bytes) = match chunk {
            LogChunk::Stdout(bytes) => (&self.stdout, bytes),
            LogChunk::Stderr(bytes) => (&self.stderr, bytes),
        };

        if let Some(stream) = stream {
            let _ = stream.write_bytes(bytes);
        }
    }
}

/// Copy a container's log stream into its output streams.
///
/// Returns `Ok` on cancellation and on a clean end of stream.
///
/// # Errors
///
/// Returns the first read error of the stream.
pub async fn copy_logs(
    mut stream: LogStream,
    output: &ContainerOutput,
    cancel: CancellationToken,
) -> Result<(), EngineError> {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => return Ok(()),
            chunk = stream.next() => match chunk {
                Some(Ok(chunk)) => output.write_chunk(&chunk),
                Some(Err(e)) => return Err(e),
                None => return Ok(()),
            },
        }
    }
}
