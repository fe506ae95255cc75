//! Line-oriented pipe to an engine subprocess.
//!
//! [`ProcessChannel`] owns the child process. Its stdout is drained by a
//! reader thread into an mpsc queue so that receives can give up at a
//! deadline instead of blocking on the pipe forever.

use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Instant;
use thiserror::Error;

/// Errors raised by the engine pipe.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Engine executable was not found at the specified path.
    #[error("Engine not found at path: {0}")]
    NotFound(String),
    /// The engine process could not be started.
    #[error("Failed to launch engine {path}: {source}")]
    Launch {
        path: String,
        #[source]
        source: io::Error,
    },
    /// The engine process has exited or the channel was terminated.
    #[error("Engine process has exited")]
    Closed,
    /// No line arrived before the deadline.
    #[error("Timed out waiting for engine output")]
    Timeout,
    /// Reading from or writing to the engine failed.
    #[error("Engine I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Outcome of a successful receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    /// One line of output, without its terminator.
    Line(String),
    /// The engine closed its output; no more lines will come.
    EndOfStream,
}

/// A bidirectional line protocol with a supervised process.
pub trait LineChannel: Send {
    /// Write one command followed by a newline and flush it.
    fn send_line(&mut self, text: &str) -> Result<(), ChannelError>;

    /// Wait for the next line, end of stream, or the deadline.
    ///
    /// `None` waits without limit.
    fn receive_line(&mut self, deadline: Option<Instant>) -> Result<Received, ChannelError>;

    /// Whether the process is still running.
    fn is_alive(&mut self) -> bool;

    /// Close both streams and stop the process. Safe to call repeatedly.
    fn terminate(&mut self);
}

/// Creates fresh channels; used for the first start and every restart.
pub trait Launcher: Send {
    type Channel: LineChannel;

    fn launch(&self) -> Result<Self::Channel, ChannelError>;

    /// Executable path, for reporting.
    fn path(&self) -> &str;
}

/// Launches a real engine executable.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    path: String,
}

impl ProcessLauncher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Launcher for ProcessLauncher {
    type Channel = ProcessChannel;

    fn launch(&self) -> Result<ProcessChannel, ChannelError> {
        ProcessChannel::start(&self.path)
    }

    fn path(&self) -> &str {
        &self.path
    }
}

type LineResult = io::Result<String>;

/// Pipe to a running engine subprocess.
pub struct ProcessChannel {
    /// The engine process handle.
    process: Child,
    /// Writer for sending commands; `None` once closed.
    stdin: Option<ChildStdin>,
    /// Lines forwarded by the reader thread.
    lines: Receiver<LineResult>,
    terminated: bool,
}

impl ProcessChannel {
    /// Spawn the engine with piped stdin/stdout and start the reader thread.
    ///
    /// # Errors
    ///
    /// - `ChannelError::NotFound` if the executable does not exist
    /// - `ChannelError::Launch` if the process fails to start
    pub fn start(path: &str) -> Result<Self, ChannelError> {
        let mut process = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => ChannelError::NotFound(path.to_string()),
                _ => ChannelError::Launch {
                    path: path.to_string(),
                    source,
                },
            })?;

        let (stdin, stdout) = match (process.stdin.take(), process.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = process.kill();
                let _ = process.wait();
                return Err(ChannelError::Launch {
                    path: path.to_string(),
                    source: io::Error::new(io::ErrorKind::BrokenPipe, "engine pipes unavailable"),
                });
            }
        };

        let (tx, lines) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("engine-stdout".to_string())
            .spawn(move || forward_lines(BufReader::new(stdout), tx));
        if let Err(source) = spawned {
            let _ = process.kill();
            let _ = process.wait();
            return Err(ChannelError::Launch {
                path: path.to_string(),
                source,
            });
        }

        tracing::debug!(path, pid = process.id(), "Engine process started");

        Ok(Self {
            process,
            stdin: Some(stdin),
            lines,
            terminated: false,
        })
    }
}

/// Reader thread body: forward lines until EOF, a read error, or the
/// receiving side going away.
fn forward_lines(mut reader: BufReader<ChildStdout>, tx: Sender<LineResult>) {
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
                if tx.send(Ok(trimmed)).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e));
                break;
            }
        }
    }
}

impl LineChannel for ProcessChannel {
    fn send_line(&mut self, text: &str) -> Result<(), ChannelError> {
        if self.terminated || !self.is_alive() {
            return Err(ChannelError::Closed);
        }
        let stdin = self.stdin.as_mut().ok_or(ChannelError::Closed)?;
        writeln!(stdin, "{}", text)?;
        stdin.flush()?;
        Ok(())
    }

    fn receive_line(&mut self, deadline: Option<Instant>) -> Result<Received, ChannelError> {
        if self.terminated {
            return Ok(Received::EndOfStream);
        }

        let next = match deadline {
            Some(deadline) => self
                .lines
                .recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => self.lines.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match next {
            Ok(Ok(line)) => Ok(Received::Line(line)),
            Ok(Err(e)) => Err(ChannelError::Io(e)),
            Err(RecvTimeoutError::Timeout) => Err(ChannelError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Ok(Received::EndOfStream),
        }
    }

    fn is_alive(&mut self) -> bool {
        !self.terminated && matches!(self.process.try_wait(), Ok(None))
    }

    fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        // Dropping stdin closes the engine's input.
        self.stdin = None;
        let _ = self.process.kill();
        let _ = self.process.wait();
        tracing::debug!(pid = self.process.id(), "Engine process terminated");
    }
}

impl Drop for ProcessChannel {
    fn drop(&mut self) {
        self.terminate();
    }
}
