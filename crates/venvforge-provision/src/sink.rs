//! Progress and output sinks injected into the pipeline.
//!
//! Nothing in this crate writes to the process-wide stdout/stderr directly;
//! hosts choose where progress lines and child-process output go.

use std::fmt;
use std::io::Write;
use std::sync::Mutex;

use tokio::sync::mpsc;

/// What a step is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Finding,
    Downloading,
    Extracting,
    Creating,
    Cleaning,
    Installing,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Finding => "Finding",
            Action::Downloading => "Downloading",
            Action::Extracting => "Extracting",
            Action::Creating => "Creating",
            Action::Cleaning => "Cleaning",
            Action::Installing => "Installing",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub action: Action,
    pub target: String,
}

impl ProgressEvent {
    pub fn new(action: Action, target: impl Into<String>) -> Self {
        Self {
            action,
            target: target.into(),
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.target)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Receives pipeline progress and raw child-process output.
///
/// Output arrives in chunks as the child produces it; chunks are not
/// line-aligned.
pub trait ProvisionSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);

    fn on_output(&self, _stream: OutputStream, _chunk: &[u8]) {}
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProvisionSink for NullSink {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Prints progress lines and forwards child output to this process's stdio.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalSink {
    /// Suppress progress lines (child output still flows).
    pub quiet: bool,
}

impl ProvisionSink for TerminalSink {
    fn on_progress(&self, event: &ProgressEvent) {
        if !self.quiet {
            let mut out = std::io::stdout().lock();
            let _ = writeln!(out, "{}", event);
        }
    }

    fn on_output(&self, stream: OutputStream, chunk: &[u8]) {
        let _ = match stream {
            OutputStream::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(chunk).and_then(|_| out.flush())
            }
            OutputStream::Stderr => {
                let mut err = std::io::stderr().lock();
                err.write_all(chunk).and_then(|_| err.flush())
            }
        };
    }
}

/// Forwards progress events to an async channel; output is discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProvisionSink for ChannelSink {
    fn on_progress(&self, event: &ProgressEvent) {
        // Receiver gone means nobody is watching.
        let _ = self.tx.send(event.clone());
    }
}

/// Captures everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ProgressEvent>>,
    stdout: Mutex<Vec<u8>>,
    stderr: Mutex<Vec<u8>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn actions(&self) -> Vec<Action> {
        self.events().into_iter().map(|e| e.action).collect()
    }

    pub fn stdout(&self) -> String {
        self.stdout
            .lock()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }

    pub fn stderr(&self) -> String {
        self.stderr
            .lock()
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default()
    }
}

impl ProvisionSink for MemorySink {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }

    fn on_output(&self, stream: OutputStream, chunk: &[u8]) {
        let buf = match stream {
            OutputStream::Stdout => &self.stdout,
            OutputStream::Stderr => &self.stderr,
        };
        if let Ok(mut buf) = buf.lock() {
            buf.extend_from_slice(chunk);
        }
    }
}
