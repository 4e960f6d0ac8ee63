//! Process session
//!
//! Owns the backend process handle and the transcript its output feeds.

use tracing::{debug, info, warn};

use super::process::{Channel, ProcessEvent, ProcessFactory, ProcessHandle, SpawnError};
use super::transcript::{DisplayLine, StreamDecoder, Transcript};

/// Lifecycle of the backend process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Terminated,
}

/// A running backend process and its transcript
pub struct ProcessSession {
    /// Process handle
    handle: Box<dyn ProcessHandle>,
    /// Combined output of both channels
    transcript: Transcript,
    /// Current lifecycle state
    state: SessionState,
    /// Line appended once the process exits
    sentinel: String,
    /// Set once `stop()` signaled the process
    stopped: bool,
    /// Exit code reported by the process, if any
    exit_code: Option<i32>,
    stdout_decoder: StreamDecoder,
    stderr_decoder: StreamDecoder,
}

impl ProcessSession {
    /// Spawn the backend through `factory`.
    ///
    /// Spawning is attempted exactly once; the error is returned to the
    /// caller rather than retried.
    pub fn start(
        factory: &mut dyn ProcessFactory,
        sentinel: impl Into<String>,
    ) -> Result<Self, SpawnError> {
        let handle = factory.spawn()?;
        Ok(Self {
            handle,
            transcript: Transcript::new(),
            state: SessionState::Running,
            sentinel: sentinel.into(),
            stopped: false,
            exit_code: None,
            stdout_decoder: StreamDecoder::new(),
            stderr_decoder: StreamDecoder::new(),
        })
    }

    /// Drain pending process events into the transcript (non-blocking).
    ///
    /// Returns true if the transcript or state changed.
    pub fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Some(event) = self.handle.try_event() {
            match event {
                ProcessEvent::Output { channel, bytes } => {
                    if self.state == SessionState::Terminated {
                        continue;
                    }
                    let text = self.decoder(channel).decode(&bytes);
                    if self.transcript.append(&text) > 0 {
                        changed = true;
                    }
                }
                ProcessEvent::Exited { code } => {
                    if self.mark_terminated(code) {
                        changed = true;
                    }
                }
            }
        }
        changed
    }

    /// Transition to `Terminated`, appending the sentinel.
    ///
    /// Only the first call has any effect.
    fn mark_terminated(&mut self, code: Option<i32>) -> bool {
        if self.state == SessionState::Terminated {
            debug!("Ignoring repeated exit event ({:?})", code);
            return false;
        }

        // Flush partial characters held by the decoders
        let tail = self.stdout_decoder.finish();
        self.transcript.append(&tail);
        let tail = self.stderr_decoder.finish();
        self.transcript.append(&tail);

        self.transcript.push_line(self.sentinel.clone());
        self.state = SessionState::Terminated;
        self.exit_code = code;
        info!("Session terminated (exit code {:?})", code);
        true
    }

    fn decoder(&mut self, channel: Channel) -> &mut StreamDecoder {
        match channel {
            Channel::Stdout => &mut self.stdout_decoder,
            Channel::Stderr => &mut self.stderr_decoder,
        }
    }

    /// Write `text` plus a newline to the process's stdin.
    ///
    /// Dropped silently once the session is terminated or stopped.
    pub fn send(&mut self, text: &str) {
        if self.state == SessionState::Terminated || self.stopped {
            warn!("Discarding input, backend is not running: {:?}", text);
            return;
        }

        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        if let Err(e) = self.handle.write(line.as_bytes()) {
            // The exit event usually follows shortly
            warn!("Failed to write to backend: {}", e);
        }
    }

    /// Signal the process to terminate. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        if let Err(e) = self.handle.kill() {
            debug!("Ignoring kill failure: {}", e);
        }
    }

    /// Append a line that did not come from the process
    pub fn note(&mut self, text: &str) {
        self.transcript.append(text);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    #[allow(dead_code)]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    #[allow(dead_code)]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// The last `limit` transcript lines
    pub fn snapshot(&self, limit: usize) -> &[DisplayLine] {
        self.transcript.snapshot(limit)
    }
}
