//! Core session controller.
//!
//! This module contains everything that has real state:
//!
//! - **transcript**: append-only line log and per-channel UTF-8 decoding
//! - **process**: process handle traits and the pipe-backed child process
//! - **session**: backend lifecycle, feeding process output into the transcript
//! - **submission**: Busy/Idle indicator around each submission
//!
//! # Architecture
//!
//! ```text
//! ProcessSession
//! ├── Box<dyn ProcessHandle> (stdin writer + output/exit events)
//! │   └── ChildProcess: reader threads → mpsc → try_event()
//! └── Transcript
//!     └── StreamDecoder per output channel
//!
//! SubmissionController (deadline-driven, ticked by the event loop)
//! ```

pub mod process;
pub mod session;
pub mod submission;
pub mod transcript;

#[cfg(test)]
pub mod testing;
