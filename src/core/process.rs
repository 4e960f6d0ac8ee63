//! Child process boundary
//!
//! The session talks to its backend only through [`ProcessHandle`], which is
//! produced by a [`ProcessFactory`]. The real implementation spawns the
//! program with all three standard streams piped and pumps its output from
//! background reader threads.

use std::io::{self, Read, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("Command not found: {program}")]
    NotFound { program: String },

    #[error("Failed to spawn {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Child process has no {0} pipe")]
    MissingPipe(&'static str),
}

/// Output channel of the child process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

/// Something the child process did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// Raw bytes read from one output channel
    Output { channel: Channel, bytes: Vec<u8> },
    /// The process exited and both output channels are drained
    Exited { code: Option<i32> },
}

/// Handle to a running child process
pub trait ProcessHandle {
    /// Write bytes to the child's stdin
    fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Next pending event, without blocking
    fn try_event(&mut self) -> Option<ProcessEvent>;

    /// Ask the process to terminate
    fn kill(&mut self) -> io::Result<()>;
}

/// Creates the process handle for a session
pub trait ProcessFactory {
    fn spawn(&mut self) -> Result<Box<dyn ProcessHandle>, SpawnError>;
}

/// Spawns a program with piped stdin/stdout/stderr
#[derive(Debug, Clone)]
pub struct PipeSpawner {
    program: String,
    args: Vec<String>,
}

impl PipeSpawner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl ProcessFactory for PipeSpawner {
    fn spawn(&mut self) -> Result<Box<dyn ProcessHandle>, SpawnError> {
        let child = ChildProcess::spawn(&self.program, &self.args)?;
        Ok(Box::new(child))
    }
}

/// Interval between exit checks once both output pipes are closed
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A child process connected through pipes
pub struct ChildProcess {
    child: Arc<Mutex<Child>>,
    /// Queue feeding the stdin writer thread
    stdin: Option<Sender<Vec<u8>>>,
    events: Receiver<ProcessEvent>,
    #[allow(dead_code)]
    waiter: JoinHandle<()>,
}

impl ChildProcess {
    /// Spawn `program` with `args`, piping all standard streams
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, SpawnError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => SpawnError::NotFound {
                    program: program.to_string(),
                },
                _ => SpawnError::Io {
                    program: program.to_string(),
                    source,
                },
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (stdin, stdout, stderr) = match (stdin, stdout, stderr) {
            (Some(i), Some(o), Some(e)) => (i, o, e),
            (None, _, _) => return Err(reap(child, SpawnError::MissingPipe("stdin"))),
            (_, None, _) => return Err(reap(child, SpawnError::MissingPipe("stdout"))),
            (_, _, None) => return Err(reap(child, SpawnError::MissingPipe("stderr"))),
        };

        info!("Spawned {} (pid {})", program, child.id());

        let (tx, rx) = mpsc::channel::<ProcessEvent>();
        let readers = vec![
            spawn_reader(stdout, Channel::Stdout, tx.clone()),
            spawn_reader(stderr, Channel::Stderr, tx.clone()),
        ];

        let child = Arc::new(Mutex::new(child));
        let waiter = spawn_waiter(child.clone(), readers, tx);
        let stdin = spawn_writer(stdin);

        Ok(Self {
            child,
            stdin: Some(stdin),
            events: rx,
            waiter,
        })
    }
}

impl ProcessHandle for ChildProcess {
    /// Queue bytes for the writer thread; never blocks on the pipe
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let closed = || io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed");
        match self.stdin.as_ref() {
            Some(stdin) => stdin.send(data.to_vec()).map_err(|_| closed()),
            None => Err(closed()),
        }
    }

    fn try_event(&mut self) -> Option<ProcessEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        // Writer thread closes stdin once its queue is drained
        self.stdin = None;
        let mut child = self
            .child
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "child lock poisoned"))?;
        child.kill()
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        self.stdin = None;
        if let Ok(mut child) = self.child.lock() {
            if let Ok(None) = child.try_wait() {
                let _ = child.kill();
            }
        }
    }
}

/// Kill and reap a half-initialized child, passing the error through
fn reap(mut child: Child, err: SpawnError) -> SpawnError {
    let _ = child.kill();
    let _ = child.wait();
    err
}

/// Drain queued input into the child's stdin, in submission order.
///
/// Ends when the sender is dropped or the pipe breaks; either way the
/// `ChildStdin` is dropped so the child sees EOF.
fn spawn_writer(mut stdin: ChildStdin) -> Sender<Vec<u8>> {
    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    thread::spawn(move || {
        for data in rx {
            if let Err(e) = stdin.write_all(&data).and_then(|_| stdin.flush()) {
                debug!("stdin write failed: {}", e);
                break;
            }
        }
    });
    tx
}

/// Read one output pipe until EOF, forwarding chunks in order
fn spawn_reader<R>(mut pipe: R, channel: Channel, tx: Sender<ProcessEvent>) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buffer = vec![0u8; 4096];

        loop {
            match pipe.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    let event = ProcessEvent::Output {
                        channel,
                        bytes: buffer[..n].to_vec(),
                    };
                    if tx.send(event).is_err() {
                        // Receiver gone, session was dropped
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("{:?} read failed: {}", channel, e);
                    break;
                }
            }
        }
    })
}

/// Wait for both readers to hit EOF, then for the process to exit.
///
/// `Exited` is sent last so every output chunk is already queued ahead of it.
fn spawn_waiter(
    child: Arc<Mutex<Child>>,
    readers: Vec<JoinHandle<()>>,
    tx: Sender<ProcessEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for reader in readers {
            let _ = reader.join();
        }

        let code = loop {
            let status = match child.lock() {
                Ok(mut child) => child.try_wait(),
                Err(_) => break None,
            };
            match status {
                Ok(Some(status)) => break status.code(),
                Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
                Err(e) => {
                    debug!("try_wait failed: {}", e);
                    break None;
                }
            }
        };

        info!("Child exited with code {:?}", code);
        let _ = tx.send(ProcessEvent::Exited { code });
    })
}
