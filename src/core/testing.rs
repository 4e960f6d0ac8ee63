//! In-memory process double for session and shell tests

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use super::process::{Channel, ProcessEvent, ProcessFactory, ProcessHandle, SpawnError};

#[derive(Default)]
struct FakeState {
    events: VecDeque<ProcessEvent>,
    written: Vec<u8>,
    kills: usize,
    fail_writes: bool,
    fail_kills: bool,
}

/// Test-side controller for a fake process
#[derive(Clone, Default)]
pub struct FakeProcess {
    state: Rc<RefCell<FakeState>>,
}

impl FakeProcess {
    pub fn emit(&self, channel: Channel, text: &str) {
        self.emit_bytes(channel, text.as_bytes());
    }

    pub fn emit_bytes(&self, channel: Channel, bytes: &[u8]) {
        self.state.borrow_mut().events.push_back(ProcessEvent::Output {
            channel,
            bytes: bytes.to_vec(),
        });
    }

    pub fn exit(&self, code: Option<i32>) {
        self.state
            .borrow_mut()
            .events
            .push_back(ProcessEvent::Exited { code });
    }

    /// Everything written to stdin so far
    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.state.borrow().written).into_owned()
    }

    pub fn kill_count(&self) -> usize {
        self.state.borrow().kills
    }

    pub fn fail_writes(&self) {
        self.state.borrow_mut().fail_writes = true;
    }

    pub fn fail_kills(&self) {
        self.state.borrow_mut().fail_kills = true;
    }
}

impl ProcessHandle for FakeProcess {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "fake broken pipe"));
        }
        state.written.extend_from_slice(data);
        Ok(())
    }

    fn try_event(&mut self) -> Option<ProcessEvent> {
        self.state.borrow_mut().events.pop_front()
    }

    fn kill(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.kills += 1;
        if state.fail_kills {
            return Err(io::Error::new(io::ErrorKind::Other, "fake kill failure"));
        }
        Ok(())
    }
}

/// Factory handing out a single shared [`FakeProcess`]
pub struct FakeFactory {
    process: FakeProcess,
    fail: bool,
    spawns: usize,
}

impl FakeFactory {
    pub fn new() -> Self {
        Self {
            process: FakeProcess::default(),
            fail: false,
            spawns: 0,
        }
    }

    /// A factory whose spawn always fails with `NotFound`
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    /// Controller for the process this factory spawns
    pub fn process(&self) -> FakeProcess {
        self.process.clone()
    }

    pub fn spawn_count(&self) -> usize {
        self.spawns
    }
}

impl ProcessFactory for FakeFactory {
    fn spawn(&mut self) -> Result<Box<dyn ProcessHandle>, SpawnError> {
        self.spawns += 1;
        if self.fail {
            return Err(SpawnError::NotFound {
                program: "fake".to_string(),
            });
        }
        Ok(Box::new(self.process.clone()))
    }
}
