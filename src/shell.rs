//! Session shell
//!
//! The façade the renderer talks to: one backend session, one submission
//! controller, and the read-only view of both.

use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::core::process::{ProcessFactory, SpawnError};
use crate::core::session::{ProcessSession, SessionState};
use crate::core::submission::{SubmissionController, SubmissionState, DEFAULT_BUSY_DELAY};
use crate::core::transcript::{DisplayLine, DEFAULT_SNAPSHOT_LIMIT};

/// Knobs for a shell, usually filled from [`crate::config::Config`]
#[derive(Debug, Clone)]
pub struct ShellOptions {
    /// Line appended when the backend exits
    pub sentinel: String,
    /// Lines exposed through `snapshot()`
    pub transcript_limit: usize,
    /// How long the busy indicator stays up after a submission
    pub busy_delay: Duration,
    /// Also log submitted text into the transcript
    pub echo_input: bool,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            sentinel: "👋 nlbt exited".to_string(),
            transcript_limit: DEFAULT_SNAPSHOT_LIMIT,
            busy_delay: DEFAULT_BUSY_DELAY,
            echo_input: false,
        }
    }
}

/// Backend slot: either a live session or the reason it never started
enum Backend {
    Live(ProcessSession),
    Failed(SpawnError),
}

pub struct SessionShell {
    backend: Backend,
    submission: SubmissionController,
    options: ShellOptions,
}

impl SessionShell {
    /// Start the backend through `factory`.
    ///
    /// A spawn failure does not fail construction; it is kept and exposed
    /// through [`SessionShell::spawn_error`] so the view can show it.
    pub fn new(factory: &mut dyn ProcessFactory, options: ShellOptions) -> Self {
        let backend = match ProcessSession::start(factory, options.sentinel.clone()) {
            Ok(session) => {
                info!("Backend started");
                Backend::Live(session)
            }
            Err(e) => {
                error!("Failed to start backend: {}", e);
                Backend::Failed(e)
            }
        };

        Self {
            backend,
            submission: SubmissionController::new(options.busy_delay),
            options,
        }
    }

    /// Submit a committed line of input
    pub fn submit(&mut self, text: &str) {
        self.submit_at(text, Instant::now());
    }

    pub fn submit_at(&mut self, text: &str, now: Instant) {
        self.submission.submit(now);

        if let Backend::Live(session) = &mut self.backend {
            if self.options.echo_input && session.is_running() {
                session.note(&format!("> {}", text));
            }
            session.send(text);
        } else {
            debug!("No backend, dropping input {:?}", text);
        }
    }

    /// Advance the shell: drain backend output and fire due busy resets.
    ///
    /// Returns true if anything visible changed.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> bool {
        let mut changed = false;

        if let Backend::Live(session) = &mut self.backend {
            let was_running = session.is_running();
            changed |= session.pump();
            if was_running && !session.is_running() {
                // Backend exited on its own; release the handle
                session.stop();
            }
        }

        changed |= self.submission.tick(now);
        changed
    }

    /// Release the backend. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Backend::Live(session) = &mut self.backend {
            session.stop();
        }
    }

    /// Most recent transcript lines, capped at the configured limit
    pub fn snapshot(&self) -> &[DisplayLine] {
        match &self.backend {
            Backend::Live(session) => session.snapshot(self.options.transcript_limit),
            Backend::Failed(_) => &[],
        }
    }

    #[allow(dead_code)]
    pub fn submission_state(&self) -> SubmissionState {
        self.submission.state()
    }

    pub fn is_busy(&self) -> bool {
        self.submission.is_busy()
    }

    /// Backend state; `None` if it never started
    pub fn session_state(&self) -> Option<SessionState> {
        match &self.backend {
            Backend::Live(session) => Some(session.state()),
            Backend::Failed(_) => None,
        }
    }

    /// True once the backend has exited or failed to start
    pub fn is_terminated(&self) -> bool {
        self.session_state() != Some(SessionState::Running)
    }

    pub fn spawn_error(&self) -> Option<&SpawnError> {
        match &self.backend {
            Backend::Live(_) => None,
            Backend::Failed(e) => Some(e),
        }
    }

    /// When the next busy reset is due, for bounding the event poll
    pub fn next_deadline(&self) -> Option<Instant> {
        self.submission.next_deadline()
    }
}

impl Drop for SessionShell {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::process::Channel;
    use crate::core::testing::{FakeFactory, FakeProcess};

    const MS: Duration = Duration::from_millis(1);

    fn shell_with(options: ShellOptions) -> (SessionShell, FakeProcess) {
        let mut factory = FakeFactory::new();
        let fake = factory.process();
        let shell = SessionShell::new(&mut factory, options);
        (shell, fake)
    }

    fn shell() -> (SessionShell, FakeProcess) {
        shell_with(ShellOptions::default())
    }

    #[test]
    fn test_construction_starts_backend() {
        let (shell, _fake) = shell();
        assert_eq!(shell.session_state(), Some(SessionState::Running));
        assert_eq!(shell.submission_state(), SubmissionState::Idle);
        assert!(shell.spawn_error().is_none());
        assert!(!shell.is_terminated());
    }

    #[test]
    fn test_submit_busy_then_idle() {
        let (mut shell, fake) = shell();
        let t0 = Instant::now();

        shell.submit_at("hello", t0);
        assert_eq!(shell.submission_state(), SubmissionState::Busy);
        assert_eq!(fake.written(), "hello\n");

        // Backend silent; the indicator still clears on schedule
        assert!(!shell.tick_at(t0 + 50 * MS));
        assert!(shell.is_busy());
        assert!(shell.tick_at(t0 + 100 * MS));
        assert_eq!(shell.submission_state(), SubmissionState::Idle);
    }

    #[test]
    fn test_rapid_submissions_in_order() {
        let (mut shell, fake) = shell();
        let t0 = Instant::now();

        shell.submit_at("one", t0);
        shell.submit_at("two", t0 + 30 * MS);
        assert_eq!(fake.written(), "one\ntwo\n");

        shell.tick_at(t0 + 100 * MS);
        assert!(shell.is_busy());
        assert_eq!(shell.next_deadline(), Some(t0 + 130 * MS));

        shell.tick_at(t0 + 130 * MS);
        assert!(!shell.is_busy());
    }

    #[test]
    fn test_output_reaches_snapshot() {
        let (mut shell, fake) = shell();
        fake.emit(Channel::Stdout, "Ready.\n");
        fake.emit(Channel::Stderr, "warning: slow\n");

        assert!(shell.tick());
        assert_eq!(shell.snapshot(), ["Ready.", "warning: slow"]);
    }

    #[test]
    fn test_snapshot_capped() {
        let options = ShellOptions {
            transcript_limit: 3,
            ..ShellOptions::default()
        };
        let (mut shell, fake) = shell_with(options);
        fake.emit(Channel::Stdout, "1\n2\n3\n4\n5\n");
        shell.tick();
        assert_eq!(shell.snapshot(), ["3", "4", "5"]);
    }

    #[test]
    fn test_exit_stops_and_freezes() {
        let (mut shell, fake) = shell();
        fake.exit(Some(0));

        assert!(shell.tick());
        assert!(shell.is_terminated());
        assert_eq!(shell.snapshot(), ["👋 nlbt exited"]);
        assert_eq!(fake.kill_count(), 1);

        // Input after exit is dropped without a trace
        shell.submit("anyone?");
        assert_eq!(fake.written(), "");
        assert_eq!(shell.snapshot().len(), 1);
        assert!(shell.is_busy());

        // Drop does not signal again
        drop(shell);
        assert_eq!(fake.kill_count(), 1);
    }

    #[test]
    fn test_drop_stops_backend() {
        let (shell, fake) = shell();
        drop(shell);
        assert_eq!(fake.kill_count(), 1);
    }

    #[test]
    fn test_shutdown_twice() {
        let (mut shell, fake) = shell();
        shell.shutdown();
        shell.shutdown();
        assert_eq!(fake.kill_count(), 1);
        assert_eq!(shell.session_state(), Some(SessionState::Running));
    }

    #[test]
    fn test_spawn_failure_surfaced() {
        let mut factory = FakeFactory::failing();
        let mut shell = SessionShell::new(&mut factory, ShellOptions::default());

        assert!(matches!(shell.spawn_error(), Some(SpawnError::NotFound { .. })));
        assert!(shell.is_terminated());
        assert!(shell.snapshot().is_empty());

        shell.submit("hi");
        assert!(shell.is_busy());
        assert_eq!(factory.spawn_count(), 1);
    }

    #[test]
    fn test_echo_input() {
        let options = ShellOptions {
            echo_input: true,
            ..ShellOptions::default()
        };
        let (mut shell, fake) = shell_with(options);
        shell.submit("2+2");
        fake.emit(Channel::Stdout, "4\n");
        shell.tick();
        assert_eq!(shell.snapshot(), ["> 2+2", "4"]);
    }
}
