use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{error, warn};
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::gesture::GestureGenerator;
use crate::session_management::{ActivityLog, SessionOutcome};
use crate::storage::Ledger;

/// Everything a session needs that outlives it.
///
/// Built once per process and shared behind an `Arc` by the supervisor and
/// every session it spawns.
#[derive(Debug)]
pub struct ServerContext {
    pub ledger: Ledger,
    pub activity_log: ActivityLog,
    pub generator: GestureGenerator,
    /// Pause between processing an acknowledgment and sending the next
    /// instruction.
    pub ack_delay: Duration,
    pub sessions: SessionSet,
}

impl ServerContext {
    pub fn new(
        ledger: Ledger,
        activity_log: ActivityLog,
        generator: GestureGenerator,
        ack_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            activity_log,
            generator,
            ack_delay,
            sessions: SessionSet::new(),
        })
    }
}

/// Session tasks spawned for accepted connections.
///
/// Sessions subscribe to a closing signal; once it is raised, a session
/// waiting for its next acknowledgment moves to `Closing` and runs its sweep.
/// The signal is never lowered again.
#[derive(Debug)]
pub struct SessionSet {
    tasks: Mutex<JoinSet<SessionOutcome>>,
    closing: watch::Sender<bool>,
}

impl SessionSet {
    fn new() -> Self {
        Self {
            tasks: Mutex::new(JoinSet::new()),
            closing: watch::Sender::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<SessionOutcome>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.closing.subscribe()
    }

    pub fn is_closing(&self) -> bool {
        *self.closing.borrow()
    }

    /// Runs `session` on its own task. Finished tasks are reaped on the way.
    pub fn spawn<F>(&self, session: F)
    where
        F: Future<Output = SessionOutcome> + Send + 'static,
    {
        let mut tasks = self.lock();
        while tasks.try_join_next().is_some() {}
        tasks.spawn(session);
    }

    /// Sessions spawned and not yet reaped.
    pub fn active(&self) -> usize {
        let mut tasks = self.lock();
        while tasks.try_join_next().is_some() {}
        tasks.len()
    }

    /// Asks every session to close and waits up to `grace` for their sweeps.
    /// Sessions still running after that are aborted. Returns how many
    /// sessions finished.
    pub async fn close_all(&self, grace: Duration) -> usize {
        self.closing.send_replace(true);
        let mut tasks = std::mem::take(&mut *self.lock());

        let mut closed = 0;
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(_) => closed += 1,
                    Err(e) => error!("[!] Session task failed: {}", e),
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                "[!] {} session(s) still running after {:?}, aborting",
                tasks.len(),
                grace
            );
            tasks.abort_all();
        }
        closed
    }
}
