//! Periodic autosave for sessions with write access.

use crate::bridge::PersistenceBridge;
use crate::session::{Session, SessionEffect};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a running autosave task. Dropping it stops the task.
#[derive(Debug)]
pub struct AutosaveHandle {
    task: JoinHandle<()>,
}

impl AutosaveHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// `true` once the task stopped on its own or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Save `session` through `bridge` every `period`.
///
/// Ticks are skipped while the session has no write token, so the task
/// follows the token: it goes idle after a reset or a read-only load and
/// resumes once a save or load provides one. A tick is also skipped while
/// another save (or a load) is outstanding. Failed saves do not change the
/// cadence. The task runs until its handle is cancelled or dropped. Effects of each save are sent to
/// `effects`; a closed receiver is ignored.
pub fn spawn_autosave<B>(
    session: Arc<Mutex<Session>>,
    bridge: Arc<B>,
    period: Duration,
    effects: mpsc::UnboundedSender<SessionEffect>,
) -> AutosaveHandle
where
    B: PersistenceBridge + 'static,
{
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        let mut failures = 0u32;
        let mut idle = false;
        loop {
            ticker.tick().await;

            let ticket = {
                let mut session = session.lock().await;
                let writable = session.loading().token_to_write.is_some();
                if writable == idle {
                    idle = !writable;
                    log::info!("autosave {}", if idle { "idle: no write token" } else { "resumed" });
                }
                if idle {
                    continue;
                }
                session.begin_save(false)
            };
            let Some(ticket) = ticket else {
                log::debug!("autosave tick skipped");
                continue;
            };

            let result = bridge.write(ticket.tokens(), ticket.log()).await;
            if result.is_ok() {
                failures = 0;
            } else {
                failures += 1;
                log::warn!("autosave failed ({failures} in a row)");
            }

            let produced = session.lock().await.finish_save(ticket, result);
            for effect in produced {
                let _ = effects.send(effect);
            }
        }
    });
    AutosaveHandle { task }
}
