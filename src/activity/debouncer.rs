use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::suppress::SuppressGuard;
use crate::canvas::{MutationEvent, MutationSource};

/// What the debouncer reports to its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySignal {
    /// A qualifying user mutation arrived. Hosts use this to cancel an
    /// in-flight generation: new work invalidates the in-flight answer.
    Activity,
    /// The canvas has been quiet for the configured period.
    Quiet,
}

/// Watches the mutation feed and emits `Quiet` once activity has stopped for
/// `quiet_period`. Perpetual watch: after firing, the countdown re-arms
/// immediately. Suppressed events (self-caused pipeline writes) neither reset
/// nor start the countdown.
pub struct ActivityDebouncer {
    shutdown: CancellationToken,
}

impl ActivityDebouncer {
    pub fn arm(
        mut events: broadcast::Receiver<MutationEvent>,
        suppress: Arc<SuppressGuard>,
        quiet_period: Duration,
        signals: mpsc::Sender<ActivitySignal>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let guard = shutdown.clone();

        tokio::spawn(async move {
            let mut deadline: Option<Instant> = None;
            loop {
                let countdown = async {
                    match deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                };
                tokio::select! {
                    _ = guard.cancelled() => break,
                    _ = countdown => {
                        trace!("quiet period elapsed");
                        if signals.send(ActivitySignal::Quiet).await.is_err() {
                            break;
                        }
                        deadline = Some(Instant::now() + quiet_period);
                    }
                    event = events.recv() => match event {
                        Ok(ev) if ev.source == MutationSource::User => {
                            if suppress.active() {
                                debug!("ignoring self-caused mutation");
                                continue;
                            }
                            deadline = Some(Instant::now() + quiet_period);
                            if signals.send(ActivitySignal::Activity).await.is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            debug!(skipped = n, "mutation feed lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
            trace!("debouncer stopped");
        });

        Self { shutdown }
    }

    /// Cancels the watch task. Any pending countdown dies with it; no callback
    /// fires after disarm.
    pub fn disarm(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for ActivityDebouncer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
