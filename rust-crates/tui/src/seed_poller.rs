use crate::{
    controller::AppEvent,
    game_client::GameContract,
    view_model::SessionKey,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::{
        mpsc,
        oneshot,
    },
    task::JoinHandle,
    time::{
        self,
        Instant,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    warn,
};

/// Background re-read of one session until its seed is ready.
///
/// The task is keyed to a [`SessionKey`]; it exits on its own when a read
/// shows the session inactive, seeded, or replaced, and is cancelled when the
/// handle is dropped.
pub struct SeedPoller {
    key: SessionKey,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl SeedPoller {
    pub fn spawn<C: GameContract>(
        contract: Arc<C>,
        key: SessionKey,
        interval: Duration,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        debug!(player = %key.player, round = key.round_id, "seed poller started");
        let handle = tokio::spawn(seed_worker(contract, key, interval, shutdown_rx, events));
        Self {
            key,
            shutdown: Some(shutdown_tx),
            handle,
        }
    }

    pub fn key(&self) -> SessionKey {
        self.key
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    pub fn cancel(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
            debug!(player = %self.key.player, "seed poller cancelled");
        }
        self.handle.abort();
    }
}

impl Drop for SeedPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn seed_worker<C: GameContract>(
    contract: Arc<C>,
    key: SessionKey,
    interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<AppEvent>,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                let session = match contract.session(key.player).await {
                    Ok(session) => session,
                    Err(err) => {
                        warn!(?err, "seed readiness poll failed");
                        continue;
                    }
                };
                let finished = !session.active
                    || session.seed_ready
                    || SessionKey::of(&session) != key;
                if events.send(AppEvent::SessionPolled { key, session }).is_err() {
                    break;
                }
                if finished {
                    debug!(player = %key.player, "seed poller finished");
                    break;
                }
            }
        }
    }
}
