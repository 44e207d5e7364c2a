//! Drives an [`AppController`] against the scripted fake contract. Meant for
//! tokio tests with paused time.

use claw_flip::{
    AppController,
    AppEvent,
    config::Timings,
    test_helpers::FakeGameContract,
    transaction::{
        TxKind,
        TxStatus,
    },
};
use flip_abi::{
    Address,
    SessionRecord,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time,
};

const PUMP_LIMIT: Duration = Duration::from_secs(600);

pub struct Harness {
    pub controller: AppController<FakeGameContract>,
    pub events: mpsc::UnboundedReceiver<AppEvent>,
    pub fake: Arc<FakeGameContract>,
}

impl Harness {
    /// Connected wallet with `session` on chain, after the initial refresh.
    pub async fn connected(player: Address, session: Option<SessionRecord>) -> Self {
        let fake = Arc::new(FakeGameContract::connected(player));
        fake.with(|chain| chain.session = session);
        Self::start(fake).await
    }

    pub async fn start(fake: Arc<FakeGameContract>) -> Self {
        let (mut controller, events) = AppController::new(fake.clone(), Timings::default());
        controller.refresh().await;
        Self {
            controller,
            events,
            fake,
        }
    }

    pub fn status(&self, kind: TxKind) -> TxStatus {
        self.controller
            .view()
            .transactions()
            .get(kind)
            .status()
            .clone()
    }

    /// Handles the next event the controller receives.
    pub async fn step(&mut self) {
        let event = time::timeout(PUMP_LIMIT, self.events.recv())
            .await
            .expect("no controller event arrived")
            .expect("controller event channel closed");
        self.controller.handle_event(event).await;
    }

    pub async fn pump_until(&mut self, done: impl Fn(&Self) -> bool) {
        while !done(self) {
            self.step().await;
        }
    }

    /// Handles every event that arrives within `duration`.
    pub async fn pump_for(&mut self, duration: Duration) {
        let deadline = time::Instant::now() + duration;
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(event) => self.controller.handle_event(event).await,
                    None => break,
                },
                _ = time::sleep_until(deadline) => break,
            }
        }
    }
}
