use crate::{
    config::Timings,
    entry::EntryForm,
    failure::TxFailure,
    game_client::{
        GameContract,
        Receipt,
    },
    seed_poller::SeedPoller,
    transaction::{
        TxKind,
        TxTicket,
        Transactions,
    },
    view_model::{
        Action,
        ChainState,
        GameViewModel,
        LastCall,
        Screen,
        SessionKey,
    },
};
use color_eyre::eyre::{
    Report,
    Result,
    WrapErr,
    bail,
    eyre,
};
use flip_abi::{
    Address,
    ContractWrite,
    SessionRecord,
    TxHash,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    debug,
    error,
    info,
    warn,
};

const MAX_ERRORS: usize = 50;
const CELEBRATION_STREAK: u64 = 3;
const CONNECTING_STATUS: &str = "Connecting to wallet...";

/// Everything background tasks report back to the controller.
#[derive(Debug)]
pub enum AppEvent {
    SessionPolled {
        key: SessionKey,
        session: SessionRecord,
    },
    TxAccepted {
        ticket: TxTicket,
        hash: TxHash,
    },
    TxConfirmed {
        ticket: TxTicket,
        receipt: Receipt,
    },
    TxFailed {
        ticket: TxTicket,
        raw: String,
    },
    TxExpired(TxTicket),
    CelebrationExpired(u64),
}

/// Render-ready copy of the controller state.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub contract: Address,
    pub screen: Screen,
    pub chain: ChainState,
    pub streak: u64,
    pub transactions: Transactions,
    pub enabled: Vec<Action>,
    pub claim_available: bool,
    pub celebrating: bool,
    pub last_call: Option<LastCall>,
    pub entry: EntryForm,
    pub below_minimum: bool,
    pub polling_seed: bool,
    pub status: String,
    pub errors: Vec<String>,
}

impl AppSnapshot {
    pub fn is_enabled(&self, action: Action) -> bool {
        self.enabled.contains(&action)
    }

    pub fn flip_in_flight(&self) -> bool {
        self.transactions.get(TxKind::Flip).status().in_flight()
    }
}

pub struct AppController<C: GameContract> {
    contract: Arc<C>,
    timings: Timings,
    view: GameViewModel,
    poller: Option<SeedPoller>,
    events_tx: mpsc::UnboundedSender<AppEvent>,
    entry: EntryForm,
    status: String,
    errors: Vec<String>,
    cash_out_streak: Option<u64>,
}

impl<C: GameContract> AppController<C> {
    pub fn new(contract: Arc<C>, timings: Timings) -> (Self, mpsc::UnboundedReceiver<AppEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let controller = Self {
            contract,
            timings,
            view: GameViewModel::new(),
            poller: None,
            events_tx,
            entry: EntryForm::default(),
            status: CONNECTING_STATUS.to_string(),
            errors: Vec::new(),
            cash_out_streak: None,
        };
        (controller, events_rx)
    }

    pub fn view(&self) -> &GameViewModel {
        &self.view
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn entry_form(&self) -> &EntryForm {
        &self.entry
    }

    pub fn entry_form_mut(&mut self) -> &mut EntryForm {
        &mut self.entry
    }

    /// Session currently being polled for seed readiness.
    pub fn poller_key(&self) -> Option<SessionKey> {
        self.poller
            .as_ref()
            .filter(|poller| poller.is_running())
            .map(SeedPoller::key)
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    fn push_error(&mut self, message: String) {
        self.errors.push(message);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }

    /// Records a recoverable failure without touching any tracker.
    pub fn report(&mut self, err: Report) {
        let message = format!("{err:#}");
        warn!(error = %message, "recoverable failure");
        self.push_error(message);
    }

    /// Re-reads everything the screens are derived from. Read failures keep
    /// the previous cached value.
    pub async fn refresh(&mut self) {
        let account = match self.contract.connected_account().await {
            Ok(account) => account,
            Err(err) => {
                self.report(err.wrap_err("wallet connection check failed"));
                return;
            }
        };
        if account != self.view.chain().account {
            match account {
                Some(account) => info!(%account, "wallet connected"),
                None => info!("wallet disconnected"),
            }
        }
        self.view.set_account(account);

        let contract = Arc::clone(&self.contract);
        let (round, buyback, stats, min_entry) = tokio::join!(
            contract.current_round(),
            contract.buyback_accumulator(),
            contract.stats(),
            contract.min_entry(),
        );
        match round.wrap_err("reading current round failed") {
            Ok(round) => self.view.chain_mut().round = Some(round),
            Err(err) => self.report(err),
        }
        match buyback.wrap_err("reading buyback fund failed") {
            Ok(buyback) => self.view.chain_mut().buyback = Some(buyback),
            Err(err) => self.report(err),
        }
        match stats.wrap_err("reading game stats failed") {
            Ok(stats) => self.view.chain_mut().stats = Some(stats),
            Err(err) => self.report(err),
        }
        match min_entry.wrap_err("reading minimum entry failed") {
            Ok(min_entry) => self.view.chain_mut().min_entry = Some(min_entry),
            Err(err) => self.report(err),
        }

        if let Some(player) = account {
            let (session, prize, balance) = tokio::join!(
                contract.session(player),
                contract.unclaimed_prize(player),
                contract.balance(player),
            );
            match session.wrap_err("reading session failed") {
                Ok(session) => self.view.chain_mut().session = Some(session),
                Err(err) => self.report(err),
            }
            match prize.wrap_err("reading unclaimed prize failed") {
                Ok(prize) => self.view.chain_mut().unclaimed_prize = Some(prize),
                Err(err) => self.report(err),
            }
            match balance.wrap_err("reading balance failed") {
                Ok(balance) => self.view.chain_mut().balance = Some(balance),
                Err(err) => self.report(err),
            }
        }

        if self.status == CONNECTING_STATUS {
            let status = match self.view.screen() {
                Screen::AwaitingConnection => "Waiting for a wallet account",
                _ => "Ready",
            };
            self.set_status(status);
        }
        self.sync_seed_poller();
    }

    /// Starts the write behind `action`. The returned ticket identifies this
    /// submission in later [`AppEvent`]s.
    pub fn request(&mut self, action: Action) -> Result<TxTicket> {
        let kind = action.kind();
        if !self.view.is_enabled(action) {
            bail!("{} is not available right now", kind.label());
        }
        let from = self
            .view
            .chain()
            .account
            .ok_or_else(|| eyre!("no wallet account connected"))?;
        let write = match action {
            Action::EnterGame => self.entry.to_write()?,
            Action::Flip { heads } => ContractWrite::Flip { heads },
            Action::CashOut => ContractWrite::CashOut,
            Action::ClaimPrize => ContractWrite::ClaimPrize,
        };
        let ticket = self
            .view
            .transactions_mut()
            .get_mut(kind)
            .submit()
            .ok_or_else(|| eyre!("{} already in flight", kind.label()))?;

        match action {
            Action::Flip { heads } => self.view.record_call(heads),
            Action::CashOut => self.cash_out_streak = Some(self.view.streak()),
            _ => {}
        }
        info!(call = write.name(), value = %write.value(), %from, "submitting transaction");
        self.set_status(format!("{}: confirm in wallet...", kind.label()));
        self.spawn_write(ticket, from, write);
        Ok(ticket)
    }

    fn spawn_write(&self, ticket: TxTicket, from: Address, write: ContractWrite) {
        let contract = Arc::clone(&self.contract);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let hash = match contract.submit(from, write).await {
                Ok(hash) => hash,
                Err(err) => {
                    let _ = events.send(AppEvent::TxFailed {
                        ticket,
                        raw: format!("{err:#}"),
                    });
                    return;
                }
            };
            if events.send(AppEvent::TxAccepted { ticket, hash }).is_err() {
                return;
            }
            let event = match contract.wait_for_receipt(hash).await {
                Ok(receipt) if receipt.success => AppEvent::TxConfirmed { ticket, receipt },
                Ok(receipt) => AppEvent::TxFailed {
                    ticket,
                    raw: replayed_revert(&*contract, from, write, &receipt).await,
                },
                Err(err) => AppEvent::TxFailed {
                    ticket,
                    raw: format!("{err:#}"),
                },
            };
            let _ = events.send(event);
        });
    }

    fn schedule(&self, after: Duration, event: AppEvent) {
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            time::sleep(after).await;
            let _ = events.send(event);
        });
    }

    fn celebrate(&mut self) {
        let generation = self.view.show_celebration();
        self.schedule(
            self.timings.celebration,
            AppEvent::CelebrationExpired(generation),
        );
    }

    pub async fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::SessionPolled { key, session } => {
                let current = self.poller.as_ref().map(SeedPoller::key);
                if current == Some(key) && self.view.chain().account == Some(key.player) {
                    if session.seed_ready {
                        info!(player = %key.player, "randomness ready");
                    }
                    self.view.chain_mut().session = Some(session);
                } else {
                    debug!(?key, "dropping poll result for a stale session");
                }
            }
            AppEvent::TxAccepted { ticket, hash } => {
                let tracker = self.view.transactions_mut().get_mut(ticket.kind);
                if tracker.wallet_accepted(ticket, hash) {
                    info!(kind = ?ticket.kind, %hash, "transaction broadcast");
                    self.set_status(format!("{}: confirming {hash}", ticket.kind.label()));
                }
            }
            AppEvent::TxConfirmed { ticket, receipt } => {
                self.on_confirmed(ticket, receipt).await;
            }
            AppEvent::TxFailed { ticket, raw } => {
                self.on_failed(ticket, raw);
            }
            AppEvent::TxExpired(ticket) => {
                self.view.transactions_mut().get_mut(ticket.kind).expire(ticket);
            }
            AppEvent::CelebrationExpired(generation) => {
                self.view.hide_celebration(generation);
            }
        }
        self.sync_seed_poller();
    }

    async fn on_confirmed(&mut self, ticket: TxTicket, receipt: Receipt) {
        let tracker = self.view.transactions_mut().get_mut(ticket.kind);
        if !tracker.receipt_confirmed(ticket) {
            return;
        }
        info!(
            kind = ?ticket.kind,
            hash = %receipt.hash,
            block = receipt.block_number,
            "transaction confirmed"
        );

        let player = self.view.chain().account;
        for result in receipt.flip_results(self.contract.contract_address()) {
            if Some(result.player) == player {
                self.view.record_flip_result(result);
            }
        }

        self.refresh().await;

        let status = match ticket.kind {
            TxKind::EnterGame => "Entered the game".to_string(),
            TxKind::Flip => match self.view.last_call().and_then(|c| c.outcome.as_ref()) {
                Some(outcome) if outcome.won => {
                    format!("You won! Streak: {}", outcome.new_streak)
                }
                Some(_) => "You lost the flip".to_string(),
                None => "Flip confirmed".to_string(),
            },
            TxKind::CashOut => {
                if self.cash_out_streak.take().unwrap_or_default() >= CELEBRATION_STREAK {
                    self.celebrate();
                }
                "Cashed out".to_string()
            }
            TxKind::ClaimPrize => {
                self.celebrate();
                "Prize claimed".to_string()
            }
        };
        self.set_status(status);
        self.schedule(self.timings.success_banner, AppEvent::TxExpired(ticket));
    }

    fn on_failed(&mut self, ticket: TxTicket, raw: String) {
        let failure = TxFailure::classify(&raw);
        let tracker = self.view.transactions_mut().get_mut(ticket.kind);
        if !tracker.fail(ticket, failure.clone()) {
            return;
        }
        error!(kind = ?ticket.kind, raw = %raw, %failure, "transaction failed");
        if ticket.kind == TxKind::CashOut {
            self.cash_out_streak = None;
        }
        let message = format!("{} failed: {failure}", ticket.kind.label());
        self.set_status(message.clone());
        self.push_error(message);
        self.schedule(self.timings.error_banner, AppEvent::TxExpired(ticket));
    }

    /// Keeps at most one poller alive, keyed to the session the view model
    /// is waiting on.
    fn sync_seed_poller(&mut self) {
        let wanted = self.view.awaiting_randomness_for();
        let current = self.poller.as_ref().map(SeedPoller::key);
        if wanted == current {
            return;
        }
        if let Some(poller) = self.poller.take() {
            poller.cancel();
        }
        if let Some(key) = wanted {
            self.poller = Some(SeedPoller::spawn(
                Arc::clone(&self.contract),
                key,
                self.timings.seed_poll_interval,
                self.events_tx.clone(),
            ));
        }
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            contract: self.contract.contract_address(),
            screen: self.view.screen(),
            chain: self.view.chain().clone(),
            streak: self.view.streak(),
            transactions: self.view.transactions().clone(),
            enabled: self.view.enabled_actions(),
            claim_available: self.view.claim_available(),
            celebrating: self.view.celebrating(),
            last_call: self.view.last_call().cloned(),
            entry: self.entry.clone(),
            below_minimum: self.entry.below_minimum(self.view.chain().min_entry),
            polling_seed: self.poller_key().is_some(),
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    pub fn shutdown(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.cancel();
        }
        info!("controller shut down");
    }
}

/// Message for a receipt with failed status: the endpoint's rejection of the
/// same call replayed at the receipt's block, when it gives one.
async fn replayed_revert<C: GameContract>(
    contract: &C,
    from: Address,
    write: ContractWrite,
    receipt: &Receipt,
) -> String {
    let hash = receipt.hash;
    match contract
        .revert_reason(from, write, receipt.block_number)
        .await
    {
        Ok(Some(reason)) => reason,
        Ok(None) => format!("transaction {hash} reverted on chain"),
        Err(err) => {
            warn!(%hash, error = %format!("{err:#}"), "replaying reverted transaction failed");
            format!("transaction {hash} reverted on chain")
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        test_helpers::{
            FakeGameContract,
            ReceiptOutcome,
        },
        transaction::TxStatus,
    };
    use flip_abi::test_helpers::{
        active_session,
        inactive_session,
        player_address,
    };

    async fn connected_controller(
        session: SessionRecord,
    ) -> (
        AppController<FakeGameContract>,
        mpsc::UnboundedReceiver<AppEvent>,
        Arc<FakeGameContract>,
    ) {
        let fake = Arc::new(FakeGameContract::connected(player_address()));
        fake.with(|chain| chain.session = Some(session));
        let (mut controller, events) = AppController::new(fake.clone(), Timings::default());
        controller.refresh().await;
        (controller, events, fake)
    }

    async fn pump_until(
        controller: &mut AppController<FakeGameContract>,
        events: &mut mpsc::UnboundedReceiver<AppEvent>,
        done: impl Fn(&AppController<FakeGameContract>) -> bool,
    ) {
        while !done(controller) {
            let Some(event) = events.recv().await else {
                panic!("event channel closed");
            };
            controller.handle_event(event).await;
        }
    }

    fn status_of(controller: &AppController<FakeGameContract>, kind: TxKind) -> TxStatus {
        controller.view().transactions().get(kind).status().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn request__refuses_actions_the_view_model_gates() {
        // given
        let (mut controller, _events, fake) =
            connected_controller(active_session(player_address(), 0, true)).await;

        // when
        let res = controller.request(Action::CashOut);

        // then
        assert!(res.is_err());
        assert_eq!(status_of(&controller, TxKind::CashOut), TxStatus::Idle);
        assert!(fake.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn request__invalid_referrer_never_reaches_the_wallet() {
        let (mut controller, _events, fake) =
            connected_controller(inactive_session(player_address())).await;
        controller.entry_form_mut().referrer = "0x1234".to_string();

        let res = controller.request(Action::EnterGame);

        assert!(res.is_err());
        assert_eq!(status_of(&controller, TxKind::EnterGame), TxStatus::Idle);
        time::sleep(Duration::from_secs(1)).await;
        assert!(fake.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn handle_event__stale_expiry_does_not_clear_a_newer_submission() {
        // given
        let (mut controller, mut events, fake) =
            connected_controller(inactive_session(player_address())).await;
        fake.reject_next_submit("User rejected the request.");
        let first = controller.request(Action::EnterGame).unwrap();
        pump_until(&mut controller, &mut events, |c| {
            matches!(status_of(c, TxKind::EnterGame), TxStatus::Error { .. })
        })
        .await;

        // when
        let second = controller.request(Action::EnterGame).unwrap();
        controller.handle_event(AppEvent::TxExpired(first)).await;

        // then
        assert_ne!(first, second);
        assert_eq!(status_of(&controller, TxKind::EnterGame), TxStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn handle_event__reverted_receipt_lands_in_error() {
        let (mut controller, mut events, fake) =
            connected_controller(active_session(player_address(), 1, true)).await;
        fake.queue_receipt(ReceiptOutcome::reverted());

        controller.request(Action::Flip { heads: true }).unwrap();
        pump_until(&mut controller, &mut events, |c| {
            !status_of(c, TxKind::Flip).in_flight()
        })
        .await;

        assert_eq!(
            status_of(&controller, TxKind::Flip),
            TxStatus::Error {
                failure: TxFailure::Unknown
            }
        );
        assert_eq!(
            controller.errors().last().map(String::as_str),
            Some("Flip failed: Transaction failed")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn handle_event__reverted_receipt_uses_the_replayed_reason() {
        // given
        let (mut controller, mut events, fake) =
            connected_controller(active_session(player_address(), 1, true)).await;
        fake.queue_receipt(ReceiptOutcome::reverted_with(
            "execution reverted (code 3): execution reverted: Flip cooldown active",
        ));

        // when
        controller.request(Action::Flip { heads: true }).unwrap();
        pump_until(&mut controller, &mut events, |c| {
            !status_of(c, TxKind::Flip).in_flight()
        })
        .await;

        // then
        assert_eq!(
            status_of(&controller, TxKind::Flip),
            TxStatus::Error {
                failure: TxFailure::ChainRevert("Flip cooldown active".to_string())
            }
        );
        assert_eq!(
            fake.with(|chain| chain.replays.clone()),
            vec![(ContractWrite::Flip { heads: true }, 1)]
        );
        assert_eq!(
            controller.errors().last().map(String::as_str),
            Some("Flip failed: Flip cooldown active")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn refresh__read_failure_keeps_cached_state_and_logs_error() {
        let (mut controller, _events, fake) =
            connected_controller(active_session(player_address(), 2, true)).await;
        fake.with(|chain| chain.fail_reads = Some("connection refused".to_string()));

        controller.refresh().await;

        assert_eq!(controller.view().screen(), Screen::ReadyToFlip);
        assert_eq!(controller.view().streak(), 2);
        assert_eq!(controller.errors().len(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown__cancels_the_seed_poller() {
        let (mut controller, _events, fake) =
            connected_controller(active_session(player_address(), 0, false)).await;
        assert!(controller.poller_key().is_some());
        let reads = fake.with(|chain| chain.session_reads);

        controller.shutdown();
        time::sleep(Duration::from_secs(10)).await;

        assert_eq!(controller.poller_key(), None);
        assert_eq!(fake.with(|chain| chain.session_reads), reads);
    }

    #[tokio::test(start_paused = true)]
    async fn set_account__disconnect_stops_polling() {
        let (mut controller, _events, fake) =
            connected_controller(active_session(player_address(), 0, false)).await;
        assert!(controller.poller_key().is_some());

        fake.with(|chain| chain.account = None);
        controller.refresh().await;

        assert_eq!(controller.view().screen(), Screen::AwaitingConnection);
        assert_eq!(controller.poller_key(), None);
    }
}
