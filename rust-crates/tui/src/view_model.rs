//! Derives the discrete game screen and the set of valid player actions
//! from cached chain state and the four transaction trackers.

use crate::transaction::{
    TxKind,
    Transactions,
};
use flip_abi::{
    Address,
    FlipResult,
    GameStats,
    RoundRecord,
    SessionRecord,
    Wei,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    AwaitingConnection,
    Entry,
    AwaitingRandomness,
    ReadyToFlip,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    EnterGame,
    Flip { heads: bool },
    CashOut,
    ClaimPrize,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::EnterGame,
        Action::Flip { heads: true },
        Action::Flip { heads: false },
        Action::CashOut,
        Action::ClaimPrize,
    ];

    pub fn kind(self) -> TxKind {
        match self {
            Action::EnterGame => TxKind::EnterGame,
            Action::Flip { .. } => TxKind::Flip,
            Action::CashOut => TxKind::CashOut,
            Action::ClaimPrize => TxKind::ClaimPrize,
        }
    }
}

/// Identity of one session; a new entry by the same player yields a new key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub player: Address,
    pub round_id: u64,
    pub start_time: u64,
}

impl SessionKey {
    pub fn of(session: &SessionRecord) -> Self {
        Self {
            player: session.player,
            round_id: session.round_id,
            start_time: session.start_time,
        }
    }
}

/// Client-side cache of remote state. `None` means "not read yet".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainState {
    pub account: Option<Address>,
    pub session: Option<SessionRecord>,
    pub round: Option<RoundRecord>,
    pub unclaimed_prize: Option<Wei>,
    pub balance: Option<Wei>,
    pub buyback: Option<Wei>,
    pub stats: Option<GameStats>,
    pub min_entry: Option<Wei>,
}

impl ChainState {
    pub fn connected(&self) -> bool {
        self.account.is_some()
    }
}

/// The side the player last called and, once the receipt arrives, how it
/// landed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastCall {
    pub heads: bool,
    pub outcome: Option<FlipResult>,
}

#[derive(Clone, Debug, Default)]
pub struct GameViewModel {
    chain: ChainState,
    txs: Transactions,
    celebration: Option<u64>,
    celebration_generation: u64,
    last_call: Option<LastCall>,
}

impl GameViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chain(&self) -> &ChainState {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut ChainState {
        &mut self.chain
    }

    /// Switching accounts drops everything cached for the previous one.
    pub fn set_account(&mut self, account: Option<Address>) {
        if self.chain.account != account {
            let round = self.chain.round.take();
            let buyback = self.chain.buyback.take();
            let stats = self.chain.stats.take();
            let min_entry = self.chain.min_entry.take();
            self.chain = ChainState {
                account,
                round,
                buyback,
                stats,
                min_entry,
                ..ChainState::default()
            };
            self.last_call = None;
        }
    }

    pub fn transactions(&self) -> &Transactions {
        &self.txs
    }

    pub fn transactions_mut(&mut self) -> &mut Transactions {
        &mut self.txs
    }

    /// First match wins: connection, then session activity, then seed
    /// readiness.
    pub fn screen(&self) -> Screen {
        if !self.chain.connected() {
            return Screen::AwaitingConnection;
        }
        match &self.chain.session {
            Some(session) if session.active && !session.seed_ready => {
                Screen::AwaitingRandomness
            }
            Some(session) if session.active => Screen::ReadyToFlip,
            _ => Screen::Entry,
        }
    }

    pub fn streak(&self) -> u64 {
        self.chain
            .session
            .as_ref()
            .filter(|s| s.active)
            .map(|s| s.streak)
            .unwrap_or_default()
    }

    /// Shown regardless of screen whenever the connected account has
    /// something to claim.
    pub fn claim_available(&self) -> bool {
        self.chain.connected() && !self.chain.unclaimed_prize.unwrap_or_default().is_zero()
    }

    pub fn is_enabled(&self, action: Action) -> bool {
        let screen = self.screen();
        match action {
            Action::EnterGame => {
                screen == Screen::Entry
                    && !self.txs.get(TxKind::EnterGame).status().in_flight()
            }
            Action::Flip { .. } => {
                screen == Screen::ReadyToFlip && !self.txs.any_in_flight()
            }
            Action::CashOut => {
                screen == Screen::ReadyToFlip
                    && self.streak() > 0
                    && !self.txs.any_in_flight()
            }
            Action::ClaimPrize => {
                self.claim_available()
                    && !self.txs.get(TxKind::ClaimPrize).status().in_flight()
            }
        }
    }

    pub fn enabled_actions(&self) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|action| self.is_enabled(*action))
            .collect()
    }

    /// The session whose seed readiness must be polled, if any.
    pub fn awaiting_randomness_for(&self) -> Option<SessionKey> {
        match self.screen() {
            Screen::AwaitingRandomness => self.chain.session.as_ref().map(SessionKey::of),
            _ => None,
        }
    }

    pub fn show_celebration(&mut self) -> u64 {
        self.celebration_generation += 1;
        self.celebration = Some(self.celebration_generation);
        self.celebration_generation
    }

    pub fn hide_celebration(&mut self, generation: u64) -> bool {
        if self.celebration == Some(generation) {
            self.celebration = None;
            true
        } else {
            false
        }
    }

    pub fn celebrating(&self) -> bool {
        self.celebration.is_some()
    }

    pub fn record_call(&mut self, heads: bool) {
        self.last_call = Some(LastCall {
            heads,
            outcome: None,
        });
    }

    pub fn record_flip_result(&mut self, result: FlipResult) {
        self.last_call = Some(LastCall {
            heads: result.choice_heads,
            outcome: Some(result),
        });
    }

    pub fn last_call(&self) -> Option<&LastCall> {
        self.last_call.as_ref()
    }
}
