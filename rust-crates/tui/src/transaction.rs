//! Per-action transaction lifecycle.
//!
//! ```text
//! idle --submit--> pending --walletAccepted--> confirming --receiptConfirmed--> success
//! pending|confirming --failure--> error
//! success|error --expire--> idle
//! ```
//!
//! Every submission gets a fresh generation. Events and timers carry the
//! [`TxTicket`] they were issued for, so a late event from an earlier
//! submission can never move the tracker.

use crate::failure::TxFailure;
use flip_abi::TxHash;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TxKind {
    EnterGame,
    Flip,
    CashOut,
    ClaimPrize,
}

impl TxKind {
    pub const ALL: [TxKind; 4] = [
        TxKind::EnterGame,
        TxKind::Flip,
        TxKind::CashOut,
        TxKind::ClaimPrize,
    ];

    fn index(self) -> usize {
        match self {
            TxKind::EnterGame => 0,
            TxKind::Flip => 1,
            TxKind::CashOut => 2,
            TxKind::ClaimPrize => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TxKind::EnterGame => "Enter game",
            TxKind::Flip => "Flip",
            TxKind::CashOut => "Cash out",
            TxKind::ClaimPrize => "Claim prize",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TxStatus {
    #[default]
    Idle,
    Pending,
    Confirming {
        hash: TxHash,
    },
    Success {
        hash: TxHash,
    },
    Error {
        failure: TxFailure,
    },
}

impl TxStatus {
    pub fn in_flight(&self) -> bool {
        matches!(self, TxStatus::Pending | TxStatus::Confirming { .. })
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, TxStatus::Success { .. } | TxStatus::Error { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxTicket {
    pub kind: TxKind,
    pub generation: u64,
}

#[derive(Clone, Debug)]
pub struct TxTracker {
    kind: TxKind,
    status: TxStatus,
    generation: u64,
}

impl TxTracker {
    pub fn new(kind: TxKind) -> Self {
        Self {
            kind,
            status: TxStatus::Idle,
            generation: 0,
        }
    }

    pub fn kind(&self) -> TxKind {
        self.kind
    }

    pub fn status(&self) -> &TxStatus {
        &self.status
    }

    pub fn ticket(&self) -> TxTicket {
        TxTicket {
            kind: self.kind,
            generation: self.generation,
        }
    }

    /// Starts a new submission. A settled banner is replaced rather than
    /// waited out; a submission already in flight is refused.
    pub fn submit(&mut self) -> Option<TxTicket> {
        if self.status.in_flight() {
            return None;
        }
        self.generation += 1;
        self.status = TxStatus::Pending;
        Some(self.ticket())
    }

    pub fn wallet_accepted(&mut self, ticket: TxTicket, hash: TxHash) -> bool {
        if !self.is_current(ticket) || self.status != TxStatus::Pending {
            return self.reject(ticket, "wallet_accepted");
        }
        self.status = TxStatus::Confirming { hash };
        true
    }

    pub fn receipt_confirmed(&mut self, ticket: TxTicket) -> bool {
        let TxStatus::Confirming { hash } = self.status else {
            return self.reject(ticket, "receipt_confirmed");
        };
        if !self.is_current(ticket) {
            return self.reject(ticket, "receipt_confirmed");
        }
        self.status = TxStatus::Success { hash };
        true
    }

    pub fn fail(&mut self, ticket: TxTicket, failure: TxFailure) -> bool {
        if !self.is_current(ticket) || !self.status.in_flight() {
            return self.reject(ticket, "fail");
        }
        self.status = TxStatus::Error { failure };
        true
    }

    /// Clears a settled status. The generation moves on so the write
    /// that produced it is forgotten and a retry starts clean.
    pub fn expire(&mut self, ticket: TxTicket) -> bool {
        if !self.is_current(ticket) || !self.status.is_settled() {
            return self.reject(ticket, "expire");
        }
        self.generation += 1;
        self.status = TxStatus::Idle;
        true
    }

    fn is_current(&self, ticket: TxTicket) -> bool {
        ticket.kind == self.kind && ticket.generation == self.generation
    }

    fn reject(&self, ticket: TxTicket, transition: &'static str) -> bool {
        debug!(
            kind = ?self.kind,
            ticket = ticket.generation,
            current = self.generation,
            status = ?self.status,
            transition,
            "ignoring stale transaction transition"
        );
        false
    }
}

#[derive(Clone, Debug)]
pub struct Transactions {
    trackers: [TxTracker; 4],
}

impl Default for Transactions {
    fn default() -> Self {
        Self {
            trackers: TxKind::ALL.map(TxTracker::new),
        }
    }
}

impl Transactions {
    pub fn get(&self, kind: TxKind) -> &TxTracker {
        &self.trackers[kind.index()]
    }

    pub fn get_mut(&mut self, kind: TxKind) -> &mut TxTracker {
        &mut self.trackers[kind.index()]
    }

    pub fn any_in_flight(&self) -> bool {
        self.trackers.iter().any(|t| t.status().in_flight())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TxTracker> {
        self.trackers.iter()
    }
}
