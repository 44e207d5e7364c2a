//! Scripted in-memory [`GameContract`] for controller and end-to-end tests.

use crate::game_client::{
    GameContract,
    Receipt,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use flip_abi::{
    Address,
    ContractWrite,
    GameStats,
    Log,
    RoundRecord,
    SessionRecord,
    TxHash,
    U256,
    Wei,
    test_helpers::{
        ONE_MILLI_ETHER,
        milli_ether,
        tx_hash,
    },
};
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};
use tokio::time;

pub type ChainEffect = Box<dyn FnOnce(&mut FakeChain) + Send>;

/// How the fake resolves the next `wait_for_receipt`.
pub enum ReceiptOutcome {
    Included {
        success: bool,
        logs: Vec<Log>,
        effect: Option<ChainEffect>,
    },
    Failed(String),
}

impl ReceiptOutcome {
    pub fn success() -> Self {
        ReceiptOutcome::Included {
            success: true,
            logs: Vec::new(),
            effect: None,
        }
    }

    /// Successful inclusion that also moves the fake chain forward before
    /// anything can observe the receipt.
    pub fn success_then(effect: impl FnOnce(&mut FakeChain) + Send + 'static) -> Self {
        ReceiptOutcome::Included {
            success: true,
            logs: Vec::new(),
            effect: Some(Box::new(effect)),
        }
    }

    pub fn with_logs(logs: Vec<Log>) -> Self {
        ReceiptOutcome::Included {
            success: true,
            logs,
            effect: None,
        }
    }

    pub fn reverted() -> Self {
        ReceiptOutcome::Included {
            success: false,
            logs: Vec::new(),
            effect: None,
        }
    }

    /// Reverted inclusion whose replay at the receipt's block is rejected
    /// with `message`.
    pub fn reverted_with(message: impl Into<String>) -> Self {
        let message = message.into();
        ReceiptOutcome::Included {
            success: false,
            logs: Vec::new(),
            effect: Some(Box::new(move |chain| chain.replay_error = Some(message))),
        }
    }
}

pub struct FakeChain {
    pub contract: Address,
    pub account: Option<Address>,
    pub session: Option<SessionRecord>,
    pub scripted_sessions: VecDeque<SessionRecord>,
    pub round: RoundRecord,
    pub unclaimed_prize: Wei,
    pub balance: Wei,
    pub buyback: Wei,
    pub min_entry: Wei,
    pub stats: GameStats,
    pub fail_reads: Option<String>,
    /// `Err(message)` makes the wallet refuse the next submission.
    pub submit_outcomes: VecDeque<Result<(), String>>,
    pub receipt_outcomes: VecDeque<ReceiptOutcome>,
    pub submit_delay: Duration,
    pub receipt_delay: Duration,
    pub writes: Vec<(Address, ContractWrite)>,
    /// Rejection message returned by the next revert replay.
    pub replay_error: Option<String>,
    pub replays: Vec<(ContractWrite, u64)>,
    pub session_reads: usize,
    pub round_reads: usize,
    pub prize_reads: usize,
    pub balance_reads: usize,
    next_hash: u8,
}

impl Default for FakeChain {
    fn default() -> Self {
        Self {
            contract: Address::repeat_byte(0x11),
            account: None,
            session: None,
            scripted_sessions: VecDeque::new(),
            round: RoundRecord::default(),
            unclaimed_prize: U256::ZERO,
            balance: milli_ether(100),
            buyback: U256::ZERO,
            min_entry: ONE_MILLI_ETHER,
            stats: GameStats::default(),
            fail_reads: None,
            submit_outcomes: VecDeque::new(),
            receipt_outcomes: VecDeque::new(),
            submit_delay: Duration::from_millis(100),
            receipt_delay: Duration::from_millis(500),
            writes: Vec::new(),
            replay_error: None,
            replays: Vec::new(),
            session_reads: 0,
            round_reads: 0,
            prize_reads: 0,
            balance_reads: 0,
            next_hash: 1,
        }
    }
}

impl FakeChain {
    fn read_guard(&self) -> Result<()> {
        match &self.fail_reads {
            Some(message) => Err(eyre!(message.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeGameContract {
    state: Arc<Mutex<FakeChain>>,
}

impl FakeGameContract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(account: Address) -> Self {
        let fake = Self::default();
        fake.with(|chain| chain.account = Some(account));
        fake
    }

    fn lock(&self) -> MutexGuard<'_, FakeChain> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut FakeChain) -> R) -> R {
        f(&mut self.lock())
    }

    /// Sessions returned by upcoming `session` reads, in order. Each one also
    /// becomes the chain's current session.
    pub fn queue_session_reads(&self, sessions: impl IntoIterator<Item = SessionRecord>) {
        self.lock().scripted_sessions.extend(sessions);
    }

    pub fn queue_receipt(&self, outcome: ReceiptOutcome) {
        self.lock().receipt_outcomes.push_back(outcome);
    }

    pub fn reject_next_submit(&self, message: impl Into<String>) {
        self.lock().submit_outcomes.push_back(Err(message.into()));
    }

    pub fn writes(&self) -> Vec<ContractWrite> {
        self.lock().writes.iter().map(|(_, write)| *write).collect()
    }
}

impl GameContract for FakeGameContract {
    fn contract_address(&self) -> Address {
        self.lock().contract
    }

    async fn connected_account(&self) -> Result<Option<Address>> {
        Ok(self.lock().account)
    }

    async fn session(&self, player: Address) -> Result<SessionRecord> {
        let mut chain = self.lock();
        chain.read_guard()?;
        chain.session_reads += 1;
        if let Some(next) = chain.scripted_sessions.pop_front() {
            chain.session = Some(next);
        }
        Ok(chain
            .session
            .clone()
            .unwrap_or_else(|| SessionRecord::empty(player)))
    }

    async fn current_round(&self) -> Result<RoundRecord> {
        let mut chain = self.lock();
        chain.read_guard()?;
        chain.round_reads += 1;
        Ok(chain.round.clone())
    }

    async fn unclaimed_prize(&self, _player: Address) -> Result<Wei> {
        let mut chain = self.lock();
        chain.read_guard()?;
        chain.prize_reads += 1;
        Ok(chain.unclaimed_prize)
    }

    async fn buyback_accumulator(&self) -> Result<Wei> {
        let chain = self.lock();
        chain.read_guard()?;
        Ok(chain.buyback)
    }

    async fn min_entry(&self) -> Result<Wei> {
        let chain = self.lock();
        chain.read_guard()?;
        Ok(chain.min_entry)
    }

    async fn stats(&self) -> Result<GameStats> {
        let chain = self.lock();
        chain.read_guard()?;
        Ok(chain.stats.clone())
    }

    async fn balance(&self, _account: Address) -> Result<Wei> {
        let mut chain = self.lock();
        chain.read_guard()?;
        chain.balance_reads += 1;
        Ok(chain.balance)
    }

    async fn submit(&self, from: Address, write: ContractWrite) -> Result<TxHash> {
        let delay = self.lock().submit_delay;
        time::sleep(delay).await;
        let mut chain = self.lock();
        if let Some(Err(message)) = chain.submit_outcomes.pop_front() {
            return Err(eyre!(message));
        }
        chain.writes.push((from, write));
        let hash = tx_hash(chain.next_hash);
        chain.next_hash = chain.next_hash.wrapping_add(1);
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> Result<Receipt> {
        let delay = self.lock().receipt_delay;
        time::sleep(delay).await;
        let mut chain = self.lock();
        let outcome = chain
            .receipt_outcomes
            .pop_front()
            .unwrap_or_else(ReceiptOutcome::success);
        match outcome {
            ReceiptOutcome::Included {
                success,
                logs,
                effect,
            } => {
                if let Some(effect) = effect {
                    effect(&mut chain);
                }
                Ok(Receipt {
                    hash,
                    success,
                    block_number: 1,
                    logs,
                })
            }
            ReceiptOutcome::Failed(message) => Err(eyre!(message)),
        }
    }

    async fn revert_reason(
        &self,
        _from: Address,
        write: ContractWrite,
        block: u64,
    ) -> Result<Option<String>> {
        let mut chain = self.lock();
        chain.replays.push((write, block));
        Ok(chain.replay_error.take())
    }
}
