//! Bindings for the Claw Flip game contract.
//!
//! The contract interface is declared once with [`alloy::sol!`]; calldata,
//! return data and event logs are encoded and decoded by the generated
//! types. This crate maps them onto the records the client works with.

use alloy::{
    sol,
    sol_types::{
        Revert,
        SolCall,
        SolError,
        SolEvent,
        SolType,
        sol_data,
    },
};
use std::fmt;

pub mod units;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use alloy::primitives::{
    Address,
    B256,
    Bytes,
    Log,
    LogData,
    TxHash,
    U256,
};
pub use units::{
    Wei,
    format_ether,
    parse_ether,
};

pub const ADDRESS_PREFIX: &str = "0x";

sol! {
    /// `getSession` layout of deployments with the randomness stage.
    struct GameSession {
        address player;
        uint256 entryFee;
        uint256 streak;
        uint256 randomSeed;
        uint256 flipIndex;
        uint64 startTime;
        uint256 roundId;
        address referrer;
        bool active;
        bool seedReady;
    }

    /// `getSession` layout of deployments without the randomness stage.
    struct LegacyGameSession {
        address player;
        uint256 entryFee;
        uint256 streak;
        uint256 randomSeed;
        uint256 flipIndex;
        uint64 startTime;
        uint256 roundId;
        address referrer;
        bool active;
    }

    struct GameRound {
        uint256 prizePool;
        uint256 highestStreak;
        address leader;
        uint256 participantCount;
        bool settled;
    }

    struct GameTotals {
        uint256 totalBuybackAccumulated;
        uint256 totalBuybackExecuted;
        uint256 totalPrizesDistributed;
        uint256 currentBuybackBalance;
    }

    interface IClawFlip {
        function enterGame(address referrer) external payable;
        function flip(bool heads) external;
        function cashOut() external;
        function claimPrize() external;

        function getSession(address player) external view returns (GameSession memory);
        function getCurrentRound() external view returns (GameRound memory);
        function getUnclaimedPrize(address player) external view returns (uint256);
        function buybackAccumulator() external view returns (uint256);
        function minEntry() external view returns (uint256);
        function getStats() external view returns (GameTotals memory);

        event FlipResult(
            address indexed player,
            bool choice,
            bool result,
            bool won,
            uint256 newStreak
        );
    }
}

/// topic0 of `FlipResult(address,bool,bool,bool,uint256)`
pub const FLIP_RESULT_TOPIC: B256 = IClawFlip::FlipResult::SIGNATURE_HASH;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AbiError {
    Decode { what: &'static str, reason: String },
    InvalidAmount(String),
}

impl AbiError {
    fn decode(what: &'static str, err: alloy::sol_types::Error) -> Self {
        AbiError::Decode {
            what,
            reason: err.to_string(),
        }
    }
}

impl fmt::Display for AbiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiError::Decode { what, reason } => write!(f, "invalid {what} data: {reason}"),
            AbiError::InvalidAmount(raw) => write!(f, "invalid ether amount {raw:?}"),
        }
    }
}

impl std::error::Error for AbiError {}

/// `0x1234...abcd`
pub trait ShortAddress {
    fn short(&self) -> String;
}

impl ShortAddress for Address {
    fn short(&self) -> String {
        let full = self.to_string().to_lowercase();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

/// A player's current attempt, as returned by `getSession`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionRecord {
    pub player: Address,
    pub entry_fee: Wei,
    pub streak: u64,
    pub flip_index: u64,
    pub start_time: u64,
    pub round_id: u64,
    pub referrer: Option<Address>,
    pub active: bool,
    /// Randomness for the session has been fulfilled. Deployments without
    /// the oracle stage always report `true`.
    pub seed_ready: bool,
}

impl SessionRecord {
    /// The zeroed record the contract returns for a player with no session.
    pub fn empty(player: Address) -> Self {
        Self {
            player,
            entry_fee: U256::ZERO,
            streak: 0,
            flip_index: 0,
            start_time: 0,
            round_id: 0,
            referrer: None,
            active: false,
            seed_ready: false,
        }
    }
}

impl From<GameSession> for SessionRecord {
    fn from(s: GameSession) -> Self {
        Self {
            player: s.player,
            entry_fee: s.entryFee,
            streak: counter(s.streak),
            flip_index: counter(s.flipIndex),
            start_time: s.startTime,
            round_id: counter(s.roundId),
            referrer: non_zero(s.referrer),
            active: s.active,
            seed_ready: s.seedReady,
        }
    }
}

impl From<LegacyGameSession> for SessionRecord {
    fn from(s: LegacyGameSession) -> Self {
        Self {
            player: s.player,
            entry_fee: s.entryFee,
            streak: counter(s.streak),
            flip_index: counter(s.flipIndex),
            start_time: s.startTime,
            round_id: counter(s.roundId),
            referrer: non_zero(s.referrer),
            active: s.active,
            seed_ready: true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoundRecord {
    pub prize_pool: Wei,
    pub highest_streak: u64,
    pub leader: Option<Address>,
    pub participant_count: u64,
    pub settled: bool,
}

impl From<GameRound> for RoundRecord {
    fn from(r: GameRound) -> Self {
        Self {
            prize_pool: r.prizePool,
            highest_streak: counter(r.highestStreak),
            leader: non_zero(r.leader),
            participant_count: counter(r.participantCount),
            settled: r.settled,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameStats {
    pub total_buyback_accumulated: Wei,
    pub total_buyback_executed: Wei,
    pub total_prizes_distributed: Wei,
    pub current_buyback_balance: Wei,
}

impl From<GameTotals> for GameStats {
    fn from(t: GameTotals) -> Self {
        Self {
            total_buyback_accumulated: t.totalBuybackAccumulated,
            total_buyback_executed: t.totalBuybackExecuted,
            total_prizes_distributed: t.totalPrizesDistributed,
            current_buyback_balance: t.currentBuybackBalance,
        }
    }
}

/// Decoded `FlipResult` event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlipResult {
    pub player: Address,
    pub choice_heads: bool,
    pub result_heads: bool,
    pub won: bool,
    pub new_streak: u64,
}

impl From<IClawFlip::FlipResult> for FlipResult {
    fn from(e: IClawFlip::FlipResult) -> Self {
        Self {
            player: e.player,
            choice_heads: e.choice,
            result_heads: e.result,
            won: e.won,
            new_streak: counter(e.newStreak),
        }
    }
}

/// Streaks, indices and counts are uint256 on chain but never leave `u64`
/// range in practice.
fn counter(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

fn non_zero(address: Address) -> Option<Address> {
    (!address.is_zero()).then_some(address)
}

/// The view calls the client makes, encoded through the generated bindings.
pub mod reads {
    use super::*;

    pub fn session(player: Address) -> Vec<u8> {
        IClawFlip::getSessionCall { player }.abi_encode()
    }

    pub fn current_round() -> Vec<u8> {
        IClawFlip::getCurrentRoundCall {}.abi_encode()
    }

    pub fn unclaimed_prize(player: Address) -> Vec<u8> {
        IClawFlip::getUnclaimedPrizeCall { player }.abi_encode()
    }

    pub fn buyback_accumulator() -> Vec<u8> {
        IClawFlip::buybackAccumulatorCall {}.abi_encode()
    }

    pub fn min_entry() -> Vec<u8> {
        IClawFlip::minEntryCall {}.abi_encode()
    }

    pub fn stats() -> Vec<u8> {
        IClawFlip::getStatsCall {}.abi_encode()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContractWrite {
    EnterGame { referrer: Address, value: Wei },
    Flip { heads: bool },
    CashOut,
    ClaimPrize,
}

impl ContractWrite {
    pub fn calldata(&self) -> Vec<u8> {
        match *self {
            ContractWrite::EnterGame { referrer, .. } => {
                IClawFlip::enterGameCall { referrer }.abi_encode()
            }
            ContractWrite::Flip { heads } => IClawFlip::flipCall { heads }.abi_encode(),
            ContractWrite::CashOut => IClawFlip::cashOutCall {}.abi_encode(),
            ContractWrite::ClaimPrize => IClawFlip::claimPrizeCall {}.abi_encode(),
        }
    }

    /// Native value attached to the call.
    pub fn value(&self) -> Wei {
        match self {
            ContractWrite::EnterGame { value, .. } => *value,
            _ => U256::ZERO,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ContractWrite::EnterGame { .. } => "enterGame",
            ContractWrite::Flip { .. } => "flip",
            ContractWrite::CashOut => "cashOut",
            ContractWrite::ClaimPrize => "claimPrize",
        }
    }
}

const WORD: usize = 32;
const SESSION_WORDS_WITH_SEED: usize = 10;

/// Decodes `getSession`. Nine-word payloads come from deployments without
/// the randomness stage and decode with `seed_ready == true`.
pub fn decode_session(data: &[u8]) -> Result<SessionRecord, AbiError> {
    if data.len() >= SESSION_WORDS_WITH_SEED * WORD {
        <GameSession as SolType>::abi_decode(data)
            .map(SessionRecord::from)
            .map_err(|e| AbiError::decode("getSession", e))
    } else {
        <LegacyGameSession as SolType>::abi_decode(data)
            .map(SessionRecord::from)
            .map_err(|e| AbiError::decode("getSession", e))
    }
}

pub fn decode_round(data: &[u8]) -> Result<RoundRecord, AbiError> {
    <GameRound as SolType>::abi_decode(data)
        .map(RoundRecord::from)
        .map_err(|e| AbiError::decode("getCurrentRound", e))
}

pub fn decode_stats(data: &[u8]) -> Result<GameStats, AbiError> {
    <GameTotals as SolType>::abi_decode(data)
        .map(GameStats::from)
        .map_err(|e| AbiError::decode("getStats", e))
}

pub fn decode_wei(data: &[u8]) -> Result<Wei, AbiError> {
    <sol_data::Uint<256> as SolType>::abi_decode(data).map_err(|e| AbiError::decode("uint256", e))
}

/// Returns `Ok(None)` for logs that are not `FlipResult`.
pub fn decode_flip_result(log: &LogData) -> Result<Option<FlipResult>, AbiError> {
    if log.topics().first() != Some(&FLIP_RESULT_TOPIC) {
        return Ok(None);
    }
    IClawFlip::FlipResult::decode_log_data(log)
        .map(|event| Some(event.into()))
        .map_err(|e| AbiError::decode("FlipResult", e))
}

/// Extracts the reason string from an `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    Revert::abi_decode(data).ok().map(|revert| revert.reason)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use alloy::{
        primitives::address,
        sol_types::SolValue,
    };
    use proptest::prelude::*;

    fn player() -> Address {
        address!("00000000000000000000000000000000000000aa")
    }

    fn session(active: bool, seed_ready: bool) -> GameSession {
        GameSession {
            player: player(),
            entryFee: U256::from(1_000_000_000_000_000u64),
            streak: U256::from(4),
            randomSeed: U256::MAX,
            flipIndex: U256::from(7),
            startTime: 1_700_000_000,
            roundId: U256::from(12),
            referrer: Address::ZERO,
            active,
            seedReady: seed_ready,
        }
    }

    fn legacy_session(active: bool) -> LegacyGameSession {
        let s = session(active, true);
        LegacyGameSession {
            player: s.player,
            entryFee: s.entryFee,
            streak: s.streak,
            randomSeed: s.randomSeed,
            flipIndex: s.flipIndex,
            startTime: s.startTime,
            roundId: s.roundId,
            referrer: s.referrer,
            active: s.active,
        }
    }

    #[test]
    fn short__renders_prefix_and_suffix_lowercase() {
        let address = address!("07ac36e2660ffffaa26cfcee821889eb2945b47b");
        assert_eq!(address.short(), "0x07ac...b47b");
    }

    #[test]
    fn write_calldata__selectors_match_published_abi() {
        assert_eq!(
            &ContractWrite::Flip { heads: true }.calldata()[..4],
            &[0x1d, 0x26, 0x3f, 0x67]
        );
        assert_eq!(&ContractWrite::CashOut.calldata()[..4], &[0x79, 0x3c, 0xd7, 0x1e]);
        assert_eq!(&ContractWrite::ClaimPrize.calldata()[..4], &[0x70, 0x74, 0x0a, 0xc9]);
        assert_eq!(&reads::session(player())[..4], &[0x8c, 0x8e, 0x13, 0xb9]);
        assert_eq!(&reads::stats()[..4], &[0xc5, 0x9d, 0x48, 0x47]);
    }

    #[test]
    fn write_calldata__enter_game_carries_referrer_and_value() {
        let write = ContractWrite::EnterGame {
            referrer: player(),
            value: U256::from(42),
        };
        let data = write.calldata();
        assert_eq!(&data[..4], &[0x37, 0x6a, 0xf5, 0x9f]);
        let decoded = IClawFlip::enterGameCall::abi_decode(&data).unwrap();
        assert_eq!(decoded.referrer, player());
        assert_eq!(write.value(), U256::from(42));
        assert_eq!(ContractWrite::CashOut.value(), U256::ZERO);
    }

    #[test]
    fn decode_session__nine_word_layout_reports_seed_ready() {
        // given
        let data = legacy_session(true).abi_encode();
        assert_eq!(data.len(), 9 * WORD);

        // when
        let session = decode_session(&data).unwrap();

        // then
        assert_eq!(session.player, player());
        assert_eq!(session.streak, 4);
        assert_eq!(session.flip_index, 7);
        assert_eq!(session.round_id, 12);
        assert_eq!(session.referrer, None);
        assert!(session.active);
        assert!(session.seed_ready);
    }

    #[test]
    fn decode_session__ten_word_layout_reads_seed_flag() {
        let session = decode_session(&session(true, false).abi_encode()).unwrap();
        assert!(session.active);
        assert!(!session.seed_ready);
    }

    #[test]
    fn decode_session__short_payload_is_an_error() {
        let data = legacy_session(true).abi_encode();
        assert!(matches!(
            decode_session(&data[..WORD * 8]),
            Err(AbiError::Decode { what: "getSession", .. })
        ));
    }

    #[test]
    fn decode_round__zero_leader_decodes_as_none() {
        let data = GameRound {
            prizePool: U256::from(5),
            highestStreak: U256::from(3),
            leader: Address::ZERO,
            participantCount: U256::from(9),
            settled: false,
        }
        .abi_encode();

        let round = decode_round(&data).unwrap();

        assert_eq!(round.prize_pool, U256::from(5));
        assert_eq!(round.leader, None);
        assert_eq!(round.participant_count, 9);
    }

    #[test]
    fn decode_wei__keeps_full_uint256_range() {
        let huge = U256::MAX - U256::from(1);
        assert_eq!(decode_wei(&huge.abi_encode()), Ok(huge));
    }

    #[test]
    fn decode_stats__maps_all_four_totals() {
        let data = GameTotals {
            totalBuybackAccumulated: U256::from(1),
            totalBuybackExecuted: U256::from(2),
            totalPrizesDistributed: U256::from(3),
            currentBuybackBalance: U256::from(4),
        }
        .abi_encode();

        let stats = decode_stats(&data).unwrap();

        assert_eq!(stats.total_prizes_distributed, U256::from(3));
        assert_eq!(stats.current_buyback_balance, U256::from(4));
    }

    #[test]
    fn decode_flip_result__decodes_matching_log_and_skips_others() {
        let event = IClawFlip::FlipResult {
            player: player(),
            choice: true,
            result: true,
            won: true,
            newStreak: U256::from(2),
        };
        let log = event.encode_log_data();

        let decoded = decode_flip_result(&log).unwrap().unwrap();
        assert_eq!(decoded.player, player());
        assert!(decoded.won);
        assert_eq!(decoded.new_streak, 2);

        let other = LogData::new_unchecked(vec![B256::ZERO], log.data.clone());
        assert_eq!(decode_flip_result(&other), Ok(None));
    }

    #[test]
    fn decode_revert_reason__extracts_error_string() {
        let data = SolError::abi_encode(&Revert {
            reason: "Seed not ready".to_string(),
        });

        assert_eq!(decode_revert_reason(&data).as_deref(), Some("Seed not ready"));
        assert_eq!(decode_revert_reason(&[0xde, 0xad]), None);
    }

    proptest! {
        #[test]
        fn decode_session__inactive_flag_round_trips_for_any_seed_word(seed in any::<bool>()) {
            let session = decode_session(&session(false, seed).abi_encode()).unwrap();
            prop_assert!(!session.active);
            prop_assert_eq!(session.seed_ready, seed);
        }
    }
}
