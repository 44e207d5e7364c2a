use crate::{
    Address,
    IClawFlip,
    Log,
    RoundRecord,
    SessionRecord,
    TxHash,
    U256,
    Wei,
};
use alloy::sol_types::SolEvent;

pub const ONE_MILLI_ETHER: Wei = U256::from_limbs([1_000_000_000_000_000, 0, 0, 0]);

pub fn milli_ether(n: u64) -> Wei {
    U256::from(n) * ONE_MILLI_ETHER
}

pub fn player_address() -> Address {
    Address::repeat_byte(0xaa)
}

pub fn leader_address() -> Address {
    Address::repeat_byte(0xbb)
}

pub fn tx_hash(seed: u8) -> TxHash {
    TxHash::repeat_byte(seed)
}

pub fn active_session(player: Address, streak: u64, seed_ready: bool) -> SessionRecord {
    SessionRecord {
        player,
        entry_fee: ONE_MILLI_ETHER,
        streak,
        flip_index: streak,
        start_time: 1_700_000_000,
        round_id: 1,
        referrer: None,
        active: true,
        seed_ready,
    }
}

pub fn inactive_session(player: Address) -> SessionRecord {
    SessionRecord::empty(player)
}

pub fn round(prize_pool: Wei, highest_streak: u64) -> RoundRecord {
    RoundRecord {
        prize_pool,
        highest_streak,
        leader: (highest_streak > 0).then(leader_address),
        participant_count: 3,
        settled: false,
    }
}

/// A `FlipResult` log as the contract at `contract` would emit it.
pub fn flip_result_log(
    contract: Address,
    player: Address,
    choice_heads: bool,
    landed_heads: bool,
    new_streak: u64,
) -> Log {
    let event = IClawFlip::FlipResult {
        player,
        choice: choice_heads,
        result: landed_heads,
        won: choice_heads == landed_heads,
        newStreak: U256::from(new_streak),
    };
    Log {
        address: contract,
        data: event.encode_log_data(),
    }
}
