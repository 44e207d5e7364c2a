#![allow(non_snake_case)]

use claw_flip::{
    Action,
    Screen,
    test_helpers::ReceiptOutcome,
    transaction::{
        TxKind,
        TxStatus,
    },
};
use flip_abi::{
    ContractWrite,
    test_helpers::{
        active_session,
        inactive_session,
        milli_ether,
        player_address,
        round,
    },
};
use integration_tests::Harness;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn cash_out__streak_of_three_celebrates_for_three_seconds() {
    // given
    let player = player_address();
    let mut h = Harness::connected(player, Some(active_session(player, 3, true))).await;
    h.fake.with(|chain| chain.round = round(milli_ether(50), 3));
    h.fake.queue_receipt(ReceiptOutcome::success_then(move |chain| {
        chain.session = Some(inactive_session(player));
        chain.balance += milli_ether(8);
        chain.round = round(milli_ether(42), 3);
    }));
    assert!(h.controller.view().is_enabled(Action::CashOut));
    let balance_reads = h.fake.with(|chain| chain.balance_reads);

    // when
    h.controller.request(Action::CashOut).unwrap();
    h.pump_until(|h| h.status(TxKind::CashOut).is_settled())
        .await;

    // then
    assert!(matches!(h.status(TxKind::CashOut), TxStatus::Success { .. }));
    assert_eq!(h.fake.writes(), vec![ContractWrite::CashOut]);
    assert!(h.controller.view().celebrating());
    assert_eq!(h.fake.with(|chain| chain.balance_reads), balance_reads + 1);
    let chain = h.controller.view().chain();
    assert_eq!(chain.balance, Some(milli_ether(108)));
    assert_eq!(
        chain.round.as_ref().map(|r| r.prize_pool),
        Some(milli_ether(42))
    );
    assert_eq!(h.controller.view().screen(), Screen::Entry);

    h.pump_for(Duration::from_millis(2900)).await;
    assert!(h.controller.view().celebrating());
    h.pump_for(Duration::from_millis(200)).await;
    assert!(!h.controller.view().celebrating());
}

#[tokio::test(start_paused = true)]
async fn cash_out__short_streak_does_not_celebrate() {
    let player = player_address();
    let mut h = Harness::connected(player, Some(active_session(player, 2, true))).await;
    h.fake.queue_receipt(ReceiptOutcome::success_then(move |chain| {
        chain.session = Some(inactive_session(player));
    }));

    h.controller.request(Action::CashOut).unwrap();
    h.pump_until(|h| h.status(TxKind::CashOut).is_settled())
        .await;

    assert!(matches!(h.status(TxKind::CashOut), TxStatus::Success { .. }));
    assert!(!h.controller.view().celebrating());
}

#[tokio::test(start_paused = true)]
async fn cash_out__disabled_with_zero_streak_and_during_a_flip() {
    let player = player_address();
    let mut h = Harness::connected(player, Some(active_session(player, 0, true))).await;
    assert!(!h.controller.view().is_enabled(Action::CashOut));
    assert!(h.controller.request(Action::CashOut).is_err());

    h.fake
        .with(|chain| chain.session = Some(active_session(player, 1, true)));
    h.controller.refresh().await;
    assert!(h.controller.view().is_enabled(Action::CashOut));

    h.controller.request(Action::Flip { heads: false }).unwrap();
    assert!(!h.controller.view().is_enabled(Action::CashOut));
    h.pump_until(|h| h.status(TxKind::Flip).is_settled())
        .await;
    assert!(h.controller.view().is_enabled(Action::CashOut));
}
