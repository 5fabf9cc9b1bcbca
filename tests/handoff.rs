//! Authority promotion and explicit handoff scenarios.

use std::time::Duration;

use quickmatch::{Clock, Network, Phase, SessionConfig, SessionEvent, SessionNode};

fn test_config() -> SessionConfig {
    SessionConfig {
        min_participants: 2,
        countdown_ms: 5_000,
        active_ms: 30_000,
        grace_ms: 10_000,
        time_warning_ms: 10_000,
        ..SessionConfig::default()
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(2_500)).await;
}

#[tokio::test(start_paused = true)]
async fn lowest_connected_participant_is_promoted() {
    let net = Network::new();
    let clock = Clock::manual(0);
    let five = SessionNode::spawn(5, test_config(), clock.clone(), net.clone()).await;
    let two = SessionNode::spawn(2, test_config(), clock.clone(), net.clone()).await;
    let nine = SessionNode::spawn(9, test_config(), clock.clone(), net.clone()).await;
    settle().await;
    assert!(five.is_authority().await);

    five.join().await;
    two.join().await;
    nine.join().await;
    settle().await;

    five.shutdown().await;
    settle().await;
    assert!(two.is_authority().await);
    assert!(!nine.is_authority().await);
    // The departed participant is dropped by the new authority.
    let ids: Vec<i32> = nine.participants().await.iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![2, 9]);
}

#[tokio::test(start_paused = true)]
async fn spectator_is_promoted_when_no_participant_remains() {
    let net = Network::new();
    let clock = Clock::manual(0);
    let one = SessionNode::spawn(1, test_config(), clock.clone(), net.clone()).await;
    let fifty = SessionNode::spawn(50, test_config(), clock.clone(), net.clone()).await;
    settle().await;

    one.join().await;
    settle().await;
    assert_eq!(fifty.participants().await.len(), 1);

    one.shutdown().await;
    settle().await;
    assert!(fifty.is_authority().await);
    assert!(fifty.participants().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn promotion_mid_round_revalidates_the_roster() {
    let net = Network::new();
    let clock = Clock::manual(0);
    let one = SessionNode::spawn(1, test_config(), clock.clone(), net.clone()).await;
    let two = SessionNode::spawn(2, test_config(), clock.clone(), net.clone()).await;
    settle().await;

    one.join().await;
    two.join().await;
    one.start().await;
    settle().await;
    clock.advance_ms(5_000);
    settle().await;
    assert_eq!(two.phase().await, Phase::Active);

    // The authority was also a participant; its departure leaves the round
    // below the minimum, so the successor aborts back to waiting.
    one.shutdown().await;
    settle().await;
    assert!(two.is_authority().await);
    assert_eq!(two.phase().await, Phase::Waiting);
    assert_eq!(two.participants().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn explicit_transfer_moves_write_access() {
    let net = Network::new();
    let clock = Clock::manual(0);
    let one = SessionNode::spawn(1, test_config(), clock.clone(), net.clone()).await;
    let two = SessionNode::spawn(2, test_config(), clock.clone(), net.clone()).await;
    settle().await;

    one.join().await;
    two.join().await;
    settle().await;
    assert!(one.is_authority().await);

    one.transfer_authority(2).await;
    settle().await;
    assert!(!one.is_authority().await);
    assert!(two.is_authority().await);

    // Intents submitted on the old holder are forwarded to the new one.
    one.start().await;
    settle().await;
    assert_eq!(one.phase().await, Phase::Countdown);
    assert_eq!(two.phase().await, Phase::Countdown);
}

#[tokio::test(start_paused = true)]
async fn regaining_authority_within_a_tick_keeps_one_timer() {
    let net = Network::new();
    let clock = Clock::manual(0);
    let one = SessionNode::spawn(1, test_config(), clock.clone(), net.clone()).await;
    let two = SessionNode::spawn(2, test_config(), clock.clone(), net.clone()).await;
    settle().await;

    one.join().await;
    two.join().await;
    settle().await;

    // Lose and regain authority faster than one tick interval; the short
    // sleeps drain the inboxes without letting the old timer wake up.
    one.transfer_authority(2).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    two.transfer_authority(1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(one.is_authority().await);

    let mut events = one.subscribe();
    one.start().await;
    settle().await;
    clock.advance_ms(5_000);
    settle().await;
    assert_eq!(one.phase().await, Phase::Active);

    let mut begun = 0;
    let mut started = 0;
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::CountdownBegun => begun += 1,
            SessionEvent::Started => started += 1,
            _ => {}
        }
    }
    assert_eq!(begun, 1);
    assert_eq!(started, 1);
}

#[tokio::test(start_paused = true)]
async fn transfer_from_a_non_holder_is_ignored() {
    let net = Network::new();
    let clock = Clock::manual(0);
    let one = SessionNode::spawn(1, test_config(), clock.clone(), net.clone()).await;
    let two = SessionNode::spawn(2, test_config(), clock.clone(), net.clone()).await;
    settle().await;

    two.transfer_authority(2).await;
    settle().await;
    assert!(one.is_authority().await);
    assert!(!two.is_authority().await);
}
