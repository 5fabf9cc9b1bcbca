//! End-to-end session scenarios over the in-process transport.
//!
//! Tokio time is paused so the periodic tick spins virtually; the session
//! wall clock is a shared manual clock advanced explicitly by each test.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use quickmatch::{Clock, Network, Phase, SessionConfig, SessionEvent, SessionNode, SessionObserver};

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

/// Let queued envelopes drain and the 1 Hz tick run a couple of times.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(2_500)).await;
}

fn recorder() -> (Arc<Mutex<Vec<SessionEvent>>>, Arc<dyn SessionObserver>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let observer: Arc<dyn SessionObserver> = {
        let log = log.clone();
        Arc::new(move |event: SessionEvent| log.lock().unwrap().push(event))
    };
    (log, observer)
}

fn count(log: &Arc<Mutex<Vec<SessionEvent>>>, event: SessionEvent) -> usize {
    log.lock().unwrap().iter().filter(|seen| **seen == event).count()
}

#[tokio::test(start_paused = true)]
async fn full_round_from_an_empty_session() {
    let net = Network::new();
    let clock = Clock::manual(0);
    let one = SessionNode::spawn(1, test_config(), clock.clone(), net.clone()).await;
    let two = SessionNode::spawn(2, test_config(), clock.clone(), net.clone()).await;
    settle().await;
    assert!(one.is_authority().await);
    assert_eq!(one.session_id(), two.session_id());

    one.join().await;
    two.join().await;
    settle().await;
    assert_eq!(one.participants().await.len(), 2);
    assert!(one.is_ready().await);
    assert_eq!(one.phase().await, Phase::Waiting);

    // Start from the non-authority node; the intent is forwarded.
    two.start().await;
    settle().await;
    assert_eq!(one.phase().await, Phase::Countdown);
    assert_eq!(two.phase().await, Phase::Countdown);

    clock.advance_ms(5_000);
    settle().await;
    assert_eq!(two.phase().await, Phase::Active);
    assert_eq!(two.score_of(1).await, Some(0));
    assert_eq!(two.score_of(2).await, Some(0));

    two.adjust_score(1, 3).await;
    settle().await;
    assert_eq!(one.score_of(1).await, Some(3));
    assert_eq!(two.score_of(1).await, Some(3));

    clock.advance_ms(30_000);
    settle().await;
    assert_eq!(one.phase().await, Phase::Ended);
    assert_eq!(two.phase().await, Phase::Ended);

    clock.advance_ms(10_000);
    settle().await;
    assert_eq!(one.phase().await, Phase::Waiting);
    assert_eq!(one.score_of(1).await, Some(0));
    assert_eq!(one.score_of(2).await, Some(0));
    assert_eq!(two.participants().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn join_beyond_configured_max_is_ignored() {
    let config = SessionConfig {
        max_participants: 2,
        ..test_config()
    };
    let net = Network::new();
    let clock = Clock::manual(0);
    let one = SessionNode::spawn(1, config.clone(), clock.clone(), net.clone()).await;
    let two = SessionNode::spawn(2, config.clone(), clock.clone(), net.clone()).await;
    let three = SessionNode::spawn(3, config.clone(), clock.clone(), net.clone()).await;
    settle().await;

    one.join().await;
    two.join().await;
    three.join().await;
    settle().await;

    // Two seats configured: the third join drops and its issuer stays a
    // spectator on every replica.
    assert_eq!(one.participants().await.len(), 2);
    assert_eq!(three.participants().await.len(), 2);
    assert_eq!(three.score_of(3).await, None);
}

#[tokio::test(start_paused = true)]
async fn local_intents_queue_behind_forwarded_ones() {
    let net = Network::new();
    let clock = Clock::manual(0);
    let one = SessionNode::spawn(1, test_config(), clock.clone(), net.clone()).await;
    let two = SessionNode::spawn(2, test_config(), clock.clone(), net.clone()).await;
    settle().await;

    // No settling in between: the authority's own start must queue behind
    // the joins already in its inbox instead of being applied in place.
    one.join().await;
    two.join().await;
    one.start().await;
    settle().await;

    assert_eq!(one.phase().await, Phase::Countdown);
    assert_eq!(two.phase().await, Phase::Countdown);
}

#[tokio::test(start_paused = true)]
async fn start_is_rejected_until_ready() {
    let net = Network::new();
    let clock = Clock::manual(0);
    let one = SessionNode::spawn(1, test_config(), clock.clone(), net.clone()).await;
    settle().await;

    one.join().await;
    settle().await;
    assert!(!one.is_ready().await);

    one.start().await;
    settle().await;
    // One participant with a minimum of two: the intent is a no-op.
    assert_eq!(one.phase().await, Phase::Waiting);
}

#[tokio::test(start_paused = true)]
async fn abort_path_goes_straight_to_waiting() {
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
    assert_eq!(one.phase().await, Phase::Active);

    let (log, observer) = recorder();
    one.register_observer(observer).await;

    two.leave().await;
    settle().await;
    assert_eq!(one.phase().await, Phase::Waiting);
    assert_eq!(two.phase().await, Phase::Waiting);
    // The abort path never passes through the ended phase.
    assert_eq!(count(&log, SessionEvent::Ended), 0);
    assert_eq!(count(&log, SessionEvent::ParticipantLeft), 1);
}

#[tokio::test(start_paused = true)]
async fn time_warning_fires_once_per_round_on_every_node() {
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
    assert_eq!(one.phase().await, Phase::Active);

    let (log_one, observer_one) = recorder();
    one.register_observer(observer_one).await;
    let (log_two, observer_two) = recorder();
    two.register_observer(observer_two).await;

    // 9 seconds of play remain, below the 10 second threshold.
    clock.advance_ms(21_000);
    settle().await;
    settle().await;
    assert_eq!(count(&log_one, SessionEvent::TimeWarning), 1);
    assert_eq!(count(&log_two, SessionEvent::TimeWarning), 1);
}

#[tokio::test(start_paused = true)]
async fn late_joiner_reconstructs_state_without_replaying_start() {
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
    one.adjust_score(1, 3).await;
    clock.advance_ms(2_000);
    settle().await;
    assert_eq!(one.phase().await, Phase::Active);

    let three = SessionNode::spawn(3, test_config(), clock.clone(), net.clone()).await;
    let mut events = three.subscribe();
    settle().await;

    assert_eq!(three.phase().await, Phase::Active);
    assert_eq!(three.score_of(1).await, Some(3));
    assert_eq!(three.score_of(2).await, Some(0));
    let expected = one.remaining_ms().await.unwrap();
    let observed = three.remaining_ms().await.unwrap();
    assert!(expected.abs_diff(observed) <= 1_000);
    // The catch-up applied as a baseline: no replayed lifecycle events.
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));
    assert!(!three.is_authority().await);
}

#[tokio::test(start_paused = true)]
async fn team_round_tracks_aggregate_scores() {
    let config = SessionConfig {
        teams_enabled: true,
        team_count: 2,
        team_names: vec!["Red".into(), "Blue".into()],
        ..test_config()
    };
    let net = Network::new();
    let clock = Clock::manual(0);
    let one = SessionNode::spawn(1, config.clone(), clock.clone(), net.clone()).await;
    let two = SessionNode::spawn(2, config.clone(), clock.clone(), net.clone()).await;
    settle().await;

    one.join().await;
    two.join().await;
    settle().await;
    assert!(!one.is_ready().await);

    one.join_team(0).await;
    two.join_team(1).await;
    settle().await;
    assert!(one.is_ready().await);
    assert_eq!(one.team_name(0), Some("Red"));

    one.start().await;
    settle().await;
    clock.advance_ms(5_000);
    settle().await;
    one.adjust_score(1, 4).await;
    one.adjust_score(2, 7).await;
    settle().await;
    assert_eq!(two.team_score(0).await, 4);
    assert_eq!(two.team_score(1).await, 7);
}
