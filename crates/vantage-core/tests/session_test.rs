#![allow(clippy::unwrap_used)]
// End-to-end scenarios against the in-process controller simulator.

mod support;

use std::time::Duration;

use tokio::sync::mpsc;

use vantage_core::{ObjectChange, ObjectKind, SessionConfig, Vantage};

use support::{SimLoad, Simulator};

fn kitchen_and_study() -> Vec<SimLoad> {
    vec![
        SimLoad {
            vid: 118,
            name: "Kitchen".into(),
            level: 0.0,
        },
        SimLoad {
            vid: 119,
            name: "Study".into(),
            level: 75.0,
        },
    ]
}

async fn connected_session(config: SessionConfig) -> Vantage {
    let session = Vantage::new(config);
    session.connect().await.unwrap();
    session
}

// ── Scenario: login + enumerate + read ──────────────────────────────

#[tokio::test]
async fn login_enumerate_and_read_state() {
    let simulator = Simulator::start(Some(("admin", "secret")), kitchen_and_study()).await;
    let config = simulator
        .session_config()
        .with_credentials("admin", "secret");
    let session = connected_session(config).await;

    session.loads.initialize(true).await.unwrap();

    let kitchen = session.loads.get(118).unwrap();
    assert_eq!(kitchen.info.name, "Kitchen");
    assert_eq!(kitchen.level(), Some(0.0));
    assert!(!kitchen.is_on());

    let study = session.loads.get_by_name("Study").unwrap();
    assert_eq!(study.info.vid, 119);
    assert_eq!(study.level(), Some(75.0));

    // Weak back-references stay VIDs; dangling lookups just fail.
    assert_eq!(kitchen.info.area, Some(5));
    assert!(session.areas.get(5).is_none());

    assert_eq!(session.get_kind(118), Some(ObjectKind::Load));
    session.close().await;
}

// ── Scenario: set and observe ───────────────────────────────────────

#[tokio::test]
async fn set_level_and_observe_status_event() {
    let simulator = Simulator::start(None, kitchen_and_study()).await;
    let session = connected_session(simulator.session_config()).await;

    session.loads.initialize(true).await.unwrap();

    let (change_tx, mut change_rx) = mpsc::unbounded_channel();
    let _subscription = session.loads.subscribe(move |load, change| {
        let _ = change_tx.send((load.info.vid, change));
    });

    session
        .command_client()
        .load()
        .set_level(118, 50.0)
        .await
        .unwrap();

    // The simulator pushes `S:STATUS 118 Load.GetLevel 50000`; exactly
    // one update callback fires and the cached level is in percent.
    let (vid, change) = tokio::time::timeout(Duration::from_secs(5), change_rx.recv())
        .await
        .expect("no change callback")
        .unwrap();
    assert_eq!(vid, 118);
    assert_eq!(change, ObjectChange::Updated);
    assert_eq!(session.loads.get(118).unwrap().level(), Some(50.0));

    assert!(
        change_rx.try_recv().is_err(),
        "expected exactly one callback"
    );

    session.close().await;
}

// ── Scenario: reconnect resubscribes ────────────────────────────────

#[tokio::test]
async fn reconnect_relogs_in_and_resubscribes() {
    let simulator = Simulator::start(Some(("admin", "secret")), kitchen_and_study()).await;
    let config = simulator
        .session_config()
        .with_credentials("admin", "secret");
    let session = connected_session(config).await;

    session.loads.initialize(true).await.unwrap();
    assert_eq!(simulator.hc_connection_count(), 1);

    let (change_tx, mut change_rx) = mpsc::unbounded_channel();
    let _subscription = session.loads.subscribe(move |load, change| {
        let _ = change_tx.send((load.info.vid, load.level(), change));
    });

    // Sever the command socket.
    simulator.kill_hc_connections();
    // The client redials, re-sends LOGIN, and re-enrols VID 118 before
    // admitting new requests.
    simulator
        .wait_for_hc_log(|log| {
            log.iter().filter(|l| l.starts_with("LOGIN ")).count() >= 2
                && log.iter().filter(|l| *l == "ADDSTATUS 118").count() >= 2
        })
        .await;
    assert!(simulator.hc_connection_count() >= 2);

    // Give the reconnect-triggered state refresh a moment to settle,
    // then drain any callbacks it produced.
    tokio::time::sleep(Duration::from_millis(200)).await;
    while change_rx.try_recv().is_ok() {}

    // A subsequent update still reaches the callback.
    simulator.emit_load_status(118, 25.0);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let (vid, level, _change) = tokio::time::timeout_at(deadline, change_rx.recv())
            .await
            .expect("no change callback after reconnect")
            .unwrap();
        if vid == 118 && level == Some(25.0) {
            break;
        }
    }
    assert_eq!(session.loads.get(118).unwrap().level(), Some(25.0));

    session.close().await;
}

// ── Scenario: bad credentials are fatal ─────────────────────────────

#[tokio::test]
async fn bad_credentials_are_fatal() {
    let simulator = Simulator::start(Some(("admin", "secret")), kitchen_and_study()).await;
    let config = simulator
        .session_config()
        .with_credentials("admin", "wrong");

    // The command channel rejects the login at connect time.
    let session = Vantage::new(config.clone());
    let err = session.connect().await.unwrap_err();
    assert!(err.is_auth(), "got: {err:?}");

    // The config channel rejects it during enumeration, with no retry.
    let session = Vantage::new(config);
    let err = session.loads.initialize(true).await.unwrap_err();
    assert!(err.is_auth(), "got: {err:?}");
    assert_eq!(simulator.hc_connection_count(), 1);

    session.close().await;
}

// ── Query semantics ─────────────────────────────────────────────────

#[tokio::test]
async fn name_filter_equals_predicate_filter() {
    let simulator = Simulator::start(None, kitchen_and_study()).await;
    let session = connected_session(simulator.session_config()).await;

    // Lazy enumeration: querying before initialize triggers it.
    let all = session.loads.objects().await.unwrap();
    assert_eq!(all.len(), 2);
    assert!(session.loads.initialized());

    let by_name = session.loads.filter_by_name("Kitchen");
    let by_predicate = session.loads.filter(|load| load.info.name == "Kitchen");

    let names = |loads: &[std::sync::Arc<vantage_core::Load>]| {
        loads.iter().map(|l| l.info.vid).collect::<Vec<_>>()
    };
    assert_eq!(names(&by_name), names(&by_predicate));
    assert_eq!(names(&by_name), vec![118]);

    session.close().await;
}

// ── Variables round trip ────────────────────────────────────────────

#[tokio::test]
async fn variable_set_round_trips_through_status() {
    use vantage_api::command::interfaces::GMemValue;

    let simulator = Simulator::start(None, Vec::new()).await;
    let session = connected_session(simulator.session_config()).await;

    session
        .command_client()
        .gmem()
        .set(42, &GMemValue::Int(7))
        .await
        .unwrap();
    let value = session.command_client().gmem().get(42).await.unwrap();
    assert_eq!(value, GMemValue::Int(7));

    session.close().await;
}
