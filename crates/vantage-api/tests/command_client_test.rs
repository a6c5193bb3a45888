#![allow(clippy::unwrap_used)]
// Integration tests for `CommandClient`/`EventStream` against scripted
// in-process Host Command services speaking plain TCP.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use vantage_api::{
    CommandClient, CommandOptions, Credentials, Error, Event, EventStream, StatusCategory,
    TransportConfig,
};

fn options(port: u16, credentials: Option<Credentials>) -> CommandOptions {
    CommandOptions {
        transport: TransportConfig {
            tls: None,
            conn_timeout: Duration::from_secs(2),
        },
        port: Some(port),
        credentials,
        response_timeout: Duration::from_millis(300),
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_millis(500),
        keepalive_interval: Duration::from_secs(60),
    }
}

async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

#[tokio::test]
async fn command_round_trip_with_interleaved_status() {
    let (listener, port) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let line = lines.next_line().await.unwrap().unwrap();
        assert_eq!(line, "VERSION");
        // A status line interleaves ahead of the response; it must not
        // be mistaken for the response.
        write_half
            .write_all(b"S:LOAD 118 75.000\r\nR:VERSION 4.2\r\n")
            .await
            .unwrap();
    });

    let client = CommandClient::new("127.0.0.1", options(port, None));
    client.connect().await.unwrap();
    let mut events = client.events();

    let response = client.command("VERSION", &[]).await.unwrap();
    assert_eq!(response.command, "VERSION");
    assert_eq!(response.arg(0).unwrap(), "4.2");

    // The diverted status line reached the event channel.
    loop {
        match events.recv().await.unwrap() {
            vantage_api::CommandEvent::Status {
                category,
                vid,
                args,
            } => {
                assert_eq!(category, "LOAD");
                assert_eq!(vid, 118);
                assert_eq!(args, vec!["75.000"]);
                break;
            }
            _ => continue,
        }
    }

    client.close();
}

#[tokio::test]
async fn timeout_isolates_a_single_request() {
    let (listener, port) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        // First request: withhold the response past the client timeout.
        let first = lines.next_line().await.unwrap().unwrap();
        assert!(first.starts_with("INVOKE 118"), "got: {first}");

        // Second request arrives after the first timed out. Respond to
        // the first (late) and then to the second: the late response
        // must be dropped, not matched to the second request.
        let second = lines.next_line().await.unwrap().unwrap();
        assert!(second.starts_with("INVOKE 119"), "got: {second}");
        write_half
            .write_all(b"R:INVOKE 118 50.000 Load.GetLevel\r\nR:INVOKE 119 75.000 Load.GetLevel\r\n")
            .await
            .unwrap();

        // Hold the socket open.
        while lines.next_line().await.unwrap().is_some() {}
    });

    let client = CommandClient::new("127.0.0.1", options(port, None));
    client.connect().await.unwrap();

    let err = client.load().get_level(118).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)), "got: {err:?}");

    // The connection stays open and the next request succeeds.
    let level = client.load().get_level(119).await.unwrap();
    assert_eq!(level, 75.0);

    client.close();
}

#[tokio::test]
async fn bad_credentials_are_fatal() {
    let (listener, port) = bind().await;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        let line = lines.next_line().await.unwrap().unwrap();
        assert!(line.starts_with("LOGIN "), "got: {line}");
        write_half
            .write_all(b"R:ERROR:23 Login failed\r\n")
            .await
            .unwrap();
    });

    let client = CommandClient::new(
        "127.0.0.1",
        options(port, Some(Credentials::new("admin", "wrong"))),
    );
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, Error::Auth { .. }), "got: {err:?}");
}

#[tokio::test]
async fn reconnect_relogs_in_and_replays_subscriptions() {
    let (listener, port) = bind().await;
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<String>();

    tokio::spawn(async move {
        // First connection: login + STATUS LOAD, then die.
        {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut lines = BufReader::new(read_half).lines();

            for _ in 0..2 {
                let line = lines.next_line().await.unwrap().unwrap();
                let verb = line.split_whitespace().next().unwrap().to_string();
                seen_tx.send(format!("1:{line}")).unwrap();
                write_half
                    .write_all(format!("R:{verb} OK\r\n").as_bytes())
                    .await
                    .unwrap();
            }
            // Connection dropped here.
        }

        // Second connection: expect LOGIN then the replayed STATUS LOAD
        // before anything else, then push an event.
        let (stream, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();

        for _ in 0..2 {
            let line = lines.next_line().await.unwrap().unwrap();
            let verb = line.split_whitespace().next().unwrap().to_string();
            seen_tx.send(format!("2:{line}")).unwrap();
            write_half
                .write_all(format!("R:{verb} OK\r\n").as_bytes())
                .await
                .unwrap();
        }

        write_half.write_all(b"S:LOAD 118 25.000\r\n").await.unwrap();

        // Keep serving (keepalives etc.) until the client goes away.
        while let Ok(Some(line)) = lines.next_line().await {
            let verb = line.split_whitespace().next().unwrap().to_string();
            let _ = write_half
                .write_all(format!("R:{verb} OK\r\n").as_bytes())
                .await;
        }
    });

    let client = CommandClient::new(
        "127.0.0.1",
        options(port, Some(Credentials::new("admin", "secret"))),
    );
    client.connect().await.unwrap();

    let events = EventStream::new(client.clone());
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();
    let _subscription = events
        .subscribe_status(&[StatusCategory::Load], move |event| {
            let _ = event_tx.send(event.clone());
        })
        .await
        .unwrap();

    // First connection saw login and the enrolment.
    assert!(seen_rx.recv().await.unwrap().starts_with("1:LOGIN "));
    assert_eq!(seen_rx.recv().await.unwrap(), "1:STATUS LOAD");

    // After the server drops the socket, the client redials, re-logs
    // in, and replays the subscription before admitting new requests.
    assert!(seen_rx.recv().await.unwrap().starts_with("2:LOGIN "));
    assert_eq!(seen_rx.recv().await.unwrap(), "2:STATUS LOAD");

    // The pushed status still reaches the callback.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let event = tokio::time::timeout_at(deadline, event_rx.recv())
            .await
            .expect("no status event after reconnect")
            .unwrap();
        if let Event::Status { category, vid, .. } = event {
            assert_eq!(category, "LOAD");
            assert_eq!(vid, 118);
            break;
        }
    }

    events.stop();
    client.close();
}
