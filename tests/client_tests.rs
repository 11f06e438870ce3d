#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests for the connection layer.
//!
//! Uses the shared `MockTransport` / `MockConnector` from `tests/common` to
//! script server output and check what `GameClient`, `EventChannel` and
//! `GameApp` do with it.

mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use spy_artist_client::presentation::{Recorder, ViewUpdate};
use spy_artist_client::protocol::JoinedPayload;
use spy_artist_client::{
    ClientConfig, ClientError, ClientEvent, ClientMessage, EventChannel, EventKind, GameApp,
    GameClient, GameConfig, Intent, MemoryPreferences, Phase, Player, RevealTimings,
    ServerMessage,
};

use common::{error_json, json, pong_json, room_created_json, MockConnector, MockTransport, ROOM};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

#[allow(clippy::type_complexity)]
fn start_client(
    incoming: Vec<Option<Result<String, ClientError>>>,
) -> (
    GameClient,
    tokio::sync::mpsc::Receiver<ClientEvent>,
    Arc<Mutex<Vec<String>>>,
    Arc<std::sync::atomic::AtomicBool>,
) {
    let (transport, sent, closed) = MockTransport::new(incoming);
    let (client, events) = GameClient::start(transport, ClientConfig::default());
    (client, events, sent, closed)
}

async fn expect_connected(rx: &mut tokio::sync::mpsc::Receiver<ClientEvent>) {
    let ev = rx.recv().await.expect("expected Connected event");
    assert_eq!(ev, ClientEvent::Connected, "first event should be Connected");
}

fn app_with(
    connector: MockConnector,
) -> (
    GameApp<MockConnector>,
    tokio::sync::mpsc::Sender<Intent>,
    Recorder,
) {
    let recorder = Recorder::new();
    let channel = EventChannel::new(connector, ClientConfig::default());
    let (app, intents) = GameApp::new(
        channel,
        GameConfig::default().with_timings(RevealTimings::instant()),
        Box::new(recorder.clone()),
        Box::new(recorder.clone()),
        Box::new(MemoryPreferences::new()),
    );
    (app, intents, recorder)
}

// ════════════════════════════════════════════════════════════════════
// GameClient
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn room_created_then_room_info_arrive_in_order() {
    let info = json(&ServerMessage::RoomInfo(
        spy_artist_client::protocol::RoomInfoPayload {
            room_id: ROOM.into(),
            phase: None,
            players: vec![Player::new("p1", "Alice").with_host(true)],
            current_round: None,
        },
    ));
    let (client, mut rx, _sent, _closed) = start_client(vec![
        Some(Ok(room_created_json("p1", "Alice"))),
        Some(Ok(info)),
        Some(Ok(pong_json())),
    ]);
    expect_connected(&mut rx).await;

    let kinds: Vec<EventKind> = [rx.recv().await, rx.recv().await, rx.recv().await]
        .into_iter()
        .map(|ev| match ev {
            Some(ClientEvent::Server(msg)) => msg.kind(),
            other => panic!("expected server event, got {other:?}"),
        })
        .collect();
    assert_eq!(
        kinds,
        [EventKind::RoomCreated, EventKind::RoomInfo, EventKind::Pong]
    );
    assert!(client.is_connected());
}

#[tokio::test]
async fn actions_reach_transport_as_json() {
    let (client, mut rx, sent, _closed) = start_client(vec![]);
    expect_connected(&mut rx).await;

    client
        .send(ClientMessage::JoinRoom {
            room_id: ROOM.into(),
            player_name: "Bob".into(),
        })
        .unwrap();
    client.send(ClientMessage::GetRoomInfo {}).unwrap();
    client.send(ClientMessage::GetMyArt {}).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let sent: Vec<serde_json::Value> = sent
        .lock()
        .unwrap()
        .iter()
        .map(|s| serde_json::from_str(s).unwrap())
        .collect();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0]["event"], "join_room");
    assert_eq!(sent[0]["data"]["room_id"], ROOM);
    assert_eq!(sent[1]["event"], "get_room_info");
    assert_eq!(sent[2]["event"], "get_myArt");
}

#[tokio::test]
async fn client_forwards_room_events_without_acting_on_them() {
    let (client, mut rx, sent, _closed) =
        start_client(vec![Some(Ok(room_created_json("p1", "Alice")))]);
    expect_connected(&mut rx).await;
    assert!(matches!(
        rx.recv().await,
        Some(ClientEvent::Server(ServerMessage::RoomCreated(_)))
    ));
    tokio::time::sleep(Duration::from_millis(20)).await;
    // Follow-ups such as get_room_info are the machine's job.
    assert!(sent.lock().unwrap().is_empty());
    assert!(client.is_connected());
}

#[tokio::test]
async fn server_error_is_delivered_as_event() {
    let (_client, mut rx, _sent, _closed) =
        start_client(vec![Some(Ok(error_json("room not found")))]);
    expect_connected(&mut rx).await;
    assert_eq!(
        rx.recv().await,
        Some(ClientEvent::Server(ServerMessage::Error {
            message: Some("room not found".into())
        }))
    );
}

#[tokio::test]
async fn disconnect_on_transport_error_then_sends_fail() {
    let (client, mut rx, _sent, _closed) = start_client(vec![Some(Err(
        ClientError::TransportReceive("reset by peer".into()),
    ))]);
    expect_connected(&mut rx).await;

    match rx.recv().await {
        Some(ClientEvent::Disconnected { reason: Some(reason) }) => {
            assert!(reason.contains("reset by peer"));
        }
        other => panic!("expected Disconnected, got {other:?}"),
    }
    assert!(rx.recv().await.is_none());
    assert!(!client.is_connected());
    assert!(matches!(
        client.send(ClientMessage::CreateRoom {
            player_name: "Alice".into()
        }),
        Err(ClientError::NotConnected)
    ));
}

#[tokio::test]
async fn shutdown_closes_transport() {
    let (mut client, mut rx, _sent, closed) = start_client(vec![]);
    expect_connected(&mut rx).await;
    client.shutdown().await;
    assert!(closed.load(Ordering::Relaxed));
    assert!(matches!(
        rx.recv().await,
        Some(ClientEvent::Disconnected { .. })
    ));
}

// ════════════════════════════════════════════════════════════════════
// EventChannel
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn channel_hook_sees_every_event_of_its_kind() {
    let connector = MockConnector::new(vec![pong_json(), pong_json()]);
    let mut channel = EventChannel::new(connector, ClientConfig::default());
    let seen = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&seen);
    channel.on(
        EventKind::Pong,
        Box::new(move |_| *counter.lock().unwrap() += 1),
    );
    channel.connect().await.unwrap();

    for _ in 0..3 {
        if let Some(ClientEvent::Server(msg)) = channel.next_event().await {
            channel.dispatch(&msg);
        }
    }
    assert_eq!(*seen.lock().unwrap(), 2);
}

#[tokio::test]
async fn channel_without_connection_pends_and_refuses_sends() {
    let mut channel = EventChannel::new(MockConnector::default(), ClientConfig::default());
    {
        let mut next = tokio_test::task::spawn(channel.next_event());
        tokio_test::assert_pending!(next.poll());
    }
    assert!(!channel.is_connected());
    assert!(matches!(
        channel.send(ClientMessage::Ping),
        Err(ClientError::NotConnected)
    ));
}

// ════════════════════════════════════════════════════════════════════
// GameApp
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn app_enters_lobby_and_requests_room_info() {
    let connector = MockConnector::new(vec![room_created_json("p1", "Alice")]);
    let (mut app, _intents, recorder) = app_with(connector.clone());
    app.connect().await.unwrap();

    // Connected, then room_created.
    assert!(app.step().await);
    assert!(app.step().await);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(app.machine().phase(), Phase::Lobby);
    assert_eq!(app.machine().room().unwrap().room_id(), ROOM);
    let events: Vec<_> = connector
        .sent_json()
        .into_iter()
        .map(|v| v["event"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(events, ["get_room_info"]);
    assert!(recorder.updates().iter().any(|u| matches!(
        u,
        ViewUpdate::RoomEntered { room_id, .. } if room_id == ROOM
    )));
}

#[tokio::test]
async fn app_sends_validated_intents() {
    let connector = MockConnector::default();
    let (mut app, intents, _recorder) = app_with(connector.clone());
    app.connect().await.unwrap();
    assert!(app.step().await); // Connected

    intents
        .send(Intent::CreateRoom {
            player_name: "  Alice ".into(),
        })
        .await
        .unwrap();
    assert!(app.step().await);
    tokio::time::sleep(Duration::from_millis(20)).await;

    let sent = connector.sent_json();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["event"], "create_room");
    assert_eq!(sent[0]["data"]["player_name"], "Alice");
}

#[tokio::test]
async fn app_stops_once_nothing_is_left_to_wait_for() {
    let (mut app, intents, _recorder) = app_with(MockConnector::default());
    drop(intents);

    // Never connected: the only branch left is the closed intent queue.
    assert!(app.step().await);
    assert!(!app.step().await);
    app.run().await;
}

#[tokio::test]
async fn app_warns_when_sending_without_connection() {
    let (mut app, intents, recorder) = app_with(MockConnector::default());
    intents
        .send(Intent::CreateRoom {
            player_name: "Alice".into(),
        })
        .await
        .unwrap();
    assert!(app.step().await);

    let warned = recorder.updates().into_iter().any(|u| {
        matches!(u, ViewUpdate::Notice(n) if n.message == "not connected, action not sent")
    });
    assert!(warned);
}

#[tokio::test]
async fn app_runs_hooks_for_incoming_events() {
    let joined = json(&ServerMessage::JoinRoomSuccess(JoinedPayload {
        room_id: ROOM.into(),
        player: Player::new("p2", "Bob"),
        players: vec![
            Player::new("p1", "Alice").with_host(true),
            Player::new("p2", "Bob"),
        ],
    }));
    let (mut app, _intents, _recorder) = app_with(MockConnector::new(vec![joined]));
    let hits = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&hits);
    app.on(
        EventKind::JoinRoomSuccess,
        Box::new(move |msg| log.lock().unwrap().push(msg.kind())),
    );
    app.connect().await.unwrap();

    assert!(app.step().await);
    assert!(app.step().await);
    assert_eq!(*hits.lock().unwrap(), [EventKind::JoinRoomSuccess]);
    assert_eq!(app.machine().room().unwrap().self_id(), "p2");
}

#[tokio::test]
async fn reconnect_without_session_is_rejected() {
    let (mut app, _intents, _recorder) = app_with(MockConnector::default());
    let err = app.reconnect().await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}
