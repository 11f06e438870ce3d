#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire format tests.
//!
//! Verifies the `{"event", "data"}` envelope of every outbound action and
//! decodes JSON fixtures shaped like real server output.

use serde_json::{json, Value};
use spy_artist_client::protocol::{
    ClientMessage, EventKind, GalleryEntry, Player, ServerMessage, ServerPhase, Submission,
};
use spy_artist_client::WinType;

// ════════════════════════════════════════════════════════════════════
// Helper
// ════════════════════════════════════════════════════════════════════

fn to_value(msg: &ClientMessage) -> Value {
    serde_json::to_value(msg).expect("serialize")
}

fn decode(value: Value) -> ServerMessage {
    serde_json::from_value(value).expect("deserialize")
}

// ════════════════════════════════════════════════════════════════════
// Outbound action catalog
// ════════════════════════════════════════════════════════════════════

#[test]
fn outbound_actions_use_catalog_names_and_payloads() {
    let cases = [
        (
            ClientMessage::CreateRoom {
                player_name: "Alice".into(),
            },
            json!({"event": "create_room", "data": {"player_name": "Alice"}}),
        ),
        (
            ClientMessage::JoinRoom {
                room_id: "AB12CD34".into(),
                player_name: "Bob".into(),
            },
            json!({"event": "join_room", "data": {"room_id": "AB12CD34", "player_name": "Bob"}}),
        ),
        (
            ClientMessage::GetRoomInfo {},
            json!({"event": "get_room_info", "data": {}}),
        ),
        (
            ClientMessage::RejoinRoom {
                room_id: "AB12CD34".into(),
                player_id: "p1".into(),
            },
            json!({"event": "rejoin_room", "data": {"room_id": "AB12CD34", "player_id": "p1"}}),
        ),
        (
            ClientMessage::ChangeAvatar { avatar_id: 7 },
            json!({"event": "change_avatar", "data": {"avatar_id": 7}}),
        ),
        (
            ClientMessage::TopicVoteStart {},
            json!({"event": "topic_vote_start", "data": {}}),
        ),
        (
            ClientMessage::TopicVoted {
                selected_topic_no: 2,
            },
            json!({"event": "topic_voted", "data": {"selected_topic_no": 2}}),
        ),
        (
            ClientMessage::SubmitDrawingPrompt {
                prompt: "a cat in space".into(),
                style_id: 3,
            },
            json!({"event": "submit_drawing_prompt", "data": {"prompt": "a cat in space", "style_id": 3}}),
        ),
        (
            ClientMessage::GetMyArt {},
            json!({"event": "get_myArt", "data": {}}),
        ),
        (
            ClientMessage::ArtReceived {},
            json!({"event": "art_received", "data": {}}),
        ),
        (
            ClientMessage::SelectedArt { selected_art_no: 1 },
            json!({"event": "selected_art", "data": {"selected_art_no": 1}}),
        ),
        (
            ClientMessage::SubmitSpyVote {
                voted_player_id: "p3".into(),
            },
            json!({"event": "submit_spy_vote", "data": {"voted_player_id": "p3"}}),
        ),
        (
            ClientMessage::SpyGuess {
                guessed_keyword: "cat".into(),
            },
            json!({"event": "spy_guess", "data": {"guessed_keyword": "cat"}}),
        ),
        (
            ClientMessage::PlayAgain {},
            json!({"event": "play_again", "data": {}}),
        ),
        (
            ClientMessage::LeaveRoom {},
            json!({"event": "leave_room", "data": {}}),
        ),
        (ClientMessage::Ping, json!({"event": "ping"})),
    ];

    for (msg, expected) in cases {
        assert_eq!(to_value(&msg), expected, "{}", msg.name());
        assert_eq!(expected["event"], msg.name());
        let back: ClientMessage = serde_json::from_value(expected).unwrap();
        assert_eq!(back, msg);
    }
}

// ════════════════════════════════════════════════════════════════════
// Inbound fixtures
// ════════════════════════════════════════════════════════════════════

#[test]
fn fixture_room_created() {
    let msg = decode(json!({
        "event": "room_created",
        "data": {
            "room_id": "AB12CD34",
            "player": {"id": "p1", "name": "Alice", "avatar_id": 3, "is_host": true},
            "players": [{"id": "p1", "name": "Alice", "avatar_id": 3, "is_host": true}]
        }
    }));
    match msg {
        ServerMessage::RoomCreated(p) => {
            assert_eq!(p.room_id, "AB12CD34");
            assert!(p.player.is_host);
            assert!(p.player.connected);
            assert_eq!(p.players.len(), 1);
        }
        other => panic!("expected RoomCreated, got {other:?}"),
    }
}

#[test]
fn fixture_player_without_avatar_defaults() {
    let player: Player = serde_json::from_value(json!({
        "id": "p2", "name": "Bob", "is_host": false
    }))
    .unwrap();
    assert_eq!(player.avatar_id, 0);
    assert!(player.connected);
}

#[test]
fn fixture_room_info_accepts_phase_name_or_index() {
    for (phase, expected) in [
        (json!("voting"), ServerPhase::Voting),
        (json!("spy_guess"), ServerPhase::SpyGuess),
        (json!(0), ServerPhase::Waiting),
        (json!(5), ServerPhase::Drawing),
        (json!(6), ServerPhase::ShowArt),
        (json!(9), ServerPhase::Ended),
    ] {
        let msg = decode(json!({
            "event": "room_info",
            "data": {"room_id": "AB12CD34", "phase": phase, "players": []}
        }));
        match msg {
            ServerMessage::RoomInfo(info) => assert_eq!(info.phase, Some(expected)),
            other => panic!("expected RoomInfo, got {other:?}"),
        }
    }

    for bad in [json!("lunch"), json!(10)] {
        let result: Result<ServerMessage, _> = serde_json::from_value(json!({
            "event": "room_info",
            "data": {"room_id": "AB12CD34", "phase": bad}
        }));
        assert!(result.is_err());
    }
}

#[test]
fn fixture_game_started_for_spy_has_no_keyword() {
    let msg = decode(json!({
        "event": "game_started",
        "data": {
            "topic": "animals",
            "is_spy": true,
            "styles": [{"id": 1, "style_name": "watercolor"}]
        }
    }));
    match msg {
        ServerMessage::GameStarted(p) => {
            assert!(p.is_spy);
            assert_eq!(p.keyword, None);
            assert_eq!(p.round, 1);
            assert_eq!(p.styles[0].style_name, "watercolor");
        }
        other => panic!("expected GameStarted, got {other:?}"),
    }
}

#[test]
fn fixture_start_showing_turn() {
    let msg = decode(json!({
        "event": "start_showing",
        "data": {"show_art_order": ["p2", "p1", "p3"], "now_showing": 1, "show_time": 15}
    }));
    match msg {
        ServerMessage::StartShowing(p) => {
            assert_eq!(p.current_turn().map(String::as_str), Some("p1"));
            assert_eq!(p.show_time, Some(15));
        }
        other => panic!("expected StartShowing, got {other:?}"),
    }

    let past_end = decode(json!({
        "event": "start_showing",
        "data": {"show_art_order": ["p1"], "now_showing": 4}
    }));
    match past_end {
        ServerMessage::StartShowing(p) => assert_eq!(p.current_turn(), None),
        other => panic!("expected StartShowing, got {other:?}"),
    }
}

#[test]
fn fixture_voting_spy_result() {
    let msg = decode(json!({
        "event": "voting_spy_result",
        "data": {
            "spy_is": "P1",
            "vote_counts": {"P1": 2, "P2": 0, "P3": 1},
            "vote_results": {"P1": ["P2", "P3"], "P3": ["P1"]},
            "spy_options": ["cat", "dog"]
        }
    }));
    match msg {
        ServerMessage::VotingSpyResult(p) => {
            assert_eq!(p.spy_is, "P1");
            assert_eq!(p.vote_counts["P1"], 2);
            assert_eq!(p.vote_results["P1"], ["P2", "P3"]);
            assert_eq!(p.guess_spy_correct, None);
        }
        other => panic!("expected VotingSpyResult, got {other:?}"),
    }
}

#[test]
fn fixture_game_ended_with_gallery() {
    let msg = decode(json!({
        "event": "game_ended",
        "data": {
            "winType": "spyComeback",
            "correctAnswer": "cat",
            "spyGuess": " cat",
            "gallery": [{
                "player_name": "Alice",
                "gallery_data": [{
                    "round": 1,
                    "prompt": "a cat",
                    "image_data": ["aW1nMQ==", "aW1nMg=="],
                    "selectedImage": 1
                }]
            }]
        }
    }));
    match msg {
        ServerMessage::GameEnded(p) => {
            assert_eq!(p.win_type, Some(WinType::SpyComeback));
            assert!(p.spy_guessed_correctly());
            let entry: &GalleryEntry = &p.gallery[0];
            let submission: &Submission = &entry.gallery_data[0];
            assert_eq!(submission.selected(), Some("aW1nMg=="));
            assert_eq!(submission.unselected().collect::<Vec<_>>(), ["aW1nMQ=="]);
        }
        other => panic!("expected GameEnded, got {other:?}"),
    }
}

#[test]
fn explicit_correct_flag_wins_over_word_comparison() {
    let msg = decode(json!({
        "event": "game_ended",
        "data": {"correctAnswer": "cat", "spyGuess": "cat", "correct": false}
    }));
    match msg {
        ServerMessage::GameEnded(p) => assert!(!p.spy_guessed_correctly()),
        other => panic!("expected GameEnded, got {other:?}"),
    }
}

#[test]
fn guess_comparison_trims_but_keeps_case() {
    for (guess, expected) in [(" cat ", true), ("Cat", false), ("cats", false)] {
        let msg = decode(json!({
            "event": "game_ended",
            "data": {"correctAnswer": "cat", "spyGuess": guess}
        }));
        match msg {
            ServerMessage::GameEnded(p) => {
                assert_eq!(p.spy_guessed_correctly(), expected, "{guess:?}");
            }
            other => panic!("expected GameEnded, got {other:?}"),
        }
    }
}

#[test]
fn fixture_error_and_pong() {
    assert_eq!(
        decode(json!({"event": "error", "data": {"message": "room is full"}})),
        ServerMessage::Error {
            message: Some("room is full".into())
        }
    );
    assert_eq!(
        decode(json!({"event": "error", "data": {}})),
        ServerMessage::Error { message: None }
    );
    assert_eq!(decode(json!({"event": "pong"})), ServerMessage::Pong);
}

#[test]
fn unknown_event_is_a_decode_error() {
    let result: Result<ServerMessage, _> =
        serde_json::from_value(json!({"event": "start_game", "data": {}}));
    assert!(result.is_err());
}

// ════════════════════════════════════════════════════════════════════
// Event kinds
// ════════════════════════════════════════════════════════════════════

#[test]
fn event_kind_names_parse_back() {
    for kind in EventKind::ALL {
        assert_eq!(kind.as_str().parse::<EventKind>(), Ok(kind));
        assert_eq!(kind.to_string(), kind.as_str());
    }
    assert!("get_myArt".parse::<EventKind>().is_err());
}

#[test]
fn event_kind_matches_wire_tag() {
    let samples = [
        decode(json!({"event": "connected", "data": {}})),
        decode(json!({"event": "drawing_finished", "data": {}})),
        decode(json!({"event": "my_art", "data": {"image_data": []}})),
        decode(json!({"event": "player_play_again", "data": {"player_id": "p1"}})),
        decode(json!({"event": "write_drawing_prompt", "data": {"round": 2}})),
    ];
    for msg in samples {
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["event"], msg.kind().as_str());
    }
}

#[test]
fn server_phase_names() {
    for phase in [
        ServerPhase::Waiting,
        ServerPhase::VotingTopic,
        ServerPhase::ShowTopic,
        ServerPhase::Drawing,
        ServerPhase::ShowArt,
        ServerPhase::Voting,
        ServerPhase::SpyGuess,
        ServerPhase::Ended,
    ] {
        assert_eq!(phase.as_str().parse::<ServerPhase>(), Ok(phase));
        assert_eq!(serde_json::to_value(phase).unwrap(), json!(phase.as_str()));
    }
}
