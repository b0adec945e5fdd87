//! End-to-end relay behavior over real WebSocket connections.

mod common;

use common::{
    Client, TestServer, assert_closed, assert_silent, connect, eventually, recv, recv_close_code,
    spawn_default_server, spawn_server,
};
use futures::SinkExt;
use roomcast_server::config::Config;
use roomcast_types::RoomId;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

#[tokio::test]
async fn test_alpha_scenario() {
    let server = spawn_default_server().await;

    let mut a = connect(&server, "/alpha").await;
    a.send(Message::text("hello")).await.unwrap();

    let mut b = connect(&server, "/alpha").await;
    assert_eq!(recv(&mut b).await, Message::text("hello"));

    a.send(Message::text("world")).await.unwrap();
    assert_eq!(recv(&mut b).await, Message::text("world"));
    assert_silent(&mut a).await;

    let mut c = connect(&server, "/alpha").await;
    assert_eq!(recv(&mut c).await, Message::text("hello"));
    assert_eq!(recv(&mut c).await, Message::text("world"));
    assert_silent(&mut c).await;
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn test_rooms_are_isolated() {
    let server = spawn_default_server().await;

    let mut d = connect(&server, "/alpha").await;
    let mut a = connect(&server, "/beta").await;
    a.send(Message::text("x")).await.unwrap();

    // A second beta member proves "x" has been recorded before checking alpha
    let mut e = connect(&server, "/beta").await;
    assert_eq!(recv(&mut e).await, Message::text("x"));

    assert_silent(&mut d).await;
    let alpha = server.state.engine.registry().get(&RoomId::from("/alpha")).unwrap();
    assert_eq!(alpha.history_len(), 0);
}

#[tokio::test]
async fn test_order_preserved_across_senders() {
    let server = spawn_default_server().await;

    let mut a = connect(&server, "/order").await;
    let mut b = connect(&server, "/order").await;
    let mut observer = connect(&server, "/order").await;
    eventually(|| {
        server
            .state
            .engine
            .registry()
            .get(&RoomId::from("/order"))
            .is_some_and(|room| room.member_count() == 3)
    })
    .await;

    for i in 0..20 {
        a.send(Message::text(format!("a{}", i))).await.unwrap();
    }
    for i in 0..20 {
        b.send(Message::text(format!("b{}", i))).await.unwrap();
    }

    let mut live = Vec::new();
    for _ in 0..40 {
        live.push(recv(&mut observer).await);
    }

    // A late joiner's replay must match what the live observer saw.
    let mut late = connect(&server, "/order").await;
    for expected in &live {
        assert_eq!(&recv(&mut late).await, expected);
    }

    let a_frames: Vec<_> = live.iter().filter(|m| m.to_text().unwrap().starts_with('a')).collect();
    let expected_a: Vec<_> = (0..20).map(|i| Message::text(format!("a{}", i))).collect();
    assert_eq!(a_frames, expected_a.iter().collect::<Vec<_>>());
}

#[tokio::test]
async fn test_binary_flag_and_bytes_preserved() {
    let server = spawn_default_server().await;

    let mut a = connect(&server, "/doc").await;
    let mut b = connect(&server, "/doc").await;
    eventually(|| {
        server
            .state
            .engine
            .registry()
            .get(&RoomId::from("/doc"))
            .is_some_and(|room| room.member_count() == 2)
    })
    .await;

    let update = vec![0u8, 1, 2, 255, 254, 0, 128];
    a.send(Message::binary(update.clone())).await.unwrap();
    a.send(Message::text("{\"cursor\":3}")).await.unwrap();

    let first = recv(&mut b).await;
    assert!(first.is_binary());
    assert_eq!(first.into_data().to_vec(), update);

    let second = recv(&mut b).await;
    assert!(second.is_text());
    assert_eq!(second.to_text().unwrap(), "{\"cursor\":3}");
}

#[tokio::test]
async fn test_history_survives_empty_room() {
    let server = spawn_default_server().await;

    {
        let mut a = connect(&server, "/persist").await;
        a.send(Message::binary(vec![1u8, 2, 3])).await.unwrap();
        a.send(Message::text("second")).await.unwrap();
        let _ = a.close(None).await;
    }

    let room_id = RoomId::from("/persist");
    eventually(|| {
        server
            .state
            .engine
            .registry()
            .get(&room_id)
            .is_some_and(|room| room.member_count() == 0 && room.history_len() == 2)
    })
    .await;

    let mut b = connect(&server, "/persist").await;
    assert_eq!(recv(&mut b).await, Message::binary(vec![1u8, 2, 3]));
    assert_eq!(recv(&mut b).await, Message::text("second"));
    assert_silent(&mut b).await;
}

#[tokio::test]
async fn test_query_string_is_part_of_room_id() {
    let server = spawn_default_server().await;

    let mut a = connect(&server, "/doc?v=1").await;
    a.send(Message::text("v1 only")).await.unwrap();

    let mut same = connect(&server, "/doc?v=1").await;
    assert_eq!(recv(&mut same).await, Message::text("v1 only"));

    let mut other = connect(&server, "/doc").await;
    assert_silent(&mut other).await;
    assert_eq!(server.state.engine.registry().len(), 2);
}

#[tokio::test]
async fn test_oversized_message_closes_connection() {
    let server = spawn_server(Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_message_size: 1024,
        ..Config::default()
    })
    .await;

    let mut a = connect(&server, "/limits").await;
    a.send(Message::binary(vec![7u8; 4096])).await.unwrap();
    assert_closed(&mut a).await;

    let room_id = RoomId::from("/limits");
    eventually(|| {
        server
            .state
            .engine
            .registry()
            .get(&room_id)
            .is_some_and(|room| room.member_count() == 0)
    })
    .await;
    let room = server.state.engine.registry().get(&room_id).unwrap();
    assert_eq!(room.history_len(), 0);

    // The room still works for everyone else
    let mut b = connect(&server, "/limits").await;
    let mut c = connect(&server, "/limits").await;
    eventually(|| room.member_count() == 2).await;
    b.send(Message::text("small")).await.unwrap();
    assert_eq!(recv(&mut c).await, Message::text("small"));
}

#[tokio::test]
async fn test_client_close_is_answered() {
    let server = spawn_default_server().await;

    let mut a = connect(&server, "/polite").await;
    let room_id = RoomId::from("/polite");
    eventually(|| {
        server
            .state
            .engine
            .registry()
            .get(&room_id)
            .is_some_and(|room| room.member_count() == 1)
    })
    .await;

    a.close(None).await.unwrap();
    assert!(matches!(recv(&mut a).await, Message::Close(_)));

    let room = server.state.engine.registry().get(&room_id).unwrap();
    eventually(|| room.member_count() == 0).await;
}

#[tokio::test]
async fn test_shutdown_closes_every_connection_before_serve_returns() {
    let mut server = spawn_default_server().await;

    let mut clients = Vec::new();
    for _ in 0..20 {
        clients.push(connect(&server, "/bye").await);
    }
    let room_id = RoomId::from("/bye");
    eventually(|| {
        server
            .state
            .engine
            .registry()
            .get(&room_id)
            .is_some_and(|room| room.member_count() == 20)
    })
    .await;

    server.shutdown().await;

    // Nothing may still be registered once serve has returned.
    let room = server.state.engine.registry().get(&room_id).unwrap();
    assert_eq!(room.member_count(), 0);
    assert!(server.state.connections().is_empty());

    for client in clients.iter_mut() {
        assert_eq!(recv_close_code(client).await, CloseCode::Away);
    }
}

const MIB: usize = 1024 * 1024;

/// Three members in `room`: `slow` never reads, `fast` reads every frame.
/// Pushes 1 MiB frames from `sender` in lockstep with `fast` until the
/// relay evicts `slow`.
async fn flood_past_slow_member(server: &TestServer, room: &str) -> (Client, Client, Client) {
    let room_id = RoomId::from(room);
    let slow = connect(server, room).await;
    let mut sender = connect(server, room).await;
    let mut fast = connect(server, room).await;
    eventually(|| {
        server
            .state
            .engine
            .registry()
            .get(&room_id)
            .is_some_and(|room| room.member_count() == 3)
    })
    .await;

    for i in 0..40u8 {
        sender.send(Message::binary(vec![i; MIB])).await.unwrap();
        let frame = recv(&mut fast).await.into_data();
        assert_eq!(frame.len(), MIB);
        assert_eq!(frame[0], i);
    }

    let room = server.state.engine.registry().get(&room_id).unwrap();
    eventually(|| room.member_count() == 2).await;
    assert_eq!(room.history_len(), 40);
    (slow, sender, fast)
}

fn slow_consumer_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        outbound_buffer: 2,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_slow_consumer_is_evicted_without_blocking_the_room() {
    let server = spawn_server(slow_consumer_config()).await;
    let (mut slow, mut sender, mut fast) = flood_past_slow_member(&server, "/slow").await;

    sender.send(Message::text("after")).await.unwrap();
    assert_eq!(recv(&mut fast).await, Message::text("after"));

    assert_eq!(recv_close_code(&mut slow).await, CloseCode::Again);
}

#[tokio::test]
async fn test_evicted_member_that_keeps_sending_still_gets_close_code() {
    let server = spawn_server(slow_consumer_config()).await;
    let (mut slow, _sender, mut fast) = flood_past_slow_member(&server, "/slow-talker").await;

    slow.send(Message::text("still here")).await.unwrap();
    assert_eq!(recv_close_code(&mut slow).await, CloseCode::Again);

    // The evicted member's frame is neither recorded nor relayed
    assert_silent(&mut fast).await;
    let room = server.state.engine.registry().get(&RoomId::from("/slow-talker")).unwrap();
    assert_eq!(room.history_len(), 40);
}
