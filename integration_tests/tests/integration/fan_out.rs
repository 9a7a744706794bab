use anyhow::Result;
use std::time::Duration;

use signaling_protocol::{
    CandidateMessage, DescriptionMessage, SignalingMessage,
};
use signaling_server::ServerConfig;

use crate::test_utils::{TestClient, TestServer};

#[tokio::test]
async fn two_peer_echo() -> Result<()> {
    let server = TestServer::spawn(ServerConfig::default()).await?;

    let mut alice =
        TestClient::connect(&server, "room", "alice").await?;

    // The first envelope carries the relay list, empty here.
    let relays = alice.recv().await?;
    assert!(relays.control.is_none());
    assert!(relays.description.is_none());
    assert!(relays.candidate.is_none());

    // Control message for Alice's own attach.
    let control = alice.recv().await?.control.expect("control");
    let alice_id = control.peer_id;
    assert_eq!(control.peers.len(), 1);
    assert_eq!(control.peers[0].name, "alice");
    assert_eq!(control.peers[0].id, alice_id);

    let mut bob =
        TestClient::connect(&server, "room", "bob").await?;
    let _relays = bob.recv().await?;
    let bob_control = bob.recv().await?.control.expect("control");
    assert_eq!(bob_control.peers.len(), 2);
    assert_ne!(bob_control.peer_id, alice_id);

    // Bob's attach triggers a second control message for Alice,
    // still carrying her own id.
    let second = alice.recv().await?.control.expect("control");
    assert_eq!(second.peer_id, alice_id);
    assert_eq!(second.peers.len(), 2);

    let offer = SignalingMessage {
        description: Some(DescriptionMessage {
            spd: "v=0".to_owned(),
            description_type: "offer".to_owned(),
        }),
        ..Default::default()
    };
    alice.send(&offer).await?;

    // Bob receives the exact envelope; Alice receives nothing.
    let received = bob.recv().await?;
    assert_eq!(received, offer);
    assert!(alice
        .recv_within(Duration::from_millis(500))
        .await
        .is_err());

    Ok(())
}

#[tokio::test]
async fn three_peer_fan_out() -> Result<()> {
    let server = TestServer::spawn(ServerConfig::default()).await?;

    // Attach one peer at a time, draining the relays envelope and
    // the control messages of every attach so far.
    let mut a = TestClient::connect(&server, "trio", "a").await?;
    a.recv().await?;
    a.recv().await?;

    let mut b = TestClient::connect(&server, "trio", "b").await?;
    b.recv().await?;
    b.recv().await?;
    a.recv().await?;

    let mut c = TestClient::connect(&server, "trio", "c").await?;
    c.recv().await?;
    c.recv().await?;
    a.recv().await?;
    b.recv().await?;

    let candidate = SignalingMessage {
        candidate: Some(CandidateMessage {
            spd: "cand:1".to_owned(),
            mid: "0".to_owned(),
        }),
        ..Default::default()
    };
    b.send(&candidate).await?;

    assert_eq!(a.recv().await?, candidate);
    assert_eq!(c.recv().await?, candidate);
    assert!(b
        .recv_within(Duration::from_millis(500))
        .await
        .is_err());

    Ok(())
}

#[tokio::test]
async fn messages_arrive_in_send_order() -> Result<()> {
    let server = TestServer::spawn(ServerConfig::default()).await?;

    let mut sender =
        TestClient::connect(&server, "ordered", "sender").await?;
    sender.recv().await?;
    sender.recv().await?;

    let mut receiver =
        TestClient::connect(&server, "ordered", "receiver")
            .await?;
    receiver.recv().await?;
    receiver.recv().await?;
    sender.recv().await?;

    for i in 0..50 {
        let message = SignalingMessage {
            candidate: Some(CandidateMessage {
                spd: format!("cand:{}", i),
                mid: i.to_string(),
            }),
            ..Default::default()
        };
        sender.send(&message).await?;
    }

    for i in 0..50 {
        let message = receiver.recv().await?;
        let candidate = message.candidate.expect("candidate");
        assert_eq!(candidate.spd, format!("cand:{}", i));
    }

    Ok(())
}

#[tokio::test]
async fn oversized_frames_close_only_the_offender() -> Result<()> {
    let server = TestServer::spawn(ServerConfig::default()).await?;

    let mut a = TestClient::connect(&server, "caps", "a").await?;
    a.recv().await?;
    a.recv().await?;

    let mut b = TestClient::connect(&server, "caps", "b").await?;
    b.recv().await?;
    b.recv().await?;
    a.recv().await?;

    // A frame above the 4 KiB cap terminates the sending
    // connection.
    let oversized = format!(
        r#"{{"candidate":{{"spd":"{}","mid":"0"}}}}"#,
        "x".repeat(8192)
    );
    a.send_text(oversized).await?;
    a.expect_close(Duration::from_secs(5)).await?;

    // A detach is not a removal, so the other peer sees no
    // control message and stays attached.
    assert!(b
        .recv_within(Duration::from_millis(500))
        .await
        .is_err());

    let body = crate::test_utils::admin_get(
        &server.http("/api/v1/session/caps"),
    )
    .await?;
    let peers = body["session"]["peers"]
        .as_array()
        .expect("peer list")
        .clone();
    for peer in &peers {
        match peer["name"].as_str() {
            Some("a") => {
                assert!(peer.get("connected").is_none())
            }
            Some("b") => {
                assert!(peer.get("connected").is_some())
            }
            other => panic!("unexpected peer {:?}", other),
        }
    }

    Ok(())
}
