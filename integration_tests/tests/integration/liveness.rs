use anyhow::Result;
use std::time::Duration;

use signaling_server::ServerConfig;

use crate::test_utils::{admin_get, TestClient, TestServer};

/// A peer that never acknowledges keep-alive pings is detached
/// once the read deadline expires.
#[tokio::test]
async fn silent_peer_is_detached() -> Result<()> {
    let server = TestServer::spawn(ServerConfig::default()).await?;

    let mut client =
        TestClient::connect(&server, "quiet", "p").await?;
    client.recv().await?;
    client.recv().await?;

    // Stop reading entirely; no pong ever reaches the server.
    tokio::time::sleep(Duration::from_secs(12)).await;

    let body =
        admin_get(&server.http("/api/v1/session/quiet")).await?;
    let peers = body["session"]["peers"]
        .as_array()
        .expect("peer list");
    assert_eq!(peers.len(), 1);
    assert!(peers[0].get("connected").is_none());

    Ok(())
}

/// A peer that keeps acknowledging pings stays attached well past
/// the read deadline.
#[tokio::test]
async fn responsive_peer_stays_attached() -> Result<()> {
    let server = TestServer::spawn(ServerConfig::default()).await?;

    let mut client =
        TestClient::connect(&server, "alive", "p").await?;
    client.recv().await?;
    client.recv().await?;

    client.pump(Duration::from_secs(12)).await?;

    let body =
        admin_get(&server.http("/api/v1/session/alive")).await?;
    let peers = body["session"]["peers"]
        .as_array()
        .expect("peer list");
    assert_eq!(peers.len(), 1);
    assert!(peers[0].get("connected").is_some());

    Ok(())
}
