use anyhow::Result;
use std::time::Duration;

use signaling_server::{ApiConfig, ServerConfig, SessionConfig};

use crate::test_utils::{admin_get, TestClient, TestServer};

#[tokio::test]
async fn sessions_resource() -> Result<()> {
    let server = TestServer::spawn(ServerConfig::default()).await?;
    let client = reqwest::Client::new();

    let body =
        admin_get(&server.http("/api/v1/sessions")).await?;
    assert_eq!(body["sessions"].as_array().unwrap().len(), 0);

    // GET does not create sessions; POST does.
    let response = client
        .get(server.http("/api/v1/session/s0"))
        .send()
        .await?;
    assert_eq!(response.status(), 404);
    let error: serde_json::Value = response.json().await?;
    assert_eq!(error["status"], "Not Found");
    assert!(error["error"].as_str().unwrap().contains("s0"));

    let response = client
        .post(server.http("/api/v1/session/s0"))
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["session"]["name"], "s0");
    assert_eq!(
        body["session"]["peers"].as_array().unwrap().len(),
        0
    );

    let body =
        admin_get(&server.http("/api/v1/session/s0")).await?;
    assert_eq!(body["session"]["name"], "s0");

    let body =
        admin_get(&server.http("/api/v1/sessions")).await?;
    assert_eq!(body["sessions"].as_array().unwrap().len(), 1);

    Ok(())
}

#[tokio::test]
async fn post_signals_updates_the_peer() -> Result<()> {
    let server = TestServer::spawn(ServerConfig::default()).await?;
    let client = reqwest::Client::new();

    let response = client
        .post(server.http("/api/v1/peer/s/p"))
        .json(&serde_json::json!({
            "peer": {
                "signals": [
                    {"name": "v", "type": "float", "unit": "V"}
                ]
            }
        }))
        .send()
        .await?;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["peer"]["name"], "p");
    assert_eq!(
        body["peer"]["signals"],
        serde_json::json!([
            {"name": "v", "type": "float", "unit": "V"}
        ])
    );

    // The update is visible on subsequent reads.
    let body = admin_get(&server.http("/api/v1/peer/s/p")).await?;
    assert_eq!(
        body["peer"]["signals"][0]["name"],
        "v"
    );

    Ok(())
}

#[tokio::test]
async fn malformed_peer_bodies_are_rejected() -> Result<()> {
    let server = TestServer::spawn(ServerConfig::default()).await?;
    let client = reqwest::Client::new();

    // A JSON body without the peer field.
    let response = client
        .post(server.http("/api/v1/peer/s/p"))
        .json(&serde_json::json!({"nope": 1}))
        .send()
        .await?;
    assert_eq!(response.status(), 400);
    let error: serde_json::Value = response.json().await?;
    assert_eq!(error["status"], "Bad Request");

    // A body that is not JSON at all.
    let response = client
        .post(server.http("/api/v1/peer/s/p"))
        .header("content-type", "application/json")
        .body("not json")
        .send()
        .await?;
    assert_eq!(response.status(), 400);

    Ok(())
}

#[tokio::test]
async fn unknown_records_yield_404() -> Result<()> {
    let server = TestServer::spawn(ServerConfig::default()).await?;
    let client = reqwest::Client::new();

    let response = client
        .get(server.http("/api/v1/peer/nope/p"))
        .send()
        .await?;
    assert_eq!(response.status(), 404);

    client
        .post(server.http("/api/v1/session/s"))
        .send()
        .await?;
    let response = client
        .get(server.http("/api/v1/peer/s/ghost"))
        .send()
        .await?;
    assert_eq!(response.status(), 404);

    let response = client
        .delete(server.http("/api/v1/peer/s/ghost"))
        .send()
        .await?;
    assert_eq!(response.status(), 404);

    Ok(())
}

#[tokio::test]
async fn empty_sessions_are_swept() -> Result<()> {
    let config = ServerConfig {
        session: SessionConfig {
            expiry: 1,
            reap_interval: 1,
        },
        ..Default::default()
    };
    let server = TestServer::spawn(config).await?;
    let client = reqwest::Client::new();

    client
        .post(server.http("/api/v1/session/doomed"))
        .send()
        .await?;
    let body =
        admin_get(&server.http("/api/v1/sessions")).await?;
    assert_eq!(body["sessions"].as_array().unwrap().len(), 1);

    tokio::time::sleep(Duration::from_millis(2500)).await;

    let response = client
        .get(server.http("/api/v1/session/doomed"))
        .send()
        .await?;
    assert_eq!(response.status(), 404);

    // A session with a peer survives the sweeper.
    let _peer = TestClient::connect(&server, "kept", "p").await?;
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let body =
        admin_get(&server.http("/api/v1/session/kept")).await?;
    assert_eq!(body["session"]["name"], "kept");

    Ok(())
}

#[tokio::test]
async fn admin_api_honours_the_shared_secret() -> Result<()> {
    let config = ServerConfig {
        api: ApiConfig {
            secret: Some("opensesame".to_owned()),
        },
        ..Default::default()
    };
    let server = TestServer::spawn(config).await?;
    let client = reqwest::Client::new();

    let response = client
        .get(server.http("/api/v1/sessions"))
        .send()
        .await?;
    assert_eq!(response.status(), 401);

    let response = client
        .get(server.http("/api/v1/sessions"))
        .basic_auth("admin", Some("wrong"))
        .send()
        .await?;
    assert_eq!(response.status(), 401);

    let response = client
        .get(server.http("/api/v1/sessions"))
        .basic_auth("admin", Some("opensesame"))
        .send()
        .await?;
    assert_eq!(response.status(), 200);

    Ok(())
}

#[tokio::test]
async fn service_endpoints() -> Result<()> {
    let server = TestServer::spawn(ServerConfig::default()).await?;
    let client = reqwest::Client::new();

    let response =
        client.get(server.http("/healthz")).send().await?;
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await?, "OK");

    let response =
        client.get(server.http("/metrics")).send().await?;
    assert_eq!(response.status(), 200);

    let response =
        client.get(server.http("/favicon.ico")).send().await?;
    assert_eq!(response.status(), 404);

    Ok(())
}
