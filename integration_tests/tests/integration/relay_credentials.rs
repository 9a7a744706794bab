use anyhow::Result;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use signaling_server::ServerConfig;

use crate::test_utils::{TestClient, TestServer};

#[tokio::test]
async fn first_envelope_carries_relay_credentials() -> Result<()> {
    let config = ServerConfig {
        relays: vec![
            "turn:example.org?secret=hunter2&ttl=60s".to_owned()
        ],
        ..Default::default()
    };
    let server = TestServer::spawn(config).await?;

    let before = Utc::now().timestamp();
    let mut client =
        TestClient::connect(&server, "room", "x").await?;
    let first = client.recv().await?;
    let after = Utc::now().timestamp();

    let relays = first.relays.expect("servers field");
    assert_eq!(relays.len(), 1);
    let relay = &relays[0];

    assert_eq!(relay.url, "turn:example.org");
    assert!(relay.realm.is_empty());

    // Effective username is "<expiry_unix>:villas" with the
    // expiry sixty seconds out.
    let (expiry, user) = relay
        .username
        .split_once(':')
        .expect("prefixed username");
    assert_eq!(user, "villas");
    let expiry: i64 = expiry.parse()?;
    assert!(expiry >= before + 60 && expiry <= after + 60);

    // Password is base64(HMAC-SHA1(secret, effective_user)).
    let mut digest = Hmac::<Sha1>::new_from_slice(b"hunter2")
        .expect("hmac accepts any key length");
    digest.update(relay.username.as_bytes());
    let expected = STANDARD.encode(digest.finalize().into_bytes());
    assert_eq!(relay.password, expected);

    // The expires field matches the username prefix.
    let expires = DateTime::parse_from_rfc3339(&relay.expires)?;
    assert_eq!(expires.timestamp(), expiry);

    Ok(())
}

#[tokio::test]
async fn static_relay_credentials_are_passed_through() -> Result<()>
{
    let config = ServerConfig {
        relays: vec![
            "turn:user:pass@turn.example.org:3478".to_owned()
        ],
        ..Default::default()
    };
    let server = TestServer::spawn(config).await?;

    let mut client =
        TestClient::connect(&server, "room", "x").await?;
    let first = client.recv().await?;

    let relays = first.relays.expect("servers field");
    assert_eq!(relays.len(), 1);
    assert_eq!(relays[0].url, "turn:turn.example.org:3478");
    assert_eq!(relays[0].username, "user");
    assert_eq!(relays[0].password, "pass");
    assert!(relays[0].expires.is_empty());

    Ok(())
}

#[tokio::test]
async fn invalid_relay_uris_abort_startup() {
    let config = ServerConfig {
        relays: vec!["http://not-a-relay.example.org".to_owned()],
        ..Default::default()
    };
    assert!(TestServer::spawn(config).await.is_err());
}
