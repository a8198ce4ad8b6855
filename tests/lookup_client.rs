use httpmock::prelude::*;
use nfc_spool_scanner::lookup::{LookupClient, LookupResult, SpoolId, TransportError};
use nfc_spool_scanner::TagUid;
use std::time::Duration;

const SCANNER_ID: &str = "workshop_01";

fn tag() -> TagUid {
    "04A23B11000007".parse().unwrap()
}

#[tokio::test]
async fn test_lookup_found_spool() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/nfc_lookup.php")
                .header("user-agent", "ACR122U-Scanner/workshop_01")
                .json_body_partial(
                    r#"{"nfc_uid": "04A23B11000007", "scanner_id": "workshop_01", "reader_type": "ACR122U"}"#,
                );
            then.status(200).json_body(serde_json::json!({
                "found": true,
                "spool": {
                    "id": 12,
                    "uuid": "9f1c2a",
                    "material": "PETG",
                    "color_name": "Galaxy Black",
                    "remaining_weight": 640.5,
                    "total_weight": 1000,
                    "location": "Shelf A2"
                },
                "nfc_info": {"tag_type": "NTAG213", "is_primary": 1}
            }));
        })
        .await;

    let client = LookupClient::new(&server.base_url(), SCANNER_ID).unwrap();
    let result = client.lookup(&tag()).await;

    mock.assert_async().await;
    match result {
        LookupResult::Found { spool, nfc_info } => {
            assert_eq!(spool.id, SpoolId::Number(12));
            assert_eq!(spool.material.as_deref(), Some("PETG"));
            assert_eq!(spool.color_name.as_deref(), Some("Galaxy Black"));
            assert_eq!(spool.remaining_weight, 640.5);
            assert_eq!(spool.location.as_deref(), Some("Shelf A2"));
            let nfc_info = nfc_info.unwrap();
            assert_eq!(nfc_info.tag_type.as_deref(), Some("NTAG213"));
            assert_eq!(nfc_info.is_primary, Some(true));
        }
        other => panic!("expected Found, got {other:?}"),
    }
}

#[tokio::test]
async fn test_lookup_unknown_tag() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/nfc_lookup.php");
            then.status(200)
                .json_body(serde_json::json!({"found": false, "message": "Tag not registered"}));
        })
        .await;

    let client = LookupClient::new(&server.base_url(), SCANNER_ID).unwrap();
    assert_eq!(client.lookup(&tag()).await, LookupResult::NotFound);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_base_url_with_trailing_slash() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/nfc_lookup.php");
            then.status(200).json_body(serde_json::json!({"found": false}));
        })
        .await;

    let client = LookupClient::new(&format!("{}/", server.base_url()), SCANNER_ID).unwrap();
    assert_eq!(client.endpoint(), server.url("/nfc_lookup.php"));
    assert_eq!(client.lookup(&tag()).await, LookupResult::NotFound);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_keeps_body_excerpt() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/nfc_lookup.php");
            then.status(500).body("Database connection failed");
        })
        .await;

    let client = LookupClient::new(&server.base_url(), SCANNER_ID).unwrap();
    assert_eq!(
        client.lookup(&tag()).await,
        LookupResult::TransportError(TransportError::Status {
            code: 500,
            excerpt: "Database connection failed".to_string(),
        })
    );
}

#[tokio::test]
async fn test_invalid_json_is_decode_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/nfc_lookup.php");
            then.status(200).body("<html>maintenance</html>");
        })
        .await;

    let client = LookupClient::new(&server.base_url(), SCANNER_ID).unwrap();
    assert!(matches!(
        client.lookup(&tag()).await,
        LookupResult::TransportError(TransportError::Decode(_))
    ));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/nfc_lookup.php");
            then.status(200)
                .delay(Duration::from_secs(2))
                .json_body(serde_json::json!({"found": false}));
        })
        .await;

    let client =
        LookupClient::with_timeout(&server.base_url(), SCANNER_ID, Duration::from_millis(100))
            .unwrap();
    assert!(matches!(
        client.lookup(&tag()).await,
        LookupResult::TransportError(TransportError::Timeout(_))
    ));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    // grab a free port, then close it again
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    let client = LookupClient::new(&format!("http://{addr}"), SCANNER_ID).unwrap();
    assert!(matches!(
        client.lookup(&tag()).await,
        LookupResult::TransportError(TransportError::Network(_))
    ));
}
