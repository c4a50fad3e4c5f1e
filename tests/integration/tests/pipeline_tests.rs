//! Pipeline Integration Tests
//!
//! End-to-end scenarios on memory backends: sessions feed stanzas through
//! the dispatcher to modules, and module replies come back through the
//! local router. Upload scenarios go through the real HTTP listener.
//!
//! Run with: cargo test -p integration-tests --test pipeline_tests

use integration_tests::{
    account, disco_info_query, expect_silence, expect_stanza, last_query, request, server_jid,
    upload_request, TestServer,
};
use reqwest::StatusCode;
use stanza_cache::{RedisPool, RedisRepository};
use stanza_common::RedisConfig;
use stanza_core::{
    Element, Iq, IqType, Message, Presence, RosterItem, Stanza, StanzaErrorCondition,
    Subscription,
};
use stanza_gateway::GatewayError;
use stanza_service::modules::{DISCO_INFO_NAMESPACE, HTTP_UPLOAD_NAMESPACE, LAST_NAMESPACE};
use std::sync::Arc;

fn seconds(iq: &Iq) -> u64 {
    iq.payload_ns("query", LAST_NAMESPACE)
        .and_then(|q| q.attribute("seconds"))
        .and_then(|s| s.parse().ok())
        .expect("seconds attribute")
}

fn condition(iq: &Iq) -> Option<StanzaErrorCondition> {
    iq.error.as_ref().map(|e| e.condition)
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server
        .get(&format!("{}/healthz", server.base_url()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    server.shutdown().await;
}

// ============================================================================
// Session Tests
// ============================================================================

#[tokio::test]
async fn test_session_binding() {
    let server = TestServer::start().await.expect("Failed to start server");

    let session = server.connect("noelia@jackal.im/yard").await.unwrap();
    assert_eq!(server.state.connections().connection_count(), 1);

    let err = server.connect("noelia@jackal.im/yard").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GatewayError>(),
        Some(GatewayError::SessionConflict(_))
    ));

    let err = server.connect("noelia@jackal.im").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GatewayError>(),
        Some(GatewayError::InvalidJid(_))
    ));

    let err = server.connect("romeo@montague.lit/balcony").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<GatewayError>(),
        Some(GatewayError::InvalidJid(_))
    ));

    session.close().await.unwrap();
    assert_eq!(server.state.connections().connection_count(), 0);
    assert!(server
        .state
        .resource_manager()
        .get_resources("noelia")
        .await
        .unwrap()
        .is_empty());
    server.shutdown().await;
}

#[tokio::test]
async fn test_message_delivery_stamps_sender() {
    let server = TestServer::start().await.expect("Failed to start server");
    let noelia = server.connect("noelia@jackal.im/yard").await.unwrap();
    let mut romeo = server.connect("romeo@jackal.im/balcony").await.unwrap();

    noelia
        .send(Message::chat("wherefore art thou").with_to(account("romeo", None)))
        .await
        .unwrap();

    let Stanza::Message(message) = expect_stanza(&mut romeo).await.unwrap() else {
        panic!("expected message");
    };
    assert_eq!(message.body.as_deref(), Some("wherefore art thou"));
    assert_eq!(message.from, Some(account("noelia", Some("yard"))));
    server.shutdown().await;
}

#[tokio::test]
async fn test_message_to_offline_user_is_answered() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut noelia = server.connect("noelia@jackal.im/yard").await.unwrap();

    noelia
        .send(
            Message::chat("anyone?")
                .with_id("m-1")
                .with_to(account("romeo", None)),
        )
        .await
        .unwrap();

    let reply = expect_stanza(&mut noelia).await.unwrap();
    assert_eq!(reply.id(), Some("m-1"));
    assert_eq!(
        reply.error_condition(),
        Some(StanzaErrorCondition::ServiceUnavailable)
    );
    server.shutdown().await;
}

// ============================================================================
// Last Activity Tests
// ============================================================================

#[tokio::test]
async fn test_server_uptime() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut noelia = server.connect("noelia@jackal.im/yard").await.unwrap();

    let reply = request(&mut noelia, last_query(server_jid())).await.unwrap();

    assert_eq!(reply.iq_type, IqType::Result);
    assert!(seconds(&reply) < 60);
    server.shutdown().await;
}

#[tokio::test]
async fn test_last_activity_after_logout() {
    let server = TestServer::start().await.expect("Failed to start server");
    server
        .state
        .repository()
        .upsert_roster_item(&RosterItem::new(
            "romeo",
            "noelia@jackal.im",
            Subscription::Both,
        ))
        .await
        .unwrap();

    let mut noelia = server.connect("noelia@jackal.im/yard").await.unwrap();
    let romeo = server.connect("romeo@jackal.im/balcony").await.unwrap();
    romeo.send(Presence::available()).await.unwrap();

    // Online: no idle time
    let reply = request(&mut noelia, last_query(account("romeo", None)))
        .await
        .unwrap();
    assert_eq!(reply.iq_type, IqType::Result);
    assert_eq!(seconds(&reply), 0);

    // Closing an available session stores its last activity
    romeo.close().await.unwrap();
    let stored = server
        .state
        .repository()
        .fetch_last("romeo")
        .await
        .unwrap()
        .expect("last activity stored on logout");
    assert_eq!(stored.username, "romeo");
    assert_eq!(server.storage_operations("upsert_last", "success"), 1);

    let reply = request(&mut noelia, last_query(account("romeo", None)))
        .await
        .unwrap();
    assert_eq!(reply.iq_type, IqType::Result);
    assert!(seconds(&reply) < 60);
    server.shutdown().await;
}

#[tokio::test]
async fn test_unavailable_presence_status_is_stored() {
    let server = TestServer::start().await.expect("Failed to start server");
    let romeo = server.connect("romeo@jackal.im/balcony").await.unwrap();

    romeo
        .send(Presence::unavailable().with_status("Gone to Mantua"))
        .await
        .unwrap();
    romeo.close().await.unwrap();

    let stored = server
        .state
        .repository()
        .fetch_last("romeo")
        .await
        .unwrap()
        .expect("last activity stored");
    assert_eq!(stored.status, "Gone to Mantua");
    assert_eq!(server.storage_operations("upsert_last", "success"), 1);
    server.shutdown().await;
}

#[tokio::test]
async fn test_logout_after_unavailable_stores_once() {
    let server = TestServer::start().await.expect("Failed to start server");
    let romeo = server.connect("romeo@jackal.im/balcony").await.unwrap();

    romeo.send(Presence::available()).await.unwrap();
    romeo
        .send(Presence::unavailable().with_status("Banished"))
        .await
        .unwrap();
    romeo.close().await.unwrap();

    // The session was already unavailable, so teardown adds no second write
    assert_eq!(server.storage_operations("upsert_last", "success"), 1);
    let stored = server
        .state
        .repository()
        .fetch_last("romeo")
        .await
        .unwrap()
        .expect("last activity stored");
    assert_eq!(stored.status, "Banished");
    server.shutdown().await;
}

#[tokio::test]
async fn test_last_activity_forbidden_without_subscription() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut juliet = server.connect("juliet@jackal.im/garden").await.unwrap();

    let reply = request(&mut juliet, last_query(account("romeo", None)))
        .await
        .unwrap();

    assert_eq!(reply.iq_type, IqType::Error);
    assert_eq!(condition(&reply), Some(StanzaErrorCondition::Forbidden));
    assert_eq!(reply.from, Some(account("romeo", None)));
    server.shutdown().await;
}

#[tokio::test]
async fn test_full_jid_query_is_vetoed() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut noelia = server.connect("noelia@jackal.im/yard").await.unwrap();
    let mut romeo = server.connect("romeo@jackal.im/balcony").await.unwrap();

    let reply = request(&mut noelia, last_query(account("romeo", Some("balcony"))))
        .await
        .unwrap();

    assert_eq!(condition(&reply), Some(StanzaErrorCondition::Forbidden));
    assert_eq!(reply.from, Some(account("romeo", Some("balcony"))));
    expect_silence(&mut romeo).await.unwrap();
    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_namespace() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut noelia = server.connect("noelia@jackal.im/yard").await.unwrap();

    let iq = Iq::get("unknown-1").with_to(server_jid()).with_payload(
        Element::builder("query")
            .namespace("urn:xmpp:unknown")
            .build(),
    );
    let reply = request(&mut noelia, iq.into()).await.unwrap();

    assert_eq!(
        condition(&reply),
        Some(StanzaErrorCondition::ServiceUnavailable)
    );
    server.shutdown().await;
}

// ============================================================================
// Service Discovery Tests
// ============================================================================

#[tokio::test]
async fn test_server_features() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut noelia = server.connect("noelia@jackal.im/yard").await.unwrap();

    let reply = request(&mut noelia, disco_info_query(server_jid()))
        .await
        .unwrap();

    let features: Vec<&str> = reply
        .payload_ns("query", DISCO_INFO_NAMESPACE)
        .expect("disco query")
        .children()
        .iter()
        .filter_map(|c| c.attribute("var"))
        .collect();
    assert!(features.contains(&LAST_NAMESPACE));
    assert!(features.contains(&HTTP_UPLOAD_NAMESPACE));
    assert!(features.contains(&DISCO_INFO_NAMESPACE));
    server.shutdown().await;
}

// ============================================================================
// HTTP Upload Tests
// ============================================================================

fn slot_urls(iq: &Iq) -> (String, String) {
    let slot = iq
        .payload_ns("slot", HTTP_UPLOAD_NAMESPACE)
        .expect("slot element");
    let url = |name: &str| {
        slot.child(name)
            .and_then(|e| e.attribute("url"))
            .map(ToString::to_string)
            .expect("slot url")
    };
    (url("put"), url("get"))
}

#[tokio::test]
async fn test_upload_round_trip() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut noelia = server.connect("noelia@jackal.im/yard").await.unwrap();
    let content = b"balcony blueprints".to_vec();
    let size = content.len().to_string();

    let reply = request(
        &mut noelia,
        upload_request(&[
            ("filename", "plans.txt"),
            ("size", &size),
            ("content-type", "text/plain"),
        ]),
    )
    .await
    .unwrap();
    assert_eq!(reply.iq_type, IqType::Result);
    let (put_url, get_url) = slot_urls(&reply);
    assert!(put_url.starts_with(&server.base_url()));
    assert!(put_url.ends_with("/plans.txt"));

    let response = server.put(&put_url, content.clone()).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = server.get(&get_url).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("text/plain")
    );
    assert_eq!(response.bytes().await.unwrap().to_vec(), content);
    server.shutdown().await;
}

#[tokio::test]
async fn test_upload_round_trip_with_reserved_characters() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut noelia = server.connect("noelia@jackal.im/yard").await.unwrap();
    let content = b"wherefore art thou".to_vec();
    let size = content.len().to_string();

    let reply = request(
        &mut noelia,
        upload_request(&[("filename", "my notes #1?.txt"), ("size", &size)]),
    )
    .await
    .unwrap();
    assert_eq!(reply.iq_type, IqType::Result);
    let (put_url, get_url) = slot_urls(&reply);
    assert!(put_url.ends_with("/my%20notes%20%231%3F.txt"));
    assert!(get_url.ends_with("/my%20notes%20%231%3F.txt"));

    let response = server.put(&put_url, content.clone()).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = server.get(&get_url).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.bytes().await.unwrap().to_vec(), content);
    server.shutdown().await;
}

#[tokio::test]
async fn test_upload_size_mismatch_rejected() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut noelia = server.connect("noelia@jackal.im/yard").await.unwrap();

    let reply = request(
        &mut noelia,
        upload_request(&[("filename", "a.txt"), ("size", "4")]),
    )
    .await
    .unwrap();
    let (put_url, get_url) = slot_urls(&reply);

    let response = server.put(&put_url, b"too long".to_vec()).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let response = server.get(&get_url).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    server.shutdown().await;
}

#[tokio::test]
async fn test_upload_request_validation() {
    let server = TestServer::start().await.expect("Failed to start server");
    let mut noelia = server.connect("noelia@jackal.im/yard").await.unwrap();

    let too_large = request(
        &mut noelia,
        upload_request(&[("filename", "movie.mkv"), ("size", "4096")]),
    )
    .await
    .unwrap();
    assert_eq!(
        condition(&too_large),
        Some(StanzaErrorCondition::NotAcceptable)
    );

    for attributes in [
        &[("filename", "a.txt")][..],
        &[("size", "12")][..],
        &[("filename", "a.txt"), ("size", "twelve")][..],
        &[("filename", "a.txt"), ("size", "0")][..],
        &[("filename", "a.txt"), ("size", "12"), ("color", "red")][..],
    ] {
        let reply = request(&mut noelia, upload_request(attributes))
            .await
            .unwrap();
        assert_eq!(
            condition(&reply),
            Some(StanzaErrorCondition::BadRequest),
            "attributes {attributes:?}"
        );
    }
    server.shutdown().await;
}

#[tokio::test]
async fn test_upload_on_redis_backend_is_internal_error() {
    let pool = RedisPool::from_config(&RedisConfig {
        url: "redis://127.0.0.1:6399".to_string(),
        max_connections: 1,
    })
    .unwrap();
    let server = TestServer::start_with_repository(Arc::new(RedisRepository::new(pool)))
        .await
        .expect("Failed to start server");
    let mut noelia = server.connect("noelia@jackal.im/yard").await.unwrap();

    let reply = request(
        &mut noelia,
        upload_request(&[("filename", "a.txt"), ("size", "12")]),
    )
    .await
    .unwrap();

    assert_eq!(
        condition(&reply),
        Some(StanzaErrorCondition::InternalServerError)
    );
    expect_silence(&mut noelia).await.unwrap();
    server.shutdown().await;
}
