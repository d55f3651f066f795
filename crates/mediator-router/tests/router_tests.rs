//! Router tests
//!
//! Drives the router through in-memory handles:
//! - Connect handshake
//! - Login, relogin and logout
//! - Peer routing and payload forwarding
//! - Validation failures and the generic error responses
//! - Dictionaries and statistics

use mediator_core::msg;
use mediator_router::{
    CandidateSource, ConnectionHandler, Dictionary, DictionaryProvider, Router, RouterConfig,
    StatKey,
};
use mediator_test_utils::RecordingHandle;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn send(router: &Router, handle: &Arc<RecordingHandle>, message: Value) {
    router.handle(&handle.peer(), &message.to_string());
}

fn login(router: &Router, handle: &Arc<RecordingHandle>, name: &str, session: &str) {
    send(
        router,
        handle,
        json!({"type": "login", "name": name, "session": session}),
    );
    let reply = handle.take();
    assert_eq!(reply.len(), 1);
    assert_eq!(reply[0]["success"], true, "login of {} failed", name);
}

// ============================================================================
// Connect
// ============================================================================

#[test]
fn test_connect_assigns_session() {
    let router = Router::default();
    let handle = RecordingHandle::new();

    router.open(&handle.peer());

    let greeting = handle.last().unwrap();
    assert_eq!(greeting["type"], "connect");
    assert_eq!(greeting["success"], true);
    assert_eq!(greeting["msg"], msg::CONNECT_HINT);
    let session = greeting["session"].as_str().unwrap();
    assert_eq!(session.len(), 6);
    assert!(session.chars().all(|c| c.is_ascii_hexdigit()));

    assert_eq!(handle.idle_timeout(), Some(Duration::from_secs(30 * 60)));
    assert!(!handle.is_closed());
    assert_eq!(router.session_count(), 1);
    assert_eq!(router.statistics().get(StatKey::Connect), 1);
}

#[test]
fn test_connect_uses_configured_idle_timeout() {
    let router = Router::new(RouterConfig {
        idle_timeout: Duration::from_secs(90),
        ..Default::default()
    });
    let handle = RecordingHandle::new();
    router.open(&handle.peer());
    assert_eq!(handle.idle_timeout(), Some(Duration::from_secs(90)));
}

struct FixedCandidate(u32);

impl CandidateSource for FixedCandidate {
    fn next_candidate(&self) -> u32 {
        self.0
    }
}

#[test]
fn test_connect_when_no_session_id_is_free() {
    let router = Router::with_candidates(RouterConfig::default(), Arc::new(FixedCandidate(0x42)));

    // A login claims the only id the allocator will ever offer
    let alice = RecordingHandle::new();
    login(&router, &alice, "Alice", "000042");

    let handle = RecordingHandle::new();
    router.open(&handle.peer());

    assert_eq!(
        handle.take(),
        vec![json!({"type": "connect", "success": false, "msg": msg::OVERLOADED})]
    );
    assert!(handle.is_closed());
    assert_eq!(handle.idle_timeout(), None);
    assert_eq!(router.statistics().get(StatKey::Connect), 1);
    assert_eq!(router.session_count(), 1);
}

#[test]
fn test_connect_with_injected_candidates() {
    let router = Router::with_candidates(RouterConfig::default(), Arc::new(FixedCandidate(0xabc)));
    let handle = RecordingHandle::new();
    router.open(&handle.peer());
    assert_eq!(handle.last().unwrap()["session"], "000abc");
}

#[test]
fn test_connection_handler_delegates() {
    let router = Router::default();
    let handle = RecordingHandle::new();
    let connection = router.connection(handle.peer());

    connection.on_open();
    connection.on_message(r#"{"type":"login","name":"Alice","session":"s1"}"#);
    connection.on_error(&mediator_transport::TransportError::Timeout);
    connection.on_close(Some(1000), None);

    let frames = handle.take();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["type"], "connect");
    assert_eq!(frames[1]["type"], "login");

    let stats = router.statistics();
    assert_eq!(stats.get(StatKey::Connect), 1);
    assert_eq!(stats.get(StatKey::Message), 1);
    assert_eq!(stats.get(StatKey::Login), 1);
    assert_eq!(stats.get(StatKey::Error), 1);
    assert_eq!(stats.get(StatKey::Close), 1);
}

// ============================================================================
// Login / Relogin / Logout
// ============================================================================

#[test]
fn test_login_success() {
    let router = Router::default();
    let alice = RecordingHandle::new();

    send(
        &router,
        &alice,
        json!({"type": "login", "name": " Alice ", "session": "s1", "boxType": 1, "localNr": "2"}),
    );

    assert_eq!(
        alice.frames(),
        vec![format!(
            r#"{{"type":"login","success":true,"msg":"{}","boxType":1,"name":"Alice","localNr":2}}"#,
            msg::LOGIN_OK
        )]
    );
    assert!(router.is_registered("alice", "s1"));
    assert_eq!(router.connection_count(), 1);
    assert_eq!(router.session_count(), 1);
}

#[test]
fn test_login_rejects_invalid_name() {
    let router = Router::default();
    let handle = RecordingHandle::new();

    send(
        &router,
        &handle,
        json!({"type": "login", "name": "A\"B", "session": "s1"}),
    );

    assert_eq!(
        handle.last().unwrap(),
        json!({"type": "login", "success": false, "name": "A\"B", "msg": msg::UNEXPECTED_USER})
    );
    assert_eq!(router.connection_count(), 0);
    assert_eq!(router.session_count(), 0);
}

#[test]
fn test_login_requires_valid_session() {
    let router = Router::default();
    let handle = RecordingHandle::new();

    send(&router, &handle, json!({"type": "login", "name": "Alice"}));
    assert_eq!(handle.take()[0]["msg"], msg::UNEXPECTED_SESSION);

    send(
        &router,
        &handle,
        json!({"type": "relogin", "name": "Alice", "session": "s'1"}),
    );
    assert_eq!(
        handle.last().unwrap(),
        json!({"type": "relogin", "success": false, "name": "Alice", "msg": msg::UNEXPECTED_SESSION})
    );
    assert_eq!(router.connection_count(), 0);
}

#[test]
fn test_session_ids_are_case_folded() {
    let router = Router::default();
    let alice = RecordingHandle::new();
    let bob = RecordingHandle::new();

    login(&router, &alice, "Alice", "Meeting");
    login(&router, &bob, "Bob", "MEETING");

    send(
        &router,
        &alice,
        json!({"type": "requestCall", "name": "Alice", "peer": "bob", "session": "meeting"}),
    );
    assert_eq!(bob.last().unwrap()["type"], "requestCall");
    assert_eq!(router.session_count(), 1);
}

#[test]
fn test_relogin_replaces_connection() {
    let router = Router::default();
    let old = RecordingHandle::new();
    let new = RecordingHandle::new();
    let bob = RecordingHandle::new();

    login(&router, &old, "Alice", "s1");
    login(&router, &bob, "Bob", "s1");

    send(
        &router,
        &new,
        json!({"type": "relogin", "name": "Alice", "session": "s1"}),
    );
    assert_eq!(
        new.take(),
        vec![json!({"type": "relogin", "success": true, "msg": msg::RELOGIN_OK, "name": "Alice"})]
    );

    send(
        &router,
        &bob,
        json!({"type": "requestCall", "name": "Bob", "peer": "Alice", "session": "s1"}),
    );
    assert_eq!(new.count(), 1);
    assert_eq!(old.count(), 0);
    // The superseded connection is not closed by the router
    assert!(!old.is_closed());
    assert_eq!(router.connection_count(), 2);
}

#[test]
fn test_logout() {
    let router = Router::default();
    let alice = RecordingHandle::new();

    send(
        &router,
        &alice,
        json!({"type": "logout", "name": "Alice", "session": "s1"}),
    );
    assert_eq!(
        alice.take(),
        vec![json!({"type": "logout", "success": true, "msg": msg::NO_SESSION})]
    );

    login(&router, &alice, "Alice", "s1");
    send(
        &router,
        &alice,
        json!({"type": "logout", "name": "ALICE", "session": "s1"}),
    );
    assert_eq!(
        alice.take(),
        vec![json!({"type": "logout", "success": true, "msg": msg::LOGOUT_OK, "name": "ALICE"})]
    );
    assert_eq!(router.connection_count(), 0);

    // Logging out twice still succeeds
    send(
        &router,
        &alice,
        json!({"type": "logout", "name": "Alice", "session": "s1"}),
    );
    assert_eq!(alice.take()[0]["msg"], msg::NO_SESSION);
}

#[test]
fn test_logout_without_session() {
    let router = Router::default();
    let alice = RecordingHandle::new();
    login(&router, &alice, "Alice", "s1");

    send(&router, &alice, json!({"type": "logout", "name": "Alice"}));
    assert_eq!(alice.take()[0]["msg"], msg::NO_SESSION);
    assert_eq!(router.connection_count(), 1);
}

#[test]
fn test_logout_rejects_invalid_name() {
    let router = Router::default();
    let handle = RecordingHandle::new();

    send(
        &router,
        &handle,
        json!({"type": "logout", "name": "", "session": "s1"}),
    );
    assert_eq!(
        handle.last().unwrap(),
        json!({"type": "logout", "success": false, "msg": msg::UNEXPECTED_USER})
    );
}

// ============================================================================
// Routing
// ============================================================================

#[test]
fn test_request_call_is_forwarded() {
    let router = Router::default();
    let alice = RecordingHandle::new();
    let bob = RecordingHandle::new();
    login(&router, &alice, "A", "s1");
    login(&router, &bob, "B", "s1");

    router.handle(
        &alice.peer(),
        r#"{"type":"requestCall","name":"A","peer":"B","session":"s1"}"#,
    );

    assert_eq!(
        bob.frames(),
        vec![r#"{"type":"requestCall","success":true,"requestCall":null,"name":"A","peer":"B"}"#]
    );
    assert_eq!(alice.count(), 0);
}

#[test]
fn test_routing_to_unknown_peer() {
    let router = Router::default();
    let alice = RecordingHandle::new();
    login(&router, &alice, "A", "s1");

    router.handle(
        &alice.peer(),
        r#"{"type":"requestCall","name":"A","peer":"B","session":"s1"}"#,
    );

    assert_eq!(
        alice.frames(),
        vec![format!(
            r#"{{"type":"requestCall","success":false,"msg":"{}"}}"#,
            msg::PEER_UNKNOWN
        )]
    );
}

#[test]
fn test_routing_is_session_scoped() {
    let router = Router::default();
    let alice = RecordingHandle::new();
    let bob = RecordingHandle::new();
    login(&router, &alice, "A", "s1");
    login(&router, &bob, "B", "s2");

    for kind in ["rejectCall", "leave"] {
        send(
            &router,
            &alice,
            json!({"type": kind, "name": "A", "peer": "B", "session": "s1"}),
        );
        assert_eq!(alice.take()[0]["msg"], msg::PEER_UNKNOWN);
    }

    // Without a session nobody can be found
    send(
        &router,
        &alice,
        json!({"type": "leave", "name": "A", "peer": "B"}),
    );
    assert_eq!(alice.take()[0]["msg"], msg::PEER_UNKNOWN);
    assert_eq!(bob.count(), 0);
}

#[test]
fn test_offer_payload_is_forwarded_verbatim() {
    let router = Router::default();
    let alice = RecordingHandle::new();
    let bob = RecordingHandle::new();
    login(&router, &alice, "A", "s1");
    login(&router, &bob, "B", "s1");

    let offer = r#"{"type":"offer",  "sdp":"v=0\r\no=- 4645867096550263642 0 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\na=ice-options:trickle\r\n"}"#;
    let text = format!(
        r#"{{"type":"offer","offer":{},"name":"A","peer":"B","session":"s1"}}"#,
        offer
    );
    router.handle(&alice.peer(), &text);

    assert_eq!(
        bob.frames(),
        vec![format!(
            r#"{{"type":"offer","success":true,"offer":{},"name":"A","peer":"B"}}"#,
            offer
        )]
    );
}

#[test]
fn test_routing_echoes_numbers() {
    let router = Router::default();
    let alice = RecordingHandle::new();
    let bob = RecordingHandle::new();
    login(&router, &alice, "A", "s1");
    login(&router, &bob, "B", "s1");

    router.handle(
        &alice.peer(),
        r#"{"type":"candidate","candidate":{"candidate":"candidate:1 1 UDP 1 10.0.0.1 5000 typ host","sdpMid":"0"},"name":"A","localNr":1,"peer":"B","peerNr":"2","boxType":3.7,"session":"s1"}"#,
    );

    assert_eq!(
        bob.frames(),
        vec![r#"{"type":"candidate","success":true,"candidate":{"candidate":"candidate:1 1 UDP 1 10.0.0.1 5000 typ host","sdpMid":"0"},"name":"A","localNr":1,"peer":"B","peerNr":2,"boxType":3}"#]
    );
}

#[test]
fn test_routing_validation() {
    let router = Router::default();
    let alice = RecordingHandle::new();
    login(&router, &alice, "A", "s1");

    let cases = [
        (json!({"type": "offer", "name": "A", "session": "s1"}), msg::NAME_MISSING),
        (json!({"type": "offer", "name": "A", "peer": 7, "session": "s1"}), msg::NAME_MISSING),
        (json!({"type": "answer", "name": "A\u{1}", "peer": "B", "session": "s1"}), msg::UNEXPECTED_USER),
        (json!({"type": "leave", "name": "A", "peer": "„B“", "session": "s1"}), msg::UNEXPECTED_PEER_USER),
        (json!({"type": "requestCall", "name": "A", "peer": "", "session": "s1"}), msg::UNEXPECTED_PEER_USER),
    ];
    for (message, expected) in cases {
        let kind = message["type"].clone();
        send(&router, &alice, message);
        assert_eq!(
            alice.take(),
            vec![json!({"type": kind, "success": false, "msg": expected})]
        );
    }
}

#[test]
fn test_routing_without_payload_object() {
    let router = Router::default();
    let alice = RecordingHandle::new();
    let bob = RecordingHandle::new();
    login(&router, &alice, "A", "s1");
    login(&router, &bob, "B", "s1");

    send(
        &router,
        &alice,
        json!({"type": "answer", "answer": "v=0", "name": "A", "peer": "B", "session": "s1"}),
    );
    assert_eq!(
        alice.take(),
        vec![json!({"type": "error", "success": false, "msg": msg::BAD_ARGUMENTS})]
    );
    assert_eq!(bob.count(), 0);
}

#[test]
fn test_request_call_delivery_failure_is_reported() {
    let router = Router::default();
    let alice = RecordingHandle::new();
    let bob = RecordingHandle::new();
    login(&router, &alice, "A", "s1");
    login(&router, &bob, "B", "s1");
    bob.fail_sends(true);

    send(
        &router,
        &alice,
        json!({"type": "requestCall", "name": "A", "peer": "B", "session": "s1"}),
    );
    assert_eq!(
        alice.take(),
        vec![json!({"type": "requestCall", "success": false, "msg": msg::PEER_UNREACHABLE})]
    );

    // Other types are fire-and-forget
    for message in [
        json!({"type": "rejectCall", "name": "A", "peer": "B", "session": "s1"}),
        json!({"type": "leave", "name": "A", "peer": "B", "session": "s1"}),
        json!({"type": "offer", "offer": {"sdp": "x"}, "name": "A", "peer": "B", "session": "s1"}),
    ] {
        send(&router, &alice, message);
        assert_eq!(alice.count(), 0);
    }

    // The unreachable peer stays registered
    assert!(router.is_registered("B", "s1"));
}

#[test]
fn test_name_folding_follows_locale() {
    let german = Router::default();
    let turkish = Router::new(RouterConfig {
        locale: "tr".parse().unwrap(),
        ..Default::default()
    });

    for (router, reachable) in [(german, true), (turkish, false)] {
        let alice = RecordingHandle::new();
        let ivan = RecordingHandle::new();
        login(&router, &alice, "Alice", "s1");
        login(&router, &ivan, "IVAN", "s1");

        send(
            &router,
            &alice,
            json!({"type": "requestCall", "name": "Alice", "peer": "ivan", "session": "s1"}),
        );
        assert_eq!(ivan.count() == 1, reachable);
    }
}

// ============================================================================
// Malformed Input
// ============================================================================

#[test]
fn test_oversized_message_keeps_connection_usable() {
    let router = Router::default();
    let handle = RecordingHandle::new();

    router.handle(&handle.peer(), &"x".repeat(20_000));
    assert_eq!(
        handle.frames(),
        vec![format!(
            r#"{{"type":"error","success":false,"msg":"{}"}}"#,
            msg::BAD_ARGUMENTS
        )]
    );
    handle.take();

    login(&router, &handle, "Alice", "s1");
}

#[test]
fn test_malformed_messages() {
    let router = Router::default();
    let handle = RecordingHandle::new();

    for text in [
        "{",
        "[]",
        r#"{"name":"A"}"#,
        r#"{"type":1,"name":"A"}"#,
        r#"{"type":"login","session":"s1"}"#,
        r#"{"type":"login","name":"A","session":"s1","localNr":null}"#,
        r#"{"type":"login","name":"A","session":"s1","boxType":"one"}"#,
    ] {
        router.handle(&handle.peer(), text);
        assert_eq!(
            handle.take(),
            vec![json!({"type": "error", "success": false, "msg": msg::BAD_ARGUMENTS})],
            "input {}",
            text
        );
    }
    assert_eq!(router.connection_count(), 0);
}

#[test]
fn test_unknown_type() {
    let router = Router::default();
    let handle = RecordingHandle::new();

    router.handle(&handle.peer(), r#"{"type":"ping","name":"A"}"#);
    assert_eq!(
        handle.frames(),
        vec![r#"{"type":"ping","success":false,"msg":"Unexpected type"}"#]
    );
}

// ============================================================================
// Dictionaries
// ============================================================================

#[test]
fn test_dictionary() {
    let router = Router::default();
    let handle = RecordingHandle::new();

    send(&router, &handle, json!({"type": "dictionary", "lang": "de"}));
    let reply = handle.last().unwrap();
    assert_eq!(reply["success"], true);
    assert_eq!(reply["lang"], "de");
    let dictionary: Value = serde_json::from_str(reply["dictionary"].as_str().unwrap()).unwrap();
    assert_eq!(dictionary[msg::UNEXPECTED_TYPE], "Unerwarteter Typ");
}

#[test]
fn test_dictionary_falls_back_to_english() {
    let router = Router::default();
    let handle = RecordingHandle::new();

    send(
        &router,
        &handle,
        json!({"type": "dictionary", "name": "Alice", "lang": "xx"}),
    );
    let reply = handle.last().unwrap();
    assert_eq!(reply["success"], true);
    assert_eq!(reply["lang"], "en");
}

#[test]
fn test_dictionary_rejects_invalid_lang() {
    let router = Router::default();
    let handle = RecordingHandle::new();

    for message in [
        json!({"type": "dictionary", "lang": "../../etc/passwd"}),
        json!({"type": "dictionary", "lang": 7}),
        json!({"type": "dictionary"}),
    ] {
        send(&router, &handle, message);
        assert_eq!(
            handle.take(),
            vec![json!({"type": "dictionary", "success": false, "msg": msg::UNEXPECTED_LANGUAGE})]
        );
    }
}

struct NoDictionaries;

impl DictionaryProvider for NoDictionaries {
    fn resolve(&self, _lang: &str) -> Option<Arc<Dictionary>> {
        None
    }
}

#[test]
fn test_dictionary_not_found() {
    let router = Router::with_dictionaries(RouterConfig::default(), Arc::new(NoDictionaries));
    let handle = RecordingHandle::new();

    send(&router, &handle, json!({"type": "dictionary", "lang": "en"}));
    assert_eq!(
        handle.last().unwrap(),
        json!({"type": "dictionary", "success": false, "msg": msg::UNSUPPORTED_LANGUAGE})
    );
}

struct PanickingDictionaries;

impl DictionaryProvider for PanickingDictionaries {
    fn resolve(&self, lang: &str) -> Option<Arc<Dictionary>> {
        panic!("dictionary backend for {} is broken", lang);
    }
}

#[test]
fn test_internal_failure_is_answered() {
    let router =
        Router::with_dictionaries(RouterConfig::default(), Arc::new(PanickingDictionaries));
    let handle = RecordingHandle::new();

    send(&router, &handle, json!({"type": "dictionary", "lang": "en"}));
    assert_eq!(
        handle.take(),
        vec![json!({"type": "error", "success": false, "msg": msg::INTERNAL})]
    );

    // The router keeps working afterwards
    login(&router, &handle, "Alice", "s1");
}

// ============================================================================
// Statistics
// ============================================================================

#[test]
fn test_statistics_count_per_type() {
    let router = Router::default();
    let alice = RecordingHandle::new();
    let bob = RecordingHandle::new();
    login(&router, &alice, "A", "s1");
    login(&router, &bob, "B", "s1");
    send(
        &router,
        &alice,
        json!({"type": "offer", "offer": {}, "name": "A", "peer": "B", "session": "s1"}),
    );
    router.handle(&alice.peer(), "garbage");
    router.handle(&alice.peer(), r#"{"type":"ping","name":"A"}"#);

    let stats = router.statistics();
    assert_eq!(stats.get(StatKey::Message), 5);
    assert_eq!(stats.get(StatKey::Login), 2);
    assert_eq!(stats.get(StatKey::Offer), 1);
    assert_eq!(stats.get(StatKey::Answer), 0);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.len(), 14);
    assert!(snapshot.contains(&(StatKey::Login, 2)));
}
