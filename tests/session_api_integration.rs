//! Integration tests for the session REST + WebSocket surface.
//!
//! Each test spins up an Axum server on a random port backed by an
//! in-memory gateway, then drives it over HTTP and tokio-tungstenite.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, Stream, StreamExt};
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use remit_onboard::catalog::Catalog;
use remit_onboard::config::SessionConfig;
use remit_onboard::error::GatewayError;
use remit_onboard::payments::model::FxRate;
use remit_onboard::payments::{
    PaymentsGateway, QuoteOrchestrator, QuoteRequest, QuoteResponse, TransactionRequest,
    TransactionStatus,
};
use remit_onboard::server::routes;
use remit_onboard::session::SessionManager;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// In-memory gateway (no real API calls).
#[derive(Default)]
struct StubGateway {
    quotes: AtomicUsize,
    confirmed: AtomicUsize,
}

#[async_trait]
impl PaymentsGateway for StubGateway {
    async fn create_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, GatewayError> {
        self.quotes.fetch_add(1, Ordering::SeqCst);
        Ok(QuoteResponse {
            quote_id: Some("Q-WS".to_string()),
            receiving_amount: Some(request.sending_amount * dec!(75.75)),
            receiving_currency_code: Some(request.receiving_currency_code.clone()),
            fx_rates: vec![FxRate {
                rate: Some(dec!(75.75)),
            }],
        })
    }

    async fn create_transaction(&self, _request: &TransactionRequest) -> Result<String, GatewayError> {
        Ok("TX-WS".to_string())
    }

    async fn confirm_transaction(&self, _reference: &str) -> Result<(), GatewayError> {
        self.confirmed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn enquire_transaction(&self, _reference: &str) -> Result<TransactionStatus, GatewayError> {
        Ok(TransactionStatus {
            status: "DELIVERED".to_string(),
        })
    }
}

fn session_config() -> SessionConfig {
    SessionConfig {
        typing_delay: Duration::from_millis(10),
        poll_interval: Duration::from_millis(20),
        polling_enabled: true,
        seed_welcome: true,
    }
}

/// Start an Axum server on a random port, return (port, gateway).
async fn start_server() -> (u16, Arc<StubGateway>) {
    let gateway = Arc::new(StubGateway::default());
    let orchestrator = Arc::new(QuoteOrchestrator::new(gateway.clone()));
    let sessions = SessionManager::new(
        Arc::new(Catalog::builtin().unwrap()),
        orchestrator,
        session_config(),
    );
    let app = routes(sessions);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (port, gateway)
}

/// Create a session over REST, return its snapshot.
async fn create_session(port: u16) -> Value {
    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/api/sessions"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

async fn post_json(url: String, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new().post(url).json(&body).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

/// Parse a WS text frame into a serde_json::Value.
fn parse_ws_json(msg: &Message) -> Value {
    match msg {
        Message::Text(txt) => serde_json::from_str(txt).expect("invalid JSON from server"),
        other => panic!("expected Text frame, got {:?}", other),
    }
}

/// Read frames until one matches, skipping the rest.
async fn next_matching<S>(ws: &mut S, pred: impl Fn(&Value) -> bool) -> Value
where
    S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let msg = ws.next().await.expect("stream ended").expect("ws error");
        if !msg.is_text() {
            continue;
        }
        let json = parse_ws_json(&msg);
        if pred(&json) {
            return json;
        }
    }
}

// ── REST Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn health_endpoint() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let resp = reqwest::get(format!("http://127.0.0.1:{port}/health"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["status"], "ok");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn new_session_is_seeded_with_welcome() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let snapshot = create_session(port).await;

        assert_eq!(snapshot["state"]["current_stage_id"], "init");
        assert_eq!(snapshot["generation"], 0);
        let messages = snapshot["state"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["author"], "assistant");
        assert_eq!(snapshot["options"], json!(["Start onboarding", "Send money"]));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn bad_and_unknown_ids() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;

        let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/sessions/not-a-uuid"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["error"], "Invalid session ID");

        let missing = uuid::Uuid::new_v4();
        let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/sessions/{missing}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn rest_transfer_flow() {
    timeout(TEST_TIMEOUT, async {
        let (port, gateway) = start_server().await;
        let id = create_session(port).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();
        let base = format!("http://127.0.0.1:{port}/api/sessions/{id}");

        let (status, snapshot) =
            post_json(format!("{base}/options"), json!({ "label": "Send money" })).await;
        assert_eq!(status, 200);
        assert_eq!(snapshot["state"]["current_stage_id"], "amount");

        let (_, snapshot) = post_json(format!("{base}/messages"), json!({ "text": "200" })).await;
        assert_eq!(snapshot["state"]["current_stage_id"], "country");
        assert_eq!(snapshot["quote"]["amount"], "200");

        let (_, snapshot) = post_json(format!("{base}/messages"), json!({ "text": "PK" })).await;
        assert_eq!(snapshot["state"]["current_stage_id"], "confirm");
        assert_eq!(snapshot["quote"]["quote_id"], "Q-WS");
        assert_eq!(snapshot["quote"]["receiving_currency"], "PKR");

        let (_, snapshot) = post_json(format!("{base}/messages"), json!({ "text": "yes" })).await;
        assert_eq!(snapshot["state"]["current_stage_id"], "completed");
        assert_eq!(snapshot["quote"]["transaction_ref"], "TX-WS");
        assert_eq!(gateway.quotes.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.confirmed.load(Ordering::SeqCst), 1);

        // No message is left showing the typing indicator.
        let messages = snapshot["state"]["messages"].as_array().unwrap();
        assert!(messages.iter().all(|m| m["pending"] == false));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn blank_message_is_rejected() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let id = create_session(port).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let (status, json) = post_json(
            format!("http://127.0.0.1:{port}/api/sessions/{id}/messages"),
            json!({ "text": "   " }),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(json["error"], "Message text is empty");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn reset_restores_initial_state() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let id = create_session(port).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();
        let base = format!("http://127.0.0.1:{port}/api/sessions/{id}");

        post_json(format!("{base}/options"), json!({ "label": "Send money" })).await;
        post_json(format!("{base}/messages"), json!({ "text": "200" })).await;

        let (status, snapshot) = post_json(format!("{base}/reset"), json!({})).await;
        assert_eq!(status, 200);
        assert_eq!(snapshot["generation"], 1);
        assert_eq!(snapshot["state"]["current_stage_id"], "init");
        assert_eq!(snapshot["state"]["messages"].as_array().unwrap().len(), 1);
        assert!(snapshot["quote"]["amount"].is_null());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn deleted_session_is_gone() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let id = create_session(port).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();
        let url = format!("http://127.0.0.1:{port}/api/sessions/{id}");
        let client = reqwest::Client::new();

        let resp = client.delete(&url).send().await.unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client.get(&url).send().await.unwrap();
        assert_eq!(resp.status(), 404);

        let resp = client.delete(&url).send().await.unwrap();
        assert_eq!(resp.status(), 404);
    })
    .await
    .expect("test timed out");
}

// ── WebSocket Tests ──────────────────────────────────────────────────

#[tokio::test]
async fn ws_connect_receives_sync() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let id = create_session(port).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let (mut ws, _resp) = connect_async(format!("ws://127.0.0.1:{port}/ws/sessions/{id}"))
            .await
            .expect("WS connect failed");

        let msg = ws.next().await.unwrap().unwrap();
        let json = parse_ws_json(&msg);
        assert_eq!(json["type"], "sync");
        assert_eq!(json["snapshot"]["session_id"], id.as_str());
        assert_eq!(json["snapshot"]["state"]["current_stage_id"], "init");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_unknown_session_is_refused() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let missing = uuid::Uuid::new_v4();
        let result = connect_async(format!("ws://127.0.0.1:{port}/ws/sessions/{missing}")).await;
        assert!(result.is_err());
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_option_streams_turn_events() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let id = create_session(port).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws/sessions/{id}"))
            .await
            .expect("WS connect failed");
        let _sync = ws.next().await.unwrap().unwrap();

        let action = json!({ "type": "option", "label": "Send money" });
        ws.send(Message::Text(action.to_string().into())).await.unwrap();

        let user = next_matching(&mut ws, |j| j["type"] == "message_appended").await;
        assert_eq!(user["message"]["author"], "user");
        assert_eq!(user["message"]["content"], "Send money");

        let placeholder = next_matching(&mut ws, |j| j["type"] == "message_appended").await;
        assert_eq!(placeholder["message"]["pending"], true);

        let resolved = next_matching(&mut ws, |j| j["type"] == "message_updated").await;
        assert_eq!(resolved["message"]["id"], placeholder["message"]["id"]);
        assert_eq!(resolved["message"]["pending"], false);

        let stage = next_matching(&mut ws, |j| j["type"] == "stage_changed").await;
        assert_eq!(stage["stage_id"], "amount");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_transfer_reports_delivery() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let id = create_session(port).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws/sessions/{id}"))
            .await
            .expect("WS connect failed");
        let _sync = ws.next().await.unwrap().unwrap();

        let steps = [
            (json!({ "type": "option", "label": "Send money" }), "amount"),
            (json!({ "type": "message", "text": "200" }), "country"),
            (json!({ "type": "message", "text": "pk" }), "confirm"),
            (json!({ "type": "message", "text": "yes" }), "completed"),
        ];
        for (action, stage_id) in steps {
            ws.send(Message::Text(action.to_string().into())).await.unwrap();
            let stage = next_matching(&mut ws, |j| j["type"] == "stage_changed").await;
            assert_eq!(stage["stage_id"], stage_id);
        }

        let status = next_matching(&mut ws, |j| {
            j["type"] == "message_appended"
                && j["message"]["content"]
                    .as_str()
                    .is_some_and(|c| c.contains("DELIVERED"))
        })
        .await;
        assert_eq!(status["message"]["author"], "assistant");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_reset_broadcasts_to_all_clients() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let id = create_session(port).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();
        let url = format!("ws://127.0.0.1:{port}/ws/sessions/{id}");

        let (mut ws1, _) = connect_async(&url).await.expect("WS1 connect failed");
        let (mut ws2, _) = connect_async(&url).await.expect("WS2 connect failed");
        let _ = ws1.next().await.unwrap().unwrap();
        let _ = ws2.next().await.unwrap().unwrap();

        ws1.send(Message::Text(json!({ "type": "reset" }).to_string().into()))
            .await
            .unwrap();

        for ws in [&mut ws1, &mut ws2] {
            let reset = next_matching(ws, |j| j["type"] == "reset").await;
            assert_eq!(reset["generation"], 1);
            let welcome = next_matching(ws, |j| j["type"] == "message_appended").await;
            assert_eq!(welcome["message"]["author"], "assistant");
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_ping_gets_pong() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let id = create_session(port).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws/sessions/{id}"))
            .await
            .expect("WS connect failed");
        let _sync = ws.next().await.unwrap().unwrap();

        ws.send(Message::Ping(vec![7, 7].into())).await.unwrap();
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Pong(data) => {
                    assert_eq!(&data[..], &[7, 7]);
                    break;
                }
                _ => continue,
            }
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_garbage_is_ignored() {
    timeout(TEST_TIMEOUT, async {
        let (port, _gateway) = start_server().await;
        let id = create_session(port).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}/ws/sessions/{id}"))
            .await
            .expect("WS connect failed");
        let _sync = ws.next().await.unwrap().unwrap();

        ws.send(Message::Text("not json".to_string().into())).await.unwrap();
        ws.send(Message::Text(json!({ "type": "reset" }).to_string().into()))
            .await
            .unwrap();

        // The connection survives and still handles valid actions.
        let reset = next_matching(&mut ws, |j| j["type"] == "reset").await;
        assert_eq!(reset["generation"], 1);
    })
    .await
    .expect("test timed out");
}
