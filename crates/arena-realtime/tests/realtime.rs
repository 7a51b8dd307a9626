//! End-to-end tests against a real WebSocket server on loopback.

use std::time::Duration;

use assert_matches::assert_matches;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};

use arena_realtime::{
    ConnectionState, DisconnectCause, PushKind, RealtimeClient, RealtimeError, RealtimeEvent,
    event_channel,
};
use arena_session::Session;
use arena_settings::ClientSettings;

enum Reply {
    Send(Vec<Value>),
    Ignore,
    Close,
}

struct TestServer {
    port: u16,
    uri: oneshot::Receiver<String>,
}

/// Accept one client and answer each text frame with `respond`.
async fn serve<F>(respond: F) -> TestServer
where
    F: Fn(&Value) -> Reply + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (uri_tx, uri) = oneshot::channel();

    let _ = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let _ = uri_tx.send(req.uri().to_string());
            Ok(resp)
        };
        let mut ws = accept_hdr_async(stream, callback).await.unwrap();

        while let Some(Ok(message)) = ws.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let request: Value = serde_json::from_str(text.as_str()).unwrap();
            match respond(&request) {
                Reply::Send(frames) => {
                    for frame in frames {
                        ws.send(Message::Text(frame.to_string().into())).await.unwrap();
                    }
                }
                Reply::Ignore => {}
                Reply::Close => {
                    let _ = ws.close(None).await;
                    break;
                }
            }
        }
    });

    TestServer { port, uri }
}

/// Copy the request's `cid` onto `body`.
fn reply_to(request: &Value, mut body: Value) -> Value {
    body["cid"] = request["cid"].clone();
    body
}

fn live_session() -> Session {
    let exp = arena_core::now_secs() + 3600;
    let claims = json!({"exp": exp, "uid": "user-1", "usn": "player"});
    let token = format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
    );
    Session::new(&token, "", false).unwrap()
}

fn client_for(port: u16) -> (RealtimeClient, mpsc::Receiver<RealtimeEvent>) {
    let mut settings = ClientSettings::default();
    settings.server.port = port;
    settings.realtime.heartbeat_interval_ms = 600_000;
    settings.realtime.request_timeout_ms = 5_000;
    let (tx, rx) = event_channel(16);
    let client = RealtimeClient::builder(settings).event_handler(tx).build().unwrap();
    (client, rx)
}

async fn next_event(events: &mut mpsc::Receiver<RealtimeEvent>) -> RealtimeEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap()
}

#[tokio::test]
async fn rpc_and_ping_round_trip() {
    let server = serve(|request| {
        if let Some(rpc) = request.get("rpc") {
            let body = json!({"rpc": {"id": rpc["id"], "payload": rpc["payload"]}});
            Reply::Send(vec![reply_to(request, body)])
        } else if request.get("ping").is_some() {
            Reply::Send(vec![reply_to(request, json!({"pong": {}}))])
        } else {
            Reply::Ignore
        }
    })
    .await;
    let (client, mut events) = client_for(server.port);
    let session = live_session();

    client.connect(&session, true).await.unwrap();
    assert_eq!(next_event(&mut events).await, RealtimeEvent::Connected);

    let uri = server.uri.await.unwrap();
    assert_eq!(
        uri,
        format!("/ws?lang=en&status=true&token={}", session.token())
    );

    let reply = client.rpc("echo", Some(r#"{"n":1}"#)).await.unwrap();
    assert_eq!(reply.id, "echo");
    assert_eq!(reply.payload.as_deref(), Some(r#"{"n":1}"#));
    client.ping().await.unwrap();
    assert_eq!(client.pending_requests(), 0);

    client.close().await;
    assert_eq!(client.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn error_envelope_is_error_reply() {
    let server = serve(|request| {
        let body = json!({"error": {"code": 3, "message": "bad input", "context": {"field": "id"}}});
        Reply::Send(vec![reply_to(request, body)])
    })
    .await;
    let (client, _events) = client_for(server.port);
    client.connect(&live_session(), true).await.unwrap();

    let err = client.rpc("anything", None).await.unwrap_err();
    assert_matches!(
        err,
        RealtimeError::ErrorReply { code: 3, ref message, ref context }
            if message == "bad input" && context["field"] == "id"
    );
    assert!(err.is_server_error());
    assert!(client.is_open());
}

#[tokio::test]
async fn pushes_arrive_between_replies() {
    let server = serve(|request| {
        let push = json!({"status_presence_event": {"joins": [{"user_id": "u2", "session_id": "s2", "username": "bo"}]}});
        let ack = reply_to(request, json!({"status": {"presences": []}}));
        Reply::Send(vec![ack, push])
    })
    .await;
    let (client, mut events) = client_for(server.port);
    client.connect(&live_session(), true).await.unwrap();
    assert_eq!(next_event(&mut events).await, RealtimeEvent::Connected);

    let status = client.follow_users(&["u2"], &[]).await.unwrap();
    assert!(status.presences.is_empty());

    let RealtimeEvent::Push(push) = next_event(&mut events).await else {
        panic!("expected a push");
    };
    assert_eq!(push.push_kind(), PushKind::StatusPresenceEvent);
    assert!(push.cid.is_none());
}

#[tokio::test]
async fn server_close_fails_pending_and_notifies() {
    let server = serve(|_| Reply::Close).await;
    let (client, mut events) = client_for(server.port);
    client.connect(&live_session(), true).await.unwrap();
    assert_eq!(next_event(&mut events).await, RealtimeEvent::Connected);

    assert_matches!(client.rpc("bye", None).await, Err(RealtimeError::NotConnected));
    assert_eq!(
        next_event(&mut events).await,
        RealtimeEvent::Disconnected {
            cause: DisconnectCause::Remote
        }
    );
    assert_eq!(client.state(), ConnectionState::Idle);
    assert_eq!(client.pending_requests(), 0);
    assert_matches!(client.ping().await, Err(RealtimeError::NotConnected));
}

#[tokio::test]
async fn unreachable_server_is_connection_error() {
    // Bind then release to find a port nobody is listening on
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let (client, mut events) = client_for(port);

    assert_matches!(
        client.connect(&live_session(), true).await,
        Err(RealtimeError::Connection { .. })
    );
    assert_eq!(client.state(), ConnectionState::Idle);
    assert!(events.try_recv().is_err());
}
