//! WebSocket transport for Gremlin Server.
//!
//! One supervisor task owns the socket: it connects, pumps outbound frames
//! and routes responses to waiting submitters by request id. When the socket
//! is lost every pending request fails with [`TransportError::Closed`] and
//! the supervisor reconnects after the configured interval until stopped.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::connection::ConnectionTracker;
use crate::query::Bindings;
use crate::transport::{ScriptRequest, Transport, TransportError, GREMLIN_LANGUAGE};

const MIME_TYPE: &str = "application/json";

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Reply = oneshot::Sender<Result<Vec<u8>, TransportError>>;

// ── Wire format ──────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireRequest<'a> {
    request_id: Uuid,
    op: &'static str,
    processor: &'static str,
    args: WireArgs<'a>,
}

#[derive(Serialize)]
struct WireArgs<'a> {
    gremlin: &'a str,
    bindings: &'a Bindings,
    language: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    aliases: Option<&'a BTreeMap<String, String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    request_id: Option<Uuid>,
    status: WireStatus,
    #[serde(default)]
    result: WireResult,
}

#[derive(Deserialize)]
struct WireStatus {
    code: u16,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize, Default)]
struct WireResult {
    #[serde(default)]
    data: Value,
}

/// Encode a request as a binary frame: mime length, mime type, JSON body.
fn encode(request: &ScriptRequest) -> Result<Vec<u8>, TransportError> {
    let body = WireRequest {
        request_id: request.request_id,
        op: "eval",
        processor: "",
        args: WireArgs {
            gremlin: &request.gremlin,
            bindings: &request.bindings,
            language: GREMLIN_LANGUAGE,
            aliases: request.aliases.as_ref(),
        },
    };

    let mut frame = Vec::with_capacity(1 + MIME_TYPE.len() + request.gremlin.len() + 64);
    frame.push(MIME_TYPE.len() as u8);
    frame.extend_from_slice(MIME_TYPE.as_bytes());
    serde_json::to_writer(&mut frame, &body)
        .map_err(|e| TransportError::Protocol(e.to_string()))?;
    Ok(frame)
}

// ── Shared state ─────────────────────────────────────────────────

struct Pending {
    data: Vec<Value>,
    reply: Reply,
}

impl Pending {
    fn append(&mut self, data: Value) {
        match data {
            Value::Array(items) => self.data.extend(items),
            Value::Null => {}
            other => self.data.push(other),
        }
    }
}

#[derive(Default)]
struct Shared {
    pending: Mutex<HashMap<Uuid, Pending>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
}

impl Shared {
    /// Route one response frame to the request waiting for it.
    fn dispatch(&self, frame: &[u8]) {
        let response: WireResponse = match serde_json::from_slice(frame) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "Undecodable gremlin-server response");
                return;
            }
        };
        let Some(request_id) = response.request_id else {
            tracing::warn!(
                code = response.status.code,
                message = %response.status.message,
                "Gremlin-server response without request id"
            );
            return;
        };

        let mut pending = self.pending.lock();
        if response.status.code == 206 {
            if let Some(p) = pending.get_mut(&request_id) {
                p.append(response.result.data);
            }
            return;
        }
        let Some(mut p) = pending.remove(&request_id) else {
            tracing::debug!(%request_id, "Response for unknown request");
            return;
        };
        drop(pending);

        let result = match response.status.code {
            200 => {
                p.append(response.result.data);
                serde_json::to_vec(&p.data).map_err(|e| TransportError::Protocol(e.to_string()))
            }
            204 => Ok(Vec::new()),
            499 => Err(TransportError::InvalidArguments(response.status.message)),
            code => Err(TransportError::Server {
                code,
                message: response.status.message,
            }),
        };
        let _ = p.reply.send(result);
    }

    fn fail_all(&self, err: &TransportError) {
        let drained: Vec<Pending> = self.pending.lock().drain().map(|(_, p)| p).collect();
        for p in drained {
            let _ = p.reply.send(Err(err.clone()));
        }
    }
}

// ── Transport ────────────────────────────────────────────────────

/// Gremlin Server client over a single WebSocket.
pub struct WsTransport {
    uri: String,
    request_timeout: Duration,
    reconnect_interval: Duration,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WsTransport {
    pub fn new(uri: &str, request_timeout: Duration, reconnect_interval: Duration) -> Self {
        Self {
            uri: uri.to_string(),
            request_timeout,
            reconnect_interval,
            shared: Arc::new(Shared::default()),
            cancel: CancellationToken::new(),
            task: Mutex::new(None),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

#[async_trait]
impl Transport for WsTransport {
    /// Spawn the connection task. A stopped transport stays stopped.
    fn start(&self, tracker: Arc<ConnectionTracker>) {
        if self.cancel.is_cancelled() {
            tracing::warn!(uri = %self.uri, "Transport was stopped, refusing to restart");
            return;
        }
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }
        let supervisor = Supervisor {
            uri: self.uri.clone(),
            reconnect_interval: self.reconnect_interval,
            shared: self.shared.clone(),
            cancel: self.cancel.clone(),
            tracker,
        };
        *task = Some(tokio::spawn(supervisor.run()));
    }

    async fn stop(&self) {
        self.cancel.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Gremlin connection task failed");
            }
        }
    }

    async fn submit(&self, request: &ScriptRequest) -> Result<Vec<u8>, TransportError> {
        let frame = encode(request)?;
        let outbound = self
            .shared
            .outbound
            .lock()
            .clone()
            .ok_or(TransportError::NotConnected)?;

        let (reply, rx) = oneshot::channel();
        self.shared.pending.lock().insert(
            request.request_id,
            Pending {
                data: Vec::new(),
                reply,
            },
        );

        if outbound.send(Message::Binary(frame.into())).is_err() {
            self.shared.pending.lock().remove(&request.request_id);
            return Err(TransportError::NotConnected);
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                self.shared.pending.lock().remove(&request.request_id);
                // A silent server is treated as a dead one.
                let _ = outbound.send(Message::Close(None));
                Err(TransportError::Timeout(self.request_timeout))
            }
        }
    }
}

// ── Supervisor ───────────────────────────────────────────────────

struct Supervisor {
    uri: String,
    reconnect_interval: Duration,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    tracker: Arc<ConnectionTracker>,
}

impl Supervisor {
    async fn run(self) {
        loop {
            let connect = tokio::select! {
                _ = self.cancel.cancelled() => break,
                res = tokio_tungstenite::connect_async(self.uri.as_str()) => res,
            };

            match connect {
                Ok((socket, _)) => {
                    tracing::info!(uri = %self.uri, "Connected to gremlin-server");
                    let (tx, rx) = mpsc::unbounded_channel();
                    *self.shared.outbound.lock() = Some(tx);
                    self.tracker.connected();

                    let outcome = self.serve(socket, rx).await;

                    *self.shared.outbound.lock() = None;
                    self.shared.fail_all(&TransportError::Closed);
                    match outcome {
                        Ok(()) => self.tracker.disconnected(None),
                        Err(err) => self.tracker.disconnected(Some(&err)),
                    }
                }
                Err(e) => {
                    let err = TransportError::WebSocket(e.to_string());
                    tracing::debug!(
                        uri = %self.uri,
                        error = %err,
                        "Gremlin-server connection failed"
                    );
                    self.tracker.disconnected(Some(&err));
                }
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_interval) => {}
            }
        }
        tracing::info!(uri = %self.uri, "Gremlin-server connection stopped");
    }

    /// Pump frames until the socket ends. `Ok` means a requested shutdown.
    async fn serve(
        &self,
        socket: Socket,
        mut outbound: mpsc::UnboundedReceiver<Message>,
    ) -> Result<(), TransportError> {
        let (mut sink, mut stream) = socket.split();
        let ws_err =
            |e: tokio_tungstenite::tungstenite::Error| TransportError::WebSocket(e.to_string());

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }
                Some(msg) = outbound.recv() => {
                    let closing = matches!(msg, Message::Close(_));
                    sink.send(msg).await.map_err(ws_err)?;
                    if closing {
                        return Err(TransportError::Closed);
                    }
                }
                frame = stream.next() => match frame {
                    None | Some(Ok(Message::Close(_))) => return Err(TransportError::Closed),
                    Some(Err(e)) => return Err(ws_err(e)),
                    Some(Ok(Message::Text(text))) => self.shared.dispatch(text.as_str().as_bytes()),
                    Some(Ok(Message::Binary(data))) => self.shared.dispatch(&data),
                    Some(Ok(_)) => {}
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    type Responder = dyn Fn(Value) -> Vec<Value> + Send + Sync;

    /// Minimal Gremlin Server: answers each request with the frames
    /// `respond` returns for it.
    async fn fake_server(respond: Arc<Responder>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let respond = respond.clone();
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(msg)) = ws.next().await {
                        let Message::Binary(frame) = msg else { continue };
                        let mime_len = frame[0] as usize;
                        assert_eq!(&frame[1..=mime_len], MIME_TYPE.as_bytes());
                        let request: Value =
                            serde_json::from_slice(&frame[1 + mime_len..]).unwrap();
                        for reply in respond(request) {
                            let frame = Message::Text(reply.to_string().into());
                            if ws.send(frame).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });
        format!("ws://{addr}/gremlin")
    }

    fn reply(request: &Value, code: u16, data: Value) -> Value {
        json!({
            "requestId": request["requestId"],
            "status": {"code": code, "message": format!("status {code}"), "attributes": {}},
            "result": {"data": data, "meta": {}}
        })
    }

    async fn connected(uri: &str, timeout: Duration) -> (WsTransport, Arc<ConnectionTracker>) {
        let transport = WsTransport::new(uri, timeout, Duration::from_millis(50));
        let tracker = Arc::new(ConnectionTracker::new());
        transport.start(tracker.clone());
        tokio::time::timeout(Duration::from_secs(5), async {
            while !tracker.is_connected() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("transport never connected");
        (transport, tracker)
    }

    #[tokio::test]
    async fn test_partial_results_are_accumulated() {
        let uri = fake_server(Arc::new(|req| {
            vec![
                reply(&req, 206, json!([1, 2])),
                reply(&req, 206, json!([3])),
                reply(&req, 200, json!([4])),
            ]
        }))
        .await;
        let (transport, _) = connected(&uri, Duration::from_secs(5)).await;

        let data = transport
            .submit(&ScriptRequest::new("g.V()", Bindings::new()))
            .await
            .unwrap();
        assert_eq!(
            serde_json::from_slice::<Value>(&data).unwrap(),
            json!([1, 2, 3, 4])
        );
        transport.stop().await;
    }

    #[tokio::test]
    async fn test_request_frame_shape() {
        let uri = fake_server(Arc::new(|req| {
            vec![reply(&req, 200, json!([req.clone()]))]
        }))
        .await;
        let (transport, _) = connected(&uri, Duration::from_secs(5)).await;

        let bindings = Bindings::from([("_id".to_string(), json!("x"))]);
        let mut request = ScriptRequest::new("g.V(_id)", bindings);
        request.aliases = Some(BTreeMap::from([(
            "g".to_string(),
            "contrail".to_string(),
        )]));
        let data = transport.submit(&request).await.unwrap();

        let echoed: Value = serde_json::from_slice(&data).unwrap();
        let echoed = &echoed[0];
        assert_eq!(echoed["requestId"], json!(request.request_id.to_string()));
        assert_eq!(echoed["op"], "eval");
        assert_eq!(echoed["processor"], "");
        assert_eq!(echoed["args"]["gremlin"], "g.V(_id)");
        assert_eq!(echoed["args"]["bindings"], json!({"_id": "x"}));
        assert_eq!(echoed["args"]["language"], "gremlin-groovy");
        assert_eq!(echoed["args"]["aliases"], json!({"g": "contrail"}));
        transport.stop().await;
    }

    #[tokio::test]
    async fn test_status_codes() {
        let uri = fake_server(Arc::new(|req| {
            let code = match req["args"]["gremlin"].as_str() {
                Some("empty") => 204,
                Some("bad args") => 499,
                _ => 597,
            };
            vec![reply(&req, code, Value::Null)]
        }))
        .await;
        let (transport, tracker) = connected(&uri, Duration::from_secs(5)).await;

        let empty = transport
            .submit(&ScriptRequest::new("empty", Bindings::new()))
            .await
            .unwrap();
        assert!(empty.is_empty());

        let err = transport
            .submit(&ScriptRequest::new("bad args", Bindings::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidArguments(ref m) if m == "status 499"));

        let err = transport
            .submit(&ScriptRequest::new("g.V().boom()", Bindings::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Server { code: 597, .. }));
        assert!(!err.is_connection_failure());
        assert!(tracker.is_connected());
        transport.stop().await;
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let uri = fake_server(Arc::new(|_| Vec::new())).await;
        let (transport, _) = connected(&uri, Duration::from_millis(100)).await;

        let err = transport
            .submit(&ScriptRequest::new("g.V()", Bindings::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
        assert!(transport.shared.pending.lock().is_empty());
        transport.stop().await;
    }

    #[tokio::test]
    async fn test_submit_before_start_is_not_connected() {
        let transport = WsTransport::new(
            "ws://127.0.0.1:1/gremlin",
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let err = transport
            .submit(&ScriptRequest::new("g.V()", Bindings::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    #[tokio::test]
    async fn test_stop_reports_clean_disconnect() {
        let uri = fake_server(Arc::new(|req| vec![reply(&req, 204, Value::Null)])).await;
        let (transport, tracker) = connected(&uri, Duration::from_secs(5)).await;

        let errors = Arc::new(Mutex::new(Vec::new()));
        let seen = errors.clone();
        tracker.on_disconnected(move |err| seen.lock().push(err.map(|e| e.to_string())));

        transport.stop().await;
        assert!(!tracker.is_connected());
        assert_eq!(*errors.lock(), vec![None]);

        let err = transport
            .submit(&ScriptRequest::new("g.V()", Bindings::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }

    /// Server that hangs up on its first client right after the handshake
    /// and keeps every later connection open.
    async fn flaky_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut accepted = 0;
            while let Ok((stream, _)) = listener.accept().await {
                accepted += 1;
                let first = accepted == 1;
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    if first {
                        let _ = ws.close(None).await;
                        return;
                    }
                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });
        format!("ws://{addr}/gremlin")
    }

    #[tokio::test]
    async fn test_reconnects_after_socket_loss() {
        let uri = flaky_server().await;
        let transport = WsTransport::new(&uri, Duration::from_secs(5), Duration::from_millis(50));
        let tracker = Arc::new(ConnectionTracker::new());

        let events = Arc::new(Mutex::new(Vec::new()));
        let up = events.clone();
        tracker.on_connected(move || up.lock().push("up"));
        let down = events.clone();
        tracker.on_disconnected(move |_| down.lock().push("down"));

        transport.start(tracker.clone());
        tokio::time::timeout(Duration::from_secs(5), async {
            while events.lock().len() < 3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("transport never reconnected");

        assert_eq!(*events.lock(), vec!["up", "down", "up"]);
        assert!(tracker.is_connected());

        transport.stop().await;
        assert_eq!(*events.lock(), vec!["up", "down", "up", "down"]);
        assert!(!tracker.is_connected());
    }

    #[tokio::test]
    async fn test_stopped_transport_is_not_restarted() {
        let uri = fake_server(Arc::new(|req| vec![reply(&req, 204, Value::Null)])).await;
        let (transport, tracker) = connected(&uri, Duration::from_secs(5)).await;
        transport.stop().await;

        transport.start(tracker.clone());
        assert!(transport.task.lock().is_none());
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!tracker.is_connected());

        let err = transport
            .submit(&ScriptRequest::new("g.V()", Bindings::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::NotConnected));
    }
}
