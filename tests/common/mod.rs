//! Stub backend: REST under `/api`, plus just enough socket.io for the listener.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

#[derive(Default)]
pub struct Backend {
    pub errands: Vec<Value>,
    pub messages: Vec<Value>,
    pub conversations: Vec<Value>,
    pub conversation_fetches: usize,
    /// `Authorization` header of every REST call, in order.
    pub auth_headers: Vec<Option<String>>,
    /// Text fields of runner applications.
    pub applications: Vec<HashMap<String, String>>,
    /// Frames to push to the next websocket client after it joins.
    pub push: Vec<String>,
    next_id: u32,
}

impl Backend {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }
}

type Shared = Arc<Mutex<Backend>>;

#[derive(Clone)]
struct AppState {
    backend: Shared,
    joins: mpsc::UnboundedSender<String>,
}

pub struct Stub {
    pub api_url: String,
    pub socket_url: String,
    pub backend: Shared,
    /// Rooms joined over the websocket.
    pub joins: mpsc::UnboundedReceiver<String>,
}

impl Stub {
    pub fn backend(&self) -> std::sync::MutexGuard<'_, Backend> {
        self.backend.lock().unwrap()
    }
}

pub async fn spawn() -> Stub {
    let backend: Shared = Arc::default();
    let (joins_tx, joins) = mpsc::unbounded_channel();
    let state = AppState { backend: backend.clone(), joins: joins_tx };

    let router = Router::new()
        .route("/api/auth/signin", post(sign_in))
        .route("/api/auth/signup", post(sign_up))
        .route("/api/runner/apply", post(apply))
        .route("/api/errands", get(list_errands).post(create_errand))
        .route("/api/errands/:id", get(get_errand))
        .route("/api/errands/:id/status", put(update_status))
        .route("/api/errands/users/:id", get(shared_errands))
        .route("/api/chat/conversations", get(conversations))
        .route("/api/chat/send", post(send))
        .route("/api/chat/:id", get(thread))
        .route("/socket.io/", get(socket))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    Stub {
        api_url: format!("http://{addr}/api"),
        socket_url: format!("http://{addr}"),
        backend,
        joins,
    }
}

pub fn user(id: &str) -> Value {
    let (name, role) = match id {
        "r1" => ("Tunde", "runner"),
        "r2" => ("Bisi", "runner"),
        _ => ("Ada", "user"),
    };
    json!({ "_id": id, "name": name, "email": format!("{id}@sendme.test"), "role": role })
}

pub fn participant(id: &str) -> Value {
    let u = user(id);
    json!({ "_id": id, "name": u["name"] })
}

pub fn message(id: &str, from: &str, to: &str, content: &str) -> Value {
    json!({
        "_id": id,
        "sender": participant(from),
        "recipient": participant(to),
        "content": content,
        "createdAt": "2024-05-01T10:00:00Z",
    })
}

fn fail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

/// Tokens are `tok-<user id>`.
fn caller(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.backend.lock().unwrap().auth_headers.push(header.clone());
    header?.strip_prefix("Bearer tok-").map(str::to_string)
}

fn id_for_email(email: &str) -> &'static str {
    if email.starts_with("runner") {
        "r1"
    } else if email.starts_with("bisi") {
        "r2"
    } else {
        "u1"
    }
}

async fn sign_in(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    caller(&state, &headers);
    if body["password"] == "wrong-password" {
        return fail(StatusCode::UNAUTHORIZED, "Invalid credentials");
    }
    let id = id_for_email(body["email"].as_str().unwrap_or_default());
    Json(json!({ "token": format!("tok-{id}"), "user": user(id) })).into_response()
}

async fn sign_up(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    caller(&state, &headers);
    let email = body["email"].as_str().unwrap_or_default();
    if email.starts_with("taken") {
        return fail(StatusCode::BAD_REQUEST, "Email already registered");
    }
    let id = if body["role"] == "runner" { "r2" } else { "u1" };
    let mut profile = user(id);
    profile["name"] = body["name"].clone();
    profile["email"] = body["email"].clone();
    Json(json!({ "token": format!("tok-{id}"), "user": profile })).into_response()
}

async fn apply(State(state): State<AppState>, headers: HeaderMap, mut form: Multipart) -> Response {
    if caller(&state, &headers).is_none() {
        return fail(StatusCode::UNAUTHORIZED, "Not authorized");
    }
    let mut fields = HashMap::new();
    while let Some(field) = form.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if field.file_name().is_some() {
            let bytes = field.bytes().await.unwrap();
            fields.insert(name, format!("<{} bytes>", bytes.len()));
        } else {
            fields.insert(name, field.text().await.unwrap());
        }
    }
    state.backend.lock().unwrap().applications.push(fields);
    Json(json!({ "message": "Application received" })).into_response()
}

async fn list_errands(State(state): State<AppState>, headers: HeaderMap) -> Response {
    caller(&state, &headers);
    Json(Value::Array(state.backend.lock().unwrap().errands.clone())).into_response()
}

async fn get_errand(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    caller(&state, &headers);
    let backend = state.backend.lock().unwrap();
    match backend.errands.iter().find(|e| e["_id"] == id.as_str()) {
        Some(errand) => Json(errand.clone()).into_response(),
        None => fail(StatusCode::NOT_FOUND, "Errand not found"),
    }
}

async fn create_errand(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let Some(owner) = caller(&state, &headers) else {
        return fail(StatusCode::UNAUTHORIZED, "Not authorized");
    };
    let mut backend = state.backend.lock().unwrap();
    let id = backend.next_id("e");
    let mut errand = body;
    errand["_id"] = json!(id);
    errand["status"] = json!("Pending");
    errand["user"] = json!(owner);
    errand["createdAt"] = json!("2024-05-01T09:00:00Z");
    backend.errands.push(errand.clone());
    (StatusCode::CREATED, Json(errand)).into_response()
}

async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let Some(who) = caller(&state, &headers) else {
        return fail(StatusCode::UNAUTHORIZED, "Not authorized");
    };
    let mut backend = state.backend.lock().unwrap();
    let Some(errand) = backend.errands.iter_mut().find(|e| e["_id"] == id.as_str()) else {
        return fail(StatusCode::NOT_FOUND, "Errand not found");
    };
    let status = body["status"].clone();
    match status.as_str() {
        Some("Accepted") => errand["runner"] = json!(who),
        Some("Pending") => errand["runner"] = Value::Null,
        _ => {}
    }
    errand["status"] = status;
    Json(errand.clone()).into_response()
}

async fn shared_errands(State(state): State<AppState>, headers: HeaderMap, Path(other): Path<String>) -> Response {
    let me = caller(&state, &headers).unwrap_or_default();
    let backend = state.backend.lock().unwrap();
    let shared: Vec<Value> = backend
        .errands
        .iter()
        .filter(|e| {
            (e["user"] == me.as_str() && e["runner"] == other.as_str())
                || (e["user"] == other.as_str() && e["runner"] == me.as_str())
        })
        .cloned()
        .collect();
    Json(Value::Array(shared)).into_response()
}

async fn conversations(State(state): State<AppState>, headers: HeaderMap) -> Response {
    caller(&state, &headers);
    let mut backend = state.backend.lock().unwrap();
    backend.conversation_fetches += 1;
    Json(Value::Array(backend.conversations.clone())).into_response()
}

async fn thread(State(state): State<AppState>, headers: HeaderMap, Path(other): Path<String>) -> Response {
    let me = caller(&state, &headers).unwrap_or_default();
    let backend = state.backend.lock().unwrap();
    let between = |m: &&Value| {
        let (s, r) = (&m["sender"]["_id"], &m["recipient"]["_id"]);
        (s == me.as_str() && r == other.as_str()) || (s == other.as_str() && r == me.as_str())
    };
    Json(Value::Array(backend.messages.iter().filter(between).cloned().collect())).into_response()
}

async fn send(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let Some(me) = caller(&state, &headers) else {
        return fail(StatusCode::UNAUTHORIZED, "Not authorized");
    };
    let mut backend = state.backend.lock().unwrap();
    let id = backend.next_id("m");
    let recipient = body["recipientId"].as_str().unwrap_or_default().to_string();
    let content = body["content"].as_str().unwrap_or_default().to_string();
    let mut stored = message(&id, &me, &recipient, &content);
    stored["createdAt"] = json!(format!("2024-05-01T11:{:02}:00Z", backend.next_id % 60));
    backend.messages.push(stored.clone());
    (StatusCode::CREATED, Json(stored)).into_response()
}

async fn socket(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| engine_io(socket, state))
}

/// Open, connect, join, one ping, then whatever is queued in `push`.
async fn engine_io(mut socket: WebSocket, state: AppState) {
    let open = r#"0{"sid":"stub-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000}"#;
    if socket.send(WsMessage::Text(open.into())).await.is_err() {
        return;
    }
    while let Some(Ok(frame)) = socket.recv().await {
        let WsMessage::Text(text) = frame else { continue };
        if text == "40" {
            let _ = socket.send(WsMessage::Text(r#"40{"sid":"stub-socket"}"#.into())).await;
        } else if let Some(args) = text.strip_prefix("42") {
            let args: Vec<Value> = serde_json::from_str(args).unwrap_or_default();
            if args.first() == Some(&json!("join")) {
                let room = args.get(1).and_then(Value::as_str).unwrap_or_default().to_string();
                let _ = state.joins.send(room);
                let _ = socket.send(WsMessage::Text("2".into())).await;
            }
        } else if text == "3" {
            let pending: Vec<String> = std::mem::take(&mut state.backend.lock().unwrap().push);
            for frame in pending {
                let _ = socket.send(WsMessage::Text(frame)).await;
            }
        }
    }
}
