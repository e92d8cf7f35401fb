use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message as WsMessage};
use url::Url;

use crate::api::events::{self, CONNECT, Frame, PONG};
use crate::api::models::Message;
use crate::store::{ChatAction, StoreHandle};

pub const NOTIFICATION_DURATION: Duration = Duration::from_secs(4);

/// A transient "new message" toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub photo: Option<String>,
    pub duration: Duration,
}

impl Notification {
    pub fn for_message(message: &Message) -> Self {
        let name = message.sender.name.trim();
        Self {
            title: if name.is_empty() { "Unknown User".to_string() } else { name.to_string() },
            body: message.content.clone(),
            photo: message.sender.photo.clone(),
            duration: NOTIFICATION_DURATION,
        }
    }
}

/// Called for every pushed message, after the store has been updated.
pub trait MessageObserver: Send + Sync {
    fn on_message(&self, notification: &Notification, message: &Message);
}

impl<F> MessageObserver for F
where
    F: Fn(&Notification, &Message) + Send + Sync,
{
    fn on_message(&self, notification: &Notification, message: &Message) {
        self(notification, message)
    }
}

#[derive(Debug, Error)]
pub enum ListenError {
    #[error(transparent)]
    Websocket(#[from] tungstenite::Error),
    #[error("server refused the connection: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Full websocket endpoint, see [`crate::utils::socket_io_url`].
    pub url: Url,
    pub reconnect_delay: Duration,
}

pub struct Listener {
    user_id: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Listener {
    pub fn spawn(
        config: ListenerConfig,
        user_id: String,
        store: StoreHandle,
        observers: Vec<Arc<dyn MessageObserver>>,
    ) -> Self {
        let (shutdown, stop) = oneshot::channel();
        let task = tokio::spawn(run(config, user_id.clone(), store, observers, stop));
        Self { user_id, shutdown: Some(shutdown), task: Some(task) }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Closes the connection and waits for the task to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    config: ListenerConfig,
    user_id: String,
    store: StoreHandle,
    observers: Vec<Arc<dyn MessageObserver>>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop => break,
            result = session(&config, &user_id, &store, &observers) => match result {
                Ok(()) => log::info!("Push channel closed"),
                Err(e) => log::warn!("Push channel error: {e}"),
            },
        }
        tokio::select! {
            _ = &mut stop => break,
            _ = tokio::time::sleep(config.reconnect_delay) => {
                log::debug!("Reconnecting push channel");
            }
        }
    }
    log::debug!("Push listener for {user_id} stopped");
}

async fn session(
    config: &ListenerConfig,
    user_id: &str,
    store: &StoreHandle,
    observers: &[Arc<dyn MessageObserver>],
) -> Result<(), ListenError> {
    let (ws, _) = connect_async(config.url.as_str()).await?;
    let (mut sink, mut stream) = ws.split();

    while let Some(frame) = stream.next().await {
        let text = match frame? {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };
        match events::decode(&text) {
            Ok(Frame::Open(handshake)) => {
                log::debug!("Engine.IO session {}", handshake.sid);
                sink.send(WsMessage::Text(CONNECT.to_string())).await?;
            }
            Ok(Frame::Connected) => {
                sink.send(WsMessage::Text(events::join_frame(user_id))).await?;
                log::info!("Push channel connected, joined room {user_id}");
            }
            Ok(Frame::Ping) => sink.send(WsMessage::Text(PONG.to_string())).await?,
            Ok(Frame::Event(event)) => match event.new_message() {
                Some(Ok(message)) => deliver(store, observers, message),
                Some(Err(e)) => log::warn!("Dropping malformed {} payload: {e}", events::EVENT_NEW_MESSAGE),
                None => log::debug!("Ignoring push event {}", event.name),
            },
            Ok(Frame::ConnectError(reason)) => return Err(ListenError::Rejected(reason)),
            Ok(Frame::Close | Frame::Disconnected) => break,
            Ok(Frame::Pong | Frame::Ignored) => {}
            Err(e) => log::warn!("Ignoring push frame: {e}"),
        }
    }
    Ok(())
}

fn deliver(store: &StoreHandle, observers: &[Arc<dyn MessageObserver>], message: Message) {
    store.dispatch(ChatAction::MessageReceived(message.clone()));
    let notification = Notification::for_message(&message);
    for observer in observers {
        observer.on_message(&notification, &message);
    }
}
