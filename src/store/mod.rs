//! One typed container, one pure reducer per slice.

pub mod chat;
pub mod errands;
pub mod session;

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;

pub use chat::{ChatAction, ChatState};
pub use errands::{ErrandState, ErrandsAction, RunnerTab};
pub use session::{SessionAction, SessionState};

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Session(SessionAction),
    Errands(ErrandsAction),
    Chat(ChatAction),
}

impl From<SessionAction> for Action {
    fn from(action: SessionAction) -> Self {
        Action::Session(action)
    }
}

impl From<ErrandsAction> for Action {
    fn from(action: ErrandsAction) -> Self {
        Action::Errands(action)
    }
}

impl From<ChatAction> for Action {
    fn from(action: ChatAction) -> Self {
        Action::Chat(action)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Store {
    pub session: SessionState,
    pub errands: ErrandState,
    pub chat: ChatState,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&mut self, action: impl Into<Action>) {
        match action.into() {
            Action::Session(action) => {
                let before = self.session.user_id().map(str::to_string);
                session::reduce(&mut self.session, action);
                let viewer = self.session.user_id().map(str::to_string);
                // Errands and chat belong to one identity.
                if viewer != before {
                    self.errands = ErrandState::default();
                    self.chat = ChatState::default();
                }
                if self.chat.viewer != viewer {
                    chat::reduce(&mut self.chat, ChatAction::SetViewer(viewer));
                }
            }
            Action::Errands(action) => errands::reduce(&mut self.errands, action),
            Action::Chat(action) => chat::reduce(&mut self.chat, action),
        }
    }
}

/// Shared access to a [`Store`] plus a revision counter that ticks on every
/// dispatch, for views that redraw on change.
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<Mutex<Store>>,
    revision: Arc<watch::Sender<u64>>,
}

impl Default for StoreHandle {
    fn default() -> Self {
        Self::new(Store::new())
    }
}

impl StoreHandle {
    pub fn new(store: Store) -> Self {
        let (revision, _) = watch::channel(0);
        Self { store: Arc::new(Mutex::new(store)), revision: Arc::new(revision) }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn dispatch(&self, action: impl Into<Action>) {
        self.lock().dispatch(action);
        self.revision.send_modify(|r| *r += 1);
    }

    /// Runs `f` against the current state.
    pub fn read<T>(&self, f: impl FnOnce(&Store) -> T) -> T {
        f(&self.lock())
    }

    pub fn snapshot(&self) -> Store {
        self.lock().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{AuthResponse, Identity, Message, Participant, Role};
    use chrono::Utc;

    fn ada() -> Identity {
        Identity { id: "u1".into(), name: "Ada".into(), email: "ada@example.com".into(), role: Role::Customer }
    }

    #[test]
    fn session_changes_sync_the_chat_viewer() {
        let mut store = Store::new();
        store.dispatch(SessionAction::Restored { token: "t".into(), user: ada() });
        assert_eq!(store.chat.viewer.as_deref(), Some("u1"));

        store.dispatch(SessionAction::SignedOut);
        assert!(store.chat.viewer.is_none());
    }

    #[test]
    fn sign_out_drops_cached_slices() {
        let mut store = Store::new();
        store.dispatch(SessionAction::Restored { token: "t".into(), user: ada() });
        store.dispatch(ChatAction::MessageReceived(Message {
            id: "m1".into(),
            sender: Participant::new("r1", "Tunde"),
            recipient: Participant::new("u1", "Ada"),
            content: "hi".into(),
            errand_id: None,
            read: false,
            created_at: Utc::now(),
        }));
        assert_eq!(store.chat.unread_count, 1);

        store.dispatch(SessionAction::SignedOut);
        assert_eq!(store, Store::new());
    }

    #[test]
    fn switching_identity_starts_from_empty_slices() {
        let mut store = Store::new();
        store.dispatch(SessionAction::Restored { token: "t".into(), user: ada() });
        store.dispatch(ChatAction::MessageReceived(Message {
            id: "m1".into(),
            sender: Participant::new("r9", "Femi"),
            recipient: Participant::new("u1", "Ada"),
            content: "secret for Ada".into(),
            errand_id: None,
            read: false,
            created_at: Utc::now(),
        }));
        store.dispatch(ChatAction::OpenConversation(Participant::new("r9", "Femi")));

        let tunde = Identity { id: "r1".into(), name: "Tunde".into(), email: "tunde@example.com".into(), role: Role::Runner };
        store.dispatch(SessionAction::AuthSucceeded(AuthResponse { token: "t2".into(), user: tunde }));

        assert_eq!(store.chat.viewer.as_deref(), Some("r1"));
        assert_eq!(store.chat.unread_count, 0);
        assert!(store.chat.conversations.is_empty());
        assert!(store.chat.active_user.is_none());
        assert_eq!(store.errands, ErrandState::default());
    }

    #[test]
    fn same_identity_signing_in_again_keeps_state() {
        let mut store = Store::new();
        store.dispatch(SessionAction::Restored { token: "t".into(), user: ada() });
        store.dispatch(ChatAction::OpenConversation(Participant::new("r1", "Tunde")));

        store.dispatch(SessionAction::AuthSucceeded(AuthResponse { token: "fresh".into(), user: ada() }));

        assert!(store.chat.is_open("r1"));
        assert_eq!(store.session.token.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn handle_ticks_revision_on_dispatch() {
        let handle = StoreHandle::default();
        let mut rx = handle.subscribe();
        handle.dispatch(ChatAction::ConversationListViewed);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
        assert_eq!(handle.read(|s| s.chat.unread_count), 0);
    }
}
