use crate::api::models::{Conversation, Message, Participant};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    pub conversations: Vec<Conversation>,
    pub active_messages: Vec<Message>,
    pub active_user: Option<Participant>,
    pub unread_count: u32,
    pub is_loading: bool,
    pub is_sending: bool,
    pub error: Option<String>,
    /// Id of the signed-in user, kept in sync by the store.
    pub viewer: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatAction {
    SetViewer(Option<String>),
    OpenConversation(Participant),
    CloseConversation,
    ConversationListViewed,
    ConversationsRequested,
    ConversationsLoaded(Vec<Conversation>),
    ConversationsFailed(String),
    MessagesRequested,
    MessagesLoaded { counterpart_id: String, messages: Vec<Message> },
    MessagesFailed(String),
    SendRequested,
    MessageSent(Message),
    SendFailed(String),
    MessageReceived(Message),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Outbound,
    Inbound,
}

impl ChatState {
    pub fn conversation_with(&self, user_id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.user.id == user_id)
    }

    pub fn is_open(&self, user_id: &str) -> bool {
        self.active_user.as_ref().is_some_and(|u| u.id == user_id)
    }

    fn already_filed(&self, message: &Message) -> bool {
        self.active_messages.iter().any(|m| m.id == message.id)
            || self.conversations.iter().any(|c| c.last_message.id == message.id)
    }
}

pub fn reduce(state: &mut ChatState, action: ChatAction) {
    match action {
        ChatAction::SetViewer(viewer) => state.viewer = viewer,
        ChatAction::OpenConversation(user) => {
            if !state.is_open(&user.id) {
                state.active_messages.clear();
            }
            state.active_user = Some(user);
        }
        ChatAction::CloseConversation => {
            state.active_user = None;
            state.active_messages.clear();
        }
        ChatAction::ConversationListViewed => state.unread_count = 0,
        ChatAction::ConversationsRequested | ChatAction::MessagesRequested => {
            state.is_loading = true;
            state.error = None;
        }
        ChatAction::ConversationsLoaded(mut list) => {
            state.is_loading = false;
            // A push filed while the list was in flight may be newer than
            // what the server returned for that counterpart.
            for loaded in &mut list {
                if let Some(local) = state.conversation_with(&loaded.user.id) {
                    if local.last_message.created_at > loaded.last_message.created_at {
                        loaded.last_message = local.last_message.clone();
                    }
                }
            }
            state.conversations = dedupe_and_sort(list);
        }
        ChatAction::MessagesLoaded { counterpart_id, mut messages } => {
            state.is_loading = false;
            // The user may have moved on to another thread while this loaded.
            if state.is_open(&counterpart_id) {
                // Keep whatever was filed while the history was in flight.
                let arrived: Vec<Message> = state
                    .active_messages
                    .drain(..)
                    .filter(|m| !messages.iter().any(|loaded| loaded.id == m.id))
                    .collect();
                messages.extend(arrived);
                messages.sort_by_key(|m| m.created_at);
                state.active_messages = messages;
            }
        }
        ChatAction::ConversationsFailed(error) | ChatAction::MessagesFailed(error) => {
            state.is_loading = false;
            state.error = Some(error);
        }
        ChatAction::SendRequested => {
            state.is_sending = true;
            state.error = None;
        }
        ChatAction::MessageSent(message) => {
            state.is_sending = false;
            file_message(state, message, Direction::Outbound);
        }
        ChatAction::SendFailed(error) => {
            state.is_sending = false;
            state.error = Some(error);
        }
        ChatAction::MessageReceived(message) => file_message(state, message, Direction::Inbound),
    }
}

fn file_message(state: &mut ChatState, message: Message, direction: Direction) {
    if state.already_filed(&message) {
        log::debug!("Message {} already filed", message.id);
        return;
    }

    let counterpart = message
        .counterpart(state.viewer.as_deref(), direction == Direction::Inbound)
        .clone();
    let authored_by_viewer = state.viewer.as_deref() == Some(message.sender.id.as_str());
    let existing = state.conversations.iter().position(|c| message.involves(&c.user.id));
    // Older than the summary: a late redelivery, not new activity.
    let late = existing.is_some_and(|i| state.conversations[i].last_message.created_at > message.created_at);

    if state.is_open(&counterpart.id) {
        let at = state.active_messages.partition_point(|m| m.created_at <= message.created_at);
        state.active_messages.insert(at, message.clone());
    } else if direction == Direction::Inbound && !authored_by_viewer && !late {
        state.unread_count += 1;
    }
    if late {
        return;
    }

    let entry = match existing {
        Some(index) => {
            let mut conversation = state.conversations.remove(index);
            conversation.last_message = message;
            conversation
        }
        None => {
            // Prefer the open counterpart's details when it is the same person.
            let user = state
                .active_user
                .clone()
                .filter(|u| u.id == counterpart.id)
                .unwrap_or(counterpart);
            Conversation { user, last_message: message }
        }
    };
    state.conversations.insert(0, entry);
}

/// One entry per counterpart (first wins), newest activity first.
fn dedupe_and_sort(list: Vec<Conversation>) -> Vec<Conversation> {
    let mut out: Vec<Conversation> = Vec::with_capacity(list.len());
    for conversation in list {
        if !out.iter().any(|c| c.user.id == conversation.user.id) {
            out.push(conversation);
        }
    }
    out.sort_by(|a, b| b.last_message.created_at.cmp(&a.last_message.created_at));
    out
}
