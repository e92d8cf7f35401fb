use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Account role. The backend calls customers `user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "user")]
    Customer,
    #[serde(rename = "runner")]
    Runner,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Customer => "user",
            Role::Runner => "runner",
        }
    }

    /// Human-facing name.
    pub fn label(self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Runner => "runner",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The signed-in actor as returned by `/auth/*` and persisted under `user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn as_participant(&self) -> Participant {
        Participant {
            id: self.id.clone(),
            name: self.name.clone(),
            email: Some(self.email.clone()),
            photo: None,
        }
    }
}

/// A user as embedded in chat and errand payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

impl Participant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), email: None, photo: None }
    }
}

/// Errand `runner`/`user` fields come back either populated or as a bare id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Id(String),
    Populated(Participant),
}

impl UserRef {
    pub fn id(&self) -> &str {
        match self {
            UserRef::Id(id) => id,
            UserRef::Populated(p) => &p.id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrandStatus {
    #[default]
    Pending,
    Accepted,
    #[serde(rename = "In Progress")]
    InProgress,
    Completed,
    Cancelled,
}

impl ErrandStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrandStatus::Pending => "Pending",
            ErrandStatus::Accepted => "Accepted",
            ErrandStatus::InProgress => "In Progress",
            ErrandStatus::Completed => "Completed",
            ErrandStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ErrandStatus::Completed | ErrandStatus::Cancelled)
    }
}

impl fmt::Display for ErrandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Errand {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub pickup: String,
    pub dropoff: String,
    pub price: f64,
    #[serde(default)]
    pub status: ErrandStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<UserRef>,
    #[serde(default, rename = "user", skip_serializing_if = "Option::is_none")]
    pub customer: Option<UserRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Errand {
    pub fn runner_is(&self, user_id: &str) -> bool {
        self.runner.as_ref().is_some_and(|r| r.id() == user_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub sender: Participant,
    pub recipient: Participant,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errand_id: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn involves(&self, user_id: &str) -> bool {
        self.sender.id == user_id || self.recipient.id == user_id
    }

    /// The party on the other side from `viewer`. Without a known viewer
    /// `fallback_is_sender` picks which side counts as the counterpart.
    pub fn counterpart(&self, viewer: Option<&str>, fallback_is_sender: bool) -> &Participant {
        match viewer {
            Some(me) if self.sender.id == me => &self.recipient,
            Some(me) if self.recipient.id == me => &self.sender,
            _ if fallback_is_sender => &self.sender,
            _ => &self.recipient,
        }
    }
}

/// One entry of the chat list: the counterpart and the latest line exchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub user: Participant,
    pub last_message: Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Identity,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewErrand {
    pub title: String,
    pub description: String,
    pub pickup: String,
    pub dropoff: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct StatusUpdate {
    pub status: ErrandStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub recipient_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errand_id: Option<String>,
}

/// A file picked for upload.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Runner onboarding form, sent as multipart after the runner account exists.
#[derive(Debug, Clone)]
pub struct RunnerApplication {
    pub user_id: String,
    pub vehicle_type: String,
    pub location: String,
    pub relative_phone: String,
    pub national_id: String,
    pub national_slip_image: Option<Attachment>,
    pub photo: Option<Attachment>,
}
