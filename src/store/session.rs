use crate::api::models::{AuthResponse, Identity, Role};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub user: Option<Identity>,
    pub token: Option<String>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    AuthRequested,
    AuthSucceeded(AuthResponse),
    AuthFailed(String),
    /// Session read back from persisted credentials at startup.
    Restored { token: String, user: Identity },
    SignedOut,
    ClearError,
}

pub fn reduce(state: &mut SessionState, action: SessionAction) {
    match action {
        SessionAction::AuthRequested => {
            state.is_loading = true;
            state.error = None;
        }
        SessionAction::AuthSucceeded(AuthResponse { token, user })
        | SessionAction::Restored { token, user } => {
            state.is_loading = false;
            state.is_authenticated = true;
            state.token = Some(token);
            state.user = Some(user);
        }
        SessionAction::AuthFailed(error) => {
            state.is_loading = false;
            state.error = Some(error);
        }
        SessionAction::SignedOut => *state = SessionState::default(),
        SessionAction::ClearError => state.error = None,
    }
}

impl SessionState {
    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }
}
