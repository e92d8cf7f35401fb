// Each action dispatches its "requested" step, makes at most one gateway
// call, then dispatches the result or the error string. No retries.

use std::sync::Arc;

use crate::api::client::{ApiClient, ApiError};
use crate::api::models::{
    Errand, Identity, Message, NewErrand, OutgoingMessage, Participant, Role, RunnerApplication,
    SignInRequest, SignUpRequest,
};
use crate::credentials::{self, CredentialStore};
use crate::error::{Error, Result};
use crate::listener::{Listener, ListenerConfig, MessageObserver, Notification};
use crate::settings::Settings;
use crate::storage::ConversationCache;
use crate::store::{ChatAction, ErrandsAction, SessionAction, StoreHandle};
use crate::utils::socket_io_url;
use crate::validate::{self, ErrandForm, RunnerForm, SignInForm, SignUpForm};
use crate::workflow::{self, ErrandAction};

pub const CONFIRMED_LINE: &str = "I have confirmed your request. You can start the errand now!";
pub const REJECTED_LINE: &str = "I have rejected your request.";

const CACHED_CONVERSATIONS: usize = 200;

pub struct App {
    api: ApiClient,
    credentials: Arc<dyn CredentialStore>,
    store: StoreHandle,
    cache: Option<ConversationCache>,
    settings: Settings,
    observers: Vec<Arc<dyn MessageObserver>>,
    push_enabled: bool,
    listener: Option<Listener>,
}

impl App {
    pub fn new(
        settings: Settings,
        credentials: Arc<dyn CredentialStore>,
        cache: Option<ConversationCache>,
    ) -> Result<Self> {
        let api = ApiClient::with_timeout(&settings.api_url, settings.request_timeout(), credentials.clone())
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(Self {
            api,
            credentials,
            store: StoreHandle::default(),
            cache,
            settings,
            observers: Vec::new(),
            push_enabled: false,
            listener: None,
        })
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn identity(&self) -> Option<Identity> {
        self.store.read(|s| s.session.user.clone())
    }

    fn require_identity(&self) -> Result<Identity> {
        self.identity().ok_or(Error::NotSignedIn)
    }

    fn require_role(&self, required: Role) -> Result<Identity> {
        let user = self.require_identity()?;
        if user.role != required {
            return Err(Error::WrongRole { required });
        }
        Ok(user)
    }

    // ---- session -------------------------------------------------------

    /// Rebuilds the session from persisted credentials. No network.
    pub fn restore_session(&mut self) -> Result<Option<Identity>> {
        let Some((token, user)) = credentials::restore_session(self.credentials.as_ref())? else {
            return Ok(None);
        };
        log::info!("Restored session for {}", user.email);
        self.store.dispatch(SessionAction::Restored { token, user: user.clone() });
        if let Some(cache) = &self.cache {
            match cache.load(CACHED_CONVERSATIONS) {
                Ok(cached) if !cached.is_empty() => {
                    self.store.dispatch(ChatAction::ConversationsLoaded(cached));
                }
                Ok(_) => {}
                Err(e) => log::warn!("Conversation cache unavailable: {e}"),
            }
        }
        self.sync_listener()?;
        Ok(Some(user))
    }

    pub async fn sign_in(&mut self, form: &SignInForm) -> Result<Identity> {
        let request = validate::sign_in(form)?;
        self.authenticate(Credentials::SignIn(request)).await
    }

    pub async fn sign_up(&mut self, form: &SignUpForm, role: Role) -> Result<Identity> {
        let request = validate::sign_up(form, role)?;
        self.authenticate(Credentials::SignUp(request)).await
    }

    /// Creates the runner account, then files the runner application.
    pub async fn become_runner(&mut self, form: RunnerForm) -> Result<Identity> {
        let request = validate::runner(&form)?;
        let user = self.authenticate(Credentials::SignUp(request)).await?;
        let application = RunnerApplication {
            user_id: user.id.clone(),
            vehicle_type: form.vehicle,
            location: form.location,
            relative_phone: form.relative_phone,
            national_id: form.national_id,
            national_slip_image: form.national_slip_image,
            photo: form.photo,
        };
        self.api
            .apply_as_runner(application)
            .await
            .map_err(|e| remote(&e, "Application failed"))?;
        log::info!("Runner application submitted for {}", user.email);
        Ok(user)
    }

    async fn authenticate(&mut self, credentials: Credentials) -> Result<Identity> {
        self.store.dispatch(SessionAction::AuthRequested);
        let (result, fallback) = match &credentials {
            Credentials::SignIn(req) => (self.api.sign_in(req).await, "Login failed"),
            Credentials::SignUp(req) => (self.api.sign_up(req).await, "Registration failed"),
        };
        let auth = match result {
            Ok(auth) => auth,
            Err(e) => {
                let err = remote(&e, fallback);
                self.store.dispatch(SessionAction::AuthFailed(err.to_string()));
                return Err(err);
            }
        };
        if let Err(e) = credentials::persist_session(self.credentials.as_ref(), &auth.token, &auth.user) {
            self.store.dispatch(SessionAction::AuthFailed(e.to_string()));
            return Err(e.into());
        }
        if self.identity().map(|u| u.id) != Some(auth.user.id.clone()) {
            self.forget_cached_conversations();
        }
        let user = auth.user.clone();
        self.store.dispatch(SessionAction::AuthSucceeded(auth));
        self.sync_listener()?;
        Ok(user)
    }

    pub async fn sign_out(&mut self) -> Result<()> {
        credentials::clear_session(self.credentials.as_ref())?;
        self.forget_cached_conversations();
        self.store.dispatch(SessionAction::SignedOut);
        if let Some(listener) = self.listener.take() {
            listener.stop().await;
        }
        Ok(())
    }

    fn forget_cached_conversations(&self) {
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.clear() {
                log::warn!("Could not clear conversation cache: {e}");
            }
        }
    }

    // ---- push channel ----------------------------------------------------

    pub fn add_observer(&mut self, observer: Arc<dyn MessageObserver>) {
        self.observers.push(observer);
    }

    /// Keeps one push connection open per signed-in identity from now on.
    pub fn enable_push(&mut self) -> Result<()> {
        self.push_enabled = true;
        self.sync_listener()
    }

    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    fn sync_listener(&mut self) -> Result<()> {
        if !self.push_enabled {
            return Ok(());
        }
        let wanted = self.store.read(|s| s.session.user_id().map(str::to_string));
        if self.listener.as_ref().map(Listener::user_id) == wanted.as_deref() {
            return Ok(());
        }
        // Dropping aborts the old connection.
        self.listener = None;
        if let Some(user_id) = wanted {
            let url = socket_io_url(&self.settings.socket_url).map_err(|e| Error::Socket(e.to_string()))?;
            let config = ListenerConfig { url, reconnect_delay: self.settings.reconnect_delay() };
            let refresh: Arc<dyn MessageObserver> = Arc::new(ConversationRefresh {
                api: self.api.clone(),
                store: self.store.clone(),
                cache: self.cache.clone(),
            });
            let mut observers = vec![refresh];
            observers.extend(self.observers.iter().cloned());
            self.listener = Some(Listener::spawn(config, user_id, self.store.clone(), observers));
        }
        Ok(())
    }

    // ---- errands -----------------------------------------------------------

    pub async fn fetch_errands(&self) -> Result<Vec<Errand>> {
        self.store.dispatch(ErrandsAction::FetchRequested);
        match self.api.errands().await {
            Ok(errands) => {
                self.store.dispatch(ErrandsAction::FetchSucceeded(errands.clone()));
                Ok(errands)
            }
            Err(e) => {
                let err = remote(&e, "Failed to fetch errands");
                self.store.dispatch(ErrandsAction::FetchFailed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Looks an errand up, locally first. `None` means the server does not
    /// know the id.
    pub async fn track_errand(&self, id: &str) -> Result<Option<Errand>> {
        if let Some(errand) = self.store.read(|s| s.errands.find(id).cloned()) {
            return Ok(Some(errand));
        }
        match self.api.errand(id).await {
            Ok(errand) => {
                self.store.dispatch(ErrandsAction::Fetched(errand.clone()));
                Ok(Some(errand))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => {
                let err = remote(&e, "Failed to fetch errand");
                self.store.dispatch(ErrandsAction::FetchFailed(err.to_string()));
                Err(err)
            }
        }
    }

    pub async fn post_errand(&self, form: &ErrandForm) -> Result<Errand> {
        let errand = validate::errand(form)?;
        self.create_errand(&errand).await
    }

    pub async fn create_errand(&self, errand: &NewErrand) -> Result<Errand> {
        self.require_role(Role::Customer)?;
        self.store.dispatch(ErrandsAction::CreateRequested);
        match self.api.create_errand(errand).await {
            Ok(created) => {
                log::info!("Created errand {} ({})", created.id, created.title);
                self.store.dispatch(ErrandsAction::Created(created.clone()));
                Ok(created)
            }
            Err(e) => {
                let err = remote(&e, "Failed to create errand");
                self.store.dispatch(ErrandsAction::CreateFailed(err.to_string()));
                Err(err)
            }
        }
    }

    /// Moves an errand along its workflow. The transition is checked
    /// locally; the stored record is replaced by what the server returns.
    pub async fn advance_errand(&self, id: &str, action: ErrandAction) -> Result<Errand> {
        let user = self.require_identity()?;
        let current = match self.known_errand(id) {
            Some(errand) => errand,
            None => self.track_errand(id).await?.ok_or_else(|| Error::NotFound(format!("errand {id}")))?,
        };
        let target = workflow::check(action, user.role, current.status)?;

        self.store.dispatch(ErrandsAction::StatusUpdateRequested);
        let updated = match self.api.update_errand_status(id, target).await {
            Ok(updated) => updated,
            Err(e) => {
                let err = remote(&e, "Failed to update status");
                self.store.dispatch(ErrandsAction::StatusUpdateFailed(err.to_string()));
                return Err(err);
            }
        };
        log::info!("Errand {id}: {} -> {}", current.status, updated.status);
        self.store.dispatch(ErrandsAction::StatusUpdated(updated.clone()));

        let line = match action {
            ErrandAction::Confirm => Some(CONFIRMED_LINE),
            ErrandAction::Reject => {
                self.store.dispatch(ErrandsAction::ClearActiveRequest);
                Some(REJECTED_LINE)
            }
            ErrandAction::Request | ErrandAction::Complete => None,
        };
        if let Some(line) = line {
            if self.store.read(|s| s.chat.active_user.is_some()) {
                if let Err(e) = self.send_message(line, None).await {
                    log::warn!("Status changed but the chat notice was not sent: {e}");
                }
            }
        }
        Ok(updated)
    }

    fn known_errand(&self, id: &str) -> Option<Errand> {
        self.store.read(|s| {
            s.errands
                .active_request
                .as_ref()
                .filter(|e| e.id == id)
                .or_else(|| s.errands.find(id))
                .cloned()
        })
    }

    pub async fn request_errand(&self, id: &str) -> Result<Errand> {
        self.advance_errand(id, ErrandAction::Request).await
    }

    pub async fn confirm_errand(&self, id: &str) -> Result<Errand> {
        self.advance_errand(id, ErrandAction::Confirm).await
    }

    pub async fn reject_errand(&self, id: &str) -> Result<Errand> {
        self.advance_errand(id, ErrandAction::Reject).await
    }

    pub async fn complete_errand(&self, id: &str) -> Result<Errand> {
        self.advance_errand(id, ErrandAction::Complete).await
    }

    // ---- chat --------------------------------------------------------------

    /// Entering the chat list: clears the unread badge and refreshes.
    pub async fn open_conversation_list(&self) -> Result<()> {
        self.store.dispatch(ChatAction::ConversationListViewed);
        self.refresh_conversations().await
    }

    pub async fn refresh_conversations(&self) -> Result<()> {
        sync_conversations(&self.api, &self.store, self.cache.as_ref()).await
    }

    /// Opens the thread with `user`, loads its history and any errand the
    /// two parties have in flight.
    pub async fn open_conversation(&self, user: Participant) -> Result<()> {
        let counterpart_id = user.id.clone();
        self.store.dispatch(ChatAction::OpenConversation(user));

        self.store.dispatch(ChatAction::MessagesRequested);
        match self.api.messages(&counterpart_id).await {
            Ok(messages) => self.store.dispatch(ChatAction::MessagesLoaded {
                counterpart_id: counterpart_id.clone(),
                messages,
            }),
            Err(e) => {
                let err = remote(&e, "Failed to fetch messages");
                self.store.dispatch(ChatAction::MessagesFailed(err.to_string()));
                return Err(err);
            }
        }

        match self.api.errands_with(&counterpart_id).await {
            Ok(shared) => self.store.dispatch(ErrandsAction::SharedLoaded(shared)),
            Err(e) => log::warn!("Could not load errands shared with {counterpart_id}: {e}"),
        }
        Ok(())
    }

    pub fn close_conversation(&self) {
        self.store.dispatch(ChatAction::CloseConversation);
        self.store.dispatch(ErrandsAction::ClearActiveRequest);
    }

    /// Sends `content` to the open conversation.
    pub async fn send_message(&self, content: &str, errand_id: Option<String>) -> Result<Message> {
        let recipient = self
            .store
            .read(|s| s.chat.active_user.clone())
            .ok_or(Error::NoActiveConversation)?;
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::Validation { field: "content", message: "Message is empty".into() });
        }
        let outgoing = OutgoingMessage { recipient_id: recipient.id, content: content.to_string(), errand_id };

        self.store.dispatch(ChatAction::SendRequested);
        match self.api.send_message(&outgoing).await {
            Ok(message) => {
                self.store.dispatch(ChatAction::MessageSent(message.clone()));
                Ok(message)
            }
            Err(e) => {
                let err = remote(&e, "Failed to send message");
                self.store.dispatch(ChatAction::SendFailed(err.to_string()));
                Err(err)
            }
        }
    }
}

/// Server summaries are the source of truth: the fetched list replaces the
/// cached one. A result that lands after the identity changed is dropped.
async fn sync_conversations(
    api: &ApiClient,
    store: &StoreHandle,
    cache: Option<&ConversationCache>,
) -> Result<()> {
    let viewer = store.read(|s| s.session.user_id().map(str::to_string));
    store.dispatch(ChatAction::ConversationsRequested);
    let list = match api.conversations().await {
        Ok(list) => list,
        Err(e) => {
            let err = remote(&e, "Failed to fetch conversations");
            store.dispatch(ChatAction::ConversationsFailed(err.to_string()));
            return Err(err);
        }
    };
    if store.read(|s| s.session.user_id() != viewer.as_deref()) {
        log::debug!("Dropping conversations fetched for a previous identity");
        return Ok(());
    }
    if let Some(cache) = cache {
        if let Err(e) = cache.replace_all(&list) {
            log::warn!("Could not cache conversations: {e}");
        }
    }
    store.dispatch(ChatAction::ConversationsLoaded(list));
    Ok(())
}

/// Pulls fresh summaries after every pushed message.
struct ConversationRefresh {
    api: ApiClient,
    store: StoreHandle,
    cache: Option<ConversationCache>,
}

impl MessageObserver for ConversationRefresh {
    fn on_message(&self, _: &Notification, _: &Message) {
        let (api, store, cache) = (self.api.clone(), self.store.clone(), self.cache.clone());
        tokio::spawn(async move {
            if let Err(e) = sync_conversations(&api, &store, cache.as_ref()).await {
                log::warn!("Conversation refresh after push failed: {e}");
            }
        });
    }
}

enum Credentials {
    SignIn(SignInRequest),
    SignUp(SignUpRequest),
}

fn remote(err: &ApiError, fallback: &str) -> Error {
    log::warn!("{fallback}: {err}");
    Error::remote(err, fallback)
}
