//! The `ZypClient` facade.
//!
//! Login/logout drive the session and the realtime channel; everything the
//! client observes comes back through the event fan-out. Network-touching
//! methods are fire-and-forget: the returned bool reports whether the
//! request was submitted, and results arrive as events.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use zyp_proto::Message;

use crate::admin::Admin;
use crate::api::{ApiClient, ApiError, RestTransport};
use crate::config::ZypConfig;
use crate::error::ClientError;
use crate::events::{Events, ZypEvent};
use crate::inbox::{Inbox, ReconcileOutcome};
use crate::session::{CurrentUser, Session};
use crate::update;
use crate::ws::WsChannel;

/// Registry name of the reconciler's notification sink.
const INBOX_OBSERVER: &str = "inbox";

/// A new conversation to be sent.
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// One of FCFS, STANDARD, FYI.
    pub pattern: String,
    /// Member ids (zyp or enterprise) to address.
    pub members: Vec<String>,
    pub content: String,
    /// FCFS only: accepts needed to complete the message. Defaults to 1.
    pub max_accepts: Option<i64>,
}

struct ClientInner {
    config: ZypConfig,
    events: Events,
    api: Arc<dyn RestTransport>,
    session: Session,
    inbox: Mutex<Inbox>,
    ws: WsChannel,
    admin: Admin,
    enterprise_token: Option<String>,
}

/// Handle to one ZypHub client instance. Cheap to clone; all clones share
/// the same session, cache, and connection.
#[derive(Clone)]
pub struct ZypClient {
    inner: Arc<ClientInner>,
}

impl ZypClient {
    pub fn new(config: ZypConfig) -> Result<Self, ApiError> {
        let api = Arc::new(ApiClient::new(&config.api_base_url)?);
        Ok(Self::with_transport(config, api, None))
    }

    /// Like `new`, with an enterprise API key used by
    /// `login_by_enterprise_token` when no per-call key is given.
    pub fn with_enterprise_token(
        config: ZypConfig,
        enterprise_token: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let api = Arc::new(ApiClient::new(&config.api_base_url)?);
        Ok(Self::with_transport(config, api, Some(enterprise_token.into())))
    }

    /// Build against any transport; the seam the tests use.
    pub fn with_transport(
        config: ZypConfig,
        api: Arc<dyn RestTransport>,
        enterprise_token: Option<String>,
    ) -> Self {
        let events = Events::default();
        let session = Session::new();
        let ws = WsChannel::new(
            events.clone(),
            config.ws_url.clone(),
            config.keepalive_interval,
            config.reconnect_delay,
        );
        let admin = Admin::new(api.clone(), events.clone(), session.clone());
        Self {
            inner: Arc::new(ClientInner {
                config,
                events,
                api,
                session,
                inbox: Mutex::new(Inbox::new()),
                ws,
                admin,
                enterprise_token,
            }),
        }
    }

    /// Subscribe to snapshots, notifications, and error signals.
    pub fn subscribe(&self) -> broadcast::Receiver<ZypEvent> {
        self.inner.events.subscribe()
    }

    pub fn session(&self) -> Session {
        self.inner.session.clone()
    }

    // ── Login ────────────────────────────────────────────────────────────

    /// Login with an email (bare usernames get the configured domain
    /// appended) and password.
    pub fn login_by_email(&self, email: &str, password: &str) {
        let mut email = email.to_string();
        if !email.contains('@') {
            email = format!("{email}@{}", self.inner.config.email_domain);
        }
        let body = json!({"email": email, "password": password});
        let client = self.clone();
        tokio::spawn(async move {
            let result = client.inner.api.post("users/login", Some(body)).await;
            client.finish_login("login:email", result, None);
        });
    }

    /// Login with a username and an enterprise API key. The key passed at
    /// construction wins over the per-call one.
    pub fn login_by_enterprise_token(&self, user_name: &str, enterprise_token: Option<&str>) {
        let Some(key) = self
            .inner
            .enterprise_token
            .clone()
            .or_else(|| enterprise_token.map(str::to_string))
        else {
            self.inner
                .events
                .error("login_by_enterprise_token() missing enterprise token");
            return;
        };
        let body = json!({"id": user_name, "key": key});
        let client = self.clone();
        tokio::spawn(async move {
            let result = client
                .inner
                .api
                .post("users/login/apikey", Some(body))
                .await;
            client.finish_login("login:enterpriseToken", result, None);
        });
    }

    /// Login with a previously issued user token.
    pub fn login_by_user_token(&self, user_token: &str) {
        if user_token.is_empty() {
            self.inner
                .events
                .error("login_by_user_token() missing user token");
            return;
        }
        self.inner.api.set_token(Some(user_token.to_string()));
        let fallback = user_token.to_string();
        let client = self.clone();
        tokio::spawn(async move {
            let result = client.inner.api.get("users").await;
            client.finish_login("login:userToken", result, Some(fallback));
        });
    }

    fn finish_login(&self, topic: &str, result: Result<Value, ApiError>, fallback_token: Option<String>) {
        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                self.inner.session.clear();
                self.inner.events.error(format!("Login failed: {e}"));
                return;
            }
        };
        let Some(mut user) = CurrentUser::from_payload(&payload) else {
            self.inner.session.clear();
            self.inner
                .events
                .error("Login failed: unrecognized user payload");
            return;
        };
        if user.token.is_none() {
            user.token = fallback_token;
        }

        let token = user.token.clone().unwrap_or_default();
        self.inner.api.set_token(user.token.clone());
        self.inner.session.set_current(Some(user.clone()));
        self.inner.session.set_logged_in(true);
        self.connect_socket(&token);
        self.inner
            .events
            .notify(topic, serde_json::to_value(&user).unwrap_or_default());
    }

    fn connect_socket(&self, token: &str) {
        let (sink_tx, mut sink_rx) = mpsc::unbounded_channel::<String>();
        self.inner.ws.connect(token, INBOX_OBSERVER, sink_tx);

        // One reconciler task: frames are merged strictly in arrival
        // order, one pass at a time.
        let client = self.clone();
        tokio::spawn(async move {
            while let Some(frame) = sink_rx.recv().await {
                let outcome = client
                    .inner
                    .inbox
                    .lock()
                    .reconcile(&frame, &client.inner.session);
                match outcome {
                    Ok(ReconcileOutcome::Applied(snapshot)) => {
                        client.inner.events.message(snapshot);
                    }
                    Ok(ReconcileOutcome::Discarded(reason)) => {
                        debug!("[inbox] frame discarded: {reason:?}");
                    }
                    Err(e) => {
                        client
                            .inner
                            .events
                            .error(format!("Notification handling failed: {e}"));
                    }
                }
            }
        });
    }

    /// Logout. Local session state is cleared even when the server call
    /// fails, so the client can never stay half authenticated.
    pub fn logout(&self) -> bool {
        if !self.ensure_logged_in() {
            return false;
        }
        let user = self.inner.session.current();
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.inner.api.post("users/logout", None).await {
                warn!("[session] server logout failed, clearing local session anyway: {e}");
            }
            client.inner.session.clear();
            client.inner.api.set_token(None);
            client.inner.ws.close(INBOX_OBSERVER);
            client
                .inner
                .events
                .notify("logout", serde_json::to_value(&user).unwrap_or_default());
        });
        true
    }

    // ── Inbox ────────────────────────────────────────────────────────────

    /// Fetch the full message list from the server and replace the cache.
    /// The refreshed inbox arrives as a snapshot event with no `change`.
    pub fn get_message_list(&self) -> bool {
        if !self.ensure_logged_in() {
            return false;
        }
        let client = self.clone();
        tokio::spawn(async move {
            match client.inner.api.get("conversations").await {
                Ok(Value::Array(list)) => {
                    let refreshed = client
                        .inner
                        .inbox
                        .lock()
                        .refresh(list, &client.inner.session);
                    match refreshed {
                        Ok(snapshot) => client.inner.events.message(snapshot),
                        Err(e) => client
                            .inner
                            .events
                            .error(format!("get_message_list() failed: {e}")),
                    }
                }
                Ok(_) => client
                    .inner
                    .events
                    .error("get_message_list() failed: unexpected response shape"),
                Err(e) => client
                    .inner
                    .events
                    .error(format!("get_message_list() failed: {e}")),
            }
        });
        true
    }

    /// The cached inbox, as of the latest reconciliation pass. May lag the
    /// server when connectivity has been interrupted.
    pub fn cached_message_list(&self) -> Option<Vec<Message>> {
        if !self.ensure_logged_in() {
            return None;
        }
        Some(self.inner.inbox.lock().messages().to_vec())
    }

    /// Send a new message. A server acknowledgement arrives as a
    /// `message:new` notification carrying the conversation id.
    pub fn new_message(&self, draft: NewMessage) -> bool {
        if !self.ensure_logged_in() {
            return false;
        }
        let body = json!({
            "pattern": draft.pattern,
            "members": draft.members,
            "content": {"text": draft.content},
            "priority": "0",
            "maxAccepts": draft.max_accepts.unwrap_or(1),
        });
        let client = self.clone();
        tokio::spawn(async move {
            match client.inner.api.post("conversations", Some(body)).await {
                Ok(created) => {
                    if created.get("conversationId").is_some() {
                        client.inner.events.notify("message:new", created);
                    }
                }
                Err(e) => client
                    .inner
                    .events
                    .error(format!("Message creation failed: {e}")),
            }
        });
        true
    }

    /// Perform `action` on `message`; see the gatekeeper rules in
    /// `update`.
    pub fn request_update(&self, message: &Message, action: &str, data: Option<String>) -> bool {
        update::request_update(
            self.inner.api.clone(),
            self.inner.events.clone(),
            &self.inner.session,
            message,
            action,
            data,
        )
    }

    // ── Profile and administration ───────────────────────────────────────

    /// Set the name on the logged-in user's profile.
    pub fn set_name(&self, first: &str, last: &str) -> bool {
        if !self.ensure_logged_in() {
            return false;
        }
        let body = json!({"firstName": first, "lastName": last});
        let client = self.clone();
        tokio::spawn(async move {
            match client.inner.api.post("users/register", Some(body)).await {
                Ok(user) => client.inner.events.notify("user", user),
                Err(e) => client
                    .inner
                    .events
                    .error(format!("set_name() failed: {e}")),
            }
        });
        true
    }

    pub fn get_enterprises(&self) -> bool {
        self.inner.admin.get_enterprises()
    }

    pub fn new_enterprise(&self, enterprise: Value) -> bool {
        self.inner.admin.new_enterprise(enterprise)
    }

    pub fn set_enterprise(&self, enterprise: Value) -> bool {
        self.inner.admin.set_enterprise(enterprise)
    }

    pub fn get_enterprise_users(&self) -> bool {
        self.inner.admin.get_enterprise_users()
    }

    fn ensure_logged_in(&self) -> bool {
        if self.inner.session.is_logged_in() {
            true
        } else {
            self.inner
                .events
                .error(ClientError::NotAuthenticated.to_string());
            false
        }
    }
}
