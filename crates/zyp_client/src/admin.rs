//! Enterprise administration plumbing: thin authed wrappers over the admin
//! endpoints, results delivered as `enterprise:*` notifications.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use crate::api::RestTransport;
use crate::error::ClientError;
use crate::events::Events;
use crate::session::{CurrentUser, Session};

pub struct Admin {
    api: Arc<dyn RestTransport>,
    events: Events,
    session: Session,
    current_enterprise: Arc<Mutex<Option<Value>>>,
}

impl Admin {
    pub(crate) fn new(api: Arc<dyn RestTransport>, events: Events, session: Session) -> Self {
        Self {
            api,
            events,
            session,
            current_enterprise: Arc::new(Mutex::new(None)),
        }
    }

    fn ensure_logged_in(&self) -> bool {
        if self.session.is_logged_in() {
            true
        } else {
            self.events.error(ClientError::NotAuthenticated.to_string());
            false
        }
    }

    pub fn get_enterprises(&self) -> bool {
        if !self.ensure_logged_in() {
            return false;
        }
        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            match api.get("admin/enterprises").await {
                Ok(enterprises) => events.notify("enterprise:list", enterprises),
                Err(e) => events.error(format!("Enterprise fetch failed: {e}")),
            }
        });
        true
    }

    pub fn new_enterprise(&self, enterprise: Value) -> bool {
        if !self.ensure_logged_in() {
            return false;
        }
        let api = self.api.clone();
        let events = self.events.clone();
        let current = self.current_enterprise.clone();
        tokio::spawn(async move {
            match api.post("admin/enterprises", Some(enterprise)).await {
                Ok(created) => {
                    *current.lock() = Some(created.clone());
                    events.notify("enterprise:new", created);
                }
                Err(e) => events.error(format!("Enterprise creation failed: {e}")),
            }
        });
        true
    }

    pub fn set_enterprise(&self, enterprise: Value) -> bool {
        if !self.ensure_logged_in() {
            return false;
        }
        *self.current_enterprise.lock() = Some(enterprise.clone());
        self.events.notify("enterprise:select", enterprise);
        true
    }

    pub fn get_enterprise_users(&self) -> bool {
        if !self.ensure_logged_in() {
            return false;
        }
        let Some(enterprise_id) = self
            .current_enterprise
            .lock()
            .as_ref()
            .and_then(|e| e.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            self.events.error("No enterprise selected");
            return false;
        };

        let api = self.api.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            match api
                .get(&format!("admin/enterprises/users/{enterprise_id}"))
                .await
            {
                Ok(users) => {
                    let processed: Vec<CurrentUser> = users
                        .as_array()
                        .map(|list| {
                            list.iter().filter_map(CurrentUser::from_payload).collect()
                        })
                        .unwrap_or_default();
                    events.notify(
                        "enterprise:users",
                        serde_json::to_value(processed).unwrap_or_default(),
                    );
                }
                Err(e) => events.error(format!("Fetch Enterprise users failed: {e}")),
            }
        });
        true
    }
}
