//! Logged-in identity tracking.
//!
//! The session is read-only for the gatekeeper and the reconciler; only
//! the login/logout flows write to it.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use zyp_proto::IdentityRef;

/// The user object produced by any login method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentUser {
    pub zyp_id: String,
    pub enterprise_id: Option<String>,
    /// Bearer token; also used to authenticate the realtime socket.
    pub token: Option<String>,
    pub enterprises_uuid: Option<String>,
    #[serde(default)]
    pub first_time_login: bool,
}

impl CurrentUser {
    /// Build from the server's user payload. The zyp id is the first
    /// profile entry; the enterprise id travels as `originalId` and the
    /// enterprise's own uuid as `enterpriseId`.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let zyp_id = payload.get("profile")?.get(0)?.as_str()?.to_string();
        Some(Self {
            zyp_id,
            enterprise_id: string_field(payload, "originalId"),
            token: string_field(payload, "token"),
            enterprises_uuid: string_field(payload, "enterpriseId"),
            first_time_login: payload
                .get("firstTimeLogin")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    }
}

fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

#[derive(Default)]
struct SessionInner {
    current: Option<CurrentUser>,
    logged_in: bool,
}

#[derive(Clone, Default)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_current(&self, user: Option<CurrentUser>) {
        self.inner.lock().current = user;
    }

    pub fn set_logged_in(&self, state: bool) {
        self.inner.lock().logged_in = state;
    }

    /// Force the local session to logged-out, whatever the server said.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.current = None;
        inner.logged_in = false;
    }

    pub fn is_logged_in(&self) -> bool {
        self.inner.lock().logged_in
    }

    pub fn current(&self) -> Option<CurrentUser> {
        self.inner.lock().current.clone()
    }

    pub fn zyp_id(&self) -> Option<String> {
        self.inner.lock().current.as_ref().map(|u| u.zyp_id.clone())
    }

    pub fn enterprise_id(&self) -> Option<String> {
        self.inner
            .lock()
            .current
            .as_ref()
            .and_then(|u| u.enterprise_id.clone())
    }

    /// The identity stamped onto inbox snapshots.
    pub fn identity(&self) -> IdentityRef {
        let inner = self.inner.lock();
        IdentityRef {
            enterprise_id: inner
                .current
                .as_ref()
                .and_then(|u| u.enterprise_id.clone()),
            zyp_id: inner.current.as_ref().map(|u| u.zyp_id.clone()),
        }
    }
}
