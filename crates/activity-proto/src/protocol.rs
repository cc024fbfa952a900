//! Wire contract of the activity endpoint.
//!
//! Request:  `GET /api/me?type=html[&username=<name>]`
//! Success:  2xx, body is an HTML fragment (see [`crate::fragment`]).
//! Failure:  non-2xx, body is `{ "error": "<message>" }`.

use serde::{Deserialize, Serialize};

/// Header the page script sends so the server answers with a bare fragment.
pub const XHR_HEADER: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");

/// Query string of one activity request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityQuery {
    pub username: Option<String>,
}

impl ActivityQuery {
    pub fn new(username: Option<String>) -> Self {
        // An empty attribute on the page means "no viewed user"
        Self {
            username: username.filter(|u| !u.trim().is_empty()),
        }
    }

    /// Key/value pairs in wire order. Values are not encoded here; the HTTP
    /// client percent-encodes them.
    pub fn pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![("type", "html")];
        if let Some(user) = &self.username {
            pairs.push(("username", user.as_str()));
        }
        pairs
    }
}

/// Raw answer of the endpoint, before interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityResponse {
    pub status: u16,
    /// Canonical reason phrase for `status`, when known.
    pub reason: Option<String>,
    pub body: String,
}

impl ActivityResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Human-readable message for a failed response.
    ///
    /// Uses the `error` field of the JSON body; falls back to the reason
    /// phrase, then to the bare status code.
    pub fn error_message(&self) -> String {
        if let Ok(body) = serde_json::from_str::<ApiErrorBody>(&self.body) {
            let msg = body.error.trim();
            if !msg.is_empty() {
                return msg.to_string();
            }
        }
        match self.reason.as_deref() {
            Some(reason) if !reason.is_empty() => reason.to_string(),
            _ => format!("HTTP {}", self.status),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}
