// Bilibili QR-code login session.
//
// A session is created once, its URL is rendered as a QR code, and the
// session is polled until the user confirms on their phone. Each call
// here is exactly one round trip; the waiting loop lives in
// `wait_for_confirmation` so the caller controls interval and bound.

use serde::Deserialize;
use std::thread;
use tracing::{debug, info};

use crate::api::{ApiClient, BiliEnvelope};
use crate::config::PollPolicy;
use crate::error::{Error, Result};
use crate::sign::form;
use crate::transport::{HttpRequest, Transport};

/// A freshly created QR login session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginSession {
    /// Encode this in the QR code.
    pub url: String,
    /// Handle for polling.
    #[serde(rename = "oauthKey")]
    pub oauth_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    AwaitingScan,
    ScannedUnconfirmed,
    /// Carries the one-time token to exchange for an authorization code.
    Confirmed { tmp_token: String },
    Expired,
}

impl SessionStatus {
    pub fn describe(&self) -> &'static str {
        match self {
            SessionStatus::AwaitingScan => "waiting for scan",
            SessionStatus::ScannedUnconfirmed => "scanned, waiting for confirmation",
            SessionStatus::Confirmed { .. } => "confirmed",
            SessionStatus::Expired => "QR code expired",
        }
    }
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    code: i64,
    // `data` is an object on success and a bare number otherwise
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ConfirmedData {
    tmp_token: String,
}

impl<T: Transport> ApiClient<T> {
    /// Start a new QR login.
    pub fn create_session(&self) -> Result<LoginSession> {
        let url = &self.config().endpoints.qr_create;
        let env: BiliEnvelope<LoginSession> =
            self.call_json("create session", HttpRequest::get(url))?;
        if env.code != 0 {
            return Err(Error::Protocol(env.message));
        }
        let session = env
            .data
            .ok_or_else(|| Error::Protocol("create session: response has no data".into()))?;
        info!("QR login session created");
        Ok(session)
    }

    /// Poll the session once. An expired session is an error: it cannot be
    /// revived and the caller has to create a new one.
    pub fn poll_status(&self, oauth_key: &str) -> Result<SessionStatus> {
        let url = &self.config().endpoints.qr_poll;
        let fields = form(&[("oauthKey", oauth_key), ("source", "oauth2")]);
        let res: PollResponse = self.call_json("poll session", HttpRequest::post_form(url, fields))?;
        let status = match res.code {
            -3 => SessionStatus::AwaitingScan,
            -5 => SessionStatus::ScannedUnconfirmed,
            -2 => SessionStatus::Expired,
            0 => {
                let data: ConfirmedData = serde_json::from_value(res.data)
                    .map_err(|e| Error::Protocol(format!("poll session: {e}")))?;
                SessionStatus::Confirmed {
                    tmp_token: data.tmp_token,
                }
            }
            other => {
                return Err(Error::Protocol(format!("unknown QR status code {other}")));
            }
        };
        debug!(status = status.describe(), "QR session polled");
        if status == SessionStatus::Expired {
            return Err(Error::Protocol(status.describe().into()));
        }
        Ok(status)
    }
}

/// Poll until the session is confirmed, sleeping `policy.interval` between
/// polls. `on_status` sees every non-terminal status (for progress output).
/// Fails with [`Error::LoginTimeout`] once `policy.max_attempts` polls
/// went by without confirmation.
pub fn wait_for_confirmation<T, F>(
    client: &ApiClient<T>,
    session: &LoginSession,
    policy: PollPolicy,
    mut on_status: F,
) -> Result<String>
where
    T: Transport,
    F: FnMut(&SessionStatus),
{
    for attempt in 1..=policy.max_attempts {
        match client.poll_status(&session.oauth_key)? {
            SessionStatus::Confirmed { tmp_token } => return Ok(tmp_token),
            status => on_status(&status),
        }
        if attempt < policy.max_attempts {
            thread::sleep(policy.interval);
        }
    }
    Err(Error::LoginTimeout {
        attempts: policy.max_attempts,
    })
}
