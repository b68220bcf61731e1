// Credential exchange: QR one-time token -> Bilibili authorization code ->
// DoDo access token + user id.

use serde::Deserialize;
use tracing::{info, warn};

use crate::api::{ApiClient, BiliEnvelope, DodoEnvelope};
use crate::config::PollPolicy;
use crate::error::{Error, Result};
use crate::qr_login::{wait_for_confirmation, LoginSession, SessionStatus};
use crate::sign::{form, Canonical};
use crate::transport::{HttpRequest, Transport};

/// DoDo access token bound to a user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub user_id: String,
}

/// Result of trading the one-time token at Bilibili's OAuth endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    #[serde(default)]
    pub redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    token: String,
    user: UserRef,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    uid: serde_json::Value,
}

/// The API sends uid as a number; accept a string too.
fn uid_to_string(uid: &serde_json::Value) -> Result<String> {
    match uid {
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::String(s) if !s.is_empty() => Ok(s.clone()),
        other => Err(Error::Protocol(format!("unexpected uid {other}"))),
    }
}

/// Digest used to probe a credential; it never names a real upload.
const PROBE_HASH: &str = "00000000000000000000000000000000";

impl<T: Transport> ApiClient<T> {
    /// Trade the confirmed session's one-time token for an authorization code.
    pub fn exchange_code(&self, tmp_token: &str) -> Result<AuthorizationCode> {
        let config = self.config();
        let fields = form(&[
            ("client_id", config.client_id.as_str()),
            ("tmp_token", tmp_token),
            ("scopes", config.scopes.as_str()),
            ("state", "1"),
            ("return_url", config.return_url.as_str()),
        ]);
        let request = HttpRequest::post_form(&config.endpoints.authorize, fields);
        let env: BiliEnvelope<AuthorizationCode> = self.call_json("exchange code", request)?;
        if env.code != 0 {
            return Err(Error::Auth(env.message));
        }
        env.data
            .ok_or_else(|| Error::Protocol("exchange code: response has no data".into()))
    }

    /// Trade an authorization code for the DoDo credential.
    pub fn fetch_credential(&self, code: &AuthorizationCode) -> Result<Credential> {
        let fields = self.signer().signed_form(Canonical::SortedEncoded, |apikey| {
            form(&[("code", code.code.as_str()), ("apikey", apikey)])
        })?;
        let request = HttpRequest::post_form(&self.config().endpoints.user_info, fields);
        let env: DodoEnvelope<UserInfo> = self.call_json("fetch credential", request)?;
        let info = env.into_data(Error::Auth)?;
        let credential = Credential {
            access_token: info.token,
            user_id: uid_to_string(&info.user.uid)?,
        };
        info!(uid = %credential.user_id, "logged in");
        Ok(credential)
    }

    /// Whether the server still accepts `credential`. Network failures are
    /// errors; a rejection is `Ok(false)`.
    pub fn check_credential(&self, credential: &Credential) -> Result<bool> {
        let env = self.history_lookup(PROBE_HASH, credential)?;
        if env.status != 0 {
            warn!(message = %env.message, "stored credential rejected");
        }
        Ok(env.status == 0)
    }

    /// Confirmed session token straight through both exchanges. Nothing is
    /// returned unless both succeed.
    pub fn complete_login(&self, tmp_token: &str) -> Result<Credential> {
        let code = self.exchange_code(tmp_token)?;
        self.fetch_credential(&code)
    }

    /// Full QR login for an already created session.
    pub fn login<F>(&self, session: &LoginSession, policy: PollPolicy, on_status: F) -> Result<Credential>
    where
        F: FnMut(&SessionStatus),
    {
        let tmp_token = wait_for_confirmation(self, session, policy, on_status)?;
        self.complete_login(&tmp_token)
    }
}
