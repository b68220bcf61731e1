// API client: owns the transport, the integration constants and the
// signer. Login, credential and upload calls are implemented in their own
// modules as further `impl ApiClient` blocks.
//
// Responses are decoded into one typed envelope per service: Bilibili
// answers `{code, message, data}`, DoDo answers `{status, message, data}`.
// The `data` payload is typed per endpoint.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::sign::{KeySelector, Signer};
use crate::transport::{HttpRequest, HttpTransport, Transport};

/// Envelope used by the Bilibili passport / OAuth endpoints.
#[derive(Debug, Deserialize)]
pub struct BiliEnvelope<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// Envelope used by the DoDo API.
#[derive(Debug, Deserialize)]
pub struct DodoEnvelope<T> {
    pub status: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> DodoEnvelope<T> {
    /// `data` of a successful answer; `reject` builds the error for a
    /// non-zero status from the server message.
    pub fn into_data(self, reject: impl FnOnce(String) -> Error) -> Result<T> {
        if self.status != 0 {
            return Err(reject(self.message));
        }
        self.data
            .ok_or_else(|| Error::Protocol("response has no data".into()))
    }

    pub fn check(self, reject: impl FnOnce(String) -> Error) -> Result<()> {
        if self.status != 0 {
            return Err(reject(self.message));
        }
        Ok(())
    }
}

/// Decode a JSON body, reporting which call produced it on failure.
pub fn decode<T: DeserializeOwned>(call: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| Error::Protocol(format!("{call}: {e}")))
}

/// Client for the Bilibili login and DoDo upload APIs.
pub struct ApiClient<T: Transport = HttpTransport> {
    transport: T,
    config: Config,
    signer: Signer,
}

impl ApiClient<HttpTransport> {
    /// Production client with the default configuration.
    pub fn new() -> Result<Self> {
        ApiClient::with_transport(HttpTransport::new()?, Config::default())
    }
}

impl<T: Transport> ApiClient<T> {
    /// Fails if `config` carries no API keys.
    pub fn with_transport(transport: T, config: Config) -> Result<Self> {
        let signer = Signer::new(KeySelector::new(config.api_keys.clone())?);
        Ok(ApiClient {
            transport,
            config,
            signer,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn signer(&self) -> &Signer {
        &self.signer
    }

    /// Send `request` and return the body text. HTTP status codes are not
    /// interpreted; both services report failures inside the envelope.
    pub(crate) fn call(&self, call: &str, request: HttpRequest) -> Result<String> {
        debug!(call, "calling endpoint");
        let response = self.transport.send(request)?;
        debug!(call, status = response.status, "endpoint answered");
        Ok(response.body)
    }

    pub(crate) fn call_json<R: DeserializeOwned>(&self, call: &str, request: HttpRequest) -> Result<R> {
        let body = self.call(call, request)?;
        decode(call, &body)
    }
}
