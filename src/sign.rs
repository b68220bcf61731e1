// Request signing for the DoDo API.
//
// Privileged calls carry an `apikey` field and a `sig` field. The
// signature is HMAC-SHA1 over a canonical string of the other form
// fields, keyed with the secret paired to `apikey`, base64 encoded.
// Which canonical string is used depends on the endpoint, see `Canonical`.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::Rng;
use sha1::Sha1;

use crate::error::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

/// Ordered form fields, as sent on the wire.
pub type FormFields = Vec<(String, String)>;

/// One (public key id, secret) pair from the API key pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    pub id: String,
    pub secret: String,
}

impl ApiKey {
    pub fn new(id: &str, secret: &str) -> Self {
        ApiKey {
            id: id.to_string(),
            secret: secret.to_string(),
        }
    }
}

/// Picks a key from a fixed pool. Any key is valid for any request, so a
/// fresh pick per call is fine.
#[derive(Debug, Clone)]
pub struct KeySelector {
    keys: Vec<ApiKey>,
}

impl KeySelector {
    /// Fails on an empty pool.
    pub fn new(keys: Vec<ApiKey>) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::Config("API key pool is empty".into()));
        }
        Ok(KeySelector { keys })
    }

    pub fn pick(&self) -> &ApiKey {
        self.pick_with(&mut rand::thread_rng())
    }

    pub fn pick_with<R: Rng + ?Sized>(&self, rng: &mut R) -> &ApiKey {
        &self.keys[rng.gen_range(0..self.keys.len())]
    }
}

/// HMAC-SHA1 of `payload` keyed with `secret`, standard base64.
pub fn sign(secret: &str, payload: &str) -> Result<String> {
    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .map_err(|e| Error::Config(format!("signing key: {e}")))?;
    mac.update(payload.as_bytes());
    Ok(B64.encode(mac.finalize().into_bytes()))
}

/// Everything except `A-Z a-z 0-9 - _ . ~` is escaped, matching the
/// query escaping the DoDo server verifies signatures against.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Query-escape one key or value: unreserved bytes kept, space as `+`,
/// the rest as uppercase `%XX`.
pub fn query_escape(input: &str) -> String {
    // a literal "%20" in the input comes out as "%2520", so only spaces match
    utf8_percent_encode(input, QUERY_VALUE)
        .to_string()
        .replace("%20", "+")
}

/// Form serialization of `fields`, in order.
pub fn encode_form(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", query_escape(k), query_escape(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// `k=v&k=v` without any escaping.
pub fn join_raw(fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// How the string that gets signed is derived from the form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Canonical {
    /// Fields sorted by key, URL-encoded (user info, history).
    SortedEncoded,
    /// Fields in the given order, no escaping (record).
    Raw,
}

impl Canonical {
    pub fn payload(self, fields: &mut FormFields) -> String {
        match self {
            Canonical::SortedEncoded => {
                fields.sort_by(|a, b| a.0.cmp(&b.0));
                encode_form(fields)
            }
            Canonical::Raw => join_raw(fields),
        }
    }
}

/// Adds `apikey` and `sig` to request forms.
#[derive(Debug, Clone)]
pub struct Signer {
    keys: KeySelector,
}

impl Signer {
    pub fn new(keys: KeySelector) -> Self {
        Signer { keys }
    }

    /// Picks a key, lets `build` produce the fields (it receives the key id
    /// so it can place `apikey` where the endpoint expects it), signs them
    /// and appends `sig`.
    pub fn signed_form<F>(&self, canonical: Canonical, build: F) -> Result<FormFields>
    where
        F: FnOnce(&str) -> FormFields,
    {
        let key = self.keys.pick();
        let mut fields = build(&key.id);
        let payload = canonical.payload(&mut fields);
        let sig = sign(&key.secret, &payload)?;
        fields.push(("sig".to_string(), sig));
        Ok(fields)
    }
}

/// Convenience for building `FormFields` from string slices.
pub fn form(pairs: &[(&str, &str)]) -> FormFields {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
