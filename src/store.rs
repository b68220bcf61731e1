// Credential persistence. The credential is a small JSON file
// `{"token": .., "uid": ..}`; by default each value is sealed with
// AES-256-GCM under a fixed local key and stored as hex(nonce ++ ciphertext).
// Anything that cannot be read back is treated as "no credential".

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::auth::Credential;
use crate::error::{Error, Result};

const LOCAL_KEY: &[u8; 32] = b"0E00894B1D18FFB84E1D2E0DBA5611BB";
const NONCE_LEN: usize = 12;

#[derive(Serialize, Deserialize)]
struct StoredCredential {
    token: String,
    uid: String,
}

fn cipher() -> Aes256Gcm {
    Aes256Gcm::new(LOCAL_KEY.into())
}

/// Seal `plaintext`; output is hex(nonce) followed by hex(ciphertext).
pub fn seal(plaintext: &str) -> Result<String> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher()
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| Error::Store("encryption failed".into()))?;
    Ok(format!("{}{}", hex::encode(nonce), hex::encode(ciphertext)))
}

/// Inverse of [`seal`]. `None` for malformed hex, short input, or a tag
/// mismatch.
pub fn open(sealed: &str) -> Option<String> {
    let bytes = hex::decode(sealed).ok()?;
    if bytes.len() < NONCE_LEN {
        return None;
    }
    let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
    let plaintext = cipher()
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .ok()?;
    String::from_utf8(plaintext).ok()
}

/// Reads and writes the credential file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    encrypted: bool,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>, encrypted: bool) -> Self {
        CredentialStore {
            path: path.into(),
            encrypted,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored credential, if there is a readable one.
    pub fn load(&self) -> Option<Credential> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read credential file");
                return None;
            }
        };
        let stored: StoredCredential = match serde_json::from_str(&data) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "credential file is corrupt");
                return None;
            }
        };
        let credential = if self.encrypted {
            Credential {
                access_token: open(&stored.token)?,
                user_id: open(&stored.uid)?,
            }
        } else {
            Credential {
                access_token: stored.token,
                user_id: stored.uid,
            }
        };
        if credential.access_token.is_empty() || credential.user_id.is_empty() {
            return None;
        }
        debug!(path = %self.path.display(), "credential loaded");
        Some(credential)
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        let stored = if self.encrypted {
            StoredCredential {
                token: seal(&credential.access_token)?,
                uid: seal(&credential.user_id)?,
            }
        } else {
            StoredCredential {
                token: credential.access_token.clone(),
                uid: credential.user_id.clone(),
            }
        };
        let data = serde_json::to_string(&stored).map_err(|e| Error::Store(e.to_string()))?;
        std::fs::write(&self.path, data)
            .map_err(|e| Error::Store(format!("{}: {e}", self.path.display())))?;
        debug!(path = %self.path.display(), "credential saved");
        Ok(())
    }
}
