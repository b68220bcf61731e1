// Content-addressed upload to DoDo's object storage.
//
// Objects are named by the MD5 of their bytes plus the original
// extension, so the public URL of a file is known before anything is
// sent. An upload is:
//
// 1. hash the file (`UploadTask::new`)
// 2. ask the metadata service whether that digest was uploaded before
// 3. if not, fetch a short-lived storage authorization and POST the bytes
//    straight to the storage host
// 4. record the upload with the metadata service (also after a history
//    hit, which refreshes the record)

use regex::Regex;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::api::{ApiClient, DodoEnvelope};
use crate::auth::Credential;
use crate::error::{Error, Result};
use crate::sign::{form, Canonical};
use crate::transport::{FilePart, HttpRequest, Transport};

const HASH_BUF_SIZE: usize = 64 * 1024;

/// Lowercase hex MD5 of the file, read in chunks.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut ctx = md5::Context::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        ctx.consume(&buf[..n]);
    }
    Ok(format!("{:x}", ctx.compute()))
}

/// `.ext` of the file name as written (case preserved), or empty.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

/// One file on its way to storage. Immutable once hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTask {
    pub path: PathBuf,
    pub content_hash: String,
    pub file_name: String,
    pub extension: String,
    pub size: u64,
}

impl UploadTask {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let meta = std::fs::metadata(&path)?;
        if !meta.is_file() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            )));
        }
        let content_hash = hash_file(&path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = extension_of(&path);
        debug!(hash = %content_hash, size = meta.len(), "file hashed");
        Ok(UploadTask {
            path,
            content_hash,
            file_name,
            extension,
            size: meta.len(),
        })
    }

    /// Object name under the storage prefix.
    pub fn object_name(&self) -> String {
        format!("{}{}", self.content_hash, self.extension)
    }
}

/// Answer of the history lookup for a digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UploadHistoryRecord {
    #[serde(rename = "hasRecord", default)]
    pub exists: bool,
    #[serde(rename = "resourceUrl", default)]
    pub resource_url: String,
}

/// Single-use storage credentials for one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadAuthorization {
    #[serde(rename = "OSSAccessKeyId")]
    pub access_key_id: String,
    pub policy: String,
    pub signature: String,
    #[serde(default)]
    pub dir: String,
    pub host: String,
    pub expire: i64,
}

impl UploadAuthorization {
    /// `<dir>/<md5><ext>`; `default_dir` applies when the server sent none.
    pub fn storage_key(&self, task: &UploadTask, default_dir: &str) -> String {
        let dir = if self.dir.is_empty() { default_dir } else { self.dir.as_str() };
        let dir = dir.trim_end_matches('/');
        if dir.is_empty() {
            task.object_name()
        } else {
            format!("{}/{}", dir, task.object_name())
        }
    }
}

/// Extract the message from an error document returned by the storage
/// host. `None` when the body is not an error; an empty message when the
/// error carries no `<Message>` element.
pub fn parse_storage_error(body: &str) -> Option<String> {
    if !body.contains("<Error>") {
        return None;
    }
    let re = Regex::new(r"(?s)<Message>(.*?)</Message>").ok()?;
    let message = re
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some(message)
}

/// How an upload finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub resource_url: String,
    /// The bytes were already in storage and nothing was transferred.
    pub reused: bool,
}

impl<T: Transport> ApiClient<T> {
    pub(crate) fn history_lookup(
        &self,
        content_hash: &str,
        credential: &Credential,
    ) -> Result<DodoEnvelope<UploadHistoryRecord>> {
        let config = self.config();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let fields = self.signer().signed_form(Canonical::SortedEncoded, |apikey| {
            form(&[
                ("MD5Str", content_hash),
                ("apikey", apikey),
                ("clientType", config.client_type.as_str()),
                ("clientVersion", config.client_version.as_str()),
                ("timestamp", timestamp.as_str()),
                ("token", credential.access_token.as_str()),
                ("uid", credential.user_id.as_str()),
            ])
        })?;
        let request = HttpRequest::post_form(&config.endpoints.history, fields);
        self.call_json("history", request)
    }

    /// Has this digest been uploaded before?
    pub fn check_history(&self, content_hash: &str, credential: &Credential) -> Result<UploadHistoryRecord> {
        let record = self
            .history_lookup(content_hash, credential)?
            .into_data(Error::Record)?;
        debug!(hash = content_hash, exists = record.exists, "history checked");
        Ok(record)
    }

    /// Fresh storage credentials. Not signed; the server scopes them by uid.
    pub fn fetch_upload_authorization(&self, user_id: &str) -> Result<UploadAuthorization> {
        let config = self.config();
        let fields = form(&[
            ("bucket", config.bucket.as_str()),
            ("dir", config.upload_dir.as_str()),
            ("uid", user_id),
        ]);
        let request = HttpRequest::post_form(&config.endpoints.upload_sign, fields);
        let env: DodoEnvelope<UploadAuthorization> = self.call_json("upload authorization", request)?;
        env.into_data(Error::Storage)
    }

    /// POST the file straight to the storage host.
    pub fn transfer(&self, authorization: &UploadAuthorization, task: &UploadTask) -> Result<()> {
        let key = authorization.storage_key(task, &self.config().upload_dir);
        let fields = form(&[
            ("OSSAccessKeyId", authorization.access_key_id.as_str()),
            ("policy", authorization.policy.as_str()),
            ("signature", authorization.signature.as_str()),
            ("dir", authorization.dir.as_str()),
            ("host", authorization.host.as_str()),
            ("expire", authorization.expire.to_string().as_str()),
            ("key", key.as_str()),
        ]);
        let file = FilePart {
            field: "file".into(),
            file_name: task.file_name.clone(),
            path: task.path.clone(),
            size: task.size,
        };
        let request = HttpRequest::post_multipart(&authorization.host, fields, file);
        let body = self.call("transfer", request)?;
        if let Some(message) = parse_storage_error(&body) {
            return Err(Error::Storage(message));
        }
        info!(key = %key, bytes = task.size, "file transferred");
        Ok(())
    }

    /// Register the object with the metadata service and return its URL.
    pub fn record(&self, task: &UploadTask, credential: &Credential) -> Result<String> {
        let config = self.config();
        let resource_url = config.resource_url(&task.content_hash, &task.extension);
        let timestamp = chrono::Utc::now().timestamp_millis().to_string();
        let size = task.size.to_string();
        let fields = self.signer().signed_form(Canonical::Raw, |apikey| {
            form(&[
                ("MD5Str", task.content_hash.as_str()),
                ("apikey", apikey),
                ("clientType", config.client_type.as_str()),
                ("clientVersion", config.client_version.as_str()),
                ("fileName", task.file_name.as_str()),
                ("fileSize", size.as_str()),
                ("resourceType", config.resource_type.as_str()),
                ("resourceUrl", resource_url.as_str()),
                ("timestamp", timestamp.as_str()),
                ("token", credential.access_token.as_str()),
                ("uid", credential.user_id.as_str()),
            ])
        })?;
        let request = HttpRequest::post_form(&config.endpoints.record, fields)
            .header("Token", &credential.access_token);
        let env: DodoEnvelope<serde_json::Value> = self.call_json("record", request)?;
        env.check(Error::Record)?;
        debug!(url = %resource_url, "upload recorded");
        Ok(resource_url)
    }

    /// hash -> history -> (authorization + transfer unless known) -> record.
    pub fn upload(&self, path: impl Into<PathBuf>, credential: &Credential) -> Result<UploadOutcome> {
        let task = UploadTask::new(path)?;
        let history = self.check_history(&task.content_hash, credential)?;
        if history.exists {
            info!(hash = %task.content_hash, "content already stored, skipping transfer");
        } else {
            let authorization = self.fetch_upload_authorization(&credential.user_id)?;
            self.transfer(&authorization, &task)?;
        }
        let resource_url = self.record(&task, credential)?;
        Ok(UploadOutcome {
            resource_url,
            reused: history.exists,
        })
    }
}
