// Configuration: remote endpoints, the fixed constants of the DoDo /
// Bilibili integration, and the command-line flags of the binary.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::sign::ApiKey;

/// Command-line flags. Every flag has a sensible default so the tool can
/// be started by double-click / plain invocation.
#[derive(Parser, Debug)]
#[command(name = "dodo-link", version, about = "Upload a file to DoDo and get a direct link")]
pub struct Cli {
    /// Where the login credential is kept between runs.
    #[arg(long, env = "DODO_LINK_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Store the credential file as plain JSON instead of encrypting it.
    #[arg(long)]
    pub plain_credentials: bool,

    /// Delay between two QR status polls, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Give up on the QR login after this many polls.
    #[arg(long, default_value_t = 180)]
    pub max_polls: u32,

    /// Log every protocol step to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Credential file path, falling back to `~/.dodo_link.json`.
    pub fn credentials_path(&self) -> PathBuf {
        self.credentials.clone().unwrap_or_else(|| {
            let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            dir.join(".dodo_link.json")
        })
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_polls,
        }
    }
}

/// How the caller drives the QR status poll loop.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        PollPolicy {
            interval: Duration::from_secs(1),
            max_attempts: 180,
        }
    }
}

/// Every URL the tool talks to.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub qr_create: String,
    pub qr_poll: String,
    pub authorize: String,
    pub user_info: String,
    pub history: String,
    pub upload_sign: String,
    pub record: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            qr_create: "https://passport.bilibili.com/qrcode/getLoginUrl".into(),
            qr_poll: "https://passport.bilibili.com/qrcode/authorize/poll".into(),
            authorize: "https://api.bilibili.com/x/account-oauth2/v1/authorize".into(),
            user_info: "https://apis.imdodo.com/web/login/fetch-bilibili-user-info".into(),
            history: "https://apis.imdodo.com/api/oss/file/history".into(),
            upload_sign: "https://apis.imdodo.com/api/oss/fetchUploadSign".into(),
            record: "https://apis.imdodo.com/api/oss/file/record".into(),
        }
    }
}

/// Endpoints plus the constants the DoDo web client sends with every call.
#[derive(Debug, Clone)]
pub struct Config {
    pub endpoints: Endpoints,
    /// OAuth client id DoDo registered with Bilibili.
    pub client_id: String,
    /// Callback URL registered together with `client_id`.
    pub return_url: String,
    pub scopes: String,
    pub client_type: String,
    pub client_version: String,
    pub bucket: String,
    pub upload_dir: String,
    /// Public prefix of every uploaded object; the object name is `<md5><ext>`.
    pub resource_base_url: String,
    /// Value of the `resourceType` field when recording an upload.
    pub resource_type: String,
    pub api_keys: Vec<ApiKey>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoints: Endpoints::default(),
            client_id: "0c95e37758534eb7".into(),
            return_url: "https://www.imdodo.com/thirdLogin/biliLogin".into(),
            scopes: "NFT_BASE,LIVER_BASE,FANS_BASE,USER_INFO".into(),
            client_type: "3".into(),
            client_version: "0.14.2".into(),
            bucket: "oss-dodo-upload".into(),
            upload_dir: "dodo/".into(),
            resource_base_url: "https://files.imdodo.com/dodo/".into(),
            resource_type: "5".into(),
            api_keys: vec![
                ApiKey::new("CK18tnKeKDN", "t8yqYCqv68rKOwgPRUBv4Z2hS4kKajHc0yYzrXLf"),
                ApiKey::new("CGrmRus4Xl4", "BrxswEvSCZK0fTvN5rGyQNqqZAL7vjzZHjDfOXXZ"),
                ApiKey::new("9mEnDRJrkl6", "0ZFDcgZX9iigWbbzmHmqcMFFpZFZcrOu91TsRVCU"),
            ],
        }
    }
}

impl Config {
    /// Deterministic public URL of an object: base + digest + extension.
    pub fn resource_url(&self, content_hash: &str, extension: &str) -> String {
        format!("{}{}{}", self.resource_base_url, content_hash, extension)
    }
}
