//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use dodo_link::config::{Config, Endpoints};
use dodo_link::sign::ApiKey;
use dodo_link::transport::{HttpRequest, HttpResponse, Transport};
use dodo_link::{Error, Result};

pub const STORAGE_HOST: &str = "http://storage.test/";

/// Answers each URL with queued bodies (the last one repeats) and keeps
/// every request it saw.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: RefCell<HashMap<String, VecDeque<String>>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, url: &str, body: &str) -> Self {
        self.routes
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push_back(body.to_string());
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn calls_to(&self, url: &str) -> Vec<HttpRequest> {
        self.requests
            .borrow()
            .iter()
            .filter(|r| r.url == url)
            .cloned()
            .collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|r| r.url.clone()).collect()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        self.requests.borrow_mut().push(request);
        let mut routes = self.routes.borrow_mut();
        let queue = routes
            .get_mut(&url)
            .ok_or_else(|| Error::Transport(format!("connection refused: {url}")))?;
        let body = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(HttpResponse { status: 200, body })
    }
}

pub fn endpoints() -> Endpoints {
    Endpoints {
        qr_create: "http://bili.test/qrcode/getLoginUrl".into(),
        qr_poll: "http://bili.test/qrcode/authorize/poll".into(),
        authorize: "http://bili.test/oauth2/authorize".into(),
        user_info: "http://dodo.test/web/login/fetch-bilibili-user-info".into(),
        history: "http://dodo.test/api/oss/file/history".into(),
        upload_sign: "http://dodo.test/api/oss/fetchUploadSign".into(),
        record: "http://dodo.test/api/oss/file/record".into(),
    }
}

/// Production constants with test endpoints and a single known key.
pub fn test_config() -> Config {
    Config {
        endpoints: endpoints(),
        api_keys: vec![ApiKey::new("test-key", "test-secret")],
        ..Config::default()
    }
}

pub fn upload_sign_body() -> String {
    format!(
        r#"{{"status":0,"message":"","data":{{"OSSAccessKeyId":"LTAI","policy":"cG9saWN5","signature":"c2ln","dir":"dodo/","host":"{STORAGE_HOST}","expire":1700000000}}}}"#
    )
}
