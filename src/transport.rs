// HTTP transport seam. The protocol code only needs "send this request,
// give me status and body"; `HttpTransport` does that with a blocking
// reqwest client and tests plug in a scripted fake.

use reqwest::blocking::{multipart, Client};
use reqwest::header::CONTENT_TYPE;
use std::fs::File;
use std::path::PathBuf;
use tracing::debug;

use crate::error::Result;
use crate::sign::{encode_form, FormFields};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// File sent as the last part of a multipart body. The file is opened
/// only when the request is sent and closed when the request completes.
/// `size` is announced up front so the body goes out with a
/// `Content-Length` instead of chunked encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Empty,
    /// Sent URL-encoded in exactly the order given.
    Form(FormFields),
    Multipart { fields: FormFields, file: FilePart },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Body,
}

impl HttpRequest {
    pub fn get(url: &str) -> Self {
        HttpRequest {
            method: Method::Get,
            url: url.to_string(),
            headers: Vec::new(),
            body: Body::Empty,
        }
    }

    pub fn post_form(url: &str, fields: FormFields) -> Self {
        HttpRequest {
            method: Method::Post,
            url: url.to_string(),
            headers: Vec::new(),
            body: Body::Form(fields),
        }
    }

    pub fn post_multipart(url: &str, fields: FormFields, file: FilePart) -> Self {
        HttpRequest {
            method: Method::Post,
            url: url.to_string(),
            headers: Vec::new(),
            body: Body::Multipart { fields, file },
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Value of a form or multipart field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        let fields = match &self.body {
            Body::Form(fields) => fields,
            Body::Multipart { fields, .. } => fields,
            Body::Empty => return None,
        };
        fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// One request, one response. Implementations must not retry.
pub trait Transport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).send(request)
    }
}

/// Blocking reqwest client. System proxy settings are honoured and no
/// timeout is imposed beyond reqwest's defaults.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(HttpTransport { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = ?request.method, url = %request.url, "sending request");
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            Body::Empty => builder,
            Body::Form(fields) => builder
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(encode_form(&fields)),
            Body::Multipart { fields, file } => {
                let mut form = multipart::Form::new();
                for (name, value) in fields {
                    form = form.text(name, value);
                }
                let handle = File::open(&file.path)?;
                let part = multipart::Part::reader_with_length(handle, file.size).file_name(file.file_name);
                builder.multipart(form.part(file.field, part))
            }
        };
        let response = builder.send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        debug!(status, bytes = body.len(), "response received");
        Ok(HttpResponse { status, body })
    }
}
