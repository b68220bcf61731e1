//! The real reqwest transport against a local mock server: exact form
//! bytes, headers and the shape of the multipart upload.

use std::io::Write;

use mockito::{Matcher, Server};

use dodo_link::auth::AuthorizationCode;
use dodo_link::config::{Config, Endpoints};
use dodo_link::sign::{encode_form, form, sign, ApiKey};
use dodo_link::transport::HttpTransport;
use dodo_link::upload::{UploadAuthorization, UploadTask};
use dodo_link::{ApiClient, Credential};

fn config_for(base: &str) -> Config {
    Config {
        endpoints: Endpoints {
            qr_create: format!("{base}/qrcode/getLoginUrl"),
            qr_poll: format!("{base}/qrcode/authorize/poll"),
            authorize: format!("{base}/oauth2/authorize"),
            user_info: format!("{base}/web/login/fetch-bilibili-user-info"),
            history: format!("{base}/api/oss/file/history"),
            upload_sign: format!("{base}/api/oss/fetchUploadSign"),
            record: format!("{base}/api/oss/file/record"),
        },
        api_keys: vec![ApiKey::new("test-key", "test-secret")],
        ..Config::default()
    }
}

fn client(server: &Server) -> ApiClient {
    ApiClient::with_transport(HttpTransport::new().unwrap(), config_for(&server.url())).unwrap()
}

fn file_with(bytes: &[u8], suffix: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    f.write_all(bytes).unwrap();
    f.flush().unwrap();
    f
}

#[test]
fn session_is_created_with_a_plain_get() {
    let mut server = Server::new();
    let mock = server
        .mock("GET", "/qrcode/getLoginUrl")
        .with_body(r#"{"code":0,"status":true,"data":{"url":"https://passport.bilibili.com/qrcode/h5/login?oauthKey=k1","oauthKey":"k1"}}"#)
        .create();

    let session = client(&server).create_session().unwrap();

    mock.assert();
    assert_eq!(session.oauth_key, "k1");
}

#[test]
fn signed_form_goes_out_byte_for_byte() {
    let mut server = Server::new();
    let mut fields = form(&[("apikey", "test-key"), ("code", "a~b*c d")]);
    let sig = sign("test-secret", &encode_form(&fields)).unwrap();
    fields.push(("sig".to_string(), sig));
    let expected = encode_form(&fields);
    assert!(expected.starts_with("apikey=test-key&code=a~b%2Ac+d&sig="));

    let mock = server
        .mock("POST", "/web/login/fetch-bilibili-user-info")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::Exact(expected))
        .with_body(r#"{"status":0,"message":"","data":{"token":"dodo-token","user":{"uid":4242}}}"#)
        .create();

    let code = AuthorizationCode {
        code: "a~b*c d".into(),
        redirect_url: String::new(),
    };
    let credential = client(&server).fetch_credential(&code).unwrap();

    mock.assert();
    assert_eq!(credential.access_token, "dodo-token");
    assert_eq!(credential.user_id, "4242");
}

#[test]
fn record_sends_token_header_and_raw_signed_form() {
    let mut server = Server::new();
    let file = file_with(b"hello", ".txt");
    let task = UploadTask::new(file.path()).unwrap();
    let pattern = format!(
        r"^MD5Str={}&apikey=test-key&clientType=3&clientVersion=0\.14\.2&fileName=[^&]+&fileSize=5&resourceType=5&resourceUrl=https%3A%2F%2Ffiles\.imdodo\.com%2Fdodo%2F{}\.txt&timestamp=\d+&token=tok&uid=42&sig=[^&]+$",
        task.content_hash, task.content_hash
    );
    let mock = server
        .mock("POST", "/api/oss/file/record")
        .match_header("token", "tok")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::Regex(pattern))
        .with_body(r#"{"status":0,"message":"","data":null}"#)
        .create();

    let credential = Credential {
        access_token: "tok".into(),
        user_id: "42".into(),
    };
    let url = client(&server).record(&task, &credential).unwrap();

    mock.assert();
    assert_eq!(url, format!("https://files.imdodo.com/dodo/{}.txt", task.content_hash));
}

#[test]
fn transfer_sends_sized_multipart_body() {
    let mut server = Server::new();
    let file = file_with(b"multipart payload bytes", ".jpg");
    let task = UploadTask::new(file.path()).unwrap();
    let mock = server
        .mock("POST", "/bucket")
        .match_header("content-type", Matcher::Regex("^multipart/form-data; boundary=".into()))
        .match_header("content-length", Matcher::Regex(r"^\d+$".into()))
        .match_header("transfer-encoding", Matcher::Missing)
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex(format!(r#"name="key"\r\n\r\ndodo/{}\.jpg\r\n"#, task.content_hash)),
            Matcher::Regex(r#"name="file"; filename="[^"]+\.jpg""#.into()),
            Matcher::Regex("multipart payload bytes".into()),
        ]))
        .with_status(204)
        .create();

    let authorization = UploadAuthorization {
        access_key_id: "LTAI".into(),
        policy: "cG9saWN5".into(),
        signature: "c2ln".into(),
        dir: "dodo/".into(),
        host: format!("{}/bucket", server.url()),
        expire: 1700000000,
    };
    client(&server).transfer(&authorization, &task).unwrap();

    mock.assert();
}

#[test]
fn storage_rejection_over_http_is_reported() {
    let mut server = Server::new();
    let file = file_with(b"rejected", ".zip");
    let task = UploadTask::new(file.path()).unwrap();
    let _mock = server
        .mock("POST", "/bucket")
        .with_status(403)
        .with_body("<Error><Code>AccessDenied</Code><Message>Policy expired.</Message></Error>")
        .create();

    let authorization = UploadAuthorization {
        access_key_id: "LTAI".into(),
        policy: "p".into(),
        signature: "s".into(),
        dir: "dodo/".into(),
        host: format!("{}/bucket", server.url()),
        expire: 0,
    };
    match client(&server).transfer(&authorization, &task) {
        Err(dodo_link::Error::Storage(message)) => assert_eq!(message, "Policy expired."),
        other => panic!("unexpected {other:?}"),
    }
}
