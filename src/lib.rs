// Library root
// -----------
// Bilibili QR login plus content-addressed uploads to DoDo. The binary
// (`main.rs`) wires these modules into an interactive prompt.
//
// Module responsibilities:
// - `sign`: HMAC-SHA1 request signatures and the API key pool.
// - `transport`: the HTTP seam (`Transport`) and its reqwest implementation.
// - `api`: `ApiClient` and the typed response envelopes.
// - `qr_login` / `auth`: QR session polling and the credential exchange.
// - `upload`: hash, history lookup, transfer and record.
// - `store`: the credential file kept between runs.
// - `qr` / `ui`: terminal rendering and the prompt loop.
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod qr;
pub mod qr_login;
pub mod sign;
pub mod store;
pub mod transport;
pub mod ui;
pub mod upload;

pub use api::ApiClient;
pub use auth::Credential;
pub use error::{Error, Result};
