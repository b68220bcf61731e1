// UI layer: login on start-up, then an endless "path in, link out" prompt.
// Everything here is synchronous; one upload runs at a time.

use anyhow::{Context, Result};
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::api::ApiClient;
use crate::auth::Credential;
use crate::config::{Cli, PollPolicy};
use crate::error::Error;
use crate::qr;
use crate::store::CredentialStore;
use crate::transport::Transport;

/// Start-up and main loop. Returns only on a fatal start-up failure or
/// when the input stream ends.
pub fn run(cli: &Cli) -> Result<()> {
    println!("DoDo direct link tool");
    let api = ApiClient::new().context("Failed to build HTTP client")?;
    let store = CredentialStore::new(cli.credentials_path(), !cli.plain_credentials);
    let policy = cli.poll_policy();

    let credential = resolve_credential(&api, &store, || qr_login(&api, policy))?;
    upload_loop(&api, &credential);
    Ok(())
}

/// Reuse the stored credential when the server still accepts it,
/// otherwise run `login` and persist the result. A corrupt or stale file
/// simply leads to a fresh login.
pub fn resolve_credential<T, F>(api: &ApiClient<T>, store: &CredentialStore, login: F) -> Result<Credential>
where
    T: Transport,
    F: FnOnce() -> Result<Credential>,
{
    if let Some(credential) = store.load() {
        match api.check_credential(&credential) {
            Ok(true) => {
                info!("reusing stored credential");
                return Ok(credential);
            }
            Ok(false) => println!("{}", "Saved login has expired, please log in again.".yellow()),
            Err(e) => println!("{} {}", "Could not verify saved login:".yellow(), e),
        }
    }
    let credential = login()?;
    store
        .save(&credential)
        .with_context(|| format!("Failed to save credential to {}", store.path().display()))?;
    Ok(credential)
}

/// Show a QR code and wait for the user to confirm it in the Bilibili app.
/// An expired or unconfirmed code can be replaced by a new one.
fn qr_login<T: Transport>(api: &ApiClient<T>, policy: PollPolicy) -> Result<Credential> {
    loop {
        let session = api.create_session().context("Failed to create QR login session")?;
        println!("{}", qr::render_terminal(&session.url)?);
        println!("Scan the code with the Bilibili app and confirm the login.");

        let spinner = spinner("waiting for scan");
        let result = api.login(&session, policy, |status| {
            spinner.set_message(status.describe());
        });
        spinner.finish_and_clear();

        match result {
            Ok(credential) => {
                println!("{}", "Logged in.".green());
                return Ok(credential);
            }
            Err(e @ Error::LoginTimeout { .. }) | Err(e @ Error::Protocol(_)) => {
                println!("{} {}", "Login failed:".red(), e);
                let again = Confirm::new()
                    .with_prompt("Show a new QR code?")
                    .default(true)
                    .interact()?;
                if !again {
                    anyhow::bail!("login aborted");
                }
            }
            Err(e) => return Err(e).context("Login failed"),
        }
    }
}

/// Prompt for paths until input ends. Errors are reported per file.
fn upload_loop<T: Transport>(api: &ApiClient<T>, credential: &Credential) {
    loop {
        println!("\n{}\n", "-".repeat(40));
        let input = match Input::<String>::new()
            .with_prompt("File path (or drag a file here)")
            .interact_text()
        {
            Ok(input) => input,
            // EOF or interrupt
            Err(_) => break,
        };
        let path = trim_path_input(&input);
        if path.as_os_str().is_empty() {
            continue;
        }

        let spinner = spinner("Uploading...");
        let result = api.upload(path, credential);
        spinner.finish_and_clear();

        match result {
            Ok(outcome) if outcome.reused => {
                println!("{} {} {}", "Done:".green(), outcome.resource_url, "(already stored)".dark_grey())
            }
            Ok(outcome) => println!("{} {}", "Done:".green(), outcome.resource_url),
            Err(e) => println!("{} {}", "Error:".red(), e),
        }
    }
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Clean up a path typed or dropped into the terminal: surrounding
/// whitespace, quotes and `&` (PowerShell drag and drop) go, and a
/// `file://` URI becomes a plain path.
pub fn trim_path_input(input: &str) -> PathBuf {
    let trimmed = input.trim_matches(|c: char| c.is_whitespace() || matches!(c, '&' | '\'' | '"'));
    if trimmed.starts_with("file://") {
        if let Some(path) = url::Url::parse(trimmed)
            .ok()
            .and_then(|u| u.to_file_path().ok())
        {
            return path;
        }
        return PathBuf::from(trimmed.trim_start_matches("file://"));
    }
    PathBuf::from(trimmed)
}
