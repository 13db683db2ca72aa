// src/core/net.rs
//
// Blocking HTTP client shared by the registry sessions.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::config::options::SessionOptions;
use crate::error::SessionError;

/// Cookie-keeping client with the session's user agent and timeout.
pub fn client(opts: &SessionOptions) -> Result<Client, SessionError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("ko-KR,ko;q=0.9,en;q=0.8"),
    );
    let client = Client::builder()
        .user_agent(opts.user_agent.as_str())
        .default_headers(headers)
        .cookie_store(true)
        .timeout(Duration::from_millis(opts.request_timeout_ms))
        .build()?;
    Ok(client)
}

/// Body text of a successful response; any non-2xx status is an error.
pub fn read_body(resp: Response) -> Result<(String, String), SessionError> {
    let status = resp.status();
    let url = resp.url().to_string();
    if !status.is_success() {
        return Err(SessionError::Status { status: status.as_u16(), url });
    }
    let body = resp.text()?;
    Ok((url, body))
}
