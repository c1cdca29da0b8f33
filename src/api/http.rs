// Blocking request plumbing shared by the relay and homeserver clients.
use crate::core::error::{Error, ErrorKind, error_kind_from_status};
use std::io::Read;
use std::time::Duration;

// Upper bound for any response body we buffer.
const MAX_BODY_LEN: u64 = 64 * 1024 * 1024;
const MAX_ERROR_TEXT_LEN: usize = 512;

pub(crate) fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(concat!("pubkycore/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub(crate) fn send(request: ureq::Request, body: Option<&[u8]>) -> Result<ureq::Response, Error> {
    let url = request.url().to_string();
    let method = request.method().to_string();
    tracing::debug!(%method, %url, "http request");
    let response = match body {
        Some(bytes) => request.send_bytes(bytes),
        None => request.call(),
    };
    match response {
        Ok(resp) => Ok(resp),
        Err(ureq::Error::Status(code, resp)) => Err(status_error(code, resp, &url)),
        Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
            .with_message("request failed")
            .with_url(url)
            .with_source(err)),
    }
}

pub(crate) fn read_body(response: ureq::Response) -> Result<Vec<u8>, Error> {
    let url = response.get_url().to_string();
    let mut body = Vec::new();
    response
        .into_reader()
        .take(MAX_BODY_LEN)
        .read_to_end(&mut body)
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read response body")
                .with_url(url)
                .with_source(err)
        })?;
    Ok(body)
}

pub(crate) fn read_text(response: ureq::Response) -> Result<String, Error> {
    let body = read_body(response)?;
    String::from_utf8(body).map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message("response body is not utf-8")
            .with_source(err)
    })
}

fn status_error(status: u16, response: ureq::Response, url: &str) -> Error {
    let text = response.into_string().unwrap_or_default();
    let text = text.trim();
    let message = if text.is_empty() || text.len() > MAX_ERROR_TEXT_LEN {
        format!("remote error status {status}")
    } else {
        text.to_string()
    };
    Error::new(error_kind_from_status(status))
        .with_message(message)
        .with_status(status)
        .with_url(url)
}
