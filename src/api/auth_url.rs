// `pubkyauth://` request URLs: relay, client secret and requested capabilities.
use crate::core::capabilities::Capabilities;
use crate::core::error::{Error, ErrorKind};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Serialize;
use std::collections::HashMap;
use url::Url;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuthCapability {
    pub path: String,
    pub permission: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PubkyAuthDetails {
    pub relay: String,
    pub capabilities: Vec<AuthCapability>,
    pub secret: String,
}

pub fn parse_pubky_auth_url(input: &str) -> Result<PubkyAuthDetails, Error> {
    let parsed = parse_query(input, true)?;
    let relay = parsed
        .relay
        .ok_or_else(|| Error::new(ErrorKind::Usage).with_message("Missing relay"))?;
    Ok(PubkyAuthDetails {
        relay,
        capabilities: parsed.capabilities,
        secret: parsed.secret,
    })
}

pub fn pubky_auth_details_to_json(details: &PubkyAuthDetails) -> Result<String, Error> {
    serde_json::to_string(details).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("Error serializing to JSON")
            .with_source(err)
    })
}

pub(crate) struct LenientAuthUrl {
    pub relay: Option<String>,
    pub capabilities: Vec<AuthCapability>,
    pub secret: String,
}

impl LenientAuthUrl {
    /// The 32-byte client secret (base64url, unpadded in the URL).
    pub fn secret_bytes(&self) -> Result<[u8; 32], Error> {
        decode_secret(&self.secret)
    }

    pub fn core_capabilities(&self) -> Result<Capabilities, Error> {
        let joined = self
            .capabilities
            .iter()
            .map(|cap| format!("{}:{}", cap.path, cap.permission))
            .collect::<Vec<_>>()
            .join(",");
        joined.parse()
    }
}

/// Like `parse_pubky_auth_url`, but a missing relay is left for the caller to default.
pub(crate) fn parse_lenient(input: &str) -> Result<LenientAuthUrl, Error> {
    parse_query(input, false)
}

fn parse_query(input: &str, require_relay: bool) -> Result<LenientAuthUrl, Error> {
    let url = Url::parse(input).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("Invalid URL")
            .with_source(err)
    })?;
    if url.scheme() != "pubkyauth" {
        return Err(
            Error::new(ErrorKind::Usage).with_message("Invalid scheme, expected 'pubkyauth'")
        );
    }
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    if require_relay && !params.contains_key("relay") {
        return Err(Error::new(ErrorKind::Usage).with_message("Missing relay"));
    }
    let secret = params
        .get("secret")
        .cloned()
        .ok_or_else(|| Error::new(ErrorKind::Usage).with_message("Missing secret"))?;
    let raw_caps = params
        .get("capabilities")
        .or_else(|| params.get("caps"))
        .cloned()
        .unwrap_or_default();
    let capabilities = if raw_caps.is_empty() {
        Vec::new()
    } else {
        raw_caps
            .split(',')
            .map(|item| {
                let (path, permission) = item.split_once(':').ok_or_else(|| {
                    Error::new(ErrorKind::Usage)
                        .with_message(format!("Invalid capability format in '{item}'"))
                })?;
                Ok(AuthCapability {
                    path: path.to_string(),
                    permission: permission.to_string(),
                })
            })
            .collect::<Result<Vec<_>, Error>>()?
    };
    Ok(LenientAuthUrl {
        relay: params.get("relay").cloned(),
        capabilities,
        secret,
    })
}

fn decode_secret(secret: &str) -> Result<[u8; 32], Error> {
    let bytes = URL_SAFE_NO_PAD
        .decode(secret.trim_end_matches('='))
        .map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("Invalid client secret")
                .with_source(err)
        })?;
    let length = bytes.len();
    bytes.try_into().map_err(|_| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("Invalid client secret length {length}, expected 32"))
    })
}
