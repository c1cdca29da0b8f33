//! Purpose: Binding facade: every SDK operation as a function returning `[status, data]`.
//! Exports: One function per operation, `Operation`, `operation`, `call`, status constants.
//! Role: Shared by foreign bindings (through `abi`) and the CLI; owns the process-global client.
//! Invariants: `status` is always `"success"` or `"error"`; `data` is the payload or the message.
//! Invariants: Typed `Result`s are kept until the outermost call so the CLI can map error kinds.
use crate::api::{
    ListOptions, PubkyClient, PublicKey, SignedPacket, parse_pubky_auth_url, parse_target,
    pubky_auth_details_to_json,
};
use crate::core::dns_json::{https_record_json, resource_record_to_json};
use crate::core::error::{Error, ErrorKind};
use crate::core::keys::{Keypair, keypair_from_secret_hex, secret_hex};
use crate::core::{mnemonic, recovery};
use crate::events::{self, EventListener};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::sync::{Arc, PoisonError, RwLock};

pub const SUCCESS: &str = "success";
pub const ERROR: &str = "error";

/// TTL of TXT records written by `publish`.
pub const TXT_RECORD_TTL: u32 = 30;
/// TTL of HTTPS records written by `publish_https`.
pub const HTTPS_RECORD_TTL: u32 = 3600;

type SdkResult = Result<String, Error>;

static CLIENT: RwLock<Option<PubkyClient>> = RwLock::new(None);

/// The process-global client, built for mainnet on first use.
pub fn client() -> Result<PubkyClient, Error> {
    if let Some(client) = CLIENT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return Ok(client.clone());
    }
    let mut slot = CLIENT.write().unwrap_or_else(PoisonError::into_inner);
    if let Some(client) = slot.as_ref() {
        return Ok(client.clone());
    }
    let client = PubkyClient::builder().build()?;
    *slot = Some(client.clone());
    Ok(client)
}

/// Replaces the process-global client.
pub fn set_client(client: PubkyClient) {
    *CLIENT.write().unwrap_or_else(PoisonError::into_inner) = Some(client);
}

fn respond(result: SdkResult) -> Vec<String> {
    match result {
        Ok(data) => vec![SUCCESS.to_string(), data],
        Err(err) => vec![ERROR.to_string(), err.detail()],
    }
}

fn context(prefix: &'static str) -> impl FnOnce(Error) -> Error {
    move |err| {
        let wrapped =
            Error::new(err.kind()).with_message(format!("{prefix}: {}", err.detail()));
        match err.status() {
            Some(status) => wrapped.with_status(status),
            None => wrapped,
        }
    }
}

fn url_error() -> Error {
    Error::new(ErrorKind::Usage).with_message("Failed to parse URL")
}

fn to_json_string(value: &Value) -> SdkResult {
    serde_json::to_string(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("Failed to serialize JSON")
            .with_source(err)
    })
}

fn keypair_json(keypair: &Keypair, mnemonic: Option<&str>) -> SdkResult {
    let public_key = keypair.public_key();
    let mut value = json!({
        "secret_key": secret_hex(keypair),
        "public_key": public_key.to_z32(),
        "uri": public_key.to_uri_string(),
    });
    if let Some(mnemonic) = mnemonic {
        value["mnemonic"] = json!(mnemonic);
    }
    to_json_string(&value)
}

fn parse_key(input: &str, prefix: &'static str) -> Result<PublicKey, Error> {
    input.parse::<PublicKey>().map_err(|err| {
        let detail = err.detail();
        let reason = detail.strip_prefix("Invalid public key: ").unwrap_or(&detail);
        Error::new(err.kind()).with_message(format!("{prefix}: {reason}"))
    })
}

// Network and events

pub fn switch_network(use_testnet: bool) -> Vec<String> {
    respond(try_switch_network(use_testnet))
}

fn try_switch_network(use_testnet: bool) -> SdkResult {
    let builder = PubkyClient::builder();
    let builder = if use_testnet {
        builder.testnet()
    } else {
        builder
    };
    set_client(builder.build()?);
    tracing::info!(testnet = use_testnet, "switched network");
    Ok(format!(
        "Switched to {} network",
        if use_testnet { "testnet" } else { "default" }
    ))
}

pub fn set_event_listener(listener: Box<dyn EventListener>) {
    events::notifier().set_listener(Arc::from(listener));
}

pub fn remove_event_listener() {
    events::notifier().remove_listener();
}

// Keys

pub fn generate_secret_key() -> Vec<String> {
    respond(try_generate_secret_key())
}

fn try_generate_secret_key() -> SdkResult {
    let keypair = Keypair::random()?;
    let data = keypair_json(&keypair, None)?;
    if let Err(err) = events::start_internal_event_loop() {
        tracing::warn!(error = %err, "internal event loop did not start");
    }
    Ok(data)
}

pub fn get_public_key_from_secret_key(secret_key: String) -> Vec<String> {
    respond(try_get_public_key_from_secret_key(&secret_key))
}

fn try_get_public_key_from_secret_key(secret_key: &str) -> SdkResult {
    let public_key = keypair_from_secret_hex(secret_key)?.public_key();
    to_json_string(&json!({
        "public_key": public_key.to_z32(),
        "uri": public_key.to_uri_string(),
    }))
}

pub fn generate_mnemonic_phrase() -> Vec<String> {
    respond(mnemonic::generate_mnemonic())
}

pub fn mnemonic_phrase_to_keypair(mnemonic_phrase: String) -> Vec<String> {
    respond(
        mnemonic::mnemonic_to_keypair(&mnemonic_phrase)
            .and_then(|keypair| keypair_json(&keypair, None)),
    )
}

pub fn generate_mnemonic_phrase_and_keypair() -> Vec<String> {
    respond(
        mnemonic::generate_mnemonic_and_keypair()
            .and_then(|(phrase, keypair)| keypair_json(&keypair, Some(&phrase))),
    )
}

pub fn validate_mnemonic_phrase(mnemonic_phrase: String) -> Vec<String> {
    respond(Ok(mnemonic::validate_mnemonic(&mnemonic_phrase).to_string()))
}

pub fn create_recovery_file(secret_key: String, passphrase: String) -> Vec<String> {
    respond(try_create_recovery_file(&secret_key, &passphrase))
}

fn try_create_recovery_file(secret_key: &str, passphrase: &str) -> SdkResult {
    if secret_key.is_empty() || passphrase.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("Secret key and passphrase must not be empty"));
    }
    let keypair = keypair_from_secret_hex(secret_key)?;
    let file = recovery::create_recovery_file(&keypair, passphrase)?;
    Ok(STANDARD.encode(file))
}

pub fn decrypt_recovery_file(recovery_file: String, passphrase: String) -> Vec<String> {
    respond(try_decrypt_recovery_file(&recovery_file, &passphrase))
}

fn try_decrypt_recovery_file(recovery_file: &str, passphrase: &str) -> SdkResult {
    if recovery_file.is_empty() || passphrase.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("Recovery file and passphrase must not be empty"));
    }
    let bytes = STANDARD
        .decode(recovery_file.trim())
        .map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("Failed to decode recovery file: {err}"))
        })?;
    let keypair = recovery::decrypt_recovery_file(&bytes, passphrase).map_err(|err| {
        tracing::debug!(error = %err, "recovery file rejected");
        Error::new(err.kind()).with_message("Failed to decrypt recovery file")
    })?;
    Ok(secret_hex(&keypair))
}

// PKARR

pub fn publish(record_name: String, record_content: String, secret_key: String) -> Vec<String> {
    respond(try_publish(&record_name, &record_content, &secret_key))
}

fn try_publish(record_name: &str, record_content: &str, secret_key: &str) -> SdkResult {
    let keypair = keypair_from_secret_hex(secret_key)?;
    let packet = SignedPacket::builder(&keypair)
        .txt(record_name, record_content, TXT_RECORD_TTL)
        .sign()?;
    client()?
        .publish(&packet)
        .map_err(context("Failed to publish"))?;
    Ok(keypair.public_key().to_z32())
}

pub fn publish_https(record_name: String, target: String, secret_key: String) -> Vec<String> {
    respond(try_publish_https(&record_name, &target, &secret_key))
}

fn try_publish_https(record_name: &str, target: &str, secret_key: &str) -> SdkResult {
    let keypair = keypair_from_secret_hex(secret_key)?;
    let packet = SignedPacket::builder(&keypair)
        .https(record_name, target, HTTPS_RECORD_TTL, None, &[])
        .sign()?;
    client()?
        .publish(&packet)
        .map_err(context("Failed to publish"))?;
    Ok(keypair.public_key().to_z32())
}

fn resolve_packet(public_key: &PublicKey) -> Result<SignedPacket, Error> {
    client()?
        .resolve(public_key)
        .map_err(context("Failed to resolve"))?
        .ok_or_else(|| Error::new(ErrorKind::NotFound).with_message("No signed packet found"))
}

pub fn resolve(public_key: String) -> Vec<String> {
    respond(try_resolve(&public_key))
}

fn try_resolve(public_key: &str) -> SdkResult {
    let key = parse_key(public_key, "Invalid zbase32 encoded key")?;
    let packet = resolve_packet(&key)?;
    let records: Vec<Value> = packet
        .all_resource_records()
        .iter()
        .map(resource_record_to_json)
        .collect();
    to_json_string(&json!({
        "signed_packet": packet.encode_hex(),
        "public_key": STANDARD.encode(packet.public_key().as_bytes()),
        "signature": STANDARD.encode(packet.signature()),
        "timestamp": packet.timestamp().as_u64(),
        "last_seen": packet.last_seen().as_u64(),
        "dns_packet": STANDARD.encode(packet.encoded_packet()),
        "records": records,
    }))
}

pub fn resolve_https(public_key: String) -> Vec<String> {
    respond(try_resolve_https(&public_key))
}

fn try_resolve_https(public_key: &str) -> SdkResult {
    let key = parse_key(public_key, "Invalid public key")?;
    let packet = resolve_packet(&key)?;
    let https_records: Vec<Value> = packet
        .all_resource_records()
        .iter()
        .filter_map(https_record_json)
        .collect();
    if https_records.is_empty() {
        return Err(Error::new(ErrorKind::NotFound).with_message("No HTTPS records found"));
    }
    to_json_string(&json!({
        "public_key": key.to_z32(),
        "https_records": https_records,
        "last_seen": packet.last_seen().as_u64(),
        "timestamp": packet.timestamp().as_u64(),
    }))
}

// Homeserver

pub fn get_homeserver(pubky: String) -> Vec<String> {
    respond(try_get_homeserver(&pubky))
}

fn try_get_homeserver(pubky: &str) -> SdkResult {
    let key = parse_key(pubky, "Invalid public key")?;
    client()?
        .get_homeserver(&key)?
        .ok_or_else(|| {
            Error::new(ErrorKind::NotFound).with_message("No homeserver found for this public key")
        })
}

pub fn republish_homeserver(secret_key: String, homeserver: String) -> Vec<String> {
    respond(try_republish_homeserver(&secret_key, &homeserver))
}

fn try_republish_homeserver(secret_key: &str, homeserver: &str) -> SdkResult {
    let keypair = keypair_from_secret_hex(secret_key)?;
    let homeserver = parse_key(homeserver, "Invalid homeserver public key")?;
    client()?
        .republish_homeserver(&keypair, &homeserver.to_z32())
        .map_err(context("Failed to republish homeserver"))?;
    Ok("Homeserver republished successfully".to_string())
}

pub fn get_signup_token(homeserver_pubky: String, admin_password: String) -> Vec<String> {
    respond(try_get_signup_token(&homeserver_pubky, &admin_password))
}

fn try_get_signup_token(homeserver: &str, admin_password: &str) -> SdkResult {
    client()?
        .signup_token(homeserver, admin_password)
        .map_err(context("Failed to get signup token"))
}

pub fn sign_up(
    secret_key: String,
    homeserver: String,
    signup_token: Option<String>,
) -> Vec<String> {
    respond(try_sign_up(&secret_key, &homeserver, signup_token.as_deref()))
}

fn try_sign_up(secret_key: &str, homeserver: &str, signup_token: Option<&str>) -> SdkResult {
    let keypair = keypair_from_secret_hex(secret_key)?;
    let homeserver = parse_key(homeserver, "Invalid homeserver public key")?;
    let session = client()?
        .signup(&keypair, &homeserver, signup_token)
        .map_err(context("signup failure"))?;
    to_json_string(&session.to_json())
}

pub fn sign_in(secret_key: String) -> Vec<String> {
    respond(try_sign_in(&secret_key))
}

fn try_sign_in(secret_key: &str) -> SdkResult {
    let keypair = keypair_from_secret_hex(secret_key)?;
    let session = client()?
        .signin(&keypair)
        .map_err(context("Failed to sign in"))?;
    to_json_string(&session.to_json())
}

pub fn sign_out(secret_key: String) -> Vec<String> {
    respond(try_sign_out(&secret_key))
}

fn try_sign_out(secret_key: &str) -> SdkResult {
    let keypair = keypair_from_secret_hex(secret_key)?;
    client()?
        .signout(&keypair.public_key())
        .map_err(context("Failed to sign out"))?;
    Ok("Sign out success".to_string())
}

pub fn session(pubky: String) -> Vec<String> {
    respond(try_session(&pubky))
}

fn try_session(pubky: &str) -> SdkResult {
    let key = parse_key(pubky, "Invalid homeserver public key")?;
    let session = client()?
        .session(&key)
        .map_err(context("Failed to get session"))?
        .ok_or_else(|| Error::new(ErrorKind::NotFound).with_message("No session returned"))?;
    to_json_string(&session.to_json())
}

// Storage

pub fn put(url: String, content: String) -> Vec<String> {
    respond(try_put(&url, &content))
}

fn try_put(url: &str, content: &str) -> SdkResult {
    let trimmed = url.trim_end_matches('/');
    parse_target(trimmed).map_err(|_| url_error())?;
    client()?
        .put(trimmed, content.as_bytes())
        .map_err(context("Failed to put"))?;
    Ok(trimmed.to_string())
}

pub fn get(url: String) -> Vec<String> {
    respond(try_get(&url))
}

fn try_get(url: &str) -> SdkResult {
    let trimmed = url.trim_end_matches('/');
    parse_target(trimmed).map_err(|_| url_error())?;
    let body = client()?.get(trimmed).map_err(|err| {
        tracing::debug!(error = %err, "get failed");
        match err.status() {
            Some(status) => Error::new(err.kind())
                .with_message(format!("Request failed: {status}"))
                .with_status(status),
            None => Error::new(err.kind()).with_message("Request failed"),
        }
    })?;
    Ok(match body {
        None => String::new(),
        Some(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => format!("base64:{}", STANDARD.encode(err.as_bytes())),
        },
    })
}

pub fn delete_file(url: String) -> Vec<String> {
    respond(try_delete_file(&url))
}

fn try_delete_file(url: &str) -> SdkResult {
    parse_target(url).map_err(|_| url_error())?;
    client()?
        .delete(url)
        .map_err(context("Failed to delete"))?;
    Ok("Deleted successfully".to_string())
}

pub fn list(url: String) -> Vec<String> {
    respond(try_list(&url))
}

fn try_list(url: &str) -> SdkResult {
    let trimmed = url.trim_end_matches('/');
    parse_target(trimmed).map_err(|_| url_error())?;
    let entries = client()?
        .list(trimmed, &ListOptions::default())
        .map_err(context("Failed to list"))?;
    to_json_string(&json!(entries))
}

// pubkyauth

pub fn parse_auth_url(url: String) -> Vec<String> {
    respond(parse_pubky_auth_url(&url).and_then(|details| pubky_auth_details_to_json(&details)))
}

pub fn auth(url: String, secret_key: String) -> Vec<String> {
    respond(try_auth(&url, &secret_key))
}

fn try_auth(url: &str, secret_key: &str) -> SdkResult {
    let keypair = keypair_from_secret_hex(secret_key)?;
    client()?
        .send_auth_token(&keypair, url)
        .map_err(context("Failed to authorize"))?;
    Ok("Authorization successful".to_string())
}

/// A facade operation callable by name with string arguments.
pub struct Operation {
    pub name: &'static str,
    /// Leading arguments that must be present and non-null.
    pub required: usize,
    /// Trailing arguments that may be omitted or null.
    pub optional: usize,
    run: fn(&[Option<String>]) -> SdkResult,
}

impl Operation {
    pub fn accepts(&self, args: &[Option<String>]) -> bool {
        args.len() >= self.required
            && args.len() <= self.required + self.optional
            && args[..self.required].iter().all(Option::is_some)
    }

    pub fn invoke(&self, args: &[Option<String>]) -> SdkResult {
        if !self.accepts(args) {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "{} expects {} argument(s), got {}",
                self.name,
                self.required,
                args.len()
            )));
        }
        (self.run)(args)
    }
}

fn arg(args: &[Option<String>], index: usize) -> &str {
    args.get(index)
        .and_then(|value| value.as_deref())
        .unwrap_or_default()
}

fn opt_arg(args: &[Option<String>], index: usize) -> Option<&str> {
    args.get(index).and_then(|value| value.as_deref())
}

fn parse_bool(value: &str) -> Result<bool, Error> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("expected a boolean, got '{other}'"))),
    }
}

#[rustfmt::skip]
pub const OPERATIONS: &[Operation] = &[
    Operation { name: "switch_network", required: 1, optional: 0, run: |a| try_switch_network(parse_bool(arg(a, 0))?) },
    Operation { name: "delete_file", required: 1, optional: 0, run: |a| try_delete_file(arg(a, 0)) },
    Operation { name: "session", required: 1, optional: 0, run: |a| try_session(arg(a, 0)) },
    Operation { name: "generate_secret_key", required: 0, optional: 0, run: |_| try_generate_secret_key() },
    Operation { name: "get_public_key_from_secret_key", required: 1, optional: 0, run: |a| try_get_public_key_from_secret_key(arg(a, 0)) },
    Operation { name: "publish_https", required: 3, optional: 0, run: |a| try_publish_https(arg(a, 0), arg(a, 1), arg(a, 2)) },
    Operation { name: "resolve_https", required: 1, optional: 0, run: |a| try_resolve_https(arg(a, 0)) },
    Operation { name: "get_signup_token", required: 2, optional: 0, run: |a| try_get_signup_token(arg(a, 0), arg(a, 1)) },
    Operation { name: "sign_up", required: 2, optional: 1, run: |a| try_sign_up(arg(a, 0), arg(a, 1), opt_arg(a, 2)) },
    Operation { name: "republish_homeserver", required: 2, optional: 0, run: |a| try_republish_homeserver(arg(a, 0), arg(a, 1)) },
    Operation { name: "sign_in", required: 1, optional: 0, run: |a| try_sign_in(arg(a, 0)) },
    Operation { name: "sign_out", required: 1, optional: 0, run: |a| try_sign_out(arg(a, 0)) },
    Operation { name: "put", required: 2, optional: 0, run: |a| try_put(arg(a, 0), arg(a, 1)) },
    Operation { name: "get", required: 1, optional: 0, run: |a| try_get(arg(a, 0)) },
    Operation { name: "resolve", required: 1, optional: 0, run: |a| try_resolve(arg(a, 0)) },
    Operation { name: "publish", required: 3, optional: 0, run: |a| try_publish(arg(a, 0), arg(a, 1), arg(a, 2)) },
    Operation { name: "list", required: 1, optional: 0, run: |a| try_list(arg(a, 0)) },
    Operation { name: "auth", required: 2, optional: 0, run: |a| try_auth(arg(a, 0), arg(a, 1)) },
    Operation { name: "parse_auth_url", required: 1, optional: 0, run: |a| parse_pubky_auth_url(arg(a, 0)).and_then(|d| pubky_auth_details_to_json(&d)) },
    Operation { name: "create_recovery_file", required: 2, optional: 0, run: |a| try_create_recovery_file(arg(a, 0), arg(a, 1)) },
    Operation { name: "decrypt_recovery_file", required: 2, optional: 0, run: |a| try_decrypt_recovery_file(arg(a, 0), arg(a, 1)) },
    Operation { name: "get_homeserver", required: 1, optional: 0, run: |a| try_get_homeserver(arg(a, 0)) },
    Operation { name: "generate_mnemonic_phrase", required: 0, optional: 0, run: |_| mnemonic::generate_mnemonic() },
    Operation { name: "mnemonic_phrase_to_keypair", required: 1, optional: 0, run: |a| mnemonic::mnemonic_to_keypair(arg(a, 0)).and_then(|k| keypair_json(&k, None)) },
    Operation { name: "generate_mnemonic_phrase_and_keypair", required: 0, optional: 0, run: |_| mnemonic::generate_mnemonic_and_keypair().and_then(|(p, k)| keypair_json(&k, Some(&p))) },
    Operation { name: "validate_mnemonic_phrase", required: 1, optional: 0, run: |a| Ok(mnemonic::validate_mnemonic(arg(a, 0)).to_string()) },
];

pub fn operation(name: &str) -> Option<&'static Operation> {
    OPERATIONS.iter().find(|op| op.name == name)
}

/// Runs the named operation, keeping the typed error.
pub fn call(name: &str, args: &[Option<String>]) -> SdkResult {
    let op = operation(name).ok_or_else(|| {
        Error::new(ErrorKind::Usage).with_message(format!("unknown function '{name}'"))
    })?;
    op.invoke(args)
}

/// Runs the named operation and renders the `[status, data]` pair.
pub fn call_response(name: &str, args: &[Option<String>]) -> Vec<String> {
    respond(call(name, args))
}

#[cfg(test)]
mod tests {
    use super::{
        ERROR, SUCCESS, call, call_response, context, create_recovery_file,
        decrypt_recovery_file, generate_mnemonic_phrase_and_keypair, generate_secret_key,
        get_public_key_from_secret_key, operation, parse_auth_url, validate_mnemonic_phrase,
    };
    use crate::core::error::{Error, ErrorKind};

    const SECRET: &str = "0101010101010101010101010101010101010101010101010101010101010101";

    #[test]
    fn generated_keys_round_trip_through_public_key_lookup() {
        let generated = generate_secret_key();
        assert_eq!(generated[0], SUCCESS);
        let keys: serde_json::Value = serde_json::from_str(&generated[1]).expect("json");
        let secret = keys["secret_key"].as_str().expect("secret").to_string();
        assert_eq!(secret.len(), 64);

        let derived = get_public_key_from_secret_key(secret);
        let derived: serde_json::Value = serde_json::from_str(&derived[1]).expect("json");
        assert_eq!(derived["public_key"], keys["public_key"]);
        assert_eq!(derived["uri"], keys["uri"]);
    }

    #[test]
    fn recovery_file_requires_inputs() {
        assert_eq!(
            create_recovery_file(String::new(), "pass".into()),
            vec![ERROR, "Secret key and passphrase must not be empty"]
        );
        assert_eq!(
            decrypt_recovery_file("AAAA".into(), String::new()),
            vec![ERROR, "Recovery file and passphrase must not be empty"]
        );
    }

    #[test]
    fn recovery_file_round_trip_and_wrong_passphrase() {
        let created = create_recovery_file(SECRET.into(), "correct horse".into());
        assert_eq!(created[0], SUCCESS);
        let decrypted = decrypt_recovery_file(created[1].clone(), "correct horse".into());
        assert_eq!(decrypted, vec![SUCCESS, SECRET]);
        let wrong = decrypt_recovery_file(created[1].clone(), "wrong".into());
        assert_eq!(wrong, vec![ERROR, "Failed to decrypt recovery file"]);
    }

    #[test]
    fn mnemonic_outputs() {
        let generated = generate_mnemonic_phrase_and_keypair();
        let value: serde_json::Value = serde_json::from_str(&generated[1]).expect("json");
        let phrase = value["mnemonic"].as_str().expect("mnemonic").to_string();
        assert_eq!(phrase.split_whitespace().count(), 12);
        assert_eq!(validate_mnemonic_phrase(phrase), vec![SUCCESS, "true"]);
        assert_eq!(
            validate_mnemonic_phrase("not a phrase".into()),
            vec![SUCCESS, "false"]
        );
    }

    #[test]
    fn auth_url_errors_are_reported_verbatim() {
        assert_eq!(
            parse_auth_url("pubkyauth:///?secret=x".into()),
            vec![ERROR, "Missing relay"]
        );
    }

    #[test]
    fn dispatch_checks_names_and_arity() {
        assert!(operation("sign_up").expect("sign_up").accepts(&[
            Some("a".into()),
            Some("b".into()),
            None
        ]));
        assert!(!operation("sign_up").expect("sign_up").accepts(&[Some("a".into()), None]));

        let err = call("nope", &[]).expect_err("unknown");
        assert_eq!(err.kind(), ErrorKind::Usage);
        let err = call("resolve", &[]).expect_err("arity");
        assert_eq!(err.kind(), ErrorKind::Usage);

        let response = call_response("validate_mnemonic_phrase", &[Some("x".into())]);
        assert_eq!(response, vec![SUCCESS, "false"]);
    }

    #[test]
    fn bad_secret_keys_are_usage_errors() {
        let err = call("sign_in", &[Some("zz".into())]).expect_err("bad hex");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.message(), Some("Failed to decode secret key"));
    }

    #[test]
    fn context_keeps_kind_and_status() {
        let err = context("Failed to put")(
            Error::new(ErrorKind::Permission)
                .with_message("denied")
                .with_status(403),
        );
        assert_eq!(err.kind(), ErrorKind::Permission);
        assert_eq!(err.status(), Some(403));
        assert_eq!(err.message(), Some("Failed to put: denied"));
    }
}
