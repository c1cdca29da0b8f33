//! Purpose: Blocking Pubky client: PKARR publish/resolve plus homeserver sessions and storage.
//! Exports: `PubkyClient`, `PubkyClientBuilder`, `ListOptions`.
//! Role: The single network entry point used by the SDK facade, the C ABI and the CLI.
//! Invariants: Packet lookups consult the cache first; fresh entries never hit a relay.
//! Invariants: Homeserver requests carry `pubky-host` for the key named in the URL.
//! Invariants: Session cookies live in the shared agent, so clones share sign-in state.
use super::auth_url::parse_lenient;
use super::cache::PacketCache;
use super::config::NetworkConfig;
use super::endpoint::{Target, homeserver_target, parse_target, resolve_endpoint};
use super::http;
use super::relay::RelayClient;
use crate::core::auth_token::AuthToken;
use crate::core::capabilities::Capabilities;
use crate::core::crypto;
use crate::core::error::{Error, ErrorKind};
use crate::core::keys::{Keypair, PublicKey};
use crate::core::session::SessionInfo;
use crate::core::signed_packet::{SignedPacket, SignedPacketBuilder};
use crate::core::timestamp::Timestamp;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

type ApiResult<T> = Result<T, Error>;

/// TTL of the `_pubky` record written on signup.
pub const HOMESERVER_RECORD_TTL: u32 = 60 * 60;
/// Age after which `republish_homeserver` refreshes the `_pubky` record.
pub const REPUBLISH_AFTER: Duration = Duration::from_secs(60 * 60);

const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Clone)]
pub struct PubkyClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: NetworkConfig,
    agent: ureq::Agent,
    relay: RelayClient,
    cache: PacketCache,
    http_relay: Url,
}

#[derive(Clone, Debug, Default)]
pub struct PubkyClientBuilder {
    testnet: bool,
    relays: Option<Vec<String>>,
    http_relay: Option<String>,
    request_timeout: Option<Duration>,
}

impl PubkyClientBuilder {
    pub fn testnet(mut self) -> Self {
        self.testnet = true;
        self
    }

    pub fn relays(mut self, relays: Vec<String>) -> Self {
        self.relays = Some(relays);
        self
    }

    pub fn http_relay(mut self, http_relay: impl Into<String>) -> Self {
        self.http_relay = Some(http_relay.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> ApiResult<PubkyClient> {
        let mut config = NetworkConfig::from_env(self.testnet);
        if let Some(relays) = self.relays {
            config.relays = relays;
        }
        if let Some(http_relay) = self.http_relay {
            config.http_relay = http_relay;
        }
        if let Some(timeout) = self.request_timeout {
            config.request_timeout = timeout;
        }
        PubkyClient::from_config(config)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: Option<u16>,
    pub cursor: Option<String>,
    pub reverse: bool,
    pub shallow: bool,
}

impl PubkyClient {
    pub fn builder() -> PubkyClientBuilder {
        PubkyClientBuilder::default()
    }

    pub fn from_config(config: NetworkConfig) -> ApiResult<Self> {
        let agent = http::agent(config.request_timeout);
        let relay = RelayClient::new(&config.relays, agent.clone())?;
        let http_relay = Url::parse(&config.http_relay).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid http relay url '{}'", config.http_relay))
                .with_source(err)
        })?;
        let cache = PacketCache::new(config.cache_size);
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                agent,
                relay,
                cache,
                http_relay,
            }),
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.inner.config
    }

    // PKARR

    pub fn publish(&self, packet: &SignedPacket) -> ApiResult<()> {
        self.inner.relay.publish(packet)?;
        self.inner.cache.put(packet);
        Ok(())
    }

    /// Signs the records added by `build` and publishes them, replacing the key's packet.
    pub fn publish_records<F>(&self, keypair: &Keypair, build: F) -> ApiResult<SignedPacket>
    where
        F: FnOnce(SignedPacketBuilder<'_>) -> SignedPacketBuilder<'_>,
    {
        let packet = build(SignedPacket::builder(keypair)).sign()?;
        self.publish(&packet)?;
        Ok(packet)
    }

    pub fn resolve(&self, key: &PublicKey) -> ApiResult<Option<SignedPacket>> {
        let cached = self.inner.cache.get(key);
        if let Some(packet) = &cached {
            if packet.is_fresh() {
                tracing::debug!(public_key = %key, "packet cache hit");
                return Ok(cached);
            }
        }
        match self.inner.relay.resolve(key)? {
            Some(packet) => {
                self.inner.cache.put(&packet);
                Ok(Some(packet))
            }
            None => Ok(cached),
        }
    }

    // Homeserver records

    pub fn get_homeserver(&self, key: &PublicKey) -> ApiResult<Option<String>> {
        Ok(self
            .resolve(key)?
            .as_ref()
            .and_then(homeserver_target))
    }

    /// Points `_pubky` at `host`, keeping every other record the key has published.
    pub fn publish_homeserver(&self, keypair: &Keypair, host: &str) -> ApiResult<()> {
        let own = format!("_pubky.{}", keypair.public_key());
        let mut builder = SignedPacket::builder(keypair);
        if let Some(existing) = self.resolve(&keypair.public_key())? {
            for record in existing.all_resource_records() {
                if record.name.to_string() != own {
                    builder = builder.record(record);
                }
            }
        }
        let packet = builder
            .svcb("_pubky", host, 0, HOMESERVER_RECORD_TTL)
            .sign()?;
        self.publish(&packet)?;
        tracing::info!(public_key = %keypair.public_key(), homeserver = host, "published homeserver record");
        Ok(())
    }

    /// Republishes the `_pubky` record when it is missing, stale or points elsewhere.
    /// Returns whether a new packet was published.
    pub fn republish_homeserver(&self, keypair: &Keypair, host: &str) -> ApiResult<bool> {
        let current = self.resolve(&keypair.public_key())?;
        let needed = match &current {
            None => true,
            Some(packet) => {
                let age = Timestamp::now().as_u64().saturating_sub(packet.timestamp().as_u64());
                age > REPUBLISH_AFTER.as_micros() as u64
                    || homeserver_target(packet).as_deref() != Some(host)
            }
        };
        if needed {
            self.publish_homeserver(keypair, host)?;
        } else {
            tracing::debug!(public_key = %keypair.public_key(), "homeserver record is current");
        }
        Ok(needed)
    }

    // Sessions

    pub fn signup(
        &self,
        keypair: &Keypair,
        homeserver: &PublicKey,
        signup_token: Option<&str>,
    ) -> ApiResult<SessionInfo> {
        let target = Target::Pubky {
            key: *homeserver,
            path: match signup_token {
                Some(token) => format!("/signup?signup_token={}", encode_query(token)),
                None => "/signup".to_string(),
            },
        };
        let token = AuthToken::sign(keypair, Capabilities::root())?;
        let request = self.request("POST", &target)?.set("Content-Type", OCTET_STREAM);
        let response = http::send(request, Some(&token.serialize()?))?;
        let session = SessionInfo::deserialize(&http::read_body(response)?)?;
        self.publish_homeserver(keypair, &homeserver.to_z32())?;
        tracing::info!(public_key = %keypair.public_key(), %homeserver, "signed up");
        Ok(session)
    }

    pub fn signin(&self, keypair: &Keypair) -> ApiResult<SessionInfo> {
        let user = keypair.public_key();
        let token = AuthToken::sign(keypair, Capabilities::root())?;
        let request = self
            .request("POST", &session_target(&user))?
            .set("Content-Type", OCTET_STREAM);
        let response = http::send(request, Some(&token.serialize()?))?;
        let session = SessionInfo::deserialize(&http::read_body(response)?)?;
        tracing::info!(public_key = %user, "signed in");

        match self.get_homeserver(&user) {
            Ok(Some(host)) => {
                if let Err(err) = self.republish_homeserver(keypair, &host) {
                    tracing::warn!(error = %err, "homeserver republish after signin failed");
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "homeserver lookup after signin failed"),
        }
        Ok(session)
    }

    pub fn signout(&self, key: &PublicKey) -> ApiResult<()> {
        http::send(self.request("DELETE", &session_target(key))?, None)?;
        tracing::info!(public_key = %key, "signed out");
        Ok(())
    }

    /// Current session for `key`; `Ok(None)` only when the homeserver answers 404.
    pub fn session(&self, key: &PublicKey) -> ApiResult<Option<SessionInfo>> {
        let request = self.request("GET", &session_target(key))?;
        match http::send(request, None) {
            Ok(response) => Ok(Some(SessionInfo::deserialize(&http::read_body(response)?)?)),
            Err(err) if err.status() == Some(404) => Ok(None),
            Err(err) => Err(err),
        }
    }

    // Storage

    pub fn put(&self, url: &str, body: &[u8]) -> ApiResult<()> {
        let request = self
            .request("PUT", &parse_target(url)?)?
            .set("Content-Type", OCTET_STREAM);
        http::send(request, Some(body))?;
        Ok(())
    }

    /// Fetches a stored value; a missing path is `Ok(None)`.
    pub fn get(&self, url: &str) -> ApiResult<Option<Vec<u8>>> {
        match http::send(self.request("GET", &parse_target(url)?)?, None) {
            Ok(response) => Ok(Some(http::read_body(response)?)),
            Err(err) if err.status() == Some(404) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn delete(&self, url: &str) -> ApiResult<()> {
        http::send(self.request("DELETE", &parse_target(url)?)?, None)?;
        Ok(())
    }

    /// Lists entries under a directory URL; the response is one URL per line.
    pub fn list(&self, url: &str, options: &ListOptions) -> ApiResult<Vec<String>> {
        let target = match parse_target(url)? {
            Target::Pubky { key, path } => Target::Pubky {
                key,
                path: list_path(&path, options),
            },
            Target::Http(mut url) => {
                let path = list_path(url.path(), options);
                url = url.join(&path).map_err(|err| {
                    Error::new(ErrorKind::Usage)
                        .with_message("Failed to parse URL")
                        .with_source(err)
                })?;
                Target::Http(url)
            }
        };
        let body = http::read_text(http::send(self.request("GET", &target)?, None)?)?;
        Ok(body
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    // Admin and pubkyauth

    pub fn signup_token(&self, homeserver: &str, admin_password: &str) -> ApiResult<String> {
        const PATH: &str = "/admin/generate_signup_token";
        let target = match homeserver.parse::<PublicKey>() {
            Ok(key) => Target::Pubky {
                key,
                path: PATH.to_string(),
            },
            Err(_) => {
                let base = if homeserver.contains("://") {
                    homeserver.to_string()
                } else {
                    format!("https://{homeserver}")
                };
                let url = Url::parse(&base)
                    .and_then(|base| base.join(PATH))
                    .map_err(|err| {
                        Error::new(ErrorKind::Usage)
                            .with_message(format!("Invalid homeserver '{homeserver}'"))
                            .with_source(err)
                    })?;
                Target::Http(url)
            }
        };
        let request = self
            .request("GET", &target)?
            .set("X-Admin-Password", admin_password);
        http::read_text(http::send(request, None)?)
    }

    /// Answers a `pubkyauth://` request: signs a token for the requested
    /// capabilities, seals it with the client secret and posts it to the relay channel.
    pub fn send_auth_token(&self, keypair: &Keypair, auth_url: &str) -> ApiResult<()> {
        let parsed = parse_lenient(auth_url)?;
        let secret = parsed.secret_bytes()?;
        let capabilities = parsed.core_capabilities()?;

        let relay = match parsed.relay {
            Some(relay) => Url::parse(&relay).map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message("Invalid relay URL")
                    .with_source(err)
            })?,
            None => self.inner.http_relay.clone(),
        };
        let channel = URL_SAFE_NO_PAD.encode(crypto::hash(&secret));
        let url = channel_url(&relay, &channel)?;

        let token = AuthToken::sign(keypair, capabilities)?;
        let sealed = crypto::encrypt(&token.serialize()?, &secret)?;
        let request = self
            .inner
            .agent
            .request("POST", url.as_str())
            .set("Content-Type", OCTET_STREAM);
        http::send(request, Some(&sealed))?;
        tracing::info!(public_key = %keypair.public_key(), relay = %relay, "sent auth token");
        Ok(())
    }

    fn request(&self, method: &str, target: &Target) -> ApiResult<ureq::Request> {
        match target {
            Target::Pubky { key, path } => {
                let endpoint = resolve_endpoint(|key| self.resolve(key), key)?;
                let url = endpoint.url(path)?;
                let mut request = self.inner.agent.request(method, url.as_str());
                if let Some(host) = endpoint.pubky_host {
                    request = request.set("pubky-host", &host.to_z32());
                }
                Ok(request)
            }
            Target::Http(url) => Ok(self.inner.agent.request(method, url.as_str())),
        }
    }
}

fn session_target(key: &PublicKey) -> Target {
    Target::Pubky {
        key: *key,
        path: "/session".to_string(),
    }
}

fn list_path(path: &str, options: &ListOptions) -> String {
    let (path, existing_query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };
    let mut out = path.to_string();
    if !out.ends_with('/') {
        out.push('/');
    }
    let mut params: Vec<String> = existing_query
        .filter(|query| !query.is_empty())
        .map(|query| vec![query.to_string()])
        .unwrap_or_default();
    if let Some(limit) = options.limit {
        params.push(format!("limit={limit}"));
    }
    if let Some(cursor) = &options.cursor {
        params.push(format!("cursor={}", encode_query(cursor)));
    }
    if options.reverse {
        params.push("reverse".to_string());
    }
    if options.shallow {
        params.push("shallow".to_string());
    }
    if !params.is_empty() {
        out.push('?');
        out.push_str(&params.join("&"));
    }
    out
}

fn channel_url(relay: &Url, channel: &str) -> ApiResult<Url> {
    let mut base = relay.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(channel).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("Invalid relay URL")
            .with_source(err)
    })
}

fn encode_query(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
