//! Purpose: Turn `pubky://` URLs and public keys into concrete HTTP endpoints.
//! Exports: `Target`, `Endpoint`, `parse_target`, `resolve_endpoint`, `homeserver_target`.
//! Role: Pure resolution logic; packet lookups are injected so callers decide on caching.
//! Invariants: `_pubky` records win over apex records; lowest non-zero priority first, 0 last.
//! Invariants: Key-to-key indirection stops after `MAX_HOPS` lookups.
//! Invariants: `localhost` and loopback addresses use http; everything else uses https.
use crate::core::error::{Error, ErrorKind};
use crate::core::keys::PublicKey;
use crate::core::signed_packet::SignedPacket;
use simple_dns::rdata::{RData, SVCB};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use url::Url;

pub const MAX_HOPS: usize = 3;
const PUBKY_LABEL: &str = "_pubky";

/// Where a request should go before endpoint resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// A path on the homeserver of `key`; `path` starts with `/` and may carry a query.
    Pubky { key: PublicKey, path: String },
    /// A plain http(s) URL, used as-is.
    Http(Url),
}

pub fn parse_target(input: &str) -> Result<Target, Error> {
    let input = input.trim();
    let rest = input
        .strip_prefix("pubky://")
        .or_else(|| input.strip_prefix("pubky:"));
    if let Some(rest) = rest {
        let (key, path) = match rest.find('/') {
            Some(index) => (&rest[..index], rest[index..].to_string()),
            None => (rest, "/".to_string()),
        };
        let key = key.parse::<PublicKey>().map_err(invalid_url)?;
        return Ok(Target::Pubky { key, path });
    }

    let url = Url::parse(input).map_err(invalid_url)?;
    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(Error::new(ErrorKind::Usage).with_message("Failed to parse URL")),
    }
    if let Some(key) = url
        .host_str()
        .and_then(|host| host.strip_prefix("_pubky."))
        .and_then(|key| key.parse::<PublicKey>().ok())
    {
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        return Ok(Target::Pubky { key, path });
    }
    Ok(Target::Http(url))
}

fn invalid_url(source: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::new(ErrorKind::Usage)
        .with_message("Failed to parse URL")
        .with_source(source)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub base: Url,
    /// Sent as the `pubky-host` header so a shared homeserver can pick the tenant.
    pub pubky_host: Option<PublicKey>,
}

impl Endpoint {
    pub fn url(&self, path_and_query: &str) -> Result<Url, Error> {
        let relative = if path_and_query.starts_with('/') {
            path_and_query.to_string()
        } else {
            format!("/{path_and_query}")
        };
        self.base.join(&relative).map_err(invalid_url)
    }
}

/// The homeserver named by `packet`'s `_pubky` record: a z-base-32 key or a domain.
pub fn homeserver_target(packet: &SignedPacket) -> Option<String> {
    pick_service(packet, PUBKY_LABEL).map(|svcb| display_target(&svcb))
}

/// Resolves `key` to an HTTP endpoint, following `_pubky` and apex service records.
pub fn resolve_endpoint<F>(mut resolve: F, key: &PublicKey) -> Result<Endpoint, Error>
where
    F: FnMut(&PublicKey) -> Result<Option<SignedPacket>, Error>,
{
    let mut current = *key;
    for _ in 0..MAX_HOPS {
        let packet = resolve(&current)?.ok_or_else(|| {
            Error::new(ErrorKind::NotFound)
                .with_message(format!("No signed packet found for {current}"))
        })?;
        let svcb = pick_service(&packet, PUBKY_LABEL)
            .or_else(|| pick_service(&packet, "@"))
            .ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message(format!("No homeserver record found for {current}"))
            })?;
        let target = display_target(&svcb);
        let port = service_port(&svcb);

        if target.is_empty() || target == "." {
            let address = apex_address(&packet).ok_or_else(|| {
                Error::new(ErrorKind::NotFound)
                    .with_message(format!("No address record found for {current}"))
            })?;
            return endpoint_for_host(&host_text(address), is_loopback(address), port, key);
        }
        if let Ok(next) = target.parse::<PublicKey>() {
            tracing::debug!(from = %current, to = %next, "following homeserver indirection");
            current = next;
            continue;
        }
        let local = target == "localhost" || target.ends_with(".localhost");
        return endpoint_for_host(&target, local, port, key);
    }
    Err(Error::new(ErrorKind::NotFound)
        .with_message(format!("Homeserver resolution for {key} exceeded {MAX_HOPS} hops")))
}

fn endpoint_for_host(
    host: &str,
    plain_http: bool,
    port: Option<u16>,
    key: &PublicKey,
) -> Result<Endpoint, Error> {
    let scheme = if plain_http { "http" } else { "https" };
    let base = match port {
        Some(port) => format!("{scheme}://{host}:{port}/"),
        None => format!("{scheme}://{host}/"),
    };
    let base = Url::parse(&base).map_err(|err| {
        Error::new(ErrorKind::Corrupt)
            .with_message(format!("Invalid homeserver host '{host}'"))
            .with_source(err)
    })?;
    Ok(Endpoint {
        base,
        pubky_host: Some(*key),
    })
}

fn pick_service(packet: &SignedPacket, name: &str) -> Option<SVCB<'static>> {
    let mut services: Vec<SVCB<'static>> = packet
        .resource_records(name)
        .into_iter()
        .filter_map(|record| match record.rdata {
            RData::SVCB(svcb) => Some(svcb),
            RData::HTTPS(https) => Some(https.0),
            _ => None,
        })
        .collect();
    // AliasMode (priority 0) sorts after every ServiceMode record.
    services.sort_by_key(|svcb| match svcb.priority {
        0 => u32::from(u16::MAX) + 1,
        priority => u32::from(priority),
    });
    services.into_iter().next()
}

fn display_target(svcb: &SVCB<'_>) -> String {
    svcb.target.to_string()
}

fn service_port(svcb: &SVCB<'_>) -> Option<u16> {
    match svcb.get_param(SVCB::PORT) {
        Some(&[high, low]) => Some(u16::from_be_bytes([high, low])),
        _ => None,
    }
}

fn apex_address(packet: &SignedPacket) -> Option<IpAddr> {
    packet
        .resource_records("@")
        .into_iter()
        .find_map(|record| match record.rdata {
            RData::A(a) => Some(IpAddr::V4(Ipv4Addr::from(a.address))),
            RData::AAAA(aaaa) => Some(IpAddr::V6(Ipv6Addr::from(aaaa.address))),
            _ => None,
        })
}

fn host_text(address: IpAddr) -> String {
    match address {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    }
}

fn is_loopback(address: IpAddr) -> bool {
    address.is_loopback()
}

#[cfg(test)]
mod tests {
    use super::{Target, homeserver_target, parse_target, resolve_endpoint};
    use crate::core::error::{Error, ErrorKind};
    use crate::core::keys::{Keypair, PublicKey};
    use crate::core::signed_packet::SignedPacket;
    use std::collections::HashMap;
    use std::net::{IpAddr, Ipv4Addr};

    fn keypair(seed: u8) -> Keypair {
        Keypair::from_secret_key(&[seed; 32])
    }

    fn lookup(
        packets: &HashMap<PublicKey, SignedPacket>,
    ) -> impl FnMut(&PublicKey) -> Result<Option<SignedPacket>, Error> + '_ {
        move |key| Ok(packets.get(key).cloned())
    }

    #[test]
    fn parses_pubky_url_forms() {
        let key = keypair(1).public_key();
        for input in [
            format!("pubky://{key}/pub/app/file?x=1"),
            format!("pubky:{key}/pub/app/file?x=1"),
            format!("https://_pubky.{key}/pub/app/file?x=1"),
        ] {
            let target = parse_target(&input).expect("parse");
            assert_eq!(
                target,
                Target::Pubky {
                    key,
                    path: "/pub/app/file?x=1".to_string()
                }
            );
        }

        let bare = parse_target(&format!("pubky://{key}")).expect("bare");
        assert!(matches!(bare, Target::Pubky { path, .. } if path == "/"));
    }

    #[test]
    fn plain_urls_pass_through() {
        let target = parse_target("https://example.com/a").expect("https");
        assert!(matches!(target, Target::Http(url) if url.as_str() == "https://example.com/a"));
    }

    #[test]
    fn invalid_urls_are_usage_errors() {
        for input in ["invalid_url", "ftp://example.com/x", "pubky://short/pub"] {
            let err = parse_target(input).expect_err(input);
            assert_eq!(err.kind(), ErrorKind::Usage);
            assert_eq!(err.message(), Some("Failed to parse URL"));
        }
    }

    #[test]
    fn resolves_user_through_homeserver_key() {
        let user = keypair(1);
        let server = keypair(2);
        let mut packets = HashMap::new();
        packets.insert(
            server.public_key(),
            SignedPacket::builder(&server)
                .https(".", ".", 3600, Some(6286), &[])
                .address(".", IpAddr::V4(Ipv4Addr::LOCALHOST), 3600)
                .sign()
                .expect("server packet"),
        );
        let user_packet = SignedPacket::builder(&user)
            .svcb("_pubky", &server.public_key().to_z32(), 0, 3600)
            .sign()
            .expect("user packet");
        assert_eq!(
            homeserver_target(&user_packet),
            Some(server.public_key().to_z32())
        );
        packets.insert(user.public_key(), user_packet);

        let endpoint = resolve_endpoint(lookup(&packets), &user.public_key()).expect("endpoint");
        assert_eq!(endpoint.base.as_str(), "http://127.0.0.1:6286/");
        assert_eq!(endpoint.pubky_host, Some(user.public_key()));
        assert_eq!(
            endpoint.url("/pub/a?limit=1").expect("url").as_str(),
            "http://127.0.0.1:6286/pub/a?limit=1"
        );
    }

    #[test]
    fn domain_targets_use_https_and_priority_order() {
        let user = keypair(3);
        let mut packets = HashMap::new();
        packets.insert(
            user.public_key(),
            SignedPacket::builder(&user)
                .svcb("_pubky", "alias.example", 0, 3600)
                .svcb("_pubky", "second.example", 20, 3600)
                .svcb("_pubky", "first.example", 10, 3600)
                .sign()
                .expect("packet"),
        );
        let endpoint = resolve_endpoint(lookup(&packets), &user.public_key()).expect("endpoint");
        assert_eq!(endpoint.base.as_str(), "https://first.example/");
    }

    #[test]
    fn key_cycles_stop_after_max_hops() {
        let first = keypair(4);
        let second = keypair(5);
        let mut packets = HashMap::new();
        packets.insert(
            first.public_key(),
            SignedPacket::builder(&first)
                .svcb("_pubky", &second.public_key().to_z32(), 0, 3600)
                .sign()
                .expect("first"),
        );
        packets.insert(
            second.public_key(),
            SignedPacket::builder(&second)
                .svcb("_pubky", &first.public_key().to_z32(), 0, 3600)
                .sign()
                .expect("second"),
        );
        let err = resolve_endpoint(lookup(&packets), &first.public_key()).expect_err("cycle");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn missing_packet_is_not_found() {
        let packets = HashMap::new();
        let err =
            resolve_endpoint(lookup(&packets), &keypair(6).public_key()).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
