//! Purpose: PKARR HTTP relay transport (publish and resolve signed packets).
//! Exports: `RelayClient`.
//! Role: Fans requests out to every configured relay over a shared blocking agent.
//! Invariants: `PUT/GET {relay}/{z32}`; bodies are the packet without its public key.
//! Invariants: Publish succeeds if any relay accepts; resolve returns the most recent valid packet.
use super::http;
use crate::core::error::{Error, ErrorKind};
use crate::core::keys::PublicKey;
use crate::core::signed_packet::SignedPacket;
use crate::core::timestamp::Timestamp;
use url::Url;

const PAYLOAD_CONTENT_TYPE: &str = "application/pkarr.org/relays#payload";

#[derive(Clone)]
pub struct RelayClient {
    relays: Vec<Url>,
    agent: ureq::Agent,
}

impl RelayClient {
    pub fn new(relays: &[String], agent: ureq::Agent) -> Result<Self, Error> {
        let relays = relays
            .iter()
            .map(|relay| {
                Url::parse(relay).map_err(|err| {
                    Error::new(ErrorKind::Usage)
                        .with_message(format!("invalid relay url '{relay}'"))
                        .with_source(err)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { relays, agent })
    }

    pub fn relays(&self) -> &[Url] {
        &self.relays
    }

    pub fn publish(&self, packet: &SignedPacket) -> Result<(), Error> {
        if self.relays.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("no pkarr relays configured")
                .with_hint(format!("set {} or pass --relay", super::config::ENV_PKARR_RELAYS)));
        }
        let key = packet.public_key();
        let mut accepted = 0usize;
        let mut failure: Option<Error> = None;
        for relay in &self.relays {
            let url = packet_url(relay, &key);
            let request = self
                .agent
                .put(&url)
                .set("Content-Type", PAYLOAD_CONTENT_TYPE);
            match http::send(request, Some(packet.to_relay_payload())) {
                Ok(_) => {
                    tracing::debug!(%url, "relay accepted packet");
                    accepted += 1;
                }
                Err(err) => {
                    tracing::debug!(%url, error = %err, "relay rejected packet");
                    let err = annotate_publish_error(err);
                    // Prefer a relay's verdict over a transport failure.
                    let replace = match &failure {
                        None => true,
                        Some(previous) => previous.status().is_none() && err.status().is_some(),
                    };
                    if replace {
                        failure = Some(err);
                    }
                }
            }
        }
        if accepted > 0 {
            tracing::info!(public_key = %key, accepted, "published signed packet");
            return Ok(());
        }
        Err(failure.unwrap_or_else(|| {
            Error::new(ErrorKind::Io).with_message("no relay accepted the packet")
        }))
    }

    /// Queries every relay; unreachable relays and invalid answers are skipped.
    pub fn resolve(&self, key: &PublicKey) -> Result<Option<SignedPacket>, Error> {
        let mut best: Option<SignedPacket> = None;
        for relay in &self.relays {
            let url = packet_url(relay, key);
            let response = match http::send(self.agent.get(&url), None) {
                Ok(response) => response,
                Err(err) => {
                    tracing::debug!(%url, error = %err, "relay lookup skipped");
                    continue;
                }
            };
            let payload = match http::read_body(response) {
                Ok(payload) => payload,
                Err(err) => {
                    tracing::debug!(%url, error = %err, "relay body unreadable");
                    continue;
                }
            };
            match SignedPacket::from_relay_payload(key, &payload) {
                Ok(packet) => {
                    let newer = best
                        .as_ref()
                        .is_none_or(|current| packet.is_more_recent_than(current));
                    if newer {
                        best = Some(packet);
                    }
                }
                Err(err) => {
                    tracing::warn!(%url, error = %err, "relay returned an invalid packet");
                }
            }
        }
        Ok(best.map(|mut packet| {
            packet.set_last_seen(Timestamp::now());
            packet
        }))
    }
}

fn packet_url(relay: &Url, key: &PublicKey) -> String {
    format!("{}/{}", relay.as_str().trim_end_matches('/'), key.to_z32())
}

fn annotate_publish_error(err: Error) -> Error {
    match err.status() {
        Some(409) => err.with_hint("a more recent packet is already stored"),
        Some(428) => Error::new(ErrorKind::Usage)
            .with_message("packet is older than the one stored")
            .with_status(428)
            .with_url(err.url().unwrap_or_default()),
        _ => err,
    }
}

#[cfg(test)]
mod tests {
    use super::{RelayClient, annotate_publish_error, packet_url};
    use crate::api::http;
    use crate::core::error::{Error, ErrorKind};
    use crate::core::keys::Keypair;
    use std::time::Duration;
    use url::Url;

    #[test]
    fn packet_urls_ignore_trailing_slash() {
        let key = Keypair::from_secret_key(&[1u8; 32]).public_key();
        let relay = Url::parse("http://relay.test/").expect("url");
        assert_eq!(packet_url(&relay, &key), format!("http://relay.test/{key}"));
    }

    #[test]
    fn invalid_relay_url_is_usage() {
        let agent = http::agent(Duration::from_secs(1));
        let err = RelayClient::new(&["not a url".to_string()], agent)
            .err()
            .expect("invalid");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn publish_without_relays_fails() {
        let agent = http::agent(Duration::from_secs(1));
        let client = RelayClient::new(&[], agent).expect("client");
        let packet = crate::core::signed_packet::SignedPacket::builder(&Keypair::from_secret_key(
            &[1u8; 32],
        ))
        .txt("a", "b", 30)
        .sign()
        .expect("sign");
        let err = client.publish(&packet).expect_err("no relays");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn precondition_failures_read_as_stale_packets() {
        let err = Error::new(ErrorKind::Usage).with_status(428).with_url("http://r/x");
        let annotated = annotate_publish_error(err);
        assert_eq!(annotated.message(), Some("packet is older than the one stored"));
        assert_eq!(annotated.url(), Some("http://r/x"));

        let conflict = Error::new(ErrorKind::AlreadyExists).with_status(409);
        assert_eq!(
            annotate_publish_error(conflict).kind(),
            ErrorKind::AlreadyExists
        );
    }
}
