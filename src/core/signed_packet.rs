//! Purpose: PKARR signed DNS packets, the unit published to and resolved from relays.
//! Exports: `SignedPacket`, `SignedPacketBuilder`, `MAX_DNS_PACKET_LEN`.
//! Role: Owns the wire layout and signature checks; transport lives in `api::relay`.
//! Invariants: Layout is `public_key(32) || signature(64) || timestamp(8, BE micros) || dns`.
//! Invariants: The signature covers the BEP44 form `3:seqi<ts>e1:v<len>:<dns>`.
//! Invariants: A `SignedPacket` value always holds a verified signature and a parseable packet.
use crate::core::error::{Error, ErrorKind};
use crate::core::keys::{Keypair, PUBLIC_KEY_LEN, PublicKey, SIGNATURE_LEN};
use crate::core::timestamp::Timestamp;
use simple_dns::rdata::{A, AAAA, HTTPS, RData, SVCB, TXT};
use simple_dns::{CLASS, CharacterString, Name, Packet, ResourceRecord};
use std::fmt;
use std::net::IpAddr;

pub const MAX_DNS_PACKET_LEN: usize = 1000;
pub const MIN_TTL: u32 = 300;
pub const MAX_TTL: u32 = 24 * 60 * 60;

const TIMESTAMP_OFFSET: usize = PUBLIC_KEY_LEN + SIGNATURE_LEN;
const HEADER_LEN: usize = TIMESTAMP_OFFSET + 8;

#[derive(Clone)]
pub struct SignedPacket {
    public_key: PublicKey,
    bytes: Vec<u8>,
    last_seen: Timestamp,
}

impl SignedPacket {
    pub fn builder(keypair: &Keypair) -> SignedPacketBuilder<'_> {
        SignedPacketBuilder {
            keypair,
            records: Vec::new(),
            timestamp: None,
            error: None,
        }
    }

    /// Parses and verifies a full packet (`public_key || signature || timestamp || dns`).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::new(ErrorKind::Corrupt).with_message(format!(
                "signed packet too small: {} bytes",
                bytes.len()
            )));
        }
        if bytes.len() > HEADER_LEN + MAX_DNS_PACKET_LEN {
            return Err(Error::new(ErrorKind::Corrupt).with_message(format!(
                "signed packet too large: {} bytes",
                bytes.len()
            )));
        }
        let public_key = PublicKey::from_slice(&bytes[..PUBLIC_KEY_LEN]).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message(format!("invalid packet public key: {}", err.detail()))
        })?;
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&bytes[PUBLIC_KEY_LEN..TIMESTAMP_OFFSET]);
        let timestamp = Timestamp::from_bytes(&bytes[TIMESTAMP_OFFSET..HEADER_LEN])?;
        let encoded = &bytes[HEADER_LEN..];

        public_key.verify(&signable(timestamp, encoded), &signature)?;
        Packet::parse(encoded).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("invalid dns packet")
                .with_source(err)
        })?;

        Ok(Self {
            public_key,
            bytes: bytes.to_vec(),
            last_seen: Timestamp::now(),
        })
    }

    /// Relays store and serve the packet without its leading public key.
    pub fn from_relay_payload(public_key: &PublicKey, payload: &[u8]) -> Result<Self, Error> {
        let mut bytes = Vec::with_capacity(PUBLIC_KEY_LEN + payload.len());
        bytes.extend_from_slice(public_key.as_bytes());
        bytes.extend_from_slice(payload);
        Self::from_bytes(&bytes)
    }

    pub fn to_relay_payload(&self) -> &[u8] {
        &self.bytes[PUBLIC_KEY_LEN..]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn encode_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn signature(&self) -> &[u8] {
        &self.bytes[PUBLIC_KEY_LEN..TIMESTAMP_OFFSET]
    }

    pub fn timestamp(&self) -> Timestamp {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.bytes[TIMESTAMP_OFFSET..HEADER_LEN]);
        Timestamp::from_micros(u64::from_be_bytes(raw))
    }

    pub fn encoded_packet(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..]
    }

    pub fn last_seen(&self) -> Timestamp {
        self.last_seen
    }

    pub fn set_last_seen(&mut self, last_seen: Timestamp) {
        self.last_seen = last_seen;
    }

    pub fn all_resource_records(&self) -> Vec<ResourceRecord<'static>> {
        match Packet::parse(self.encoded_packet()) {
            Ok(packet) => packet
                .answers
                .into_iter()
                .map(|record| record.into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Records whose owner matches `name`, given relative to the signer
    /// (`"_pubky"`, `"@"`) or fully qualified.
    pub fn resource_records(&self, name: &str) -> Vec<ResourceRecord<'static>> {
        let wanted = normalize_name(name, &self.public_key().to_z32());
        self.all_resource_records()
            .into_iter()
            .filter(|record| record.name.to_string() == wanted)
            .collect()
    }

    pub fn min_ttl(&self) -> u32 {
        self.all_resource_records()
            .iter()
            .map(|record| record.ttl)
            .min()
            .map_or(MIN_TTL, |ttl| ttl.clamp(MIN_TTL, MAX_TTL))
    }

    pub fn is_more_recent_than(&self, other: &SignedPacket) -> bool {
        if self.timestamp() == other.timestamp() {
            return self.encoded_packet() > other.encoded_packet();
        }
        self.timestamp() > other.timestamp()
    }

    /// Whether the packet is still inside its TTL window, measured from `last_seen`.
    pub fn is_fresh(&self) -> bool {
        let ttl_micros = u64::from(self.min_ttl()) * 1_000_000;
        self.last_seen.as_u64().saturating_add(ttl_micros) > Timestamp::now().as_u64()
    }
}

impl fmt::Debug for SignedPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedPacket")
            .field("public_key", &self.public_key())
            .field("timestamp", &self.timestamp())
            .field("last_seen", &self.last_seen)
            .field("records", &self.all_resource_records().len())
            .finish()
    }
}

impl PartialEq for SignedPacket {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for SignedPacket {}

fn signable(timestamp: Timestamp, encoded: &[u8]) -> Vec<u8> {
    let mut out = format!("3:seqi{}e1:v{}:", timestamp.as_u64(), encoded.len()).into_bytes();
    out.extend_from_slice(encoded);
    out
}

/// Makes `name` absolute under `origin`: `@`, `.` and the empty name mean the apex.
pub(crate) fn normalize_name(name: &str, origin: &str) -> String {
    let trimmed = name.trim_end_matches('.');
    if trimmed.is_empty() || trimmed == "@" {
        return origin.to_string();
    }
    if trimmed == origin || trimmed.ends_with(&format!(".{origin}")) {
        return trimmed.to_string();
    }
    format!("{trimmed}.{origin}")
}

/// Collects records for one signer. The first invalid input is kept and
/// reported by `sign`, so calls chain without intermediate `?`.
pub struct SignedPacketBuilder<'k> {
    keypair: &'k Keypair,
    records: Vec<ResourceRecord<'static>>,
    timestamp: Option<Timestamp>,
    error: Option<Error>,
}

impl SignedPacketBuilder<'_> {
    /// Adds a prepared record. Its name is normalised relative to the signer.
    pub fn record(mut self, record: ResourceRecord<'_>) -> Self {
        let name = record.name.to_string();
        let rdata = record.rdata.into_owned();
        self.push(&name, record.ttl, move || Ok(rdata));
        self
    }

    pub fn txt(mut self, name: &str, value: &str, ttl: u32) -> Self {
        self.push(name, ttl, || {
            let txt = TXT::try_from(value).map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message("Failed to convert string to TXT record")
                    .with_source(err)
            })?;
            Ok(RData::TXT(txt.into_owned()))
        });
        self
    }

    pub fn https(
        mut self,
        name: &str,
        target: &str,
        ttl: u32,
        port: Option<u16>,
        alpn: &[&str],
    ) -> Self {
        self.push(name, ttl, || {
            let svcb = service_binding(0, target, port, alpn)?;
            Ok(RData::HTTPS(HTTPS(svcb)))
        });
        self
    }

    pub fn svcb(mut self, name: &str, target: &str, priority: u16, ttl: u32) -> Self {
        self.push(name, ttl, || {
            let svcb = service_binding(priority, target, None, &[])?;
            Ok(RData::SVCB(svcb))
        });
        self
    }

    pub fn address(mut self, name: &str, address: IpAddr, ttl: u32) -> Self {
        self.push(name, ttl, || {
            Ok(match address {
                IpAddr::V4(v4) => RData::A(A {
                    address: u32::from(v4),
                }),
                IpAddr::V6(v6) => RData::AAAA(AAAA {
                    address: u128::from(v6),
                }),
            })
        });
        self
    }

    pub fn cname(mut self, name: &str, target: &str, ttl: u32) -> Self {
        self.push(name, ttl, || {
            Ok(RData::CNAME(simple_dns::rdata::CNAME(
                dns_name(target)?.into_owned(),
            )))
        });
        self
    }

    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn sign(self) -> Result<SignedPacket, Error> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let mut packet = Packet::new_reply(0);
        packet.answers = self.records;
        let encoded = packet.build_bytes_vec_compressed().map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("Failed to create signed packet")
                .with_source(err)
        })?;
        if encoded.len() > MAX_DNS_PACKET_LEN {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "dns packet is {} bytes, limit is {MAX_DNS_PACKET_LEN}",
                encoded.len()
            )));
        }

        let timestamp = self.timestamp.unwrap_or_else(Timestamp::now);
        let signature = self.keypair.sign(&signable(timestamp, &encoded));

        let mut bytes = Vec::with_capacity(HEADER_LEN + encoded.len());
        bytes.extend_from_slice(self.keypair.public_key().as_bytes());
        bytes.extend_from_slice(&signature);
        bytes.extend_from_slice(&timestamp.to_bytes());
        bytes.extend_from_slice(&encoded);
        Ok(SignedPacket {
            public_key: self.keypair.public_key(),
            bytes,
            last_seen: Timestamp::now(),
        })
    }

    fn push<F>(&mut self, name: &str, ttl: u32, rdata: F)
    where
        F: FnOnce() -> Result<RData<'static>, Error>,
    {
        if self.error.is_some() {
            return;
        }
        let origin = self.keypair.public_key().to_z32();
        let full_name = normalize_name(name, &origin);
        let built = dns_name(&full_name)
            .map(|owner| owner.into_owned())
            .and_then(|owner| Ok((owner, rdata()?)));
        match built {
            Ok((owner, rdata)) => self
                .records
                .push(ResourceRecord::new(owner, CLASS::IN, ttl, rdata)),
            Err(err) => self.error = Some(err),
        }
    }
}

fn dns_name(name: &str) -> Result<Name<'_>, Error> {
    Name::new(name.trim_end_matches('.')).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message(format!("Invalid DNS name: {name}"))
            .with_source(err)
    })
}

fn service_binding(
    priority: u16,
    target: &str,
    port: Option<u16>,
    alpn: &[&str],
) -> Result<SVCB<'static>, Error> {
    let mut svcb = SVCB::new(priority, dns_name(target)?);
    if let Some(port) = port {
        svcb.set_port(port);
    }
    if !alpn.is_empty() {
        let ids = alpn
            .iter()
            .map(|id| CharacterString::try_from(*id))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| {
                Error::new(ErrorKind::Usage)
                    .with_message("Invalid ALPN id")
                    .with_source(err)
            })?;
        svcb.set_alpn(ids).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("Invalid ALPN id")
                .with_source(err)
        })?;
    }
    Ok(svcb.into_owned())
}
