//! Purpose: Ed25519 identities as used across Pubky (keypairs and z-base-32 public keys).
//! Exports: `Keypair`, `PublicKey`, `keypair_from_secret_hex`, `secret_hex`.
//! Invariants: Public key text form is exactly 52 z-base-32 chars; secrets travel as 64 hex chars.
//! Invariants: Key bytes are validated as curve points on parse, never lazily.
use crate::core::error::{Error, ErrorKind};
use crate::core::zbase32;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const PUBLIC_KEY_LEN: usize = 32;
pub const SIGNATURE_LEN: usize = 64;
const PUBLIC_KEY_Z32_LEN: usize = 52;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LEN]) -> Result<Self, Error> {
        VerifyingKey::from_bytes(bytes).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message("Invalid public key")
                .with_source(err)
        })?;
        Ok(Self(*bytes))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        let array: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("Invalid public key length {}", bytes.len()))
        })?;
        Self::from_bytes(&array)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn to_z32(&self) -> String {
        zbase32::encode(&self.0)
    }

    pub fn to_uri_string(&self) -> String {
        format!("pubky://{}", self.to_z32())
    }

    pub fn verify(&self, message: &[u8], signature: &[u8; SIGNATURE_LEN]) -> Result<(), Error> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("invalid public key")
                .with_source(err)
        })?;
        key.verify(message, &Signature::from_bytes(signature))
            .map_err(|err| {
                Error::new(ErrorKind::Corrupt)
                    .with_message("invalid signature")
                    .with_source(err)
            })
    }
}

impl FromStr for PublicKey {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let raw = trimmed
            .strip_prefix("pubky://")
            .or_else(|| trimmed.strip_prefix("pk:"))
            .unwrap_or(trimmed)
            .trim_end_matches('/');
        if raw.len() != PUBLIC_KEY_Z32_LEN {
            return Err(Error::new(ErrorKind::Usage).with_message(format!(
                "Invalid public key: expected {PUBLIC_KEY_Z32_LEN} z-base-32 chars, got {}",
                raw.len()
            )));
        }
        let bytes = zbase32::decode(raw).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("Invalid public key: {}", err.detail()))
        })?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = <[u8; PUBLIC_KEY_LEN]>::deserialize(deserializer)?;
        Self::from_bytes(&bytes).map_err(D::Error::custom)
    }
}

impl TryFrom<&str> for PublicKey {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_z32())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_z32())
    }
}

#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    pub fn random() -> Result<Self, Error> {
        let mut secret = [0u8; 32];
        fill_random(&mut secret)?;
        Ok(Self::from_secret_key(&secret))
    }

    pub fn from_secret_key(secret: &[u8; 32]) -> Self {
        Self {
            signing: SigningKey::from_bytes(secret),
        }
    }

    pub fn secret_key(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.signing.sign(message).to_bytes()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

pub(crate) fn fill_random(buf: &mut [u8]) -> Result<(), Error> {
    getrandom::fill(buf).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("os random source unavailable")
            .with_source(err)
    })
}

pub fn keypair_from_secret_hex(secret_key: &str) -> Result<Keypair, Error> {
    let bytes = hex::decode(secret_key).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("Failed to decode secret key")
            .with_source(err)
    })?;
    let secret: [u8; 32] = bytes.try_into().map_err(|_| {
        Error::new(ErrorKind::Usage).with_message("Failed to convert secret key to 32-byte array")
    })?;
    Ok(Keypair::from_secret_key(&secret))
}

pub fn secret_hex(keypair: &Keypair) -> String {
    hex::encode(keypair.secret_key())
}
