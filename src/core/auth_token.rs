//! Purpose: Signed, short-lived proofs that a key grants a set of capabilities.
//! Exports: `AuthToken`, `NAMESPACE`, `TIMESTAMP_WINDOW`.
//! Role: Sent to homeservers on signup/signin and to pubkyauth relays.
//! Invariants: Postcard layout is `sig(64) || "PUBKY:AUTH" || version(1) || ts(8 BE) || pubky(32) || caps`.
//! Invariants: The signature covers every byte from offset 65 (one byte into the namespace).
//! Invariants: Verification rejects timestamps more than `TIMESTAMP_WINDOW` away from now.
use crate::core::capabilities::Capabilities;
use crate::core::error::{Error, ErrorKind};
use crate::core::keys::{Keypair, PublicKey};
use crate::core::timestamp::Timestamp;
use ed25519_dalek::Signature;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const NAMESPACE: &[u8; 10] = b"PUBKY:AUTH";
pub const TIMESTAMP_WINDOW: Duration = Duration::from_secs(45);
const CURRENT_VERSION: u8 = 0;
const SIGNED_FROM: usize = 65;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    signature: Signature,
    namespace: [u8; 10],
    version: u8,
    timestamp: Timestamp,
    pubky: PublicKey,
    capabilities: Capabilities,
}

impl AuthToken {
    pub fn sign(keypair: &Keypair, capabilities: Capabilities) -> Result<Self, Error> {
        Self::sign_at(keypair, capabilities, Timestamp::now())
    }

    fn sign_at(
        keypair: &Keypair,
        capabilities: Capabilities,
        timestamp: Timestamp,
    ) -> Result<Self, Error> {
        let mut token = Self {
            signature: Signature::from_bytes(&[0; 64]),
            namespace: *NAMESPACE,
            version: CURRENT_VERSION,
            timestamp,
            pubky: keypair.public_key(),
            capabilities,
        };
        let serialized = token.serialize()?;
        token.signature = Signature::from_bytes(&keypair.sign(&serialized[SIGNED_FROM..]));
        Ok(token)
    }

    pub fn pubky(&self) -> PublicKey {
        self.pubky
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        postcard::to_stdvec(self).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode auth token")
                .with_source(err)
        })
    }

    /// Parses `bytes` and checks namespace, version, freshness and signature.
    pub fn verify(bytes: &[u8]) -> Result<Self, Error> {
        Self::verify_at(bytes, Timestamp::now())
    }

    fn verify_at(bytes: &[u8], now: Timestamp) -> Result<Self, Error> {
        let token: Self = postcard::from_bytes(bytes)
            .map_err(|err| denied(format!("malformed auth token: {err}")))?;
        if &token.namespace != NAMESPACE {
            return Err(denied("auth token namespace mismatch"));
        }
        if token.version != CURRENT_VERSION {
            return Err(denied(format!("unknown auth token version {}", token.version)));
        }
        let window = TIMESTAMP_WINDOW.as_micros() as u64;
        if token.timestamp > now && token.timestamp.abs_diff(now) > window {
            return Err(denied("auth token timestamp is too far in the future"));
        }
        if token.timestamp <= now && token.timestamp.abs_diff(now) > window {
            return Err(denied("auth token has expired"));
        }
        token
            .pubky
            .verify(&bytes[SIGNED_FROM..], &token.signature.to_bytes())
            .map_err(|_| denied("invalid auth token signature"))?;
        Ok(token)
    }
}

fn denied(message: impl Into<String>) -> Error {
    Error::new(ErrorKind::Permission).with_message(message)
}
