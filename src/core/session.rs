//! Purpose: Session descriptors returned by homeservers on signup, signin and session lookup.
//! Exports: `SessionInfo`.
//! Invariants: Postcard layout is `version || pubky(32) || created_at || name || user_agent || [caps]`.
//! Invariants: Only version 0 is understood; anything else is `Corrupt`.
use crate::core::capabilities::{Capabilities, Capability};
use crate::core::error::{Error, ErrorKind};
use crate::core::keys::PublicKey;
use crate::core::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

const CURRENT_VERSION: usize = 0;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    version: usize,
    pub pubky: PublicKey,
    pub created_at: u64,
    /// Display name chosen at signin; defaults to the user agent.
    pub name: String,
    pub user_agent: String,
    pub capabilities: Vec<Capability>,
}

impl SessionInfo {
    pub fn new(pubky: PublicKey, capabilities: Capabilities, user_agent: Option<String>) -> Self {
        let user_agent = user_agent.unwrap_or_default();
        Self {
            version: CURRENT_VERSION,
            pubky,
            created_at: Timestamp::now().as_u64(),
            name: user_agent.clone(),
            user_agent,
            capabilities: capabilities.0,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        postcard::to_stdvec(self).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode session")
                .with_source(err)
        })
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        match bytes.first() {
            None => {
                return Err(Error::new(ErrorKind::Corrupt).with_message("empty session payload"));
            }
            Some(&version) if usize::from(version) > CURRENT_VERSION => {
                return Err(Error::new(ErrorKind::Corrupt)
                    .with_message(format!("unknown session version {version}")));
            }
            Some(_) => {}
        }
        postcard::from_bytes(bytes).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("invalid session payload")
                .with_source(err)
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "pubky": self.pubky.to_string(),
            "capabilities": self
                .capabilities
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
        })
    }

    pub fn to_json_with_secret(&self, session_secret: &str) -> Value {
        let mut value = self.to_json();
        value["session_secret"] = json!(session_secret);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::SessionInfo;
    use crate::core::capabilities::Capabilities;
    use crate::core::error::ErrorKind;
    use crate::core::keys::Keypair;

    // Zero secret key, created_at 0, empty name, user agent "foo", root capability.
    const HOMESERVER_SESSION: [u8; 45] = [
        0, 59, 106, 39, 188, 206, 182, 164, 45, 98, 163, 168, 208, 42, 111, 13, 115, 101, 50, 21,
        119, 29, 226, 67, 166, 58, 192, 72, 161, 139, 89, 218, 41, 0, 0, 3, 102, 111, 111, 1, 4,
        47, 58, 114, 119,
    ];

    fn session() -> SessionInfo {
        let pubky = Keypair::from_secret_key(&[2u8; 32]).public_key();
        SessionInfo::new(pubky, Capabilities::root(), Some("pubkycore-test".into()))
    }

    #[test]
    fn decodes_homeserver_session_bytes() {
        let decoded = SessionInfo::deserialize(&HOMESERVER_SESSION).expect("decode");
        assert_eq!(decoded.pubky, Keypair::from_secret_key(&[0u8; 32]).public_key());
        assert_eq!(decoded.created_at, 0);
        assert_eq!(decoded.name, "");
        assert_eq!(decoded.user_agent, "foo");
        assert_eq!(decoded.to_json()["capabilities"], serde_json::json!(["/:rw"]));
        assert_eq!(decoded.serialize().expect("encode"), HOMESERVER_SESSION);
    }

    #[test]
    fn serialized_session_is_readable() {
        let session = session();
        let bytes = session.serialize().expect("encode");
        assert_eq!(bytes[0], 0);
        let decoded = SessionInfo::deserialize(&bytes).expect("decode");
        assert_eq!(decoded, session);
        assert_eq!(decoded.name, "pubkycore-test");
    }

    #[test]
    fn truncated_or_unknown_sessions_are_corrupt() {
        let bytes = session().serialize().expect("encode");
        for cut in [0, 10, 33, bytes.len() - 1] {
            let err = SessionInfo::deserialize(&bytes[..cut]).expect_err("truncated");
            assert_eq!(err.kind(), ErrorKind::Corrupt);
        }
        let mut future = bytes.clone();
        future[0] = 1;
        let err = SessionInfo::deserialize(&future).expect_err("version");
        assert_eq!(err.message(), Some("unknown session version 1"));
    }

    #[test]
    fn json_views() {
        let session = session();
        let value = session.to_json();
        assert_eq!(value["pubky"], session.pubky.to_string());
        assert_eq!(value["capabilities"], serde_json::json!(["/:rw"]));
        assert!(value.get("session_secret").is_none());

        let with_secret = session.to_json_with_secret("s3cr3t");
        assert_eq!(with_secret["session_secret"], "s3cr3t");
    }
}
