//! Purpose: Define the stable public Rust API boundary for pubkycore.
//! Exports: Core protocol types plus the blocking network client.
//! Role: Public, additive-only surface used by the SDK facade, the C ABI and the CLI.
//! Invariants: Transport plumbing (`http`, `relay`, `cache`) stays private to this module.
//! Invariants: Every fallible operation returns `crate::core::error::Error`.

mod auth_url;
mod cache;
mod client;
mod config;
mod endpoint;
pub(crate) mod http;
mod relay;

pub use crate::core::auth_token::AuthToken;
pub use crate::core::capabilities::{Action, Capabilities, Capability};
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::keys::{Keypair, PublicKey};
pub use crate::core::session::SessionInfo;
pub use crate::core::signed_packet::{SignedPacket, SignedPacketBuilder};
pub use crate::core::timestamp::Timestamp;
pub use auth_url::{
    AuthCapability, PubkyAuthDetails, parse_pubky_auth_url, pubky_auth_details_to_json,
};
pub use cache::PacketCache;
pub use client::{
    HOMESERVER_RECORD_TTL, ListOptions, PubkyClient, PubkyClientBuilder, REPUBLISH_AFTER,
};
pub use config::{
    DEFAULT_CACHE_SIZE, DEFAULT_REQUEST_TIMEOUT, ENV_HTTP_RELAY, ENV_PKARR_RELAYS, NetworkConfig,
};
pub use endpoint::{Endpoint, MAX_HOPS, Target, homeserver_target, parse_target, resolve_endpoint};
pub use relay::RelayClient;
