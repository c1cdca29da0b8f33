// Core modules: identities, wire formats, crypto and error modeling. No network access.
pub mod auth_token;
pub mod capabilities;
pub mod crypto;
pub mod dns_json;
pub mod error;
pub mod keys;
pub mod mnemonic;
pub mod recovery;
pub mod session;
pub mod signed_packet;
pub mod timestamp;
pub mod zbase32;
