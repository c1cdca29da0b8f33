//! Purpose: Pubky client SDK crate used by the `pubkycore` CLI, the C ABI and language bindings.
//! Exports: `core` (keys, packets, tokens), `api` (network client), `sdk` (binding facade),
//! `events` (listener and internal loop), `abi` (C entry points).
//! Role: One library with three surfaces: typed Rust (`api`), string vectors (`sdk`) and C (`abi`).
//! Invariants: The library never installs a tracing subscriber; binaries decide.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod abi;
pub mod api;
pub mod core;
pub mod events;
pub mod sdk;
