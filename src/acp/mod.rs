//! Agent Client Protocol (ACP) plumbing.
//!
//! Layers, leaves first:
//!
//! - [`codec`], [`message`], [`schema`]: NDJSON framing, the JSON-RPC
//!   envelope, and the typed ACP payloads.
//! - [`spawner`], [`reader`], [`writer`], [`transport`]: the agent process
//!   and the tasks moving bytes to and from it.
//! - [`registry`]: id allocation, settlement, and request timeouts.
//! - [`handshake`], [`handler`], [`connection`]: the protocol connection
//!   and the callback surface it dispatches agent traffic to.

pub mod codec;
pub mod connection;
pub mod handler;
pub mod handshake;
pub mod message;
pub mod reader;
pub mod registry;
pub mod schema;
pub mod spawner;
pub mod transport;
pub mod writer;
