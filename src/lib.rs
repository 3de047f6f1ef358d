#![forbid(unsafe_code)]

//! Client side of the Agent Client Protocol (ACP).
//!
//! Spawns a coding agent as a subprocess, speaks JSON-RPC 2.0 over its
//! stdio, and turns the protocol traffic into sessions, turns, and
//! streamed messages a host application can render.

pub mod acp;
pub mod config;
pub mod error_kind;
pub mod errors;
pub mod host;
pub mod models;
pub mod orchestrator;

pub use config::ClientConfig;
pub use errors::{AppError, Result};
