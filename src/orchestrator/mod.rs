//! Session orchestration.
//!
//! Covers the session state machine, coalescing of streamed message
//! chunks, and transcript rendering.

pub mod session_manager;
pub mod stream_buffer;
pub mod transcript;
