//! Session-side domain models.

pub mod session;
pub mod tool_call;
pub mod turn;

pub use session::{Session, SessionStatus};
pub use tool_call::ToolCall;
pub use turn::{Turn, TurnMessage};
