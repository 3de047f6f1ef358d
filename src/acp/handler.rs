//! Callback surface the connection dispatches agent traffic to.
//!
//! Implementations are passed to [`Connection::new`](crate::acp::connection::Connection::new)
//! as a trait object. Agent requests (`session/request_permission`,
//! `fs/*`) run on their own tasks, so a slow handler only delays its own
//! reply; `session/update` notifications are delivered synchronously from
//! the dispatch loop, in arrival order.

use std::future::Future;
use std::pin::Pin;

use crate::acp::message::RpcError;
use crate::acp::schema::{
    PermissionOutcome, ReadTextFileRequest, RequestPermissionRequest, SessionNotification,
    WriteTextFileRequest,
};
use crate::Result;

/// Boxed future returned by handler methods.
pub type HandlerFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Receives everything the agent sends that is not a response.
pub trait ClientHandler: Send + Sync {
    /// Decide on a tool-call permission request.
    ///
    /// Must resolve exactly once; return [`PermissionOutcome::Cancelled`]
    /// when the turn was cancelled while the request was outstanding.
    fn request_permission(
        &self,
        request: RequestPermissionRequest,
    ) -> HandlerFuture<'_, PermissionOutcome>;

    /// Serve `fs/read_text_file`. The returned string is the file content.
    ///
    /// The default refuses with `-32601`.
    fn read_text_file(&self, request: ReadTextFileRequest) -> HandlerFuture<'_, Result<String>> {
        let _ = request;
        Box::pin(async { Err(RpcError::method_not_found("fs/read_text_file").into()) })
    }

    /// Serve `fs/write_text_file`.
    ///
    /// The default refuses with `-32601`.
    fn write_text_file(&self, request: WriteTextFileRequest) -> HandlerFuture<'_, Result<()>> {
        let _ = request;
        Box::pin(async { Err(RpcError::method_not_found("fs/write_text_file").into()) })
    }

    /// One `session/update` notification.
    fn session_update(&self, notification: SessionNotification);

    /// A non-JSON line the agent printed on stdout.
    fn diagnostic(&self, line: &str) {
        let _ = line;
    }

    /// The agent went away without [`disconnect`](crate::acp::connection::Connection::disconnect)
    /// being called.
    fn disconnected(&self, reason: &str) {
        let _ = reason;
    }
}
