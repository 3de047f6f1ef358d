//! Integration tests for `fs/*` requests served from a workspace directory.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use acp_client::acp::schema::FileSystemCapability;
use acp_client::host::{PermissionPolicy, PolicyPermissions, WorkspaceFiles};
use acp_client::orchestrator::session_manager::{FileSystemHandler, SessionManager};

use super::test_helpers::{
    connected_manager, fast_options, started_session_with_files, MockAgent, RecordingEvents,
};

async fn workspace_session(root: &Path) -> (Arc<SessionManager>, MockAgent) {
    let files: Arc<dyn FileSystemHandler> = Arc::new(WorkspaceFiles::new(root));
    let mut options = fast_options();
    options.connection.client_capabilities.fs = FileSystemCapability {
        read_text_file: true,
        write_text_file: true,
    };
    started_session_with_files(
        options,
        Arc::new(PolicyPermissions::new(PermissionPolicy::Allow)),
        Some(files),
        Arc::new(RecordingEvents::default()),
    )
    .await
}

/// The agent can read a window of lines from a workspace file.
#[tokio::test]
async fn agent_reads_workspace_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().canonicalize().unwrap();
    std::fs::write(root.join("notes.txt"), "one\ntwo\nthree\nfour\n").unwrap();
    let (_manager, mut agent) = workspace_session(&root).await;

    agent
        .request(
            json!(1),
            "fs/read_text_file",
            json!({
                "sessionId": "s1",
                "path": root.join("notes.txt"),
                "line": 2,
                "limit": 2,
            }),
        )
        .await;
    let reply = agent.recv().await;

    assert_eq!(reply["id"], 1);
    assert_eq!(reply["result"]["content"], "two\nthree\n");
}

/// Writes land atomically in the workspace, creating parent directories.
#[tokio::test]
async fn agent_writes_workspace_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().canonicalize().unwrap();
    let (_manager, mut agent) = workspace_session(&root).await;
    let target = root.join("src").join("lib.rs");

    agent
        .request(
            json!(2),
            "fs/write_text_file",
            json!({ "sessionId": "s1", "path": target, "content": "pub fn hi() {}\n" }),
        )
        .await;
    let reply = agent.recv().await;

    assert_eq!(reply["id"], 2);
    assert!(reply.get("error").is_none(), "write succeeds: {reply}");
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "pub fn hi() {}\n");
}

/// Paths outside the workspace are refused with an error response.
#[tokio::test]
async fn reads_outside_workspace_are_refused() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().canonicalize().unwrap();
    let (_manager, mut agent) = workspace_session(&root).await;

    agent
        .request(
            json!(3),
            "fs/read_text_file",
            json!({ "sessionId": "s1", "path": "/etc/passwd" }),
        )
        .await;
    let reply = agent.recv().await;

    assert_eq!(reply["id"], 3);
    assert_eq!(reply["error"]["code"], -32603);
    assert!(reply["error"]["message"]
        .as_str()
        .unwrap()
        .contains("outside the workspace"));
}

/// Without a file handler the capability is not advertised and requests are
/// refused as unknown methods.
#[tokio::test]
async fn file_capability_is_withheld_without_handler() {
    let mut options = fast_options();
    options.connection.client_capabilities.fs = FileSystemCapability {
        read_text_file: true,
        write_text_file: true,
    };
    let (_manager, mut agent) = connected_manager(
        options,
        Arc::new(PolicyPermissions::new(PermissionPolicy::Allow)),
        None,
        Arc::new(RecordingEvents::default()),
        false,
    )
    .await;

    agent
        .request(
            json!(4),
            "fs/write_text_file",
            json!({ "sessionId": "s1", "path": "/tmp/x", "content": "" }),
        )
        .await;
    let reply = agent.recv().await;
    assert_eq!(reply["error"]["code"], -32601);
}
