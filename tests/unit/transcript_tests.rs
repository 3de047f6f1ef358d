//! Unit tests for Markdown and JSON transcript rendering.

use std::path::PathBuf;

use serde_json::json;

use acp_client::acp::schema::{
    AgentCapabilities, ContentBlock, PlanEntry, PlanEntryPriority, PlanEntryStatus, StopReason,
    ToolCallContent, ToolCallStatus, ToolCallUpdate, ToolKind,
};
use acp_client::error_kind::{ClassifiedError, ErrorKind};
use acp_client::models::{Session, Turn};
use acp_client::orchestrator::transcript::{to_json, to_markdown};

fn session() -> Session {
    let mut session = Session::new(
        "sess-42".into(),
        PathBuf::from("/work/repo"),
        AgentCapabilities::default(),
        None,
        None,
    );
    session.set_mode("code");
    session
}

fn finished_turn() -> Turn {
    let mut turn = Turn::open("Fix the typo");
    turn.append_thought("Look at README first.\nThen fix it.");
    turn.upsert_tool_call(ToolCallUpdate {
        tool_call_id: "edit-1".into(),
        title: Some("Edit README.md".into()),
        kind: Some(ToolKind::Edit),
        status: Some(ToolCallStatus::Completed),
        content: Some(vec![ToolCallContent::Diff {
            path: PathBuf::from("/work/repo/README.md"),
            old_text: Some("teh\n".into()),
            new_text: "the\n".into(),
        }]),
        ..ToolCallUpdate::default()
    });
    turn.replace_plan(vec![
        PlanEntry {
            content: "Find typo".into(),
            priority: PlanEntryPriority::High,
            status: PlanEntryStatus::Completed,
        },
        PlanEntry {
            content: "Fix typo".into(),
            priority: PlanEntryPriority::Medium,
            status: PlanEntryStatus::InProgress,
        },
    ]);
    turn.append_assistant("Fixed.");
    turn.close(Some(StopReason::EndTurn));
    turn
}

#[test]
fn markdown_has_header_and_turn_sections() {
    let markdown = to_markdown(Some(&session()), &[finished_turn()]);

    assert!(markdown.starts_with("# Session sess-42\n"));
    assert!(markdown.contains("- Working directory: `/work/repo`"));
    assert!(markdown.contains("- Mode: `code`"));
    assert!(markdown.contains("## Turn 1"));
    assert!(markdown.contains("**User:**\n\nFix the typo"));
    assert!(markdown.contains("> Look at README first.\n> Then fix it."));
    assert!(markdown.contains("- Edit README.md (`edit`, completed)"));
    assert!(markdown.contains("- [x] Find typo"));
    assert!(markdown.contains("- [~] Fix typo"));
    assert!(markdown.contains("**Assistant:**\n\nFixed."));
    assert!(markdown.contains("_Stop reason: end_turn_"));
}

#[test]
fn markdown_renders_diffs_as_unified_patches() {
    let markdown = to_markdown(Some(&session()), &[finished_turn()]);
    assert!(markdown.contains("```diff"));
    assert!(markdown.contains("-teh"));
    assert!(markdown.contains("+the"));
}

#[test]
fn markdown_reports_failures_and_open_turns() {
    let mut failed = Turn::open("Do it");
    failed.fail(ClassifiedError::new(
        ErrorKind::AuthenticationFailed,
        "rpc error -32000: Authentication required",
    ));
    let open = Turn::open("Still going");

    let markdown = to_markdown(None, &[failed, open]);
    assert!(markdown.starts_with("# Session\n"));
    assert!(markdown.contains(
        "_Error (Authentication failed): rpc error -32000: Authentication required_"
    ));
    assert!(markdown.contains("## Turn 2"));
    assert!(markdown.contains("_In progress_"));
}

#[test]
fn tool_call_without_title_uses_its_id() {
    let mut turn = Turn::open("x");
    turn.upsert_tool_call(ToolCallUpdate {
        tool_call_id: "call-7".into(),
        content: Some(vec![ToolCallContent::Content {
            content: ContentBlock::text("output line"),
        }]),
        ..ToolCallUpdate::default()
    });
    let markdown = to_markdown(None, &[turn]);
    assert!(markdown.contains("- call-7 (`other`, pending)"));
    assert!(markdown.contains("  > output line"));
}

#[test]
fn rendering_is_deterministic() {
    let session = session();
    let turns = vec![finished_turn()];
    assert_eq!(
        to_markdown(Some(&session), &turns),
        to_markdown(Some(&session), &turns)
    );
    assert_eq!(to_json(Some(&session), &turns), to_json(Some(&session), &turns));
}

#[test]
fn json_transcript_uses_wire_names() {
    let value = to_json(Some(&session()), &[finished_turn()]);

    assert_eq!(value["session"]["sessionId"], "sess-42");
    assert_eq!(value["session"]["currentModeId"], "code");
    let turn = &value["turns"][0];
    assert_eq!(turn["userMessage"]["content"], "Fix the typo");
    assert_eq!(turn["assistantMessage"]["isStreaming"], false);
    assert_eq!(turn["stopReason"], "end_turn");
    assert_eq!(turn["toolCalls"][0]["kind"], "edit");
    assert_eq!(turn["toolCalls"][0]["content"][0]["type"], "diff");
    assert_eq!(turn["plan"][1]["status"], "in_progress");
    assert!(turn.get("error").is_none());

    let empty = to_json(None, &[]);
    assert_eq!(empty, json!({ "session": null, "turns": [] }));
}
