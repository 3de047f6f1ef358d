//! Unit tests for session, turn, and tool-call models.

use std::path::PathBuf;

use serde_json::json;

use acp_client::acp::schema::{
    AgentCapabilities, ContentBlock, PlanEntry, PlanEntryPriority, PlanEntryStatus,
    SessionModeState, StopReason, ToolCallContent, ToolCallStatus, ToolCallUpdate, ToolKind,
};
use acp_client::error_kind::{ClassifiedError, ErrorKind};
use acp_client::models::{Session, SessionStatus, ToolCall, Turn};

fn update(id: &str) -> ToolCallUpdate {
    ToolCallUpdate {
        tool_call_id: id.to_owned(),
        ..ToolCallUpdate::default()
    }
}

// ── SessionStatus ───────────────────────────────────────────────────────────

#[test]
fn status_transitions_follow_the_turn_cycle() {
    use SessionStatus::{Cancelled, Idle, Processing};

    assert!(Idle.can_transition_to(Processing));
    assert!(Processing.can_transition_to(Idle));
    assert!(Processing.can_transition_to(Cancelled));
    assert!(Cancelled.can_transition_to(Idle));

    assert!(!Idle.can_transition_to(Cancelled));
    assert!(!Cancelled.can_transition_to(Processing));
    assert!(!Idle.can_transition_to(Idle));
    assert_eq!(SessionStatus::default(), Idle);
}

// ── Session ─────────────────────────────────────────────────────────────────

#[test]
fn session_mode_switch_updates_both_fields() {
    let modes: SessionModeState = serde_json::from_value(json!({
        "currentModeId": "ask",
        "availableModes": [{ "id": "ask", "name": "Ask" }, { "id": "code", "name": "Code" }],
    }))
    .unwrap();
    let mut session = Session::new(
        "s1".into(),
        PathBuf::from("/work"),
        AgentCapabilities::default(),
        Some(modes),
        None,
    );
    assert_eq!(session.current_mode_id.as_deref(), Some("ask"));
    assert!(session.current_model_id.is_none());

    session.set_mode("code");
    assert_eq!(session.current_mode_id.as_deref(), Some("code"));
    assert_eq!(session.modes.as_ref().unwrap().current_mode_id, "code");

    session.set_model("big");
    assert_eq!(session.current_model_id.as_deref(), Some("big"));
    assert!(session.models.is_none());
}

// ── ToolCall ────────────────────────────────────────────────────────────────

#[test]
fn tool_call_updates_merge_and_append_content() {
    let mut first = update("t1");
    first.title = Some("Read file".into());
    first.kind = Some(ToolKind::Read);
    first.content = Some(vec![ToolCallContent::Content {
        content: ContentBlock::text("part 1"),
    }]);
    let mut call = ToolCall::from_update(first);
    assert_eq!(call.status, ToolCallStatus::Pending);
    assert!(!call.is_finished());

    let mut second = update("t1");
    second.status = Some(ToolCallStatus::Completed);
    second.content = Some(vec![ToolCallContent::Content {
        content: ContentBlock::text("part 2"),
    }]);
    second.raw_output = Some(json!({ "bytes": 12 }));
    call.apply(second);

    assert_eq!(call.title, "Read file", "absent fields keep their value");
    assert_eq!(call.kind, ToolKind::Read);
    assert_eq!(call.status, ToolCallStatus::Completed);
    assert_eq!(call.content.len(), 2);
    assert_eq!(call.raw_output, Some(json!({ "bytes": 12 })));
    assert!(call.is_finished());
}

#[test]
fn unknown_tool_kind_decodes_as_other() {
    let update: ToolCallUpdate =
        serde_json::from_value(json!({ "toolCallId": "t", "kind": "teleport" })).unwrap();
    assert_eq!(update.kind, Some(ToolKind::Other));
}

// ── Turn ────────────────────────────────────────────────────────────────────

#[test]
fn turn_accumulates_until_closed() {
    let mut turn = Turn::open("Hi");
    assert!(turn.is_open());
    assert!(!turn.has_agent_output());

    assert!(turn.append_assistant("Hel"));
    assert!(turn.append_assistant("lo"));
    assert!(turn.append_thought("think"));
    assert!(turn.append_thought("ing"));
    assert!(turn.upsert_tool_call(update("t1")));
    assert!(turn.upsert_tool_call(ToolCallUpdate {
        status: Some(ToolCallStatus::InProgress),
        ..update("t1")
    }));
    assert!(turn.upsert_tool_call(update("t2")));
    assert!(turn.has_agent_output());

    let message = turn.assistant_message.as_ref().unwrap();
    assert_eq!(message.content, "Hello");
    assert_eq!(turn.thoughts, vec!["think", "ing"]);
    assert!(message.is_streaming);
    assert_eq!(turn.tool_calls.len(), 2);
    assert_eq!(
        turn.tool_call("t1").unwrap().status,
        ToolCallStatus::InProgress
    );

    assert!(turn.close(Some(StopReason::EndTurn)));
    assert!(!turn.is_open());
    assert!(!turn.assistant_message.as_ref().unwrap().is_streaming);
    assert_eq!(turn.stop_reason, Some(StopReason::EndTurn));
    assert!(turn.end_time.unwrap() >= turn.start_time);
}

#[test]
fn closed_turn_rejects_mutation() {
    let mut turn = Turn::open("Hi");
    turn.append_assistant("done");
    turn.close(Some(StopReason::EndTurn));

    assert!(!turn.append_assistant(" more"));
    assert!(!turn.append_thought("late"));
    assert!(!turn.append_user("again"));
    assert!(!turn.upsert_tool_call(update("late")));
    assert!(!turn.replace_plan(Vec::new()));
    assert!(!turn.close(Some(StopReason::Cancelled)));
    assert!(!turn.fail(ClassifiedError::new(ErrorKind::Unknown, "x")));

    assert_eq!(turn.assistant_message.unwrap().content, "done");
    assert_eq!(turn.stop_reason, Some(StopReason::EndTurn));
}

#[test]
fn failed_turn_drops_partial_reply() {
    let mut turn = Turn::open("Hi");
    turn.append_assistant("half");

    assert!(turn.fail(ClassifiedError::new(ErrorKind::Timeout, "timed out")));
    assert!(turn.assistant_message.is_none());
    assert!(turn.stop_reason.is_none());
    let error = turn.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::Timeout);
    assert!(error.retryable);
}

#[test]
fn plan_is_replaced_wholesale() {
    let mut turn = Turn::open("plan it");
    let entry = |content: &str| PlanEntry {
        content: content.to_owned(),
        priority: PlanEntryPriority::High,
        status: PlanEntryStatus::Pending,
    };

    turn.replace_plan(vec![entry("a"), entry("b")]);
    turn.replace_plan(vec![entry("c")]);
    assert_eq!(turn.plan.as_ref().unwrap().len(), 1);
    assert_eq!(turn.plan.as_ref().unwrap()[0].content, "c");
}

#[test]
fn turn_ids_are_unique() {
    let a = Turn::open("x");
    let b = Turn::open("x");
    assert_ne!(a.id, b.id);
    assert_ne!(a.user_message.id, b.user_message.id);
}
