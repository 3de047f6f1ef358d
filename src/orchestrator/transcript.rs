//! Transcript rendering.
//!
//! Both renderings are pure functions of the recorded session and turns:
//! the same history always produces the same output.

use std::fmt::Write as _;

use serde_json::{json, Value};

use crate::acp::schema::{ContentBlock, PlanEntryStatus, ToolCallContent};
use crate::models::{Session, ToolCall, Turn};

/// Structured transcript: `{ "session": …, "turns": [ … ] }`.
#[must_use]
pub fn to_json(session: Option<&Session>, turns: &[Turn]) -> Value {
    json!({
        "session": session,
        "turns": turns,
    })
}

/// Human-readable Markdown transcript.
#[must_use]
pub fn to_markdown(session: Option<&Session>, turns: &[Turn]) -> String {
    let mut out = String::new();

    match session {
        Some(session) => {
            let _ = writeln!(out, "# Session {}\n", session.session_id);
            let _ = writeln!(
                out,
                "- Working directory: `{}`",
                session.working_dir.display()
            );
            if let Some(mode) = &session.current_mode_id {
                let _ = writeln!(out, "- Mode: `{mode}`");
            }
            if let Some(model) = &session.current_model_id {
                let _ = writeln!(out, "- Model: `{model}`");
            }
            out.push('\n');
        }
        None => out.push_str("# Session\n\n"),
    }

    for (index, turn) in turns.iter().enumerate() {
        render_turn(&mut out, index + 1, turn);
    }

    out
}

fn render_turn(out: &mut String, number: usize, turn: &Turn) {
    let _ = writeln!(out, "## Turn {number}\n");
    let _ = writeln!(
        out,
        "_Started {}_\n",
        turn.start_time.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    );

    let _ = writeln!(out, "**User:**\n\n{}\n", turn.user_message.content.trim_end());

    if !turn.thoughts.is_empty() {
        out.push_str("**Thoughts:**\n\n");
        for line in turn.thought_text().trim_end().lines() {
            let _ = writeln!(out, "> {line}");
        }
        out.push('\n');
    }

    if !turn.tool_calls.is_empty() {
        out.push_str("**Tool calls:**\n\n");
        for call in &turn.tool_calls {
            render_tool_call(out, call);
        }
        out.push('\n');
    }

    if let Some(plan) = &turn.plan {
        out.push_str("**Plan:**\n\n");
        for entry in plan {
            let mark = match entry.status {
                PlanEntryStatus::Completed => "x",
                PlanEntryStatus::InProgress => "~",
                PlanEntryStatus::Pending => " ",
            };
            let _ = writeln!(out, "- [{mark}] {}", entry.content);
        }
        out.push('\n');
    }

    if let Some(message) = &turn.assistant_message {
        let _ = writeln!(out, "**Assistant:**\n\n{}\n", message.content.trim_end());
    }

    if let Some(error) = &turn.error {
        let _ = writeln!(
            out,
            "_Error ({}): {}_\n",
            error.kind.label(),
            error.message
        );
    } else if let Some(reason) = turn.stop_reason {
        let _ = writeln!(out, "_Stop reason: {}_\n", reason.as_str());
    } else if turn.is_open() {
        out.push_str("_In progress_\n\n");
    }
}

fn render_tool_call(out: &mut String, call: &ToolCall) {
    let title = if call.title.is_empty() {
        call.tool_call_id.as_str()
    } else {
        call.title.as_str()
    };
    let _ = writeln!(
        out,
        "- {title} (`{}`, {})",
        serde_plain(&call.kind),
        serde_plain(&call.status)
    );

    for content in &call.content {
        match content {
            ToolCallContent::Content { content } => match content {
                ContentBlock::Text { text } => {
                    for line in text.trim_end().lines() {
                        let _ = writeln!(out, "  > {line}");
                    }
                }
                ContentBlock::ResourceLink { uri, name } => {
                    let _ = writeln!(out, "  - [{name}]({uri})");
                }
                other => {
                    let _ = writeln!(out, "  - _{} content_", serde_plain(other));
                }
            },
            ToolCallContent::Diff {
                path,
                old_text,
                new_text,
            } => {
                let patch = diffy::create_patch(old_text.as_deref().unwrap_or(""), new_text);
                let _ = writeln!(out, "  - Diff `{}`:\n", path.display());
                out.push_str("    ```diff\n");
                for line in patch.to_string().lines() {
                    let _ = writeln!(out, "    {line}");
                }
                out.push_str("    ```\n");
            }
            ToolCallContent::Terminal { terminal_id } => {
                let _ = writeln!(out, "  - Terminal `{terminal_id}`");
            }
        }
    }
}

/// Wire name of a unit enum value or the `type` tag of a tagged one.
fn serde_plain<T: serde::Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => s,
        Ok(Value::Object(map)) => map
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_owned(),
        _ => "unknown".to_owned(),
    }
}
