//! Permission policy for the reference host.

use std::fmt::Display;
use std::str::FromStr;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::acp::handler::HandlerFuture;
use crate::acp::schema::{
    PermissionOption, PermissionOptionKind, PermissionOutcome, RequestPermissionRequest,
};
use crate::orchestrator::session_manager::PermissionHandler;
use crate::AppError;

/// How tool-call permission requests are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionPolicy {
    /// Pick the least permissive allow option.
    Allow,
    /// Pick the least permanent reject option.
    Reject,
    /// Ask on the terminal.
    #[default]
    Ask,
}

impl FromStr for PermissionPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "reject" => Ok(Self::Reject),
            "ask" => Ok(Self::Ask),
            other => Err(AppError::Config(format!(
                "unknown permission policy '{other}' (expected allow, reject, or ask)"
            ))),
        }
    }
}

impl Display for PermissionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Allow => "allow",
            Self::Reject => "reject",
            Self::Ask => "ask",
        })
    }
}

/// Find the option an automatic policy would pick.
///
/// Prefers the `*_once` kind over `*_always`. Returns `None` when no option
/// of the wanted polarity is offered.
#[must_use]
pub fn choose_option(options: &[PermissionOption], allow: bool) -> Option<&PermissionOption> {
    let (once, always) = if allow {
        (PermissionOptionKind::AllowOnce, PermissionOptionKind::AllowAlways)
    } else {
        (PermissionOptionKind::RejectOnce, PermissionOptionKind::RejectAlways)
    };
    options
        .iter()
        .find(|o| o.kind == once)
        .or_else(|| options.iter().find(|o| o.kind == always))
}

/// Map the user's answer (1-based index or option id) to an option.
#[must_use]
pub fn parse_choice<'a>(answer: &str, options: &'a [PermissionOption]) -> Option<&'a PermissionOption> {
    let answer = answer.trim();
    if let Ok(index) = answer.parse::<usize>() {
        return index.checked_sub(1).and_then(|i| options.get(i));
    }
    options.iter().find(|o| o.option_id == answer)
}

/// [`PermissionHandler`] applying a [`PermissionPolicy`].
#[derive(Debug, Default)]
pub struct PolicyPermissions {
    policy: PermissionPolicy,
    /// Serialises terminal prompts when requests overlap.
    prompt_lock: Mutex<()>,
}

impl PolicyPermissions {
    /// Handler for `policy`.
    #[must_use]
    pub fn new(policy: PermissionPolicy) -> Self {
        Self {
            policy,
            prompt_lock: Mutex::new(()),
        }
    }

    async fn ask(&self, request: &RequestPermissionRequest) -> PermissionOutcome {
        let _turn = self.prompt_lock.lock().await;
        let title = request
            .tool_call
            .title
            .as_deref()
            .unwrap_or(&request.tool_call.tool_call_id);

        eprintln!("\nThe agent wants to run: {title}");
        for (index, option) in request.options.iter().enumerate() {
            eprintln!("  {}. {} [{}]", index + 1, option.name, option.option_id);
        }
        eprint!("Choose an option: ");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(answer)) => {
                    if let Some(option) = parse_choice(&answer, &request.options) {
                        return PermissionOutcome::selected(option.option_id.clone());
                    }
                    eprint!("Not an option, try again: ");
                }
                Ok(None) => {
                    warn!("stdin closed while asking for permission");
                    return PermissionOutcome::Cancelled;
                }
                Err(err) => {
                    warn!(%err, "failed to read permission answer");
                    return PermissionOutcome::Cancelled;
                }
            }
        }
    }
}

impl PermissionHandler for PolicyPermissions {
    fn decide(&self, request: RequestPermissionRequest) -> HandlerFuture<'_, PermissionOutcome> {
        Box::pin(async move {
            let outcome = match self.policy {
                PermissionPolicy::Ask => self.ask(&request).await,
                automatic => {
                    let allow = automatic == PermissionPolicy::Allow;
                    choose_option(&request.options, allow).map_or(
                        PermissionOutcome::Cancelled,
                        |o| PermissionOutcome::selected(o.option_id.clone()),
                    )
                }
            };
            info!(
                tool_call_id = %request.tool_call.tool_call_id,
                policy = %self.policy,
                ?outcome,
                "permission request answered"
            );
            outcome
        })
    }
}
