//! Chat transcript assembly.

use llamabridge_abi::{ChatTurn, Model};

/// Floor for the first template render buffer.
const MIN_TEMPLATE_BUF: usize = 64 * 1024;

/// Render attempts before falling back to the plain transcript.
pub const TEMPLATE_ATTEMPTS: usize = 6;

/// Render `user` (and `system`, when non-empty) with the model's own chat
/// template, ending on an open assistant turn.
///
/// Models without a template, or whose template never renders within the
/// retry budget, get [`fallback_transcript`]. Never fails.
pub fn format_prompt<M: Model>(model: &M, user: &str, system: Option<&str>) -> String {
    let system = system.filter(|s| !s.is_empty());

    let Some(template) = model.chat_template() else {
        tracing::debug!("model has no chat template; using plain transcript");
        return fallback_transcript(user, system);
    };

    let mut turns = Vec::with_capacity(2);
    if let Some(sys) = system {
        turns.push(ChatTurn::system(sys));
    }
    turns.push(ChatTurn::user(user));

    let mut cap = (user.len() * 2 + 256).max(MIN_TEMPLATE_BUF);
    for attempt in 1..=TEMPLATE_ATTEMPTS {
        let mut buf = vec![0u8; cap];
        let n = model.apply_chat_template(&template, &turns, true, &mut buf);
        if n >= 0 && (n as usize) <= cap {
            buf.truncate(n as usize);
            return String::from_utf8_lossy(&buf).into_owned();
        }
        tracing::debug!(attempt, cap, needed = n, "chat template did not fit; growing buffer");
        cap = cap.saturating_mul(2);
    }

    tracing::warn!(
        attempts = TEMPLATE_ATTEMPTS,
        "chat template failed to render; using plain transcript"
    );
    fallback_transcript(user, system)
}

/// `System: ..\nUser: ..\nAssistant:` with the system line dropped when absent.
pub fn fallback_transcript(user: &str, system: Option<&str>) -> String {
    let mut out = String::with_capacity(user.len() + 64);
    if let Some(sys) = system.filter(|s| !s.is_empty()) {
        out.push_str("System: ");
        out.push_str(sys);
        out.push('\n');
    }
    out.push_str("User: ");
    out.push_str(user);
    out.push_str("\nAssistant:");
    out
}
