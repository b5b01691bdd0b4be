//! Conversation history rendering.
//!
//! Turns prior conversation turns into the bounded, role-labeled text block
//! substituted into prompt templates.

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    /// Get the role label used in rendered history.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single prior conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: TurnRole,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Maximum number of trailing turns included in a rendered history block.
pub const MAX_HISTORY_TURNS: usize = 10;

/// Render prior turns into a role-labeled block, most recent last.
///
/// Only the trailing [`MAX_HISTORY_TURNS`] turns are kept so the block stays
/// bounded regardless of conversation length. Returns `None` for an empty
/// history; the caller decides whether the template's history section
/// appears at all.
pub fn render_history(turns: &[Turn]) -> Option<String> {
    if turns.is_empty() {
        return None;
    }

    let start = turns.len().saturating_sub(MAX_HISTORY_TURNS);
    let block = turns[start..]
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect::<Vec<_>>()
        .join("\n");

    Some(block)
}
