//! Prompt assembly.
//!
//! The assembled prompt is always two messages: a system message (the
//! configured or per-request prompt, with retrieved memory folded in) and
//! the user message.

use ironquill_core::Message;

use crate::retrieve::MemoryContext;
use crate::validate::ValidatedTurn;

/// Header line introducing retrieved memory inside the system prompt.
pub const MEMORY_BLOCK_HEADER: &str = "Relevant context from memory:";

/// Builds the provider prompt for a turn.
pub fn assemble(turn: &ValidatedTurn, context: Option<&MemoryContext>) -> Vec<Message> {
    let mut system = turn.system_prompt.clone();
    if let Some(ctx) = context {
        system.push_str("\n\n");
        system.push_str(MEMORY_BLOCK_HEADER);
        system.push('\n');
        system.push_str(&ctx.formatted());
    }
    vec![Message::system(system), Message::user(&turn.message)]
}

#[cfg(test)]
mod tests {
    use ironquill_core::{MemoryFragment, Role};

    use super::*;
    use crate::validate::{ChatTurnRequest, TurnDefaults, validate};

    fn plain_turn(message: &str) -> ValidatedTurn {
        validate(ChatTurnRequest::new(message), &TurnDefaults::default(), &[]).unwrap()
    }

    #[test]
    fn without_context_prompt_is_system_then_user() {
        let turn = plain_turn("What is Rust?");
        let messages = assemble(&turn, None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "You are a helpful assistant.");
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "What is Rust?");
    }

    #[test]
    fn context_is_folded_into_system_message() {
        let turn = plain_turn("What's my favorite color?");
        let context = MemoryContext {
            fragments: vec![
                MemoryFragment::new("Favorite color is teal", 0.9),
                MemoryFragment::new("Dislikes beige", 0.4),
            ],
            estimated_tokens: 10,
            elapsed_ms: 3,
        };
        let messages = assemble(&turn, Some(&context));
        assert_eq!(messages.len(), 2);
        let system = &messages[0].content;
        assert!(system.starts_with("You are a helpful assistant."));
        assert!(system.contains(MEMORY_BLOCK_HEADER));
        assert!(system.contains("1. Favorite color is teal"));
        assert!(system.contains("2. Dislikes beige"));
        // The user message is never polluted with context.
        assert_eq!(messages[1].content, "What's my favorite color?");
    }

    #[test]
    fn per_request_system_prompt_is_used() {
        let mut request = ChatTurnRequest::new("hola");
        request.system_prompt = Some("Answer only in Spanish.".to_string());
        let turn = validate(request, &TurnDefaults::default(), &[]).unwrap();
        let messages = assemble(&turn, None);
        assert_eq!(messages[0].content, "Answer only in Spanish.");
    }
}
