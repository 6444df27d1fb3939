use crate::models::Message;

/// Completion payload: `[system prompt] ++ history ++ [user input]`.
///
/// The system prompt only exists here; it is never written to the store.
pub fn assemble(system_prompt: &str, history: &[Message], user_input: &str) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system_prompt));
    messages.extend_from_slice(history);
    messages.push(Message::user(user_input));
    messages
}
