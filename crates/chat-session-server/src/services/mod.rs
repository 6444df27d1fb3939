pub mod assembler;
pub mod chat_service;
pub mod completion;
pub mod paginator;

pub use assembler::assemble;
pub use chat_service::{ChatError, ChatService};
pub use completion::{CompletionError, CompletionProvider, OpenAiClient};
pub use paginator::{window, WindowError};
