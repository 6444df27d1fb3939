pub mod api;
pub mod message;
pub mod session;

pub use message::{Message, Role, UnknownRole};
pub use session::{KeyError, SessionKey, TenantId, KEY_SEPARATOR};
