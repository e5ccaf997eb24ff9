//! Per-conversation option negotiation: the step machine, its sessions and
//! the texts sent back to the user.

pub mod prompt;
mod session;
mod state;

pub use session::SessionStore;
pub use state::{Dialog, Effect, Step};
