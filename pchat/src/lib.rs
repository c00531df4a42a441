//! Conversation engine for the parley chat abstraction.
//!
//! A [`ChatSession`] owns one conversation's history and one backend
//! provider, selected by [`ChatConfig`](pprovider::ChatConfig) through
//! the provider factory. Callers get the same five operations whatever
//! the backend: set a system prompt, append messages, generate a reply
//! (complete or streamed), reset, and export or import the history.

mod error;
mod history;
mod session;

pub mod prelude;

pub use error::{ChatError, ChatErrorKind};
pub use history::HistoryRecord;
pub use session::{ChatFragmentStream, ChatSession};
