//! Process bridge exposing a [`pchat::ChatSession`] over stdin/stdout.
//!
//! The loop and wire shapes live in the library so the binaries stay
//! thin and the protocol is testable against in-memory pipes.

pub mod bridge;
pub mod env;
pub mod protocol;

pub use bridge::run;
pub use env::{config_from, config_from_env};
pub use protocol::{BridgeCommand, CommandOutcome, HistoryEntry, StreamEvent};
