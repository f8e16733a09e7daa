//! Request channel and the listener that serves it.
//!
//! - `frame`: the `kind:payload` wire format
//! - `channel`: the shared record (read first line, atomic replace)
//! - `listener`: the polling state machine driving the resolver

pub mod channel;
pub mod frame;
pub mod listener;

pub use channel::RequestChannel;
pub use frame::{Frame, FrameKind};
pub use listener::{Listener, ListenerState, PollOutcome};
