//! # Actor Traits
//!
//! Lightweight actor pattern used to expose serialized state through typed
//! messages. An actor owns (or shares) its state, and each message type it
//! accepts gets its own [`Handler`] implementation.
//!
//! ```text
//! caller ──(M: Message)──→ Handler<M>::handle ──→ owned state
//! ```

pub mod traits;

pub use traits::{Actor, Handler, Message};
