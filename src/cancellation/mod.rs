//! # Cancellation Scopes
//!
//! A [`CancelScope`] is the cancellation state shared by one operation or
//! sequence and everything that explicitly registered interest in it.
//!
//! ## Propagation
//!
//! Scopes keep no list of children and never broadcast. Cancelling a scope
//! runs exactly the handlers registered on it, once. Forwarding to another
//! scope only happens when a handler registered on this scope calls `cancel`
//! on that other scope, so every hop is an explicit link:
//!
//! ```text
//! Sequence scope ──handler──→ running step scope ──handler──→ release waiter
//!        ╳
//! independently started sequence (never registered, never notified)
//! ```

pub mod scope;

pub use scope::{CancelReason, CancelScope, Registration};
