//! # Core Actor Traits

use async_trait::async_trait;

use crate::error::Result;

/// Something that owns state and is reached through messages
///
/// `started` and `stopped` bracket the actor's useful life and default to
/// doing nothing.
pub trait Actor: Send + Sync + 'static {
    /// Actor name for logging
    fn name(&self) -> &'static str;

    fn started(&mut self) -> Result<()> {
        Ok(())
    }

    fn stopped(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Typed entry point for one message kind
///
/// Actors implement this trait once per message type they accept, which
/// keeps routing type-safe.
#[async_trait]
pub trait Handler<M: Message>: Actor {
    async fn handle(&self, msg: M) -> Result<M::Response>;
}

/// Marker trait for actor messages
///
/// Defines the associated response type and ensures messages can cross
/// threads.
pub trait Message: Send + 'static {
    type Response: Send;
}
