//! # Store Actor
//!
//! Message-driven access to a [`SerializedStore`]. The actor adds no locking
//! of its own; every message lands in the store's single exclusion domain.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{Entry, SerializedStore};
use crate::actors::{Actor, Handler, Message};
use crate::error::Result;

/// Look up an entry by identifier
#[derive(Debug, Clone)]
pub struct GetEntryMessage<P> {
    pub id: String,
    _payload: PhantomData<fn() -> P>,
}

impl<P> GetEntryMessage<P> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            _payload: PhantomData,
        }
    }
}

/// Save a payload under an identifier
#[derive(Debug, Clone)]
pub struct SaveEntryMessage<P> {
    pub id: String,
    pub payload: P,
}

impl<P> SaveEntryMessage<P> {
    pub fn new(id: impl Into<String>, payload: P) -> Self {
        Self {
            id: id.into(),
            payload,
        }
    }
}

impl<P: Clone + Send + 'static> Message for GetEntryMessage<P> {
    type Response = Option<Entry<P>>;
}

impl<P: Send + 'static> Message for SaveEntryMessage<P> {
    type Response = u64;
}

/// Actor wrapper around a shared [`SerializedStore`]
pub struct StoreActor<P> {
    store: Arc<SerializedStore<P>>,
}

impl<P> fmt::Debug for StoreActor<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreActor")
            .field("store", &"Arc<SerializedStore>")
            .finish()
    }
}

impl<P: Clone + Send + Sync + 'static> StoreActor<P> {
    pub fn new(store: Arc<SerializedStore<P>>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<SerializedStore<P>> {
        &self.store
    }

    /// Convenience wrapper for `Handler<GetEntryMessage<P>>`
    pub async fn get(&self, id: impl Into<String>) -> Result<Option<Entry<P>>> {
        self.handle(GetEntryMessage::<P>::new(id)).await
    }

    /// Convenience wrapper for `Handler<SaveEntryMessage<P>>`
    pub async fn save(&self, id: impl Into<String>, payload: P) -> Result<u64> {
        self.handle(SaveEntryMessage::new(id, payload)).await
    }
}

impl<P: Clone + Send + Sync + 'static> Actor for StoreActor<P> {
    fn name(&self) -> &'static str {
        "StoreActor"
    }

    fn started(&mut self) -> Result<()> {
        info!(actor = self.name(), entries = self.store.len(), "StoreActor started");
        Ok(())
    }

    fn stopped(&mut self) -> Result<()> {
        info!(actor = self.name(), entries = self.store.len(), "StoreActor stopped");
        Ok(())
    }
}

#[async_trait]
impl<P: Clone + Send + Sync + 'static> Handler<GetEntryMessage<P>> for StoreActor<P> {
    async fn handle(&self, msg: GetEntryMessage<P>) -> Result<Option<Entry<P>>> {
        debug!(actor = self.name(), id = %msg.id, "Handling GetEntryMessage");
        Ok(self.store.get(&msg.id))
    }
}

#[async_trait]
impl<P: Clone + Send + Sync + 'static> Handler<SaveEntryMessage<P>> for StoreActor<P> {
    async fn handle(&self, msg: SaveEntryMessage<P>) -> Result<u64> {
        debug!(actor = self.name(), id = %msg.id, "Handling SaveEntryMessage");
        Ok(self.store.save(msg.id, msg.payload))
    }
}
