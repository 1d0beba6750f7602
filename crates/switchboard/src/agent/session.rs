//! Per-session state.
//!
//! A [`Session`] owns the durable conversation history and shares two
//! pieces of mutable state with its [`SessionHandle`]s: the memoized
//! [`Catalog`] slot and the [`ToolDataCache`]. Handles are cloneable and
//! `Send`, so administrative hooks (force a catalog reload, clear tool data)
//! can run from any task while a turn is in flight.

use crate::Message;
use crate::agent::catalog::Catalog;
use crate::context::exchange_count;
use crate::tools::cache::{DEFAULT_TOOL_DATA_CAPACITY, ToolDataCache};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// The memoized catalog plus a counter bumped by every reload. Discovery
/// stores its result only if the counter has not moved since it started.
#[derive(Debug, Default)]
struct CatalogSlot {
    catalog: Option<Arc<Catalog>>,
    generation: u64,
}

#[derive(Debug)]
struct SharedState {
    catalog: Mutex<CatalogSlot>,
    tool_data: Mutex<ToolDataCache>,
}

impl SharedState {
    fn catalog_slot(&self) -> MutexGuard<'_, CatalogSlot> {
        self.catalog.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tool_data(&self) -> MutexGuard<'_, ToolDataCache> {
        self.tool_data.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// One conversation.
#[derive(Debug)]
pub struct Session {
    id: String,
    history: Vec<Message>,
    shared: Arc<SharedState>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_tool_data_capacity(id, DEFAULT_TOOL_DATA_CAPACITY)
    }

    pub fn with_tool_data_capacity(id: impl Into<String>, capacity: usize) -> Self {
        Self {
            id: id.into(),
            history: Vec::new(),
            shared: Arc::new(SharedState {
                catalog: Mutex::new(CatalogSlot::default()),
                tool_data: Mutex::new(ToolDataCache::new(capacity)),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The full durable history. Nothing is ever dropped from it.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn push(&mut self, message: Message) {
        self.history.push(message);
    }

    pub(crate) fn truncate_history(&mut self, len: usize) {
        self.history.truncate(len);
    }

    pub fn exchange_count(&self) -> usize {
        exchange_count(&self.history)
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            id: self.id.clone(),
            shared: Arc::clone(&self.shared),
        }
    }

    /// The memoized catalog, if discovery has run since the last reload.
    pub fn catalog(&self) -> Option<Arc<Catalog>> {
        self.shared.catalog_slot().catalog.clone()
    }

    /// Number of reloads requested so far.
    pub fn catalog_generation(&self) -> u64 {
        self.shared.catalog_slot().generation
    }

    /// Memoize `catalog` if no reload happened since `generation` was read.
    /// Returns whether it was stored.
    pub(crate) fn store_catalog(&self, catalog: Arc<Catalog>, generation: u64) -> bool {
        let mut slot = self.shared.catalog_slot();
        if slot.generation != generation {
            return false;
        }
        slot.catalog = Some(catalog);
        true
    }

    pub fn reload_catalog(&self) {
        self.handle().reload_catalog();
    }

    /// Run `f` with the session's tool data cache locked.
    pub fn with_tool_data<R>(&self, f: impl FnOnce(&mut ToolDataCache) -> R) -> R {
        f(&mut self.shared.tool_data())
    }

    pub fn clear_tool_data(&self) {
        self.handle().clear_tool_data();
    }
}

/// Cloneable administrative handle on a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: String,
    shared: Arc<SharedState>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Drop the memoized catalog so the next turn rediscovers tools. A turn
    /// already in flight keeps the snapshot it captured.
    pub fn reload_catalog(&self) {
        let previous = {
            let mut slot = self.shared.catalog_slot();
            slot.generation += 1;
            slot.catalog.take()
        };
        info!(
            "[{}] catalog reload requested ({} tools dropped)",
            self.id,
            previous.map_or(0, |c| c.len())
        );
    }

    pub fn clear_tool_data(&self) {
        let mut cache = self.shared.tool_data();
        info!("[{}] clearing {} tool data entries", self.id, cache.len());
        cache.clear();
    }
}
