//! Tool catalog and discovery.
//!
//! The [`DiscoveryAggregator`] queries every configured source once per
//! session and merges the results into a [`Catalog`]. The catalog is
//! memoized on the session as an `Arc`, so a turn that has captured it
//! keeps a consistent snapshot even if a reload clears the session's slot
//! mid-turn.

use crate::ToolDef;
use crate::agent::session::Session;
use crate::sources::SourceSet;
use crate::tools::descriptor::ToolDescriptor;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Merged, deduplicated tool descriptors for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    tools: Vec<ToolDescriptor>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog. On a name collision the first descriptor wins and
    /// later ones are dropped, so source order decides priority.
    pub fn new(descriptors: impl IntoIterator<Item = ToolDescriptor>) -> Self {
        let mut catalog = Self::default();
        for d in descriptors {
            if let Some(&existing) = catalog.index.get(&d.name) {
                let kept = &catalog.tools[existing];
                warn!(
                    "Tool name '{}' from {} '{}' shadowed by {} '{}'",
                    d.name, d.source_kind, d.source_id, kept.source_kind, kept.source_id
                );
                continue;
            }
            catalog.index.insert(d.name.clone(), catalog.tools.len());
            catalog.tools.push(d);
        }
        catalog
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).and_then(|&i| self.tools.get(i))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|d| d.name.as_str()).collect()
    }

    /// Wire-format definitions for the Detect call.
    pub fn tool_defs(&self) -> Vec<ToolDef> {
        self.tools.iter().map(ToolDescriptor::to_tool_def).collect()
    }
}

/// Builds and memoizes catalogs.
#[derive(Debug, Clone)]
pub struct DiscoveryAggregator {
    sources: Arc<SourceSet>,
}

impl DiscoveryAggregator {
    pub fn new(sources: Arc<SourceSet>) -> Self {
        Self { sources }
    }

    /// The session's catalog, discovering it on first use.
    ///
    /// Later calls return the memoized catalog without touching any source
    /// until [`Session::reload_catalog`] clears it. A reload that lands while
    /// discovery is running is honored: the result serves this call but is
    /// not memoized.
    pub async fn discover(&self, session: &Session) -> Arc<Catalog> {
        let generation = session.catalog_generation();
        if let Some(catalog) = session.catalog() {
            return catalog;
        }
        let catalog = Arc::new(self.build().await);
        if !session.store_catalog(Arc::clone(&catalog), generation) {
            debug!(
                "[{}] catalog reloaded during discovery; result not memoized",
                session.id()
            );
        }
        catalog
    }

    /// Query every source. A failing source contributes no tools.
    pub async fn build(&self) -> Catalog {
        let start = Instant::now();
        let sources = self.sources.sources();
        let results = join_all(sources.iter().map(|s| s.discover())).await;

        let mut descriptors = Vec::new();
        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(found) => {
                    debug!("Source {} contributed {} tools", source.label(), found.len());
                    descriptors.extend(found);
                }
                Err(e) => {
                    warn!(
                        "Discovery from {} source '{}' failed, contributing no tools: {e}",
                        source.kind(),
                        source.label()
                    );
                }
            }
        }

        let catalog = Catalog::new(descriptors);
        info!(
            "Discovered {} tools from {} sources in {:.0}ms",
            catalog.len(),
            sources.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        catalog
    }
}
