//! The resolver entry points.
//!
//! Every call builds one plan, sends it to the store once, and materializes
//! the rows in memory. No state survives between calls.

use std::time::Instant;

use tracing::{debug, info};

use crate::error::Result;
use crate::materialize;
use crate::persist::{ClosureRow, Store};
use crate::proxy::{Ancestor, Descendant};
use crate::query::ClosureQueryBuilder;
use crate::schema::{Model, key_at, primary_key_of};
use crate::settings::Settings;

pub struct Resolver<'s> {
    store: &'s dyn Store,
    settings: Settings,
}

impl<'s> Resolver<'s> {
    pub fn new(store: &'s dyn Store) -> Self {
        Self::with_settings(store, Settings::default())
    }
    pub fn with_settings(store: &'s dyn Store, settings: Settings) -> Self {
        Self { store, settings }
    }

    /// The ancestors of `node`, nearest first, each with its parent preloaded.
    /// A root yields an empty chain without touching the store.
    pub fn ancestors_of<M: Model>(&self, node: &M, foreign_key: &str) -> Result<Vec<Ancestor<M>>> {
        let table = M::table();
        let builder = ClosureQueryBuilder::new(&table, foreign_key)?;
        let Some(query) = builder.ancestors(key_at(node, foreign_key)?) else {
            debug!(table = %table.name(), "root node, no ancestors to fetch");
            return Ok(Vec::new());
        };
        let started = Instant::now();
        let rows = hydrate::<M>(&self.store.fetch_closure(&query)?)?;
        let fetched = rows.len();
        let chain = materialize::ancestors(
            node,
            rows,
            table.primary_key(),
            foreign_key,
            self.settings.broken_links,
        )?;
        info!(
            table = %table.name(),
            node = %primary_key_of(node, table.primary_key())?,
            rows = fetched,
            depth = chain.len(),
            ms = started.elapsed().as_secs_f64() * 1000.0,
            "ancestors resolved"
        );
        Ok(chain)
    }

    /// The descendants of `node` in breadth-first order, each with its parent
    /// and its children preloaded. `order` is a `column [asc|desc]` clause
    /// applied to the fetched rows before they are grouped into levels.
    pub fn descendants_of<M: Model>(
        &self,
        node: &M,
        foreign_key: &str,
        order: Option<&str>,
    ) -> Result<Vec<Descendant<M>>> {
        let table = M::table();
        let builder = ClosureQueryBuilder::new(&table, foreign_key)?.order(order)?;
        let key = primary_key_of(node, table.primary_key())?;
        let query = builder.descendants(key.clone());
        let started = Instant::now();
        let rows = hydrate::<M>(&self.store.fetch_closure(&query)?)?;
        if rows.is_empty() {
            debug!(table = %table.name(), node = %key, "leaf node, no descendants");
            return Ok(Vec::new());
        }
        let fetched = rows.len();
        let listing = materialize::descendants(node, rows, table.primary_key(), foreign_key)?;
        info!(
            table = %table.name(),
            node = %key,
            rows = fetched,
            descendants = listing.len(),
            ms = started.elapsed().as_secs_f64() * 1000.0,
            "descendants resolved"
        );
        Ok(listing)
    }

    /// `ancestors_of` with the parent column configured on the model.
    pub fn ancestors<M: Model>(&self, node: &M) -> Result<Vec<Ancestor<M>>> {
        self.ancestors_of(node, &M::tree().foreign_key)
    }

    /// `descendants_of` with the parent column and ordering configured on the model.
    pub fn descendants<M: Model>(&self, node: &M) -> Result<Vec<Descendant<M>>> {
        let tree = M::tree();
        self.descendants_of(node, &tree.foreign_key, tree.order.as_deref())
    }
}

fn hydrate<M: Model>(rows: &[ClosureRow]) -> Result<Vec<M>> {
    rows.iter().map(M::hydrate).collect()
}
