//! Arbor – single-query closure resolution for parent-pointer trees.
//!
//! A table where every row may point at a parent row of the same table (a
//! self-referential foreign key such as `parent_id`) stores a tree. Arbor
//! answers two questions about such a tree with exactly one recursive query
//! each:
//! * the ancestors of a node, nearest first, up to the root;
//! * the descendants of a node, breadth first, down to the leaves.
//!
//! The returned nodes come with their parent (or children) already attached,
//! so walking the result never goes back to the database.
//!
//! ## Modules
//! * [`schema`] – The [`schema::Model`] trait implemented by record types and the
//!   [`schema::Table`] handle describing their table.
//! * [`query`] – Dialect-free recursive query plans ([`query::ClosureQuery`]).
//! * [`persist`] – The [`persist::Store`] contract and its SQLite implementation.
//! * [`materialize`] – Pure reconstruction of chains and subtrees from flat rows.
//! * [`proxy`] – [`proxy::Node`] and the wrappers carrying a preloaded relation.
//! * [`resolver`] – The [`resolver::Resolver`] entry points.
//! * [`settings`] – Configuration through the `config` crate.
//!
//! ## Quick Start
//! ```
//! use arbor::persist::{ClosureRow, PersistenceMode, SqliteStore};
//! use arbor::proxy::Node;
//! use arbor::resolver::Resolver;
//! use arbor::schema::{Model, Table};
//! use rusqlite::types::Value;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Category { id: i64, parent_id: Option<i64> }
//!
//! impl Model for Category {
//!     fn table() -> Table { Table::new("categories", "id", vec!["id", "parent_id"]) }
//!     fn hydrate(row: &ClosureRow) -> arbor::Result<Self> {
//!         Ok(Category { id: row.get("id")?, parent_id: row.get("parent_id")? })
//!     }
//!     fn value(&self, column: &str) -> Option<Value> {
//!         match column {
//!             "id" => Some(Value::Integer(self.id)),
//!             "parent_id" => Some(self.parent_id.map_or(Value::Null, Value::Integer)),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let store = SqliteStore::open(PersistenceMode::InMemory).unwrap();
//! store.connection().execute_batch(
//!     "create table categories (id integer primary key, parent_id integer);
//!      insert into categories values (1, null), (2, 1), (3, 2);",
//! ).unwrap();
//! let resolver = Resolver::new(&store);
//! let leaf = Category { id: 3, parent_id: Some(2) };
//! let chain = resolver.ancestors(&leaf).unwrap();
//! assert_eq!(chain.iter().map(|a| a.id).collect::<Vec<_>>(), vec![2, 1]);
//! assert_eq!(chain[0].parent(&store).unwrap(), Some(chain[1].clone()));
//! assert_eq!(store.round_trips(), 1);
//! ```

pub mod error;
pub mod key;
pub mod materialize;
pub mod persist;
pub mod proxy;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod settings;
pub mod telemetry;

pub use error::{ArborError, Result};
pub use key::Key;
pub use proxy::{Ancestor, Association, Descendant, Node, Subtree, WithPreloadedChildren, WithPreloadedParent};
pub use resolver::Resolver;
pub use schema::{Model, Table};
