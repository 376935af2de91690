//! The schema/model contract consumed by the resolver.
//!
//! A [`Table`] is the handle naming a table, its primary key and its columns.
//! A [`Model`] is implemented by record types living in such a table: it
//! hydrates records from fetched rows and exposes column values by name.
//! Nothing in here talks to a store.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::types::Value;

use crate::error::{ArborError, Result};
use crate::key::Key;
use crate::persist::ClosureRow;

lazy_static! {
    static ref ORDER_CLAUSE: Regex =
        Regex::new(r"(?i)^\s*([A-Za-z_][A-Za-z0-9_]*)(?:\s+(asc|desc))?\s*$").unwrap();
}

// ------------- Table -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    primary_key: String,
    columns: Vec<String>,
}

impl Table {
    /// `columns` must list every column, the primary key included.
    pub fn new<S: Into<String>>(name: S, primary_key: S, columns: Vec<S>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
    /// Fails with a configuration error unless `column` exists.
    pub fn require(&self, column: &str) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(ArborError::missing_column(&self.name, column))
        }
    }
}

// ------------- OrderBy -------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc<S: Into<String>>(column: S) -> Self {
        Self { column: column.into(), descending: false }
    }
    pub fn desc<S: Into<String>>(column: S) -> Self {
        Self { column: column.into(), descending: true }
    }
    /// Parses `column [asc|desc]` and checks the column against `table`.
    pub fn parse(clause: &str, table: &Table) -> Result<Self> {
        let captures = ORDER_CLAUSE.captures(clause).ok_or_else(|| {
            ArborError::Configuration(format!("cannot order by '{clause}', expected 'column [asc|desc]'"))
        })?;
        let column = captures[1].to_string();
        table.require(&column)?;
        let descending = captures
            .get(2)
            .is_some_and(|direction| direction.as_str().eq_ignore_ascii_case("desc"));
        Ok(Self { column, descending })
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column, if self.descending { "desc" } else { "asc" })
    }
}

// ------------- TreeOptions -------------
// Per-model tree configuration: which column points at the parent and how
// siblings are ordered when children are read through the live accessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeOptions {
    pub foreign_key: String,
    pub order: Option<String>,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            foreign_key: String::from("parent_id"),
            order: None,
        }
    }
}

// ------------- Model -------------
pub trait Model: Clone + fmt::Debug + Sized {
    fn table() -> Table;
    fn tree() -> TreeOptions {
        TreeOptions::default()
    }
    /// Builds a full record from one fetched row.
    fn hydrate(row: &ClosureRow) -> Result<Self>;
    /// The value held in `column`, or `None` if the record has no such column.
    fn value(&self, column: &str) -> Option<Value>;
    /// Whether the record implements the named dynamic capability.
    fn supports(&self, _capability: &str) -> bool {
        false
    }
    fn call(&self, capability: &str, _args: &[Value]) -> Result<Value> {
        Err(ArborError::Unsupported {
            table: Self::table().name().to_string(),
            capability: capability.to_string(),
        })
    }
}

/// Reads a key-valued column of `record`; NULL yields `None`.
pub fn key_at<M: Model>(record: &M, column: &str) -> Result<Option<Key>> {
    match record.value(column) {
        Some(value) => Key::from_value(column, &value),
        None => Err(ArborError::Configuration(format!(
            "{} records do not expose column '{column}'",
            M::table().name()
        ))),
    }
}

/// Reads the primary key of `record`, which must be present.
pub fn primary_key_of<M: Model>(record: &M, column: &str) -> Result<Key> {
    key_at(record, column)?.ok_or_else(|| ArborError::InvalidKey {
        column: column.to_string(),
        message: String::from("primary key is null"),
    })
}
