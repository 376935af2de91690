//! Query plans for closure resolution.
//!
//! A [`ClosureQuery`] is a small, dialect-free description of a recursive
//! query: a seed selecting the first hop, a recursive step selecting the next
//! hop from the rows already found, and an outer join recovering full rows.
//! Only the persistence adapter turns a plan into SQL text.

use crate::error::{ArborError, Result};
use crate::key::Key;
use crate::schema::{OrderBy, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ancestors,
    Descendants,
}

impl Direction {
    pub fn suffix(&self) -> &'static str {
        match self {
            Direction::Ancestors => "ancestors",
            Direction::Descendants => "descendants",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub relation: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(relation: &str, column: &str) -> Self {
        Self {
            relation: relation.to_string(),
            column: column.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Column(ColumnRef),
    Bind(Key),
}

// left = right
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub left: ColumnRef,
    pub right: Operand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub projection: Vec<ColumnRef>,
    pub from: Vec<String>,
    pub filter: Predicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureQuery {
    pub direction: Direction,
    pub table: String,
    /// Name of the recursive relation.
    pub alias: String,
    /// Columns of the recursive relation: primary key, then foreign key.
    pub columns: Vec<String>,
    pub seed: Select,
    pub step: Select,
    /// Outer, non-recursive join of the base table against the recursive relation.
    pub join: Predicate,
    pub order: Option<OrderBy>,
}

impl ClosureQuery {
    /// Seed and step must project the same columns for the union to be well typed.
    pub fn check(&self) -> Result<()> {
        let names = |select: &Select| -> Vec<String> {
            select.projection.iter().map(|c| c.column.clone()).collect()
        };
        if names(&self.seed) != self.columns || names(&self.step) != self.columns {
            return Err(ArborError::Invariant(format!(
                "seed {:?} and step {:?} of {} must both project {:?}",
                names(&self.seed),
                names(&self.step),
                self.alias,
                self.columns
            )));
        }
        Ok(())
    }
    /// Bound parameters in rendering order (seed, then step, then join).
    pub fn binds(&self) -> Vec<&Key> {
        [&self.seed.filter, &self.step.filter, &self.join]
            .into_iter()
            .filter_map(|predicate| match &predicate.right {
                Operand::Bind(key) => Some(key),
                Operand::Column(_) => None,
            })
            .collect()
    }
}

// ------------- ClosureQueryBuilder -------------
pub struct ClosureQueryBuilder<'t> {
    table: &'t Table,
    foreign_key: String,
    order: Option<OrderBy>,
}

impl<'t> ClosureQueryBuilder<'t> {
    /// Fails fast if the primary key or `foreign_key` is not a column of `table`.
    pub fn new(table: &'t Table, foreign_key: &str) -> Result<Self> {
        table.require(table.primary_key())?;
        table.require(foreign_key)?;
        Ok(Self {
            table,
            foreign_key: foreign_key.to_string(),
            order: None,
        })
    }
    /// Orders the final projection. The recursive step itself is never ordered.
    pub fn order(mut self, clause: Option<&str>) -> Result<Self> {
        self.order = clause.map(|c| OrderBy::parse(c, self.table)).transpose()?;
        Ok(self)
    }
    /// The plan walking up from a node whose foreign key is `parent`.
    /// A root (no parent) needs no query at all, which is signalled by `None`.
    pub fn ancestors(&self, parent: Option<Key>) -> Option<ClosureQuery> {
        let parent = parent?;
        let pk = self.table.primary_key();
        Some(self.plan(Direction::Ancestors, pk, parent, pk, &self.foreign_key))
    }
    /// The plan walking down from the node whose primary key is `node`.
    pub fn descendants(&self, node: Key) -> ClosureQuery {
        let pk = self.table.primary_key();
        self.plan(Direction::Descendants, &self.foreign_key, node, &self.foreign_key, pk)
    }
    // seed: table.seed_column = start
    // step: table.step_column = alias.alias_column
    fn plan(
        &self,
        direction: Direction,
        seed_column: &str,
        start: Key,
        step_column: &str,
        alias_column: &str,
    ) -> ClosureQuery {
        let table = self.table.name();
        let pk = self.table.primary_key();
        let alias = format!("_{}_{}", table, direction.suffix());
        let projection = vec![ColumnRef::new(table, pk), ColumnRef::new(table, &self.foreign_key)];
        let seed = Select {
            projection: projection.clone(),
            from: vec![table.to_string()],
            filter: Predicate {
                left: ColumnRef::new(table, seed_column),
                right: Operand::Bind(start),
            },
        };
        let step = Select {
            projection,
            from: vec![table.to_string(), alias.clone()],
            filter: Predicate {
                left: ColumnRef::new(table, step_column),
                right: Operand::Column(ColumnRef::new(&alias, alias_column)),
            },
        };
        let join = Predicate {
            left: ColumnRef::new(table, pk),
            right: Operand::Column(ColumnRef::new(&alias, pk)),
        };
        ClosureQuery {
            direction,
            table: table.to_string(),
            columns: vec![pk.to_string(), self.foreign_key.clone()],
            alias,
            seed,
            step,
            join,
            order: self.order.clone(),
        }
    }
}

// ------------- RelationQuery -------------
// A single-hop lookup used by the live relation accessors:
// all rows of `table` where `column` equals `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationQuery {
    pub table: String,
    pub column: String,
    pub value: Key,
    pub order: Option<OrderBy>,
}

impl RelationQuery {
    pub fn new(table: &Table, column: &str, value: Key, order: Option<&str>) -> Result<Self> {
        table.require(column)?;
        Ok(Self {
            table: table.name().to_string(),
            column: column.to_string(),
            value,
            order: order.map(|clause| OrderBy::parse(clause, table)).transpose()?,
        })
    }
}
