// used for persistence
use rusqlite::types::{FromSql, Value, ValueRef};
use rusqlite::{Connection, params, params_from_iter};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use tracing::{debug, info};

use crate::error::{ArborError, Result};
use crate::key::Key;
use crate::query::{ClosureQuery, ColumnRef, Operand, Predicate, RelationQuery, Select};
use crate::schema::{OrderBy, Table};
use crate::settings::Settings;

// ------------- ClosureRow -------------
// One fetched record as a flat set of named values.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosureRow {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl ClosureRow {
    pub fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }
    /// Converts the named column with the same rules rusqlite applies to rows.
    pub fn get<T: FromSql>(&self, column: &str) -> Result<T> {
        let value = self.value(column).ok_or_else(|| ArborError::Hydration {
            column: column.to_string(),
            message: String::from("column was not fetched"),
        })?;
        T::column_result(ValueRef::from(value)).map_err(|e| ArborError::Hydration {
            column: column.to_string(),
            message: e.to_string(),
        })
    }
}

// ------------- Store -------------
// The persistence contract. Every call is exactly one round trip.
pub trait Store {
    fn fetch_closure(&self, query: &ClosureQuery) -> Result<Vec<ClosureRow>>;
    fn fetch_related(&self, query: &RelationQuery) -> Result<Vec<ClosureRow>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceMode {
    InMemory,
    File(String),
}

// ------------- Persistence -------------
pub struct SqliteStore {
    connection: Connection,
    round_trips: AtomicUsize,
    log_queries: bool,
}

impl SqliteStore {
    pub fn open(mode: PersistenceMode) -> Result<Self> {
        let connection = match mode {
            PersistenceMode::InMemory => Connection::open_in_memory()?,
            PersistenceMode::File(path) => Connection::open(path)?,
        };
        Ok(Self::from_connection(connection))
    }
    /// Opens the configured database with the configured query logging.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::open(settings.persistence_mode())?.log_queries(settings.log_queries))
    }
    pub fn from_connection(connection: Connection) -> Self {
        Self {
            connection,
            round_trips: AtomicUsize::new(0),
            log_queries: false,
        }
    }
    /// Logs every lowered statement at info level instead of debug.
    pub fn log_queries(mut self, enabled: bool) -> Self {
        self.log_queries = enabled;
        self
    }
    pub fn connection(&self) -> &Connection {
        &self.connection
    }
    /// Number of statements sent to SQLite through the `Store` contract.
    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::Relaxed)
    }
    /// Reads the live definition of `table`. Not counted as a round trip
    /// since it is schema inspection rather than closure resolution.
    pub fn describe(&self, table: &str) -> Result<Table> {
        let mut statement = self
            .connection
            .prepare_cached("select name, pk from pragma_table_info(?1) order by cid")?;
        let mut columns = Vec::new();
        let mut primary_key = None;
        let mut key_parts = 0;
        let mut rows = statement.query(params![table])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let pk: i64 = row.get(1)?;
            if pk > 0 {
                key_parts += 1;
                primary_key = Some(name.clone());
            }
            columns.push(name);
        }
        if columns.is_empty() {
            return Err(ArborError::Configuration(format!("table '{table}' does not exist")));
        }
        let primary_key = primary_key.filter(|_| key_parts == 1).ok_or_else(|| {
            ArborError::Configuration(format!("table '{table}' has no single-column primary key"))
        })?;
        Ok(Table::new(table.to_string(), primary_key, columns))
    }
    fn run(&self, sql: &str, binds: &[&Key]) -> Result<Vec<ClosureRow>> {
        if self.log_queries {
            info!(%sql, binds = binds.len(), "executing");
        } else {
            debug!(%sql, binds = binds.len(), "executing");
        }
        let started = Instant::now();
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        let mut statement = self.connection.prepare_cached(sql)?;
        let columns: Arc<[String]> = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let mut fetched = Vec::new();
        let mut rows = statement.query(params_from_iter(binds.iter()))?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(row.get::<_, Value>(i)?);
            }
            fetched.push(ClosureRow::new(Arc::clone(&columns), values));
        }
        debug!(
            ms = started.elapsed().as_secs_f64() * 1000.0,
            rows = fetched.len(),
            "statement complete"
        );
        Ok(fetched)
    }
}

impl Store for SqliteStore {
    fn fetch_closure(&self, query: &ClosureQuery) -> Result<Vec<ClosureRow>> {
        let sql = lower_closure(query)?;
        self.run(&sql, &query.binds())
    }
    fn fetch_related(&self, query: &RelationQuery) -> Result<Vec<ClosureRow>> {
        let sql = lower_relation(query);
        self.run(&sql, &[&query.value])
    }
}

// ------------- Lowering -------------
// The SQLite dialect lives here and nowhere else.

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn column(c: &ColumnRef) -> String {
    format!("{}.{}", quote(&c.relation), quote(&c.column))
}

fn predicate(p: &Predicate) -> String {
    let right = match &p.right {
        Operand::Column(c) => column(c),
        Operand::Bind(_) => String::from("?"),
    };
    format!("{} = {}", column(&p.left), right)
}

fn select(s: &Select) -> String {
    let projection: Vec<String> = s.projection.iter().map(column).collect();
    let from: Vec<String> = s.from.iter().map(|r| quote(r)).collect();
    format!(
        "select {} from {} where {}",
        projection.join(", "),
        from.join(", "),
        predicate(&s.filter)
    )
}

fn order_by(table: &str, order: &Option<OrderBy>) -> String {
    match order {
        Some(o) => format!(
            " order by {}.{} {}",
            quote(table),
            quote(&o.column),
            if o.descending { "desc" } else { "asc" }
        ),
        None => String::new(),
    }
}

pub fn lower_closure(query: &ClosureQuery) -> Result<String> {
    query.check()?;
    let columns: Vec<String> = query.columns.iter().map(|c| quote(c)).collect();
    Ok(format!(
        "with recursive {alias}({columns}) as ({seed} union {step}) \
         select {table}.* from {table}, {alias} where {join}{order}",
        alias = quote(&query.alias),
        columns = columns.join(", "),
        seed = select(&query.seed),
        step = select(&query.step),
        table = quote(&query.table),
        join = predicate(&query.join),
        order = order_by(&query.table, &query.order),
    ))
}

pub fn lower_relation(query: &RelationQuery) -> String {
    format!(
        "select * from {table} where {table}.{column} = ?{order}",
        table = quote(&query.table),
        column = quote(&query.column),
        order = order_by(&query.table, &query.order),
    )
}
