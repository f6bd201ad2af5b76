// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The meta store handle: a SQLite connection plus the fixed meta schema.
//!
//! Opening a handle bootstraps the schema when the backing database is empty, accepts it
//! when its stamped version matches `CURRENT_VERSION`, and refuses it otherwise.  The
//! stamp lives in `PRAGMA user_version`, so an empty ordinary SQLite file and a fresh
//! meta store are the same thing.
//!
//! All writes go through `modify`, which runs the reconciliation engine inside a single
//! transaction.  All reads outside the engine go through `extract`.

use std::collections::BTreeMap;

use std::path::Path;

use itertools::Itertools;

use rusqlite;
use rusqlite::TransactionBehavior;
use rusqlite::types::{
    ToSql,
    ToSqlOutput,
    Value,
    ValueRef,
};

use lodestore_core::{
    RowSet,
    RowSource,
    TypedValue,
    ValueType,
};

use errors::{
    DbError,
    Result,
};

use reconcile;

use schema::{
    MetaTableDef,
    META_TABLES,
    declared_column_type,
    table_def,
};

use types::MetaStoreChange;

use watcher::ChangeWatcher;

/// The version of the meta schema this build reads and writes, stamped into
/// `PRAGMA user_version`.
pub const CURRENT_VERSION: i32 = 1;

/// Borrowing `ToSql` adapter so `TypedValue`s can be bound without copying strings.
pub(crate) struct SqlValue<'a>(pub &'a TypedValue);

impl<'a> ToSql for SqlValue<'a> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput> {
        Ok(match *self.0 {
            TypedValue::String(ref s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            TypedValue::Long(n) => ToSqlOutput::Owned(Value::Integer(n)),
            TypedValue::Boolean(b) => ToSqlOutput::Owned(Value::Integer(if b { 1 } else { 0 })),
            TypedValue::Null => ToSqlOutput::Owned(Value::Null),
        })
    }
}

/// Recover a `TypedValue` from a stored SQLite value.  Booleans are stored as integers, so
/// an `INTEGER` cell is ambiguous on its own; `hint` carries the declared column type when
/// the caller knows it.
pub(crate) fn typed_value_from_sql(value: Value, hint: Option<ValueType>) -> TypedValue {
    match value {
        Value::Null => TypedValue::Null,
        Value::Integer(n) => {
            match hint {
                Some(ValueType::Boolean) => TypedValue::Boolean(n != 0),
                _ => TypedValue::Long(n),
            }
        },
        Value::Text(s) => TypedValue::String(s),
        // The meta schema stores no reals or blobs; these only show up when an extraction
        // computes one, and a lossy text rendering is the best we can offer.
        Value::Real(f) => TypedValue::String(f.to_string()),
        Value::Blob(_) => TypedValue::Null,
    }
}

/// Prefix binding names with ':' and pair each with a borrowing adapter, ready for
/// rusqlite's named-parameter interface.
pub(crate) fn named_bindings<'a>(bindings: &'a [(String, TypedValue)]) -> Vec<(String, SqlValue<'a>)> {
    bindings.iter()
            .map(|&(ref name, ref value)| (format!(":{}", name), SqlValue(value)))
            .collect()
}

pub(crate) fn param_refs<'a>(named: &'a [(String, SqlValue<'a>)]) -> Vec<(&'a str, &'a dyn ToSql)> {
    named.iter()
         .map(|&(ref name, ref value)| (name.as_str(), value as &dyn ToSql))
         .collect()
}

/// The SQL each meta table is driven with, generated once from its definition.
///
/// Insert parameters are `:n0..`, one per column in definition order.  Update binds the
/// same `:n` parameters for its SET list and `:o0..` for the old key values in its WHERE
/// clause; the keyed select and delete bind `:o0..` only.
pub(crate) struct TableStatements {
    pub select_all: String,
    pub select_row: String,
    pub insert: String,
    pub update: String,
    pub delete: String,
}

fn statements_for(def: &MetaTableDef) -> TableStatements {
    let columns = def.columns.iter().map(|c| c.name).join(", ");
    let placeholders = (0..def.columns.len()).map(|i| format!(":n{}", i)).join(", ");
    let sets = def.columns.iter()
                          .enumerate()
                          .map(|(i, c)| format!("{} = :n{}", c.name, i))
                          .join(", ");
    let keyed = def.columns.iter()
                           .filter(|c| c.key)
                           .enumerate()
                           .map(|(j, c)| format!("{} = :o{}", c.name, j))
                           .join(" AND ");
    TableStatements {
        select_all: format!("SELECT {} FROM {}", columns, def.name),
        select_row: format!("SELECT {} FROM {} WHERE {}", columns, def.name, keyed),
        insert: format!("INSERT INTO {} ({}) VALUES ({})", def.name, columns, placeholders),
        update: format!("UPDATE {} SET {} WHERE {}", def.name, sets, keyed),
        delete: format!("DELETE FROM {} WHERE {}", def.name, keyed),
    }
}

fn table_ddl(def: &MetaTableDef) -> String {
    let columns = def.columns.iter()
                             .map(|c| {
                                 let affinity = match c.value_type {
                                     ValueType::String => "TEXT",
                                     ValueType::Long |
                                     ValueType::Boolean => "INTEGER",
                                 };
                                 if c.key {
                                     format!("{} {} NOT NULL", c.name, affinity)
                                 } else {
                                     format!("{} {}", c.name, affinity)
                                 }
                             })
                             .join(", ");
    let keys = def.columns.iter().filter(|c| c.key).map(|c| c.name).join(", ");
    format!("CREATE TABLE {} ({}, PRIMARY KEY ({}))", def.name, columns, keys)
}

fn set_pragmas(conn: &rusqlite::Connection) -> Result<()> {
    let page_size = 32768;
    conn.execute_batch(&format!("
        PRAGMA page_size={};
        PRAGMA journal_mode=wal;
        PRAGMA wal_autocheckpoint=32;
        PRAGMA journal_size_limit=3145728;
        PRAGMA foreign_keys=ON;
        PRAGMA temp_store=2;
    ", page_size))?;
    Ok(())
}

fn get_user_version(conn: &rusqlite::Connection) -> Result<i32> {
    let version = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(version)
}

fn set_user_version(conn: &rusqlite::Connection, version: i32) -> Result<()> {
    conn.execute_batch(&format!("PRAGMA user_version = {}", version))?;
    Ok(())
}

fn create_current_version(conn: &mut rusqlite::Connection) -> Result<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;
    for def in META_TABLES.iter() {
        tx.execute_batch(&table_ddl(def))?;
    }
    set_user_version(&tx, CURRENT_VERSION)?;
    tx.commit()?;
    Ok(())
}

fn ensure_current_version(conn: &mut rusqlite::Connection) -> Result<()> {
    match get_user_version(conn)? {
        0 => create_current_version(conn),
        CURRENT_VERSION => Ok(()),
        v => bail!(DbError::InvalidHandle(
            format!("schema version {} (expected {})", v, CURRENT_VERSION))),
    }
}

pub struct MetaStore {
    pub(crate) conn: rusqlite::Connection,
    case_sensitive: bool,
    pub(crate) statements: BTreeMap<&'static str, TableStatements>,
}

impl MetaStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<MetaStore> {
        let conn = rusqlite::Connection::open(path)?;
        MetaStore::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<MetaStore> {
        let conn = rusqlite::Connection::open_in_memory()?;
        MetaStore::from_connection(conn)
    }

    pub fn from_connection(mut conn: rusqlite::Connection) -> Result<MetaStore> {
        set_pragmas(&conn)?;
        ensure_current_version(&mut conn)?;
        let statements = META_TABLES.iter()
                                    .map(|def| (def.name, statements_for(def)))
                                    .collect();
        Ok(MetaStore {
            conn: conn,
            case_sensitive: false,
            statements: statements,
        })
    }

    /// Whether identifier normalization treats uppercase characters as significant.
    /// Off by default; providers for engines with case-sensitive catalogs turn it on.
    pub fn set_case_sensitive(&mut self, case_sensitive: bool) {
        self.case_sensitive = case_sensitive;
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn schema_version(&self) -> Result<i32> {
        get_user_version(&self.conn)
    }

    pub fn table(&self, name: &str) -> Result<&'static MetaTableDef> {
        table_def(name).ok_or_else(|| DbError::UnknownMetaTable(name.to_string()))
    }

    /// Reconcile one meta table against `new_data`.
    ///
    /// With a `condition` (a boolean SQL fragment over the table's columns, with named
    /// parameters supplied through `bindings`), only the rows it selects are reconciled;
    /// without one the whole table is.  `new_data = None` means "this subset is now
    /// empty" and deletes it.
    ///
    /// Runs in a single transaction, cascade-pruning dependents of any removed rows, and
    /// returns the committed changes in application order.  Any error leaves the store
    /// untouched.
    pub fn modify<W>(&mut self,
                     table_name: &str,
                     new_data: Option<&dyn RowSource>,
                     condition: Option<&str>,
                     bindings: &[(String, TypedValue)],
                     watcher: &mut W) -> Result<Vec<MetaStoreChange>>
    where W: ChangeWatcher {
        let def = self.table(table_name)?;
        let case_sensitive = self.case_sensitive;
        let tx = self.conn.transaction()?;
        let batch = reconcile::reconcile_table(&tx,
                                               &self.statements,
                                               def,
                                               new_data,
                                               condition,
                                               bindings,
                                               case_sensitive,
                                               watcher)?;
        tx.commit()?;
        Ok(batch)
    }

    /// Run a read-only SELECT over the meta tables, recovering declared column types by
    /// name where possible.
    pub fn extract(&self, select: &str, bindings: &[(String, TypedValue)]) -> Result<RowSet> {
        let trimmed = select.trim_start();
        if !trimmed.get(..6).map_or(false, |p| p.eq_ignore_ascii_case("select")) {
            bail!(DbError::InvalidExtraction(select.to_string()));
        }

        let mut stmt = self.conn.prepare(select)?;
        let column_names: Vec<String> = stmt.column_names()
                                            .iter()
                                            .map(|name| name.to_string())
                                            .collect();

        let named = named_bindings(bindings);
        let params = param_refs(&named);
        let mut rows = stmt.query(&params[..])?;

        let mut out = RowSet::new(column_names.iter().map(|name| name.as_str()));
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_names.len());
            for (i, name) in column_names.iter().enumerate() {
                let raw: Value = row.get(i)?;
                values.push(typed_value_from_sql(raw, declared_column_type(name)));
            }
            out.push_row(values);
        }
        Ok(out)
    }
}
