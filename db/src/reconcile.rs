// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The reconciliation engine.
//!
//! `reconcile_table` makes one meta table (or the subset of it selected by a condition)
//! match an incoming row set, by diffing rather than by truncate-and-reload: rows keep
//! their identity across refreshes, and observers see only what actually changed.
//!
//! The diff is computed over typed composite keys.  Key tuples are compared as
//! `TypedValue` sequences, never as joined strings, so `("a.b", "c")` and `("a", "b.c")`
//! are distinct keys.
//!
//! Rows that disappear take their dependents with them: before a row is deleted, every
//! table referencing this one is recursively reconciled against an empty set scoped to
//! the vanishing key.

use std::collections::{
    BTreeMap,
    BTreeSet,
};

use rusqlite;

use lodestore_core::{
    RowSource,
    TypedValue,
    normalize_identifier,
};

use errors::{
    DbError,
    Result,
};

use schema::{
    MetaTableDef,
    downstream,
};

use store::{
    TableStatements,
    named_bindings,
    param_refs,
    typed_value_from_sql,
};

use types::{
    MetaContext,
    MetaStoreChange,
};

use watcher::ChangeWatcher;

/// Read the current contents of `def` (optionally restricted by `condition`) as fully
/// typed rows, in definition column order.
fn read_rows(conn: &rusqlite::Connection,
             stmts: &TableStatements,
             def: &MetaTableDef,
             condition: Option<&str>,
             bindings: &[(String, TypedValue)]) -> Result<Vec<Vec<TypedValue>>> {
    let select = match condition {
        Some(cond) => format!("{} WHERE {}", stmts.select_all, cond),
        None => stmts.select_all.clone(),
    };
    let mut stmt = conn.prepare_cached(&select)?;
    let named = named_bindings(bindings);
    let params = param_refs(&named);
    let mut rows = stmt.query(&params[..])?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(def.columns.len());
        for (i, c) in def.columns.iter().enumerate() {
            let raw: rusqlite::types::Value = row.get(i)?;
            values.push(typed_value_from_sql(raw, Some(c.value_type)));
        }
        out.push(values);
    }
    Ok(out)
}

/// Validate and normalize one incoming row: width and names were checked by the caller,
/// so this checks cell types, rejects nulls in key columns, and folds identifier columns.
fn prepare_row(def: &MetaTableDef,
               data: &dyn RowSource,
               row: usize,
               case_sensitive: bool) -> Result<Vec<TypedValue>> {
    let mut values = Vec::with_capacity(def.columns.len());
    for (i, c) in def.columns.iter().enumerate() {
        let value = data.value_at(row, i);
        if c.key && value.is_null() {
            bail!(DbError::DataIntegrity {
                table: def.name.to_string(),
                detail: format!("null in key column {}", c.name),
            });
        }
        if !value.matches(c.value_type) {
            bail!(DbError::TypeMismatch {
                table: def.name.to_string(),
                column: c.name.to_string(),
                expected: c.value_type,
                value: value.to_string(),
            });
        }
        let value = match *value {
            TypedValue::String(ref s) if def.is_ident_column(i) => {
                TypedValue::String(normalize_identifier(s, case_sensitive))
            },
            ref v => v.clone(),
        };
        values.push(value);
    }
    Ok(values)
}

fn key_of(key_indices: &[usize], row: &[TypedValue]) -> Vec<TypedValue> {
    key_indices.iter().map(|&i| row[i].clone()).collect()
}

fn row_map(def: &MetaTableDef, row: &[TypedValue]) -> BTreeMap<String, TypedValue> {
    def.columns.iter()
               .zip(row.iter())
               .map(|(c, v)| (c.name.to_string(), v.clone()))
               .collect()
}

fn key_description(def: &MetaTableDef, key_indices: &[usize], row: &[TypedValue]) -> String {
    key_indices.iter()
               .map(|&i| format!("{} = {}", def.columns[i].name, row[i]))
               .collect::<Vec<String>>()
               .join(", ")
}

/// A row of `def` was just written.  Every table referencing `def` may now hold stale
/// metadata for it, so offer the watcher one refresh scope per dependent table: the
/// child's name, with its foreign-key columns bound to the row's referenced key values.
/// Tables nothing references raise no suggestions.
fn suggest_to_dependents<W>(def: &'static MetaTableDef,
                            row: &[TypedValue],
                            watcher: &mut W) -> Result<()>
where W: ChangeWatcher {
    for (child, fk) in downstream(def.name) {
        let mut context = MetaContext::new(child.name);
        for (child_col, parent_col) in fk.child_columns.iter().zip(fk.parent_columns.iter()) {
            let parent_idx = def.column_index(parent_col)
                                .ok_or_else(|| DbError::UnknownColumn {
                                    table: def.name.to_string(),
                                    column: parent_col.to_string(),
                                })?;
            context.constraints.push((child_col.to_string(), row[parent_idx].clone()));
        }
        watcher.suggest(&context)?;
    }
    Ok(())
}

/// Look a key up in the whole table, ignoring any reconcile condition.  Used when an
/// incoming key misses the condition-scoped old set: the row may still exist outside the
/// subset, and must be updated rather than blindly inserted.
fn fetch_row(conn: &rusqlite::Connection,
             stmts: &TableStatements,
             def: &MetaTableDef,
             key: &[TypedValue]) -> Result<Option<Vec<TypedValue>>> {
    let mut stmt = conn.prepare_cached(&stmts.select_row)?;
    let bindings: Vec<(String, TypedValue)> = key.iter()
                                                 .enumerate()
                                                 .map(|(j, v)| (format!("o{}", j), v.clone()))
                                                 .collect();
    let named = named_bindings(&bindings);
    let params = param_refs(&named);
    let mut rows = stmt.query(&params[..])?;
    match rows.next()? {
        None => Ok(None),
        Some(row) => {
            let mut values = Vec::with_capacity(def.columns.len());
            for (i, c) in def.columns.iter().enumerate() {
                let raw: rusqlite::types::Value = row.get(i)?;
                values.push(typed_value_from_sql(raw, Some(c.value_type)));
            }
            Ok(Some(values))
        },
    }
}

fn bind_new<'a>(row: &'a [TypedValue]) -> Vec<(String, TypedValue)> {
    row.iter()
       .enumerate()
       .map(|(i, v)| (format!("n{}", i), v.clone()))
       .collect()
}

fn bind_old_key(key_indices: &[usize], row: &[TypedValue]) -> Vec<(String, TypedValue)> {
    key_indices.iter()
               .enumerate()
               .map(|(j, &i)| (format!("o{}", j), row[i].clone()))
               .collect()
}

fn execute(conn: &rusqlite::Connection,
           sql: &str,
           bindings: &[(String, TypedValue)]) -> Result<()> {
    let mut stmt = conn.prepare_cached(sql)?;
    let named = named_bindings(bindings);
    let params = param_refs(&named);
    stmt.execute(&params[..])?;
    Ok(())
}

pub(crate) fn reconcile_table<W>(conn: &rusqlite::Connection,
                                 statements: &BTreeMap<&'static str, TableStatements>,
                                 def: &'static MetaTableDef,
                                 new_data: Option<&dyn RowSource>,
                                 condition: Option<&str>,
                                 bindings: &[(String, TypedValue)],
                                 case_sensitive: bool,
                                 watcher: &mut W) -> Result<Vec<MetaStoreChange>>
where W: ChangeWatcher {
    let stmts = statements.get(def.name)
                          .ok_or_else(|| DbError::UnknownMetaTable(def.name.to_string()))?;

    if let Some(data) = new_data {
        if data.column_count() != def.columns.len() {
            bail!(DbError::DataIntegrity {
                table: def.name.to_string(),
                detail: format!("expected {} columns, got {}",
                                def.columns.len(), data.column_count()),
            });
        }
        for i in 0..data.column_count() {
            if data.column_name(i) != def.columns[i].name {
                bail!(DbError::UnknownColumn {
                    table: def.name.to_string(),
                    column: data.column_name(i).to_string(),
                });
            }
        }
    }

    let key_indices = def.key_indices();

    let old_rows = read_rows(conn, stmts, def, condition, bindings)?;
    let mut by_key: BTreeMap<Vec<TypedValue>, usize> = BTreeMap::new();
    for (i, row) in old_rows.iter().enumerate() {
        by_key.insert(key_of(&key_indices, row), i);
    }

    let mut changes = Vec::new();
    let mut retained: BTreeSet<usize> = BTreeSet::new();
    let mut seen_keys: BTreeSet<Vec<TypedValue>> = BTreeSet::new();

    if let Some(data) = new_data {
        for r in 0..data.row_count() {
            let row = prepare_row(def, data, r, case_sensitive)?;
            let key = key_of(&key_indices, &row);
            if !seen_keys.insert(key.clone()) {
                bail!(DbError::DataIntegrity {
                    table: def.name.to_string(),
                    detail: format!("duplicate key in incoming rows ({})",
                                    key_description(def, &key_indices, &row)),
                });
            }

            // The condition bounds which old rows may be compared against or removed; it
            // does not reject incoming keys.  A key that misses the scoped old set may
            // still exist elsewhere in the table, in which case this is a modify of that
            // out-of-scope row, not an insert.
            let existing = match by_key.get(&key) {
                Some(&idx) => {
                    retained.insert(idx);
                    Some(old_rows[idx].clone())
                },
                None if condition.is_some() => fetch_row(conn, stmts, def, &key)?,
                None => None,
            };

            match existing {
                Some(old) => {
                    if old != row {
                        let mut params = bind_new(&row);
                        params.extend(bind_old_key(&key_indices, &old));
                        execute(conn, &stmts.update, &params)?;
                        suggest_to_dependents(def, &row, watcher)?;
                        changes.push(MetaStoreChange::modified(def.name,
                                                               row_map(def, &row),
                                                               row_map(def, &old)));
                    }
                },
                None => {
                    execute(conn, &stmts.insert, &bind_new(&row))?;
                    suggest_to_dependents(def, &row, watcher)?;
                    changes.push(MetaStoreChange::added(def.name, row_map(def, &row)));
                },
            }
        }
    }

    for (i, row) in old_rows.iter().enumerate() {
        if retained.contains(&i) {
            continue;
        }
        prune_dependents(conn, statements, def, row, case_sensitive, watcher, &mut changes)?;
        execute(conn, &stmts.delete, &bind_old_key(&key_indices, row))?;
        changes.push(MetaStoreChange::removed(def.name, row_map(def, row)));
    }

    debug!("reconciled {}: {} incoming, {} kept, {} changes",
           def.name,
           new_data.map_or(0, |d| d.row_count()),
           retained.len(),
           changes.len());

    Ok(changes)
}

/// A row of `def` is about to be deleted: reconcile every table referencing `def` against
/// an empty set, scoped to that row's key, so no orphaned metadata survives.  Grandchild
/// tables are handled by the recursion.
fn prune_dependents<W>(conn: &rusqlite::Connection,
                       statements: &BTreeMap<&'static str, TableStatements>,
                       def: &'static MetaTableDef,
                       row: &[TypedValue],
                       case_sensitive: bool,
                       watcher: &mut W,
                       changes: &mut Vec<MetaStoreChange>) -> Result<()>
where W: ChangeWatcher {
    for (child, fk) in downstream(def.name) {
        let mut clauses = Vec::with_capacity(fk.child_columns.len());
        let mut bindings = Vec::with_capacity(fk.child_columns.len());
        for (i, (child_col, parent_col)) in fk.child_columns.iter()
                                                            .zip(fk.parent_columns.iter())
                                                            .enumerate() {
            let parent_idx = def.column_index(parent_col)
                                .ok_or_else(|| DbError::UnknownColumn {
                                    table: def.name.to_string(),
                                    column: parent_col.to_string(),
                                })?;
            clauses.push(format!("{} = :d{}", child_col, i));
            bindings.push((format!("d{}", i), row[parent_idx].clone()));
        }
        let condition = clauses.join(" AND ");
        let pruned = reconcile_table(conn,
                                     statements,
                                     child,
                                     None,
                                     Some(condition.as_str()),
                                     &bindings,
                                     case_sensitive,
                                     watcher)?;
        changes.extend(pruned);
    }
    Ok(())
}
