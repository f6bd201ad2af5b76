// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Refresh orchestration: walking the meta schema and reconciling each table against
//! whatever a `CatalogProvider` reports.
//!
//! A full refresh (`update_all`) visits every registry table in dependency order inside
//! one transaction, so parents are settled before the tables that reference them and a
//! failure partway through leaves nothing half-applied.  A scoped refresh
//! (`update_context`) reconciles a single table subset and lets a watcher chase the
//! dependencies it cares about.

use lodestore_core::{
    RowSource,
    RowSet,
    TypedValue,
    normalize_identifier,
};

use errors::{
    DbError,
    Result,
};

use reconcile;

use schema::{
    MetaTableDef,
    META_TABLES,
};

use store::MetaStore;

use types::{
    MetaContext,
    MetaStoreChange,
};

use watcher::{
    ChangeWatcher,
    NullWatcher,
};

/// A source of catalog metadata, usually a live connection to the database whose catalog
/// the store mirrors.
///
/// `fetch_meta` returns the rows that currently belong in `table` (restricted to
/// `context` when one is given), shaped exactly like the table's column list.  Returning
/// `Ok(None)` means the provider cannot produce this table at all; the orchestrator
/// skips it, leaving the cached rows alone.  Returning an error aborts the refresh.
pub trait CatalogProvider {
    fn fetch_meta(&mut self,
                  table: &'static MetaTableDef,
                  context: Option<&MetaContext>) -> Result<Option<RowSet>>;
}

impl MetaStore {
    /// Refresh every meta table from `provider`, in dependency order, in one
    /// transaction.  Returns the accumulated changes; an error rolls all of it back.
    ///
    /// No update suggestions are raised: the walk itself visits every dependent table,
    /// so chasing suggestions would only reconcile each of them twice.
    pub fn update_all<P>(&mut self, provider: &mut P) -> Result<Vec<MetaStoreChange>>
    where P: CatalogProvider {
        let case_sensitive = self.case_sensitive();
        let tx = self.conn.transaction()?;
        let mut batch = Vec::new();
        for def in META_TABLES.iter() {
            match provider.fetch_meta(def, None) {
                Ok(Some(rows)) => {
                    let changes = reconcile::reconcile_table(&tx,
                                                             &self.statements,
                                                             def,
                                                             Some(&rows as &dyn RowSource),
                                                             None,
                                                             &[],
                                                             case_sensitive,
                                                             &mut NullWatcher())?;
                    batch.extend(changes);
                },
                Ok(None) => {
                    warn!("provider has no data for {}; keeping cached rows", def.name);
                },
                Err(e) => {
                    bail!(DbError::ProviderQuery {
                        table: def.name.to_string(),
                        message: e.to_string(),
                    });
                },
            }
        }
        tx.commit()?;
        info!("full refresh applied {} changes", batch.len());
        Ok(batch)
    }

    /// Refresh the subset of one meta table described by `context`.
    ///
    /// Constraint columns are checked against the table definition and identifier-valued
    /// constraints are normalized before anything touches the provider, so a context
    /// written with quoted or mixed-case names selects the same rows a refresh would
    /// store.  New and changed rows raise suggestions through `watcher`, which is how
    /// dependent subsets get refreshed in turn.
    pub fn update_context<P, W>(&mut self,
                                context: &MetaContext,
                                provider: &mut P,
                                watcher: &mut W) -> Result<Vec<MetaStoreChange>>
    where P: CatalogProvider, W: ChangeWatcher {
        let def = self.table(&context.table_name)?;
        let case_sensitive = self.case_sensitive();

        let mut clauses = Vec::with_capacity(context.constraints.len());
        let mut bindings = Vec::with_capacity(context.constraints.len());
        let mut scoped = MetaContext::new(def.name);
        for (i, &(ref column, ref value)) in context.constraints.iter().enumerate() {
            let idx = def.column_index(column)
                         .ok_or_else(|| DbError::UnknownColumn {
                             table: def.name.to_string(),
                             column: column.clone(),
                         })?;
            let c = &def.columns[idx];
            if !value.matches(c.value_type) {
                bail!(DbError::TypeMismatch {
                    table: def.name.to_string(),
                    column: c.name.to_string(),
                    expected: c.value_type,
                    value: value.to_string(),
                });
            }
            let value = match *value {
                TypedValue::String(ref s) if def.is_ident_column(idx) => {
                    TypedValue::String(normalize_identifier(s, case_sensitive))
                },
                ref v => v.clone(),
            };
            clauses.push(format!("{} = :f{}", column, i));
            bindings.push((format!("f{}", i), value.clone()));
            scoped.constraints.push((column.clone(), value));
        }

        let fetched = match provider.fetch_meta(def, Some(&scoped)) {
            Ok(rows) => rows,
            Err(e) => {
                bail!(DbError::ProviderQuery {
                    table: def.name.to_string(),
                    message: e.to_string(),
                });
            },
        };

        let rows = match fetched {
            Some(rows) => rows,
            None => {
                warn!("provider has no data for {}; keeping cached rows", def.name);
                return Ok(Vec::new());
            },
        };

        let condition = clauses.join(" AND ");
        let condition = if clauses.is_empty() { None } else { Some(condition.as_str()) };
        let tx = self.conn.transaction()?;
        let changes = reconcile::reconcile_table(&tx,
                                                 &self.statements,
                                                 def,
                                                 Some(&rows as &dyn RowSource),
                                                 condition,
                                                 &bindings,
                                                 case_sensitive,
                                                 watcher)?;
        tx.commit()?;
        Ok(changes)
    }
}
