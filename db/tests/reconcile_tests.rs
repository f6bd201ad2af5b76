// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

extern crate lodestore_core;
extern crate lodestore_db;

use lodestore_core::{
    RowSet,
    RowSource,
    TypedValue,
};

use lodestore_db::{
    ChangeKind,
    ChangeWatcher,
    DbError,
    MetaContext,
    MetaStore,
    NullWatcher,
    Result,
};

fn schemata(rows: &[(&str, &str, &str)]) -> RowSet {
    let mut rs = RowSet::new(vec!["catalog_name", "schema_name", "schema_owner",
                                  "schema_internal", "schema_default"]);
    for &(catalog, schema, owner) in rows {
        rs.push_row(vec![TypedValue::from(catalog),
                         TypedValue::from(schema),
                         TypedValue::from(owner),
                         TypedValue::Boolean(false),
                         TypedValue::Boolean(false)]);
    }
    rs
}

fn tables_owned(rows: &[(&str, &str, &str, &str)]) -> RowSet {
    let mut rs = RowSet::new(vec!["table_catalog", "table_schema", "table_name",
                                  "table_type", "is_insertable_into", "table_comments",
                                  "table_short_name", "table_full_name", "table_owner"]);
    for &(catalog, schema, table, owner) in rows {
        rs.push_row(vec![TypedValue::from(catalog),
                         TypedValue::from(schema),
                         TypedValue::from(table),
                         TypedValue::from("BASE TABLE"),
                         TypedValue::Boolean(true),
                         TypedValue::Null,
                         TypedValue::from(table),
                         TypedValue::from(format!("{}.{}", schema, table)),
                         TypedValue::from(owner)]);
    }
    rs
}

fn tables(rows: &[(&str, &str, &str)]) -> RowSet {
    let owned: Vec<(&str, &str, &str, &str)> =
        rows.iter().map(|&(c, s, t)| (c, s, t, "admin")).collect();
    tables_owned(&owned)
}

fn columns(rows: &[(&str, &str, &str, &str, i64)]) -> RowSet {
    let mut rs = RowSet::new(vec!["table_catalog", "table_schema", "table_name",
                                  "column_name", "ordinal_position", "column_default",
                                  "is_nullable", "data_type", "character_maximum_length",
                                  "numeric_precision", "numeric_scale", "column_comments"]);
    for &(catalog, schema, table, column, position) in rows {
        rs.push_row(vec![TypedValue::from(catalog),
                         TypedValue::from(schema),
                         TypedValue::from(table),
                         TypedValue::from(column),
                         TypedValue::from(position),
                         TypedValue::Null,
                         TypedValue::Boolean(true),
                         TypedValue::from("text"),
                         TypedValue::Null,
                         TypedValue::Null,
                         TypedValue::Null,
                         TypedValue::Null]);
    }
    rs
}

fn schema_names(store: &MetaStore) -> Vec<String> {
    let rs = store.extract("SELECT schema_name FROM _schemata ORDER BY schema_name", &[])
                  .unwrap();
    rs.rows()
      .iter()
      .map(|row| match row[0] {
          TypedValue::String(ref s) => s.clone(),
          ref v => panic!("expected a string, got {:?}", v),
      })
      .collect()
}

struct Recording(Vec<MetaContext>);

impl ChangeWatcher for Recording {
    fn suggest(&mut self, context: &MetaContext) -> Result<()> {
        self.0.push(context.clone());
        Ok(())
    }
}

struct Vetoing;

impl ChangeWatcher for Vetoing {
    fn suggest(&mut self, context: &MetaContext) -> Result<()> {
        Err(DbError::SuggestionVetoed {
            table: context.table_name.clone(),
            message: "refused by test".to_string(),
        })
    }
}

#[test]
fn test_populate_then_idempotent() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let data = schemata(&[("main", "public", "admin"), ("main", "audit", "admin")]);

    let batch = store.modify("_schemata", Some(&data as &dyn RowSource), None, &[],
                             &mut NullWatcher()).unwrap();
    assert_eq!(batch.len(), 2);
    assert!(batch.iter().all(|c| c.kind == ChangeKind::Add));
    assert_eq!(schema_names(&store), vec!["audit", "public"]);

    // Feeding the identical rows again is a no-op.
    let batch = store.modify("_schemata", Some(&data as &dyn RowSource), None, &[],
                             &mut NullWatcher()).unwrap();
    assert!(batch.is_empty());
}

#[test]
fn test_modify_reports_old_row() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let before = schemata(&[("main", "public", "admin")]);
    store.modify("_schemata", Some(&before as &dyn RowSource), None, &[],
                 &mut NullWatcher()).unwrap();

    let after = schemata(&[("main", "public", "postgres")]);
    let batch = store.modify("_schemata", Some(&after as &dyn RowSource), None, &[],
                             &mut NullWatcher()).unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].kind, ChangeKind::Modify);
    assert_eq!(batch[0].row["schema_owner"], TypedValue::from("postgres"));
    let old = batch[0].old_row.as_ref().unwrap();
    assert_eq!(old["schema_owner"], TypedValue::from("admin"));
}

#[test]
fn test_vanished_rows_are_removed() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let before = schemata(&[("main", "public", "admin"), ("main", "audit", "admin")]);
    store.modify("_schemata", Some(&before as &dyn RowSource), None, &[],
                 &mut NullWatcher()).unwrap();

    let after = schemata(&[("main", "public", "admin")]);
    let batch = store.modify("_schemata", Some(&after as &dyn RowSource), None, &[],
                             &mut NullWatcher()).unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].kind, ChangeKind::Remove);
    assert_eq!(batch[0].row["schema_name"], TypedValue::from("audit"));
    assert_eq!(schema_names(&store), vec!["public"]);
}

#[test]
fn test_none_empties_the_table() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let data = schemata(&[("main", "public", "admin")]);
    store.modify("_schemata", Some(&data as &dyn RowSource), None, &[],
                 &mut NullWatcher()).unwrap();

    let batch = store.modify("_schemata", None, None, &[], &mut NullWatcher()).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].kind, ChangeKind::Remove);
    assert!(schema_names(&store).is_empty());
}

#[test]
fn test_duplicate_keys_rejected_and_nothing_written() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let data = schemata(&[("main", "public", "admin"), ("main", "public", "postgres")]);

    match store.modify("_schemata", Some(&data as &dyn RowSource), None, &[],
                       &mut NullWatcher()) {
        Err(DbError::DataIntegrity { ref table, .. }) => assert_eq!(table, "_schemata"),
        other => panic!("expected DataIntegrity, got {:?}", other),
    }
    assert!(schema_names(&store).is_empty());
}

#[test]
fn test_null_key_rejected() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let mut data = RowSet::new(vec!["catalog_name", "schema_name", "schema_owner",
                                    "schema_internal", "schema_default"]);
    data.push_row(vec![TypedValue::from("main"),
                       TypedValue::Null,
                       TypedValue::Null,
                       TypedValue::Boolean(false),
                       TypedValue::Boolean(false)]);

    match store.modify("_schemata", Some(&data as &dyn RowSource), None, &[],
                       &mut NullWatcher()) {
        Err(DbError::DataIntegrity { .. }) => (),
        other => panic!("expected DataIntegrity, got {:?}", other),
    }
}

#[test]
fn test_type_mismatch_leaves_store_unchanged() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let good = schemata(&[("main", "public", "admin")]);
    store.modify("_schemata", Some(&good as &dyn RowSource), None, &[],
                 &mut NullWatcher()).unwrap();

    // schema_internal is declared boolean.
    let mut bad = RowSet::new(vec!["catalog_name", "schema_name", "schema_owner",
                                   "schema_internal", "schema_default"]);
    bad.push_row(vec![TypedValue::from("main"),
                      TypedValue::from("broken"),
                      TypedValue::Null,
                      TypedValue::from("yes"),
                      TypedValue::Boolean(false)]);

    match store.modify("_schemata", Some(&bad as &dyn RowSource), None, &[],
                       &mut NullWatcher()) {
        Err(DbError::TypeMismatch { ref column, .. }) => assert_eq!(column, "schema_internal"),
        other => panic!("expected TypeMismatch, got {:?}", other),
    }
    assert_eq!(schema_names(&store), vec!["public"]);
}

#[test]
fn test_wrong_column_name_rejected() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let mut data = RowSet::new(vec!["catalog", "schema_name", "schema_owner",
                                    "schema_internal", "schema_default"]);
    data.push_row(vec![TypedValue::from("main"),
                       TypedValue::from("public"),
                       TypedValue::Null,
                       TypedValue::Boolean(false),
                       TypedValue::Boolean(false)]);

    match store.modify("_schemata", Some(&data as &dyn RowSource), None, &[],
                       &mut NullWatcher()) {
        Err(DbError::UnknownColumn { ref column, .. }) => assert_eq!(column, "catalog"),
        other => panic!("expected UnknownColumn, got {:?}", other),
    }
}

#[test]
fn test_unknown_table_rejected() {
    let mut store = MetaStore::open_in_memory().unwrap();
    match store.modify("_nonsense", None, None, &[], &mut NullWatcher()) {
        Err(DbError::UnknownMetaTable(ref name)) => assert_eq!(name, "_nonsense"),
        other => panic!("expected UnknownMetaTable, got {:?}", other),
    }
}

#[test]
fn test_identifiers_fold_unless_quoted() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let data = schemata(&[("Main", "\"Public\"", "Admin")]);
    store.modify("_schemata", Some(&data as &dyn RowSource), None, &[],
                 &mut NullWatcher()).unwrap();

    let rs = store.extract("SELECT catalog_name, schema_name, schema_owner FROM _schemata",
                           &[]).unwrap();
    // catalog_name and schema_name are identifier columns; schema_owner is plain data.
    assert_eq!(rs.rows()[0][0], TypedValue::from("main"));
    assert_eq!(rs.rows()[0][1], TypedValue::from("\"Public\""));
    assert_eq!(rs.rows()[0][2], TypedValue::from("Admin"));
}

#[test]
fn test_case_sensitive_store_quotes_mixed_case() {
    let mut store = MetaStore::open_in_memory().unwrap();
    store.set_case_sensitive(true);
    let data = schemata(&[("main", "MySchema", "admin")]);
    store.modify("_schemata", Some(&data as &dyn RowSource), None, &[],
                 &mut NullWatcher()).unwrap();
    assert_eq!(schema_names(&store), vec!["\"MySchema\""]);
}

#[test]
fn test_condition_scopes_the_diff() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let all = tables(&[("main", "public", "users"),
                       ("main", "public", "orders"),
                       ("main", "audit", "log")]);
    store.modify("_tables", Some(&all as &dyn RowSource), None, &[],
                 &mut NullWatcher()).unwrap();

    // Rework only the public schema: orders is gone, items is new.  audit.log is outside
    // the condition and must survive.
    let public = tables(&[("main", "public", "users"), ("main", "public", "items")]);
    let bindings = vec![("schema".to_string(), TypedValue::from("public"))];
    let batch = store.modify("_tables", Some(&public as &dyn RowSource),
                             Some("table_schema = :schema"), &bindings,
                             &mut NullWatcher()).unwrap();

    let kinds: Vec<(ChangeKind, TypedValue)> =
        batch.iter().map(|c| (c.kind, c.row["table_name"].clone())).collect();
    assert_eq!(kinds, vec![(ChangeKind::Add, TypedValue::from("items")),
                           (ChangeKind::Remove, TypedValue::from("orders"))]);

    let rs = store.extract("SELECT table_name FROM _tables ORDER BY table_name", &[])
                  .unwrap();
    assert_eq!(rs.rows().len(), 3);
    assert_eq!(rs.rows()[1][0], TypedValue::from("log"));
}

#[test]
fn test_out_of_band_rows_under_condition_are_adopted() {
    // A row inserted outside the condition's subset is invisible to the diff and
    // untouched; one inside the subset but absent from the incoming data is removed.
    let mut store = MetaStore::open_in_memory().unwrap();
    let all = tables(&[("main", "public", "users"), ("main", "audit", "log")]);
    store.modify("_tables", Some(&all as &dyn RowSource), None, &[],
                 &mut NullWatcher()).unwrap();

    let empty = tables(&[]);
    let bindings = vec![("schema".to_string(), TypedValue::from("audit"))];
    let batch = store.modify("_tables", Some(&empty as &dyn RowSource),
                             Some("table_schema = :schema"), &bindings,
                             &mut NullWatcher()).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].row["table_name"], TypedValue::from("log"));

    let rs = store.extract("SELECT table_name FROM _tables", &[]).unwrap();
    assert_eq!(rs.rows().len(), 1);
    assert_eq!(rs.rows()[0][0], TypedValue::from("users"));
}

#[test]
fn test_incoming_key_outside_condition_updates_existing_row() {
    // The condition only bounds which old rows are compared or removed.  An incoming row
    // whose key already exists outside the conditioned subset must land as a modify of
    // that row, not collide with it on insert.
    let mut store = MetaStore::open_in_memory().unwrap();
    let all = tables(&[("main", "public", "users"), ("main", "audit", "log")]);
    store.modify("_tables", Some(&all as &dyn RowSource), None, &[],
                 &mut NullWatcher()).unwrap();

    let incoming = tables_owned(&[("main", "public", "users", "admin"),
                                  ("main", "audit", "log", "postgres")]);
    let bindings = vec![("schema".to_string(), TypedValue::from("public"))];
    let batch = store.modify("_tables", Some(&incoming as &dyn RowSource),
                             Some("table_schema = :schema"), &bindings,
                             &mut NullWatcher()).unwrap();

    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].kind, ChangeKind::Modify);
    assert_eq!(batch[0].row["table_name"], TypedValue::from("log"));
    assert_eq!(batch[0].row["table_owner"], TypedValue::from("postgres"));
    let old = batch[0].old_row.as_ref().unwrap();
    assert_eq!(old["table_owner"], TypedValue::from("admin"));

    // Still two rows: nothing was inserted and the out-of-scope row was not removed.
    let rs = store.extract("SELECT table_name, table_owner FROM _tables \
                            ORDER BY table_name", &[]).unwrap();
    assert_eq!(rs.rows().len(), 2);
    assert_eq!(rs.rows()[0][1], TypedValue::from("postgres"));
    assert_eq!(rs.rows()[1][1], TypedValue::from("admin"));
}

#[test]
fn test_unchanged_key_outside_condition_is_a_noop() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let all = tables(&[("main", "public", "users"), ("main", "audit", "log")]);
    store.modify("_tables", Some(&all as &dyn RowSource), None, &[],
                 &mut NullWatcher()).unwrap();

    // audit.log reappears byte-identical under a public-only condition: no change at
    // all, and in particular no remove.
    let incoming = tables(&[("main", "public", "users"), ("main", "audit", "log")]);
    let bindings = vec![("schema".to_string(), TypedValue::from("public"))];
    let batch = store.modify("_tables", Some(&incoming as &dyn RowSource),
                             Some("table_schema = :schema"), &bindings,
                             &mut NullWatcher()).unwrap();
    assert!(batch.is_empty());
}

#[test]
fn test_removal_prunes_dependents_first() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let t = tables(&[("main", "public", "users"), ("main", "public", "orders")]);
    store.modify("_tables", Some(&t as &dyn RowSource), None, &[],
                 &mut NullWatcher()).unwrap();
    let c = columns(&[("main", "public", "users", "id", 1),
                      ("main", "public", "orders", "id", 1),
                      ("main", "public", "orders", "total", 2)]);
    store.modify("_columns", Some(&c as &dyn RowSource), None, &[],
                 &mut NullWatcher()).unwrap();

    let t = tables(&[("main", "public", "users")]);
    let batch = store.modify("_tables", Some(&t as &dyn RowSource), None, &[],
                             &mut NullWatcher()).unwrap();

    // Both orders columns go, then the orders row itself.
    assert_eq!(batch.len(), 3);
    assert!(batch.iter().all(|change| change.kind == ChangeKind::Remove));
    assert_eq!(batch[0].table, "_columns");
    assert_eq!(batch[1].table, "_columns");
    assert_eq!(batch[2].table, "_tables");

    let rs = store.extract("SELECT table_name, column_name FROM _columns", &[]).unwrap();
    assert_eq!(rs.rows().len(), 1);
    assert_eq!(rs.rows()[0][0], TypedValue::from("users"));
}

#[test]
fn test_watcher_gets_one_context_per_dependent_table() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let mut watcher = Recording(Vec::new());
    let data = tables(&[("main", "public", "users")]);
    store.modify("_tables", Some(&data as &dyn RowSource), None, &[],
                 &mut watcher).unwrap();

    // One added row, two tables that reference _tables: the suggested refresh scopes
    // name the dependents, keyed by the foreign-key columns.
    let contexts: Vec<String> = watcher.0.iter().map(|c| c.to_string()).collect();
    assert_eq!(contexts,
               vec!["_columns {table_catalog = 'main', table_schema = 'public', \
                     table_name = 'users'}",
                    "_table_constraints {table_catalog = 'main', table_schema = 'public', \
                     table_name = 'users'}"]);

    // A modify raises the same dependent scopes again.
    let mut watcher = Recording(Vec::new());
    let data = tables_owned(&[("main", "public", "users", "postgres")]);
    store.modify("_tables", Some(&data as &dyn RowSource), None, &[],
                 &mut watcher).unwrap();
    assert_eq!(watcher.0.len(), 2);
    assert_eq!(watcher.0[0].table_name, "_columns");
    assert_eq!(watcher.0[1].table_name, "_table_constraints");
}

#[test]
fn test_no_suggestions_for_tables_without_dependents() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let t = tables(&[("main", "public", "users")]);
    store.modify("_tables", Some(&t as &dyn RowSource), None, &[],
                 &mut NullWatcher()).unwrap();

    let mut watcher = Recording(Vec::new());
    let c = columns(&[("main", "public", "users", "id", 1)]);
    store.modify("_columns", Some(&c as &dyn RowSource), None, &[],
                 &mut watcher).unwrap();
    assert!(watcher.0.is_empty());
}

#[test]
fn test_watcher_veto_rolls_back() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let data = schemata(&[("main", "public", "admin")]);
    match store.modify("_schemata", Some(&data as &dyn RowSource), None, &[],
                       &mut Vetoing) {
        Err(DbError::SuggestionVetoed { .. }) => (),
        other => panic!("expected SuggestionVetoed, got {:?}", other),
    }
    assert!(schema_names(&store).is_empty());
}

#[test]
fn test_extract_binds_named_parameters() {
    let mut store = MetaStore::open_in_memory().unwrap();
    let data = schemata(&[("main", "public", "admin"), ("main", "audit", "admin")]);
    store.modify("_schemata", Some(&data as &dyn RowSource), None, &[],
                 &mut NullWatcher()).unwrap();

    let bindings = vec![("name".to_string(), TypedValue::from("audit"))];
    let rs = store.extract("SELECT catalog_name, schema_internal FROM _schemata \
                            WHERE schema_name = :name", &bindings).unwrap();
    assert_eq!(rs.rows().len(), 1);
    assert_eq!(rs.rows()[0][0], TypedValue::from("main"));
    // Declared types are recovered by column name: booleans come back as booleans.
    assert_eq!(rs.rows()[0][1], TypedValue::Boolean(false));
}
