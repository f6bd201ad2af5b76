// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

extern crate lodestore;

use std::collections::BTreeSet;

use std::sync::{
    Arc,
    Mutex,
};

use lodestore::{
    CatalogProvider,
    ChangeKind,
    CURRENT_VERSION,
    DbError,
    LodestoreError,
    MetaContext,
    MetaObserver,
    MetaStoreChange,
    MetaTableDef,
    RowSet,
    RowSource,
    Store,
    TypedValue,
    UpdateSuggester,
};

fn schemata(rows: &[(&str, &str)]) -> RowSet {
    let mut rs = RowSet::new(vec!["catalog_name", "schema_name", "schema_owner",
                                  "schema_internal", "schema_default"]);
    for &(catalog, schema) in rows {
        rs.push_row(vec![TypedValue::from(catalog),
                         TypedValue::from(schema),
                         TypedValue::Null,
                         TypedValue::Boolean(false),
                         TypedValue::Boolean(false)]);
    }
    rs
}

/// Remembers, per notification, which key it arrived under and what the batch held.
fn recording_observer(tables: BTreeSet<String>,
                      log: Arc<Mutex<Vec<(String, Vec<(ChangeKind, String)>)>>>) -> MetaObserver {
    MetaObserver::new(tables, move |key, changes: &[&MetaStoreChange]| {
        let summary = changes.iter()
                             .map(|c| (c.kind, c.table.clone()))
                             .collect();
        log.lock().unwrap().push((key.to_string(), summary));
    })
}

#[test]
fn test_observers_hear_each_committed_batch_once() {
    let mut store = Store::open_in_memory().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    store.register_observer("all".to_string(),
                            Arc::new(recording_observer(BTreeSet::new(), Arc::clone(&log))));
    assert!(store.is_registered_as_observer(&"all".to_string()));

    let data = schemata(&[("main", "public"), ("main", "audit")]);
    store.modify("_schemata", Some(&data as &dyn RowSource), None, &[]).unwrap();

    let data = schemata(&[("main", "public")]);
    store.modify("_schemata", Some(&data as &dyn RowSource), None, &[]).unwrap();

    // Two writes, two notifications: one batch of two adds, one of a single remove.
    let log = log.lock().unwrap();
    assert_eq!(*log,
               vec![("all".to_string(),
                     vec![(ChangeKind::Add, "_schemata".to_string()),
                          (ChangeKind::Add, "_schemata".to_string())]),
                    ("all".to_string(),
                     vec![(ChangeKind::Remove, "_schemata".to_string())])]);
}

#[test]
fn test_empty_batches_are_not_dispatched() {
    let mut store = Store::open_in_memory().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    store.register_observer("all".to_string(),
                            Arc::new(recording_observer(BTreeSet::new(), Arc::clone(&log))));

    let data = schemata(&[("main", "public")]);
    store.modify("_schemata", Some(&data as &dyn RowSource), None, &[]).unwrap();
    // The same rows again change nothing, so nobody is called.
    store.modify("_schemata", Some(&data as &dyn RowSource), None, &[]).unwrap();

    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn test_unregistered_observer_is_silent() {
    let mut store = Store::open_in_memory().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let key = "gone".to_string();
    store.register_observer(key.clone(),
                            Arc::new(recording_observer(BTreeSet::new(), Arc::clone(&log))));
    store.unregister_observer(&key);
    assert!(!store.is_registered_as_observer(&key));

    let data = schemata(&[("main", "public")]);
    store.modify("_schemata", Some(&data as &dyn RowSource), None, &[]).unwrap();
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_registered_suggester_can_veto_a_modify() {
    struct Vetoing;
    impl UpdateSuggester for Vetoing {
        fn suggest_update(&mut self, context: &MetaContext) -> lodestore::lodestore_db::Result<()> {
            Err(DbError::SuggestionVetoed {
                table: context.table_name.clone(),
                message: "no".to_string(),
            })
        }
    }

    let mut store = Store::open_in_memory().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    store.register_observer("all".to_string(),
                            Arc::new(recording_observer(BTreeSet::new(), Arc::clone(&log))));
    store.register_suggester("veto".to_string(), Box::new(Vetoing));

    let data = schemata(&[("main", "public")]);
    match store.modify("_schemata", Some(&data as &dyn RowSource), None, &[]) {
        Err(LodestoreError::DbError(DbError::SuggestionVetoed { .. })) => (),
        other => panic!("expected SuggestionVetoed, got {:?}", other),
    }

    // The write rolled back, so observers heard nothing and the table stayed empty.
    assert!(log.lock().unwrap().is_empty());
    let rs = store.extract("SELECT * FROM _schemata", &[]).unwrap();
    assert!(rs.is_empty());
}

#[test]
fn test_suggest_update_relays_to_suggesters() {
    struct Recording(Arc<Mutex<Vec<String>>>);
    impl UpdateSuggester for Recording {
        fn suggest_update(&mut self, context: &MetaContext) -> lodestore::lodestore_db::Result<()> {
            self.0.lock().unwrap().push(context.to_string());
            Ok(())
        }
    }

    let mut store = Store::open_in_memory().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    store.register_suggester("log".to_string(), Box::new(Recording(Arc::clone(&seen))));

    let context = MetaContext::new("_columns").with("table_name", "users");
    store.suggest_update(&context).unwrap();

    assert_eq!(*seen.lock().unwrap(),
               vec!["_columns {table_name = 'users'}".to_string()]);
}

struct OneTableProvider(RowSet);

impl CatalogProvider for OneTableProvider {
    fn fetch_meta(&mut self,
                  table: &'static MetaTableDef,
                  _context: Option<&MetaContext>) -> lodestore::lodestore_db::Result<Option<RowSet>> {
        if table.name == "_schemata" {
            Ok(Some(self.0.clone()))
        } else {
            Ok(None)
        }
    }
}

#[test]
fn test_update_all_notifies_after_commit() {
    let mut store = Store::open_in_memory().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut tables = BTreeSet::new();
    tables.insert("_schemata".to_string());
    store.register_observer("schemata".to_string(),
                            Arc::new(recording_observer(tables, Arc::clone(&log))));

    let mut provider = OneTableProvider(schemata(&[("main", "public"), ("main", "audit")]));
    let batch = store.update_all(&mut provider).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[test]
fn test_version_survives_reopen() {
    let path = ::std::env::temp_dir().join(format!("lodestore-test-{}.db",
                                                   ::std::process::id()));
    let _ = ::std::fs::remove_file(&path);

    {
        let mut store = Store::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), CURRENT_VERSION);
        let data = schemata(&[("main", "public")]);
        store.modify("_schemata", Some(&data as &dyn RowSource), None, &[]).unwrap();
    }

    {
        let store = Store::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), CURRENT_VERSION);
        let rs = store.extract("SELECT schema_name FROM _schemata", &[]).unwrap();
        assert_eq!(rs.rows()[0][0], TypedValue::from("public"));
    }

    let _ = ::std::fs::remove_file(&path);
}
