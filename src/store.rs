// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The public face of a lodestore: a `MetaStore` handle bundled with the notification
//! services around it.
//!
//! `Store` owns the wiring the lower layer stays out of: registered observers get the
//! batch of changes once a write operation has committed, and registered suggesters are
//! consulted from inside the write transaction, where they can still veto it.  Both
//! registries sit behind mutexes, so registration and writes can come from different
//! threads.

use std::path::Path;

use std::sync::{
    Arc,
    Mutex,
};

use lodestore_core::{
    RowSet,
    RowSource,
    TypedValue,
};

use lodestore_db::{
    CatalogProvider,
    ChangeWatcher,
    MetaContext,
    MetaObserver,
    MetaStore,
    MetaStoreChange,
    ObservationService,
    SuggestionService,
    UpdateSuggester,
};

use errors::Result;

/// Bridges the reconciliation engine's watcher seam to the registered suggesters.
struct SuggestingWatcher<'a> {
    service: &'a mut SuggestionService,
}

impl<'a> ChangeWatcher for SuggestingWatcher<'a> {
    fn suggest(&mut self, context: &MetaContext) -> ::lodestore_db::Result<()> {
        self.service.suggest(context)
    }
}

pub struct Store {
    store: MetaStore,
    observer_service: Mutex<ObservationService>,
    suggestion_service: Mutex<SuggestionService>,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Store> {
        let store = MetaStore::open(path)?;
        Ok(Store::with_store(store))
    }

    pub fn open_in_memory() -> Result<Store> {
        let store = MetaStore::open_in_memory()?;
        Ok(Store::with_store(store))
    }

    fn with_store(store: MetaStore) -> Store {
        Store {
            store: store,
            observer_service: Mutex::new(ObservationService::new()),
            suggestion_service: Mutex::new(SuggestionService::new()),
        }
    }

    pub fn register_observer(&mut self, key: String, observer: Arc<MetaObserver>) {
        self.observer_service.lock().unwrap().register(key, observer);
    }

    pub fn unregister_observer(&mut self, key: &String) {
        self.observer_service.lock().unwrap().deregister(key);
    }

    pub fn is_registered_as_observer(&self, key: &String) -> bool {
        self.observer_service.lock().unwrap().is_registered(key)
    }

    pub fn register_suggester(&mut self, key: String, suggester: Box<dyn UpdateSuggester>) {
        self.suggestion_service.lock().unwrap().register(key, suggester);
    }

    pub fn unregister_suggester(&mut self, key: &String) {
        self.suggestion_service.lock().unwrap().deregister(key);
    }

    /// Relay an externally observed "this subset is probably stale" signal to the
    /// registered suggesters, e.g. when a provider notices a DDL change on its own
    /// connection.  The store itself performs no refresh; a suggester returning an error
    /// vetoes, and the error is passed back to the signaling caller.
    pub fn suggest_update(&mut self, context: &MetaContext) -> Result<()> {
        self.suggestion_service.lock().unwrap().suggest(context)?;
        Ok(())
    }

    fn dispatch(&self, batch: &[MetaStoreChange]) {
        self.observer_service.lock().unwrap().changes_did_apply(batch);
    }

    /// Reconcile one meta table against `new_data`, raising update suggestions as rows
    /// land and notifying observers once the batch has committed.
    ///
    /// See `MetaStore::modify` for the shape of `condition` and `bindings`.
    pub fn modify(&mut self,
                  table_name: &str,
                  new_data: Option<&dyn RowSource>,
                  condition: Option<&str>,
                  bindings: &[(String, TypedValue)]) -> Result<Vec<MetaStoreChange>> {
        let batch = {
            let mut service = self.suggestion_service.lock().unwrap();
            let mut watcher = SuggestingWatcher { service: &mut *service };
            self.store.modify(table_name, new_data, condition, bindings, &mut watcher)?
        };
        self.dispatch(&batch);
        Ok(batch)
    }

    /// Refresh the entire meta store from `provider` in one transaction.  Observers hear
    /// about the accumulated changes once, after the commit.
    pub fn update_all<P>(&mut self, provider: &mut P) -> Result<Vec<MetaStoreChange>>
    where P: CatalogProvider {
        let batch = self.store.update_all(provider)?;
        self.dispatch(&batch);
        Ok(batch)
    }

    /// Refresh one context's worth of metadata from `provider`.  Suggestions raised by
    /// new or changed rows go to the registered suggesters, inside the transaction.
    pub fn update_context<P>(&mut self,
                             context: &MetaContext,
                             provider: &mut P) -> Result<Vec<MetaStoreChange>>
    where P: CatalogProvider {
        let batch = {
            let mut service = self.suggestion_service.lock().unwrap();
            let mut watcher = SuggestingWatcher { service: &mut *service };
            self.store.update_context(context, provider, &mut watcher)?
        };
        self.dispatch(&batch);
        Ok(batch)
    }

    pub fn extract(&self, select: &str, bindings: &[(String, TypedValue)]) -> Result<RowSet> {
        let rows = self.store.extract(select, bindings)?;
        Ok(rows)
    }

    pub fn schema_version(&self) -> Result<i32> {
        let version = self.store.schema_version()?;
        Ok(version)
    }

    pub fn set_case_sensitive(&mut self, case_sensitive: bool) {
        self.store.set_case_sensitive(case_sensitive);
    }

    pub fn case_sensitive(&self) -> bool {
        self.store.case_sensitive()
    }
}
