// Copyright 2018 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Notification plumbing for the meta store.
//!
//! Two independent registries live here.  `ObservationService` holds observers that are
//! told, after a batch of changes has been committed, which rows changed; an observer can
//! restrict itself to a set of tables it cares about.  `SuggestionService` holds update
//! suggesters, which are consulted during reconciliation, inside the write transaction,
//! and can veto it.
//!
//! Dispatch is synchronous and in registration order.  Observers run after commit and
//! cannot affect the outcome; suggesters run before commit and can.

use std::collections::BTreeSet;

use std::sync::Arc;

use indexmap::IndexMap;

use errors::Result;

use types::{
    MetaContext,
    MetaStoreChange,
};

pub struct MetaObserver {
    tables: BTreeSet<String>,
    notify_fn: Arc<Box<dyn Fn(&str, &[&MetaStoreChange]) + Send + Sync>>,
}

impl MetaObserver {
    /// An observer notified only for changes to the given tables.  An empty set means
    /// every table.
    pub fn new<F>(tables: BTreeSet<String>, notify_fn: F) -> MetaObserver
    where F: Fn(&str, &[&MetaStoreChange]) + 'static + Send + Sync {
        MetaObserver {
            tables: tables,
            notify_fn: Arc::new(Box::new(notify_fn)),
        }
    }

    fn applicable_changes<'a>(&self, batch: &'a [MetaStoreChange]) -> Vec<&'a MetaStoreChange> {
        batch.iter()
             .filter(|change| self.tables.is_empty() || self.tables.contains(&change.table))
             .collect()
    }

    fn notify(&self, key: &str, changes: &[&MetaStoreChange]) {
        (*self.notify_fn)(key, changes);
    }
}

#[derive(Default)]
pub struct ObservationService {
    observers: IndexMap<String, Arc<MetaObserver>>,
}

impl ObservationService {
    pub fn new() -> Self {
        ObservationService {
            observers: IndexMap::new(),
        }
    }

    pub fn register(&mut self, key: String, observer: Arc<MetaObserver>) {
        self.observers.insert(key, observer);
    }

    pub fn deregister(&mut self, key: &String) {
        self.observers.remove(key);
    }

    pub fn is_registered(&self, key: &String) -> bool {
        self.observers.contains_key(key)
    }

    pub fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    /// Tell every interested observer about a committed batch.  An observer with no
    /// applicable changes is skipped entirely rather than called with an empty slice.
    pub fn changes_did_apply(&self, batch: &[MetaStoreChange]) {
        if batch.is_empty() {
            return;
        }
        for (key, observer) in self.observers.iter() {
            let applicable = observer.applicable_changes(batch);
            if !applicable.is_empty() {
                observer.notify(key, &applicable);
            }
        }
    }
}

/// Consulted when a reconciliation adds or modifies a row other tables depend on.
/// Returning an error vetoes the batch: the transaction rolls back and the error is
/// surfaced to the caller.
pub trait UpdateSuggester: Send {
    fn suggest_update(&mut self, context: &MetaContext) -> Result<()>;
}

#[derive(Default)]
pub struct SuggestionService {
    suggesters: IndexMap<String, Box<dyn UpdateSuggester>>,
}

impl SuggestionService {
    pub fn new() -> Self {
        SuggestionService {
            suggesters: IndexMap::new(),
        }
    }

    pub fn register(&mut self, key: String, suggester: Box<dyn UpdateSuggester>) {
        self.suggesters.insert(key, suggester);
    }

    pub fn deregister(&mut self, key: &String) {
        self.suggesters.remove(key);
    }

    pub fn is_registered(&self, key: &String) -> bool {
        self.suggesters.contains_key(key)
    }

    /// Offer a context to every suggester in registration order, stopping at the first
    /// veto.
    pub fn suggest(&mut self, context: &MetaContext) -> Result<()> {
        for (_, suggester) in self.suggesters.iter_mut() {
            suggester.suggest_update(context)?;
        }
        Ok(())
    }
}
