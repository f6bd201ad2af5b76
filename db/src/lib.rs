// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

extern crate failure;
#[macro_use] extern crate failure_derive;
extern crate indexmap;
extern crate itertools;
#[macro_use] extern crate lazy_static;
#[macro_use] extern crate log;
extern crate rusqlite;

extern crate lodestore_core;

#[macro_use] pub mod errors;
pub mod observer;
mod reconcile;
pub mod refresh;
pub mod schema;
pub mod store;
pub mod types;
pub mod watcher;

pub use errors::{
    DbError,
    Result,
};

pub use observer::{
    MetaObserver,
    ObservationService,
    SuggestionService,
    UpdateSuggester,
};

pub use refresh::{
    CatalogProvider,
};

pub use schema::{
    MetaColumnDef,
    MetaFkDef,
    MetaTableDef,
    META_TABLES,
    declared_column_type,
    table_def,
};

pub use store::{
    CURRENT_VERSION,
    MetaStore,
};

pub use types::{
    ChangeKind,
    MetaContext,
    MetaStoreChange,
};

pub use watcher::{
    ChangeWatcher,
    NullWatcher,
};
