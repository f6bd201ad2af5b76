// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! Lodestore keeps a queryable, versioned cache of SQL catalog metadata, shaped after
//! `information_schema`, and keeps it current by diffing fresh catalog snapshots against
//! what it already holds.
//!
//! Open a `Store`, hand it a `CatalogProvider` for the database you care about, and call
//! `update_all` or `update_context`; query the result with `extract`.  Observers hear
//! about committed changes row by row; suggesters get a say before a change commits.

extern crate failure;
#[macro_use] extern crate failure_derive;

pub extern crate lodestore_core;
pub extern crate lodestore_db;

pub mod errors;
pub mod store;

pub use errors::{
    LodestoreError,
    Result,
};

pub use store::Store;

pub use lodestore_core::{
    RowSet,
    RowSource,
    TypedValue,
    ValueType,
    normalize_identifier,
};

pub use lodestore_db::{
    CatalogProvider,
    ChangeKind,
    ChangeWatcher,
    CURRENT_VERSION,
    DbError,
    MetaContext,
    MetaObserver,
    MetaStoreChange,
    MetaTableDef,
    META_TABLES,
    UpdateSuggester,
    table_def,
};
