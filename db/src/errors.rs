// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std;

use rusqlite;

use lodestore_core::ValueType;

pub type Result<T> = std::result::Result<T, DbError>;

#[macro_export]
macro_rules! bail {
    ($e:expr) => (
        return Err($e.into())
    )
}

/// Every way a meta store operation can fail.
///
/// All of these are fatal to the operation that raised them: the store is left exactly as it
/// was before the call (writes happen inside a transaction that is rolled back on error).
#[derive(Debug, Fail)]
pub enum DbError {
    /// The named table is not part of the fixed meta store schema.  This is a programmer
    /// error on the caller's side, not a runtime condition.
    #[fail(display = "unknown meta table: {}", _0)]
    UnknownMetaTable(String),

    #[fail(display = "unknown column {} in meta table {}", column, table)]
    UnknownColumn {
        table: String,
        column: String,
    },

    /// The store's backing file is not something this version can use.
    #[fail(display = "invalid store handle: {}", _0)]
    InvalidHandle(String),

    /// Malformed or ambiguous source data: duplicate key tuples, a null in a key column, or
    /// a row of the wrong width.
    #[fail(display = "bad data for meta table {}: {}", table, detail)]
    DataIntegrity {
        table: String,
        detail: String,
    },

    /// A cell's runtime type disagrees with its column's declared type.
    #[fail(display = "value {} is not a {} (column {} of {})", value, expected, column, table)]
    TypeMismatch {
        table: String,
        column: String,
        expected: ValueType,
        value: String,
    },

    /// `extract` accepts only read-only SELECT statements.
    #[fail(display = "only SELECT statements may be extracted: {}", _0)]
    InvalidExtraction(String),

    /// The provider failed to produce data for a sub-table during a refresh.
    #[fail(display = "provider query for meta table {} failed: {}", table, message)]
    ProviderQuery {
        table: String,
        message: String,
    },

    /// A suggest-update handler refused a proposed update, aborting the operation that
    /// raised the suggestion.
    #[fail(display = "suggested update for {} was refused: {}", table, message)]
    SuggestionVetoed {
        table: String,
        message: String,
    },

    #[fail(display = "storage error: {}", _0)]
    Storage(#[cause] rusqlite::Error),
}

impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> DbError {
        DbError::Storage(e)
    }
}
