// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::collections::BTreeMap;
use std::fmt;

use lodestore_core::TypedValue;

/// The scope of one targeted refresh: a meta table name plus equality constraints on some
/// of its columns.  Constructed per call and discarded; never stored.
///
/// A context is used in both directions: callers hand one to `update_context` to say
/// "refresh this subset", and the store hands one to suggest-update subscribers to say
/// "this subset is probably stale".
#[derive(Clone,Debug,Eq,PartialEq)]
pub struct MetaContext {
    pub table_name: String,
    pub constraints: Vec<(String, TypedValue)>,
}

impl MetaContext {
    pub fn new<S: Into<String>>(table_name: S) -> MetaContext {
        MetaContext {
            table_name: table_name.into(),
            constraints: Vec::new(),
        }
    }

    pub fn with<S, V>(mut self, column: S, value: V) -> MetaContext
    where S: Into<String>, V: Into<TypedValue> {
        self.constraints.push((column.into(), value.into()));
        self
    }
}

impl fmt::Display for MetaContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {{", self.table_name)?;
        for (i, &(ref col, ref value)) in self.constraints.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {}", col, value)?;
        }
        f.write_str("}")
    }
}

#[derive(Clone,Copy,Debug,Eq,Hash,Ord,PartialOrd,PartialEq)]
pub enum ChangeKind {
    Add,
    Modify,
    Remove,
}

/// One row-level mutation applied by a reconcile, delivered to meta-changed observers as
/// part of a batch.  Ephemeral; observers borrow these for the duration of the dispatch.
#[derive(Clone,Debug,Eq,PartialEq)]
pub struct MetaStoreChange {
    pub kind: ChangeKind,
    pub table: String,

    /// The full affected row: new values for `Add` and `Modify`, the removed values for
    /// `Remove`.
    pub row: BTreeMap<String, TypedValue>,

    /// For `Modify` only: the row as it was before the change, key columns included, so
    /// observers can tell which row moved.
    pub old_row: Option<BTreeMap<String, TypedValue>>,
}

impl MetaStoreChange {
    pub fn added(table: &str, row: BTreeMap<String, TypedValue>) -> MetaStoreChange {
        MetaStoreChange {
            kind: ChangeKind::Add,
            table: table.to_string(),
            row: row,
            old_row: None,
        }
    }

    pub fn modified(table: &str,
                    row: BTreeMap<String, TypedValue>,
                    old_row: BTreeMap<String, TypedValue>) -> MetaStoreChange {
        MetaStoreChange {
            kind: ChangeKind::Modify,
            table: table.to_string(),
            row: row,
            old_row: Some(old_row),
        }
    }

    pub fn removed(table: &str, row: BTreeMap<String, TypedValue>) -> MetaStoreChange {
        MetaStoreChange {
            kind: ChangeKind::Remove,
            table: table.to_string(),
            row: row,
            old_row: None,
        }
    }
}
