// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use types::TypedValue;

/// A rectangular set of named, typed columns.
///
/// This is the interface between the meta store and everything that produces row data for
/// it: a provider marshaling a live catalog query, an `extract` result, or a test fixture.
/// Consumers address cells by position; column names are carried for diagnostics and for
/// callers that want to label output.
pub trait RowSource {
    fn row_count(&self) -> usize;
    fn column_count(&self) -> usize;
    fn column_name(&self, col: usize) -> &str;
    fn value_at(&self, row: usize, col: usize) -> &TypedValue;
}

/// An owned, in-memory `RowSource`.
#[derive(Clone,Debug,Default,Eq,PartialEq)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<TypedValue>>,
}

impl RowSet {
    pub fn new<I, S>(columns: I) -> RowSet where I: IntoIterator<Item = S>, S: Into<String> {
        RowSet {
            columns: columns.into_iter().map(|c| c.into()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append one row.  The row must be as wide as the column list.
    pub fn push_row<I>(&mut self, row: I) where I: IntoIterator<Item = TypedValue> {
        let row: Vec<TypedValue> = row.into_iter().collect();
        assert_eq!(row.len(), self.columns.len(),
                   "a RowSet row must match its column list");
        self.rows.push(row);
    }

    pub fn add_row<I>(mut self, row: I) -> RowSet where I: IntoIterator<Item = TypedValue> {
        self.push_row(row);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<TypedValue>] {
        &self.rows
    }

    /// Rows in an order-insensitive form, for comparing extraction results against fixtures.
    pub fn sorted_rows(&self) -> Vec<Vec<TypedValue>> {
        let mut rows = self.rows.clone();
        rows.sort();
        rows
    }
}

impl RowSource for RowSet {
    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name(&self, col: usize) -> &str {
        &self.columns[col]
    }

    fn value_at(&self, row: usize, col: usize) -> &TypedValue {
        &self.rows[row][col]
    }
}
