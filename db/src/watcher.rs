// Copyright 2018 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! A trait for observing a reconciliation as it proceeds, from inside the write
//! transaction.  The interesting hook is `suggest`: when a row appears or changes in a
//! table that other tables depend on, the watcher is offered one refresh scope per
//! dependent table, and may veto the whole batch by returning an error.

use errors::Result;

use types::MetaContext;

pub trait ChangeWatcher {
    /// The subset of `context.table_name` selected by `context.constraints` depends on a
    /// row that was just added or modified, and may now be stale.  Returning an error
    /// aborts and rolls back the batch in progress.
    fn suggest(&mut self, context: &MetaContext) -> Result<()>;
}

pub struct NullWatcher();

impl ChangeWatcher for NullWatcher {
    fn suggest(&mut self, _context: &MetaContext) -> Result<()> {
        Ok(())
    }
}
