// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use lodestore_db;

pub type Result<T> = ::std::result::Result<T, LodestoreError>;

#[derive(Debug, Fail)]
pub enum LodestoreError {
    #[fail(display = "{}", _0)]
    DbError(#[cause] lodestore_db::DbError),
}

impl From<lodestore_db::DbError> for LodestoreError {
    fn from(e: lodestore_db::DbError) -> LodestoreError {
        LodestoreError::DbError(e)
    }
}
