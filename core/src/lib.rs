// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

pub mod ident;
pub mod rows;
pub mod types;

pub use ident::{
    force_quotes,
    is_reserved_word,
    needs_quotes,
    normalize_identifier,
    unquote,
};

pub use rows::{
    RowSet,
    RowSource,
};

pub use types::{
    TypedValue,
    ValueType,
};
