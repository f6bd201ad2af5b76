// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

use std::fmt;

/// Core types defining the lodestore catalog cache.
///
/// The meta store maintains a fixed set of catalog tables modeled after the SQL
/// `information_schema`.  Every cell in those tables is a `TypedValue`, constrained by the
/// `ValueType` declared for its column.
///
/// There is deliberately no floating-point type: catalog metadata is names, ordinals and
/// flags.  Composite row keys are tuples of `TypedValue`, compared as typed data -- never as
/// stringified text -- so numeric keys cannot lose precision on the way through a comparison.

/// The value set a column is declared to accept.  `Null` is a member of every set.
#[derive(Clone,Copy,Debug,Eq,Hash,Ord,PartialOrd,PartialEq)]
pub enum ValueType {
    String,
    Long,
    Boolean,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match *self {
            ValueType::String => "string",
            ValueType::Long => "long",
            ValueType::Boolean => "boolean",
        })
    }
}

/// One cell of catalog data.
///
/// `Null` means "unknown or not applicable".  A `Null` compares equal only to another
/// `Null`; a `Null` and any non-null value differ.  That rule falls directly out of the
/// derived `PartialEq`, which is why equality here is derived rather than hand-written.
#[derive(Clone,Debug,Eq,Hash,Ord,PartialOrd,PartialEq)]
pub enum TypedValue {
    String(String),
    Long(i64),
    Boolean(bool),
    Null,
}

impl TypedValue {
    /// The `ValueType` this value inhabits, or `None` for `Null`.
    pub fn value_type(&self) -> Option<ValueType> {
        match *self {
            TypedValue::String(_) => Some(ValueType::String),
            TypedValue::Long(_) => Some(ValueType::Long),
            TypedValue::Boolean(_) => Some(ValueType::Boolean),
            TypedValue::Null => None,
        }
    }

    /// Whether this value may be stored in a column declared as `t`.  `Null` fits anywhere.
    pub fn matches(&self, t: ValueType) -> bool {
        match self.value_type() {
            None => true,
            Some(vt) => vt == t,
        }
    }

    pub fn is_null(&self) -> bool {
        *self == TypedValue::Null
    }

    pub fn as_str(&self) -> Option<&str> {
        match *self {
            TypedValue::String(ref s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TypedValue::String(ref s) => write!(f, "'{}'", s),
            TypedValue::Long(l) => write!(f, "{}", l),
            TypedValue::Boolean(b) => write!(f, "{}", b),
            TypedValue::Null => f.write_str("NULL"),
        }
    }
}

impl<'a> From<&'a str> for TypedValue {
    fn from(s: &'a str) -> TypedValue {
        TypedValue::String(s.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> TypedValue {
        TypedValue::String(s)
    }
}

impl From<i64> for TypedValue {
    fn from(l: i64) -> TypedValue {
        TypedValue::Long(l)
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> TypedValue {
        TypedValue::Boolean(b)
    }
}

impl<T> From<Option<T>> for TypedValue where T: Into<TypedValue> {
    fn from(o: Option<T>) -> TypedValue {
        match o {
            Some(v) => v.into(),
            None => TypedValue::Null,
        }
    }
}
