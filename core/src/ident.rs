// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! SQL identifier normalization.
//!
//! Providers hand the meta store raw identifiers as their native client library reports
//! them: unquoted, quoted, folded to either case, or dotted chains like `catalog.schema.name`.
//! Before those names can be compared against stored catalog data they are rewritten into a
//! single canonical form:
//!
//! - a plain identifier (no characters requiring quoting, not a reserved word) is stored
//!   unquoted and, unless the connection is case sensitive, lower-cased;
//! - anything else is wrapped in double quotes with its case preserved.
//!
//! Normalization is idempotent and never fails: input that can't be interpreted is echoed
//! back quoted as-is.

/// Reserved words whose bare use would change the meaning of generated SQL.  SQL92 subset;
/// sorted for binary search, all lower-case.
static RESERVED_WORDS: &'static [&'static str] = &[
    "all", "alter", "and", "any", "as", "asc", "authorization", "between", "both", "by",
    "case", "cast", "check", "collate", "column", "commit", "constraint", "create", "cross",
    "current_date", "current_time", "current_timestamp", "current_user", "default", "delete",
    "desc", "distinct", "drop", "else", "end", "escape", "except", "exists", "for", "foreign",
    "from", "full", "grant", "group", "having", "in", "inner", "insert", "intersect", "into",
    "is", "join", "leading", "left", "like", "limit", "natural", "not", "null", "offset",
    "on", "or", "order", "outer", "primary", "references", "revoke", "right", "rollback",
    "select", "session_user", "set", "some", "table", "then", "to", "trailing", "union",
    "unique", "update", "user", "using", "values", "when", "where", "with",
];

/// Whether `s` (assumed lower-case) is a reserved SQL keyword.
pub fn is_reserved_word(s: &str) -> bool {
    RESERVED_WORDS.binary_search(&s).is_ok()
}

fn is_quoted(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('"') && s.ends_with('"')
}

/// Whether `ident` can only be represented by quoting it.
///
/// An identifier needs quotes when its first character is a digit, when it contains any
/// character outside `[A-Za-z0-9_$#]`, or -- on a case-sensitive connection -- when it
/// contains an upper-case character (an unquoted identifier would otherwise be folded).
pub fn needs_quotes(ident: &str, case_sensitive: bool) -> bool {
    if ident.is_empty() {
        return true;
    }
    for (i, c) in ident.chars().enumerate() {
        match c {
            '0'..='9' => {
                if i == 0 {
                    return true;
                }
            },
            'A'..='Z' => {
                if case_sensitive {
                    return true;
                }
            },
            'a'..='z' | '_' | '$' | '#' => {},
            _ => return true,
        }
    }
    false
}

/// Wrap `ident` in double quotes, doubling any embedded quote character.
pub fn force_quotes(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 2);
    out.push('"');
    for c in ident.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Strip one level of double quoting, undoing `force_quotes`.  Unquoted input is returned
/// unchanged.
pub fn unquote(ident: &str) -> String {
    if !is_quoted(ident) {
        return ident.to_string();
    }
    let inner = &ident[1..ident.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut skip = false;
    for c in inner.chars() {
        if skip && c == '"' {
            skip = false;
            continue;
        }
        skip = c == '"';
        out.push(c);
    }
    out
}

fn normalize_part(part: &str, case_sensitive: bool) -> String {
    if is_quoted(part) {
        // Already canonical: quoting preserves whatever case the part carries.
        return part.to_string();
    }
    if needs_quotes(part, case_sensitive) {
        return force_quotes(part);
    }
    let folded = if case_sensitive {
        part.to_string()
    } else {
        part.to_lowercase()
    };
    if is_reserved_word(&folded) {
        force_quotes(&folded)
    } else {
        folded
    }
}

/// Rewrite a raw identifier into the canonical form used as a key inside the meta store.
///
/// Dotted chains are normalized part by part, so `Public."Odd name"` becomes
/// `public."Odd name"`.  An input that is entirely quoted already is returned untouched.
pub fn normalize_identifier(raw: &str, case_sensitive: bool) -> String {
    if is_quoted(raw) {
        return raw.to_string();
    }
    if raw.contains('.') {
        let parts: Vec<String> = raw.split('.')
                                    .map(|p| normalize_part(p, case_sensitive))
                                    .collect();
        parts.join(".")
    } else {
        normalize_part(raw, case_sensitive)
    }
}
