// Copyright 2016 Mozilla
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not use
// this file except in compliance with the License. You may obtain a copy of the
// License at http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software distributed
// under the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR
// CONDITIONS OF ANY KIND, either express or implied. See the License for the
// specific language governing permissions and limitations under the License.

//! The fixed meta store schema.
//!
//! The meta store mirrors a database's catalog into a set of `information_schema`-shaped
//! tables.  The set is defined once, here, and never changes at runtime; the table and
//! column names are the wire format any tooling that queries the store directly depends on.
//!
//! Each table is described by a `MetaTableDef`: its ordered columns (with declared value
//! types and key membership), which of its string columns hold SQL identifiers (these are
//! normalized on ingest), and which earlier tables it references.  The registry is ordered
//! by dependency: a table always appears after every table it references, and refresh
//! operations walk the registry in this order.
//!
//! This registry replaces the per-table handwritten update functions of classic meta store
//! implementations with data the orchestrator iterates.

use std::collections::BTreeMap;

use lodestore_core::ValueType;

#[derive(Clone,Copy,Debug,Eq,PartialEq)]
pub struct MetaColumnDef {
    pub name: &'static str,
    pub value_type: ValueType,
    pub key: bool,
}

/// A reference from one meta table to the key of an earlier one.
///
/// Used in both directions: when a parent row disappears, dependent rows are pruned; when a
/// parent row appears or changes, a refresh of the dependent subset is suggested.
#[derive(Clone,Copy,Debug,Eq,PartialEq)]
pub struct MetaFkDef {
    pub parent: &'static str,
    pub child_columns: &'static [&'static str],
    pub parent_columns: &'static [&'static str],
}

#[derive(Clone,Copy,Debug,Eq,PartialEq)]
pub struct MetaTableDef {
    pub name: &'static str,
    pub columns: &'static [MetaColumnDef],
    pub ident_columns: &'static [&'static str],
    pub upstream: &'static [MetaFkDef],
}

impl MetaTableDef {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn key_indices(&self) -> Vec<usize> {
        self.columns.iter()
                    .enumerate()
                    .filter(|&(_, c)| c.key)
                    .map(|(i, _)| i)
                    .collect()
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn is_ident_column(&self, idx: usize) -> bool {
        self.ident_columns.contains(&self.columns[idx].name)
    }
}

const fn col(name: &'static str, value_type: ValueType) -> MetaColumnDef {
    MetaColumnDef { name: name, value_type: value_type, key: false }
}

const fn key(name: &'static str, value_type: ValueType) -> MetaColumnDef {
    MetaColumnDef { name: name, value_type: value_type, key: true }
}

use lodestore_core::ValueType::{
    Boolean,
    Long,
    String,
};

/// Every meta table, in dependency order.
pub static META_TABLES: &'static [MetaTableDef] = &[
    MetaTableDef {
        name: "_information_schema_catalog_name",
        columns: &[
            key("catalog_name", String),
        ],
        ident_columns: &["catalog_name"],
        upstream: &[],
    },
    MetaTableDef {
        name: "_schemata",
        columns: &[
            key("catalog_name", String),
            key("schema_name", String),
            col("schema_owner", String),
            col("schema_internal", Boolean),
            col("schema_default", Boolean),
        ],
        ident_columns: &["catalog_name", "schema_name"],
        upstream: &[
            MetaFkDef {
                parent: "_information_schema_catalog_name",
                child_columns: &["catalog_name"],
                parent_columns: &["catalog_name"],
            },
        ],
    },
    MetaTableDef {
        name: "_builtin_data_types",
        columns: &[
            key("full_type_name", String),
            col("short_type_name", String),
            col("data_type", String),
            col("comments", String),
            col("synonyms", String),
            col("internal", Boolean),
        ],
        ident_columns: &[],
        upstream: &[],
    },
    MetaTableDef {
        name: "_udt",
        columns: &[
            key("udt_catalog", String),
            key("udt_schema", String),
            key("udt_name", String),
            col("udt_short_name", String),
            col("udt_full_name", String),
            col("udt_owner", String),
            col("udt_internal", Boolean),
        ],
        ident_columns: &["udt_catalog", "udt_schema", "udt_name"],
        upstream: &[
            MetaFkDef {
                parent: "_schemata",
                child_columns: &["udt_catalog", "udt_schema"],
                parent_columns: &["catalog_name", "schema_name"],
            },
        ],
    },
    MetaTableDef {
        name: "_domains",
        columns: &[
            key("domain_catalog", String),
            key("domain_schema", String),
            key("domain_name", String),
            col("data_type", String),
            col("domain_default", String),
            col("domain_owner", String),
        ],
        ident_columns: &["domain_catalog", "domain_schema", "domain_name"],
        upstream: &[
            MetaFkDef {
                parent: "_schemata",
                child_columns: &["domain_catalog", "domain_schema"],
                parent_columns: &["catalog_name", "schema_name"],
            },
        ],
    },
    MetaTableDef {
        name: "_tables",
        columns: &[
            key("table_catalog", String),
            key("table_schema", String),
            key("table_name", String),
            col("table_type", String),
            col("is_insertable_into", Boolean),
            col("table_comments", String),
            col("table_short_name", String),
            col("table_full_name", String),
            col("table_owner", String),
        ],
        ident_columns: &["table_catalog", "table_schema", "table_name",
                         "table_short_name", "table_full_name"],
        upstream: &[
            MetaFkDef {
                parent: "_schemata",
                child_columns: &["table_catalog", "table_schema"],
                parent_columns: &["catalog_name", "schema_name"],
            },
        ],
    },
    MetaTableDef {
        name: "_views",
        columns: &[
            key("table_catalog", String),
            key("table_schema", String),
            key("table_name", String),
            col("view_definition", String),
            col("check_option", String),
            col("is_updatable", Boolean),
        ],
        ident_columns: &["table_catalog", "table_schema", "table_name"],
        upstream: &[
            MetaFkDef {
                parent: "_schemata",
                child_columns: &["table_catalog", "table_schema"],
                parent_columns: &["catalog_name", "schema_name"],
            },
        ],
    },
    MetaTableDef {
        name: "_columns",
        columns: &[
            key("table_catalog", String),
            key("table_schema", String),
            key("table_name", String),
            key("column_name", String),
            col("ordinal_position", Long),
            col("column_default", String),
            col("is_nullable", Boolean),
            col("data_type", String),
            col("character_maximum_length", Long),
            col("numeric_precision", Long),
            col("numeric_scale", Long),
            col("column_comments", String),
        ],
        ident_columns: &["table_catalog", "table_schema", "table_name", "column_name"],
        upstream: &[
            MetaFkDef {
                parent: "_tables",
                child_columns: &["table_catalog", "table_schema", "table_name"],
                parent_columns: &["table_catalog", "table_schema", "table_name"],
            },
        ],
    },
    MetaTableDef {
        name: "_table_constraints",
        columns: &[
            key("table_catalog", String),
            key("table_schema", String),
            key("table_name", String),
            key("constraint_name", String),
            col("constraint_type", String),
            col("is_deferrable", Boolean),
            col("initially_deferred", Boolean),
        ],
        ident_columns: &["table_catalog", "table_schema", "table_name", "constraint_name"],
        upstream: &[
            MetaFkDef {
                parent: "_tables",
                child_columns: &["table_catalog", "table_schema", "table_name"],
                parent_columns: &["table_catalog", "table_schema", "table_name"],
            },
        ],
    },
    MetaTableDef {
        name: "_referential_constraints",
        columns: &[
            key("table_catalog", String),
            key("table_schema", String),
            key("table_name", String),
            key("constraint_name", String),
            col("ref_table_catalog", String),
            col("ref_table_schema", String),
            col("ref_table_name", String),
            col("ref_constraint_name", String),
            col("match_option", String),
            col("update_rule", String),
            col("delete_rule", String),
        ],
        ident_columns: &["table_catalog", "table_schema", "table_name", "constraint_name",
                         "ref_table_catalog", "ref_table_schema", "ref_table_name",
                         "ref_constraint_name"],
        upstream: &[
            MetaFkDef {
                parent: "_table_constraints",
                child_columns: &["table_catalog", "table_schema", "table_name",
                                 "constraint_name"],
                parent_columns: &["table_catalog", "table_schema", "table_name",
                                  "constraint_name"],
            },
        ],
    },
    MetaTableDef {
        name: "_key_column_usage",
        columns: &[
            key("table_catalog", String),
            key("table_schema", String),
            key("table_name", String),
            key("constraint_name", String),
            key("column_name", String),
            col("ordinal_position", Long),
        ],
        ident_columns: &["table_catalog", "table_schema", "table_name", "constraint_name",
                         "column_name"],
        upstream: &[
            MetaFkDef {
                parent: "_table_constraints",
                child_columns: &["table_catalog", "table_schema", "table_name",
                                 "constraint_name"],
                parent_columns: &["table_catalog", "table_schema", "table_name",
                                  "constraint_name"],
            },
        ],
    },
    MetaTableDef {
        name: "_domain_constraints",
        columns: &[
            key("domain_catalog", String),
            key("domain_schema", String),
            key("domain_name", String),
            key("constraint_name", String),
            col("check_clause", String),
            col("is_deferrable", Boolean),
            col("initially_deferred", Boolean),
        ],
        ident_columns: &["domain_catalog", "domain_schema", "domain_name",
                         "constraint_name"],
        upstream: &[
            MetaFkDef {
                parent: "_domains",
                child_columns: &["domain_catalog", "domain_schema", "domain_name"],
                parent_columns: &["domain_catalog", "domain_schema", "domain_name"],
            },
        ],
    },
    MetaTableDef {
        name: "_routines",
        columns: &[
            key("specific_catalog", String),
            key("specific_schema", String),
            key("specific_name", String),
            col("routine_catalog", String),
            col("routine_schema", String),
            col("routine_name", String),
            col("routine_type", String),
            col("return_type", String),
            col("routine_definition", String),
            col("routine_owner", String),
            col("routine_comments", String),
        ],
        ident_columns: &["specific_catalog", "specific_schema", "specific_name",
                         "routine_catalog", "routine_schema", "routine_name"],
        upstream: &[
            MetaFkDef {
                parent: "_schemata",
                child_columns: &["specific_catalog", "specific_schema"],
                parent_columns: &["catalog_name", "schema_name"],
            },
        ],
    },
    MetaTableDef {
        name: "_parameters",
        columns: &[
            key("specific_catalog", String),
            key("specific_schema", String),
            key("specific_name", String),
            key("ordinal_position", Long),
            col("parameter_name", String),
            col("data_type", String),
            col("parameter_mode", String),
        ],
        ident_columns: &["specific_catalog", "specific_schema", "specific_name"],
        upstream: &[
            MetaFkDef {
                parent: "_routines",
                child_columns: &["specific_catalog", "specific_schema", "specific_name"],
                parent_columns: &["specific_catalog", "specific_schema", "specific_name"],
            },
        ],
    },
    MetaTableDef {
        name: "_triggers",
        columns: &[
            key("trigger_catalog", String),
            key("trigger_schema", String),
            key("trigger_name", String),
            key("event_manipulation", String),
            col("event_object_catalog", String),
            col("event_object_schema", String),
            col("event_object_table", String),
            col("action_statement", String),
            col("action_orientation", String),
            col("condition_timing", String),
        ],
        ident_columns: &["trigger_catalog", "trigger_schema", "trigger_name",
                         "event_object_catalog", "event_object_schema",
                         "event_object_table"],
        upstream: &[
            MetaFkDef {
                parent: "_schemata",
                child_columns: &["trigger_catalog", "trigger_schema"],
                parent_columns: &["catalog_name", "schema_name"],
            },
        ],
    },
];

/// Look up a registry entry by table name.
pub fn table_def(name: &str) -> Option<&'static MetaTableDef> {
    META_TABLES.iter().find(|t| t.name == name)
}

/// Every table referencing `parent`, with the link it does so through.
pub fn downstream(parent: &str) -> Vec<(&'static MetaTableDef, &'static MetaFkDef)> {
    let mut out = Vec::new();
    for table in META_TABLES.iter() {
        for fk in table.upstream.iter() {
            if fk.parent == parent {
                out.push((table, fk));
            }
        }
    }
    out
}

lazy_static! {
    // Column names are used consistently across the registry: a name always carries the
    // same declared type wherever it appears.  That lets extraction recover declared types
    // for result columns by name alone.
    static ref COLUMN_TYPES: BTreeMap<&'static str, ValueType> = {
        let mut m = BTreeMap::new();
        for table in META_TABLES.iter() {
            for c in table.columns.iter() {
                m.insert(c.name, c.value_type);
            }
        }
        m
    };
}

/// The declared type of a meta schema column, looked up by name, or `None` for names not
/// part of the registry (computed/aliased extraction columns).
pub fn declared_column_type(column: &str) -> Option<ValueType> {
    COLUMN_TYPES.get(column).cloned()
}
