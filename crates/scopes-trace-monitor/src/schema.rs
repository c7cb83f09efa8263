// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Payload schemas and the operation-name registry
//!
//! The wire format carries no schema of its own, so each instrumented
//! operation is described here by a [`Shape`] tree that mirrors the typed
//! payloads in `scopes-trace-proto`. Operations missing from the table are
//! shown as opaque payloads.

use scopes_trace_proto::{FinishedReason, InfoCode};
use std::collections::HashMap;

/// Size of an SSZ offset for variable-length fields
pub const OFFSET_LEN: usize = 4;

/// Layout of an SSZ value
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Shape {
    Bool,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    /// One byte indexing into the label list
    Enumeration(Vec<String>),
    Bytes,
    /// UTF-8 bytes
    Text,
    List(Box<Shape>),
    Optional(Box<Shape>),
    Container(Vec<Field>),
    /// One selector byte indexing the variant list, then the variant value
    Union(Vec<Field>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub shape: Shape,
}

pub fn field(name: &str, shape: Shape) -> Field {
    Field {
        name: name.to_string(),
        shape,
    }
}

impl Shape {
    pub fn list(item: Shape) -> Self {
        Shape::List(Box::new(item))
    }

    pub fn optional(inner: Shape) -> Self {
        Shape::Optional(Box::new(inner))
    }

    pub fn enumeration(labels: &[&str]) -> Self {
        Shape::Enumeration(labels.iter().map(|label| label.to_string()).collect())
    }

    /// Encoded size when fixed, `None` for variable-length shapes
    pub fn fixed_len(&self) -> Option<usize> {
        match self {
            Shape::Bool | Shape::Uint8 | Shape::Enumeration(_) => Some(1),
            Shape::Uint16 => Some(2),
            Shape::Uint32 => Some(4),
            Shape::Uint64 => Some(8),
            Shape::Container(fields) => {
                fields.iter().map(|f| f.shape.fixed_len()).sum::<Option<usize>>()
            }
            Shape::Bytes | Shape::Text | Shape::List(_) | Shape::Optional(_) | Shape::Union(_) => {
                None
            }
        }
    }

    /// Bytes a value of this shape occupies in its parent's fixed part
    pub fn fixed_part_len(&self) -> usize {
        self.fixed_len().unwrap_or(OFFSET_LEN)
    }
}

/// A named payload type
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    pub type_name: String,
    pub shape: Shape,
}

impl Schema {
    pub fn container(type_name: &str, fields: Vec<Field>) -> Self {
        Self {
            type_name: type_name.to_string(),
            shape: Shape::Container(fields),
        }
    }
}

/// Association of an operation name with the schema of its payload
#[derive(Clone, Debug)]
pub struct SchemaEntry {
    pub operation_name: String,
    pub schema: Schema,
}

impl SchemaEntry {
    pub fn new(operation_name: &str, schema: Schema) -> Self {
        Self {
            operation_name: operation_name.to_string(),
            schema,
        }
    }
}

/// Read-only table of payload schemas keyed by operation name
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    entries: HashMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn from_entries(entries: impl IntoIterator<Item = SchemaEntry>) -> Self {
        entries.into_iter().collect()
    }

    /// The operations the middleware is known to send with a payload
    pub fn builtin() -> Self {
        let proxy = || {
            Shape::Container(vec![field("endpoint", Shape::Text), field("identity", Shape::Text)])
        };
        let value = Shape::Union(vec![
            field("bool", Shape::Bool),
            field("int", Shape::Uint64),
            field("string", Shape::Text),
            field("stringList", Shape::list(Shape::Text)),
        ]);
        let dict = Shape::list(Shape::Container(vec![
            field("key", Shape::Text),
            field("value", value),
        ]));
        let identity = Schema::container("IdentityRequest", vec![field("identity", Shape::Text)]);

        Self::from_entries([
            SchemaEntry::new(
                "create_query",
                Schema::container(
                    "CreateQueryRequest",
                    vec![
                        field("query", Shape::Text),
                        field("hints", dict.clone()),
                        field("replyProxy", proxy()),
                    ],
                ),
            ),
            SchemaEntry::new(
                "run",
                Schema::container("RunRequest", vec![field("replyProxy", proxy())]),
            ),
            SchemaEntry::new(
                "push",
                Schema::container("PushRequest", vec![field("result", dict)]),
            ),
            SchemaEntry::new(
                "finished",
                Schema::container(
                    "FinishedRequest",
                    vec![
                        field("reason", Shape::enumeration(FinishedReason::LABELS)),
                        field("error", Shape::optional(Shape::Text)),
                    ],
                ),
            ),
            SchemaEntry::new(
                "info",
                Schema::container(
                    "InfoRequest",
                    vec![
                        field("code", Shape::enumeration(InfoCode::LABELS)),
                        field("message", Shape::Text),
                    ],
                ),
            ),
            SchemaEntry::new("get_metadata", identity.clone()),
            SchemaEntry::new("locate", identity.clone()),
            SchemaEntry::new("is_scope_running", identity),
        ])
    }

    /// Exact-match lookup; `None` is the normal outcome for uninstrumented operations
    pub fn resolve(&self, operation_name: &str) -> Option<&Schema> {
        self.entries.get(operation_name)
    }

    /// Registered operation names, sorted
    pub fn operations(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<SchemaEntry> for SchemaRegistry {
    fn from_iter<I: IntoIterator<Item = SchemaEntry>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|entry| (entry.operation_name, entry.schema))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_resolves_instrumented_operations() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(
            registry.resolve("create_query").map(|s| s.type_name.as_str()),
            Some("CreateQueryRequest")
        );
        assert_eq!(
            registry.resolve("locate").map(|s| s.type_name.as_str()),
            Some("IdentityRequest")
        );
        assert_eq!(registry.len(), 8);
    }

    #[test]
    fn test_unknown_and_near_miss_names_are_unresolved() {
        let registry = SchemaRegistry::builtin();
        assert!(registry.resolve("unregistered_op").is_none());
        assert!(registry.resolve("ping").is_none());
        assert!(registry.resolve("Create_Query").is_none());
        assert!(registry.resolve("create_query ").is_none());
    }

    #[test]
    fn test_operations_sorted() {
        let registry = SchemaRegistry::builtin();
        let ops = registry.operations();
        assert_eq!(ops.first(), Some(&"create_query"));
        assert_eq!(ops.last(), Some(&"run"));
    }

    #[test]
    fn test_fixed_len() {
        assert_eq!(Shape::Uint64.fixed_len(), Some(8));
        assert_eq!(Shape::enumeration(&["A"]).fixed_len(), Some(1));
        let fixed = Shape::Container(vec![field("a", Shape::Uint16), field("b", Shape::Bool)]);
        assert_eq!(fixed.fixed_len(), Some(3));
        let variable = Shape::Container(vec![field("a", Shape::Uint16), field("b", Shape::Text)]);
        assert_eq!(variable.fixed_len(), None);
        assert_eq!(variable.fixed_part_len(), OFFSET_LEN);
        assert_eq!(Shape::list(Shape::Uint8).fixed_len(), None);
    }

    #[test]
    fn test_custom_table() {
        let registry: SchemaRegistry = [SchemaEntry::new(
            "probe",
            Schema::container("ProbeRequest", vec![field("n", Shape::Uint32)]),
        )]
        .into_iter()
        .collect();
        assert_eq!(registry.operations(), vec!["probe"]);
        assert!(registry.resolve("create_query").is_none());
    }
}
