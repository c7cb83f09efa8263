// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Decoded payload tree

/// Result of decoding a nested payload
///
/// Built fresh from a finite byte buffer, so it is always acyclic.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodedNode {
    /// Named fields in wire order
    FieldSet(Vec<(String, DecodedNode)>),
    Sequence(Vec<DecodedNode>),
    Scalar(Scalar),
    /// Payload without a known schema; only its size is kept
    Opaque { len: usize },
    /// The envelope carried no nested payload at all
    NoPayload,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scalar {
    Text(String),
    Unsigned(u64),
    Bool(bool),
    Bytes(Vec<u8>),
    /// Enumerant name
    Label(String),
    /// Absent optional value
    Null,
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Text(text) => write!(f, "{:?}", text),
            Scalar::Unsigned(value) => write!(f, "{}", value),
            Scalar::Bool(value) => write!(f, "{}", value),
            Scalar::Bytes(bytes) => write!(f, "0x{}", hex::encode(bytes)),
            Scalar::Label(label) => f.write_str(label),
            Scalar::Null => f.write_str("null"),
        }
    }
}

impl DecodedNode {
    pub fn field_set<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, DecodedNode)>,
        S: Into<String>,
    {
        DecodedNode::FieldSet(fields.into_iter().map(|(name, node)| (name.into(), node)).collect())
    }

    pub fn text(value: impl Into<String>) -> Self {
        DecodedNode::Scalar(Scalar::Text(value.into()))
    }

    pub fn unsigned(value: u64) -> Self {
        DecodedNode::Scalar(Scalar::Unsigned(value))
    }

    pub fn label(value: impl Into<String>) -> Self {
        DecodedNode::Scalar(Scalar::Label(value.into()))
    }

    /// Look up a field of a field set by name
    pub fn field(&self, name: &str) -> Option<&DecodedNode> {
        match self {
            DecodedNode::FieldSet(fields) => {
                fields.iter().find(|(field, _)| field == name).map(|(_, node)| node)
            }
            _ => None,
        }
    }

    pub fn field_names(&self) -> Vec<&str> {
        match self {
            DecodedNode::FieldSet(fields) => fields.iter().map(|(name, _)| name.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DecodedNode::FieldSet(_) => "field set",
            DecodedNode::Sequence(_) => "sequence",
            DecodedNode::Scalar(Scalar::Text(_)) => "text",
            DecodedNode::Scalar(Scalar::Unsigned(_)) => "unsigned integer",
            DecodedNode::Scalar(Scalar::Bool(_)) => "bool",
            DecodedNode::Scalar(Scalar::Bytes(_)) => "bytes",
            DecodedNode::Scalar(Scalar::Label(_)) => "label",
            DecodedNode::Scalar(Scalar::Null) => "null",
            DecodedNode::Opaque { .. } => "opaque payload",
            DecodedNode::NoPayload => "no payload",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_literal_forms() {
        assert_eq!(Scalar::Text("a \"b\"".into()).to_string(), r#""a \"b\"""#);
        assert_eq!(Scalar::Unsigned(42).to_string(), "42");
        assert_eq!(Scalar::Bool(false).to_string(), "false");
        assert_eq!(Scalar::Bytes(vec![0xde, 0xad]).to_string(), "0xdead");
        assert_eq!(Scalar::Label("ERROR".into()).to_string(), "ERROR");
        assert_eq!(Scalar::Null.to_string(), "null");
    }

    #[test]
    fn test_field_lookup_keeps_order() {
        let node = DecodedNode::field_set([
            ("b", DecodedNode::unsigned(1)),
            ("a", DecodedNode::text("x")),
        ]);
        assert_eq!(node.field_names(), vec!["b", "a"]);
        assert_eq!(node.field("a"), Some(&DecodedNode::text("x")));
        assert_eq!(node.field("missing"), None);
        assert_eq!(DecodedNode::NoPayload.field("a"), None);
    }
}
