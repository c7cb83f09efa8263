// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Envelope codec and schema-directed SSZ payload decoding
//!
//! The outer envelope has a fixed Rust type. Nested payloads are decoded
//! against the [`Shape`] registered for the envelope's operation name, which
//! follows the SSZ layout rules:
//!
//! - fixed-size values are stored inline, little endian;
//! - a container stores each variable-size field as a 4-byte offset in its
//!   fixed part and appends the field bodies in order;
//! - a list of variable-size items starts with one offset per item;
//! - optionals and unions start with a one-byte selector.

use crate::error::{ShapeError, TraceError};
use crate::node::{DecodedNode, Scalar};
use crate::schema::{Field, OFFSET_LEN, Schema, SchemaRegistry, Shape};
use scopes_trace_proto::{RequestMessage, RequestMode, decode_ssz, encode_ssz};

/// A decoded request envelope
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub mode: RequestMode,
    pub operation_name: String,
    pub identity: String,
    pub category: String,
    pub nested_payload: Option<Vec<u8>>,
}

impl Envelope {
    pub fn new(mode: RequestMode, operation_name: &str) -> Self {
        Self {
            mode,
            operation_name: operation_name.to_string(),
            identity: String::new(),
            category: String::new(),
            nested_payload: None,
        }
    }

    pub fn with_target(mut self, identity: &str, category: &str) -> Self {
        self.identity = identity.to_string();
        self.category = category.to_string();
        self
    }

    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.nested_payload = Some(payload);
        self
    }
}

/// Parse the outer envelope of a bus message
pub fn decode_envelope(bytes: &[u8]) -> Result<Envelope, TraceError> {
    let malformed = |reason: String| TraceError::MalformedEnvelope { reason };

    let message: RequestMessage =
        decode_ssz(bytes).map_err(|e| malformed(format!("invalid request framing: {:?}", e)))?;

    let mode = RequestMode::try_from(message.mode)
        .map_err(|mode| malformed(format!("unknown request mode {}", mode)))?;
    let header = |name: &str, value: Vec<u8>| {
        String::from_utf8(value).map_err(|_| malformed(format!("{} is not valid UTF-8", name)))
    };

    Ok(Envelope {
        mode,
        operation_name: header("opName", message.op_name)?,
        identity: header("id", message.id)?,
        category: header("cat", message.cat)?,
        nested_payload: message.in_params,
    })
}

pub fn encode_envelope(envelope: &Envelope) -> Vec<u8> {
    encode_ssz(&RequestMessage {
        mode: envelope.mode.as_u8(),
        op_name: envelope.operation_name.as_bytes().to_vec(),
        id: envelope.identity.as_bytes().to_vec(),
        cat: envelope.category.as_bytes().to_vec(),
        in_params: envelope.nested_payload.clone(),
    })
}

/// Decode the envelope's nested payload as far as the registry allows
///
/// Missing payloads give [`DecodedNode::NoPayload`] and unregistered
/// operations give [`DecodedNode::Opaque`]; neither is an error.
pub fn decode_nested_payload(
    envelope: &Envelope,
    registry: &SchemaRegistry,
) -> Result<DecodedNode, TraceError> {
    let Some(payload) = envelope.nested_payload.as_deref() else {
        return Ok(DecodedNode::NoPayload);
    };

    match registry.resolve(&envelope.operation_name) {
        Some(schema) => {
            decode_with_schema(schema, payload).map_err(|source| TraceError::PayloadDecode {
                operation: envelope.operation_name.clone(),
                type_name: schema.type_name.clone(),
                source,
            })
        }
        None => Ok(DecodedNode::Opaque { len: payload.len() }),
    }
}

pub fn decode_with_schema(schema: &Schema, bytes: &[u8]) -> Result<DecodedNode, ShapeError> {
    decode_shape(&schema.shape, bytes, "")
}

pub fn encode_with_schema(schema: &Schema, node: &DecodedNode) -> Result<Vec<u8>, ShapeError> {
    let mut buf = Vec::new();
    encode_shape(&schema.shape, node, "", &mut buf)?;
    Ok(buf)
}

fn child_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn item_path(path: &str, index: usize) -> String {
    format!("{}[{}]", path, index)
}

fn exact<const N: usize>(bytes: &[u8], path: &str) -> Result<[u8; N], ShapeError> {
    bytes
        .try_into()
        .map_err(|_| ShapeError::new(path, format!("expected {} bytes, found {}", N, bytes.len())))
}

fn read_offset(bytes: &[u8], at: usize, path: &str) -> Result<usize, ShapeError> {
    let raw = bytes
        .get(at..at + OFFSET_LEN)
        .ok_or_else(|| ShapeError::new(path, format!("offset at byte {} is out of range", at)))?;
    Ok(u32::from_le_bytes(exact::<4>(raw, path)?) as usize)
}

/// Check offsets of variable-size parts and turn them into body ranges.
fn variable_ranges(
    offsets: &[usize],
    fixed_part: usize,
    total: usize,
    path: &str,
) -> Result<Vec<std::ops::Range<usize>>, ShapeError> {
    let mut ranges = Vec::with_capacity(offsets.len());
    for (i, &start) in offsets.iter().enumerate() {
        if i == 0 && start != fixed_part {
            return Err(ShapeError::new(
                path,
                format!("first offset {} does not follow the {} byte fixed part", start, fixed_part),
            ));
        }
        let end = offsets.get(i + 1).copied().unwrap_or(total);
        if start > end || end > total {
            return Err(ShapeError::new(
                path,
                format!("offset range {}..{} exceeds {} bytes", start, end, total),
            ));
        }
        ranges.push(start..end);
    }
    Ok(ranges)
}

fn decode_shape(shape: &Shape, bytes: &[u8], path: &str) -> Result<DecodedNode, ShapeError> {
    let scalar = |s| Ok(DecodedNode::Scalar(s));
    match shape {
        Shape::Bool => match exact::<1>(bytes, path)? {
            [0] => scalar(Scalar::Bool(false)),
            [1] => scalar(Scalar::Bool(true)),
            [other] => Err(ShapeError::new(path, format!("invalid bool byte {}", other))),
        },
        Shape::Uint8 => scalar(Scalar::Unsigned(exact::<1>(bytes, path)?[0] as u64)),
        Shape::Uint16 => scalar(Scalar::Unsigned(u16::from_le_bytes(exact(bytes, path)?) as u64)),
        Shape::Uint32 => scalar(Scalar::Unsigned(u32::from_le_bytes(exact(bytes, path)?) as u64)),
        Shape::Uint64 => scalar(Scalar::Unsigned(u64::from_le_bytes(exact(bytes, path)?))),
        Shape::Enumeration(labels) => {
            let [index] = exact::<1>(bytes, path)?;
            match labels.get(index as usize) {
                Some(label) => scalar(Scalar::Label(label.clone())),
                None => Err(ShapeError::new(path, format!("unknown enumerant {}", index))),
            }
        }
        Shape::Bytes => scalar(Scalar::Bytes(bytes.to_vec())),
        Shape::Text => match std::str::from_utf8(bytes) {
            Ok(text) => scalar(Scalar::Text(text.to_string())),
            Err(e) => Err(ShapeError::new(path, format!("invalid UTF-8: {}", e))),
        },
        Shape::List(item) => decode_list(item, bytes, path),
        Shape::Optional(inner) => match bytes.split_first() {
            None => Err(ShapeError::new(path, "missing optional selector")),
            Some((0, [])) => scalar(Scalar::Null),
            Some((0, rest)) => Err(ShapeError::new(
                path,
                format!("{} trailing bytes after absent value", rest.len()),
            )),
            Some((1, rest)) => decode_shape(inner, rest, path),
            Some((selector, _)) => {
                Err(ShapeError::new(path, format!("invalid optional selector {}", selector)))
            }
        },
        Shape::Union(variants) => {
            let (selector, body) = bytes
                .split_first()
                .ok_or_else(|| ShapeError::new(path, "missing union selector"))?;
            let variant = variants.get(*selector as usize).ok_or_else(|| {
                ShapeError::new(path, format!("invalid union selector {}", selector))
            })?;
            let value = decode_shape(&variant.shape, body, &child_path(path, &variant.name))?;
            Ok(DecodedNode::FieldSet(vec![(variant.name.clone(), value)]))
        }
        Shape::Container(fields) => decode_container(fields, bytes, path),
    }
}

fn decode_list(item: &Shape, bytes: &[u8], path: &str) -> Result<DecodedNode, ShapeError> {
    if let Some(size) = item.fixed_len() {
        if size == 0 || bytes.len() % size != 0 {
            return Err(ShapeError::new(
                path,
                format!("{} bytes is not a whole number of {} byte items", bytes.len(), size),
            ));
        }
        return bytes
            .chunks(size)
            .enumerate()
            .map(|(i, chunk)| decode_shape(item, chunk, &item_path(path, i)))
            .collect::<Result<Vec<_>, _>>()
            .map(DecodedNode::Sequence);
    }

    if bytes.is_empty() {
        return Ok(DecodedNode::Sequence(Vec::new()));
    }

    let first = read_offset(bytes, 0, path)?;
    if first == 0 || first % OFFSET_LEN != 0 || first > bytes.len() {
        return Err(ShapeError::new(path, format!("invalid first item offset {}", first)));
    }
    let offsets = (0..first / OFFSET_LEN)
        .map(|i| read_offset(bytes, i * OFFSET_LEN, path))
        .collect::<Result<Vec<_>, _>>()?;

    variable_ranges(&offsets, first, bytes.len(), path)?
        .into_iter()
        .enumerate()
        .map(|(i, range)| decode_shape(item, &bytes[range], &item_path(path, i)))
        .collect::<Result<Vec<_>, _>>()
        .map(DecodedNode::Sequence)
}

fn decode_container(fields: &[Field], bytes: &[u8], path: &str) -> Result<DecodedNode, ShapeError> {
    let fixed_part: usize = fields.iter().map(|f| f.shape.fixed_part_len()).sum();
    if bytes.len() < fixed_part {
        return Err(ShapeError::new(
            path,
            format!("need at least {} bytes, found {}", fixed_part, bytes.len()),
        ));
    }

    // Fixed fields get their slice now; variable ones are resolved from offsets.
    enum Slot {
        Fixed(std::ops::Range<usize>),
        Variable(usize),
    }

    let mut cursor = 0;
    let mut slots = Vec::with_capacity(fields.len());
    let mut offsets = Vec::new();
    for f in fields {
        match f.shape.fixed_len() {
            Some(size) => {
                slots.push(Slot::Fixed(cursor..cursor + size));
                cursor += size;
            }
            None => {
                slots.push(Slot::Variable(offsets.len()));
                offsets.push(read_offset(bytes, cursor, path)?);
                cursor += OFFSET_LEN;
            }
        }
    }

    if offsets.is_empty() && bytes.len() != fixed_part {
        return Err(ShapeError::new(
            path,
            format!("{} trailing bytes after fixed-size container", bytes.len() - fixed_part),
        ));
    }
    let ranges = variable_ranges(&offsets, fixed_part, bytes.len(), path)?;

    fields
        .iter()
        .zip(slots)
        .map(|(f, slot)| {
            let range = match slot {
                Slot::Fixed(range) => range,
                Slot::Variable(index) => ranges[index].clone(),
            };
            let value = decode_shape(&f.shape, &bytes[range], &child_path(path, &f.name))?;
            Ok((f.name.clone(), value))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(DecodedNode::FieldSet)
}

/// Enumerants and union variants are addressed by a single byte.
fn selector_byte(index: usize, path: &str) -> Result<u8, ShapeError> {
    u8::try_from(index)
        .map_err(|_| ShapeError::new(path, format!("selector {} does not fit in one byte", index)))
}

fn mismatch(path: &str, expected: &str, node: &DecodedNode) -> ShapeError {
    ShapeError::new(path, format!("expected {}, found {}", expected, node.kind()))
}

fn encode_unsigned(
    node: &DecodedNode,
    width: usize,
    path: &str,
    buf: &mut Vec<u8>,
) -> Result<(), ShapeError> {
    let DecodedNode::Scalar(Scalar::Unsigned(value)) = node else {
        return Err(mismatch(path, "unsigned integer", node));
    };
    if width < 8 && *value >> (width * 8) != 0 {
        return Err(ShapeError::new(
            path,
            format!("{} does not fit in {} bytes", value, width),
        ));
    }
    buf.extend_from_slice(&value.to_le_bytes()[..width]);
    Ok(())
}

/// Encode `items` as the fixed part followed by the variable-size bodies.
fn encode_parts<'a, I>(parts: I, path: &str, buf: &mut Vec<u8>) -> Result<(), ShapeError>
where
    I: IntoIterator<Item = (&'a Shape, &'a DecodedNode, String)>,
{
    let parts: Vec<_> = parts.into_iter().collect();
    let fixed_part: usize = parts.iter().map(|(shape, _, _)| shape.fixed_part_len()).sum();

    let mut fixed = Vec::with_capacity(fixed_part);
    let mut variable = Vec::new();
    for (shape, node, part_path) in parts {
        if shape.fixed_len().is_some() {
            encode_shape(shape, node, &part_path, &mut fixed)?;
        } else {
            let offset = u32::try_from(fixed_part + variable.len())
                .map_err(|_| ShapeError::new(path, "encoded value exceeds offset range"))?;
            fixed.extend_from_slice(&offset.to_le_bytes());
            encode_shape(shape, node, &part_path, &mut variable)?;
        }
    }

    buf.extend_from_slice(&fixed);
    buf.extend_from_slice(&variable);
    Ok(())
}

fn encode_shape(
    shape: &Shape,
    node: &DecodedNode,
    path: &str,
    buf: &mut Vec<u8>,
) -> Result<(), ShapeError> {
    match (shape, node) {
        (Shape::Bool, DecodedNode::Scalar(Scalar::Bool(value))) => buf.push(*value as u8),
        (Shape::Bool, _) => return Err(mismatch(path, "bool", node)),
        (Shape::Uint8, _) => encode_unsigned(node, 1, path, buf)?,
        (Shape::Uint16, _) => encode_unsigned(node, 2, path, buf)?,
        (Shape::Uint32, _) => encode_unsigned(node, 4, path, buf)?,
        (Shape::Uint64, _) => encode_unsigned(node, 8, path, buf)?,
        (Shape::Enumeration(labels), DecodedNode::Scalar(Scalar::Label(label))) => {
            let index = labels
                .iter()
                .position(|l| l == label)
                .ok_or_else(|| ShapeError::new(path, format!("unknown enumerant {}", label)))?;
            buf.push(selector_byte(index, path)?);
        }
        (Shape::Enumeration(_), _) => return Err(mismatch(path, "label", node)),
        (Shape::Bytes, DecodedNode::Scalar(Scalar::Bytes(bytes))) => buf.extend_from_slice(bytes),
        (Shape::Bytes, _) => return Err(mismatch(path, "bytes", node)),
        (Shape::Text, DecodedNode::Scalar(Scalar::Text(text))) => {
            buf.extend_from_slice(text.as_bytes())
        }
        (Shape::Text, _) => return Err(mismatch(path, "text", node)),
        (Shape::List(item), DecodedNode::Sequence(items)) => {
            if item.fixed_len().is_some() {
                for (i, element) in items.iter().enumerate() {
                    encode_shape(item, element, &item_path(path, i), buf)?;
                }
            } else {
                let parts = items
                    .iter()
                    .enumerate()
                    .map(|(i, element)| (item.as_ref(), element, item_path(path, i)));
                encode_parts(parts, path, buf)?;
            }
        }
        (Shape::List(_), _) => return Err(mismatch(path, "sequence", node)),
        (Shape::Optional(_), DecodedNode::Scalar(Scalar::Null)) => buf.push(0),
        (Shape::Optional(inner), _) => {
            buf.push(1);
            encode_shape(inner, node, path, buf)?;
        }
        (Shape::Union(variants), DecodedNode::FieldSet(fields)) => {
            let [(name, value)] = fields.as_slice() else {
                return Err(ShapeError::new(path, "union value needs exactly one field"));
            };
            let selector = variants
                .iter()
                .position(|v| &v.name == name)
                .ok_or_else(|| ShapeError::new(path, format!("unknown union variant {}", name)))?;
            buf.push(selector_byte(selector, path)?);
            encode_shape(&variants[selector].shape, value, &child_path(path, name), buf)?;
        }
        (Shape::Union(_), _) => return Err(mismatch(path, "field set", node)),
        (Shape::Container(fields), DecodedNode::FieldSet(values)) => {
            if fields.len() != values.len() {
                return Err(ShapeError::new(
                    path,
                    format!("expected {} fields, found {}", fields.len(), values.len()),
                ));
            }
            let mut parts = Vec::with_capacity(fields.len());
            for (f, (name, value)) in fields.iter().zip(values) {
                if &f.name != name {
                    return Err(ShapeError::new(
                        path,
                        format!("expected field {}, found {}", f.name, name),
                    ));
                }
                parts.push((&f.shape, value, child_path(path, name)));
            }
            encode_parts(parts, path, buf)?;
        }
        (Shape::Container(_), _) => return Err(mismatch(path, "field set", node)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field;
    use scopes_trace_proto::{
        CreateQueryRequest, DictEntry, FinishedReason, FinishedRequest, InfoCode, InfoRequest,
        ProxyRef, PushRequest, Value,
    };

    fn create_query() -> CreateQueryRequest {
        CreateQueryRequest {
            query: b"weather".to_vec(),
            hints: vec![
                DictEntry::new("cardinality", Value::Int(20)),
                DictEntry::new("online", Value::Bool(true)),
                DictEntry::new("tags", Value::TextList(vec![b"news".to_vec(), Vec::new()])),
            ],
            reply_proxy: ProxyRef::new("ipc:///tmp/reply", "reply-9"),
        }
    }

    fn envelope(op: &str, payload: Option<Vec<u8>>) -> Envelope {
        Envelope {
            mode: RequestMode::Twoway,
            operation_name: op.to_string(),
            identity: "scope-A".to_string(),
            category: "Scope".to_string(),
            nested_payload: payload,
        }
    }

    #[test]
    fn test_envelope_roundtrip() {
        let env = envelope("create_query", Some(vec![1, 2, 3]));
        assert_eq!(decode_envelope(&encode_envelope(&env)).unwrap(), env);
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = decode_envelope(b"\x07junk").unwrap_err();
        assert!(matches!(err, TraceError::MalformedEnvelope { .. }));
        assert!(err.to_string().starts_with("MalformedEnvelope"));
        assert!(decode_envelope(&[]).is_err());
    }

    #[test]
    fn test_unknown_mode_is_malformed() {
        let mut wire = RequestMessage::new(RequestMode::Oneway, "push", "", "");
        wire.mode = 9;
        let err = decode_envelope(&encode_ssz(&wire)).unwrap_err();
        assert!(err.to_string().contains("unknown request mode 9"));
    }

    #[test]
    fn test_non_utf8_operation_is_malformed() {
        let mut wire = RequestMessage::new(RequestMode::Oneway, "push", "", "");
        wire.op_name = vec![0xff, 0xfe];
        let err = decode_envelope(&encode_ssz(&wire)).unwrap_err();
        assert!(err.to_string().contains("opName is not valid UTF-8"));
    }

    #[test]
    fn test_typed_create_query_decodes_against_builtin_schema() {
        let registry = SchemaRegistry::builtin();
        let env = envelope("create_query", Some(encode_ssz(&create_query())));
        let node = decode_nested_payload(&env, &registry).unwrap();

        assert_eq!(node.field_names(), vec!["query", "hints", "replyProxy"]);
        assert_eq!(node.field("query"), Some(&DecodedNode::text("weather")));

        let DecodedNode::Sequence(hints) = node.field("hints").unwrap() else {
            panic!("hints should be a sequence");
        };
        assert_eq!(hints.len(), 3);
        assert_eq!(hints[0].field("key"), Some(&DecodedNode::text("cardinality")));
        assert_eq!(
            hints[0].field("value"),
            Some(&DecodedNode::field_set([("int", DecodedNode::unsigned(20))]))
        );
        assert_eq!(
            hints[2].field("value"),
            Some(&DecodedNode::field_set([(
                "stringList",
                DecodedNode::Sequence(vec![DecodedNode::text("news"), DecodedNode::text("")])
            )]))
        );

        let proxy = node.field("replyProxy").unwrap();
        assert_eq!(proxy.field("identity"), Some(&DecodedNode::text("reply-9")));
    }

    #[test]
    fn test_enumerations_and_optionals() {
        let registry = SchemaRegistry::builtin();

        let failed = FinishedRequest::new(FinishedReason::Error, Some("boom"));
        let node = decode_nested_payload(&envelope("finished", Some(encode_ssz(&failed))), &registry)
            .unwrap();
        assert_eq!(node.field("reason"), Some(&DecodedNode::label("ERROR")));
        assert_eq!(node.field("error"), Some(&DecodedNode::text("boom")));

        let done = FinishedRequest::new(FinishedReason::Finished, None);
        let node =
            decode_nested_payload(&envelope("finished", Some(encode_ssz(&done))), &registry).unwrap();
        assert_eq!(node.field("error"), Some(&DecodedNode::Scalar(Scalar::Null)));

        let info = InfoRequest::new(InfoCode::PoorInternet, "slow");
        let node =
            decode_nested_payload(&envelope("info", Some(encode_ssz(&info))), &registry).unwrap();
        assert_eq!(node.field("code"), Some(&DecodedNode::label("POOR_INTERNET")));
    }

    #[test]
    fn test_empty_dictionary() {
        let registry = SchemaRegistry::builtin();
        let push = PushRequest { result: Vec::new() };
        let node =
            decode_nested_payload(&envelope("push", Some(encode_ssz(&push))), &registry).unwrap();
        assert_eq!(node, DecodedNode::field_set([("result", DecodedNode::Sequence(Vec::new()))]));
    }

    #[test]
    fn test_truncated_payload_reports_decode_error() {
        let registry = SchemaRegistry::builtin();
        let payload = encode_ssz(&create_query());
        let env = envelope("create_query", Some(payload[..7].to_vec()));

        let err = decode_nested_payload(&env, &registry).unwrap_err();
        match &err {
            TraceError::PayloadDecode {
                operation,
                type_name,
                ..
            } => {
                assert_eq!(operation, "create_query");
                assert_eq!(type_name, "CreateQueryRequest");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().starts_with("PayloadDecodeError"));
    }

    #[test]
    fn test_corrupted_nested_offset_names_the_field() {
        let registry = SchemaRegistry::builtin();
        let mut payload = encode_ssz(&create_query());
        // The replyProxy body starts with its first offset; break it.
        let proxy_start = u32::from_le_bytes(payload[8..12].try_into().unwrap()) as usize;
        payload[proxy_start] = 0xff;

        let err = decode_nested_payload(&envelope("create_query", Some(payload)), &registry)
            .unwrap_err();
        let TraceError::PayloadDecode { source, .. } = err else {
            panic!("expected payload decode error");
        };
        assert_eq!(source.path, "replyProxy");
    }

    #[test]
    fn test_unregistered_operation_is_opaque() {
        let registry = SchemaRegistry::builtin();
        let env = envelope("unregistered_op", Some(vec![0xab; 37]));
        assert_eq!(
            decode_nested_payload(&env, &registry).unwrap(),
            DecodedNode::Opaque { len: 37 }
        );

        let env = envelope("unregistered_op", Some(Vec::new()));
        assert_eq!(
            decode_nested_payload(&env, &registry).unwrap(),
            DecodedNode::Opaque { len: 0 }
        );
    }

    #[test]
    fn test_missing_payload_is_not_opaque() {
        let registry = SchemaRegistry::builtin();
        for op in ["create_query", "unregistered_op", "ping"] {
            let node = decode_nested_payload(&envelope(op, None), &registry).unwrap();
            assert_eq!(node, DecodedNode::NoPayload);
        }
    }

    #[test]
    fn test_schema_encode_then_decode_keeps_field_order() {
        let schema = Schema::container("Pair", vec![field("a", Shape::Text), field("b", Shape::Uint64)]);
        let node = DecodedNode::field_set([("a", DecodedNode::text("x")), ("b", DecodedNode::unsigned(5))]);

        let bytes = encode_with_schema(&schema, &node).unwrap();
        // offset(4) + u64(8) + "x"
        assert_eq!(bytes.len(), 13);
        assert_eq!(decode_with_schema(&schema, &bytes).unwrap(), node);
    }

    #[test]
    fn test_schema_encoding_matches_typed_encoding() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.resolve("create_query").unwrap();
        let typed = encode_ssz(&create_query());
        let node = decode_with_schema(schema, &typed).unwrap();
        assert_eq!(encode_with_schema(schema, &node).unwrap(), typed);
    }

    #[test]
    fn test_encode_rejects_mismatched_nodes() {
        let schema = Schema::container("Small", vec![field("n", Shape::Uint8)]);

        let err = encode_with_schema(&schema, &DecodedNode::field_set([("n", DecodedNode::unsigned(256))]))
            .unwrap_err();
        assert_eq!(err.path, "n");

        let err = encode_with_schema(&schema, &DecodedNode::field_set([("m", DecodedNode::unsigned(1))]))
            .unwrap_err();
        assert!(err.reason.contains("expected field n"));

        let err = encode_with_schema(&schema, &DecodedNode::text("n")).unwrap_err();
        assert_eq!(err.path, "<root>");
    }

    #[test]
    fn test_selectors_beyond_one_byte_are_rejected() {
        let labels: Vec<String> = (0..300).map(|i| format!("L{}", i)).collect();
        let schema = Schema::container("Wide", vec![field("code", Shape::Enumeration(labels))]);

        let node = DecodedNode::field_set([("code", DecodedNode::label("L255"))]);
        assert_eq!(encode_with_schema(&schema, &node).unwrap(), vec![255]);

        let node = DecodedNode::field_set([("code", DecodedNode::label("L256"))]);
        let err = encode_with_schema(&schema, &node).unwrap_err();
        assert_eq!(err.path, "code");
        assert!(err.reason.contains("does not fit in one byte"));

        let variants: Vec<Field> = (0..300).map(|i| field(&format!("v{}", i), Shape::Bool)).collect();
        let schema = Schema::container("WideUnion", vec![field("value", Shape::Union(variants))]);
        let node = DecodedNode::field_set([(
            "value",
            DecodedNode::field_set([("v299", DecodedNode::Scalar(Scalar::Bool(true)))]),
        )]);
        let err = encode_with_schema(&schema, &node).unwrap_err();
        assert_eq!(err.path, "value");
    }

    #[test]
    fn test_fixed_container_rejects_trailing_bytes() {
        let schema = Schema::container(
            "Fixed",
            vec![field("flag", Shape::Bool), field("n", Shape::Uint16)],
        );
        assert_eq!(
            decode_with_schema(&schema, &[1, 0x34, 0x12]).unwrap(),
            DecodedNode::field_set([
                ("flag", DecodedNode::Scalar(Scalar::Bool(true))),
                ("n", DecodedNode::unsigned(0x1234)),
            ])
        );
        assert!(decode_with_schema(&schema, &[1, 0x34, 0x12, 0]).is_err());
        assert!(decode_with_schema(&schema, &[2, 0, 0]).is_err());
    }

    #[test]
    fn test_fixed_item_list() {
        let schema = Schema::container("Ports", vec![field("ports", Shape::list(Shape::Uint16))]);
        let node = decode_with_schema(&schema, &[4, 0, 0, 0, 0x50, 0, 0xbb, 0x01]).unwrap();
        assert_eq!(
            node.field("ports"),
            Some(&DecodedNode::Sequence(vec![
                DecodedNode::unsigned(80),
                DecodedNode::unsigned(443)
            ]))
        );
        assert!(decode_with_schema(&schema, &[4, 0, 0, 0, 0x50]).is_err());
    }
}
