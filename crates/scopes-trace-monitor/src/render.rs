// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Indented text rendering of decoded payloads

use crate::node::DecodedNode;
use std::fmt::Write;

/// Spaces per nesting level
pub const INDENT_WIDTH: usize = 2;

/// Render `node` as text, one field or element per line
///
/// Lines are indented by `indent_level * INDENT_WIDTH` spaces. A field whose
/// value is a field set or a non-empty sequence is written as `name:` with
/// the value on the following lines one level deeper. Sequence elements use
/// `[index]` in place of a field name. Every line ends with a newline.
pub fn render(node: &DecodedNode, indent_level: usize) -> String {
    let mut out = String::new();
    render_into(&mut out, node, indent_level);
    out
}

fn pad(out: &mut String, level: usize) {
    out.extend(std::iter::repeat(' ').take(level * INDENT_WIDTH));
}

/// Single-line form of a node, or `None` if it needs its own block
fn inline(node: &DecodedNode) -> Option<String> {
    match node {
        DecodedNode::Scalar(scalar) => Some(scalar.to_string()),
        DecodedNode::Opaque { len } => Some(format!("<opaque payload: {} bytes>", len)),
        DecodedNode::NoPayload => Some("<no payload>".to_string()),
        DecodedNode::Sequence(items) if items.is_empty() => Some("[]".to_string()),
        DecodedNode::FieldSet(fields) if fields.is_empty() => Some("{}".to_string()),
        DecodedNode::Sequence(_) | DecodedNode::FieldSet(_) => None,
    }
}

fn render_entry(out: &mut String, label: &str, node: &DecodedNode, level: usize) {
    pad(out, level);
    match inline(node) {
        Some(value) => {
            let _ = writeln!(out, "{}: {}", label, value);
        }
        None => {
            let _ = writeln!(out, "{}:", label);
            render_into(out, node, level + 1);
        }
    }
}

fn render_into(out: &mut String, node: &DecodedNode, level: usize) {
    match node {
        DecodedNode::FieldSet(fields) if !fields.is_empty() => {
            for (name, value) in fields {
                render_entry(out, name, value, level);
            }
        }
        DecodedNode::Sequence(items) if !items.is_empty() => {
            for (index, item) in items.iter().enumerate() {
                render_entry(out, &format!("[{}]", index), item, level);
            }
        }
        other => {
            pad(out, level);
            // inline() only declines non-empty composites, handled above
            let _ = writeln!(out, "{}", inline(other).unwrap_or_default());
        }
    }
}
