//! Serialization of a node tree back to markup text.

use super::Node;

const INDENT: usize = 2;

pub(super) fn dump(entries: &[Node], trailing: &[String]) -> String {
    let mut out = String::new();
    for node in entries {
        write_node(&mut out, node, 0);
    }
    write_comments(&mut out, trailing, "");
    out
}

fn write_comments(out: &mut String, lines: &[String], pad: &str) {
    for line in lines {
        if line.is_empty() {
            out.push('\n');
        } else {
            out.push_str(&format!("{}{}\n", pad, line));
        }
    }
}

fn write_node(out: &mut String, node: &Node, depth: usize) {
    let pad = " ".repeat(depth * INDENT);
    let comments = &node.token().comments;
    write_comments(out, &comments.leading, &pad);

    let line = match node {
        Node::Scalar(item) => format!("{}- {}", pad, item.raw()),
        Node::KeyValue { key, value } => format!("{}{}: {}", pad, key.raw(), value.raw()),
        Node::FlowSequence { key, values } => {
            let values: Vec<&str> = values.iter().map(|v| v.raw()).collect();
            format!("{}{}: [{}]", pad, key.raw(), values.join(", "))
        }
        Node::Sequence { key, .. } | Node::Map { key, .. } => format!("{}{}:", pad, key.raw()),
    };
    out.push_str(&line);
    if let Some(comment) = &comments.trailing {
        out.push_str("  ");
        out.push_str(comment);
    }
    out.push('\n');

    for child in node.children() {
        write_node(out, child, depth + 1);
    }
}
