//! Two-phase markup parser.
//!
//! Phase one classifies each physical line on its own (entry, item or
//! plain text) and records its indentation, positions and comments. Phase
//! two groups lines into blocks by indentation. A block's node kind is
//! decided once all of its children are known, so nodes are never
//! reclassified after the fact.

use super::{Comments, Document, Node, Position, Scalar};

/// Parse markup text into a document.
pub fn parse(text: &str) -> Document {
    let (lines, trailing) = scan(text);
    tracing::trace!("scanned {} markup lines", lines.len());
    let mut parser = Parser { lines, pos: 0 };
    let mut document = Document::from_entries(parser.block(None));
    document.trailing = trailing;
    document
}

#[derive(Debug, Clone)]
struct Line {
    indent: usize,
    body: Body,
    /// Text after the indentation, for flow literals spanning lines.
    text: String,
    at: Position,
}

#[derive(Debug, Clone)]
enum Body {
    /// `key: value` or `key:`
    Entry {
        key: Scalar,
        value: Option<(String, Position)>,
    },
    /// `- item`
    Item(Scalar),
    /// Anything else; folds into a preceding scalar.
    Text(Scalar),
}

/// Classify every line. Comment and blank lines attach to the next content
/// line; those left over at the end are returned separately.
fn scan(text: &str) -> (Vec<Line>, Vec<String>) {
    let mut lines = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut line_offset = 0;

    for (index, raw) in text.split('\n').enumerate() {
        let start = line_offset;
        line_offset += raw.len() + 1;

        let (content, comment) = split_comment(raw.trim_end_matches('\r'));
        let content = content.trim_end();
        let comment = comment.map(|c| c.trim_end().to_string());

        if content.trim().is_empty() {
            match comment {
                Some(comment) => pending.push(comment),
                // Runs of blank lines collapse to one.
                None if pending.last().map_or(!lines.is_empty(), |l| !l.is_empty()) => {
                    pending.push(String::new())
                }
                None => {}
            }
            continue;
        }

        let comments = Comments {
            leading: std::mem::take(&mut pending),
            trailing: comment,
        };
        let indent = content.len() - content.trim_start_matches(' ').len();
        let body = &content[indent..];
        let at = |column: usize| Position {
            line: index + 1,
            column: column + 1,
            offset: start + column,
        };

        let parsed = if body == "-" || body.starts_with("- ") {
            let rest = &body[1..];
            let item = rest.trim_start();
            let column = indent + 1 + (rest.len() - item.len());
            Body::Item(Scalar::parse(item, at(column)).with_comments(comments))
        } else if let Some(colon) = mapping_colon(body) {
            let key = body[..colon].trim_end();
            let right = &body[colon + 1..];
            let value = right.trim();
            let value_column = indent + colon + 1 + (right.len() - right.trim_start().len());
            Body::Entry {
                key: Scalar::parse(key, at(indent)).with_comments(comments),
                value: (!value.is_empty()).then(|| (value.to_string(), at(value_column))),
            }
        } else {
            Body::Text(Scalar::parse(body, at(indent)).with_comments(comments))
        };

        lines.push(Line {
            indent,
            body: parsed,
            text: body.to_string(),
            at: at(indent),
        });
    }

    while pending.last().is_some_and(|l| l.is_empty()) {
        pending.pop();
    }
    (lines, pending)
}

/// Whether a quote character at `i` opens a quoted token.
fn opens_quote(bytes: &[u8], i: usize) -> bool {
    i == 0 || matches!(bytes[i - 1], b' ' | b'\t' | b'[' | b',' | b'{' | b':')
}

/// Split a line into its content and a trailing `# comment` outside quotes.
fn split_comment(line: &str) -> (&str, Option<&str>) {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(b'"') if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if (b == b'"' || b == b'\'') && opens_quote(bytes, i) => quote = Some(b),
            None if b == b'#' && (i == 0 || bytes[i - 1] == b' ' || bytes[i - 1] == b'\t') => {
                return (&line[..i], Some(&line[i..]));
            }
            None => {}
        }
        i += 1;
    }
    (line, None)
}

/// Byte index of the colon separating key and value, if any.
///
/// The colon must be outside quotes and followed by whitespace or the end
/// of the line, so `C:/path` and `-Wl,-rpath:x` stay scalars.
fn mapping_colon(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(b'"') if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if (b == b'"' || b == b'\'') && opens_quote(bytes, i) => quote = Some(b),
            None if b == b':' => {
                if matches!(bytes.get(i + 1), None | Some(b' ') | Some(b'\t')) {
                    return Some(i);
                }
            }
            None => {}
        }
        i += 1;
    }
    None
}

/// Bracket depth left open at the end of a `[..]` or `{..}` literal.
fn open_brackets(token: &str) -> usize {
    if !(token.starts_with('[') || token.starts_with('{')) {
        return 0;
    }
    let bytes = token.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(b'"') if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if (b == b'"' || b == b'\'') && opens_quote(bytes, i) => quote = Some(b),
            None if b == b'[' || b == b'{' => depth += 1,
            None if b == b']' || b == b'}' => depth = depth.saturating_sub(1),
            None => {}
        }
        i += 1;
    }
    depth
}

/// Split the inside of a `[..]` or `{..}` literal on top-level commas.
///
/// Returns each item with its byte offset inside `inner`.
fn split_flow(inner: &str) -> Vec<(usize, &str)> {
    let bytes = inner.as_bytes();
    let mut items = Vec::new();
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    let mut push = |from: usize, to: usize| {
        let piece = &inner[from..to];
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            let lead = piece.len() - piece.trim_start().len();
            items.push((from + lead, trimmed));
        }
    };

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(b'"') if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if (b == b'"' || b == b'\'') && opens_quote(bytes, i) => quote = Some(b),
            None if b == b'[' || b == b'{' => depth += 1,
            None if b == b']' || b == b'}' => depth = depth.saturating_sub(1),
            None if b == b',' && depth == 0 => {
                push(start, i);
                start = i + 1;
            }
            None => {}
        }
        i += 1;
    }
    push(start, inner.len());
    items
}

/// A value token, possibly joined from several physical lines.
#[derive(Debug)]
struct Token {
    text: String,
    /// Where each joined line starts in `text`, and its source position.
    segments: Vec<(usize, Position)>,
}

impl Token {
    fn new(text: String, at: Position) -> Self {
        Token {
            text,
            segments: vec![(0, at)],
        }
    }

    fn push_line(&mut self, text: &str, at: Position) {
        self.text.push(' ');
        self.segments.push((self.text.len(), at));
        self.text.push_str(text);
    }

    /// Source position of a byte offset into `text`.
    fn at(&self, offset: usize) -> Position {
        let (start, base) = self
            .segments
            .iter()
            .rev()
            .find(|(start, _)| *start <= offset)
            .copied()
            .unwrap_or((0, Position::default()));
        let shift = offset - start;
        Position {
            line: base.line,
            column: base.column + shift,
            offset: base.offset + shift,
        }
    }
}

/// The inside of `text` when it is wrapped in `open` and `close`.
fn delimited(text: &str, open: char, close: char) -> Option<&str> {
    (text.len() >= 2 && text.starts_with(open) && text.ends_with(close))
        .then(|| &text[1..text.len() - 1])
}

/// Build the node for `key: text`, where `text` sits at `base` in `token`.
fn entry_node(key: Scalar, text: &str, token: &Token, base: usize) -> Node {
    if let Some(inner) = delimited(text, '[', ']') {
        let values = split_flow(inner)
            .into_iter()
            .map(|(offset, item)| Scalar::parse(item, token.at(base + 1 + offset)))
            .collect();
        return Node::FlowSequence { key, values };
    }

    if let Some(inner) = delimited(text, '{', '}') {
        let children = split_flow(inner)
            .into_iter()
            .map(|(offset, item)| flow_entry(item, token, base + 1 + offset))
            .collect();
        return Node::Map { key, children };
    }

    Node::KeyValue {
        key,
        value: Scalar::parse(text, token.at(base)),
    }
}

/// One `key: value` pair of a `{..}` literal; a bare key maps to null.
fn flow_entry(item: &str, token: &Token, base: usize) -> Node {
    let key_at = token.at(base);
    match mapping_colon(item) {
        Some(colon) => {
            let right = &item[colon + 1..];
            let value = right.trim_start();
            let value_base = base + colon + 1 + (right.len() - value.len());
            let key = Scalar::parse(item[..colon].trim_end(), key_at);
            entry_node(key, value, token, value_base)
        }
        None => Node::KeyValue {
            key: Scalar::parse(item, key_at),
            value: Scalar::parse("", key_at),
        },
    }
}

/// A block whose first child is a bare item is a sequence; otherwise a mapping.
fn classify(key: Scalar, children: Vec<Node>) -> Node {
    match children.first() {
        Some(Node::Scalar(_)) => Node::Sequence {
            key,
            items: children,
        },
        _ => Node::Map { key, children },
    }
}

struct Parser {
    lines: Vec<Line>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Line> {
        self.lines.get(self.pos)
    }

    fn next_line(&mut self) -> Option<Line> {
        let line = self.lines.get(self.pos).cloned();
        if line.is_some() {
            self.pos += 1;
        }
        line
    }

    /// Parse every following line indented deeper than `parent`.
    fn block(&mut self, parent: Option<usize>) -> Vec<Node> {
        let mut nodes: Vec<Node> = Vec::new();

        while let Some(line) = self.peek() {
            if parent.is_some_and(|p| line.indent <= p) {
                break;
            }
            let Some(Line { indent, body, .. }) = self.next_line() else {
                break;
            };

            match body {
                Body::Entry {
                    key,
                    value: Some((text, at)),
                } => {
                    let token = self.flow_continuation(indent, Token::new(text, at));
                    let mut node = entry_node(key, &token.text, &token, 0);
                    self.fold_continuations(indent, &mut node);
                    nodes.push(node);
                }
                Body::Entry { key, value: None } => {
                    let children = if self.next_is_item_at(indent) {
                        self.compact_sequence(indent)
                    } else {
                        self.block(Some(indent))
                    };
                    nodes.push(classify(key, children));
                }
                Body::Item(scalar) => {
                    let mut node = Node::Scalar(scalar);
                    self.fold_continuations(indent, &mut node);
                    nodes.push(node);
                }
                Body::Text(scalar) => match nodes.last_mut() {
                    Some(Node::Scalar(prev)) => prev.append(&scalar.text()),
                    _ => {
                        let mut node = Node::Scalar(scalar);
                        self.fold_continuations(indent, &mut node);
                        nodes.push(node);
                    }
                },
            }
        }

        nodes
    }

    fn next_is_item_at(&self, indent: usize) -> bool {
        self.peek()
            .is_some_and(|l| l.indent == indent && matches!(l.body, Body::Item(_)))
    }

    /// Items written at the same indentation as their key.
    fn compact_sequence(&mut self, indent: usize) -> Vec<Node> {
        let mut items = Vec::new();
        while self.next_is_item_at(indent) {
            if let Some(Line {
                body: Body::Item(scalar),
                ..
            }) = self.next_line()
            {
                let mut node = Node::Scalar(scalar);
                self.fold_continuations(indent, &mut node);
                items.push(node);
            }
        }
        items
    }

    /// Join deeper lines onto a `[..]` or `{..}` literal left open.
    fn flow_continuation(&mut self, indent: usize, mut token: Token) -> Token {
        while open_brackets(&token.text) > 0 {
            let Some(line) = self.peek().filter(|l| l.indent > indent) else {
                break;
            };
            let (text, at) = (line.text.clone(), line.at);
            token.push_line(&text, at);
            self.pos += 1;
        }
        token
    }

    /// Fold deeper plain-text lines into the scalar value of `node`.
    fn fold_continuations(&mut self, indent: usize, node: &mut Node) {
        let target = match node {
            Node::Scalar(s) => s,
            Node::KeyValue { value, .. } => value,
            _ => return,
        };
        loop {
            let text = match self.peek() {
                Some(Line {
                    indent: deeper,
                    body: Body::Text(text),
                    ..
                }) if *deeper > indent => text.text(),
                _ => break,
            };
            target.append(&text);
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::markup::Value;

    #[test]
    fn test_blank_lines_and_comments_are_skipped() {
        let doc = parse("# header\n\nname: demo  # trailing\n\n\nversion: '1.0' # note\n");
        assert_eq!(doc.entries().len(), 2);
        assert_eq!(doc.get("name").unwrap().as_value(), Value::from("demo"));
        assert_eq!(doc.get("version").unwrap().as_value(), Value::from("1.0"));
    }

    #[test]
    fn test_positions_are_tracked() {
        let doc = parse("name: demo\nbuild:\n  cflags: [-Wall, -O2]\n");
        assert_eq!(doc.get("name").unwrap().position(), Position::start());

        let cflags = doc.get_path(&["build", "cflags"]).unwrap();
        let position = cflags.position();
        assert_eq!((position.line, position.column), (3, 3));
        assert_eq!(position.offset, "name: demo\nbuild:\n  ".len());

        if let Node::FlowSequence { values, .. } = cflags {
            assert_eq!(values[1].position.column, 19);
        } else {
            panic!("expected a flow sequence");
        }
    }

    #[test]
    fn test_block_sequence_is_classified_after_children() {
        let doc = parse("libraries:\n  - m\n  - pthread\n");
        let node = doc.get("libraries").unwrap();
        assert!(matches!(node, Node::Sequence { .. }));
        assert_eq!(node.as_value(), Value::from(vec!["m", "pthread"]));
    }

    #[test]
    fn test_compact_sequence_at_key_indent() {
        let doc = parse("build:\n  cflags:\n  - -Wall\n  - -O2\n  ldflags: [-s]\n");
        let build = doc.get("build").unwrap();
        assert_eq!(
            build.get("cflags").unwrap().as_value(),
            Value::from(vec!["-Wall", "-O2"])
        );
        assert_eq!(build.get("ldflags").unwrap().as_value(), Value::from(vec!["-s"]));
    }

    #[test]
    fn test_dedent_returns_to_ancestor() {
        let doc = parse("a:\n  b:\n    c: 1\n  d: 2\ne: 3\n");
        let a = doc.get("a").unwrap();
        assert_eq!(a.children().len(), 2);
        assert_eq!(a.get("b").unwrap().get("c").unwrap().as_value(), Value::Integer(1));
        assert_eq!(a.get("d").unwrap().as_value(), Value::Integer(2));
        assert_eq!(doc.get("e").unwrap().as_value(), Value::Integer(3));
    }

    #[test]
    fn test_plain_scalar_continuation() {
        let doc = parse("description: a long\n  description text\nitems:\n  - first\n    part\n");
        assert_eq!(
            doc.get("description").unwrap().as_value(),
            Value::from("a long description text")
        );
        assert_eq!(
            doc.get("items").unwrap().as_value(),
            Value::from(vec!["first part"])
        );
    }

    #[test]
    fn test_colons_inside_values() {
        let doc = parse("main: C:/src/main.cpp\nflag: -Wl,-rpath:/opt\nquoted: 'a: b'\n");
        assert_eq!(doc.get("main").unwrap().as_value(), Value::from("C:/src/main.cpp"));
        assert_eq!(doc.get("flag").unwrap().as_value(), Value::from("-Wl,-rpath:/opt"));
        assert_eq!(doc.get("quoted").unwrap().as_value(), Value::from("a: b"));
    }

    #[test]
    fn test_flow_sequence_with_quoted_commas() {
        let doc = parse("defines: [\"A=1,2\", B, 3]\nempty: []\n");
        assert_eq!(
            doc.get("defines").unwrap().as_value(),
            Value::Sequence(vec![Value::from("A=1,2"), Value::from("B"), Value::Integer(3)])
        );
        assert_eq!(doc.get("empty").unwrap().as_value(), Value::Sequence(vec![]));
    }

    #[test]
    fn test_flow_mapping_is_a_mapping() {
        let doc = parse("fmt: {version: '9.1', target: lib, cflags: [-a, -b], header}\n");
        let fmt = doc.get("fmt").unwrap();
        assert!(matches!(fmt, Node::Map { .. }));
        assert_eq!(fmt.get("version").unwrap().as_value(), Value::from("9.1"));
        assert_eq!(fmt.get("target").unwrap().as_value(), Value::from("lib"));
        assert_eq!(fmt.get("cflags").unwrap().as_value(), Value::from(vec!["-a", "-b"]));
        assert!(fmt.get("header").unwrap().is_empty_value());

        let target = fmt.get("target").unwrap().position();
        assert_eq!((target.line, target.column), (1, 23));
    }

    #[test]
    fn test_wrapped_flow_literals_are_joined() {
        let doc = parse("cflags: [-Wall,\n  -O2]\nfmt: {version: '9.1',\n  target: lib}\nname: x\n");
        let cflags = doc.get("cflags").unwrap();
        assert_eq!(cflags.as_value(), Value::from(vec!["-Wall", "-O2"]));
        if let Node::FlowSequence { values, .. } = cflags {
            assert_eq!((values[1].position.line, values[1].position.column), (2, 3));
        } else {
            panic!("expected a flow sequence");
        }

        let fmt = doc.get("fmt").unwrap();
        assert_eq!(fmt.get("target").unwrap().as_value(), Value::from("lib"));
        assert_eq!(fmt.get("target").unwrap().position().line, 4);
        assert_eq!(doc.get("name").unwrap().as_value(), Value::from("x"));
    }

    #[test]
    fn test_unclosed_flow_literal_stays_a_string() {
        let doc = parse("cflags: [-Wall\nname: x\n");
        assert_eq!(doc.get("cflags").unwrap().as_value(), Value::from("[-Wall"));
        assert_eq!(doc.get("name").unwrap().as_value(), Value::from("x"));
    }

    #[test]
    fn test_keys_are_literal_evaluated() {
        let doc = parse("123: x\ntrue: y\n");
        let keys: Vec<Value> = doc
            .entries()
            .iter()
            .map(|n| n.key().unwrap().value.clone())
            .collect();
        assert_eq!(keys, vec![Value::Integer(123), Value::Bool(true)]);
        assert!(doc.get("123").is_some());
    }

    #[test]
    fn test_malformed_lines_degrade_to_scalars() {
        let doc = parse("name: demo\n  just some words\n- stray\n");
        assert_eq!(doc.get("name").unwrap().as_value(), Value::from("demo just some words"));
        assert!(doc.entries().iter().any(|n| matches!(n, Node::Scalar(_))));
    }
}
