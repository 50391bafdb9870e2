//! Indentation-based markup used by `project.yaml`.
//!
//! This is a narrow YAML subset: block mappings, block sequences of
//! scalars, inline `[..]` lists and `{..}` mappings, and plain or quoted
//! scalars. Every node keeps
//! the position of its defining token so the digester can point at the
//! exact key that failed validation.
//!
//! Parsing is permissive and never fails; malformed lines degrade to
//! scalars. Documents can be edited in place and dumped back out with their
//! comments. Inline `{..}` mappings are read as block mappings and written
//! back in block form.

mod emit;
mod parser;
mod value;

pub use parser::parse;
pub use value::Value;

/// Source location of a token (1-based line and column, 0-based byte offset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    /// The start of a document.
    pub fn start() -> Self {
        Position {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

/// Comment lines attached to the line a node starts on.
///
/// A blank line is kept as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comments {
    pub leading: Vec<String>,
    pub trailing: Option<String>,
}

/// A scalar token: its evaluated value and the text it was written as.
#[derive(Debug, Clone, PartialEq)]
pub struct Scalar {
    pub value: Value,
    raw: String,
    pub position: Position,
    /// Comments around the line this token starts, when it starts one.
    pub comments: Comments,
}

impl Scalar {
    /// Build a scalar from source text.
    pub fn parse(token: &str, position: Position) -> Self {
        Scalar {
            value: Value::literal(token),
            raw: token.trim().to_string(),
            position,
            comments: Comments::default(),
        }
    }

    /// Build a scalar from a value, rendering its text.
    pub fn new(value: impl Into<Value>) -> Self {
        let value = value.into();
        Scalar {
            raw: value.render(),
            value,
            position: Position::default(),
            comments: Comments::default(),
        }
    }

    pub(crate) fn with_comments(mut self, comments: Comments) -> Self {
        self.comments = comments;
        self
    }

    /// The text this scalar is written as.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Key text for lookups.
    pub fn text(&self) -> String {
        self.value.key_text()
    }

    /// Append a continuation token (a plain scalar folded over lines).
    pub(crate) fn append(&mut self, token: &str) {
        let joined = format!("{} {}", self.value.key_text(), token.trim());
        self.value = Value::String(joined);
        self.raw = self.value.render();
    }
}

/// A node of the parsed tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A bare sequence item.
    Scalar(Scalar),
    /// `key: value`
    KeyValue { key: Scalar, value: Scalar },
    /// `key:` followed by `- item` lines.
    Sequence { key: Scalar, items: Vec<Node> },
    /// `key: [a, b]`
    FlowSequence { key: Scalar, values: Vec<Scalar> },
    /// `key:` followed by a more indented block of entries.
    Map { key: Scalar, children: Vec<Node> },
}

impl Node {
    /// Build a keyed node holding `value`.
    pub fn from_value(key: impl Into<Value>, value: Value) -> Node {
        let key = Scalar::new(key);
        match value {
            Value::Mapping(entries) => Node::Map {
                key,
                children: entries
                    .into_iter()
                    .map(|(k, v)| Node::from_value(k, v))
                    .collect(),
            },
            Value::Sequence(items) if items.iter().all(Value::is_scalar) => Node::FlowSequence {
                key,
                values: items.into_iter().map(Scalar::new).collect(),
            },
            Value::Sequence(items) => Node::Sequence {
                key,
                items: items.into_iter().map(|v| Node::Scalar(Scalar::new(v))).collect(),
            },
            scalar => Node::KeyValue {
                key,
                value: Scalar::new(scalar),
            },
        }
    }

    /// The key of a keyed node.
    pub fn key(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(_) => None,
            Node::KeyValue { key, .. }
            | Node::Sequence { key, .. }
            | Node::FlowSequence { key, .. }
            | Node::Map { key, .. } => Some(key),
        }
    }

    /// The token that starts the node's line: its key, or the item itself.
    pub fn token(&self) -> &Scalar {
        match self {
            Node::Scalar(item) => item,
            Node::KeyValue { key, .. }
            | Node::Sequence { key, .. }
            | Node::FlowSequence { key, .. }
            | Node::Map { key, .. } => key,
        }
    }

    /// Key text, if this node is keyed.
    pub fn key_text(&self) -> Option<String> {
        self.key().map(Scalar::text)
    }

    /// Position of the defining token (the key for keyed nodes).
    pub fn position(&self) -> Position {
        match self {
            Node::Scalar(s) => s.position,
            _ => self.key().map(|k| k.position).unwrap_or_default(),
        }
    }

    /// Nested nodes of a block mapping or block sequence.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Map { children, .. } => children,
            Node::Sequence { items, .. } => items,
            _ => &[],
        }
    }

    /// Whether the node carries no value at all (`key:` or `key: null`).
    pub fn is_empty_value(&self) -> bool {
        match self {
            Node::Map { children, .. } => children.is_empty(),
            Node::KeyValue { value, .. } => value.value.is_null(),
            _ => false,
        }
    }

    /// Look up a child entry of a block mapping.
    pub fn get(&self, key: &str) -> Option<&Node> {
        find(self.children(), key)
    }

    /// The node's value as plain data.
    pub fn as_value(&self) -> Value {
        match self {
            Node::Scalar(s) => s.value.clone(),
            Node::KeyValue { value, .. } => value.value.clone(),
            Node::FlowSequence { values, .. } => {
                Value::Sequence(values.iter().map(|s| s.value.clone()).collect())
            }
            Node::Sequence { items, .. } => Value::Sequence(items.iter().map(item_value).collect()),
            Node::Map { children, .. } => mapping_value(children),
        }
    }
}

fn item_value(node: &Node) -> Value {
    match node.key() {
        Some(key) => Value::Mapping(vec![(key.value.clone(), node.as_value())]),
        None => node.as_value(),
    }
}

fn mapping_value(children: &[Node]) -> Value {
    Value::Mapping(
        children
            .iter()
            .map(|child| match child.key() {
                Some(key) => (key.value.clone(), child.as_value()),
                None => (child.as_value(), Value::Null),
            })
            .collect(),
    )
}

fn find<'n>(nodes: &'n [Node], key: &str) -> Option<&'n Node> {
    nodes
        .iter()
        .find(|n| n.key().is_some_and(|k| k.text() == key))
}

/// A parsed document: the unkeyed root mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    entries: Vec<Node>,
    /// Comment lines after the last entry.
    pub(crate) trailing: Vec<String>,
}

impl Document {
    /// Parse markup text. Never fails.
    pub fn parse(text: &str) -> Document {
        parse(text)
    }

    pub(crate) fn from_entries(entries: Vec<Node>) -> Self {
        Document {
            entries,
            trailing: Vec::new(),
        }
    }

    /// Top-level entries in declaration order.
    pub fn entries(&self) -> &[Node] {
        &self.entries
    }

    /// Look up a top-level entry.
    pub fn get(&self, key: &str) -> Option<&Node> {
        find(&self.entries, key)
    }

    /// Look up a nested entry by key path.
    pub fn get_path(&self, path: &[&str]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.get(first)?;
        for key in rest {
            node = node.get(key)?;
        }
        Some(node)
    }

    /// The whole document as plain data.
    pub fn as_value(&self) -> Value {
        mapping_value(&self.entries)
    }

    /// Set a top-level entry, replacing it in place if present.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.set_path(&[key], value);
    }

    /// Set a nested entry, creating intermediate mappings as needed.
    ///
    /// An intermediate entry that is not a mapping is replaced by one.
    pub fn set_path(&mut self, path: &[&str], value: impl Into<Value>) {
        if path.is_empty() {
            return;
        }
        set_in(&mut self.entries, path, value.into());
    }

    /// Remove a top-level entry, returning it.
    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let index = self
            .entries
            .iter()
            .position(|n| n.key().is_some_and(|k| k.text() == key))?;
        Some(self.entries.remove(index))
    }

    /// Serialize back to markup text.
    pub fn dump(&self) -> String {
        emit::dump(&self.entries, &self.trailing)
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.dump())
    }
}

fn set_in(nodes: &mut Vec<Node>, path: &[&str], value: Value) {
    let (first, rest) = match path.split_first() {
        Some(split) => split,
        None => return,
    };
    let index = nodes
        .iter()
        .position(|n| n.key().is_some_and(|k| k.text() == *first));

    if rest.is_empty() {
        let mut node = Node::from_value(*first, value);
        match index {
            Some(i) => {
                // Keep the original key token so quoting and position survive.
                if let (Some(old_key), Some(new_key)) = (nodes[i].key().cloned(), key_mut(&mut node))
                {
                    *new_key = old_key;
                }
                nodes[i] = node;
            }
            None => nodes.push(node),
        }
        return;
    }

    let i = match index {
        Some(i) => {
            if !matches!(nodes[i], Node::Map { .. }) {
                let key = nodes[i].key().cloned().unwrap_or_else(|| Scalar::new(*first));
                nodes[i] = Node::Map {
                    key,
                    children: Vec::new(),
                };
            }
            i
        }
        None => {
            nodes.push(Node::Map {
                key: Scalar::new(*first),
                children: Vec::new(),
            });
            nodes.len() - 1
        }
    };

    if let Node::Map { children, .. } = &mut nodes[i] {
        set_in(children, rest, value);
    }
}

fn key_mut(node: &mut Node) -> Option<&mut Scalar> {
    match node {
        Node::Scalar(_) => None,
        Node::KeyValue { key, .. }
        | Node::Sequence { key, .. }
        | Node::FlowSequence { key, .. }
        | Node::Map { key, .. } => Some(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"name: demo
version: 1.0.0
description: "A demo: with colon"
build:
  bits:
    arduino: 1.0.0
    fmt:
      version: '9.1'
      cflags: [-DFMT_HEADER_ONLY]
  packages:
    src:
    shaders:
      cflags:
        - -O2
  cflags: [-Wall, -Wextra]
  includes:
    - ./include
targets:
  nano:
    toolchain_prefix: arm-none-eabi-
"#;

    #[test]
    fn test_dump_round_trip_preserves_structure() {
        let doc = parse(DESCRIPTOR);
        let dumped = doc.dump();
        let reparsed = parse(&dumped);
        assert_eq!(reparsed.as_value(), doc.as_value());
    }

    #[test]
    fn test_mutation_is_dumped() {
        let mut doc = parse("name: a\nversion: 1.0");
        doc.set("name", "b");
        let dumped = doc.dump();
        assert!(dumped.contains("name: b"));
        assert!(dumped.contains("version: 1.0"));
    }

    #[test]
    fn test_set_path_creates_intermediate_maps() {
        let mut doc = parse("name: a\n");
        doc.set_path(&["build", "cflags"], vec!["-Wall", "-O2"]);
        doc.set_path(&["build", "bits", "fmt"], "9.1.0");

        let reparsed = parse(&doc.dump());
        assert_eq!(
            reparsed.get_path(&["build", "cflags"]).unwrap().as_value(),
            Value::from(vec!["-Wall", "-O2"])
        );
        assert_eq!(
            reparsed.get_path(&["build", "bits", "fmt"]).unwrap().as_value(),
            Value::from("9.1.0")
        );
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut doc = parse("name: a\nversion: '1'\ndescription: x\n");
        doc.set("version", "2");
        let keys: Vec<String> = doc.entries().iter().filter_map(Node::key_text).collect();
        assert_eq!(keys, vec!["name", "version", "description"]);
        assert!(doc.dump().contains("version: '2'"));
    }

    #[test]
    fn test_remove_entry() {
        let mut doc = parse("name: a\ndescription: x\n");
        assert!(doc.remove("description").is_some());
        assert!(doc.remove("missing").is_none());
        assert_eq!(doc.dump(), "name: a\n");
    }

    #[test]
    fn test_set_keeps_comments() {
        let mut doc = parse("# project header\nname: a  # the name\nversion: '1.0'\n");
        doc.set("name", "b");
        assert_eq!(doc.dump(), "# project header\nname: b  # the name\nversion: '1.0'\n");
    }

    #[test]
    fn test_comments_attach_to_next_line() {
        let doc = parse("name: a\n\n# build section\nbuild:  # flags\n  cflags: [-O2]\n# end\n");
        let build = doc.get("build").unwrap().token();
        assert_eq!(build.comments.leading, vec!["", "# build section"]);
        assert_eq!(build.comments.trailing.as_deref(), Some("# flags"));
        assert_eq!(doc.trailing, vec!["# end"]);
    }

    #[test]
    fn test_as_value_shapes() {
        let doc = parse(DESCRIPTOR);
        let bits = doc.get_path(&["build", "bits"]).unwrap();
        assert!(matches!(bits, Node::Map { .. }));
        assert_eq!(
            doc.get_path(&["build", "includes"]).unwrap().as_value(),
            Value::from(vec!["./include"])
        );
        assert!(doc.get_path(&["build", "packages", "src"]).unwrap().is_empty_value());
    }
}
