//! Descriptor digester: node tree to [`ProjectDescriptor`].
//!
//! Validation goes through a small combinator, [`Digester::required`] and
//! [`Digester::optional`], which check an entry against a [`Shape`] and
//! report failures at the position of the offending key. Digestion stops at
//! the first violation.
//!
//! A present-but-empty value (`key:` or `key: null`) is treated like an
//! absent key. Anything else of the wrong shape is an error.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::core::descriptor::{
    CompilationPlan, DeclaredBit, PackageDescription, ProjectDescriptor, TargetDescription,
    TargetFormat,
};
use crate::core::errors::{DescriptorError, MissingRequiredField, ParseError};
use crate::core::markup::{Document, Node, Position, Scalar, Value};

/// Descriptor schema versions this digester understands.
pub const SUPPORTED_SCHEMAS: &[i64] = &[1];

/// Shape predicate for a mapping entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    String,
    Integer,
    Mapping,
    Sequence,
    SequenceOf(&'static Shape),
    /// A bare version string or a mapping with `version`.
    BitDescription,
}

impl Shape {
    /// Whether a keyed node's value has this shape.
    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Shape::String | Shape::Integer => match node {
                Node::KeyValue { value, .. } => self.matches_scalar(value),
                _ => false,
            },
            Shape::Mapping => matches!(node, Node::Map { .. }),
            Shape::Sequence => matches!(node, Node::Sequence { .. } | Node::FlowSequence { .. }),
            Shape::SequenceOf(inner) => match node {
                Node::FlowSequence { values, .. } => values.iter().all(|v| inner.matches_scalar(v)),
                Node::Sequence { items, .. } => items.iter().all(|item| match item {
                    Node::Scalar(s) => inner.matches_scalar(s),
                    _ => false,
                }),
                _ => false,
            },
            Shape::BitDescription => Shape::String.matches(node) || Shape::Mapping.matches(node),
        }
    }

    fn matches_scalar(&self, scalar: &Scalar) -> bool {
        match self {
            Shape::String => matches!(scalar.value, Value::String(_)),
            Shape::Integer => matches!(scalar.value, Value::Integer(_)),
            _ => false,
        }
    }

    /// Description used in "`x` must be ..." messages.
    pub fn describe(&self) -> String {
        match self {
            Shape::String => "string".to_string(),
            Shape::Integer => "integer".to_string(),
            Shape::Mapping => "mapping".to_string(),
            Shape::Sequence => "sequence".to_string(),
            Shape::SequenceOf(inner) => format!("sequence of {}", inner.describe()),
            Shape::BitDescription => "string or a mapping".to_string(),
        }
    }

    fn article(&self) -> &'static str {
        match self {
            Shape::Integer => "an",
            _ => "a",
        }
    }
}

const STRINGS: Shape = Shape::SequenceOf(&Shape::String);

/// A mapping being digested: its entries and where it starts.
#[derive(Debug, Clone, Copy)]
struct Mapping<'n> {
    entries: &'n [Node],
    at: Position,
}

impl<'n> Mapping<'n> {
    fn of(node: &'n Node) -> Self {
        Mapping {
            entries: node.children(),
            at: node.position(),
        }
    }

    fn get(&self, key: &str) -> Option<&'n Node> {
        self.entries
            .iter()
            .find(|n| n.key().is_some_and(|k| k.text() == key))
    }
}

/// Turns a parsed document into a validated [`ProjectDescriptor`].
pub struct Digester<'a> {
    file: PathBuf,
    source: &'a str,
}

impl<'a> Digester<'a> {
    pub fn new(file: &Path, source: &'a str) -> Self {
        Digester {
            file: file.to_path_buf(),
            source,
        }
    }

    /// Digest a whole document.
    pub fn digest(&self, document: &Document) -> Result<ProjectDescriptor, DescriptorError> {
        let root = Mapping {
            entries: document.entries(),
            at: Position::start(),
        };

        let schema = match self.optional(root, "schema", Shape::Integer)? {
            Some(node) => match node.as_value() {
                Value::Integer(n) => {
                    if !SUPPORTED_SCHEMAS.contains(&n) {
                        return Err(self.error(node.position(), format!("schema {} is not supported", n)));
                    }
                    n
                }
                _ => 1,
            },
            None => 1,
        };
        tracing::debug!("digesting {} (schema {})", self.file.display(), schema);

        self.digest_v1(root)
    }

    fn digest_v1(&self, root: Mapping<'_>) -> Result<ProjectDescriptor, DescriptorError> {
        self.warn_unknown(
            root,
            &["schema", "name", "version", "description", "build", "test", "targets"],
        );

        let name = self.string(self.required(root, "name", Shape::String)?);
        let mut descriptor = ProjectDescriptor::new(name);

        if let Some(node) = self.optional(root, "version", Shape::String)? {
            descriptor.version = self.string(node);
        }
        if let Some(node) = self.optional(root, "description", Shape::String)? {
            descriptor.description = self.string(node);
        }
        if let Some(node) = self.optional(root, "build", Shape::Mapping)? {
            descriptor.build = self.compilation_plan(Mapping::of(node))?;
        }
        if let Some(node) = self.optional(root, "test", Shape::Mapping)? {
            descriptor.test = self.compilation_plan(Mapping::of(node))?;
        }
        if let Some(node) = self.optional(root, "targets", Shape::Mapping)? {
            for entry in node.children() {
                let target = self.target(entry)?;
                descriptor.targets.insert(target.name.clone(), target);
            }
        }

        Ok(descriptor)
    }

    fn target(&self, entry: &Node) -> Result<TargetDescription, DescriptorError> {
        let name = self.entry_name(entry)?;
        let mut target = TargetDescription::new(name.clone());
        if entry.is_empty_value() {
            return Ok(target);
        }
        if !Shape::Mapping.matches(entry) {
            return Err(self.shape_error(entry, &name, Shape::Mapping));
        }

        let map = Mapping::of(entry);
        self.warn_unknown(
            map,
            &[
                "image",
                "dockerfile",
                "test_image",
                "test_dockerfile",
                "toolchain_prefix",
                "main",
                "format",
                "post_build",
                "build",
                "test",
            ],
        );

        target.image = self.optional_string(map, "image")?;
        target.dockerfile = self.optional_string(map, "dockerfile")?;
        target.test_image = self.optional_string(map, "test_image")?;
        target.test_dockerfile = self.optional_string(map, "test_dockerfile")?;
        target.toolchain_prefix = self.optional_string(map, "toolchain_prefix")?;
        if let Some(main) = self.optional_string(map, "main")? {
            target.main = main;
        }
        if let Some(node) = self.optional(map, "format", Shape::String)? {
            target.format = self
                .string(node)
                .parse::<TargetFormat>()
                .map_err(|_| self.error(node.position(), "format must be one of: binary"))?;
        }
        if let Some(node) = self.optional(map, "post_build", STRINGS)? {
            target.post_build = self.strings(node);
        }
        if let Some(node) = self.optional(map, "build", Shape::Mapping)? {
            target.build = self.compilation_plan(Mapping::of(node))?;
        }
        if let Some(node) = self.optional(map, "test", Shape::Mapping)? {
            target.test = self.compilation_plan(Mapping::of(node))?;
        }

        Ok(target)
    }

    fn compilation_plan(&self, map: Mapping<'_>) -> Result<CompilationPlan, DescriptorError> {
        self.warn_unknown(
            map,
            &["bits", "packages", "cflags", "cppflags", "ldflags", "libraries", "includes"],
        );

        let mut plan = CompilationPlan::default();

        if let Some(node) = self.optional(map, "bits", Shape::Mapping)? {
            for entry in node.children() {
                plan.declared_bits.push(self.declared_bit(entry)?);
            }
        }

        if let Some(node) = self.optional(map, "packages", Shape::Mapping)? {
            for entry in node.children() {
                plan.packages.push(self.package(entry)?);
            }
        }

        if let Some(node) = self.optional(map, "cflags", STRINGS)? {
            plan.cflags = self.strings(node);
        }
        if let Some(node) = self.optional(map, "cppflags", STRINGS)? {
            plan.cppflags = self.strings(node);
        }
        if let Some(node) = self.optional(map, "ldflags", STRINGS)? {
            plan.ldflags = self.strings(node);
        }
        if let Some(node) = self.optional(map, "libraries", STRINGS)? {
            plan.libraries = self.strings(node);
        }
        if let Some(node) = self.optional(map, "includes", STRINGS)? {
            plan.includes = self.strings(node).into_iter().collect::<BTreeSet<_>>();
        }

        Ok(plan)
    }

    fn declared_bit(&self, entry: &Node) -> Result<DeclaredBit, DescriptorError> {
        let name = self.entry_name(entry)?;
        if !Shape::BitDescription.matches(entry) {
            return Err(self.shape_error(entry, &name, Shape::BitDescription));
        }

        if Shape::String.matches(entry) {
            return Ok(DeclaredBit::new(name, self.string(entry)));
        }

        let map = Mapping::of(entry);
        self.warn_unknown(map, &["version", "target", "cflags", "cppflags"]);

        let version = self.string(self.required(map, "version", Shape::String)?);
        let mut bit = DeclaredBit::new(name, version);
        bit.target = self.optional_string(map, "target")?;
        if let Some(node) = self.optional(map, "cflags", STRINGS)? {
            bit.cflags = self.strings(node);
        }
        if let Some(node) = self.optional(map, "cppflags", STRINGS)? {
            bit.cppflags = self.strings(node);
        }
        Ok(bit)
    }

    fn package(&self, entry: &Node) -> Result<PackageDescription, DescriptorError> {
        let path = self.entry_name(entry)?;
        let mut package = PackageDescription::new(path.clone());
        if entry.is_empty_value() {
            return Ok(package);
        }
        if !Shape::Mapping.matches(entry) {
            return Err(self.shape_error(entry, &path, Shape::Mapping));
        }

        let map = Mapping::of(entry);
        self.warn_unknown(map, &["cflags", "cppflags"]);
        if let Some(node) = self.optional(map, "cflags", STRINGS)? {
            package.cflags = self.strings(node);
        }
        if let Some(node) = self.optional(map, "cppflags", STRINGS)? {
            package.cppflags = self.strings(node);
        }
        Ok(package)
    }

    /// Look up a required entry and check its shape.
    fn required<'n>(
        &self,
        map: Mapping<'n>,
        key: &str,
        shape: Shape,
    ) -> Result<&'n Node, DescriptorError> {
        match self.optional(map, key, shape)? {
            Some(node) => Ok(node),
            None => Err(MissingRequiredField {
                file: self.file.clone(),
                line: map.at.line,
                column: map.at.column,
                field: key.to_string(),
            }
            .into()),
        }
    }

    /// Look up an optional entry and check its shape. Empty values count as absent.
    fn optional<'n>(
        &self,
        map: Mapping<'n>,
        key: &str,
        shape: Shape,
    ) -> Result<Option<&'n Node>, DescriptorError> {
        let node = match map.get(key) {
            Some(node) => node,
            None => return Ok(None),
        };
        if node.is_empty_value() && shape != Shape::Mapping {
            return Ok(None);
        }
        if !shape.matches(node) {
            return Err(self.shape_error(node, key, shape));
        }
        Ok(Some(node))
    }

    fn optional_string(
        &self,
        map: Mapping<'_>,
        key: &str,
    ) -> Result<Option<String>, DescriptorError> {
        Ok(self
            .optional(map, key, Shape::String)?
            .map(|node| self.string(node)))
    }

    /// The key of a mapping entry, which must be a keyed node.
    fn entry_name(&self, entry: &Node) -> Result<String, DescriptorError> {
        entry
            .key_text()
            .ok_or_else(|| self.error(entry.position(), "expected a `key: value` entry"))
    }

    fn string(&self, node: &Node) -> String {
        node.as_value().to_string()
    }

    fn strings(&self, node: &Node) -> Vec<String> {
        match node.as_value() {
            Value::Sequence(items) => items.iter().map(Value::to_string).collect(),
            _ => Vec::new(),
        }
    }

    fn warn_unknown(&self, map: Mapping<'_>, known: &[&str]) {
        for entry in map.entries {
            match entry.key_text() {
                Some(key) if !known.contains(&key.as_str()) => {
                    let at = entry.position();
                    tracing::warn!(
                        "{}:{}:{}: unknown field `{}` is ignored",
                        self.file.display(),
                        at.line,
                        at.column,
                        key
                    );
                }
                _ => {}
            }
        }
    }

    fn shape_error(&self, node: &Node, key: &str, shape: Shape) -> DescriptorError {
        self.error(
            node.position(),
            format!("{} must be {} {}", key, shape.article(), shape.describe()),
        )
    }

    fn error(&self, at: Position, message: impl Into<String>) -> DescriptorError {
        ParseError::new(&self.file, at, message)
            .with_source(self.source, at)
            .into()
    }
}
