//! In-place descriptor edits.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::core::descriptor::ProjectDescriptor;
use crate::core::markup::{Document, Value};
use crate::util::fs::{read_to_string, write_string};

/// Set a dotted key in the descriptor at `path` to a literal value.
///
/// The value is read the way the descriptor itself would read it, so
/// `[a, b]` becomes a sequence and `'1.0'` stays a string. The edited
/// document must still digest; otherwise nothing is written.
pub fn set_value(path: &Path, key: &str, value: &str) -> Result<()> {
    let keys: Vec<&str> = key.split('.').collect();
    if keys.iter().any(|k| k.trim().is_empty()) {
        bail!("invalid key `{}`", key);
    }

    let content = read_to_string(path)?;
    let mut document = Document::parse(&content);
    document.set_path(&keys, parse_value(value));

    let updated = document.dump();
    ProjectDescriptor::parse(&updated, path)
        .with_context(|| format!("setting `{}` would make {} invalid", key, path.display()))?;

    write_string(path, &updated)?;
    tracing::debug!("set `{}` in {}", key, path.display());
    Ok(())
}

fn parse_value(raw: &str) -> Value {
    Document::parse(&format!("value: {}", raw.trim()))
        .get("value")
        .map(|node| node.as_value())
        .unwrap_or_else(|| Value::literal(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn descriptor(tmp: &TempDir, content: &str) -> std::path::PathBuf {
        let path = tmp.path().join("project.yaml");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_set_scalar_replaces_in_place() {
        let tmp = TempDir::new().unwrap();
        let path = descriptor(&tmp, "name: app\nversion: 0.1.0\n");

        set_value(&path, "version", "0.2.0").unwrap();

        let loaded = ProjectDescriptor::load(&path).unwrap();
        assert_eq!(loaded.version, "0.2.0");
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("name: app\n"));
    }

    #[test]
    fn test_set_nested_sequence() {
        let tmp = TempDir::new().unwrap();
        let path = descriptor(&tmp, "name: app\n");

        set_value(&path, "build.cflags", "[-Wall, -O2]").unwrap();

        let loaded = ProjectDescriptor::load(&path).unwrap();
        assert_eq!(loaded.build.cflags, vec!["-Wall", "-O2"]);
    }

    #[test]
    fn test_set_bit_version_keeps_string() {
        let tmp = TempDir::new().unwrap();
        let path = descriptor(&tmp, "name: app\n");

        set_value(&path, "build.bits.fmt", "'9.1'").unwrap();

        let loaded = ProjectDescriptor::load(&path).unwrap();
        assert_eq!(loaded.build.declared_bits[0].name, "fmt");
        assert_eq!(loaded.build.declared_bits[0].version, "9.1");
    }

    #[test]
    fn test_set_keeps_comments() {
        let tmp = TempDir::new().unwrap();
        let path = descriptor(&tmp, "# project header\nname: a  # the name\nversion: '1.0'\n");

        set_value(&path, "name", "b").unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "# project header\nname: b  # the name\nversion: '1.0'\n"
        );
    }

    #[test]
    fn test_set_inline_bit_mapping() {
        let tmp = TempDir::new().unwrap();
        let path = descriptor(&tmp, "name: app\n");

        set_value(&path, "build.bits.fmt", "{version: '9.1', target: lib}").unwrap();

        let loaded = ProjectDescriptor::load(&path).unwrap();
        assert_eq!(loaded.build.declared_bits[0].version, "9.1");
        assert_eq!(loaded.build.declared_bits[0].target.as_deref(), Some("lib"));
    }

    #[test]
    fn test_invalid_edit_is_not_written() {
        let tmp = TempDir::new().unwrap();
        let original = "name: app\n";
        let path = descriptor(&tmp, original);

        let err = set_value(&path, "name", "42").unwrap_err();
        assert!(format!("{:#}", err).contains("name must be a string"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }

    #[test]
    fn test_empty_key_segment_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = descriptor(&tmp, "name: app\n");
        assert!(set_value(&path, "build..cflags", "[]").is_err());
    }
}
