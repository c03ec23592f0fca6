//! # Snapshot Format
//!
//! An indentation-based text notation for registry contents, used to seed
//! the in-memory store and to assert on its shape.
//!
//! ```text
//! HKEY_CLASSES_ROOT
//!    CLSID
//!       {93CB110F-9189-4349-BD9F-392D9A4D0096}
//!          (Default) = Accessibility Control Panel
//!          InprocServer32
//!             (Default) = %SystemRoot%\System32\accessibilitycpl.dll
//!             ThreadingModel = Apartment
//! ```
//!
//! ## Grammar
//!
//! - Each non-blank line is `Name` or `Name = Value`, indented by any amount
//!   of leading whitespace.
//! - A line is a child of the nearest preceding line with less indentation.
//! - `Name` alone is a key.
//! - `Name = Value` with nothing indented beneath it is a named value on the
//!   enclosing key; `(Default) = Value` sets the enclosing key's default.
//! - `Name = Value` with lines indented beneath it is a key whose default
//!   value is `Value`.
//! - Top-level lines are hive names such as `HKEY_CLASSES_ROOT`.
//!
//! Printing writes three spaces per level, the default value first, then
//! named values, then child keys in insertion order. `parse_snapshot` of the
//! printed text yields an equal tree.

use crate::ComAdminError;
use crate::primitives::{DEFAULT_VALUE_NAME, SNAPSHOT_INDENT};
use std::collections::BTreeMap;
use std::sync::Arc;

// =============================================================================
// KEY TREE
// =============================================================================

/// A key in a registry tree: a default value, named values and child keys.
///
/// Children are unique by name (ASCII case-insensitive) and kept in
/// insertion order. They are shared through `Arc` so open handles to a
/// child outlive handles to its parent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyNode {
    name: String,
    default_value: Option<String>,
    values: BTreeMap<String, String>,
    children: Vec<Arc<KeyNode>>,
}

impl KeyNode {
    /// Create an empty key.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Look up a named value, ignoring ASCII case.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Named values, ordered by name.
    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Child keys in insertion order.
    pub fn children(&self) -> impl Iterator<Item = &Arc<KeyNode>> {
        self.children.iter()
    }

    /// Look up a direct child, ignoring ASCII case.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Arc<KeyNode>> {
        self.children
            .iter()
            .find(|child| child.name.eq_ignore_ascii_case(name))
    }

    /// Set the default value. Line breaks are rejected: a snapshot line
    /// holds the whole value.
    pub fn set_default_value(&mut self, value: impl Into<String>) -> Result<(), ComAdminError> {
        let value = value.into();
        check_single_line(DEFAULT_VALUE_NAME, &value)?;
        self.default_value = Some(value);
        Ok(())
    }

    /// Set a named value. An existing value whose name differs only by case
    /// is overwritten and keeps its original spelling. Names and values
    /// containing line breaks are rejected.
    pub fn set_value(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), ComAdminError> {
        let value = value.into();
        check_single_line("value name", name)?;
        check_single_line(name, &value)?;
        self.insert_value(name, value);
        Ok(())
    }

    fn insert_value(&mut self, name: &str, value: String) {
        let existing = self
            .values
            .keys()
            .find(|candidate| candidate.eq_ignore_ascii_case(name))
            .cloned();
        self.values
            .insert(existing.unwrap_or_else(|| name.to_string()), value);
    }

    /// Add a child key, merging it into an existing child of the same name.
    pub fn add_child(&mut self, child: KeyNode) {
        match self
            .children
            .iter_mut()
            .find(|existing| existing.name.eq_ignore_ascii_case(&child.name))
        {
            Some(existing) => Arc::make_mut(existing).merge(child),
            None => self.children.push(Arc::new(child)),
        }
    }

    /// Merge `other` into this key. Values from `other` win.
    pub fn merge(&mut self, other: KeyNode) {
        if let Some(default_value) = other.default_value {
            self.default_value = Some(default_value);
        }
        for (name, value) in other.values {
            self.insert_value(&name, value);
        }
        for child in other.children {
            self.add_child(Arc::unwrap_or_clone(child));
        }
    }
}

fn check_single_line(what: &str, text: &str) -> Result<(), ComAdminError> {
    if text.contains(['\n', '\r']) {
        return Err(ComAdminError::InvalidEntry(format!(
            "{} contains a line break: {:?}",
            what, text
        )));
    }
    Ok(())
}

// =============================================================================
// PARSING
// =============================================================================

/// One non-blank snapshot line.
#[derive(Debug)]
struct Line<'a> {
    number: usize,
    indent: usize,
    name: &'a str,
    value: Option<&'a str>,
}

fn snapshot_error(line: usize, message: impl Into<String>) -> ComAdminError {
    ComAdminError::Snapshot {
        line,
        message: message.into(),
    }
}

/// Split `Name = Value`. A trailing ` =` is an empty value.
fn split_assignment(body: &str) -> (&str, Option<&str>) {
    if body == "=" {
        ("", Some(""))
    } else if let Some(value) = body.strip_prefix("= ") {
        ("", Some(value))
    } else if let Some((name, value)) = body.split_once(" = ") {
        (name.trim_end(), Some(value))
    } else if let Some(name) = body.strip_suffix(" =") {
        (name.trim_end(), Some(""))
    } else {
        (body, None)
    }
}

fn tokenize(text: &str) -> Result<Vec<Line<'_>>, ComAdminError> {
    let mut lines = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let content = raw.trim_end();
        let body = content.trim_start();
        if body.is_empty() {
            continue;
        }
        let indent = content.chars().take_while(|c| c.is_whitespace()).count();
        let (name, value) = split_assignment(body);
        if name.is_empty() {
            return Err(snapshot_error(index + 1, "line has no name"));
        }
        lines.push(Line {
            number: index + 1,
            indent,
            name,
            value,
        });
    }
    Ok(lines)
}

fn parse_children(
    lines: &[Line<'_>],
    pos: &mut usize,
    parent: Option<&Line<'_>>,
    key: &mut KeyNode,
) -> Result<(), ComAdminError> {
    while let Some(line) = lines.get(*pos) {
        if parent.is_some_and(|p| line.indent <= p.indent) {
            return Ok(());
        }
        *pos += 1;

        let has_children = lines
            .get(*pos)
            .is_some_and(|next| next.indent > line.indent);
        let is_default = line.name == DEFAULT_VALUE_NAME;

        match (line.value, has_children) {
            (Some(value), false) => {
                if parent.is_none() {
                    return Err(snapshot_error(
                        line.number,
                        format!("value '{}' is outside of any key", line.name),
                    ));
                }
                let set = if is_default {
                    key.set_default_value(value)
                } else {
                    key.set_value(line.name, value)
                };
                set.map_err(|e| snapshot_error(line.number, e.to_string()))?;
            }
            (value, _) => {
                if is_default {
                    return Err(snapshot_error(
                        line.number,
                        "(Default) must be a value line with nothing beneath it",
                    ));
                }
                let mut child = KeyNode::new(line.name);
                if let Some(value) = value {
                    child
                        .set_default_value(value)
                        .map_err(|e| snapshot_error(line.number, e.to_string()))?;
                }
                parse_children(lines, pos, Some(line), &mut child)?;
                key.add_child(child);
            }
        }
    }
    Ok(())
}

/// Parse snapshot text into a tree.
///
/// The returned root is unnamed; its children are the top-level keys
/// (normally hive names).
pub fn parse_snapshot(text: &str) -> Result<KeyNode, ComAdminError> {
    let lines = tokenize(text)?;
    let mut root = KeyNode::default();
    let mut pos = 0;
    parse_children(&lines, &mut pos, None, &mut root)?;
    Ok(root)
}

// =============================================================================
// PRINTING
// =============================================================================

fn write_key(out: &mut String, key: &KeyNode, depth: usize) {
    let indent = SNAPSHOT_INDENT.repeat(depth);
    let inner = SNAPSHOT_INDENT.repeat(depth + 1);

    out.push_str(&indent);
    out.push_str(&key.name);
    out.push('\n');

    if let Some(default_value) = &key.default_value {
        out.push_str(&format!("{}{} = {}\n", inner, DEFAULT_VALUE_NAME, default_value));
    }
    for (name, value) in &key.values {
        out.push_str(&format!("{}{} = {}\n", inner, name, value));
    }
    for child in &key.children {
        write_key(out, child, depth + 1);
    }
}

/// Print a tree as snapshot text.
///
/// Only the root's children are written; values set on the unnamed root
/// itself have no representation in the format.
#[must_use]
pub fn print_snapshot(root: &KeyNode) -> String {
    let mut out = String::new();
    for child in &root.children {
        write_key(&mut out, child, 0);
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================
