//! Tree of sets and attributes produced by the loader.
//!
//! A raw tree (from [`crate::Parser`]) may hold unresolved references;
//! a [`Document`] never does.

use serde::ser::{Serialize, SerializeMap, Serializer};

/// A value stored under a name in a set.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Attribute text.
    Text(String),
    /// A nested set.
    Set(Set),
    /// An attribute whose value comes from elsewhere in the file.
    Reference(Reference),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&Set> {
        match self {
            Value::Set(set) => Some(set),
            _ => None,
        }
    }
}

/// A `~@name:path` (absolute) or `.~@name:path` (local) reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub path: Vec<String>,
    /// Resolved relative to the containing set instead of the root.
    pub local: bool,
    /// Attribute text appended after the reference was declared.
    pub suffix: String,
    pub line: usize,
}

impl Reference {
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

/// An ordered map of names to values.
///
/// Re-inserting a name replaces its value but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Set {
    entries: Vec<(String, Value)>,
}

impl Set {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Walk a path of names through nested sets.
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let (last, parents) = path.split_last()?;
        let mut set = self;
        for name in parents {
            set = set.get(name.as_ref())?.as_set()?;
        }
        set.get(last.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A fully loaded `.lang` file: the root set with every reference resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub root: Set,
}

impl Document {
    /// Look up a dotted path such as `menu.title`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let names: Vec<&str> = path.split('.').collect();
        self.root.lookup(names.as_slice())
    }

    /// The attribute text at a dotted path.
    pub fn text(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_text)
    }

    /// The attribute text at a dotted path, or the path itself when there is
    /// none. Untranslated strings show up as their key.
    pub fn text_or_key<'a>(&'a self, path: &'a str) -> &'a str {
        self.text(path).unwrap_or(path)
    }
}

impl Serialize for Set {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Text(text) => serializer.serialize_str(text),
            Value::Set(set) => set.serialize(serializer),
            Value::Reference(reference) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("reference", &reference.dotted())?;
                map.serialize_entry("local", &reference.local)?;
                map.end()
            }
        }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    #[test]
    fn test_insert_keeps_position_on_replace() {
        let mut set = Set::new();
        set.insert("a", text("1"));
        set.insert("b", text("2"));
        set.insert("a", text("3"));
        let names: Vec<_> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(set.get("a"), Some(&text("3")));
    }

    #[test]
    fn test_lookup_nested() {
        let mut inner = Set::new();
        inner.insert("title", text("Start"));
        let mut root = Set::new();
        root.insert("menu", Value::Set(inner));

        assert_eq!(root.lookup(&["menu", "title"]), Some(&text("Start")));
        assert_eq!(root.lookup(&["menu", "missing"]), None);
        assert_eq!(root.lookup(&["menu", "title", "deeper"]), None);
        assert_eq!(root.lookup::<&str>(&[]), None);
    }

    #[test]
    fn test_document_text_or_key() {
        let mut root = Set::new();
        root.insert("greeting", text("Hello"));
        let doc = Document { root };
        assert_eq!(doc.text_or_key("greeting"), "Hello");
        assert_eq!(doc.text_or_key("farewell"), "farewell");
    }
}
