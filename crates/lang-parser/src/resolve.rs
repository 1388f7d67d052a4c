//! Reference resolution.
//!
//! Replaces every `~@` / `.~@` reference in a raw tree with a copy of the
//! value it points at, plus any text appended to it. Targets are looked up
//! in the raw tree, so references may point forward or through other
//! references; a chain that comes back to itself is an error.

use crate::tree::{Document, Reference, Set, Value};
use crate::{LangError, LangErrorKind, LoadOptions};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Resolve every reference in `raw`.
pub fn resolve(raw: &Set, options: &LoadOptions) -> Result<Document, LangError> {
    let mut resolver = Resolver {
        root: raw,
        options,
        active: Vec::new(),
        resolved: FxHashMap::default(),
    };
    let root = resolver.resolve_set(raw, &[])?;
    Ok(Document { root })
}

struct Resolver<'t> {
    root: &'t Set,
    options: &'t LoadOptions,
    /// Paths of the references currently being resolved.
    active: Vec<Vec<String>>,
    /// Finished references by the path they live at, so chains resolve once.
    resolved: FxHashMap<Vec<String>, Value>,
}

impl<'t> Resolver<'t> {
    fn resolve_set(&mut self, set: &Set, path: &[String]) -> Result<Set, LangError> {
        let mut resolved = Set::new();
        for (name, value) in set.iter() {
            let mut here = path.to_vec();
            here.push(name.to_string());
            resolved.insert(name, self.resolve_value(value, &here)?);
        }
        Ok(resolved)
    }

    fn resolve_value(&mut self, value: &Value, path: &[String]) -> Result<Value, LangError> {
        match value {
            Value::Text(text) => Ok(Value::Text(text.clone())),
            Value::Set(set) => Ok(Value::Set(self.resolve_set(set, path)?)),
            Value::Reference(reference) => self.resolve_reference(reference, path),
        }
    }

    /// `path` is where the reference itself lives.
    fn resolve_reference(
        &mut self,
        reference: &Reference,
        path: &[String],
    ) -> Result<Value, LangError> {
        if let Some(value) = self.resolved.get(path) {
            return Ok(value.clone());
        }

        let dotted = reference.dotted();
        if self.active.iter().any(|p| p == path) {
            return Err(self.error(LangErrorKind::CircularReference(dotted), reference.line));
        }

        // Local references start from the set holding the reference.
        let base: &[String] = if reference.local {
            &path[..path.len().saturating_sub(1)]
        } else {
            &[]
        };
        let target: Vec<String> = base.iter().chain(&reference.path).cloned().collect();
        debug!(from = %path.join("."), to = %target.join("."), "resolve reference");

        self.active.push(path.to_vec());
        let found = self.lookup(&target);
        self.active.pop();

        let Some(value) = found? else {
            return Err(self.error(LangErrorKind::InvalidReference(dotted), reference.line));
        };

        let value = match value {
            Value::Text(mut text) => {
                text.push_str(&reference.suffix);
                Value::Text(text)
            }
            Value::Set(_) if !reference.suffix.is_empty() => {
                return Err(self.error(LangErrorKind::SetWithSuffix(dotted), reference.line));
            }
            other => other,
        };
        self.resolved.insert(path.to_vec(), value.clone());
        Ok(value)
    }

    /// Resolved value at `target`, walking through sets and references.
    fn lookup(&mut self, target: &[String]) -> Result<Option<Value>, LangError> {
        let mut set = self.root;
        for (i, name) in target.iter().enumerate() {
            let Some(value) = set.get(name) else {
                return Ok(None);
            };
            let here = &target[..=i];
            let rest = &target[i + 1..];

            match value {
                Value::Set(child) if !rest.is_empty() => set = child,
                Value::Reference(_) if !rest.is_empty() => {
                    let resolved = self.resolve_value(value, here)?;
                    let found = resolved.as_set().and_then(|s| s.lookup(rest)).cloned();
                    return Ok(found);
                }
                _ if rest.is_empty() => return self.resolve_value(value, here).map(Some),
                _ => return Ok(None),
            }
        }
        Ok(None)
    }

    fn error(&self, kind: LangErrorKind, line: usize) -> LangError {
        self.options.error(kind, line)
    }
}
