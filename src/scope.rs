use indexmap::IndexMap;

use crate::value::{Value, ValueKind};

/// Named values handed to the interpreter as its global scope.
#[derive(Debug, Default, Clone)]
pub struct Scope {
    bindings: IndexMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// The initial bootstrap scope: empty `app` and `session` maps.
    pub fn bootstrap() -> Self {
        let mut scope = Self::new();
        scope.define("app", Value::map(IndexMap::new()));
        scope.define("session", Value::map(IndexMap::new()));
        scope
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.bindings.iter()
    }

    /// Shallow merge: every entry of `entries` replaces the binding of the same name.
    pub fn merge(&mut self, entries: impl IntoIterator<Item = (String, Value)>) {
        self.bindings.extend(entries);
    }

    /// Shallow merge into the map bound to `field`, creating the map when the
    /// binding is absent or not a map.
    pub fn merge_into(&mut self, field: &str, entries: impl IntoIterator<Item = (String, Value)>) {
        let mut merged = match self.bindings.get(field).map(Value::kind) {
            Some(ValueKind::Map(existing)) => existing.clone(),
            _ => IndexMap::new(),
        };
        merged.extend(entries);
        self.bindings.insert(field.to_string(), Value::map(merged));
    }

    pub fn into_map(self) -> IndexMap<String, Value> {
        self.bindings
    }
}

impl FromIterator<(String, Value)> for Scope {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Scope {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.into_iter()
    }
}
