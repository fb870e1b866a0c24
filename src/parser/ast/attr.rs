//! The per-node attribute bag.
//!
//! Kept as a language-neutral multi-map rather than a struct so the
//! analyzer, preprocessor, and emitter can each stash their own decisions
//! (`type`, `symbol`, `lvalue`, `comptime`, `sideeffect`, `moved`,
//! `checkcast`, `scopedestroy`, ...) without the node shape growing a field
//! per concern.

use std::collections::HashMap;

use crate::types::TypeRef;

/// One value an attribute can hold. `Type`/`Symbol` are boxed indirection
/// points into the analyzer's own tables so this enum stays `Clone`-cheap.
#[derive(Debug, Clone)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Type(TypeRef),
    SymbolId(usize),
}

impl AttrValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeRef> {
        match self {
            AttrValue::Type(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_symbol_id(&self) -> Option<usize> {
        match self {
            AttrValue::SymbolId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Attr {
    values: HashMap<String, AttrValue>,
}

impl Attr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: AttrValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.values.get(key)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.values
            .get(key)
            .and_then(AttrValue::as_bool)
            .unwrap_or(false)
    }

    pub fn get_type(&self, key: &str) -> Option<&TypeRef> {
        self.values.get(key).and_then(AttrValue::as_type)
    }

    pub fn set_type(&mut self, ty: TypeRef) {
        self.set("type", AttrValue::Type(ty));
    }

    pub fn ty(&self) -> Option<&TypeRef> {
        self.get_type("type")
    }

    /// Merge another bag into this one. Fails if both bags disagree on an
    /// overlapping key, per the design's "merging requires agreement" rule —
    /// this is how preprocessor-declared attributes combine with
    /// analyzer-declared ones without silently clobbering each other.
    pub fn merge(&mut self, other: &Attr) -> Result<(), String> {
        for (key, value) in &other.values {
            if let Some(existing) = self.values.get(key) {
                if !attr_values_eq(existing, value) {
                    return Err(format!("conflicting attribute '{key}' during merge"));
                }
            } else {
                self.values.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}

fn attr_values_eq(a: &AttrValue, b: &AttrValue) -> bool {
    match (a, b) {
        (AttrValue::Bool(x), AttrValue::Bool(y)) => x == y,
        (AttrValue::Int(x), AttrValue::Int(y)) => x == y,
        (AttrValue::Str(x), AttrValue::Str(y)) => x == y,
        (AttrValue::SymbolId(x), AttrValue::SymbolId(y)) => x == y,
        (AttrValue::Type(x), AttrValue::Type(y)) => x.codename() == y.codename(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_accepts_agreeing_keys_and_rejects_conflicts() {
        let mut a = Attr::new();
        a.set("lvalue", AttrValue::Bool(true));

        let mut agreeing = Attr::new();
        agreeing.set("lvalue", AttrValue::Bool(true));
        assert!(a.merge(&agreeing).is_ok());

        let mut conflicting = Attr::new();
        conflicting.set("lvalue", AttrValue::Bool(false));
        assert!(a.merge(&conflicting).is_err());
    }
}
