//! Tree-shaped scope/symbol table.
//!
//! Unlike a flat frame stack, scopes here form an explicit arena-indexed
//! tree: `fork` allocates a child and returns to it, `pop` returns the
//! parent. This is what lets the analyzer keep a handle to an outer scope
//! (e.g. a function's scope, to register GC roots) after traversal has
//! moved on to its children, and what gives the C emitter a stable
//! declaration-order symbol list per scope for destructor/defer ordering.

use std::collections::HashMap;
use std::fmt::Display;

use crate::symbol::{Symbol, SymbolId};

pub type ScopeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Root,
    Block,
    Loop,
    Function,
    Record,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Redeclared {
    pub name: String,
}

impl Display for Redeclared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' is already declared in this scope", self.name)
    }
}

impl std::error::Error for Redeclared {}

#[derive(Debug)]
pub struct Frame {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    /// Declaration order; the GC-root hook and the emitter's destructor
    /// ordering both depend on iterating this, not the name map, in order.
    pub symbols: Vec<SymbolId>,
    names: HashMap<String, SymbolId>,
    pub labels: HashMap<String, crate::parser::ast::NodeId>,
    /// Loop scopes only: node ids a `break` inside this loop may target.
    pub break_targets: Vec<crate::parser::ast::NodeId>,
    /// Function scopes only: the function's resolved type and whether a
    /// `return` has been seen on every control path yet.
    pub functype: Option<crate::types::TypeRef>,
    pub has_return: bool,
    /// Symbols already destroyed on this scope's exit path (filled in by the
    /// analyzer as it emits destructor calls, so a fixed-point re-run of the
    /// same scope doesn't double-destroy).
    pub alreadydestroyed: Vec<SymbolId>,
    /// `defer` blocks registered in this scope, in registration order; the
    /// emitter runs them in reverse, after destructors.
    pub deferblocks: Vec<crate::parser::ast::NodeId>,
}

impl Frame {
    fn new(kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Frame {
            kind,
            parent,
            children: vec![],
            symbols: vec![],
            names: HashMap::new(),
            labels: HashMap::new(),
            break_targets: vec![],
            functype: None,
            has_return: false,
            alreadydestroyed: vec![],
            deferblocks: vec![],
        }
    }
}

/// Owns the whole scope tree for one compilation unit plus the cursor
/// (`current`) the analyzer is presently positioned at. `fork`/`pop` move
/// the cursor; nothing is ever deallocated, so a symbol declared in a scope
/// that has since been "popped" stays addressable by `ScopeId` for the
/// emitter's later passes.
#[derive(Debug)]
pub struct Scope {
    frames: Vec<Frame>,
    current: ScopeId,
    symbols: Vec<Symbol>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    pub fn new() -> Self {
        Scope {
            frames: vec![Frame::new(ScopeKind::Root, None)],
            current: 0,
            symbols: vec![],
        }
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn kind(&self, id: ScopeId) -> ScopeKind {
        self.frames[id].kind
    }

    pub fn frame(&self, id: ScopeId) -> &Frame {
        &self.frames[id]
    }

    pub fn frame_mut(&mut self, id: ScopeId) -> &mut Frame {
        &mut self.frames[id]
    }

    /// Create a child of the current scope and move the cursor into it,
    /// returning its id so the caller can `pop` back to exactly this point
    /// even if other forks happen in between (nested preprocessor splices).
    pub fn fork(&mut self, kind: ScopeKind) -> ScopeId {
        let id = self.frames.len();
        self.frames.push(Frame::new(kind, Some(self.current)));
        self.frames[self.current].children.push(id);
        self.current = id;
        id
    }

    /// Restore the cursor to the parent of the current scope. Every `fork`
    /// must be matched by exactly one `pop`, or the cursor drifts to the
    /// wrong frame for the rest of the traversal.
    pub fn pop(&mut self) {
        if let Some(parent) = self.frames[self.current].parent {
            self.current = parent;
        }
    }

    /// Move the cursor directly to `id`, returning its previous position so
    /// the caller can restore it afterward. Used to fork a polymorphic
    /// function's specialized body from the scope it was declared in, rather
    /// than wherever the call site happens to be.
    pub fn goto(&mut self, id: ScopeId) -> ScopeId {
        let prev = self.current;
        self.current = id;
        prev
    }

    pub fn declare(&mut self, mut symbol: Symbol) -> Result<SymbolId, Redeclared> {
        let scope = self.current;
        if let Some(&existing_id) = self.frames[scope].names.get(&symbol.name) {
            let existing = &self.symbols[existing_id];
            if !existing.is_overridable() {
                return Err(Redeclared { name: symbol.name });
            }
        }

        let id = self.symbols.len();
        symbol.id = id;
        symbol.scope_of_origin = scope;
        self.frames[scope].names.insert(symbol.name.clone(), id);
        self.frames[scope].symbols.push(id);
        self.symbols.push(symbol);
        Ok(id)
    }

    /// Walk from `self.current` outward through parents looking for `name`.
    pub fn resolve(&self, name: &str) -> Option<SymbolId> {
        let mut cursor = Some(self.current);
        while let Some(id) = cursor {
            if let Some(&sym) = self.frames[id].names.get(name) {
                return Some(sym);
            }
            cursor = self.frames[id].parent;
        }
        None
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id]
    }

    /// The nearest enclosing loop scope's break targets, or `None` outside
    /// any loop (a `break` there is a parse/analysis error, not handled
    /// here).
    pub fn enclosing_loop(&self) -> Option<ScopeId> {
        let mut cursor = Some(self.current);
        while let Some(id) = cursor {
            if self.frames[id].kind == ScopeKind::Loop {
                return Some(id);
            }
            cursor = self.frames[id].parent;
        }
        None
    }

    pub fn enclosing_function(&self) -> Option<ScopeId> {
        let mut cursor = Some(self.current);
        while let Some(id) = cursor {
            if self.frames[id].kind == ScopeKind::Function {
                return Some(id);
            }
            cursor = self.frames[id].parent;
        }
        None
    }

    /// All symbols across every scope, in declaration order, filtered to
    /// those with `storage == Static`. Used by the `after_analyze` GC-root
    /// enumeration hook.
    pub fn static_symbols_in_declaration_order(&self) -> Vec<SymbolId> {
        self.symbols
            .iter()
            .filter(|s| s.storage == crate::symbol::StorageClass::Static)
            .map(|s| s.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Span;
    use crate::symbol::StorageClass;

    fn span() -> Span {
        Span {
            start: (0, 0),
            end: (0, 0),
            source: String::new(),
        }
    }

    fn symbol(name: &str) -> Symbol {
        Symbol::new(0, name, StorageClass::Local, 0, 0, span())
    }

    #[test]
    fn fork_and_pop_are_balanced() {
        let mut scope = Scope::new();
        let root = scope.current();
        let child = scope.fork(ScopeKind::Block);
        assert_ne!(root, child);
        scope.pop();
        assert_eq!(scope.current(), root);
    }

    #[test]
    fn redeclaration_in_same_scope_fails() {
        let mut scope = Scope::new();
        scope.declare(symbol("x")).unwrap();
        assert!(scope.declare(symbol("x")).is_err());
    }

    #[test]
    fn cimport_nodecl_symbol_is_overridable() {
        let mut scope = Scope::new();
        let mut first = symbol("puts");
        first.cimport = true;
        first.nodecl = true;
        scope.declare(first).unwrap();

        let mut second = symbol("puts");
        second.cimport = true;
        second.nodecl = true;
        assert!(scope.declare(second).is_ok());
    }

    #[test]
    fn resolve_walks_to_parent_scopes() {
        let mut scope = Scope::new();
        scope.declare(symbol("outer")).unwrap();
        scope.fork(ScopeKind::Block);
        assert!(scope.resolve("outer").is_some());
        scope.declare(symbol("inner")).unwrap();
        scope.pop();
        assert!(scope.resolve("inner").is_none());
    }

    #[test]
    fn break_targets_resolve_to_nearest_enclosing_loop() {
        let mut scope = Scope::new();
        assert!(scope.enclosing_loop().is_none());
        scope.fork(ScopeKind::Loop);
        scope.fork(ScopeKind::Block);
        assert!(scope.enclosing_loop().is_some());
    }
}
