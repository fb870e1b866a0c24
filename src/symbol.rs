//! Symbols: one per declaration site, owned by the
//! scope they were declared in.

use crate::diagnostics::Span;
use crate::parser::ast::NodeId;
use crate::types::TypeRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Local,
    Global,
    Static,
    Comptime,
}

pub type SymbolId = usize;

#[derive(Debug, Clone)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub ty: Option<TypeRef>,
    pub storage: StorageClass,
    pub annotations: Vec<String>,
    pub defining_node: NodeId,
    pub scope_of_origin: usize,
    pub cimport: bool,
    /// Overridable-redeclaration escape hatch: a `cimport` symbol annotated
    /// `nodecl` may be declared again in the same scope without error.
    pub nodecl: bool,
    pub nickname: Option<String>,
    pub span: Span,
}

impl Symbol {
    pub fn new(
        id: SymbolId,
        name: impl Into<String>,
        storage: StorageClass,
        defining_node: NodeId,
        scope_of_origin: usize,
        span: Span,
    ) -> Self {
        Symbol {
            id,
            name: name.into(),
            ty: None,
            storage,
            annotations: vec![],
            defining_node,
            scope_of_origin,
            cimport: false,
            nodecl: false,
            nickname: None,
            span,
        }
    }

    pub fn is_overridable(&self) -> bool {
        self.cimport && self.nodecl
    }
}
